//! The shared-text collaborator.
//!
//! A `SharedText` is one text container inside a CRDT document. Indices and
//! lengths count Unicode scalar values, matching
//! [`BufferModel`](loom_editor_core::BufferModel) offsets.

use std::fmt;

use loom_editor_core::Subscription;
use smol_str::SmolStr;

use crate::CrdtError;

/// Identifier of a participant in a shared document.
pub type ClientId = u64;

/// One step of a text change, applied left to right with a running index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delta {
    /// Skip `n` chars.
    Retain(usize),
    /// Insert text at the running index.
    Insert(String),
    /// Remove `n` chars at the running index.
    Delete(usize),
}

impl Delta {
    /// Chars of the old text this step consumes.
    pub fn consumed(&self) -> usize {
        match self {
            Delta::Retain(n) | Delta::Delete(n) => *n,
            Delta::Insert(_) => 0,
        }
    }
}

/// A committed change to the shared text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEvent {
    pub delta: Vec<Delta>,
    /// Tag passed to [`SharedText::transact`], if any.
    pub origin: Option<SmolStr>,
    /// Produced by this replica rather than imported.
    pub local: bool,
}

/// A relative position resolved against a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbsolutePosition<O> {
    /// The container the position lives in.
    pub owner: O,
    pub index: usize,
}

pub trait SharedText {
    /// Relative position that follows content across concurrent edits.
    type Anchor: Clone + fmt::Debug + 'static;
    /// Identity of a text container.
    type Owner: Clone + PartialEq + fmt::Debug;

    fn owner(&self) -> Self::Owner;

    /// This replica's participant id.
    fn client_id(&self) -> ClientId;

    fn to_string(&self) -> String;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, index: usize, text: &str) -> Result<(), CrdtError>;

    fn delete(&self, index: usize, len: usize) -> Result<(), CrdtError>;

    /// Run `f` as one transaction. Observers see a single event when it
    /// commits. A nested call joins the enclosing transaction.
    fn transact<R>(&self, origin: Option<&str>, f: impl FnOnce(&Self) -> R) -> R;

    fn observe(&self, listener: Box<dyn Fn(&TextEvent)>) -> Subscription;

    /// Called before every transaction, local or imported, touches the
    /// document.
    fn on_before_transaction(&self, listener: Box<dyn Fn()>) -> Subscription;

    fn relative_position(&self, index: usize) -> Result<Self::Anchor, CrdtError>;

    fn absolute_position(&self, anchor: &Self::Anchor) -> Option<AbsolutePosition<Self::Owner>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumed() {
        let ops = [Delta::Retain(3), Delta::Insert("xy".into()), Delta::Delete(2)];
        assert_eq!(ops.iter().map(Delta::consumed).sum::<usize>(), 5);
    }
}
