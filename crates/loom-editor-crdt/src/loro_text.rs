//! Loro-backed shared text.
//!
//! Loro delivers container diffs to `Send + Sync` subscribers. Those land in
//! a mutex-protected queue and are handed to our single-threaded observers
//! right after the commit or import that produced them.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use loom_editor_core::{Emitter, Subscription};
use loro::cursor::{Cursor, Side};
use loro::event::{Diff, DiffEvent};
use loro::{ContainerID, ContainerTrait, ExportMode, LoroDoc, LoroText, TextDelta, VersionVector};
use smol_str::SmolStr;

use crate::guard::ReentrancyGuard;
use crate::shared::{AbsolutePosition, ClientId, Delta, SharedText, TextEvent};
use crate::CrdtError;

/// Name of the text container inside the document.
pub const TEXT_CONTAINER: &str = "content";

type PendingDiffs = Arc<Mutex<Vec<Result<Vec<Delta>, CrdtError>>>>;

/// One text container of a `LoroDoc`, exposed as [`SharedText`].
///
/// Local mutations are committed at the end of each [`SharedText::transact`]
/// call; a bare `insert`/`delete` runs as its own transaction. Remote
/// changes arrive through [`LoroSharedText::import`].
pub struct LoroSharedText {
    doc: LoroDoc,
    text: LoroText,
    pending: PendingDiffs,
    queue: RefCell<VecDeque<TextEvent>>,
    dispatch_guard: ReentrancyGuard,
    depth: Cell<usize>,
    origin: RefCell<Option<SmolStr>>,
    observers: Emitter<TextEvent>,
    before_transaction: Emitter<()>,
    _diff_subscription: loro::Subscription,
}

impl LoroSharedText {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::from_doc(LoroDoc::new())
    }

    /// Create an empty document with a fixed peer id.
    pub fn with_peer_id(peer: ClientId) -> Result<Self, CrdtError> {
        let doc = LoroDoc::new();
        doc.set_peer_id(peer)?;
        Ok(Self::from_doc(doc))
    }

    /// Create a document from an existing Loro snapshot.
    pub fn from_snapshot(snapshot: &[u8]) -> Result<Self, CrdtError> {
        let doc = LoroDoc::new();
        doc.import(snapshot)
            .map_err(|e| CrdtError::Import(e.to_string()))?;
        Ok(Self::from_doc(doc))
    }

    /// Wrap an existing document. Its `"content"` text is the shared text.
    pub fn from_doc(doc: LoroDoc) -> Self {
        let text = doc.get_text(TEXT_CONTAINER);
        let pending: PendingDiffs = Arc::new(Mutex::new(Vec::new()));

        let sink = pending.clone();
        let diff_subscription = doc.subscribe(
            &text.id(),
            Arc::new(move |event: DiffEvent| {
                let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
                for container in &event.events {
                    match &container.diff {
                        Diff::Text(deltas) => sink.push(Ok(convert_deltas(deltas))),
                        _ => sink.push(Err(CrdtError::UnexpectedDiff(format!(
                            "non-text diff on {}",
                            container.target
                        )))),
                    }
                }
            }),
        );

        Self {
            doc,
            text,
            pending,
            queue: RefCell::new(VecDeque::new()),
            dispatch_guard: ReentrancyGuard::new(),
            depth: Cell::new(0),
            origin: RefCell::new(None),
            observers: Emitter::new(),
            before_transaction: Emitter::new(),
            _diff_subscription: diff_subscription,
        }
    }

    /// Get the underlying Loro document.
    pub fn doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Get the text container.
    pub fn text(&self) -> &LoroText {
        &self.text
    }

    /// Export full snapshot.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, CrdtError> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| CrdtError::Export(e.to_string()))
    }

    /// Export updates since given version.
    pub fn export_updates_since(&self, version: &VersionVector) -> Option<Vec<u8>> {
        let current_vv = self.doc.oplog_vv();

        if *version == current_vv {
            return None;
        }

        let updates = self
            .doc
            .export(ExportMode::Updates {
                from: Cow::Owned(version.clone()),
            })
            .ok()?;

        if updates.is_empty() {
            return None;
        }

        Some(updates)
    }

    /// Import remote changes. Observers see them as non-local events.
    pub fn import(&self, data: &[u8]) -> Result<(), CrdtError> {
        if self.depth.get() > 0 {
            return Err(CrdtError::Import(
                "cannot import inside a local transaction".into(),
            ));
        }
        self.before_transaction.emit(&());
        self.doc
            .import(data)
            .map_err(|e| CrdtError::Import(e.to_string()))?;
        self.flush_pending(None, false);
        Ok(())
    }

    /// Get current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    /// Move diffs collected by the loro subscriber to the event queue, then
    /// deliver them.
    fn flush_pending(&self, origin: Option<SmolStr>, local: bool) {
        let drained = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        {
            let mut queue = self.queue.borrow_mut();
            for diff in drained {
                match diff {
                    Ok(delta) if delta.is_empty() => {}
                    Ok(delta) => queue.push_back(TextEvent {
                        delta,
                        origin: origin.clone(),
                        local,
                    }),
                    Err(e) => {
                        tracing::error!(error = %e, "cannot interpret shared text change");
                        panic!("{e}");
                    }
                }
            }
        }
        self.dispatch();
    }

    /// Deliver queued events in order. A dispatch triggered from inside an
    /// observer leaves its events to the outer loop.
    fn dispatch(&self) {
        let Some(_lock) = self.dispatch_guard.try_acquire() else {
            return;
        };
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            tracing::trace!(
                ops = event.delta.len(),
                local = event.local,
                origin = ?event.origin,
                "text event"
            );
            self.observers.emit(&event);
        }
    }

    fn check_range(&self, offset: usize) -> Result<usize, CrdtError> {
        let len = self.text.len_unicode();
        if offset > len {
            return Err(CrdtError::OffsetOutOfRange { offset, len });
        }
        Ok(len)
    }
}

impl Default for LoroSharedText {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedText for LoroSharedText {
    type Anchor = Cursor;
    type Owner = ContainerID;

    fn owner(&self) -> ContainerID {
        self.text.id()
    }

    fn client_id(&self) -> ClientId {
        self.doc.peer_id()
    }

    fn to_string(&self) -> String {
        self.text.to_string()
    }

    fn len(&self) -> usize {
        self.text.len_unicode()
    }

    fn insert(&self, index: usize, text: &str) -> Result<(), CrdtError> {
        if self.depth.get() == 0 {
            return self.transact(None, |t| t.insert(index, text));
        }
        self.check_range(index)?;
        if text.is_empty() {
            return Ok(());
        }
        self.text.insert(index, text)?;
        Ok(())
    }

    fn delete(&self, index: usize, len: usize) -> Result<(), CrdtError> {
        if self.depth.get() == 0 {
            return self.transact(None, |t| t.delete(index, len));
        }
        self.check_range(index + len)?;
        if len == 0 {
            return Ok(());
        }
        self.text.delete(index, len)?;
        Ok(())
    }

    fn transact<R>(&self, origin: Option<&str>, f: impl FnOnce(&Self) -> R) -> R {
        if self.depth.get() > 0 {
            let _nested = DepthGuard::enter(&self.depth);
            return f(self);
        }

        self.before_transaction.emit(&());
        *self.origin.borrow_mut() = origin.map(SmolStr::new);
        let result = {
            let _outer = DepthGuard::enter(&self.depth);
            f(self)
        };
        self.doc.commit();
        let origin = self.origin.borrow_mut().take();
        self.flush_pending(origin, true);
        result
    }

    fn observe(&self, listener: Box<dyn Fn(&TextEvent)>) -> Subscription {
        self.observers.subscribe(listener)
    }

    fn on_before_transaction(&self, listener: Box<dyn Fn()>) -> Subscription {
        self.before_transaction.subscribe(move |_| listener())
    }

    fn relative_position(&self, index: usize) -> Result<Cursor, CrdtError> {
        let len = self.check_range(index)?;
        self.text
            .get_cursor(index, Side::default())
            .ok_or(CrdtError::OffsetOutOfRange { offset: index, len })
    }

    fn absolute_position(&self, anchor: &Cursor) -> Option<AbsolutePosition<ContainerID>> {
        let result = self.doc.get_cursor_pos(anchor).ok()?;
        Some(AbsolutePosition {
            owner: anchor.container.clone(),
            index: result.current.pos,
        })
    }
}

fn convert_deltas(deltas: &[TextDelta]) -> Vec<Delta> {
    deltas
        .iter()
        .map(|d| match d {
            TextDelta::Retain { retain, .. } => Delta::Retain(*retain),
            TextDelta::Insert { insert, .. } => Delta::Insert(insert.clone()),
            TextDelta::Delete { delete } => Delta::Delete(*delete),
        })
        .collect()
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn apply(base: &str, delta: &[Delta]) -> String {
        let chars: Vec<char> = base.chars().collect();
        let mut out = String::new();
        let mut index = 0;
        for op in delta {
            match op {
                Delta::Retain(n) => {
                    out.extend(&chars[index..index + n]);
                    index += n;
                }
                Delta::Insert(s) => out.push_str(s),
                Delta::Delete(n) => index += n,
            }
        }
        out.extend(&chars[index..]);
        out
    }

    fn record(text: &LoroSharedText) -> (Rc<RefCell<Vec<TextEvent>>>, Subscription) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let sub = text.observe(Box::new(move |e| sink.borrow_mut().push(e.clone())));
        (events, sub)
    }

    fn sync(from: &LoroSharedText, to: &LoroSharedText) {
        let bytes = from
            .export_updates_since(&to.version())
            .expect("peer is behind");
        to.import(&bytes).unwrap();
    }

    #[test]
    fn test_insert_and_delete() {
        let text = LoroSharedText::new();
        text.insert(0, "hello world").unwrap();
        text.delete(5, 6).unwrap();
        assert_eq!(SharedText::to_string(&text), "hello");
        assert_eq!(text.len(), 5);
    }

    #[test]
    fn test_out_of_range() {
        let text = LoroSharedText::new();
        text.insert(0, "abc").unwrap();
        assert!(matches!(
            text.insert(4, "x"),
            Err(CrdtError::OffsetOutOfRange { offset: 4, len: 3 })
        ));
        assert!(matches!(
            text.delete(2, 2),
            Err(CrdtError::OffsetOutOfRange { .. })
        ));
        assert!(text.relative_position(3).is_ok());
        assert!(text.relative_position(4).is_err());
    }

    #[test]
    fn test_transaction_emits_one_event() {
        let text = LoroSharedText::new();
        text.insert(0, "abcd").unwrap();
        let (events, _sub) = record(&text);

        text.transact(Some("local-edit"), |t| {
            t.insert(3, "Z").unwrap();
            t.delete(0, 1).unwrap();
        });

        assert_eq!(SharedText::to_string(&text), "bcZd");
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(events[0].local);
        assert_eq!(events[0].origin.as_deref(), Some("local-edit"));
        assert_eq!(apply("abcd", &events[0].delta), "bcZd");
    }

    #[test]
    fn test_nested_transaction_joins_outer() {
        let text = LoroSharedText::new();
        let (events, _sub) = record(&text);
        text.transact(None, |t| {
            t.insert(0, "a").unwrap();
            t.transact(Some("ignored"), |t| t.insert(1, "b").unwrap());
            assert!(events.borrow().is_empty());
        });
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].origin, None);
    }

    #[test]
    fn test_before_transaction_fires_first() {
        let text = Rc::new(LoroSharedText::new());
        let seen_len = Rc::new(Cell::new(usize::MAX));
        let weak_text = Rc::downgrade(&text);
        let sink = seen_len.clone();
        let _sub = text.on_before_transaction(Box::new(move || {
            if let Some(text) = weak_text.upgrade() {
                sink.set(text.len());
            }
        }));

        text.insert(0, "abc").unwrap();
        assert_eq!(seen_len.get(), 0);
        text.insert(3, "d").unwrap();
        assert_eq!(seen_len.get(), 3);
    }

    #[test]
    fn test_import_is_remote() {
        let a = LoroSharedText::with_peer_id(1).unwrap();
        let b = LoroSharedText::with_peer_id(2).unwrap();
        let (events, _sub) = record(&b);

        a.insert(0, "shared").unwrap();
        sync(&a, &b);

        assert_eq!(SharedText::to_string(&b), "shared");
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(!events[0].local);
        assert_eq!(events[0].origin, None);
        assert_eq!(apply("", &events[0].delta), "shared");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let a = LoroSharedText::new();
        a.insert(0, "snapshot me").unwrap();
        let b = LoroSharedText::from_snapshot(&a.export_snapshot().unwrap()).unwrap();
        assert_eq!(SharedText::to_string(&b), "snapshot me");
        assert!(a.export_updates_since(&a.version()).is_none());
    }

    #[test]
    fn test_relative_position_follows_remote_insert() {
        let a = LoroSharedText::with_peer_id(1).unwrap();
        let b = LoroSharedText::with_peer_id(2).unwrap();
        a.insert(0, "abc").unwrap();
        sync(&a, &b);

        let anchor = b.relative_position(2).unwrap();
        a.insert(0, "XY").unwrap();
        sync(&a, &b);

        let resolved = b.absolute_position(&anchor).unwrap();
        assert_eq!(resolved.owner, b.owner());
        assert_eq!(resolved.index, 4);
    }

    #[test]
    fn test_nested_events_are_queued_in_order() {
        let text = Rc::new(LoroSharedText::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&text);
        let sink = order.clone();
        let _sub = text.observe(Box::new(move |e| {
            sink.borrow_mut().push(apply("", &e.delta[..1]));
            // the first event triggers a second transaction from inside dispatch
            if sink.borrow().len() == 1 {
                if let Some(text) = weak.upgrade() {
                    text.insert(0, "second").unwrap();
                }
            }
        }));

        text.insert(0, "first").unwrap();
        assert_eq!(*order.borrow(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_client_id() {
        let text = LoroSharedText::with_peer_id(42).unwrap();
        assert_eq!(text.client_id(), 42);
    }
}
