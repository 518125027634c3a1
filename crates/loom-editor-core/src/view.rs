//! Views over a buffer.
//!
//! A view shows at most one buffer at a time, owns a selection, and draws
//! decorations. Bindings never hold on to a view's buffer; they compare
//! [`EditorView::model_id`] against their own buffer's id instead.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::decoration::{DecorationId, ModelDecoration};
use crate::event::{Emitter, Subscription};
use crate::model::ModelId;
use crate::range::Range;
use crate::selection::Selection;

/// Payload of a cursor/selection change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorSelectionChangedEvent {
    pub selection: Selection,
}

pub trait EditorView {
    /// Buffer currently shown, if any.
    fn model_id(&self) -> Option<ModelId>;

    /// Primary selection, if the view has one.
    fn selection(&self) -> Option<Selection>;

    fn set_selection(&self, selection: Selection);

    fn on_did_change_cursor_selection(
        &self,
        listener: Box<dyn Fn(&CursorSelectionChangedEvent)>,
    ) -> Subscription;

    /// Remove the decorations in `old` and add `new`, returning the handles
    /// of the added ones in order. Unknown handles in `old` are ignored.
    fn delta_decorations(
        &self,
        old: &[DecorationId],
        new: &[ModelDecoration],
    ) -> Vec<DecorationId>;
}

/// A view with no UI behind it. Selection and decorations live in memory.
#[derive(Default)]
pub struct HeadlessView {
    model: Cell<Option<ModelId>>,
    selection: Cell<Option<Selection>>,
    decorations: RefCell<BTreeMap<DecorationId, ModelDecoration>>,
    next_decoration: Cell<u64>,
    cursor_changed: Emitter<CursorSelectionChangedEvent>,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view already showing `model`.
    pub fn with_model(model: ModelId) -> Self {
        let view = Self::default();
        view.model.set(Some(model));
        view
    }

    /// Switch the shown buffer. The selection does not survive the switch.
    pub fn set_model(&self, model: Option<ModelId>) {
        if self.model.get() != model {
            self.model.set(model);
            self.selection.set(None);
        }
    }

    /// Live decorations ordered by range start.
    pub fn decorations(&self) -> Vec<ModelDecoration> {
        let mut out: Vec<ModelDecoration> = self.decorations.borrow().values().cloned().collect();
        out.sort_by(|a, b| Range::compare_ranges_using_starts(Some(&a.range), Some(&b.range)));
        out
    }

    pub fn decoration_count(&self) -> usize {
        self.decorations.borrow().len()
    }
}

impl EditorView for HeadlessView {
    fn model_id(&self) -> Option<ModelId> {
        self.model.get()
    }

    fn selection(&self) -> Option<Selection> {
        self.selection.get()
    }

    fn set_selection(&self, selection: Selection) {
        self.selection.set(Some(selection));
        self.cursor_changed
            .emit(&CursorSelectionChangedEvent { selection });
    }

    fn on_did_change_cursor_selection(
        &self,
        listener: Box<dyn Fn(&CursorSelectionChangedEvent)>,
    ) -> Subscription {
        self.cursor_changed.subscribe(listener)
    }

    fn delta_decorations(
        &self,
        old: &[DecorationId],
        new: &[ModelDecoration],
    ) -> Vec<DecorationId> {
        let mut decorations = self.decorations.borrow_mut();
        for id in old {
            decorations.remove(id);
        }
        new.iter()
            .map(|decoration| {
                let id = DecorationId(self.next_decoration.get());
                self.next_decoration.set(id.0 + 1);
                decorations.insert(id, decoration.clone());
                id
            })
            .collect()
    }
}
