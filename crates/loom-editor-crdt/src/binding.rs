//! Two-way binding between a shared text and a local buffer.
//!
//! Local buffer edits become shared-text transactions; committed shared-text
//! changes are replayed onto the buffer. A single [`ReentrancyGuard`] keeps
//! either direction from echoing back into the other. Views showing the
//! buffer keep their selections across remote edits, and other participants'
//! selections are drawn as decorations when a presence channel is given.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use loom_editor_core::{
    BufferModel, ContentChangedEvent, CursorSelectionChangedEvent, EditOperation, EditorView,
    Range, SelectionDirection, Subscription,
};

use crate::anchor::{RelativeSelection, capture_relative_selection, restore_selection};
use crate::config::BindingOptions;
use crate::decorations::PresenceRenderer;
use crate::guard::ReentrancyGuard;
use crate::presence::{Presence, PresenceChange, PresenceSelection};
use crate::shared::{Delta, SharedText, TextEvent};
use crate::CrdtError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Attached,
    Detached,
}

/// Keeps `text` and `model` in sync until detached or dropped.
pub struct TextBinding<T, M, P>
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    inner: Rc<BindingInner<T, M, P>>,
}

struct BindingInner<T, M, P>
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    text: Rc<T>,
    model: Rc<M>,
    views: Vec<Rc<dyn EditorView>>,
    presence: Option<Rc<P>>,
    options: BindingOptions,
    guard: ReentrancyGuard,
    /// Selections captured before the current transaction, by view slot.
    saved: RefCell<BTreeMap<usize, RelativeSelection<T::Anchor>>>,
    renderer: PresenceRenderer,
    subscriptions: RefCell<Vec<Subscription>>,
    state: Cell<BindingState>,
}

impl<T, M, P> TextBinding<T, M, P>
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    /// Bind `text` to `model`.
    ///
    /// The buffer content is replaced with the shared text. `views` are the
    /// views that may show `model`; their position in the list is their slot.
    pub fn attach(
        text: Rc<T>,
        model: Rc<M>,
        views: Vec<Rc<dyn EditorView>>,
        presence: Option<Rc<P>>,
        options: BindingOptions,
    ) -> Self {
        let inner = Rc::new(BindingInner {
            renderer: PresenceRenderer::new(views.len()),
            text,
            model,
            views,
            presence,
            options,
            guard: ReentrancyGuard::new(),
            saved: RefCell::new(BTreeMap::new()),
            subscriptions: RefCell::new(Vec::new()),
            state: Cell::new(BindingState::Attached),
        });
        let weak = Rc::downgrade(&inner);
        let mut subscriptions = Vec::new();

        let before = with_inner(&weak, |inner, _: &()| inner.save_selections());
        subscriptions.push(inner.text.on_before_transaction(Box::new(move || before(&()))));
        subscriptions.push(inner.text.observe(Box::new(with_inner(
            &weak,
            |inner, event: &TextEvent| inner.apply_text_event(event),
        ))));

        inner.model.set_value(&SharedText::to_string(&*inner.text));

        subscriptions.push(inner.model.on_did_change_content(Box::new(with_inner(
            &weak,
            |inner, event: &ContentChangedEvent| inner.apply_model_change(event),
        ))));
        let will_dispose = with_inner(&weak, |inner, _: &()| inner.detach());
        subscriptions.push(inner.model.on_will_dispose(Box::new(move || will_dispose(&()))));

        if let Some(presence) = &inner.presence {
            if inner.options.broadcast_selection {
                for slot in 0..inner.views.len() {
                    let view = &inner.views[slot];
                    subscriptions.push(view.on_did_change_cursor_selection(Box::new(with_inner(
                        &weak,
                        move |inner, event: &CursorSelectionChangedEvent| {
                            inner.broadcast_selection(slot, event)
                        },
                    ))));
                }
            }
            subscriptions.push(presence.on_change(Box::new(with_inner(
                &weak,
                |inner, _: &PresenceChange| inner.render(),
            ))));
        }

        *inner.subscriptions.borrow_mut() = subscriptions;
        inner.render();

        tracing::debug!(
            model = inner.model.id().get(),
            views = inner.views.len(),
            presence = inner.presence.is_some(),
            len = inner.text.len(),
            "binding attached"
        );
        Self { inner }
    }

    /// Stop syncing and remove this binding's decorations.
    ///
    /// Idempotent, and safe to call from inside any collaborator callback.
    pub fn detach(&self) {
        self.inner.detach();
    }

    pub fn state(&self) -> BindingState {
        self.inner.state.get()
    }

    pub fn is_attached(&self) -> bool {
        self.state() == BindingState::Attached
    }

    pub fn text(&self) -> &Rc<T> {
        &self.inner.text
    }

    pub fn model(&self) -> &Rc<M> {
        &self.inner.model
    }

    pub fn views(&self) -> &[Rc<dyn EditorView>] {
        &self.inner.views
    }
}

impl<T, M, P> Drop for TextBinding<T, M, P>
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    fn drop(&mut self) {
        self.inner.detach();
    }
}

/// Wrap a handler so it runs only while the binding is alive and attached.
fn with_inner<T, M, P, E: ?Sized + 'static>(
    weak: &Weak<BindingInner<T, M, P>>,
    handler: impl Fn(&BindingInner<T, M, P>, &E) + 'static,
) -> impl Fn(&E) + 'static
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    let weak = weak.clone();
    move |event: &E| {
        let Some(inner) = weak.upgrade() else { return };
        if inner.state.get() == BindingState::Detached {
            return;
        }
        handler(&inner, event);
    }
}

impl<T, M, P> BindingInner<T, M, P>
where
    T: SharedText + 'static,
    M: BufferModel + ?Sized + 'static,
    P: Presence<T::Anchor> + ?Sized + 'static,
{
    fn shows_model(&self, view: &dyn EditorView) -> bool {
        view.model_id() == Some(self.model.id())
    }

    fn save_selections(&self) {
        self.guard.run(|| {
            let mut saved = self.saved.borrow_mut();
            saved.clear();
            for (slot, view) in self.views.iter().enumerate() {
                if !self.shows_model(&**view) {
                    continue;
                }
                if let Some(relative) =
                    capture_relative_selection(&**view, &*self.model, &*self.text)
                {
                    saved.insert(slot, relative);
                }
            }
        });
    }

    fn apply_text_event(&self, event: &TextEvent) {
        self.guard.run(|| {
            tracing::trace!(ops = event.delta.len(), local = event.local, "applying text event to buffer");
            let mut index = 0;
            for op in &event.delta {
                match op {
                    Delta::Retain(n) => index += n,
                    Delta::Insert(inserted) => {
                        let at = self.model.position_at(index);
                        self.apply_edit(EditOperation::insert(at, inserted.as_str()));
                        index += inserted.chars().count();
                    }
                    Delta::Delete(n) => {
                        let start = self.model.position_at(index);
                        let end = self.model.position_at(index + n);
                        self.apply_edit(EditOperation::delete(Range::from_positions(start, end)));
                    }
                }
            }

            let saved = std::mem::take(&mut *self.saved.borrow_mut());
            for (slot, relative) in saved {
                let Some(view) = self.views.get(slot) else { continue };
                if !self.shows_model(&**view) {
                    continue;
                }
                if let Some(selection) = restore_selection(&*self.text, &*self.model, &relative) {
                    view.set_selection(selection);
                }
            }
        });
        self.render();
    }

    fn apply_edit(&self, edit: EditOperation) {
        if let Err(e) = self.model.apply_edits(std::slice::from_ref(&edit)) {
            tracing::error!(error = %e, range = %edit.range, "failed to apply shared text change to buffer");
        }
    }

    fn apply_model_change(&self, event: &ContentChangedEvent) {
        self.guard.run(|| {
            let mut changes: Vec<_> = event.changes.iter().collect();
            changes.sort_by(|a, b| b.range_offset.cmp(&a.range_offset));
            tracing::trace!(changes = changes.len(), flush = event.is_flush, "applying buffer change to shared text");

            let result = self.text.transact(Some(self.options.origin.as_str()), |text| {
                for change in changes {
                    text.delete(change.range_offset, change.range_length)?;
                    text.insert(change.range_offset, &change.text)?;
                }
                Ok::<(), CrdtError>(())
            });
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to apply buffer change to shared text");
            }
        });
    }

    fn broadcast_selection(&self, slot: usize, event: &CursorSelectionChangedEvent) {
        let Some(presence) = &self.presence else { return };
        let Some(view) = self.views.get(slot) else { return };
        if !self.shows_model(&**view) {
            return;
        }

        let selection = event.selection;
        let mut anchor = self.model.offset_at(selection.start_position());
        let mut head = self.model.offset_at(selection.end_position());
        if selection.direction() == SelectionDirection::Backward {
            std::mem::swap(&mut anchor, &mut head);
        }
        match (
            self.text.relative_position(anchor),
            self.text.relative_position(head),
        ) {
            (Ok(anchor), Ok(head)) => presence.set_local_selection(Some(PresenceSelection {
                anchor: Some(anchor),
                head: Some(head),
            })),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, slot, "could not publish local selection");
            }
        }
    }

    fn render(&self) {
        if self.state.get() == BindingState::Detached {
            return;
        }
        self.renderer.render(
            &self.views,
            &*self.model,
            &*self.text,
            self.presence.as_deref(),
            &self.options,
        );
    }

    fn detach(&self) {
        if self.state.replace(BindingState::Detached) == BindingState::Detached {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        drop(subscriptions);
        self.saved.borrow_mut().clear();
        self.renderer.clear(&self.views);
        tracing::debug!(model = self.model.id().get(), "binding detached");
    }
}
