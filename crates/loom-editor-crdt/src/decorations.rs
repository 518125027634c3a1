//! Remote selection rendering.
//!
//! Every render recomputes the full decoration set from the presence
//! states and swaps it in with one `delta_decorations` call per view.

use std::cell::RefCell;
use std::rc::Rc;

use loom_editor_core::{
    BufferModel, DecorationId, DecorationOptions, EditorView, ModelDecoration, Range,
};
use smol_str::{SmolStr, format_smolstr};

use crate::anchor::resolve_owned;
use crate::config::BindingOptions;
use crate::presence::{Presence, UserInfo};
use crate::shared::{ClientId, SharedText};

/// Another participant's selection, resolved to offsets in the shared text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSelection {
    pub client_id: ClientId,
    pub anchor: usize,
    pub head: usize,
    pub user: Option<UserInfo>,
}

impl RemoteSelection {
    /// `(start, end)` in ascending order.
    pub fn span(&self) -> (usize, usize) {
        (self.anchor.min(self.head), self.anchor.max(self.head))
    }

    /// The head sits at the end of the span.
    pub fn head_at_end(&self) -> bool {
        self.anchor < self.head
    }
}

/// Resolve every remote participant's selection against `text`.
///
/// Skips the local participant, states without a complete selection, and
/// anchors that do not resolve into `text`.
pub fn remote_selections<T, P>(text: &T, presence: &P) -> Vec<RemoteSelection>
where
    T: SharedText,
    P: Presence<T::Anchor> + ?Sized,
{
    let local = text.client_id();
    presence
        .states()
        .into_iter()
        .filter(|(client, _)| *client != local)
        .filter_map(|(client_id, state)| {
            let selection = state.selection?;
            let anchor = resolve_owned(text, selection.anchor.as_ref()?)?;
            let head = resolve_owned(text, selection.head.as_ref()?)?;
            Some(RemoteSelection {
                client_id,
                anchor,
                head,
                user: state.user,
            })
        })
        .collect()
}

/// One decoration per remote selection, in buffer coordinates.
pub fn build_decorations<M: BufferModel + ?Sized>(
    model: &M,
    selections: &[RemoteSelection],
    options: &BindingOptions,
) -> Vec<ModelDecoration> {
    selections
        .iter()
        .map(|sel| {
            let (start, end) = sel.span();
            let range = Range::from_positions(model.position_at(start), model.position_at(end));
            let head_class = Some(client_class(&options.head_class_name, sel.client_id));
            let (before, after) = if sel.head_at_end() {
                (None, head_class)
            } else {
                (head_class, None)
            };
            ModelDecoration::new(
                range,
                DecorationOptions {
                    class_name: Some(client_class(&options.selection_class_name, sel.client_id)),
                    before_content_class_name: before,
                    after_content_class_name: after,
                    color: sel.user.as_ref().and_then(|u| u.color),
                    hover_message: sel.user.as_ref().map(|u| u.name.clone()),
                },
            )
        })
        .collect()
}

/// `"base base-<client>"`, so hosts can style one participant.
fn client_class(base: &str, client: ClientId) -> SmolStr {
    format_smolstr!("{base} {base}-{client}")
}

/// Decoration handles per view slot.
#[derive(Default)]
pub struct PresenceRenderer {
    handles: RefCell<Vec<Option<Vec<DecorationId>>>>,
}

impl PresenceRenderer {
    pub fn new(slots: usize) -> Self {
        Self {
            handles: RefCell::new(vec![None; slots]),
        }
    }

    /// Recompute decorations for every view showing `model`.
    ///
    /// Views showing another buffer keep whatever they have; their handles
    /// are forgotten.
    pub fn render<T, M, P>(
        &self,
        views: &[Rc<dyn EditorView>],
        model: &M,
        text: &T,
        presence: Option<&P>,
        options: &BindingOptions,
    ) where
        T: SharedText,
        M: BufferModel + ?Sized,
        P: Presence<T::Anchor> + ?Sized,
    {
        let mut decorations: Option<Vec<ModelDecoration>> = None;
        for (slot, view) in views.iter().enumerate() {
            let shows_model = view.model_id() == Some(model.id());
            let Some(presence) = presence.filter(|_| shows_model) else {
                self.set_handles(slot, None);
                continue;
            };
            let new = decorations.get_or_insert_with(|| {
                build_decorations(model, &remote_selections(text, presence), options)
            });
            let old = self.take_handles(slot);
            let ids = view.delta_decorations(&old, new);
            self.set_handles(slot, Some(ids));
        }
        if let Some(decorations) = decorations {
            tracing::trace!(count = decorations.len(), "rendered remote selections");
        }
    }

    /// Remove every decoration this renderer placed.
    pub fn clear(&self, views: &[Rc<dyn EditorView>]) {
        for (slot, view) in views.iter().enumerate() {
            let old = self.take_handles(slot);
            if !old.is_empty() {
                view.delta_decorations(&old, &[]);
            }
        }
    }

    fn take_handles(&self, slot: usize) -> Vec<DecorationId> {
        self.handles
            .borrow_mut()
            .get_mut(slot)
            .and_then(Option::take)
            .unwrap_or_default()
    }

    fn set_handles(&self, slot: usize, ids: Option<Vec<DecorationId>>) {
        let mut handles = self.handles.borrow_mut();
        if slot >= handles.len() {
            handles.resize(slot + 1, None);
        }
        handles[slot] = ids;
    }
}
