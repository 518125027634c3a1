//! Selections expressed as relative positions in the shared text.
//!
//! Capturing a view's selection before a change and restoring it afterwards
//! keeps the caret attached to the same content even when the change lands
//! in front of it.

use loom_editor_core::{BufferModel, EditorView, Selection, SelectionDirection};

use crate::shared::SharedText;
use crate::CrdtError;

/// A selection whose endpoints are anchors into the shared text.
#[derive(Clone, Debug)]
pub struct RelativeSelection<A> {
    pub start: A,
    pub end: A,
    pub direction: SelectionDirection,
}

/// Anchor a buffer offset in the shared text.
pub fn anchor<T: SharedText>(text: &T, offset: usize) -> Result<T::Anchor, CrdtError> {
    text.relative_position(offset)
}

/// Resolve `anchor` to an index, but only if it points into `text` itself.
pub fn resolve_owned<T: SharedText>(text: &T, anchor: &T::Anchor) -> Option<usize> {
    let resolved = text.absolute_position(anchor)?;
    (resolved.owner == text.owner()).then_some(resolved.index)
}

/// Snapshot the view's selection as anchors. `None` if the view has no
/// selection or an endpoint cannot be anchored.
pub fn capture_relative_selection<T, M>(
    view: &dyn EditorView,
    model: &M,
    text: &T,
) -> Option<RelativeSelection<T::Anchor>>
where
    T: SharedText,
    M: BufferModel + ?Sized,
{
    let selection = view.selection()?;
    let start = model.offset_at(selection.start_position());
    let end = model.offset_at(selection.end_position());
    match (anchor(text, start), anchor(text, end)) {
        (Ok(start), Ok(end)) => Some(RelativeSelection {
            start,
            end,
            direction: selection.direction(),
        }),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "could not anchor selection");
            None
        }
    }
}

/// Turn a captured selection back into a buffer selection. `None` if either
/// end no longer resolves into this text.
pub fn restore_selection<T, M>(
    text: &T,
    model: &M,
    relative: &RelativeSelection<T::Anchor>,
) -> Option<Selection>
where
    T: SharedText,
    M: BufferModel + ?Sized,
{
    let start = resolve_owned(text, &relative.start)?;
    let end = resolve_owned(text, &relative.end)?;
    let start = model.position_at(start);
    let end = model.position_at(end);
    Some(Selection::create_with_direction(
        start.line_number,
        start.column,
        end.line_number,
        end.column,
        relative.direction,
    ))
}
