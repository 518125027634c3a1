//! Editable text buffer abstraction.
//!
//! The `BufferModel` trait is the local side of a binding: a line/column
//! addressed buffer that reports every content change. Offsets are in
//! Unicode scalar values (chars), not bytes or UTF-16 units.

use std::cell::{Cell, RefCell};
use std::ops::Range as CharRange;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::{SmolStr, ToSmolStr};

use crate::error::ModelError;
use crate::event::{Emitter, Subscription};
use crate::position::Position;
use crate::range::Range;

/// Process-unique buffer identifier.
///
/// Views report the id of the buffer they show, which is how a binding
/// decides whether a view is currently displaying its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ModelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Replace `range` with `text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditOperation {
    pub range: Range,
    pub text: String,
}

impl EditOperation {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    /// Insert `text` at `position`.
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::new(Range::at(position), text)
    }

    /// Remove the text covered by `range`.
    pub fn delete(range: Range) -> Self {
        Self::new(range, String::new())
    }
}

/// One replaced span inside a [`ContentChangedEvent`].
///
/// `range`, `range_offset` and `range_length` describe the replaced span in
/// the buffer as it was before the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentChange {
    pub range: Range,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

/// Everything that changed in one `apply_edits`/`set_value` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentChangedEvent {
    /// Changes sorted by descending `range_offset`.
    pub changes: Vec<ContentChange>,
    pub version_id: u64,
    /// The whole content was replaced.
    pub is_flush: bool,
}

/// A line/column addressed text buffer.
///
/// Methods take `&self`: implementations use interior mutability because
/// change listeners routinely call back into the buffer.
pub trait BufferModel {
    fn id(&self) -> ModelId;

    /// Full text.
    fn value(&self) -> String;

    /// Replace the full text. Emits a flush change event.
    fn set_value(&self, text: &str);

    /// Char offset of `position`, clamped to the buffer.
    fn offset_at(&self, position: Position) -> usize;

    /// Position of char offset `offset`, clamped to the buffer.
    fn position_at(&self, offset: usize) -> Position;

    /// Apply a batch of non-overlapping edits as one change event.
    fn apply_edits(&self, edits: &[EditOperation]) -> Result<(), ModelError>;

    fn on_did_change_content(
        &self,
        listener: Box<dyn Fn(&ContentChangedEvent)>,
    ) -> Subscription;

    /// Called once, right before the buffer is disposed.
    fn on_will_dispose(&self, listener: Box<dyn Fn()>) -> Subscription;
}

/// Ropey-backed buffer.
pub struct RopeModel {
    id: ModelId,
    rope: RefCell<ropey::Rope>,
    version_id: Cell<u64>,
    disposed: Cell<bool>,
    content_changed: Emitter<ContentChangedEvent>,
    will_dispose: Emitter<()>,
}

impl RopeModel {
    pub fn new() -> Self {
        Self::from_str("")
    }

    pub fn from_str(s: &str) -> Self {
        Self {
            id: ModelId::next(),
            rope: RefCell::new(ropey::Rope::from_str(s)),
            version_id: Cell::new(1),
            disposed: Cell::new(false),
            content_changed: Emitter::new(),
            will_dispose: Emitter::new(),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.rope.borrow().len_chars()
    }

    /// Number of lines. An empty buffer has one line.
    pub fn line_count(&self) -> usize {
        self.rope.borrow().len_lines()
    }

    /// Text of a 1-based line without its line break.
    pub fn line_content(&self, line_number: u32) -> Option<SmolStr> {
        let rope = self.rope.borrow();
        let line_idx = (line_number as usize).checked_sub(1)?;
        if line_idx >= rope.len_lines() {
            return None;
        }
        let start = rope.line_to_char(line_idx);
        let len = line_content_len(&rope, line_idx);
        Some(rope.slice(start..start + len).to_smolstr())
    }

    /// Get a slice as SmolStr. Returns None if range is invalid.
    pub fn slice(&self, char_range: CharRange<usize>) -> Option<SmolStr> {
        let rope = self.rope.borrow();
        if char_range.start > char_range.end || char_range.end > rope.len_chars() {
            return None;
        }
        Some(rope.slice(char_range).to_smolstr())
    }

    pub fn version_id(&self) -> u64 {
        self.version_id.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Notify will-dispose listeners, then drop every listener.
    pub fn dispose(&self) {
        if self.disposed.get() {
            return;
        }
        self.will_dispose.emit(&());
        self.disposed.set(true);
        self.content_changed.clear();
        self.will_dispose.clear();
        tracing::debug!(model = self.id.get(), "buffer disposed");
    }

    fn bump_version(&self) -> u64 {
        let next = self.version_id.get() + 1;
        self.version_id.set(next);
        next
    }
}

impl Default for RopeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RopeModel {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl BufferModel for RopeModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn value(&self) -> String {
        self.rope.borrow().to_string()
    }

    fn set_value(&self, text: &str) {
        if self.disposed.get() {
            return;
        }
        let change = {
            let mut rope = self.rope.borrow_mut();
            let old_len = rope.len_chars();
            let old_end = position_in(&rope, old_len);
            *rope = ropey::Rope::from_str(text);
            ContentChange {
                range: Range::from_positions(Position::new(1, 1), old_end),
                range_offset: 0,
                range_length: old_len,
                text: text.to_string(),
            }
        };
        let version_id = self.bump_version();
        self.content_changed.emit(&ContentChangedEvent {
            changes: vec![change],
            version_id,
            is_flush: true,
        });
    }

    fn offset_at(&self, position: Position) -> usize {
        offset_in(&self.rope.borrow(), position)
    }

    fn position_at(&self, offset: usize) -> Position {
        position_in(&self.rope.borrow(), offset)
    }

    fn apply_edits(&self, edits: &[EditOperation]) -> Result<(), ModelError> {
        if self.disposed.get() {
            return Err(ModelError::Disposed);
        }

        let mut changes: Vec<ContentChange> = {
            let rope = self.rope.borrow();
            edits
                .iter()
                .map(|edit| {
                    let start = offset_in(&rope, edit.range.start_position());
                    let end = offset_in(&rope, edit.range.end_position());
                    ContentChange {
                        range: Range::from_positions(
                            position_in(&rope, start),
                            position_in(&rope, end),
                        ),
                        range_offset: start,
                        range_length: end - start,
                        text: edit.text.clone(),
                    }
                })
                .filter(|c| c.range_length > 0 || !c.text.is_empty())
                .collect()
        };
        if changes.is_empty() {
            return Ok(());
        }

        // Descending order: applying a later span never shifts an earlier one.
        changes.sort_by(|a, b| b.range_offset.cmp(&a.range_offset));
        for pair in changes.windows(2) {
            let (later, earlier) = (&pair[0], &pair[1]);
            if earlier.range_offset + earlier.range_length > later.range_offset {
                return Err(ModelError::OverlappingEdits(earlier.range, later.range));
            }
        }

        {
            let mut rope = self.rope.borrow_mut();
            for change in &changes {
                let start = change.range_offset;
                if change.range_length > 0 {
                    rope.remove(start..start + change.range_length);
                }
                if !change.text.is_empty() {
                    rope.insert(start, &change.text);
                }
            }
        }

        let version_id = self.bump_version();
        tracing::trace!(
            model = self.id.get(),
            version_id,
            changes = changes.len(),
            "buffer edited"
        );
        self.content_changed.emit(&ContentChangedEvent {
            changes,
            version_id,
            is_flush: false,
        });
        Ok(())
    }

    fn on_did_change_content(
        &self,
        listener: Box<dyn Fn(&ContentChangedEvent)>,
    ) -> Subscription {
        if self.disposed.get() {
            return Subscription::empty();
        }
        self.content_changed.subscribe(listener)
    }

    fn on_will_dispose(&self, listener: Box<dyn Fn()>) -> Subscription {
        if self.disposed.get() {
            return Subscription::empty();
        }
        self.will_dispose.subscribe(move |_| listener())
    }
}

/// Length of a line without its trailing line break.
fn line_content_len(rope: &ropey::Rope, line_idx: usize) -> usize {
    let start = rope.line_to_char(line_idx);
    if line_idx + 1 >= rope.len_lines() {
        return rope.len_chars() - start;
    }
    let mut end = rope.line_to_char(line_idx + 1);
    if end > start && rope.char(end - 1) == '\n' {
        end -= 1;
        if end > start && rope.char(end - 1) == '\r' {
            end -= 1;
        }
    } else if end > start {
        // any other single-char break ropey recognizes
        end -= 1;
    }
    end - start
}

/// Columns a position may address on a line. One past the content end is
/// the usual end-of-line column; a CRLF line also exposes the offset between
/// `\r` and `\n`, since shared-text edits address raw chars.
fn line_addressable_len(rope: &ropey::Rope, line_idx: usize) -> usize {
    let len = line_content_len(rope, line_idx);
    let start = rope.line_to_char(line_idx);
    let crlf = start + len + 1 < rope.len_chars()
        && rope.char(start + len) == '\r'
        && rope.char(start + len + 1) == '\n';
    if crlf {
        len + 1
    } else {
        len
    }
}

fn offset_in(rope: &ropey::Rope, position: Position) -> usize {
    let last_line = rope.len_lines().saturating_sub(1);
    let line_idx = (position.line_number.max(1) as usize - 1).min(last_line);
    let column_idx =
        (position.column.max(1) as usize - 1).min(line_addressable_len(rope, line_idx));
    rope.line_to_char(line_idx) + column_idx
}

fn position_in(rope: &ropey::Rope, offset: usize) -> Position {
    let offset = offset.min(rope.len_chars());
    let line_idx = rope.char_to_line(offset);
    // inside a CRLF pair the column runs one past the line content
    let column_idx = offset - rope.line_to_char(line_idx);
    Position::new(line_idx as u32 + 1, column_idx as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::rc::Rc;

    #[test]
    fn test_position_at() {
        let model = RopeModel::from_str("ab\ncde\n\nf");
        assert_eq!(model.position_at(0), Position::new(1, 1));
        assert_eq!(model.position_at(2), Position::new(1, 3));
        assert_eq!(model.position_at(3), Position::new(2, 1));
        assert_eq!(model.position_at(6), Position::new(2, 4));
        assert_eq!(model.position_at(7), Position::new(3, 1));
        assert_eq!(model.position_at(8), Position::new(4, 1));
        assert_eq!(model.position_at(9), Position::new(4, 2));
        // clamped
        assert_eq!(model.position_at(100), Position::new(4, 2));
    }

    #[test]
    fn test_offset_at_clamps() {
        let model = RopeModel::from_str("ab\ncde");
        assert_eq!(model.offset_at(Position::new(1, 1)), 0);
        assert_eq!(model.offset_at(Position::new(2, 2)), 4);
        assert_eq!(model.offset_at(Position::new(1, 50)), 2);
        assert_eq!(model.offset_at(Position::new(9, 1)), 3);
        assert_eq!(model.offset_at(Position::new(0, 0)), 0);
    }

    #[test]
    fn test_crlf_lines() {
        let model = RopeModel::from_str("ab\r\ncd");
        assert_eq!(model.line_count(), 2);
        assert_eq!(model.line_content(1).as_deref(), Some("ab"));
        assert_eq!(model.position_at(4), Position::new(2, 1));
        assert_eq!(model.offset_at(Position::new(1, 3)), 2);
        assert_eq!(model.offset_at(Position::new(2, 1)), 4);
    }

    #[test]
    fn test_offset_between_cr_and_lf() {
        let model = RopeModel::from_str("a\r\nb");
        let between = model.position_at(2);
        assert_eq!(between, Position::new(1, 3));
        assert_eq!(model.offset_at(between), 2);
        // end of content is still a distinct position
        assert_eq!(model.position_at(1), Position::new(1, 2));
        // past the pair clamps to the offset before the LF
        assert_eq!(model.offset_at(Position::new(1, 50)), 2);

        model
            .apply_edits(&[EditOperation::insert(between, "X")])
            .unwrap();
        assert_eq!(model.value(), "a\rX\nb");

        let model = RopeModel::from_str("a\r\nb");
        model
            .apply_edits(&[EditOperation::delete(Range::from_positions(
                model.position_at(1),
                model.position_at(2),
            ))])
            .unwrap();
        assert_eq!(model.value(), "a\nb");
    }

    #[test]
    fn test_offset_position_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        let alphabet = ['a', 'b', ' ', '\n', '\r', 'é', '🌍'];
        for _ in 0..200 {
            let len = rng.gen_range(0..40);
            let text: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let model = RopeModel::from_str(&text);

            for offset in 0..=model.len_chars() {
                let position = model.position_at(offset);
                assert_eq!(model.offset_at(position), offset, "{text:?} @ {offset}");
                assert_eq!(model.position_at(model.offset_at(position)), position);
            }
        }
    }

    #[test]
    fn test_apply_single_edit() {
        let model = RopeModel::from_str("hello world");
        model
            .apply_edits(&[EditOperation::new(Range::new(1, 7, 1, 12), "rust")])
            .unwrap();
        assert_eq!(model.value(), "hello rust");
        assert_eq!(model.version_id(), 2);
    }

    #[test]
    fn test_apply_edits_emits_one_event_in_descending_order() {
        let model = RopeModel::from_str("abcd");
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let _sub = model.on_did_change_content(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        model
            .apply_edits(&[
                EditOperation::delete(Range::new(1, 1, 1, 2)),
                EditOperation::insert(Position::new(1, 4), "Z"),
            ])
            .unwrap();

        assert_eq!(model.value(), "bcZd");
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        let offsets: Vec<_> = events[0]
            .changes
            .iter()
            .map(|c| (c.range_offset, c.range_length, c.text.as_str()))
            .collect();
        assert_eq!(offsets, vec![(3, 0, "Z"), (0, 1, "")]);
        assert!(!events[0].is_flush);
    }

    #[test]
    fn test_overlapping_edits_rejected() {
        let model = RopeModel::from_str("abcdef");
        let err = model
            .apply_edits(&[
                EditOperation::delete(Range::new(1, 1, 1, 4)),
                EditOperation::delete(Range::new(1, 3, 1, 5)),
            ])
            .unwrap_err();
        assert!(matches!(err, ModelError::OverlappingEdits(..)));
        assert_eq!(model.value(), "abcdef");
    }

    #[test]
    fn test_noop_edits_emit_nothing() {
        let model = RopeModel::from_str("abc");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _sub = model.on_did_change_content(Box::new(move |_| c.set(c.get() + 1)));

        model
            .apply_edits(&[EditOperation::insert(Position::new(1, 2), "")])
            .unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_set_value_is_flush() {
        let model = RopeModel::from_str("old\ntext");
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let _sub = model.on_did_change_content(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        model.set_value("new");
        assert_eq!(model.value(), "new");

        let events = events.borrow();
        assert!(events[0].is_flush);
        assert_eq!(events[0].changes[0].range, Range::new(1, 1, 2, 5));
        assert_eq!(events[0].changes[0].range_length, 8);
    }

    #[test]
    fn test_dispose_notifies_once() {
        let model = RopeModel::from_str("x");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _sub = model.on_will_dispose(Box::new(move || c.set(c.get() + 1)));

        model.dispose();
        model.dispose();
        assert_eq!(count.get(), 1);
        assert!(model.is_disposed());
        assert_eq!(
            model.apply_edits(&[EditOperation::insert(Position::new(1, 1), "y")]),
            Err(ModelError::Disposed)
        );
    }

    #[test]
    fn test_slice() {
        let model = RopeModel::from_str("hello world");
        assert_eq!(model.slice(0..5).as_deref(), Some("hello"));
        assert_eq!(model.slice(6..11).as_deref(), Some("world"));
        assert_eq!(model.slice(0..100), None);
    }

    #[test]
    fn test_model_ids_are_unique() {
        assert_ne!(RopeModel::new().id(), RopeModel::new().id());
    }
}
