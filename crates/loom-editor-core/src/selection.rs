//! Directional selections on top of [`Range`].

use std::fmt;

use crate::position::Position;
use crate::range::Range;

/// Which way a selection was made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SelectionDirection {
    /// The anchor is at the range start; the caret is at the end.
    #[default]
    Forward,
    /// The anchor is at the range end; the caret is at the start.
    Backward,
}

/// A range that remembers where it started (anchor) and where the caret is
/// (position/head).
///
/// The anchor and head may be in any order. `range()` is always normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Selection {
    range: Range,
    selection_start: Position,
    position: Position,
    direction: SelectionDirection,
}

impl Selection {
    pub fn new(
        selection_start_line_number: u32,
        selection_start_column: u32,
        position_line_number: u32,
        position_column: u32,
    ) -> Self {
        Self::from_positions(
            Position::new(selection_start_line_number, selection_start_column),
            Position::new(position_line_number, position_column),
        )
    }

    /// Selection from anchor to head.
    pub fn from_positions(anchor: Position, head: Position) -> Self {
        let range = Range::from_positions(anchor, head);
        let direction = if anchor == range.start_position() {
            SelectionDirection::Forward
        } else {
            SelectionDirection::Backward
        };
        Self {
            range,
            selection_start: anchor,
            position: head,
            direction,
        }
    }

    /// Collapsed selection (a caret) at `position`.
    pub fn caret(position: Position) -> Self {
        Self::from_positions(position, position)
    }

    /// Selection over `start..end` whose anchor sits according to `direction`.
    pub fn create_with_direction(
        start_line_number: u32,
        start_column: u32,
        end_line_number: u32,
        end_column: u32,
        direction: SelectionDirection,
    ) -> Self {
        match direction {
            SelectionDirection::Forward => {
                Self::new(start_line_number, start_column, end_line_number, end_column)
            }
            SelectionDirection::Backward => {
                Self::new(end_line_number, end_column, start_line_number, start_column)
            }
        }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn start_position(&self) -> Position {
        self.range.start_position()
    }

    pub fn end_position(&self) -> Position {
        self.range.end_position()
    }

    /// The anchor.
    pub fn selection_start(&self) -> Position {
        self.selection_start
    }

    /// The caret/head.
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> SelectionDirection {
        self.direction
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Replace the range end, keeping the current direction.
    ///
    /// For a forward selection this moves the caret; for a backward one it
    /// moves the anchor.
    pub fn set_end_position(&self, end_line_number: u32, end_column: u32) -> Selection {
        let start = self.range.start_position();
        match self.direction {
            SelectionDirection::Forward => Selection::new(
                start.line_number,
                start.column,
                end_line_number,
                end_column,
            ),
            SelectionDirection::Backward => Selection::new(
                end_line_number,
                end_column,
                start.line_number,
                start.column,
            ),
        }
    }

    /// Replace the range start, keeping the current direction.
    ///
    /// For a forward selection this moves the anchor; for a backward one it
    /// moves the caret.
    pub fn set_start_position(&self, start_line_number: u32, start_column: u32) -> Selection {
        let end = self.range.end_position();
        match self.direction {
            SelectionDirection::Forward => Selection::new(
                start_line_number,
                start_column,
                end.line_number,
                end.column,
            ),
            SelectionDirection::Backward => Selection::new(
                end.line_number,
                end.column,
                start_line_number,
                start_column,
            ),
        }
    }

    /// Anchor and head both match.
    pub fn selections_equal(a: &Selection, b: &Selection) -> bool {
        a.selection_start == b.selection_start && a.position == b.position
    }

    /// Element-wise [`Selection::selections_equal`]. Two absent lists are equal.
    pub fn selections_arr_equal(a: Option<&[Selection]>, b: Option<&[Selection]>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|(x, y)| Selection::selections_equal(x, y))
            }
            _ => false,
        }
    }
}

impl From<Selection> for Range {
    fn from(selection: Selection) -> Self {
        selection.range
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.selection_start.line_number,
            self.selection_start.column,
            self.position.line_number,
            self.position.column
        )
    }
}
