//! Line/column ranges and their algebra.
//!
//! A [`Range`] is always normalized: its start is never after its end.
//! Every operation returns a new value; nothing mutates in place.

use std::cmp::Ordering;
use std::fmt;

use crate::position::Position;

/// A normalized span between two positions (both inclusive for containment).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    start: Position,
    end: Position,
}

impl Range {
    /// Create a range, swapping the endpoints if they are given reversed.
    pub fn new(
        start_line_number: u32,
        start_column: u32,
        end_line_number: u32,
        end_column: u32,
    ) -> Self {
        Self::from_positions(
            Position::new(start_line_number, start_column),
            Position::new(end_line_number, end_column),
        )
    }

    pub fn from_positions(a: Position, b: Position) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Empty range at a single position.
    pub fn at(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn start_line_number(&self) -> u32 {
        self.start.line_number
    }

    pub fn start_column(&self) -> u32 {
        self.start.column
    }

    pub fn end_line_number(&self) -> u32 {
        self.end.line_number
    }

    pub fn end_column(&self) -> u32 {
        self.end.column
    }

    pub fn start_position(&self) -> Position {
        self.start
    }

    pub fn end_position(&self) -> Position {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True for positions on either edge as well as inside.
    pub fn contains_position(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// True when `other` lies within this range; equal ranges contain each other.
    pub fn contains_range(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when `other` starts strictly after and ends strictly before this range.
    pub fn strict_contains_range(&self, other: &Range) -> bool {
        self.start < other.start && other.end < self.end
    }

    /// Smallest range covering both.
    pub fn plus_range(&self, other: &Range) -> Range {
        let start = self.start.min(other.start);
        let end = self.end.max(other.end);
        if start == self.start && end == self.end {
            return *self;
        }
        Range { start, end }
    }

    /// Overlap of both ranges.
    ///
    /// Returns `None` when they are disjoint. Ranges that meet at a single
    /// position produce an empty range at that position.
    pub fn intersect_ranges(&self, other: &Range) -> Option<Range> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            return None;
        }
        Some(Range { start, end })
    }

    /// Same start, new end (renormalized).
    pub fn set_end_position(&self, end_line_number: u32, end_column: u32) -> Range {
        Range::from_positions(self.start, Position::new(end_line_number, end_column))
    }

    /// Same end, new start (renormalized).
    pub fn set_start_position(&self, start_line_number: u32, start_column: u32) -> Range {
        Range::from_positions(Position::new(start_line_number, start_column), self.end)
    }

    pub fn collapse_to_start(&self) -> Range {
        Range::at(self.start)
    }

    pub fn spans_multiple_lines(&self) -> bool {
        self.end.line_number > self.start.line_number
    }

    /// True when the ranges overlap or share a boundary position.
    pub fn are_intersecting_or_touching(a: &Range, b: &Range) -> bool {
        !(a.end < b.start || b.end < a.start)
    }

    /// True when the ranges share more than a boundary position.
    pub fn are_intersecting(a: &Range, b: &Range) -> bool {
        !(a.end <= b.start || b.end <= a.start)
    }

    /// Order by start, then by end. Absent ranges sort first.
    pub fn compare_ranges_using_starts(a: Option<&Range>, b: Option<&Range>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => a.start.cmp(&b.start).then(a.end.cmp(&b.end)),
            (a, b) => a.is_some().cmp(&b.is_some()),
        }
    }

    /// Order by end, then by start.
    pub fn compare_ranges_using_ends(a: &Range, b: &Range) -> Ordering {
        a.end.cmp(&b.end).then(a.start.cmp(&b.start))
    }
}

impl From<Position> for Range {
    fn from(position: Position) -> Self {
        Range::at(position)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.start.line_number, self.start.column, self.end.line_number, self.end.column
        )
    }
}
