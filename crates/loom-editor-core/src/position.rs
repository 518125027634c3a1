//! Line/column addressing.

use std::cmp::Ordering;
use std::fmt;

/// A position in a buffer. Both coordinates are 1-based.
///
/// Ordering is lexicographic on `(line_number, column)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line_number: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line_number: u32, column: u32) -> Self {
        Self {
            line_number,
            column,
        }
    }

    /// Copy of this position with the given coordinates replaced.
    pub fn with(self, line_number: Option<u32>, column: Option<u32>) -> Self {
        Self::new(
            line_number.unwrap_or(self.line_number),
            column.unwrap_or(self.column),
        )
    }

    /// Shift by a signed line/column delta. Saturates at 1.
    pub fn delta(self, delta_line_number: i64, delta_column: i64) -> Self {
        let shift = |v: u32, d: i64| (i64::from(v) + d).clamp(1, i64::from(u32::MAX)) as u32;
        Self::new(
            shift(self.line_number, delta_line_number),
            shift(self.column, delta_column),
        )
    }

    /// Strictly before `other`.
    pub fn is_before(&self, other: &Position) -> bool {
        self < other
    }

    pub fn is_before_or_equal(&self, other: &Position) -> bool {
        self <= other
    }

    /// Sort comparator, same as `Ord::cmp`.
    pub fn compare(a: &Position, b: &Position) -> Ordering {
        a.cmp(b)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line_number, self.column)
    }
}
