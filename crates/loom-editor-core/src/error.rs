//! Error types for buffer operations.

use thiserror::Error;

use crate::range::Range;

/// Errors raised by [`BufferModel`](crate::BufferModel) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// Two edits in the same batch cover overlapping text.
    #[error("edits {0} and {1} overlap")]
    OverlappingEdits(Range, Range),

    /// The buffer has been disposed.
    #[error("buffer is disposed")]
    Disposed,
}
