//! Error types for CRDT operations.

use loom_editor_core::ModelError;
use thiserror::Error;

/// Errors that can occur during CRDT operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CrdtError {
    /// Failed to import CRDT data.
    #[error("failed to import CRDT data: {0}")]
    Import(String),

    /// Failed to export CRDT data.
    #[error("failed to export CRDT data: {0}")]
    Export(String),

    /// Loro CRDT error.
    #[error("loro error: {0}")]
    Loro(String),

    /// An offset past the end of the shared text.
    #[error("offset {offset} out of range for text of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },

    /// The CRDT delivered a change the binding cannot interpret.
    #[error("unexpected diff for text container: {0}")]
    UnexpectedDiff(String),

    /// The local buffer rejected an edit.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<loro::LoroError> for CrdtError {
    fn from(e: loro::LoroError) -> Self {
        CrdtError::Loro(e.to_string())
    }
}
