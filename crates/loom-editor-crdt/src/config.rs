//! Binding options.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Options for [`TextBinding`](crate::TextBinding).
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    /// Origin tag on transactions the binding makes for local edits.
    pub origin: SmolStr,
    /// Class on the body of a remote selection.
    pub selection_class_name: SmolStr,
    /// Class on the zero-width element marking a remote caret.
    pub head_class_name: SmolStr,
    /// Publish local selections to the presence channel.
    pub broadcast_selection: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            origin: SmolStr::new_static("loom-binding"),
            selection_class_name: SmolStr::new_static("loom-remote-selection"),
            head_class_name: SmolStr::new_static("loom-remote-selection-head"),
            broadcast_selection: true,
        }
    }
}

impl BindingOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
