//! loom-editor-core: framework-agnostic editor primitives.
//!
//! This crate provides:
//! - Geometry: `Position`, `Range`, `Selection`
//! - `BufferModel` trait for line/column addressed buffers, `RopeModel` - ropey-backed implementation
//! - `EditorView` trait for views with selections and decorations, `HeadlessView` - in-memory implementation
//! - `Emitter`/`Subscription` event plumbing shared by every collaborator

pub mod color;
pub mod decoration;
pub mod error;
pub mod event;
pub mod model;
pub mod position;
pub mod range;
pub mod selection;
pub mod view;

pub use color::{rgba_u32_to_css, rgba_u32_to_css_alpha, rgba_u32_to_hex};
pub use decoration::{DecorationId, DecorationOptions, ModelDecoration};
pub use error::ModelError;
pub use event::{Emitter, Subscription};
pub use model::{BufferModel, ContentChange, ContentChangedEvent, EditOperation, ModelId, RopeModel};
pub use position::Position;
pub use range::Range;
pub use selection::{Selection, SelectionDirection};
pub use smol_str::SmolStr;
pub use view::{CursorSelectionChangedEvent, EditorView, HeadlessView};
