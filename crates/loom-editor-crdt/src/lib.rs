//! CRDT side of a collaborative editor binding.
//!
//! This crate provides:
//! - `SharedText`: trait for a CRDT text container, `LoroSharedText` - loro-backed implementation
//! - `TextBinding`: keeps a shared text and a `BufferModel` in sync without echo loops
//! - Relative selections that survive concurrent edits
//! - `Presence`/`Awareness` and rendering of remote selections as decorations

mod anchor;
mod binding;
mod config;
mod decorations;
mod error;
mod guard;
mod loro_text;
mod presence;
mod shared;

pub use anchor::{
    RelativeSelection, anchor, capture_relative_selection, resolve_owned, restore_selection,
};
pub use binding::{BindingState, TextBinding};
pub use config::BindingOptions;
pub use decorations::{PresenceRenderer, RemoteSelection, build_decorations, remote_selections};
pub use error::CrdtError;
pub use guard::{GuardLock, ReentrancyGuard};
pub use loro_text::{LoroSharedText, TEXT_CONTAINER};
pub use presence::{
    Awareness, COLLABORATOR_COLORS, Presence, PresenceChange, PresenceSelection, PresenceState,
    UserInfo,
};
pub use shared::{AbsolutePosition, ClientId, Delta, SharedText, TextEvent};

// Re-export Loro types that consumers need
pub use loro::cursor::Cursor;
pub use loro::{ContainerID, LoroDoc, LoroText, VersionVector};
