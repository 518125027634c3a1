//! Presence tracking for collaborative editing sessions.
//!
//! Each participant publishes a small state: who they are and where their
//! selection is, as anchors into the shared text. [`Awareness`] is an
//! in-memory map of those states; a host's transport moves them between
//! peers with [`Awareness::local_state`] and [`Awareness::apply_remote_state`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use loom_editor_core::{Emitter, Subscription};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::shared::ClientId;

/// Selection endpoints as anchors. Either may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSelection<A> {
    pub anchor: Option<A>,
    pub head: Option<A>,
}

/// Display info for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: SmolStr,
    /// Packed `0xRRGGBBAA`. Assigned by [`Awareness`] when absent.
    #[serde(default)]
    pub color: Option<u32>,
}

/// Everything a participant publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceState<A> {
    pub selection: Option<PresenceSelection<A>>,
    pub user: Option<UserInfo>,
}

impl<A> Default for PresenceState<A> {
    fn default() -> Self {
        Self {
            selection: None,
            user: None,
        }
    }
}

/// Which participants changed in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceChange {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

/// A channel of presence states keyed by participant.
pub trait Presence<A> {
    fn local_client_id(&self) -> ClientId;

    /// Every known state, including the local one.
    fn states(&self) -> BTreeMap<ClientId, PresenceState<A>>;

    fn set_local_selection(&self, selection: Option<PresenceSelection<A>>);

    fn on_change(&self, listener: Box<dyn Fn(&PresenceChange)>) -> Subscription;
}

/// Predefined collaborator colours (pastel-ish for readability).
pub const COLLABORATOR_COLORS: [u32; 8] = [
    0xFF6B6BFF, // Red
    0x4ECDC4FF, // Teal
    0xFFE66DFF, // Yellow
    0x95E1D3FF, // Mint
    0xF38181FF, // Coral
    0xAA96DAFF, // Purple
    0xFCBF49FF, // Orange
    0x2EC4B6FF, // Cyan
];

/// In-memory presence map.
pub struct Awareness<A> {
    client_id: ClientId,
    states: RefCell<BTreeMap<ClientId, PresenceState<A>>>,
    colors: RefCell<HashMap<ClientId, u32>>,
    next_color_index: Cell<usize>,
    changed: Emitter<PresenceChange>,
}

impl<A: Clone + 'static> Awareness<A> {
    pub fn new(client_id: ClientId) -> Self {
        let awareness = Self {
            client_id,
            states: RefCell::new(BTreeMap::new()),
            colors: RefCell::new(HashMap::new()),
            next_color_index: Cell::new(0),
            changed: Emitter::new(),
        };
        awareness
            .states
            .borrow_mut()
            .insert(client_id, PresenceState::default());
        awareness.color_of(client_id);
        awareness
    }

    pub fn local_state(&self) -> Option<PresenceState<A>> {
        self.state(self.client_id)
    }

    /// A participant's state with its colour filled in.
    pub fn state(&self, client: ClientId) -> Option<PresenceState<A>> {
        let mut state = self.states.borrow().get(&client)?.clone();
        if let Some(user) = state.user.as_mut() {
            user.color.get_or_insert(self.color_of(client));
        }
        Some(state)
    }

    pub fn set_local_user(&self, user: UserInfo) {
        self.update_local(|state| state.user = Some(user));
    }

    /// Store a state received from another participant.
    pub fn apply_remote_state(&self, client: ClientId, state: PresenceState<A>) {
        if client == self.client_id {
            tracing::warn!(client, "ignoring remote state for the local participant");
            return;
        }
        self.color_of(client);
        let existed = self.states.borrow_mut().insert(client, state).is_some();
        let change = if existed {
            PresenceChange {
                updated: vec![client],
                ..Default::default()
            }
        } else {
            tracing::debug!(client, "participant joined");
            PresenceChange {
                added: vec![client],
                ..Default::default()
            }
        };
        self.changed.emit(&change);
    }

    /// Forget a participant and release its palette slot.
    pub fn remove_state(&self, client: ClientId) -> Option<PresenceState<A>> {
        let removed = self.states.borrow_mut().remove(&client)?;
        self.colors.borrow_mut().remove(&client);
        tracing::debug!(client, "participant left");
        self.changed.emit(&PresenceChange {
            removed: vec![client],
            ..Default::default()
        });
        Some(removed)
    }

    /// The participant's own colour, or one assigned from the palette.
    pub fn color_of(&self, client: ClientId) -> u32 {
        let explicit = self
            .states
            .borrow()
            .get(&client)
            .and_then(|s| s.user.as_ref())
            .and_then(|u| u.color);
        if let Some(color) = explicit {
            return color;
        }
        *self
            .colors
            .borrow_mut()
            .entry(client)
            .or_insert_with(|| self.assign_color())
    }

    pub fn len(&self) -> usize {
        self.states.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.borrow().is_empty()
    }

    /// Assign a colour to a new collaborator.
    fn assign_color(&self) -> u32 {
        let index = self.next_color_index.get();
        self.next_color_index.set(index + 1);
        COLLABORATOR_COLORS[index % COLLABORATOR_COLORS.len()]
    }

    fn update_local(&self, f: impl FnOnce(&mut PresenceState<A>)) {
        {
            let mut states = self.states.borrow_mut();
            f(states.entry(self.client_id).or_default());
        }
        self.changed.emit(&PresenceChange {
            updated: vec![self.client_id],
            ..Default::default()
        });
    }
}

impl<A: Clone + 'static> Presence<A> for Awareness<A> {
    fn local_client_id(&self) -> ClientId {
        self.client_id
    }

    fn states(&self) -> BTreeMap<ClientId, PresenceState<A>> {
        let clients: Vec<ClientId> = self.states.borrow().keys().copied().collect();
        clients
            .into_iter()
            .filter_map(|client| self.state(client).map(|s| (client, s)))
            .collect()
    }

    fn set_local_selection(&self, selection: Option<PresenceSelection<A>>) {
        self.update_local(|state| state.selection = selection);
    }

    fn on_change(&self, listener: Box<dyn Fn(&PresenceChange)>) -> Subscription {
        self.changed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn user(name: &str) -> UserInfo {
        UserInfo {
            name: name.into(),
            color: None,
        }
    }

    #[test]
    fn test_add_remove_collaborator() {
        let awareness: Awareness<u32> = Awareness::new(1);
        awareness.apply_remote_state(
            2,
            PresenceState {
                selection: None,
                user: Some(user("Alice")),
            },
        );
        assert_eq!(awareness.len(), 2);

        let removed = awareness.remove_state(2).unwrap();
        assert_eq!(removed.user.unwrap().name, "Alice");
        assert_eq!(awareness.len(), 1);
        assert!(awareness.remove_state(2).is_none());
    }

    #[test]
    fn test_departed_collaborator_color_is_forgotten() {
        let awareness: Awareness<u32> = Awareness::new(1);
        for _ in 0..50 {
            awareness.apply_remote_state(2, PresenceState::default());
            awareness.remove_state(2);
        }
        assert_eq!(awareness.colors.borrow().len(), 1);
        assert!(!awareness.colors.borrow().contains_key(&2));
    }

    #[test]
    fn test_color_assignment() {
        let awareness: Awareness<u32> = Awareness::new(0);
        for client in 1..10 {
            awareness.apply_remote_state(client, PresenceState::default());
        }
        // local participant took the first slot
        assert_eq!(awareness.color_of(0), COLLABORATOR_COLORS[0]);
        assert_eq!(awareness.color_of(1), COLLABORATOR_COLORS[1]);
        assert_eq!(awareness.color_of(8), COLLABORATOR_COLORS[0]);
        // stable on repeat lookups
        assert_eq!(awareness.color_of(1), COLLABORATOR_COLORS[1]);
    }

    #[test]
    fn test_explicit_color_wins() {
        let awareness: Awareness<u32> = Awareness::new(1);
        awareness.apply_remote_state(
            2,
            PresenceState {
                selection: None,
                user: Some(UserInfo {
                    name: "Bob".into(),
                    color: Some(0x112233FF),
                }),
            },
        );
        assert_eq!(awareness.color_of(2), 0x112233FF);

        awareness.apply_remote_state(
            3,
            PresenceState {
                selection: None,
                user: Some(user("Carol")),
            },
        );
        let states = awareness.states();
        assert!(states[&3].user.as_ref().unwrap().color.is_some());
    }

    #[test]
    fn test_change_events() {
        let awareness: Awareness<u32> = Awareness::new(1);
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        let _sub = awareness.on_change(Box::new(move |c| sink.borrow_mut().push(c.clone())));

        awareness.apply_remote_state(2, PresenceState::default());
        awareness.apply_remote_state(2, PresenceState::default());
        awareness.set_local_selection(Some(PresenceSelection {
            anchor: Some(1),
            head: Some(4),
        }));
        awareness.remove_state(2);

        let changes = changes.borrow();
        assert_eq!(changes[0].added, vec![2]);
        assert_eq!(changes[1].updated, vec![2]);
        assert_eq!(changes[2].updated, vec![1]);
        assert_eq!(changes[3].removed, vec![2]);
        assert_eq!(
            awareness.local_state().unwrap().selection.unwrap().head,
            Some(4)
        );
    }

    #[test]
    fn test_state_json() {
        let state: PresenceState<u32> = serde_json::from_str(r#"{"user":{"name":"Dee"}}"#).unwrap();
        assert!(state.selection.is_none());
        assert_eq!(state.user.unwrap().name, "Dee");
    }

    #[test]
    fn test_cursor_state_json() {
        let text = crate::LoroSharedText::with_peer_id(9).unwrap();
        crate::SharedText::insert(&text, 0, "hello").unwrap();
        let anchor = crate::SharedText::relative_position(&text, 1).unwrap();
        let head = crate::SharedText::relative_position(&text, 4).unwrap();
        let state = PresenceState {
            selection: Some(PresenceSelection {
                anchor: Some(anchor),
                head: Some(head),
            }),
            user: Some(user("Eve")),
        };

        let wire = serde_json::to_string(&state).unwrap();
        let decoded: PresenceState<loro::cursor::Cursor> = serde_json::from_str(&wire).unwrap();
        let selection = decoded.selection.unwrap();
        let resolve = |c: &loro::cursor::Cursor| {
            crate::SharedText::absolute_position(&text, c).unwrap().index
        };
        assert_eq!(resolve(selection.anchor.as_ref().unwrap()), 1);
        assert_eq!(resolve(selection.head.as_ref().unwrap()), 4);
        assert_eq!(decoded.user.unwrap().name, "Eve");

        let bare: PresenceState<loro::cursor::Cursor> = serde_json::from_str("{}").unwrap();
        assert!(bare.selection.is_none() && bare.user.is_none());
    }
}
