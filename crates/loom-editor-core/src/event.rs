//! Listener registration for collaborator change notifications.
//!
//! Buffers, views and presence channels all hand out [`Subscription`]s.
//! Dropping a subscription removes its listener, the same way a loro
//! `Subscription` or a gloo `EventListener` does.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<E> = Rc<dyn Fn(&E)>;

struct EmitterInner<E: ?Sized> {
    listeners: RefCell<Vec<(u64, Listener<E>)>>,
    next_id: Cell<u64>,
}

/// A single-threaded list of listeners for events of type `E`.
///
/// Emission works on a snapshot of the listener list, so a listener may
/// subscribe or unsubscribe (including itself) while being called.
pub struct Emitter<E: ?Sized> {
    inner: Rc<EmitterInner<E>>,
}

impl<E: ?Sized + 'static> Emitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let listener: Listener<E> = Rc::new(listener);
        self.inner.listeners.borrow_mut().push((id, listener));

        let weak: Weak<EmitterInner<E>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Call every listener registered at the time of the call.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Drop every listener. Outstanding subscriptions become no-ops.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        drop(removed);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl<E: ?Sized + 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

/// Handle to a registered listener. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to undo.
    pub fn empty() -> Self {
        Self { unsubscribe: None }
    }

    /// Keep the listener registered for the lifetime of its source.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
