//! Non-reentrant section guard.
//!
//! Used to tell a binding's own echoes apart from genuine changes: while the
//! binding is writing to one side, notifications coming back from that
//! write find the guard held and are dropped.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    held: Cell<bool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }

    /// Take the guard, or `None` if it is already held.
    pub fn try_acquire(&self) -> Option<GuardLock<'_>> {
        if self.held.replace(true) {
            return None;
        }
        Some(GuardLock { guard: self })
    }

    /// Run `f` with the guard held. A nested call skips `f` and returns `None`.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let Some(_lock) = self.try_acquire() else {
            tracing::trace!("guard held, skipping nested section");
            return None;
        };
        Some(f())
    }
}

/// Releases the guard when dropped, unwinding included.
#[must_use]
pub struct GuardLock<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardLock<'_> {
    fn drop(&mut self) {
        self.guard.held.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_nested_run_is_skipped() {
        let guard = ReentrancyGuard::new();
        let mut inner_ran = false;
        let outer = guard.run(|| {
            assert!(guard.is_held());
            let inner = guard.run(|| inner_ran = true);
            assert!(inner.is_none());
            7
        });
        assert_eq!(outer, Some(7));
        assert!(!inner_ran);
        assert!(!guard.is_held());
    }

    #[test]
    fn test_released_after_panic() {
        let guard = ReentrancyGuard::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            guard.run(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!guard.is_held());
        assert_eq!(guard.run(|| 1), Some(1));
    }

    #[test]
    fn test_try_acquire() {
        let guard = ReentrancyGuard::new();
        let lock = guard.try_acquire();
        assert!(lock.is_some());
        assert!(guard.try_acquire().is_none());
        drop(lock);
        assert!(guard.try_acquire().is_some());
    }
}
