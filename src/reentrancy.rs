//! Lock re-entrancy guard.
//!
//! Tracks, per thread, which lock owners the thread is currently inside.
//! Entering the same owner twice on one thread panics: with a
//! reader/writer lock that second acquisition would deadlock (or, for a
//! fair lock, could deadlock behind a queued writer). Distinct owners and
//! distinct threads never interfere.

use core::cell::RefCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static HELD: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Per-instance tracker. Embed it next to the lock and guard every
/// acquisition with `let _held = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct LockReentrancy {
    id: u64,
}

impl LockReentrancy {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Marks this owner as held by the current thread.
    ///
    /// # Panics
    /// If the current thread already holds this owner.
    #[inline]
    pub(crate) fn enter(&self) -> HeldGuard<'_> {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            assert!(
                !held.contains(&self.id),
                "re-entrant lock acquisition: this thread already holds the lock"
            );
            held.push(self.id);
        });
        HeldGuard {
            id: self.id,
            _owner: PhantomData,
        }
    }

    /// Whether the current thread holds this owner.
    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        HELD.with(|held| held.borrow().contains(&self.id))
    }
}

impl Default for LockReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `LockReentrancy::enter`. Not `Send`: it must be
/// released on the thread that took it.
pub(crate) struct HeldGuard<'a> {
    id: u64,
    _owner: PhantomData<(&'a LockReentrancy, *mut ())>,
}

impl Drop for HeldGuard<'_> {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(at) = held.iter().rposition(|&id| id == self.id) {
                held.swap_remove(at);
            }
        });
    }
}
