//! Scope registry: generational keys for open lock scopes.
//!
//! Every scoped callback registers a scope while it holds the lock and
//! removes it before the lock is released. Delegates carry the scope's key
//! and look it up on each access, so a delegate that outlives its callback
//! finds nothing and reports `Error::StaleHandle`. Keys are generational:
//! a closed scope's key never resolves to a scope opened later, even when
//! the slot is reused.

use crate::error::Error;
use parking_lot::Mutex;
use slotmap::{DefaultKey, SlotMap};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct ScopeKey(DefaultKey);

#[derive(Debug)]
struct Scope {
    access: Access,
    // Set while a delegate of this scope is dereferencing the engine.
    busy: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeRegistry {
    scopes: Mutex<SlotMap<DefaultKey, Scope>>,
}

impl ScopeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a scope; it stays open until the returned guard drops.
    pub(crate) fn open(&self, access: Access) -> OpenScope<'_> {
        let key = self.scopes.lock().insert(Scope {
            access,
            busy: false,
        });
        tracing::trace!(?access, "opened lock scope");
        OpenScope {
            registry: self,
            key: ScopeKey(key),
        }
    }

    pub(crate) fn is_open(&self, key: ScopeKey) -> bool {
        self.scopes.lock().contains_key(key.0)
    }

    /// Claims exclusive use of an open scope for one access.
    ///
    /// Fails with `StaleHandle` once the scope has closed, `Unsupported`
    /// when a write is attempted through a read scope, and `Reentrant` when
    /// the scope is already inside an access.
    pub(crate) fn enter(&self, key: ScopeKey, need: Access) -> Result<ScopeAccess<'_>, Error> {
        let mut scopes = self.scopes.lock();
        let Some(scope) = scopes.get_mut(key.0) else {
            tracing::debug!("rejected access through a closed lock scope");
            return Err(Error::StaleHandle);
        };
        if need == Access::Write && scope.access == Access::Read {
            return Err(Error::Unsupported("write through a read-locked scope"));
        }
        if scope.busy {
            return Err(Error::Reentrant);
        }
        scope.busy = true;
        Ok(ScopeAccess {
            registry: self,
            key,
        })
    }

    fn close(&self, key: ScopeKey) {
        let removed = self.scopes.lock().remove(key.0);
        debug_assert!(removed.is_some(), "scope closed twice");
        tracing::trace!("closed lock scope");
    }

    #[cfg(test)]
    fn open_count(&self) -> usize {
        self.scopes.lock().len()
    }
}

/// Guard for a registered scope; closing happens on drop, including
/// during unwinding.
pub(crate) struct OpenScope<'a> {
    registry: &'a ScopeRegistry,
    key: ScopeKey,
}

impl OpenScope<'_> {
    pub(crate) fn key(&self) -> ScopeKey {
        self.key
    }
}

impl Drop for OpenScope<'_> {
    fn drop(&mut self) {
        self.registry.close(self.key);
    }
}

/// Exclusive use of a scope for one access; released on drop.
pub(crate) struct ScopeAccess<'a> {
    registry: &'a ScopeRegistry,
    key: ScopeKey,
}

impl Drop for ScopeAccess<'_> {
    fn drop(&mut self) {
        if let Some(scope) = self.registry.scopes.lock().get_mut(self.key.0) {
            scope.busy = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: a key resolves while its scope is open and never after.
    #[test]
    fn key_goes_stale_when_scope_closes() {
        let reg = ScopeRegistry::new();
        let key = {
            let scope = reg.open(Access::Read);
            assert!(reg.is_open(scope.key()));
            assert!(reg.enter(scope.key(), Access::Read).is_ok());
            scope.key()
        };
        assert!(!reg.is_open(key));
        assert_eq!(reg.enter(key, Access::Read).err(), Some(Error::StaleHandle));
        assert_eq!(reg.open_count(), 0);
    }

    /// Invariant: a stale key does not alias a scope opened afterwards,
    /// even when the slot is reused (generational keys).
    #[test]
    fn stale_key_does_not_alias_new_scope() {
        let reg = ScopeRegistry::new();
        let old = reg.open(Access::Write).key();
        let fresh = reg.open(Access::Write);
        assert_ne!(old, fresh.key());
        assert!(!reg.is_open(old));
        assert!(reg.is_open(fresh.key()));
    }

    #[test]
    fn read_scope_refuses_writes() {
        let reg = ScopeRegistry::new();
        let scope = reg.open(Access::Read);
        assert!(matches!(
            reg.enter(scope.key(), Access::Write),
            Err(Error::Unsupported(_))
        ));
    }

    /// Invariant: one access at a time per scope; the flag clears on drop.
    #[test]
    fn nested_access_is_rejected() {
        let reg = ScopeRegistry::new();
        let scope = reg.open(Access::Write);
        {
            let _outer = reg.enter(scope.key(), Access::Write).unwrap();
            assert_eq!(
                reg.enter(scope.key(), Access::Read).err(),
                Some(Error::Reentrant)
            );
        }
        assert!(reg.enter(scope.key(), Access::Read).is_ok());
    }
}
