//! MultiReader: one engine behind one reader/writer lock.
//!
//! Access shapes
//! - Per-call locked methods on `MultiReader` itself. Each takes the shared
//!   or exclusive lock for that call only and returns owned data.
//! - `ReadOnly`, from `as_read_only()`: the locked reads, with every
//!   mutation and every escaping view refused with `Error::Unsupported`.
//! - `with_read_lock` / `with_write_lock`: the lock is held for the whole
//!   callback, which receives a delegate for multi-step work. The delegate
//!   carries a scope key; once the callback returns (or unwinds) the scope
//!   is closed and every later use of the delegate, or of a `ScopedIter`
//!   taken from it, fails with `Error::StaleHandle`.
//!
//! Delegates are `!Send` and `!Sync`, so only the thread that opened a scope
//! can reach the engine through it. Taking a lock of the same `MultiReader`
//! twice on one thread panics instead of deadlocking.

use crate::error::Error;
use crate::map::UnifiedMap;
use crate::reentrancy::LockReentrancy;
use crate::scope::{Access, ScopeKey, ScopeRegistry};
use crate::set::UnifiedSet;
use crate::strategy::HashingStrategy;
use crate::table::Position;
use crate::view::{MapView, SetView, Unmodifiable};
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;
use parking_lot::RwLock;

pub struct MultiReader<C> {
    inner: RwLock<C>,
    scopes: ScopeRegistry,
    reentrancy: LockReentrancy,
}

impl<C> MultiReader<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner: RwLock::new(inner),
            scopes: ScopeRegistry::new(),
            reentrancy: LockReentrancy::new(),
        }
    }

    pub fn into_inner(self) -> C {
        self.inner.into_inner()
    }

    /// Direct access through a unique borrow; no lock is taken.
    pub fn get_mut(&mut self) -> &mut C {
        self.inner.get_mut()
    }

    pub fn as_read_only(&self) -> ReadOnly<'_, C> {
        ReadOnly { source: self }
    }

    /// Runs `f` with the shared lock held for its whole duration.
    ///
    /// # Panics
    /// If the current thread already holds a lock of this `MultiReader`.
    pub fn with_read_lock<'w, R>(&'w self, f: impl FnOnce(ReadDelegate<'w, C>) -> R) -> R {
        let _held = self.reentrancy.enter();
        let guard = self.inner.read();
        // Declared after the guard so it closes before the lock is released.
        let scope = self.scopes.open(Access::Read);
        f(ReadDelegate {
            inner: NonNull::from(&*guard),
            scopes: &self.scopes,
            key: scope.key(),
            _not_send: PhantomData,
        })
    }

    /// Runs `f` with the exclusive lock held for its whole duration, so a
    /// batch of mutations is atomic with respect to every other scope.
    ///
    /// # Panics
    /// If the current thread already holds a lock of this `MultiReader`.
    pub fn with_write_lock<'w, R>(&'w self, f: impl FnOnce(WriteDelegate<'w, C>) -> R) -> R {
        let _held = self.reentrancy.enter();
        let mut guard = self.inner.write();
        let scope = self.scopes.open(Access::Write);
        f(WriteDelegate {
            read: ReadDelegate {
                inner: NonNull::from(&mut *guard),
                scopes: &self.scopes,
                key: scope.key(),
                _not_send: PhantomData,
            },
        })
    }

    fn locked_read<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let _held = self.reentrancy.enter();
        f(&self.inner.read())
    }

    fn locked_write<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let _held = self.reentrancy.enter();
        f(&mut self.inner.write())
    }
}

impl<C: Default> Default for MultiReader<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: fmt::Debug> fmt::Debug for MultiReader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiReader")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<T, S: HashingStrategy<T>> MultiReader<UnifiedSet<T, S>> {
    pub fn len(&self) -> usize {
        self.locked_read(|s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.locked_read(|s| s.is_empty())
    }

    pub fn contains(&self, value: &T) -> bool {
        self.locked_read(|s| s.contains(value))
    }

    pub fn insert(&self, value: T) -> bool {
        self.locked_write(|s| s.insert(value))
    }

    pub fn take(&self, probe: &T) -> Option<T> {
        self.locked_write(|s| s.take(probe))
    }

    pub fn remove(&self, probe: &T) -> bool {
        self.locked_write(|s| s.remove(probe))
    }

    pub fn retain(&self, keep: impl FnMut(&T) -> bool) {
        self.locked_write(|s| s.retain(keep))
    }

    pub fn clear(&self) {
        self.locked_write(|s| s.clear())
    }
}

impl<T: Clone, S: HashingStrategy<T>> MultiReader<UnifiedSet<T, S>> {
    /// A clone of the canonical instance equal to `probe`.
    pub fn get(&self, probe: &T) -> Option<T> {
        self.locked_read(|s| s.get(probe).cloned())
    }

    /// Interns `value` and returns a clone of the canonical instance.
    pub fn get_or_insert(&self, value: T) -> T {
        self.locked_write(|s| s.get_or_insert(value).clone())
    }
}

impl<K, V, S: HashingStrategy<K>> MultiReader<UnifiedMap<K, V, S>> {
    pub fn len(&self) -> usize {
        self.locked_read(|m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.locked_read(|m| m.is_empty())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.locked_read(|m| m.contains_key(key))
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.locked_write(|m| m.insert(key, value))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.locked_write(|m| m.remove(key))
    }

    pub fn clear(&self) {
        self.locked_write(|m| m.clear())
    }
}

impl<K, V: Clone, S: HashingStrategy<K>> MultiReader<UnifiedMap<K, V, S>> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.locked_read(|m| m.get(key).cloned())
    }

    pub fn get_or_insert_with(&self, key: K, default: impl FnOnce() -> V) -> V {
        self.locked_write(|m| m.get_or_insert_with(key, default).clone())
    }
}

impl<T: Clone, S: HashingStrategy<T>> SetView<T> for MultiReader<UnifiedSet<T, S>> {
    fn len(&self) -> usize {
        Self::len(self)
    }
    fn contains(&self, probe: &T) -> bool {
        Self::contains(self, probe)
    }
    fn get_cloned(&self, probe: &T) -> Option<T> {
        self.get(probe)
    }
    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        self.locked_read(|s| s.iter().for_each(f))
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = &T> + '_>, Error> {
        Err(Error::Unsupported("iter"))
    }
    fn try_insert(&mut self, value: T) -> Result<bool, Error> {
        Ok(self.insert(value))
    }
    fn try_remove(&mut self, probe: &T) -> Result<Option<T>, Error> {
        Ok(self.take(probe))
    }
    fn try_clear(&mut self) -> Result<(), Error> {
        self.clear();
        Ok(())
    }
}

impl<K, V: Clone, S: HashingStrategy<K>> MapView<K, V> for MultiReader<UnifiedMap<K, V, S>> {
    fn len(&self) -> usize {
        Self::len(self)
    }
    fn contains_key(&self, key: &K) -> bool {
        Self::contains_key(self, key)
    }
    fn get_cloned(&self, key: &K) -> Option<V> {
        self.get(key)
    }
    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.locked_read(|m| m.iter().for_each(|(k, v)| f(k, v)))
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = (&K, &V)> + '_>, Error> {
        Err(Error::Unsupported("iter"))
    }
    fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        Ok(self.insert(key, value))
    }
    fn try_remove(&mut self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.remove(key))
    }
    fn try_clear(&mut self) -> Result<(), Error> {
        self.clear();
        Ok(())
    }
}

/// Write-excluded view of a `MultiReader`: locked reads, no mutation.
pub struct ReadOnly<'a, C> {
    source: &'a MultiReader<C>,
}

impl<C> Clone for ReadOnly<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ReadOnly<'_, C> {}

impl<'a, C> ReadOnly<'a, C> {
    /// Always refused: an unlocked view would bypass the lock.
    pub fn as_unmodifiable(&self) -> Result<Unmodifiable<'a, C>, Error> {
        Err(Error::Unsupported("as_unmodifiable"))
    }

    /// Runs `f` under the shared lock; see [`MultiReader::with_read_lock`].
    pub fn with_read_lock<R>(&self, f: impl FnOnce(ReadDelegate<'a, C>) -> R) -> R {
        self.source.with_read_lock(f)
    }
}

impl<T: Clone, S: HashingStrategy<T>> ReadOnly<'_, UnifiedSet<T, S>> {
    pub fn len(&self) -> usize {
        self.source.len()
    }
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
    pub fn contains(&self, value: &T) -> bool {
        self.source.contains(value)
    }
    pub fn get(&self, probe: &T) -> Option<T> {
        self.source.get(probe)
    }
}

impl<K, V: Clone, S: HashingStrategy<K>> ReadOnly<'_, UnifiedMap<K, V, S>> {
    pub fn len(&self) -> usize {
        self.source.len()
    }
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self.source.contains_key(key)
    }
    pub fn get(&self, key: &K) -> Option<V> {
        self.source.get(key)
    }
}

impl<T: Clone, S: HashingStrategy<T>> SetView<T> for ReadOnly<'_, UnifiedSet<T, S>> {
    fn len(&self) -> usize {
        self.source.len()
    }
    fn contains(&self, probe: &T) -> bool {
        self.source.contains(probe)
    }
    fn get_cloned(&self, probe: &T) -> Option<T> {
        self.source.get(probe)
    }
    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        SetView::for_each(self.source, f)
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = &T> + '_>, Error> {
        Err(Error::Unsupported("iter"))
    }
    fn try_insert(&mut self, _value: T) -> Result<bool, Error> {
        Err(Error::Unsupported("insert"))
    }
    fn try_remove(&mut self, _probe: &T) -> Result<Option<T>, Error> {
        Err(Error::Unsupported("remove"))
    }
    fn try_clear(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported("clear"))
    }
}

impl<K, V: Clone, S: HashingStrategy<K>> MapView<K, V> for ReadOnly<'_, UnifiedMap<K, V, S>> {
    fn len(&self) -> usize {
        self.source.len()
    }
    fn contains_key(&self, key: &K) -> bool {
        self.source.contains_key(key)
    }
    fn get_cloned(&self, key: &K) -> Option<V> {
        self.source.get(key)
    }
    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        MapView::for_each(self.source, f)
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = (&K, &V)> + '_>, Error> {
        Err(Error::Unsupported("iter"))
    }
    fn try_insert(&mut self, _key: K, _value: V) -> Result<Option<V>, Error> {
        Err(Error::Unsupported("insert"))
    }
    fn try_remove(&mut self, _key: &K) -> Result<Option<V>, Error> {
        Err(Error::Unsupported("remove"))
    }
    fn try_clear(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported("clear"))
    }
}

/// Handle to the engine inside a `with_read_lock` callback.
///
/// Valid only while its scope is open. Accessor closures receive a plain
/// reference that cannot outlive the call.
pub struct ReadDelegate<'w, C> {
    inner: NonNull<C>,
    scopes: &'w ScopeRegistry,
    key: ScopeKey,
    // NonNull already opts out of Send/Sync; this pins the borrow of C too.
    _not_send: PhantomData<&'w C>,
}

impl<C> Clone for ReadDelegate<'_, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner,
            scopes: self.scopes,
            key: self.key,
            _not_send: PhantomData,
        }
    }
}

impl<'w, C> ReadDelegate<'w, C> {
    /// Whether the owning scope is still open.
    pub fn is_valid(&self) -> bool {
        self.scopes.is_open(self.key)
    }

    pub fn read<R>(&self, f: impl FnOnce(&C) -> R) -> Result<R, Error> {
        let _access = self.scopes.enter(self.key, Access::Read)?;
        // SAFETY: the scope is open, so the callback that created this
        // delegate is still running on this thread with the lock held.
        Ok(f(unsafe { self.inner.as_ref() }))
    }

    /// A cloning iterator bound to this scope.
    pub fn iter(&self) -> ScopedIter<'w, C>
    where
        C: Scan,
    {
        ScopedIter {
            delegate: self.clone(),
            at: Position::default(),
            done: false,
        }
    }
}

impl<T, S: HashingStrategy<T>> ReadDelegate<'_, UnifiedSet<T, S>> {
    pub fn len(&self) -> Result<usize, Error> {
        self.read(|s| s.len())
    }

    pub fn contains(&self, value: &T) -> Result<bool, Error> {
        self.read(|s| s.contains(value))
    }
}

impl<K, V, S: HashingStrategy<K>> ReadDelegate<'_, UnifiedMap<K, V, S>> {
    pub fn len(&self) -> Result<usize, Error> {
        self.read(|m| m.len())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, Error> {
        self.read(|m| m.contains_key(key))
    }
}

impl<K, V: Clone, S: HashingStrategy<K>> ReadDelegate<'_, UnifiedMap<K, V, S>> {
    pub fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.read(|m| m.get(key).cloned())
    }
}

/// Handle to the engine inside a `with_write_lock` callback. Derefs to a
/// `ReadDelegate` for the read side.
pub struct WriteDelegate<'w, C> {
    read: ReadDelegate<'w, C>,
}

impl<'w, C> Deref for WriteDelegate<'w, C> {
    type Target = ReadDelegate<'w, C>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<C> WriteDelegate<'_, C> {
    pub fn write<R>(&self, f: impl FnOnce(&mut C) -> R) -> Result<R, Error> {
        let _access = self.read.scopes.enter(self.read.key, Access::Write)?;
        // SAFETY: the scope is an open write scope, so the exclusive lock is
        // held by this thread, and the busy flag rules out any other live
        // reference derived from this delegate.
        Ok(f(unsafe { &mut *self.read.inner.as_ptr() }))
    }
}

impl<T, S: HashingStrategy<T>> WriteDelegate<'_, UnifiedSet<T, S>> {
    pub fn insert(&self, value: T) -> Result<bool, Error> {
        self.write(|s| s.insert(value))
    }

    pub fn take(&self, probe: &T) -> Result<Option<T>, Error> {
        self.write(|s| s.take(probe))
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.write(|s| s.clear())
    }
}

impl<K, V, S: HashingStrategy<K>> WriteDelegate<'_, UnifiedMap<K, V, S>> {
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, Error> {
        self.write(|m| m.insert(key, value))
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, Error> {
        self.write(|m| m.remove(key))
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.write(|m| m.clear())
    }
}

/// Engines that can be walked one element at a time by position.
///
/// Items are owned so that nothing borrowed from the engine is held between
/// steps. Positions stay in range after a mutation, though elements may then
/// be skipped or repeated.
pub trait Scan {
    type Item;

    fn scan(&self, from: Position) -> Option<(Self::Item, Position)>;
}

impl<T: Clone, S: HashingStrategy<T>> Scan for UnifiedSet<T, S> {
    type Item = T;

    fn scan(&self, from: Position) -> Option<(T, Position)> {
        UnifiedSet::scan(self, from).map(|(v, next)| (v.clone(), next))
    }
}

impl<K: Clone, V: Clone, S: HashingStrategy<K>> Scan for UnifiedMap<K, V, S> {
    type Item = (K, V);

    fn scan(&self, from: Position) -> Option<((K, V), Position)> {
        UnifiedMap::scan(self, from).map(|(kv, next)| (kv.clone(), next))
    }
}

/// Iterator from [`ReadDelegate::iter`]. Each step re-validates the scope;
/// after the scope closes it yields `Err(StaleHandle)` once and then ends.
pub struct ScopedIter<'w, C: Scan> {
    delegate: ReadDelegate<'w, C>,
    at: Position,
    done: bool,
}

impl<C: Scan> Iterator for ScopedIter<'_, C> {
    type Item = Result<C::Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self.delegate.read(|c| c.scan(self.at));
        match step {
            Ok(Some((item, next))) => {
                self.at = next;
                Some(Ok(item))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
