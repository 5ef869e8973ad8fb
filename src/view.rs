//! Capability surface shared by the engines and their views.
//!
//! `SetView` / `MapView` are the object-safe interfaces a factory or adapter
//! layer programs against. An implementation that forbids an operation
//! reports `Error::Unsupported` at the call site without touching the
//! table. Lookups return owned clones so lock-protected implementations
//! can satisfy them after the lock is released.

use crate::error::Error;
use crate::map::UnifiedMap;
use crate::set::UnifiedSet;
use crate::strategy::HashingStrategy;

pub trait SetView<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, probe: &T) -> bool;

    /// A clone of the stored instance equal to `probe`.
    fn get_cloned(&self, probe: &T) -> Option<T>;

    /// Visits every element. Lock-protected implementations hold the shared
    /// lock for the whole traversal.
    fn for_each(&self, f: &mut dyn FnMut(&T));

    /// A borrowing iterator, for implementations that can hand one out.
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = &T> + '_>, Error>;

    fn try_insert(&mut self, value: T) -> Result<bool, Error>;

    fn try_remove(&mut self, probe: &T) -> Result<Option<T>, Error>;

    fn try_clear(&mut self) -> Result<(), Error>;
}

pub trait MapView<K, V> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_key(&self, key: &K) -> bool;

    fn get_cloned(&self, key: &K) -> Option<V>;

    fn for_each(&self, f: &mut dyn FnMut(&K, &V));

    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = (&K, &V)> + '_>, Error>;

    fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Error>;

    fn try_remove(&mut self, key: &K) -> Result<Option<V>, Error>;

    fn try_clear(&mut self) -> Result<(), Error>;
}

impl<T: Clone, S: HashingStrategy<T>> SetView<T> for UnifiedSet<T, S> {
    fn len(&self) -> usize {
        UnifiedSet::len(self)
    }
    fn contains(&self, probe: &T) -> bool {
        UnifiedSet::contains(self, probe)
    }
    fn get_cloned(&self, probe: &T) -> Option<T> {
        self.get(probe).cloned()
    }
    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        self.iter().for_each(f)
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = &T> + '_>, Error> {
        Ok(Box::new(self.iter()))
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

impl<K, V: Clone, S: HashingStrategy<K>> MapView<K, V> for UnifiedMap<K, V, S> {
    fn len(&self) -> usize {
        UnifiedMap::len(self)
    }
    fn contains_key(&self, key: &K) -> bool {
        UnifiedMap::contains_key(self, key)
    }
    fn get_cloned(&self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }
    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| f(k, v))
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = (&K, &V)> + '_>, Error> {
        Ok(Box::new(self.iter()))
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

/// Read access to an engine that is not touched by concurrent writers.
/// Forbids mutation; adds no locking.
pub struct Unmodifiable<'a, C> {
    inner: &'a C,
}

impl<'a, C> Unmodifiable<'a, C> {
    pub(crate) fn new(inner: &'a C) -> Self {
        Self { inner }
    }
}

impl<C> Clone for Unmodifiable<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Unmodifiable<'_, C> {}

impl<'a, T, S: HashingStrategy<T>> Unmodifiable<'a, UnifiedSet<T, S>> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn contains(&self, probe: &T) -> bool {
        self.inner.contains(probe)
    }
    pub fn get(&self, probe: &T) -> Option<&'a T> {
        self.inner.get(probe)
    }
    pub fn iter(&self) -> crate::set::Iter<'a, T> {
        self.inner.iter()
    }
}

impl<'a, K, V, S: HashingStrategy<K>> Unmodifiable<'a, UnifiedMap<K, V, S>> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }
    pub fn get(&self, key: &K) -> Option<&'a V> {
        self.inner.get(key)
    }
    pub fn iter(&self) -> crate::map::Iter<'a, K, V> {
        self.inner.iter()
    }
}

impl<T: Clone, S: HashingStrategy<T>> SetView<T> for Unmodifiable<'_, UnifiedSet<T, S>> {
    fn len(&self) -> usize {
        self.inner.len()
    }
    fn contains(&self, probe: &T) -> bool {
        self.inner.contains(probe)
    }
    fn get_cloned(&self, probe: &T) -> Option<T> {
        self.inner.get(probe).cloned()
    }
    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        self.inner.iter().for_each(f)
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = &T> + '_>, Error> {
        Ok(Box::new(self.inner.iter()))
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

impl<K, V: Clone, S: HashingStrategy<K>> MapView<K, V> for Unmodifiable<'_, UnifiedMap<K, V, S>> {
    fn len(&self) -> usize {
        self.inner.len()
    }
    fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }
    fn get_cloned(&self, key: &K) -> Option<V> {
        self.inner.get(key).cloned()
    }
    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.inner.iter().for_each(|(k, v)| f(k, v))
    }
    fn try_iter(&self) -> Result<Box<dyn Iterator<Item = (&K, &V)> + '_>, Error> {
        Ok(Box::new(self.inner.iter()))
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
