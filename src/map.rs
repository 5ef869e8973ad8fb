//! UnifiedMap: the key-to-value variant of the engine.
//!
//! The strategy covers keys only. Inserting under an equal key replaces the
//! value but keeps the key instance that was stored first.

use crate::error::Error;
use crate::set::{checked_slots, unsigned_slots};
use crate::strategy::{DefaultStrategy, HashingStrategy};
use crate::table::{self, Position, Table};
use crate::view::Unmodifiable;
use core::fmt;
use core::hash::Hash;
use core::mem;

pub struct UnifiedMap<K, V, S = DefaultStrategy> {
    table: Table<(K, V)>,
    strategy: S,
}

impl<K: Hash + Eq, V> UnifiedMap<K, V> {
    pub fn new() -> Self {
        Self::with_strategy(DefaultStrategy::default())
    }

    /// # Panics
    /// If `capacity` exceeds the largest table.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_strategy(capacity, DefaultStrategy::default())
    }
}

impl<K: Hash + Eq, V> Default for UnifiedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> UnifiedMap<K, V, S>
where
    S: HashingStrategy<K>,
{
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            table: Table::new(),
            strategy,
        }
    }

    /// # Panics
    /// If `capacity` exceeds the largest table.
    pub fn with_capacity_and_strategy(capacity: usize, strategy: S) -> Self {
        Self {
            table: Table::with_slots(unsigned_slots(capacity)),
            strategy,
        }
    }

    pub fn try_with_capacity_and_strategy(capacity: i64, strategy: S) -> Result<Self, Error> {
        let slots = checked_slots(capacity)?;
        Ok(Self {
            table: Table::with_slots(slots),
            strategy,
        })
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn chained_slots(&self) -> usize {
        self.table.chained_slots()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get_key_value(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// The stored (canonical) key together with its value.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let hash = self.strategy.hash(key);
        self.table
            .find(hash, |(k, _)| self.strategy.equals(k, key))
            .map(|(k, v)| (k, v))
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.strategy.hash(key);
        let strategy = &self.strategy;
        self.table
            .find_mut(hash, |(k, _)| strategy.equals(k, key))
            .map(|(_, v)| v)
    }

    /// Associates `value` with `key` and returns the previous value. When an
    /// equal key is already stored, that key is kept and `key` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.strategy.hash(&key);
        let strategy = &self.strategy;
        match self.table.find_index(hash, |(k, _)| strategy.equals(k, &key)) {
            Some(index) => Some(mem::replace(&mut self.table[index].1, value)),
            None => {
                self.table.insert_unique(hash, (key, value));
                None
            }
        }
    }

    /// Returns the value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let hash = self.strategy.hash(&key);
        let strategy = &self.strategy;
        match self.table.find_index(hash, |(k, _)| strategy.equals(k, &key)) {
            Some(index) => &mut self.table[index].1,
            None => &mut self.table.insert_unique(hash, (key, default())).1,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes the entry, returning the stored key instance.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.strategy.hash(key);
        let strategy = &self.strategy;
        self.table.remove(hash, |(k, _)| strategy.equals(k, key))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|(k, v)| keep(k, v));
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl ExactSizeIterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Rebuilds the map under another key strategy. When keys become equal
    /// the first one met keeps its entry; later values overwrite it.
    pub fn rebuild_with<S2: HashingStrategy<K>>(self, strategy: S2) -> UnifiedMap<K, V, S2> {
        let mut rebuilt = UnifiedMap::with_capacity_and_strategy(self.len(), strategy);
        rebuilt.extend(self.table);
        rebuilt
    }

    pub fn as_unmodifiable(&self) -> Unmodifiable<'_, Self> {
        Unmodifiable::new(self)
    }

    pub(crate) fn scan(&self, from: Position) -> Option<(&(K, V), Position)> {
        self.table.scan(from)
    }
}

pub struct Iter<'a, K, V> {
    inner: table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct IterMut<'a, K, V> {
    inner: table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V, S: HashingStrategy<K>> Extend<(K, V)> for UnifiedMap<K, V, S> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for UnifiedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        map.extend(iter);
        map
    }
}

impl<K, V, S> IntoIterator for UnifiedMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = table::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, S: HashingStrategy<K>> IntoIterator for &'a UnifiedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for UnifiedMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<K, V: PartialEq, S: HashingStrategy<K>> PartialEq for UnifiedMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S: HashingStrategy<K>> fmt::Debug for UnifiedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
