//! UnifiedSet: the set engine and identity pool.
//!
//! Among elements equal under the strategy, the first one inserted stays
//! canonical: `insert` of an equal element is a no-op, `get` returns the
//! stored instance, and `get_or_insert` hands back the stored instance
//! instead of the probe. Rehashing moves elements, so the canonical
//! instance survives growth.

use crate::error::Error;
use crate::strategy::{DefaultStrategy, HashingStrategy};
use crate::table::{self, Position, Table};
use crate::view::Unmodifiable;
use core::fmt;
use core::hash::Hash;

pub use crate::table::{IntoIter, Iter};

pub struct UnifiedSet<T, S = DefaultStrategy> {
    table: Table<T>,
    strategy: S,
}

impl<T: Hash + Eq> UnifiedSet<T> {
    pub fn new() -> Self {
        Self::with_strategy(DefaultStrategy::default())
    }

    /// # Panics
    /// If `capacity` exceeds the largest table; see
    /// [`try_with_capacity_and_strategy`](Self::try_with_capacity_and_strategy).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_strategy(capacity, DefaultStrategy::default())
    }
}

impl<T: Hash + Eq> Default for UnifiedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn checked_slots(capacity: i64) -> Result<usize, Error> {
    let requested = u64::try_from(capacity).map_err(|_| Error::NegativeCapacity(capacity))?;
    usize::try_from(requested)
        .ok()
        .and_then(table::slots_for)
        .ok_or(Error::CapacityOverflow {
            requested,
            max: table::MAX_CAPACITY,
        })
}

pub(crate) fn unsigned_slots(capacity: usize) -> usize {
    match table::slots_for(capacity) {
        Some(slots) => slots,
        None => panic!(
            "{}",
            Error::CapacityOverflow {
                requested: capacity as u64,
                max: table::MAX_CAPACITY,
            }
        ),
    }
}

impl<T, S> UnifiedSet<T, S>
where
    S: HashingStrategy<T>,
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

    /// Validates the requested capacity before allocating anything.
    /// Zero yields the smallest table; negative values are rejected.
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

    /// Elements the set holds before it next rehashes.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of slots holding a collision chain.
    pub fn chained_slots(&self) -> usize {
        self.table.chained_slots()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.get(value).is_some()
    }

    /// Fetches the stored instance equal to `probe`. Never allocates.
    pub fn get(&self, probe: &T) -> Option<&T> {
        let hash = self.strategy.hash(probe);
        self.table.find(hash, |e| self.strategy.equals(e, probe))
    }

    /// Adds `value` unless an equal element is present, in which case the
    /// stored instance is kept and `value` is dropped. Returns whether the
    /// set changed.
    pub fn insert(&mut self, value: T) -> bool {
        let hash = self.strategy.hash(&value);
        let strategy = &self.strategy;
        if self.table.find_index(hash, |e| strategy.equals(e, &value)).is_some() {
            return false;
        }
        self.table.insert_unique(hash, value);
        true
    }

    /// Insert-or-return-existing: returns the canonical instance, which is
    /// `value` itself only when nothing equal was stored.
    pub fn get_or_insert(&mut self, value: T) -> &T {
        let hash = self.strategy.hash(&value);
        let strategy = &self.strategy;
        match self.table.find_index(hash, |e| strategy.equals(e, &value)) {
            Some(index) => &self.table[index],
            None => self.table.insert_unique(hash, value),
        }
    }

    /// Removes and returns the stored instance equal to `probe`.
    pub fn take(&mut self, probe: &T) -> Option<T> {
        let hash = self.strategy.hash(probe);
        let strategy = &self.strategy;
        self.table.remove(hash, |e| strategy.equals(e, probe))
    }

    pub fn remove(&mut self, probe: &T) -> bool {
        self.take(probe).is_some()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.table.retain(|e| keep(e));
    }

    /// Removes every element; the slot array keeps its size.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    /// Rebuilds the set under another strategy by reinserting every
    /// element. Elements that become equal collapse to whichever one the
    /// traversal meets first.
    pub fn rebuild_with<S2: HashingStrategy<T>>(self, strategy: S2) -> UnifiedSet<T, S2> {
        let mut rebuilt = UnifiedSet::with_capacity_and_strategy(self.len(), strategy);
        rebuilt.extend(self.table);
        rebuilt
    }

    /// A mutation-free view with no locking.
    pub fn as_unmodifiable(&self) -> Unmodifiable<'_, Self> {
        Unmodifiable::new(self)
    }

    pub(crate) fn scan(&self, from: Position) -> Option<(&T, Position)> {
        self.table.scan(from)
    }
}

impl<T, S: HashingStrategy<T>> Extend<T> for UnifiedSet<T, S> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Hash + Eq> FromIterator<T> for UnifiedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_capacity(iter.size_hint().0);
        set.extend(iter);
        set
    }
}

impl<T, S> IntoIterator for UnifiedSet<T, S> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        self.table.into_iter()
    }
}

impl<'a, T, S: HashingStrategy<T>> IntoIterator for &'a UnifiedSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Bulk copy: elements are cloned slot by slot, stored hashes included.
impl<T: Clone, S: Clone> Clone for UnifiedSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

/// Membership equality under the left-hand set's strategy.
impl<T, S: HashingStrategy<T>> PartialEq for UnifiedSet<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|e| other.contains(e))
    }
}

impl<T: fmt::Debug, S: HashingStrategy<T>> fmt::Debug for UnifiedSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
