//! Table: the slot array shared by every engine.
//!
//! Each slot is `Empty`, a `Single` bucket, or a `Chain` of buckets whose
//! hashes landed on the same index. Collisions are resolved inside the
//! slot; a lookup never visits a second slot. Buckets carry the strategy
//! hash computed at insertion, so a rehash re-places elements without
//! calling back into user code.
//!
//! The table itself knows nothing about equality: callers pass the hash and
//! an `eq` predicate, the same shape as `hashbrown::HashTable`.

use core::mem;
use core::ops::{Index, IndexMut};
use core::slice;
use std::vec;

/// Load factor numerator/denominator: `len <= slots * 3 / 4`.
const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

/// Smallest table handed out, including for a requested capacity of zero.
pub(crate) const MIN_SLOTS: usize = 8;

/// Largest slot count; also keeps the Fibonacci shift in range.
pub(crate) const MAX_SLOTS: usize = 1 << (usize::BITS - 2);

/// Largest element count a table can be asked for up front.
pub const MAX_CAPACITY: usize = MAX_SLOTS / LOAD_DEN * LOAD_NUM;

const FIBONACCI: u64 = 0x9e37_79b9_7f4a_7c15;

/// Slot count for `requested` elements: the smallest power of two, at least
/// [`MIN_SLOTS`], that keeps `requested` within the load factor.
pub(crate) fn slots_for(requested: usize) -> Option<usize> {
    let needed = requested.checked_mul(LOAD_DEN)?.div_ceil(LOAD_NUM);
    let slots = needed.max(MIN_SLOTS).checked_next_power_of_two()?;
    (slots <= MAX_SLOTS).then_some(slots)
}

#[derive(Clone, Debug)]
pub(crate) struct Bucket<E> {
    hash: u64,
    value: E,
}

#[derive(Clone, Debug)]
pub(crate) enum Slot<E> {
    Empty,
    Single(Bucket<E>),
    Chain(Vec<Bucket<E>>),
}

impl<E> Default for Slot<E> {
    fn default() -> Self {
        Slot::Empty
    }
}

impl<E> Slot<E> {
    fn position(&self, hash: u64, mut eq: impl FnMut(&E) -> bool) -> Option<usize> {
        match self {
            Slot::Empty => None,
            Slot::Single(b) => (b.hash == hash && eq(&b.value)).then_some(0),
            Slot::Chain(chain) => chain.iter().position(|b| b.hash == hash && eq(&b.value)),
        }
    }

    fn get(&self, pos: usize) -> Option<&E> {
        match self {
            Slot::Single(b) if pos == 0 => Some(&b.value),
            Slot::Chain(chain) => chain.get(pos).map(|b| &b.value),
            _ => None,
        }
    }

    fn get_mut(&mut self, pos: usize) -> Option<&mut E> {
        match self {
            Slot::Single(b) if pos == 0 => Some(&mut b.value),
            Slot::Chain(chain) => chain.get_mut(pos).map(|b| &mut b.value),
            _ => None,
        }
    }

    fn push(&mut self, bucket: Bucket<E>) -> &mut E {
        *self = match mem::take(self) {
            Slot::Empty => Slot::Single(bucket),
            Slot::Single(first) => Slot::Chain(vec![first, bucket]),
            Slot::Chain(mut chain) => {
                chain.push(bucket);
                Slot::Chain(chain)
            }
        };
        match self {
            Slot::Single(b) => &mut b.value,
            Slot::Chain(chain) => {
                &mut chain
                    .last_mut()
                    .expect("chain is non-empty right after a push")
                    .value
            }
            Slot::Empty => unreachable!("slot was filled above"),
        }
    }

    /// Takes the bucket at `pos`, collapsing a chain of one back to `Single`.
    fn take(&mut self, pos: usize) -> Option<Bucket<E>> {
        match mem::take(self) {
            Slot::Single(b) if pos == 0 => Some(b),
            Slot::Chain(mut chain) if pos < chain.len() => {
                let taken = chain.remove(pos);
                *self = Self::from_chain(chain);
                Some(taken)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    fn from_chain(mut chain: Vec<Bucket<E>>) -> Self {
        match chain.len() {
            0 => Slot::Empty,
            1 => chain.pop().map_or(Slot::Empty, Slot::Single),
            _ => Slot::Chain(chain),
        }
    }

    fn len(&self) -> usize {
        match self {
            Slot::Empty => 0,
            Slot::Single(_) => 1,
            Slot::Chain(chain) => chain.len(),
        }
    }

    /// Filters in place. A chain may be left with fewer than two buckets;
    /// [`Slot::collapse`] restores the shape.
    fn retain(&mut self, mut keep: impl FnMut(&mut E) -> bool) {
        match self {
            Slot::Empty => {}
            Slot::Single(b) => {
                if !keep(&mut b.value) {
                    *self = Slot::Empty;
                }
            }
            Slot::Chain(chain) => chain.retain_mut(|b| keep(&mut b.value)),
        }
    }

    fn collapse(&mut self) {
        if let Slot::Chain(chain) = self {
            if chain.len() < 2 {
                *self = Self::from_chain(mem::take(chain));
            }
        }
    }
}

/// Re-establishes `len` and the chain shape when a `retain` pass ends,
/// including by unwinding out of the caller's predicate.
struct RetainGuard<'a, E> {
    table: &'a mut Table<E>,
}

impl<E> Drop for RetainGuard<'_, E> {
    fn drop(&mut self) {
        let mut len = 0;
        for slot in self.table.slots.iter_mut() {
            slot.collapse();
            len += slot.len();
        }
        self.table.len = len;
    }
}

/// Location of one element: slot index plus position inside the slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct BucketIndex {
    slot: usize,
    pos: usize,
}

/// Resume point for a positional scan. Stays meaningful across mutation in
/// the sense that it never indexes out of bounds; elements moved by a
/// rehash may be skipped or seen twice.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    slot: usize,
    pos: usize,
}

#[derive(Clone)]
pub(crate) struct Table<E> {
    slots: Box<[Slot<E>]>,
    len: usize,
}

fn empty_slots<E>(n: usize) -> Box<[Slot<E>]> {
    let mut slots = Vec::with_capacity(n);
    slots.resize_with(n, Slot::default);
    slots.into_boxed_slice()
}

impl<E> Table<E> {
    /// Builds a table for `slot_count` slots, which must come from [`slots_for`].
    pub(crate) fn with_slots(slot_count: usize) -> Self {
        debug_assert!(slot_count.is_power_of_two() && slot_count >= MIN_SLOTS);
        Self {
            slots: empty_slots(slot_count),
            len: 0,
        }
    }

    pub(crate) fn new() -> Self {
        Self::with_slots(MIN_SLOTS)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots (the table length, not the element bound).
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Elements the table holds before its next rehash.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len() / LOAD_DEN * LOAD_NUM
    }

    /// Slots currently holding a chain; a collision diagnostic.
    pub(crate) fn chained_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Chain(_)))
            .count()
    }

    #[inline]
    fn slot_for(&self, hash: u64) -> usize {
        let bits = self.slots.len().trailing_zeros();
        (hash.wrapping_mul(FIBONACCI) >> (u64::BITS - bits)) as usize
    }

    pub(crate) fn find_index(&self, hash: u64, eq: impl FnMut(&E) -> bool) -> Option<BucketIndex> {
        let slot = self.slot_for(hash);
        self.slots[slot]
            .position(hash, eq)
            .map(|pos| BucketIndex { slot, pos })
    }

    pub(crate) fn find(&self, hash: u64, eq: impl FnMut(&E) -> bool) -> Option<&E> {
        let slot = &self.slots[self.slot_for(hash)];
        slot.position(hash, eq).and_then(|pos| slot.get(pos))
    }

    pub(crate) fn find_mut(&mut self, hash: u64, eq: impl FnMut(&E) -> bool) -> Option<&mut E> {
        let index = self.find_index(hash, eq)?;
        self.slots[index.slot].get_mut(index.pos)
    }

    /// Places `value`, which the caller has checked is not already present.
    /// Grows first when this element would break the load factor, so the
    /// returned reference points at its final position.
    pub(crate) fn insert_unique(&mut self, hash: u64, value: E) -> &mut E {
        if self.len + 1 > self.capacity() {
            self.grow();
        }
        self.len += 1;
        let slot = self.slot_for(hash);
        self.slots[slot].push(Bucket { hash, value })
    }

    pub(crate) fn remove(&mut self, hash: u64, eq: impl FnMut(&E) -> bool) -> Option<E> {
        let index = self.find_index(hash, eq)?;
        let bucket = self.slots[index.slot].take(index.pos)?;
        self.len -= 1;
        Some(bucket.value)
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&mut E) -> bool) {
        let mut guard = RetainGuard { table: self };
        for slot in guard.table.slots.iter_mut() {
            slot.retain(&mut keep);
        }
    }

    /// Empties every slot; the slot array keeps its length.
    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = Slot::Empty);
        self.len = 0;
    }

    fn grow(&mut self) {
        let next = self
            .slots
            .len()
            .checked_mul(2)
            .filter(|&n| n <= MAX_SLOTS)
            .expect("table capacity overflow");
        self.rehash(next);
    }

    /// Full rehash into `slot_count` slots, re-placing every bucket by its
    /// stored hash. Elements are moved, never cloned.
    fn rehash(&mut self, slot_count: usize) {
        tracing::trace!(
            from = self.slots.len(),
            to = slot_count,
            len = self.len,
            "rehashing table"
        );
        let old = mem::replace(&mut self.slots, empty_slots(slot_count));
        for slot in old.into_vec() {
            match slot {
                Slot::Empty => {}
                Slot::Single(b) => self.place(b),
                Slot::Chain(chain) => chain.into_iter().for_each(|b| self.place(b)),
            }
        }
    }

    #[inline]
    fn place(&mut self, bucket: Bucket<E>) {
        let slot = self.slot_for(bucket.hash);
        self.slots[slot].push(bucket);
    }

    /// Next element at or after `from`, plus the position after it.
    pub(crate) fn scan(&self, from: Position) -> Option<(&E, Position)> {
        let Position { mut slot, mut pos } = from;
        while let Some(s) = self.slots.get(slot) {
            if let Some(value) = s.get(pos) {
                let next = match s {
                    Slot::Chain(_) => Position { slot, pos: pos + 1 },
                    _ => Position { slot: slot + 1, pos: 0 },
                };
                return Some((value, next));
            }
            slot += 1;
            pos = 0;
        }
        None
    }

    pub(crate) fn iter(&self) -> Iter<'_, E> {
        Iter {
            slots: self.slots.iter(),
            chain: Default::default(),
            remaining: self.len,
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, E> {
        IterMut {
            remaining: self.len,
            slots: self.slots.iter_mut(),
            chain: Default::default(),
        }
    }
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Index<BucketIndex> for Table<E> {
    type Output = E;

    fn index(&self, index: BucketIndex) -> &E {
        self.slots[index.slot]
            .get(index.pos)
            .expect("bucket index refers to a live element")
    }
}

impl<E> IndexMut<BucketIndex> for Table<E> {
    fn index_mut(&mut self, index: BucketIndex) -> &mut E {
        self.slots[index.slot]
            .get_mut(index.pos)
            .expect("bucket index refers to a live element")
    }
}

/// Borrowing iterator over the occupied slots.
pub struct Iter<'a, E> {
    slots: slice::Iter<'a, Slot<E>>,
    chain: slice::Iter<'a, Bucket<E>>,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        loop {
            if let Some(b) = self.chain.next() {
                self.remaining -= 1;
                return Some(&b.value);
            }
            match self.slots.next()? {
                Slot::Empty => {}
                Slot::Single(b) => {
                    self.remaining -= 1;
                    return Some(&b.value);
                }
                Slot::Chain(chain) => self.chain = chain.iter(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for Iter<'_, E> {}

impl<E> Clone for Iter<'_, E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            chain: self.chain.clone(),
            remaining: self.remaining,
        }
    }
}

/// Mutable iterator over the occupied slots.
pub struct IterMut<'a, E> {
    slots: slice::IterMut<'a, Slot<E>>,
    chain: slice::IterMut<'a, Bucket<E>>,
    remaining: usize,
}

impl<'a, E> Iterator for IterMut<'a, E> {
    type Item = &'a mut E;

    fn next(&mut self) -> Option<&'a mut E> {
        loop {
            if let Some(b) = self.chain.next() {
                self.remaining -= 1;
                return Some(&mut b.value);
            }
            match self.slots.next()? {
                Slot::Empty => {}
                Slot::Single(b) => {
                    self.remaining -= 1;
                    return Some(&mut b.value);
                }
                Slot::Chain(chain) => self.chain = chain.iter_mut(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for IterMut<'_, E> {}

/// Owning iterator; yields elements in slot order.
pub struct IntoIter<E> {
    slots: vec::IntoIter<Slot<E>>,
    chain: vec::IntoIter<Bucket<E>>,
    remaining: usize,
}

impl<E> Iterator for IntoIter<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        loop {
            if let Some(b) = self.chain.next() {
                self.remaining -= 1;
                return Some(b.value);
            }
            match self.slots.next()? {
                Slot::Empty => {}
                Slot::Single(b) => {
                    self.remaining -= 1;
                    return Some(b.value);
                }
                Slot::Chain(chain) => self.chain = chain.into_iter(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for IntoIter<E> {}

impl<E> IntoIterator for Table<E> {
    type Item = E;
    type IntoIter = IntoIter<E>;

    fn into_iter(self) -> IntoIter<E> {
        IntoIter {
            remaining: self.len,
            slots: self.slots.into_vec().into_iter(),
            chain: Vec::new().into_iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(t: &mut Table<u32>, hash: u64, v: u32) -> bool {
        if t.find_index(hash, |e| *e == v).is_some() {
            return false;
        }
        t.insert_unique(hash, v);
        true
    }

    /// Requested sizes map to the smallest power of two honouring 0.75.
    #[test]
    fn capacity_sequence() {
        assert_eq!(slots_for(0), Some(8));
        assert_eq!(slots_for(6), Some(8));
        assert_eq!(slots_for(7), Some(16));
        assert_eq!(slots_for(12), Some(16));
        assert_eq!(slots_for(13), Some(32));
        assert_eq!(slots_for(1000), Some(2048));
        assert_eq!(slots_for(MAX_CAPACITY), Some(MAX_SLOTS));
        assert_eq!(slots_for(MAX_CAPACITY + 1), None);
        assert_eq!(slots_for(usize::MAX), None);
        for n in 0..2000 {
            let slots = slots_for(n).unwrap();
            assert!(n <= slots / 4 * 3, "n={n} slots={slots}");
        }
    }

    /// Colliding hashes share a slot as a chain; removing down to one
    /// element collapses the chain back to a single bucket.
    #[test]
    fn chain_grows_and_collapses() {
        let mut t = Table::new();
        assert!(insert(&mut t, 42, 1));
        assert_eq!(t.chained_slots(), 0);
        assert!(insert(&mut t, 42, 2));
        assert!(insert(&mut t, 42, 3));
        assert_eq!(t.chained_slots(), 1);
        assert!(!insert(&mut t, 42, 2));
        assert_eq!(t.len(), 3);

        assert_eq!(t.remove(42, |e| *e == 2), Some(2));
        assert_eq!(t.chained_slots(), 1);
        assert_eq!(t.remove(42, |e| *e == 1), Some(1));
        assert_eq!(t.chained_slots(), 0);
        assert_eq!(t.find(42, |e| *e == 3), Some(&3));
        assert_eq!(t.remove(42, |e| *e == 3), Some(3));
        assert!(t.is_empty());
        assert_eq!(t.remove(42, |e| *e == 3), None);
    }

    /// A matching hash alone never counts as a hit.
    #[test]
    fn single_slot_requires_equality() {
        let mut t = Table::new();
        t.insert_unique(7, 1u32);
        assert!(t.find(7, |e| *e == 2).is_none());
        assert!(t.find(8, |e| *e == 1).is_none());
    }

    /// Growth doubles the slot array once the load factor would be crossed,
    /// and every element stays reachable afterwards.
    #[test]
    fn grows_past_load_factor() {
        let mut t = Table::new();
        for v in 0..6u32 {
            t.insert_unique(u64::from(v) * 31, v);
        }
        assert_eq!(t.slot_count(), 8);
        t.insert_unique(6 * 31, 6);
        assert_eq!(t.slot_count(), 16);
        for v in 0..7u32 {
            assert_eq!(t.find(u64::from(v) * 31, |e| *e == v), Some(&v));
        }
    }

    /// Removal and clear never shrink the slot array.
    #[test]
    fn remove_and_clear_keep_slots() {
        let mut t = Table::new();
        for v in 0..100u32 {
            t.insert_unique(u64::from(v), v);
        }
        let slots = t.slot_count();
        for v in 0..100u32 {
            assert_eq!(t.remove(u64::from(v), |e| *e == v), Some(v));
        }
        assert_eq!(t.slot_count(), slots);
        t.insert_unique(1, 1);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.slot_count(), slots);
    }

    #[test]
    fn retain_updates_len_and_collapses() {
        let mut t = Table::new();
        for v in 0..4u32 {
            t.insert_unique(5, v);
        }
        assert_eq!(t.chained_slots(), 1);
        t.retain(|e| *e == 3);
        assert_eq!(t.len(), 1);
        assert_eq!(t.chained_slots(), 0);
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    /// Invariant: a predicate that panics midway leaves `len` equal to the
    /// elements still stored, and chains keep at least two buckets.
    #[test]
    fn panicking_retain_keeps_len_consistent() {
        let mut t = Table::new();
        for v in 0..4u32 {
            t.insert_unique(5, v);
        }
        for v in 4..20u32 {
            t.insert_unique(u64::from(v) << 40, v);
        }
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            t.retain(|e| {
                assert_ne!(*e, 2, "predicate failure");
                *e != 1
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(t.len(), t.iter().count());
        assert_eq!(t.iter().len(), t.len());
        assert!(t.find(5, |e| *e == 2).is_some());
        assert!(t.slots.iter().all(|s| !matches!(s, Slot::Chain(c) if c.len() < 2)));
    }

    /// `scan` visits each element once when the table is left alone.
    #[test]
    fn scan_matches_iter() {
        let mut t = Table::new();
        for v in 0..50u32 {
            t.insert_unique(u64::from(v % 7), v);
        }
        let mut scanned = Vec::new();
        let mut at = Position::default();
        while let Some((v, next)) = t.scan(at) {
            scanned.push(*v);
            at = next;
        }
        let mut iterated: Vec<_> = t.iter().copied().collect();
        scanned.sort_unstable();
        iterated.sort_unstable();
        assert_eq!(scanned, iterated);
        assert_eq!(t.iter().len(), 50);
    }

    #[test]
    fn iter_mut_and_into_iter_cover_chains() {
        let mut t = Table::new();
        for v in 0..5u32 {
            t.insert_unique(1, v);
        }
        for v in t.iter_mut() {
            *v *= 10;
        }
        let mut all: Vec<_> = t.into_iter().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 10, 20, 30, 40]);
    }
}
