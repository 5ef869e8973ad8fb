//! unified-hash: a chained hash set/map engine with pluggable hashing
//! strategies, interning operations and a multi-reader lock wrapper.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one table that serves as a plain set, a key-to-value map and an
//!   identity pool, plus a wrapper that shares it between threads without
//!   letting a caller read or write outside the lock.
//! - Layers:
//!   - Table<E>: slot array of `Empty | Single | Chain`. Each element is
//!     stored with its precomputed hash; no probing into other slots.
//!   - UnifiedSet<T, S> / UnifiedMap<K, V, S>: the engines. They own one
//!     table and one `HashingStrategy` and add the set, map and pool
//!     operations.
//!   - Unmodifiable / SetView / MapView: capability surface shared by the
//!     engines and their views.
//!   - MultiReader<C>: one engine behind a `parking_lot::RwLock`, with
//!     per-call locked methods, a write-excluded `ReadOnly` view and scoped
//!     callbacks that hand out delegates.
//!
//! Constraints
//! - First writer wins: among elements equal under the strategy, the one
//!   inserted first stays canonical. Later equal inserts never replace the
//!   stored element (maps replace only the value).
//! - Load factor 3/4: `len <= slots * 3 / 4` after every operation. Slot
//!   counts are powers of two, at least 8; growth doubles and never shrinks.
//! - The null key is `None` of an `Option<T>` element. `Slot::Empty` is the
//!   only representation of "no element", so absent and present-with-null
//!   never meet.
//!
//! Hasher and rehashing invariants
//! - The strategy is consulted on insert and lookup only. Growth re-places
//!   elements by their stored hash and moves them, so the canonical instance
//!   survives a rehash and no user code runs during it.
//!
//! Lock scopes
//! - A delegate handed to a scoped callback is bound to a scope whose
//!   generational key lives in a slotmap registry. The key is removed before
//!   the lock is released; every access through the delegate (or through a
//!   `ScopedIter` built from it) looks the key up first and fails with
//!   `Error::StaleHandle` once it is gone.
//! - Delegates are `!Send`/`!Sync`. Re-acquiring a lock of the same
//!   `MultiReader` on a thread that already holds one panics.
//!
//! Notes and non-goals
//! - Iteration order is unspecified and may change after growth.
//! - No shrinking; `remove`, `retain` and `clear` keep the slot array.
//! - Lock acquisition blocks indefinitely; there are no timeouts.
//! - Serialization (feature `serde`) preserves membership and key-to-value
//!   association, not layout or canonical identity.

mod error;
mod map;
mod multi_reader;
mod reentrancy;
mod scope;
#[cfg(feature = "serde")]
mod serde_impls;
mod set;
#[cfg(test)]
mod set_proptest;
mod strategy;
mod table;
mod view;

// Public surface
pub use error::Error;
pub use map::UnifiedMap;
pub use multi_reader::{MultiReader, ReadDelegate, ReadOnly, Scan, ScopedIter, WriteDelegate};
pub use set::UnifiedSet;
pub use strategy::{
    DefaultHashBuilder, DefaultStrategy, FnStrategy, HashingStrategy, KeyedBy, NullSafe,
    NULL_KEY_HASH,
};
pub use table::{Position, MAX_CAPACITY};
pub use view::{MapView, SetView, Unmodifiable};

pub mod set_iter {
    //! Iterator types of [`UnifiedSet`](crate::UnifiedSet).
    pub use crate::set::{IntoIter, Iter};
}

pub mod map_iter {
    //! Iterator types of [`UnifiedMap`](crate::UnifiedMap).
    pub use crate::map::{Iter, IterMut};
    pub use crate::table::IntoIter;
}
