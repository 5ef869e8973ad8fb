//! Hashing strategies: the (hash, equals) pair a table consults instead of
//! the element's own notion of equality.
//!
//! A strategy is a value handed to a table at construction, so the same
//! element type can live in two tables under two different equalities at
//! the same time. The contract is the usual one: `equals` is an equivalence
//! relation and `equals(a, b)` implies `hash(a) == hash(b)`.

use core::fmt;
use core::hash::{BuildHasher, Hash};

pub use hashbrown::hash_map::DefaultHashBuilder;

/// Hash and equality for `T`, swappable per table instance.
pub trait HashingStrategy<T: ?Sized> {
    fn hash(&self, value: &T) -> u64;
    fn equals(&self, a: &T, b: &T) -> bool;
}

impl<T: ?Sized, S: HashingStrategy<T> + ?Sized> HashingStrategy<T> for &S {
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        (**self).hash(value)
    }
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        (**self).equals(a, b)
    }
}

/// Delegates to the element's own `Hash` and `Eq`.
#[derive(Clone, Default)]
pub struct DefaultStrategy<B = DefaultHashBuilder> {
    pub(crate) build_hasher: B,
}

impl DefaultStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B> DefaultStrategy<B> {
    pub fn with_hasher(build_hasher: B) -> Self {
        Self { build_hasher }
    }
}

impl<B> fmt::Debug for DefaultStrategy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultStrategy")
    }
}

impl<T, B> HashingStrategy<T> for DefaultStrategy<B>
where
    T: ?Sized + Hash + Eq,
    B: BuildHasher,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.build_hasher.hash_one(value)
    }
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Compares elements by a projected key, e.g. `KeyedBy::new(|p: &Person| p.id)`.
#[derive(Clone)]
pub struct KeyedBy<F, B = DefaultHashBuilder> {
    key: F,
    build_hasher: B,
}

impl<F> KeyedBy<F> {
    pub fn new(key: F) -> Self {
        Self::with_hasher(key, DefaultHashBuilder::default())
    }
}

impl<F, B> KeyedBy<F, B> {
    pub fn with_hasher(key: F, build_hasher: B) -> Self {
        Self { key, build_hasher }
    }
}

impl<F, B> fmt::Debug for KeyedBy<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyedBy")
    }
}

impl<T, U, F, B> HashingStrategy<T> for KeyedBy<F, B>
where
    F: Fn(&T) -> U,
    U: Hash + Eq,
    B: BuildHasher,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.build_hasher.hash_one((self.key)(value))
    }
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        (self.key)(a) == (self.key)(b)
    }
}

/// A strategy assembled from an explicit pair of closures.
#[derive(Clone)]
pub struct FnStrategy<H, E> {
    hash: H,
    equals: E,
}

impl<H, E> FnStrategy<H, E> {
    pub fn new(hash: H, equals: E) -> Self {
        Self { hash, equals }
    }
}

impl<H, E> fmt::Debug for FnStrategy<H, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnStrategy")
    }
}

impl<T, H, E> HashingStrategy<T> for FnStrategy<H, E>
where
    T: ?Sized,
    H: Fn(&T) -> u64,
    E: Fn(&T, &T) -> bool,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        (self.hash)(value)
    }
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        (self.equals)(a, b)
    }
}

/// Hash reported for the null key by [`NullSafe`].
///
/// Every `None` lands in the same slot; `Some` values that happen to share
/// the hash are told apart by `equals`, never by the hash alone.
pub const NULL_KEY_HASH: u64 = 0x9e37_79b9_7f4a_7c15;

/// Lifts a strategy over `T` to `Option<T>`, treating `None` as the null key.
#[derive(Clone, Debug, Default)]
pub struct NullSafe<S>(pub S);

impl<T, S: HashingStrategy<T>> HashingStrategy<Option<T>> for NullSafe<S> {
    #[inline]
    fn hash(&self, value: &Option<T>) -> u64 {
        match value {
            None => NULL_KEY_HASH,
            Some(v) => self.0.hash(v),
        }
    }
    #[inline]
    fn equals(&self, a: &Option<T>, b: &Option<T>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.0.equals(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_insensitive() -> KeyedBy<fn(&String) -> String> {
        KeyedBy::new(|s: &String| s.to_ascii_lowercase())
    }

    #[test]
    fn default_strategy_agrees_with_eq() {
        let s = DefaultStrategy::new();
        assert!(s.equals("abc", "abc"));
        assert!(!s.equals("abc", "abd"));
        assert_eq!(
            HashingStrategy::<str>::hash(&s, "abc"),
            HashingStrategy::<str>::hash(&s, "abc")
        );
    }

    /// Equal under the projection implies equal hashes.
    #[test]
    fn keyed_by_hash_consistent_with_equals() {
        let s = case_insensitive();
        let (a, b) = ("Hello".to_string(), "hELLO".to_string());
        assert!(s.equals(&a, &b));
        assert_eq!(s.hash(&a), s.hash(&b));
        assert!(!s.equals(&a, &"world".to_string()));
    }

    #[test]
    fn fn_strategy_uses_given_closures() {
        let s = FnStrategy::new(|_: &i32| 7, |a: &i32, b: &i32| a % 10 == b % 10);
        assert_eq!(s.hash(&1), 7);
        assert!(s.equals(&13, &3));
        assert!(!s.equals(&13, &4));
    }

    #[test]
    fn null_safe_separates_none_from_every_value() {
        let s = NullSafe(DefaultStrategy::new());
        assert!(s.equals(&None::<u32>, &None));
        assert!(!s.equals(&None, &Some(0u32)));
        assert!(s.equals(&Some(5u32), &Some(5)));
        assert_eq!(s.hash(&None::<u32>), NULL_KEY_HASH);
    }
}
