//! serde support: engines travel as `{ strategy, size, elements }` (sets)
//! or `{ strategy, size, entries }` (maps).
//!
//! Slot layout is never written. Deserializing rebuilds a fresh table by
//! ordinary inserts, so only membership and key-to-value association come
//! back; which of several equal instances ends up canonical is not kept.
//! A `size` that disagrees with the rebuilt table is rejected.

use crate::map::UnifiedMap;
use crate::set::UnifiedSet;
use crate::strategy::{DefaultStrategy, HashingStrategy, NullSafe};
use core::fmt;
use core::marker::PhantomData;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, SerializeStruct, Serializer};

impl<B> Serialize for DefaultStrategy<B> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_unit_struct("DefaultStrategy")
    }
}

/// The hasher itself is not written; a fresh one is built on the way in.
impl<'de, B: Default> Deserialize<'de> for DefaultStrategy<B> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UnitVisitor<B>(PhantomData<B>);

        impl<'de, B: Default> Visitor<'de> for UnitVisitor<B> {
            type Value = DefaultStrategy<B>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("unit struct DefaultStrategy")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(DefaultStrategy::with_hasher(B::default()))
            }
        }

        deserializer.deserialize_unit_struct("DefaultStrategy", UnitVisitor(PhantomData))
    }
}

impl<S: Serialize> Serialize for NullSafe<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_newtype_struct("NullSafe", &self.0)
    }
}

impl<'de, S: Deserialize<'de>> Deserialize<'de> for NullSafe<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NewtypeVisitor<S>(PhantomData<S>);

        impl<'de, S: Deserialize<'de>> Visitor<'de> for NewtypeVisitor<S> {
            type Value = NullSafe<S>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("newtype struct NullSafe")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                S::deserialize(deserializer).map(NullSafe)
            }
        }

        deserializer.deserialize_newtype_struct("NullSafe", NewtypeVisitor(PhantomData))
    }
}

// Borrowed sequence of elements, written without collecting.
struct Elements<I>(I);

impl<I> Serialize for Elements<I>
where
    I: Iterator + Clone,
    I::Item: Serialize,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_seq(self.0.clone())
    }
}

impl<T, S> Serialize for UnifiedSet<T, S>
where
    T: Serialize,
    S: Serialize + HashingStrategy<T>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut state = serializer.serialize_struct("UnifiedSet", 3)?;
        state.serialize_field("strategy", self.strategy())?;
        state.serialize_field("size", &self.len())?;
        state.serialize_field("elements", &Elements(self.iter()))?;
        state.end()
    }
}

impl<K, V, S> Serialize for UnifiedMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
    S: Serialize + HashingStrategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut state = serializer.serialize_struct("UnifiedMap", 3)?;
        state.serialize_field("strategy", self.strategy())?;
        state.serialize_field("size", &self.len())?;
        state.serialize_field("entries", &Elements(self.iter()))?;
        state.end()
    }
}

#[derive(serde::Deserialize)]
#[serde(rename = "UnifiedSet")]
struct SetRepr<S, T> {
    strategy: S,
    size: usize,
    elements: Vec<T>,
}

#[derive(serde::Deserialize)]
#[serde(rename = "UnifiedMap")]
struct MapRepr<S, K, V> {
    strategy: S,
    size: usize,
    entries: Vec<(K, V)>,
}

fn size_mismatch<E: de::Error>(declared: usize, rebuilt: usize) -> E {
    E::custom(format_args!(
        "declared size {declared} does not match {rebuilt} distinct elements"
    ))
}

impl<'de, T, S> Deserialize<'de> for UnifiedSet<T, S>
where
    T: Deserialize<'de>,
    S: Deserialize<'de> + HashingStrategy<T>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let SetRepr {
            strategy,
            size,
            elements,
        } = SetRepr::deserialize(deserializer)?;
        let mut set = UnifiedSet::with_capacity_and_strategy(elements.len(), strategy);
        set.extend(elements);
        if set.len() != size {
            return Err(size_mismatch(size, set.len()));
        }
        tracing::debug!(size, "rebuilt set from serialized form");
        Ok(set)
    }
}

impl<'de, K, V, S> Deserialize<'de> for UnifiedMap<K, V, S>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
    S: Deserialize<'de> + HashingStrategy<K>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let MapRepr {
            strategy,
            size,
            entries,
        } = MapRepr::deserialize(deserializer)?;
        let mut map = UnifiedMap::with_capacity_and_strategy(entries.len(), strategy);
        map.extend(entries);
        if map.len() != size {
            return Err(size_mismatch(size, map.len()));
        }
        tracing::debug!(size, "rebuilt map from serialized form");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_layout_is_strategy_size_elements() {
        let set: UnifiedSet<u32> = [5].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "strategy": null, "size": 1, "elements": [5] })
        );
    }

    /// Duplicates collapse on the way in, so the declared size must match
    /// the de-duplicated count.
    #[test]
    fn mismatched_size_is_rejected() {
        let bad = r#"{"strategy":null,"size":3,"elements":[1,1,2]}"#;
        let err = serde_json::from_str::<UnifiedSet<u32>>(bad).unwrap_err();
        assert!(err.to_string().contains("declared size 3"));

        let ok = r#"{"strategy":null,"size":2,"elements":[1,1,2]}"#;
        let set: UnifiedSet<u32> = serde_json::from_str(ok).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn null_safe_strategy_round_trips() {
        let mut set = UnifiedSet::with_strategy(NullSafe(DefaultStrategy::new()));
        set.insert(None);
        set.insert(Some("a".to_string()));
        let text = serde_json::to_string(&set).unwrap();
        let back: UnifiedSet<Option<String>, NullSafe<DefaultStrategy>> =
            serde_json::from_str(&text).unwrap();
        assert_eq!(back, set);
        assert!(back.contains(&None));
    }
}
