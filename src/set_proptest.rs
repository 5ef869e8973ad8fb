#![cfg(test)]

// Property tests for the engines kept inside the crate so they can check
// table internals (load bound, chain collapse) next to the public surface.

use crate::map::UnifiedMap;
use crate::set::UnifiedSet;
use crate::strategy::{DefaultStrategy, HashingStrategy};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};

// Element whose identity (`tag`) is invisible to equality and hashing, so
// the tests can tell which of several equal instances is canonical.
#[derive(Clone, Debug)]
struct Tagged {
    name: String,
    tag: u32,
}

impl PartialEq for Tagged {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tagged {}
impl Hash for Tagged {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

fn tagged(pool: &[String], i: usize, tag: u32) -> Tagged {
    Tagged {
        name: pool[i].clone(),
        tag,
    }
}

// Pool-indexed operations so shrinking moves towards earlier names.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, u32),
    GetOrInsert(usize, u32),
    Take(usize),
    Get(usize),
    Retain(u8),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<u32>()).prop_map(|(i, t)| OpI::Insert(i, t)),
            3 => (idx.clone(), any::<u32>()).prop_map(|(i, t)| OpI::GetOrInsert(i, t)),
            2 => idx.clone().prop_map(OpI::Take),
            2 => idx.clone().prop_map(OpI::Get),
            1 => any::<u8>().prop_map(OpI::Retain),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Keeps names whose length has the bit selected by `mask`.
fn keep(mask: u8, name: &str) -> bool {
    (name.len() as u8 & mask) == 0
}

// State-machine equivalence against a model of `name -> first tag`.
// Invariants exercised across random operation sequences:
// - First writer wins: insert and get_or_insert never replace the stored tag.
// - get / take return the canonical instance; take makes the name absent.
// - iter yields each live element exactly once, with its canonical tag.
// - The load bound holds after every operation and clear keeps the slots.
fn run_set<S: HashingStrategy<Tagged>>(
    mut sut: UnifiedSet<Tagged, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, u32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, t) => {
                let e = tagged(pool, i, t);
                let fresh = !model.contains_key(&e.name);
                prop_assert_eq!(sut.insert(e.clone()), fresh);
                model.entry(e.name).or_insert(t);
            }
            OpI::GetOrInsert(i, t) => {
                let e = tagged(pool, i, t);
                let expected = *model.entry(e.name.clone()).or_insert(t);
                prop_assert_eq!(sut.get_or_insert(e).tag, expected);
            }
            OpI::Take(i) => {
                let probe = tagged(pool, i, u32::MAX);
                let taken = sut.take(&probe).map(|e| e.tag);
                prop_assert_eq!(taken, model.remove(&probe.name));
                prop_assert!(!sut.contains(&probe));
            }
            OpI::Get(i) => {
                let probe = tagged(pool, i, u32::MAX);
                prop_assert_eq!(sut.get(&probe).map(|e| e.tag), model.get(&probe.name).copied());
            }
            OpI::Retain(mask) => {
                sut.retain(|e| keep(mask, &e.name));
                model.retain(|name, _| keep(mask, name));
            }
            OpI::Clear => {
                let slots = sut.capacity();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), slots);
            }
            OpI::Iterate => {
                let seen: BTreeMap<_, _> = sut.iter().map(|e| (e.name.clone(), e.tag)).collect();
                let expected: BTreeMap<_, _> = model.iter().map(|(n, t)| (n.clone(), *t)).collect();
                prop_assert_eq!(sut.iter().len(), seen.len());
                prop_assert_eq!(seen, expected);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.len() <= sut.capacity());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_state_machine((pool, ops) in arb_scenario()) {
        run_set(UnifiedSet::with_capacity(0), &pool, ops)?;
    }
}

// Collision variant using a constant hasher: every element shares a slot,
// so all resolution happens through strategy equality inside one chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = UnifiedSet::with_strategy(DefaultStrategy::with_hasher(ConstBuildHasher));
        run_set(sut, &pool, ops)?;
    }
}

#[derive(Clone, Debug)]
enum MapOp {
    Insert(usize, i32),
    GetOrInsertWith(usize, i32),
    Remove(usize),
    Mutate(usize, i32),
    Retain(i32),
    Iterate,
}

fn arb_map_scenario() -> impl Strategy<Value = (Vec<String>, Vec<MapOp>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| MapOp::Insert(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| MapOp::GetOrInsertWith(i, v)),
            idx.clone().prop_map(MapOp::Remove),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| MapOp::Mutate(i, d)),
            any::<i32>().prop_map(MapOp::Retain),
            Just(MapOp::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Map state machine against std::collections::HashMap: insert returns the
// replaced value, get_or_insert_with runs its default only when absent, and
// iteration matches the model's key/value pairs.
fn run_map<S: HashingStrategy<String>>(
    mut sut: UnifiedMap<String, i32, S>,
    pool: &[String],
    ops: Vec<MapOp>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        match op {
            MapOp::Insert(i, v) => {
                let k = pool[i].clone();
                prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
            }
            MapOp::GetOrInsertWith(i, v) => {
                let k = pool[i].clone();
                let present = model.contains_key(&k);
                let mut ran = false;
                let got = *sut.get_or_insert_with(k.clone(), || {
                    ran = true;
                    v
                });
                prop_assert_eq!(ran, !present);
                prop_assert_eq!(got, *model.entry(k).or_insert(v));
            }
            MapOp::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k), model.remove(k));
            }
            MapOp::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(v) = sut.get_mut(k) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.get_mut(k) {
                    *v = v.wrapping_add(d);
                }
            }
            MapOp::Retain(pivot) => {
                sut.retain(|_, v| *v >= pivot);
                model.retain(|_, v| *v >= pivot);
            }
            MapOp::Iterate => {
                let seen: BTreeMap<_, _> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let expected: BTreeMap<_, _> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(seen, expected);
                let keys: BTreeSet<_> = sut.keys().cloned().collect();
                prop_assert_eq!(keys.len(), sut.len());
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        for k in pool {
            prop_assert_eq!(sut.get(k), model.get(k));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_map_state_machine((pool, ops) in arb_map_scenario()) {
        run_map(UnifiedMap::new(), &pool, ops)?;
    }

    #[test]
    fn prop_map_state_machine_with_collisions((pool, ops) in arb_map_scenario()) {
        let sut = UnifiedMap::with_strategy(DefaultStrategy::with_hasher(ConstBuildHasher));
        run_map(sut, &pool, ops)?;
    }
}
