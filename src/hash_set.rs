//! A unique-key set over the inlined table engine.

use core::fmt::Debug;
use core::hash::{BuildHasher, Hash};

use crate::extract::Identity;
use crate::hash_table::{HashTable, Options};
use crate::hopscotch::Hopscotch;
use crate::index::TableIndex;
use crate::sentinel::Sentinel;
use crate::strategy::Strategy;

/// A hash set storing unique values in the inlined table engine.
///
/// The element is its own key. Everything else matches [`HashMap`]: `N`
/// values live inline, the probe strategy is [`Hopscotch`] or
/// [`Sentinel<T>`], and inserting a present value is a no-op that returns
/// `false`.
///
/// [`HashMap`]: crate::HashMap
/// [`Sentinel<T>`]: Sentinel
pub struct HashSet<T, S, P, I = usize, const N: usize = 0>
where
    P: Strategy<T, Identity>,
{
    table: HashTable<T, Identity, P, S, I, N>,
}

impl<T, S, P, I, const N: usize> HashSet<T, S, P, I, N>
where
    T: Hash + Eq,
    P: Strategy<T, Identity>,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates a set from an explicit probe strategy, hasher, and options.
    pub fn with_probe_and_options(probe: P, hash_builder: S, options: Options) -> Self {
        HashSet {
            table: HashTable::with_options(probe, hash_builder, options),
        }
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the allocated slot count: zero or a power of two.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every value, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves room for at least `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Returns `true` if `value` is present.
    pub fn contains(&self, value: &T) -> bool {
        self.table.find(value).is_some()
    }

    /// Borrows the stored value equal to `value`.
    pub fn get(&self, value: &T) -> Option<&T> {
        self.table.find(value)
    }

    /// Inserts `value` if absent, returning `true` when it was stored.
    pub fn insert(&mut self, value: T) -> bool {
        self.table.insert(value).1
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.table.erase(value)
    }

    /// Iterates the values in an unspecified but stable order.
    pub fn iter(&self) -> Iter<'_, T, S, P, I, N> {
        Iter {
            inner: self.table.iter(),
        }
    }
}

impl<T, S, I, const N: usize> HashSet<T, S, Hopscotch, I, N>
where
    T: Hash + Eq,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates an empty hopscotch-probed set.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a hopscotch-probed set with a bucket-count hint.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_probe_and_options(
            Hopscotch,
            hash_builder,
            Options {
                initial_buckets: capacity,
                max_load_factor: None,
            },
        )
    }
}

impl<T, S, I, const N: usize> HashSet<T, S, Hopscotch, I, N>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    I: TableIndex,
{
    /// Creates an empty hopscotch-probed set with a defaulted hasher.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a hopscotch-probed set with a bucket-count hint and a
    /// defaulted hasher.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S, I, const N: usize> Default for HashSet<T, S, Hopscotch, I, N>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    I: TableIndex,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, I, const N: usize> HashSet<T, S, Sentinel<T>, I, N>
where
    T: Hash + Eq + Clone,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates a sentinel-probed set from its reserved values.
    ///
    /// `empty_value` must never be inserted; `deleted_value` likewise, and
    /// it may only be omitted if the set is never asked to remove anything.
    pub fn with_reserved_values(
        empty_value: T,
        deleted_value: Option<T>,
        hash_builder: S,
    ) -> Self {
        Self::with_reserved_values_and_options(
            empty_value,
            deleted_value,
            hash_builder,
            Options::default(),
        )
    }

    /// [`with_reserved_values`](Self::with_reserved_values) with explicit
    /// capacity and load-factor options.
    pub fn with_reserved_values_and_options(
        empty_value: T,
        deleted_value: Option<T>,
        hash_builder: S,
        options: Options,
    ) -> Self {
        Self::with_probe_and_options(
            Sentinel::new(empty_value, deleted_value),
            hash_builder,
            options,
        )
    }
}

impl<T, S, P, I, const N: usize> Clone for HashSet<T, S, P, I, N>
where
    P: Strategy<T, Identity> + Clone,
    P::Slot: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        HashSet {
            table: self.table.clone(),
        }
    }
}

impl<T, S, P, I, const N: usize> Debug for HashSet<T, S, P, I, N>
where
    T: Debug + Hash + Eq,
    P: Strategy<T, Identity>,
    S: BuildHasher,
    I: TableIndex,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// An iterator over a set's values.
pub struct Iter<'a, T, S, P, I, const N: usize>
where
    P: Strategy<T, Identity>,
{
    inner: crate::hash_table::Iter<'a, T, Identity, P, S, I, N>,
}

impl<'a, T, S, P, I, const N: usize> Iterator for Iter<'a, T, S, P, I, N>
where
    T: Hash + Eq,
    P: Strategy<T, Identity>,
    S: BuildHasher,
    I: TableIndex,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use core::hash::BuildHasher;
    use std::collections::BTreeSet;
    use std::collections::HashSet as StdHashSet;

    use rand::rngs::OsRng;
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap_or(0),
                k1: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    type HopSet<T, const N: usize> = HashSet<T, SipHashBuilder, Hopscotch, usize, N>;
    type SentinelSet<T, const N: usize> = HashSet<T, SipHashBuilder, Sentinel<T>, usize, N>;

    fn options(max_load: f32) -> Options {
        Options {
            initial_buckets: 0,
            max_load_factor: Some(max_load),
        }
    }

    #[test]
    fn insert_contains_remove() {
        let mut set: HopSet<u64, 8> = HashSet::new();
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.contains(&3));
        assert_eq!(set.get(&3), Some(&3));
        assert!(!set.contains(&4));
        assert!(set.remove(&3));
        assert!(!set.remove(&3));
        assert!(set.is_empty());
    }

    #[test]
    fn full_load_factor_grows_exactly_at_the_ninth_insert() {
        let mut hop: HopSet<u64, 8> =
            HashSet::with_probe_and_options(Hopscotch, SipHashBuilder::default(), options(1.0));
        let mut dense: SentinelSet<u64, 8> = HashSet::with_reserved_values_and_options(
            u64::MAX,
            Some(u64::MAX - 1),
            SipHashBuilder::default(),
            options(1.0),
        );

        for k in 0..8u64 {
            assert!(hop.insert(k));
            assert!(dense.insert(k));
        }
        assert_eq!(hop.capacity(), 8);
        assert_eq!(dense.capacity(), 8);

        assert!(hop.insert(8));
        assert!(dense.insert(8));
        assert_eq!(hop.capacity(), 16);
        assert_eq!(dense.capacity(), 16);

        for k in 0..=8u64 {
            assert!(hop.contains(&k));
            assert!(dense.contains(&k));
        }
    }

    #[test]
    fn half_load_factor_grows_at_the_fifth_insert() {
        let mut hop: HopSet<u64, 8> =
            HashSet::with_probe_and_options(Hopscotch, SipHashBuilder::default(), options(0.5));
        let mut dense: SentinelSet<u64, 8> = HashSet::with_reserved_values_and_options(
            u64::MAX,
            Some(u64::MAX - 1),
            SipHashBuilder::default(),
            options(0.5),
        );

        for k in 0..=8u64 {
            hop.insert(k);
            dense.insert(k);
            let expected = match hop.len() {
                0..=4 => 8,
                5..=8 => 16,
                _ => 32,
            };
            assert_eq!(hop.capacity(), expected, "after {} inserts", k + 1);
            assert_eq!(dense.capacity(), expected, "after {} inserts", k + 1);
        }
    }

    #[test]
    fn capacity_never_shrinks_under_inserts() {
        let mut set: HopSet<u64, 8> = HashSet::new();
        let mut last = set.capacity();
        for k in 0..1000u64 {
            set.insert(k);
            let capacity = set.capacity();
            assert!(capacity >= last);
            assert!(capacity == 0 || capacity.is_power_of_two());
            assert!(set.len() <= 8.max((capacity as f32 * 0.75) as usize));
            last = capacity;
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn randomized_against_a_model_set() {
        let mut set: HopSet<i32, 8> = HashSet::new();
        let mut model: StdHashSet<i32> = StdHashSet::new();
        let mut rng = StdRng::seed_from_u64(2);

        for step in 0..100_000u32 {
            let op = rng.random_range(0..100);
            let value = rng.random_range(0..100);
            if op < 50 {
                assert_eq!(set.insert(value), model.insert(value), "step {step}");
            } else if op < 70 {
                assert_eq!(set.remove(&value), model.remove(&value), "step {step}");
            } else if op < 99 {
                assert_eq!(set.contains(&value), model.contains(&value), "step {step}");
            } else {
                set.clear();
                model.clear();
            }

            assert_eq!(set.len(), model.len());
            assert_eq!(set.is_empty(), model.is_empty());
            if step % 16 == 0 {
                for v in 0..100 {
                    assert_eq!(set.contains(&v), model.contains(&v), "step {step}");
                }
                let values: BTreeSet<i32> = set.iter().copied().collect();
                let model_values: BTreeSet<i32> = model.iter().copied().collect();
                assert_eq!(values, model_values, "step {step}");
            }
            if step % 4096 == 0 {
                set.table.check_consistency();
            }
        }
    }

    #[test]
    fn iteration_covers_each_value_once() {
        let mut set: SentinelSet<u64, 8> =
            HashSet::with_reserved_values(u64::MAX, Some(u64::MAX - 1), SipHashBuilder::default());
        for k in 0..200u64 {
            set.insert(k);
        }
        let mut seen: alloc::vec::Vec<u64> = set.iter().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<alloc::vec::Vec<_>>());
    }

    #[test]
    fn clone_is_independent() {
        let mut set: HopSet<u64, 8> = HashSet::new();
        for k in 0..10u64 {
            set.insert(k);
        }
        let copied = set.clone();
        set.remove(&0);
        assert!(copied.contains(&0));
        assert_eq!(copied.len(), 10);
        assert_eq!(set.len(), 9);
    }

    #[test]
    fn debug_renders_values() {
        let mut set: HopSet<u64, 0> = HashSet::new();
        set.insert(5);
        assert_eq!(std::format!("{set:?}"), "{5}");
    }
}
