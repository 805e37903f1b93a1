//! A key-value map over the inlined table engine.

use core::fmt::Debug;
use core::hash::{BuildHasher, Hash};

use crate::extract::PairFirst;
use crate::hash_table::{HashTable, Options};
use crate::hopscotch::Hopscotch;
use crate::index::TableIndex;
use crate::sentinel::Sentinel;
use crate::strategy::Strategy;

/// A hash map storing `(K, V)` pairs in the inlined table engine.
///
/// `N` pairs live inline in the map itself; further capacity spills to the
/// heap. The probe strategy `P` is either [`Hopscotch`] (the default
/// choice, no reserved keys) or [`Sentinel<K>`] (reserved empty and deleted
/// key values, no per-slot metadata). Both present exactly the same map
/// surface.
///
/// Unlike the standard map, `insert` never overwrites: inserting a present
/// key leaves the stored pair untouched and returns `false`. Use
/// [`get_mut`](HashMap::get_mut) or
/// [`entry_or_default`](HashMap::entry_or_default) to update in place.
///
/// [`Sentinel<K>`]: Sentinel
pub struct HashMap<K, V, S, P, I = usize, const N: usize = 0>
where
    P: Strategy<(K, V), PairFirst>,
{
    table: HashTable<(K, V), PairFirst, P, S, I, N>,
}

impl<K, V, S, P, I, const N: usize> HashMap<K, V, S, P, I, N>
where
    K: Hash + Eq,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates a map from an explicit probe strategy, hasher, and options.
    pub fn with_probe_and_options(probe: P, hash_builder: S, options: Options) -> Self {
        HashMap {
            table: HashTable::with_options(probe, hash_builder, options),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the allocated slot count: zero or a power of two.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every entry, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Borrows the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.find(key).map(|(_, value)| value)
    }

    /// Mutably borrows the value stored under `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.table.find_mut(key).map(|(_, value)| value)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `key -> value` if `key` is absent.
    ///
    /// Returns `true` if the pair was stored. A present key leaves the map
    /// unchanged and returns `false`; `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.table.insert((key, value)).1
    }

    /// Removes `key`, returning `true` if an entry was erased.
    pub fn remove(&mut self, key: &K) -> bool {
        self.table.erase(key)
    }

    /// Iterates the entries in an unspecified but stable order.
    pub fn iter(&self) -> Iter<'_, K, V, S, P, I, N> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Iterates the keys.
    pub fn keys(&self) -> Keys<'_, K, V, S, P, I, N> {
        Keys { inner: self.iter() }
    }

    /// Iterates the values.
    pub fn values(&self) -> Values<'_, K, V, S, P, I, N> {
        Values { inner: self.iter() }
    }
}

impl<K, V, S, P, I, const N: usize> HashMap<K, V, S, P, I, N>
where
    K: Hash + Eq + Clone,
    V: Default,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    /// Mutably borrows the value under `key`, inserting a defaulted value
    /// first when the key is absent.
    ///
    /// The stored key of a fresh entry is a clone of the looked-up key.
    /// This is the index-into operation of the conventional map interface.
    pub fn entry_or_default(&mut self, key: &K) -> &mut V {
        let (at, _) = self.table.insert_with(key, |key| (key, V::default()));
        &mut self
            .table
            .get_at_mut(at)
            .expect("a just-placed entry is live")
            .1
    }
}

impl<K, V, S, I, const N: usize> HashMap<K, V, S, Hopscotch, I, N>
where
    K: Hash + Eq,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates an empty hopscotch-probed map.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a hopscotch-probed map with a bucket-count hint.
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

impl<K, V, S, I, const N: usize> HashMap<K, V, S, Hopscotch, I, N>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    I: TableIndex,
{
    /// Creates an empty hopscotch-probed map with a defaulted hasher.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a hopscotch-probed map with a bucket-count hint and a
    /// defaulted hasher.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, I, const N: usize> Default for HashMap<K, V, S, Hopscotch, I, N>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    I: TableIndex,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, I, const N: usize> HashMap<K, V, S, Sentinel<K>, I, N>
where
    K: Hash + Eq + Clone,
    V: Default,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates a sentinel-probed map from its reserved key values.
    ///
    /// `empty_key` must never be inserted; `deleted_key` likewise, and it
    /// may only be omitted if the map is never asked to remove anything.
    pub fn with_reserved_keys(empty_key: K, deleted_key: Option<K>, hash_builder: S) -> Self {
        Self::with_reserved_keys_and_options(empty_key, deleted_key, hash_builder, Options::default())
    }

    /// [`with_reserved_keys`](Self::with_reserved_keys) with explicit
    /// capacity and load-factor options.
    pub fn with_reserved_keys_and_options(
        empty_key: K,
        deleted_key: Option<K>,
        hash_builder: S,
        options: Options,
    ) -> Self {
        Self::with_probe_and_options(Sentinel::new(empty_key, deleted_key), hash_builder, options)
    }
}

impl<K, V, S, P, I, const N: usize> Clone for HashMap<K, V, S, P, I, N>
where
    P: Strategy<(K, V), PairFirst> + Clone,
    P::Slot: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        HashMap {
            table: self.table.clone(),
        }
    }
}

impl<K, V, S, P, I, const N: usize> Debug for HashMap<K, V, S, P, I, N>
where
    K: Debug + Hash + Eq,
    V: Debug,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

/// An iterator over a map's `(&K, &V)` pairs.
pub struct Iter<'a, K, V, S, P, I, const N: usize>
where
    P: Strategy<(K, V), PairFirst>,
{
    inner: crate::hash_table::Iter<'a, (K, V), PairFirst, P, S, I, N>,
}

impl<'a, K, V, S, P, I, const N: usize> Iterator for Iter<'a, K, V, S, P, I, N>
where
    K: Hash + Eq,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }
}

/// An iterator over a map's keys.
pub struct Keys<'a, K, V, S, P, I, const N: usize>
where
    P: Strategy<(K, V), PairFirst>,
{
    inner: Iter<'a, K, V, S, P, I, N>,
}

impl<'a, K, V, S, P, I, const N: usize> Iterator for Keys<'a, K, V, S, P, I, N>
where
    K: Hash + Eq,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over a map's values.
pub struct Values<'a, K, V, S, P, I, const N: usize>
where
    P: Strategy<(K, V), PairFirst>,
{
    inner: Iter<'a, K, V, S, P, I, N>,
}

impl<'a, K, V, S, P, I, const N: usize> Iterator for Values<'a, K, V, S, P, I, N>
where
    K: Hash + Eq,
    P: Strategy<(K, V), PairFirst>,
    S: BuildHasher,
    I: TableIndex,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}
