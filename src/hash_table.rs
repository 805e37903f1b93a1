//! The table engine shared by the map and set facades.
//!
//! [`HashTable`] owns the slot storage, the probe strategy, the hasher, and
//! all size and capacity bookkeeping. It is parameterized over the element
//! type `E`, a key extractor `X`, a probe strategy `P`, a `BuildHasher`
//! `S`, an index type `I`, and the inline slot count `N`. Capacities are
//! always zero or a power of two at least `N`, so every probe can mask
//! instead of taking a modulus.
//!
//! The engine performs no probing itself: lookups, placements, and releases
//! are delegated to the strategy, which owns the occupancy encoding. What
//! the engine does own is the growth policy (the load-factor budget, the
//! grow-and-retry insert loop, and migration into fresh storage) and the
//! iteration protocol.

use core::fmt::Debug;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;

use crate::extract::ExtractKey;
use crate::index::TableIndex;
use crate::storage::Storage;
use crate::strategy::{Placement, Strategy};

/// How many grow-and-retry rounds a single insert may consume before the
/// table declares its configuration broken.
const MAX_GROW_RETRIES: usize = 4;

/// Construction options shared by both strategies.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Initial bucket-count hint, rounded up to the capacity rules.
    pub initial_buckets: usize,
    /// Maximum load factor in `(0, 1]`; `None` uses the strategy default.
    pub max_load_factor: Option<f32>,
}

/// Rounds a desired element count up to a legal capacity.
///
/// A single element in a fully heap-allocated table gets the conventional
/// 32-slot starter table; everything else is scaled by the load factor,
/// clamped to the inline capacity, and rounded to a power of two. Zero
/// stays zero: default-constructed tables allocate nothing.
fn compute_capacity<const N: usize>(desired: usize, max_load: f32) -> usize {
    if desired == 1 && N == 0 {
        return 32;
    }
    let scaled = desired as f32 / max_load;
    let mut capacity = scaled as usize;
    if (capacity as f32) < scaled {
        capacity += 1;
    }
    if capacity < N {
        capacity = N;
    }
    if capacity == 0 {
        return 0;
    }
    capacity.next_power_of_two()
}

#[inline(always)]
fn load_budget(capacity: usize, max_load: f32) -> usize {
    (capacity as f32 * max_load) as usize
}

/// The open-addressed table engine underlying [`HashMap`] and [`HashSet`].
///
/// This is a low-level structure: it stores whole elements and works in
/// terms of the key extracted from them. Prefer the facades unless you are
/// building your own container shape.
///
/// [`HashMap`]: crate::HashMap
/// [`HashSet`]: crate::HashSet
pub struct HashTable<E, X, P, S, I, const N: usize>
where
    X: ExtractKey<E>,
    P: Strategy<E, X>,
{
    storage: Storage<P::Slot, N>,
    size: usize,
    capacity: usize,
    max_live: usize,
    max_load: f32,
    probe: P,
    hash_builder: S,
    _marker: PhantomData<(E, X, I)>,
}

impl<E, X, P, S, I, const N: usize> HashTable<E, X, P, S, I, N>
where
    X: ExtractKey<E>,
    X::Key: Hash + Eq,
    P: Strategy<E, X>,
    S: BuildHasher,
    I: TableIndex,
{
    /// Creates a table from a probe strategy, hasher, and options.
    ///
    /// # Panics
    ///
    /// Panics if `N` is not zero or a power of two, if the requested load
    /// factor is not positive, or if the initial capacity does not fit the
    /// index type.
    pub fn with_options(mut probe: P, hash_builder: S, options: Options) -> Self {
        assert!(
            N == 0 || N.is_power_of_two(),
            "inline capacity must be a power of two"
        );
        let max_load = match options.max_load_factor {
            Some(factor) => {
                assert!(factor > 0.0, "max load factor must be positive");
                factor.min(1.0)
            }
            None => probe.default_max_load(),
        };

        let capacity = compute_capacity::<N>(options.initial_buckets, max_load);
        assert!(
            capacity == 0 || capacity - 1 < I::END.to_usize(),
            "capacity exceeds the index type"
        );
        let storage = Storage::all_free(capacity, || probe.free_slot());
        let max_live = load_budget(capacity, max_load);
        probe.reset_budget(max_live);

        HashTable {
            storage,
            size: 0,
            capacity,
            max_live,
            max_load,
            probe,
            hash_builder,
            _marker: PhantomData,
        }
    }

    /// Returns the number of live elements.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the allocated slot count: zero or a power of two.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configured maximum load factor.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load
    }

    #[inline(always)]
    fn hash_key(&self, key: &X::Key) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn find_index(&self, key: &X::Key) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        let hash = self.hash_key(key);
        self.probe.find(&self.storage, self.capacity - 1, key, hash)
    }

    /// Borrows the element stored under `key`.
    pub fn find(&self, key: &X::Key) -> Option<&E> {
        let index = self.find_index(key)?;
        Some(self.probe.element(&self.storage, index))
    }

    /// Mutably borrows the element stored under `key`.
    ///
    /// Mutating the key field of the returned element corrupts the table;
    /// facades only hand out the non-key parts.
    pub fn find_mut(&mut self, key: &X::Key) -> Option<&mut E> {
        let index = self.find_index(key)?;
        Some(self.probe.element_mut(&mut self.storage, index))
    }

    /// Inserts `elem` under its extracted key.
    ///
    /// Returns the element's position and whether a new element was stored.
    /// An element with an equal key already present is left untouched and
    /// reported as `(position, false)`.
    pub fn insert(&mut self, elem: E) -> (I, bool) {
        let hash = self.hash_key(X::key(&elem));
        if let Some(index) = self.find_for_hash(X::key(&elem), hash) {
            return (I::from_usize(index), false);
        }
        let (index, fresh) = self.find_or_claim(X::key(&elem), hash);
        if fresh {
            self.probe.fill(&mut self.storage, index, elem);
            self.size += 1;
        }
        (I::from_usize(index), fresh)
    }

    /// Finds `key` or inserts an element built by `make` from a clone of
    /// it. This backs the map's index-into operation: absent keys get a
    /// fresh element carrying the looked-up key.
    pub fn insert_with(&mut self, key: &X::Key, make: impl FnOnce(X::Key) -> E) -> (I, bool)
    where
        X::Key: Clone,
    {
        let hash = self.hash_key(key);
        if let Some(index) = self.find_for_hash(key, hash) {
            return (I::from_usize(index), false);
        }
        let (index, fresh) = self.find_or_claim(key, hash);
        if fresh {
            self.probe.fill(&mut self.storage, index, make(key.clone()));
            self.size += 1;
        }
        (I::from_usize(index), fresh)
    }

    fn find_for_hash(&self, key: &X::Key, hash: u64) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        self.probe.find(&self.storage, self.capacity - 1, key, hash)
    }

    /// Claims a slot for an absent `key`, growing the table as needed.
    fn find_or_claim(&mut self, key: &X::Key, hash: u64) -> (usize, bool) {
        if self.size + 1 > self.max_live {
            self.grow(1);
        }
        for _ in 0..MAX_GROW_RETRIES {
            let mask = self.capacity - 1;
            match self.probe.place(&mut self.storage, mask, key, hash) {
                Placement::Found(index) => return (index, false),
                Placement::Free(index) => return (index, true),
                Placement::Full => self.grow(1),
            }
        }
        panic!(
            "failed to place a key after repeated growth; \
             the hasher or the reserved keys are broken"
        );
    }

    /// Erases `key`, returning `true` if an element was removed.
    pub fn erase(&mut self, key: &X::Key) -> bool {
        match self.find_index(key) {
            Some(index) => {
                self.erase_index(index);
                true
            }
            None => false,
        }
    }

    /// Erases the live element at `at`, returning the next live position
    /// (or the end sentinel).
    ///
    /// # Panics
    ///
    /// Panics if `at` is out of bounds or does not name a live element.
    pub fn erase_at(&mut self, at: I) -> I {
        let index = at.to_usize();
        assert!(index < self.capacity, "erase past the end of the table");
        assert!(
            self.probe.is_live(self.storage.slot(index)),
            "erase of a slot that is not live"
        );
        self.erase_index(index);
        self.next_live(index + 1)
    }

    fn erase_index(&mut self, index: usize) {
        let mask = self.capacity - 1;
        self.probe.release(&mut self.storage, mask, index);
        self.size -= 1;
    }

    /// Borrows the element at a position previously returned by this
    /// table, or `None` if the position is the end sentinel or no longer
    /// live.
    pub fn get_at(&self, at: I) -> Option<&E> {
        let index = at.to_usize();
        if index >= self.capacity || !self.probe.is_live(self.storage.slot(index)) {
            return None;
        }
        Some(self.probe.element(&self.storage, index))
    }

    /// Mutable variant of [`get_at`](Self::get_at). The same key-field
    /// caveat as [`find_mut`](Self::find_mut) applies.
    pub fn get_at_mut(&mut self, at: I) -> Option<&mut E> {
        let index = at.to_usize();
        if index >= self.capacity || !self.probe.is_live(self.storage.slot(index)) {
            return None;
        }
        Some(self.probe.element_mut(&mut self.storage, index))
    }

    /// Removes every element, keeping the allocated capacity.
    pub fn clear(&mut self) {
        for index in 0..self.capacity {
            self.probe.reset_slot(self.storage.slot_mut(index));
        }
        self.size = 0;
        self.probe.reset_budget(self.max_live);
    }

    /// Reserves room for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        if self.size.saturating_add(additional) > self.max_live {
            self.grow(additional.max(1));
        }
    }

    /// Grows into fresh storage sized for `size + delta` elements and
    /// migrates every live element by re-inserting it.
    ///
    /// # Panics
    ///
    /// Panics if a migrated element cannot be placed: that means the hasher
    /// is not deterministic or a reserved key was inserted.
    #[cold]
    fn grow(&mut self, delta: usize) {
        let wanted = compute_capacity::<N>(self.size + delta, self.max_load);
        // The doubling floor guarantees progress even when the strategy
        // reported Full from clustering rather than load.
        let new_capacity = wanted.max(self.capacity * 2);
        debug_assert!(new_capacity > self.capacity);
        assert!(
            new_capacity - 1 < I::END.to_usize(),
            "capacity exceeds the index type"
        );

        let new_storage = Storage::all_free(new_capacity, || self.probe.free_slot());
        let old_storage = core::mem::replace(&mut self.storage, new_storage);
        self.capacity = new_capacity;
        self.max_live = load_budget(new_capacity, self.max_load);
        self.probe.reset_budget(self.max_live);

        let mask = new_capacity - 1;
        for slot in old_storage.into_slots() {
            let elem = match self.probe.take(slot) {
                Some(elem) => elem,
                None => continue,
            };
            let hash = self.hash_key(X::key(&elem));
            match self.probe.place(&mut self.storage, mask, X::key(&elem), hash) {
                Placement::Free(index) => self.probe.fill(&mut self.storage, index, elem),
                Placement::Found(_) | Placement::Full => panic!(
                    "failed to migrate an element while growing; \
                     the hasher is not deterministic or a reserved key was inserted"
                ),
            }
        }
    }

    fn next_live(&self, from: usize) -> I {
        let mut index = from;
        while index < self.capacity {
            if self.probe.is_live(self.storage.slot(index)) {
                return I::from_usize(index);
            }
            index += 1;
        }
        I::END
    }

    /// Iterates the live elements in slot order.
    pub fn iter(&self) -> Iter<'_, E, X, P, S, I, N> {
        Iter {
            table: self,
            index: self.next_live(0),
        }
    }
}

impl<E, X, P, S, I, const N: usize> Clone for HashTable<E, X, P, S, I, N>
where
    X: ExtractKey<E>,
    P: Strategy<E, X> + Clone,
    P::Slot: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        HashTable {
            storage: self.storage.clone(),
            size: self.size,
            capacity: self.capacity,
            max_live: self.max_live,
            max_load: self.max_load,
            probe: self.probe.clone(),
            hash_builder: self.hash_builder.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, X, P, S, I, const N: usize> Debug for HashTable<E, X, P, S, I, N>
where
    X: ExtractKey<E>,
    P: Strategy<E, X>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.size)
            .field("capacity", &self.capacity)
            .field("max_load_factor", &self.max_load)
            .finish()
    }
}

/// An iterator over a table's live elements.
///
/// Holds a borrow of the table and the position of the next live slot;
/// every step rescans forward, so iteration order follows slot order.
pub struct Iter<'a, E, X, P, S, I, const N: usize>
where
    X: ExtractKey<E>,
    P: Strategy<E, X>,
{
    table: &'a HashTable<E, X, P, S, I, N>,
    index: I,
}

impl<'a, E, X, P, S, I, const N: usize> Iterator for Iter<'a, E, X, P, S, I, N>
where
    X: ExtractKey<E>,
    X::Key: Hash + Eq,
    P: Strategy<E, X>,
    S: BuildHasher,
    I: TableIndex,
{
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        if self.index == I::END {
            return None;
        }
        let at = self.index.to_usize();
        let elem = self.table.probe.element(&self.table.storage, at);
        self.index = self.table.next_live(at + 1);
        Some(elem)
    }
}

#[cfg(test)]
impl<E, X, S, I, const N: usize> HashTable<E, X, crate::hopscotch::Hopscotch, S, I, N>
where
    X: ExtractKey<E>,
    X::Key: Hash + Eq,
    S: BuildHasher,
    I: TableIndex,
{
    /// Asserts the hopscotch leaf/origin invariants over the whole table.
    pub(crate) fn check_consistency(&self) {
        if self.capacity == 0 {
            return;
        }
        let mask = self.capacity - 1;
        crate::hopscotch::check_consistency(&self.storage, self.capacity, |elem: &E| {
            (self.hash_key(X::key(elem)) as usize) & mask
        });
    }
}
