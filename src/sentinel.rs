//! Open-addressed probing with reserved empty and deleted key values.

use cfg_if::cfg_if;

use crate::extract::{ExtractKey, VacantKey};
use crate::storage::Storage;
use crate::strategy::{Placement, Strategy};

cfg_if! {
    if #[cfg(feature = "sentinel-load-fifty")] {
        const DEFAULT_MAX_LOAD: f32 = 0.5;
    } else {
        const DEFAULT_MAX_LOAD: f32 = 0.75;
    }
}

/// Probe engine that marks free and erased slots with reserved key values.
///
/// Every slot stays a fully constructed element for the life of the table;
/// occupancy is encoded entirely in the key. The `empty_key` marks a slot
/// that was never assigned, the `deleted_key` a tombstone left behind by an
/// erase. Both must compare unequal to every real key, and the deleted key
/// is only needed when erase is used.
///
/// Probing is triangular: after slot `i`, the r-th retry examines
/// `(i + 1 + 2 + ... + r) & mask`, which visits every slot of a
/// power-of-two table.
///
/// Tombstones are not free slots. Only consuming a never-used slot draws
/// down the free budget; reusing a tombstone does not, and erases do not
/// give the budget back. An exhausted budget forces the next insert to
/// rebuild the table, which is also what reclaims tombstones.
#[derive(Clone, Debug)]
pub struct Sentinel<K> {
    empty_key: K,
    deleted_key: Option<K>,
    num_free: usize,
}

impl<K> Sentinel<K> {
    /// Creates the strategy from its reserved key values.
    pub fn new(empty_key: K, deleted_key: Option<K>) -> Self {
        Sentinel {
            empty_key,
            deleted_key,
            num_free: 0,
        }
    }
}

impl<K: PartialEq> Sentinel<K> {
    #[inline(always)]
    fn is_empty_key(&self, key: &K) -> bool {
        *key == self.empty_key
    }

    #[inline(always)]
    fn is_deleted_key(&self, key: &K) -> bool {
        self.deleted_key.as_ref().is_some_and(|d| key == d)
    }
}

impl<E, K, X> Strategy<E, X> for Sentinel<K>
where
    K: Clone + Eq,
    X: VacantKey<E> + ExtractKey<E, Key = K>,
{
    type Slot = E;

    fn default_max_load(&self) -> f32 {
        DEFAULT_MAX_LOAD
    }

    fn free_slot(&self) -> E {
        X::element_with_key(self.empty_key.clone())
    }

    fn reset_slot(&self, slot: &mut E) {
        *slot = X::element_with_key(self.empty_key.clone());
    }

    #[inline(always)]
    fn is_live(&self, slot: &E) -> bool {
        let key = X::key(slot);
        !self.is_empty_key(key) && !self.is_deleted_key(key)
    }

    #[inline(always)]
    fn element<'a, const N: usize>(&self, slots: &'a Storage<E, N>, index: usize) -> &'a E {
        slots.slot(index)
    }

    #[inline(always)]
    fn element_mut<'a, const N: usize>(
        &self,
        slots: &'a mut Storage<E, N>,
        index: usize,
    ) -> &'a mut E {
        slots.slot_mut(index)
    }

    fn take(&self, slot: E) -> Option<E> {
        let key = X::key(&slot);
        if !self.is_empty_key(key) && !self.is_deleted_key(key) {
            Some(slot)
        } else {
            None
        }
    }

    fn find<const N: usize>(
        &self,
        slots: &Storage<E, N>,
        mask: usize,
        key: &X::Key,
        hash: u64,
    ) -> Option<usize> {
        let capacity = mask + 1;
        let mut index = (hash as usize) & mask;
        let mut retry = 1usize;
        loop {
            // The equality test runs first: hits dominate, and the reserved
            // key comparisons only matter on a mismatch.
            let stored = X::key(slots.slot(index));
            if stored == key {
                return Some(index);
            }
            if self.is_empty_key(stored) {
                return None;
            }
            if retry > capacity {
                return None;
            }
            index = (index + retry) & mask;
            retry += 1;
        }
    }

    fn place<const N: usize>(
        &mut self,
        slots: &mut Storage<E, N>,
        mask: usize,
        key: &X::Key,
        hash: u64,
    ) -> Placement {
        debug_assert!(
            !self.is_empty_key(key) && !self.is_deleted_key(key),
            "a reserved key value was inserted"
        );
        let capacity = mask + 1;
        let mut index = (hash as usize) & mask;
        let mut retry = 1usize;
        let mut first_tombstone = None;
        loop {
            let stored = X::key(slots.slot(index));
            if stored == key {
                return Placement::Found(index);
            }
            if self.is_empty_key(stored) {
                if let Some(tombstone) = first_tombstone {
                    // Reusing a tombstone does not consume the free budget.
                    return Placement::Free(tombstone);
                }
                if self.num_free > 0 {
                    self.num_free -= 1;
                    return Placement::Free(index);
                }
                return Placement::Full;
            }
            if first_tombstone.is_none() && self.is_deleted_key(stored) {
                first_tombstone = Some(index);
            }
            if retry > capacity {
                return Placement::Full;
            }
            index = (index + retry) & mask;
            retry += 1;
        }
    }

    fn fill<const N: usize>(&self, slots: &mut Storage<E, N>, index: usize, elem: E) {
        *slots.slot_mut(index) = elem;
    }

    fn release<const N: usize>(&mut self, slots: &mut Storage<E, N>, _mask: usize, index: usize) {
        let deleted = self
            .deleted_key
            .clone()
            .expect("erase on a sentinel table constructed without a deleted key");
        *X::key_mut(slots.slot_mut(index)) = deleted;
    }

    fn reset_budget(&mut self, budget: usize) {
        self.num_free = budget;
    }
}
