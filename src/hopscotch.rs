//! Hopscotch probing with per-bucket leaf bitmaps.

use core::mem::ManuallyDrop;

use crate::cell::RawCell;
use crate::extract::ExtractKey;
use crate::metadata::{BucketMeta, HOP_RANGE};
use crate::storage::Storage;
use crate::strategy::{Placement, Strategy};

/// Furthest forward distance examined when scanning for a free slot before
/// the probe declares the table full.
const SCAN_RANGE: usize = 128;

/// One hopscotch slot: a metadata word plus a manually managed payload.
///
/// The payload is uninitialized memory whenever the metadata's origin field
/// is clear, so every payload access goes through the metadata.
pub struct HopSlot<E> {
    meta: BucketMeta,
    cell: RawCell<E>,
}

impl<E> HopSlot<E> {
    fn free() -> Self {
        HopSlot {
            meta: BucketMeta::default(),
            cell: RawCell::empty(),
        }
    }

    #[inline(always)]
    fn is_live(&self) -> bool {
        self.meta.is_occupied()
    }
}

impl<E> Drop for HopSlot<E> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<E>() && self.is_live() {
            // SAFETY: a nonzero origin field means the cell was written and
            // not yet released.
            unsafe { self.cell.drop_in_place() };
        }
    }
}

impl<E: Clone> Clone for HopSlot<E> {
    fn clone(&self) -> Self {
        let mut slot = HopSlot::free();
        slot.meta = self.meta;
        if self.is_live() {
            // SAFETY: live slots hold an initialized payload.
            slot.cell.write(unsafe { self.cell.get() }.clone());
        }
        slot
    }
}

/// Forward circular distance from `from` to `to` over a power-of-two table.
#[inline(always)]
fn distance(from: usize, to: usize, mask: usize) -> usize {
    to.wrapping_sub(from) & mask
}

/// Moves the free slot at `free` backwards by relocating a key that can
/// legally reach it, returning the relocated key's old slot as the new free
/// slot.
///
/// Walking candidate origins from `free - (H-1)` forward, only a leaf that
/// precedes `free` may move (its distance from its origin must stay below
/// the hop range), and the first leaf is the smallest, so a first leaf at
/// or past the candidate distance disqualifies the whole bucket.
fn pull_closer<E, const N: usize>(
    slots: &mut Storage<HopSlot<E>, N>,
    mask: usize,
    free: usize,
) -> Option<usize> {
    for dist in (1..HOP_RANGE).rev() {
        let candidate_origin = free.wrapping_sub(dist) & mask;
        let leaf_delta = match slots.slot(candidate_origin).meta.leaves().next() {
            Some(delta) => delta,
            None => continue,
        };
        if leaf_delta >= dist {
            continue;
        }
        let moved = (candidate_origin + leaf_delta) & mask;

        debug_assert!(slots.slot(moved).is_live());
        debug_assert!(!slots.slot(free).is_live());

        // SAFETY: `moved` carries a leaf bit, so its payload is live. The
        // read pairs with the origin clear below, leaving the value with
        // exactly one owner.
        let payload = unsafe { slots.slot(moved).cell.read() };
        let free_slot = slots.slot_mut(free);
        free_slot.cell.write(payload);
        free_slot.meta.set_origin(dist);

        let origin_meta = &mut slots.slot_mut(candidate_origin).meta;
        origin_meta.set_leaf(dist);
        origin_meta.clear_leaf(leaf_delta);

        slots.slot_mut(moved).meta.clear_origin();
        return Some(moved);
    }
    None
}

/// Probe engine that keeps every key within a fixed hop distance of its
/// origin bucket.
///
/// Occupancy lives in the per-slot metadata word, so free slots hold no
/// constructed payload at all. A lookup scans only the slots named by the
/// origin's leaf mask. An insert scans forward for a free slot and pulls it
/// backwards through swap chains until it lands inside the hop range; when
/// no chain makes progress the table must grow.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hopscotch;

impl<E, X> Strategy<E, X> for Hopscotch
where
    X: ExtractKey<E>,
    X::Key: Eq,
{
    type Slot = HopSlot<E>;

    fn default_max_load(&self) -> f32 {
        0.75
    }

    fn free_slot(&self) -> HopSlot<E> {
        HopSlot::free()
    }

    fn reset_slot(&self, slot: &mut HopSlot<E>) {
        if core::mem::needs_drop::<E>() && slot.is_live() {
            // SAFETY: live slots hold an initialized payload.
            unsafe { slot.cell.drop_in_place() };
        }
        slot.meta.clear_all();
    }

    #[inline(always)]
    fn is_live(&self, slot: &HopSlot<E>) -> bool {
        slot.is_live()
    }

    #[inline(always)]
    fn element<'a, const N: usize>(
        &self,
        slots: &'a Storage<HopSlot<E>, N>,
        index: usize,
    ) -> &'a E {
        let slot = slots.slot(index);
        debug_assert!(slot.is_live());
        // SAFETY: live slots hold an initialized payload.
        unsafe { slot.cell.get() }
    }

    #[inline(always)]
    fn element_mut<'a, const N: usize>(
        &self,
        slots: &'a mut Storage<HopSlot<E>, N>,
        index: usize,
    ) -> &'a mut E {
        let slot = slots.slot_mut(index);
        debug_assert!(slot.is_live());
        // SAFETY: live slots hold an initialized payload.
        unsafe { slot.cell.get_mut() }
    }

    fn take(&self, slot: HopSlot<E>) -> Option<E> {
        let slot = ManuallyDrop::new(slot);
        if slot.is_live() {
            // SAFETY: live slots hold an initialized payload; suppressing
            // the slot's drop hands ownership to the caller.
            Some(unsafe { slot.cell.read() })
        } else {
            None
        }
    }

    #[inline]
    fn find<const N: usize>(
        &self,
        slots: &Storage<HopSlot<E>, N>,
        mask: usize,
        key: &X::Key,
        hash: u64,
    ) -> Option<usize> {
        let origin = (hash as usize) & mask;
        for delta in slots.slot(origin).meta.leaves() {
            let index = (origin + delta) & mask;
            let slot = slots.slot(index);
            debug_assert!(slot.is_live());
            // SAFETY: a set leaf bit points at a live slot.
            if X::key(unsafe { slot.cell.get() }) == key {
                return Some(index);
            }
        }
        None
    }

    fn place<const N: usize>(
        &mut self,
        slots: &mut Storage<HopSlot<E>, N>,
        mask: usize,
        _key: &X::Key,
        hash: u64,
    ) -> Placement {
        let capacity = mask + 1;
        let origin = (hash as usize) & mask;

        let mut free = None;
        for offset in 0..SCAN_RANGE.min(capacity) {
            let index = (origin + offset) & mask;
            if !slots.slot(index).is_live() {
                free = Some(index);
                break;
            }
        }
        let mut free = match free {
            Some(index) => index,
            None => return Placement::Full,
        };

        loop {
            let delta = distance(origin, free, mask);
            if delta < HOP_RANGE {
                slots.slot_mut(origin).meta.set_leaf(delta);
                slots.slot_mut(free).meta.set_origin(delta);
                return Placement::Free(free);
            }
            match pull_closer(slots, mask, free) {
                Some(closer) => free = closer,
                None => return Placement::Full,
            }
        }
    }

    #[inline(always)]
    fn fill<const N: usize>(&self, slots: &mut Storage<HopSlot<E>, N>, index: usize, elem: E) {
        let slot = slots.slot_mut(index);
        debug_assert!(slot.is_live(), "fill of a slot place() never claimed");
        slot.cell.write(elem);
    }

    fn release<const N: usize>(
        &mut self,
        slots: &mut Storage<HopSlot<E>, N>,
        mask: usize,
        index: usize,
    ) {
        let delta = slots
            .slot(index)
            .meta
            .origin()
            .expect("release of a slot that is not live");
        let origin = index.wrapping_sub(delta) & mask;
        slots.slot_mut(origin).meta.clear_leaf(delta);

        let slot = slots.slot_mut(index);
        slot.meta.clear_origin();
        if core::mem::needs_drop::<E>() {
            // SAFETY: the origin field was nonzero, so the payload is live;
            // clearing it first keeps the drop unrepeatable.
            unsafe { slot.cell.drop_in_place() };
        }
    }

    fn reset_budget(&mut self, _budget: usize) {}
}

/// Asserts the leaf/origin invariants over every bucket: each leaf bit
/// points at a live slot recording the matching origin distance, and each
/// live slot's key hashes back to the origin its metadata names.
#[cfg(test)]
pub(crate) fn check_consistency<E, const N: usize>(
    slots: &Storage<HopSlot<E>, N>,
    capacity: usize,
    mut origin_of: impl FnMut(&E) -> usize,
) {
    if capacity == 0 {
        return;
    }
    let mask = capacity - 1;
    for bucket in 0..capacity {
        for delta in slots.slot(bucket).meta.leaves() {
            let leaf = (bucket + delta) & mask;
            let slot = slots.slot(leaf);
            assert!(slot.is_live(), "leaf bit points at a free slot");
            assert_eq!(slot.meta.origin(), Some(delta));
            // SAFETY: asserted live above.
            assert_eq!(origin_of(unsafe { slot.cell.get() }), bucket);
        }
        if let Some(delta) = slots.slot(bucket).meta.origin() {
            let origin = bucket.wrapping_sub(delta) & mask;
            assert!(slots.slot(origin).meta.has_leaf(delta));
            // SAFETY: a recorded origin means the slot is live.
            assert_eq!(origin_of(unsafe { slots.slot(bucket).cell.get() }), origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use crate::extract::Identity;

    use super::*;

    type Probe = Hopscotch;

    fn place(
        probe: &mut Probe,
        slots: &mut Storage<HopSlot<u64>, 0>,
        mask: usize,
        key: u64,
    ) -> Placement {
        let result = <Probe as Strategy<u64, Identity>>::place(probe, slots, mask, &key, key);
        if let Placement::Free(index) = result {
            <Probe as Strategy<u64, Identity>>::fill(probe, slots, index, key);
        }
        result
    }

    fn find(probe: &Probe, slots: &Storage<HopSlot<u64>, 0>, mask: usize, key: u64) -> Option<usize> {
        <Probe as Strategy<u64, Identity>>::find(probe, slots, mask, &key, key)
    }

    fn verify(slots: &Storage<HopSlot<u64>, 0>, capacity: usize) {
        check_consistency(slots, capacity, |key: &u64| (*key as usize) & (capacity - 1));
    }

    #[test]
    fn distance_wraps_forward() {
        assert_eq!(distance(0, 5, 31), 5);
        assert_eq!(distance(30, 2, 31), 4);
        assert_eq!(distance(5, 5, 31), 0);
    }

    #[test]
    fn colliding_keys_stay_within_hop_range() {
        let mut probe = Hopscotch;
        let mut slots: Storage<HopSlot<u64>, 0> = Storage::all_free(32, HopSlot::free);

        // All share origin 30; the third and fourth wrap past the end.
        for key in [30, 62, 94, 126] {
            assert!(matches!(place(&mut probe, &mut slots, 31, key), Placement::Free(_)));
        }
        assert_eq!(find(&probe, &slots, 31, 30), Some(30));
        assert_eq!(find(&probe, &slots, 31, 62), Some(31));
        assert_eq!(find(&probe, &slots, 31, 94), Some(0));
        assert_eq!(find(&probe, &slots, 31, 126), Some(1));
        assert_eq!(find(&probe, &slots, 31, 158), None);
        verify(&slots, 32);
    }

    #[test]
    fn release_frees_the_slot_for_reuse() {
        let mut probe = Hopscotch;
        let mut slots: Storage<HopSlot<u64>, 0> = Storage::all_free(32, HopSlot::free);

        for key in [3, 35, 67] {
            place(&mut probe, &mut slots, 31, key);
        }
        let index = find(&probe, &slots, 31, 35).unwrap();
        <Probe as Strategy<u64, Identity>>::release(&mut probe, &mut slots, 31, index);

        assert_eq!(find(&probe, &slots, 31, 35), None);
        assert_eq!(find(&probe, &slots, 31, 3), Some(3));
        assert_eq!(find(&probe, &slots, 31, 67), Some(5));
        verify(&slots, 32);

        assert_eq!(place(&mut probe, &mut slots, 31, 99), Placement::Free(4));
        verify(&slots, 32);
    }

    #[test]
    fn far_free_slot_is_pulled_into_hop_range() {
        let mut probe = Hopscotch;
        let mut slots: Storage<HopSlot<u64>, 0> = Storage::all_free(64, HopSlot::free);

        // Origin 0 owns slots 0..=26, origin 27 owns slots 27..=31. The
        // next key with origin 5 only finds slot 32 free, which sits
        // exactly at the hop limit and must be walked backwards.
        for i in 0..HOP_RANGE as u64 {
            assert!(matches!(place(&mut probe, &mut slots, 63, i * 64), Placement::Free(_)));
        }
        for i in 0..5u64 {
            assert!(matches!(
                place(&mut probe, &mut slots, 63, 27 + i * 64),
                Placement::Free(_)
            ));
        }
        let key = 5 + 40 * 64;
        assert_eq!(place(&mut probe, &mut slots, 63, key), Placement::Free(27));

        assert_eq!(find(&probe, &slots, 63, key), Some(27));
        // The displaced key (origin 27) now lives in slot 32.
        assert_eq!(find(&probe, &slots, 63, 27), Some(32));
        verify(&slots, 64);
    }

    #[test]
    fn full_scan_range_reports_full() {
        let mut probe = Hopscotch;
        let mut slots: Storage<HopSlot<u64>, 0> = Storage::all_free(8, HopSlot::free);

        for key in 0..8u64 {
            assert!(matches!(place(&mut probe, &mut slots, 7, key), Placement::Free(_)));
        }
        assert_eq!(place(&mut probe, &mut slots, 7, 100), Placement::Full);
        verify(&slots, 8);
    }

    #[test]
    fn slot_drop_and_clone_respect_occupancy() {
        let mut live = HopSlot::<Box<u32>>::free();
        live.meta.set_origin(0);
        live.cell.write(Box::new(9));

        let copy = live.clone();
        // SAFETY: both slots are live.
        assert_eq!(unsafe { *copy.cell.get().clone() }, 9);

        let free_copy = HopSlot::<Box<u32>>::free().clone();
        assert!(!free_copy.is_live());
        drop(live);
        drop(copy);
        drop(free_copy);
    }
}
