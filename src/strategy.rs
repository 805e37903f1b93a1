//! The probe strategy abstraction shared by the sentinel and hopscotch
//! engines.

use crate::extract::ExtractKey;
use crate::storage::Storage;

/// Outcome of a placement probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The key is already present at this slot.
    Found(usize),
    /// A free slot was claimed for the key. Occupancy bookkeeping is
    /// already updated; the caller must write the element.
    Free(usize),
    /// No usable slot exists at the current capacity.
    Full,
}

/// A probe engine: owns the slot representation and the occupancy encoding.
///
/// The table drives every operation through this capability set and never
/// inspects slots directly, so each strategy stays free to encode liveness
/// however it needs (reserved key values vs. per-slot metadata). `mask` is
/// always `capacity - 1` for a power-of-two capacity of at least one; the
/// table never calls probing methods on an unallocated table.
pub trait Strategy<E, X: ExtractKey<E>> {
    /// Storage cell type.
    type Slot;

    /// Maximum load factor used when the caller does not pick one.
    fn default_max_load(&self) -> f32;

    /// A freshly unoccupied slot.
    fn free_slot(&self) -> Self::Slot;

    /// Resets a slot to the unoccupied state, dropping any live payload.
    fn reset_slot(&self, slot: &mut Self::Slot);

    /// Whether this slot holds a live element.
    fn is_live(&self, slot: &Self::Slot) -> bool;

    /// Borrows the element in a live slot.
    fn element<'a, const N: usize>(
        &self,
        slots: &'a Storage<Self::Slot, N>,
        index: usize,
    ) -> &'a E;

    /// Mutably borrows the element in a live slot.
    fn element_mut<'a, const N: usize>(
        &self,
        slots: &'a mut Storage<Self::Slot, N>,
        index: usize,
    ) -> &'a mut E;

    /// Moves the element out of an owned slot, if it is live.
    fn take(&self, slot: Self::Slot) -> Option<E>;

    /// Looks `key` up, given its hash.
    fn find<const N: usize>(
        &self,
        slots: &Storage<Self::Slot, N>,
        mask: usize,
        key: &X::Key,
        hash: u64,
    ) -> Option<usize>;

    /// Finds `key` or claims a slot for it.
    fn place<const N: usize>(
        &mut self,
        slots: &mut Storage<Self::Slot, N>,
        mask: usize,
        key: &X::Key,
        hash: u64,
    ) -> Placement;

    /// Writes `elem` into a slot claimed by [`place`](Self::place).
    fn fill<const N: usize>(&self, slots: &mut Storage<Self::Slot, N>, index: usize, elem: E);

    /// Releases the live slot at `index`.
    fn release<const N: usize>(
        &mut self,
        slots: &mut Storage<Self::Slot, N>,
        mask: usize,
        index: usize,
    );

    /// Rebuilds free-slot accounting after the storage was replaced or
    /// cleared. `budget` is `capacity * max_load_factor`, floored.
    fn reset_budget(&mut self, budget: usize);
}
