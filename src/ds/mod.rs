pub mod frequency_buckets;
pub mod ghost_list;
pub mod intrusive_list;
pub mod slot_arena;

pub use frequency_buckets::FrequencyBuckets;
pub use ghost_list::GhostList;
pub use intrusive_list::IntrusiveList;
pub use slot_arena::{SlotArena, SlotId};

/// Upper bound on up-front reservations; larger structures grow on demand.
pub(crate) const MAX_PREALLOC: usize = 1 << 16;

/// Number of entries to reserve for a structure bounded by `capacity`.
pub(crate) fn prealloc(capacity: usize) -> usize {
    capacity.min(MAX_PREALLOC)
}
