//! Slot Handles
//!
//! spec.md's Design Notes call for re-expressing the original's intrusive
//! hooks as "an arena of slots indexed by integer handles... generation-
//! tagged so stale references are detectable," replacing the teacher
//! crate's raw-pointer intrusive list (`src/list.rs` in `cache-rs`) for
//! this domain's needs. A [`SlotHandle`] is that integer handle: it names a
//! slot inside a specific [`crate::lru::Lane`] and the generation the slot
//! was bound at, so a caller holding a handle from before a recycle can
//! detect that its slot now belongs to a different bucket.

/// Identifies one occupied slot in one lane of the LRU.
///
/// Two handles are "the same live entry" only if both `lane`, `index`, and
/// `generation` match — a recycle bumps the generation, so a handle minted
/// before the recycle silently fails any `current()` comparison against the
/// slot's live generation instead of aliasing the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Which lane owns the slot.
    pub lane: u16,
    /// Index of the slot within the lane's arena.
    pub index: u32,
    /// Generation of the entry bound into the slot at the time this handle
    /// was minted.
    pub generation: u32,
}

impl SlotHandle {
    pub(crate) fn new(lane: u16, index: u32, generation: u32) -> Self {
        Self {
            lane,
            index,
            generation,
        }
    }
}
