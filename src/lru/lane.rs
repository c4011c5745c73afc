//! One Lane of the Multi-Lane LRU
//!
//! A `Lane` is a bounded slab of [`BucketEntry`] slots plus a doubly linked
//! MRU/LRU order over those slots. It mirrors the teacher crate's
//! `LruSegment` (`cache-rs`'s `concurrent::lru` module documents exactly
//! this "segmented storage, each segment independently locked" shape), but
//! is specialized to `Arc<BucketEntry>` instead of being generic over
//! `K, V` — this crate has one entry shape, not five cache algorithms to
//! parameterize over.
//!
//! Every mutation here takes `&mut self`; [`crate::lru::BucketLru`] wraps
//! each lane in its own `parking_lot::Mutex`, which is what actually makes
//! concurrent callers safe. Pinning (`ref_entry`/`unref_entry`) is lock-free
//! on the entry itself (see [`BucketEntry`]); the lane lock only guards the
//! MRU/LRU order and slot allocation/reclaim, matching the original's split
//! between an atomic per-object refcount and a latched structural pool.

use std::sync::Arc;

use crate::entry::BucketEntry;

#[derive(Debug)]
struct Slot {
    entry: Arc<BucketEntry>,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Outcome of [`Lane::insert`]: whether the slot was freshly allocated or
/// recycled from an evicted victim.
#[derive(Debug)]
pub enum LaneOutcome {
    /// The lane had spare capacity; a brand new slot was allocated.
    Fresh,
    /// An unpinned victim was reclaimed and its slot reused. Carries the
    /// evicted bucket's name and hash so the caller can remove it from the
    /// Partitioned Index — the lane itself has no notion of the index.
    Recycled {
        /// Name the slot held before recycling.
        evicted_name: String,
        /// `hash(evicted_name)`.
        evicted_hash: u64,
    },
}

/// Result of a successful [`Lane::insert`].
#[derive(Debug)]
pub struct LaneInsertion {
    /// The (possibly recycled) entry, already bound to the new name/hash.
    pub entry: Arc<BucketEntry>,
    /// Whether the entry came from a fresh slot or a recycled one.
    pub outcome: LaneOutcome,
}

/// One partition of the LRU: a bounded pool of entries with MRU/LRU order.
#[derive(Debug)]
pub struct Lane {
    capacity: usize,
    slots: Vec<Slot>,
    mru_head: Option<u32>,
    lru_tail: Option<u32>,
}

impl Lane {
    /// Creates an empty lane with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Vec::new(),
            mru_head: None,
            lru_tail: None,
        }
    }

    fn link_mru(&mut self, idx: u32) {
        self.slots[idx as usize].prev = None;
        self.slots[idx as usize].next = self.mru_head;
        if let Some(head) = self.mru_head {
            self.slots[head as usize].prev = Some(idx);
        }
        self.mru_head = Some(idx);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: u32) {
        let (prev, next) = {
            let s = &self.slots[idx as usize];
            (s.prev, s.next)
        };
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.mru_head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.lru_tail = prev,
        }
    }

    /// Finds or allocates a slot for `name`/`hash`, evicting an unpinned
    /// LRU victim if the lane is already at capacity.
    ///
    /// `try_reclaim` is called on each zero-refcount candidate starting
    /// from the LRU end; it performs the entry's reclaim contract (mark
    /// `DELETED`, clear the KV sub-store, report whether reclamation is
    /// authorised) and is owned by the caller because the lane itself
    /// knows nothing about KV storage. Returns `None` only when no
    /// candidate in this lane accepted reclamation.
    pub fn insert(
        &mut self,
        lane_index: u16,
        name: &str,
        hash: u64,
        mut try_reclaim: impl FnMut(&Arc<BucketEntry>) -> bool,
    ) -> Option<LaneInsertion> {
        if self.slots.len() < self.capacity {
            let slot_index = self.slots.len() as u32;
            let entry = Arc::new(BucketEntry::new(lane_index, slot_index));
            entry.bind(name.to_string(), hash);
            self.slots.push(Slot {
                entry: entry.clone(),
                prev: None,
                next: None,
            });
            self.link_mru(slot_index);
            return Some(LaneInsertion {
                entry,
                outcome: LaneOutcome::Fresh,
            });
        }

        let mut cursor = self.lru_tail;
        while let Some(idx) = cursor {
            let next_cursor = self.slots[idx as usize].prev;
            let entry = self.slots[idx as usize].entry.clone();
            if entry.refcount() == 0 && try_reclaim(&entry) {
                let evicted_name = entry.name();
                let evicted_hash = entry.hash();
                self.unlink(idx);
                entry.bind(name.to_string(), hash);
                self.link_mru(idx);
                return Some(LaneInsertion {
                    entry,
                    outcome: LaneOutcome::Recycled {
                        evicted_name,
                        evicted_hash,
                    },
                });
            }
            cursor = next_cursor;
        }
        None
    }

    /// Pins the entry at `slot_index` and moves it to the MRU end. Returns
    /// `false` if the entry has been marked `DELETED`.
    pub fn ref_and_touch(&mut self, slot_index: u32) -> bool {
        let entry = &self.slots[slot_index as usize].entry;
        if !entry.ref_entry() {
            return false;
        }
        self.unlink(slot_index);
        self.link_mru(slot_index);
        true
    }

    /// Number of slots currently allocated (occupied, live or reclaimable).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Lane capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_fresh_until_capacity() {
        let mut lane = Lane::new(2);
        let a = lane.insert(0, "a", 1, |_| true).unwrap();
        assert!(matches!(a.outcome, LaneOutcome::Fresh));
        let b = lane.insert(0, "b", 2, |_| true).unwrap();
        assert!(matches!(b.outcome, LaneOutcome::Fresh));
        assert_eq!(lane.len(), 2);
    }

    #[test]
    fn recycles_lru_victim_when_full() {
        let mut lane = Lane::new(1);
        let a = lane.insert(0, "a", 1, |_| true).unwrap();
        assert!(matches!(a.outcome, LaneOutcome::Fresh));
        // "a" is unpinned (refcount 0), so inserting "b" should recycle it.
        let b = lane.insert(0, "b", 2, |_| true).unwrap();
        match b.outcome {
            LaneOutcome::Recycled {
                evicted_name,
                evicted_hash,
            } => {
                assert_eq!(evicted_name, "a");
                assert_eq!(evicted_hash, 1);
            }
            LaneOutcome::Fresh => panic!("expected a recycle"),
        }
        assert_eq!(b.entry.name(), "b");
    }

    #[test]
    fn pinned_entry_is_never_reclaimed() {
        let mut lane = Lane::new(1);
        let a = lane.insert(0, "a", 1, |_| true).unwrap();
        assert!(lane.ref_and_touch(a.entry.slot_index()));
        // "a" is pinned; there is no other candidate, so insert must fail.
        assert!(lane.insert(0, "b", 2, |_| true).is_none());
    }

    #[test]
    fn reclaim_refusal_is_honoured() {
        let mut lane = Lane::new(1);
        lane.insert(0, "a", 1, |_| true).unwrap();
        // Candidate is unpinned but refuses reclamation.
        assert!(lane.insert(0, "b", 2, |_| false).is_none());
    }
}
