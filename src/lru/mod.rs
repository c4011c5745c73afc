//! Multi-Lane LRU
//!
//! Generalizes `cache-rs`'s `ConcurrentLruCache` segmenting scheme
//! (`concurrent::lru`, a `Box<[Mutex<LruSegment<K, V, S>>]>` keyed by a hash
//! of `K`) to this crate's one entry shape: `max_lanes` independent
//! [`lane::Lane`]s, each guarded by its own `parking_lot::Mutex`, selected
//! by `hash(name) % max_lanes`. A bucket name always lands in the same lane
//! for its whole lifetime, which is what lets `BucketEntry::lane_index`
//! stay fixed across recycles.

mod lane;

pub use lane::{LaneInsertion, LaneOutcome};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::BucketEntry;
use lane::Lane;

/// Owns all lanes and routes admissions/pins to the right one.
#[derive(Debug)]
pub struct BucketLru {
    lanes: Vec<Mutex<Lane>>,
}

impl BucketLru {
    /// Builds `lane_count` lanes, each able to hold `lane_capacity` entries.
    pub fn new(lane_count: u8, lane_capacity: usize) -> Self {
        let lane_count = lane_count.max(1) as usize;
        let lanes = (0..lane_count)
            .map(|_| Mutex::new(Lane::new(lane_capacity)))
            .collect();
        Self { lanes }
    }

    /// Number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Lane index a given hash is always routed to.
    pub fn lane_for_hash(&self, hash: u64) -> u16 {
        (hash as usize % self.lanes.len()) as u16
    }

    /// Admits `name` into its designated lane, allocating or reclaiming a
    /// slot as needed. `try_reclaim` is forwarded unchanged to
    /// [`lane::Lane::insert`] — see its docs for the reclaim contract.
    pub fn insert(
        &self,
        name: &str,
        hash: u64,
        try_reclaim: impl FnMut(&Arc<BucketEntry>) -> bool,
    ) -> Option<LaneInsertion> {
        let lane_index = self.lane_for_hash(hash);
        self.lanes[lane_index as usize]
            .lock()
            .insert(lane_index, name, hash, try_reclaim)
    }

    /// Pins `entry` and bumps it to the MRU end of its lane. Mirrors the
    /// original's `lru.ref(b)` called while the caller still holds the
    /// partition latch for `entry`'s name.
    pub fn ref_and_touch(&self, entry: &Arc<BucketEntry>) -> bool {
        self.lanes[entry.lane_index() as usize]
            .lock()
            .ref_and_touch(entry.slot_index())
    }

    /// Unpins `entry`. Lock-free; does not require the lane mutex because
    /// pin/unpin counts live on the entry itself (see [`BucketEntry`]).
    pub fn unref(&self, entry: &Arc<BucketEntry>) {
        entry.unref_entry();
    }

    /// Total entries currently allocated across all lanes (live + evictable,
    /// not counting never-allocated capacity).
    pub fn len(&self) -> usize {
        self.lanes.iter().map(|l| l.lock().len()).sum()
    }

    /// Is the LRU empty of any allocated slot?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_to_a_stable_lane() {
        let lru = BucketLru::new(4, 10);
        let hash = 123u64;
        let lane_a = lru.lane_for_hash(hash);
        let lane_b = lru.lane_for_hash(hash);
        assert_eq!(lane_a, lane_b);
    }

    #[test]
    fn ref_and_unref_round_trip() {
        let lru = BucketLru::new(1, 2);
        let insertion = lru.insert("alpha", 1, |_| true).unwrap();
        assert!(lru.ref_and_touch(&insertion.entry));
        assert_eq!(insertion.entry.refcount(), 1);
        lru.unref(&insertion.entry);
        assert_eq!(insertion.entry.refcount(), 0);
    }

    #[test]
    fn full_lane_without_reclaimable_victim_fails() {
        let lru = BucketLru::new(1, 1);
        let insertion = lru.insert("alpha", 1, |_| true).unwrap();
        assert!(lru.ref_and_touch(&insertion.entry));
        assert!(lru.insert("beta", 2, |_| true).is_none());
    }
}
