//! Bucket Entry
//!
//! The per-bucket cache record. Unlike the teacher crate's generic
//! `CacheEntry<K, V, M>` (one core struct shared by five eviction
//! algorithms), this crate has exactly one entry shape — so the struct
//! here is concrete rather than generic, carrying everything spec.md's
//! Data Model assigns to it: name, hash, KV binding, flags, refcount, and
//! the admission mutex/condvar.
//!
//! # Thread Safety
//!
//! A [`BucketEntry`] is always shared via `Arc` and is mutated in place —
//! recycling a slot overwrites an existing `BucketEntry`'s interior state
//! rather than allocating a new one, so any stale `Arc` clone a racing
//! reader still holds must re-check `flags()` before trusting the name or
//! KV binding it sees (see [`crate::slot::SlotHandle`]'s generation check).

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// Entry has never been filled, or was just recycled for a new name.
pub const FLAG_NONE: u32 = 0x0000;
/// The sub-store reflects the directory as of the last successful fill.
pub const FLAG_FILLED: u32 = 0x0001;
/// The entry has been evicted/recycled and must not be reused by anyone
/// still holding a stale reference to it.
pub const FLAG_DELETED: u32 = 0x0002;

/// Binding from a [`BucketEntry`] to its KV storage.
#[derive(Debug, Clone)]
pub struct KvBinding {
    /// Index into the KV environment pool, `hash(name) mod kv_pool_size`.
    pub env_index: usize,
    /// Name of the sub-store (database) inside that environment. Always
    /// equal to the bucket name, kept distinct for clarity at call sites.
    pub substore: String,
}

/// Per-bucket cache record.
///
/// Always lives behind `Arc<BucketEntry>` inside a lane slot; recycling
/// mutates the fields below in place rather than replacing the `Arc`, so
/// the slot's backing allocation is reused exactly as spec.md's "Recycle"
/// path requires.
#[derive(Debug)]
pub struct BucketEntry {
    /// Bucket name. Empty string for a free/never-allocated slot.
    name: Mutex<String>,
    /// `hash(name)`, recomputed on every (re)bind.
    hash: AtomicU64,
    /// KV binding, set once per (re)bind, read thereafter.
    kv: Mutex<Option<KvBinding>>,
    /// `FLAG_FILLED | FLAG_DELETED`.
    flags: AtomicU32,
    /// LRU pin count. Zero means eligible for reclaim.
    refcount: AtomicUsize,
    /// Generation counter, bumped every recycle. Paired with the slot
    /// index to form a [`crate::slot::SlotHandle`] that can detect a
    /// stale reference to a slot that has since been reused.
    generation: AtomicU32,
    /// Guards the "exactly one filler" protocol in `fill`.
    fill_mutex: Mutex<()>,
    fill_cv: Condvar,
    /// Lane this slot belongs to. Fixed for the slot's lifetime, including
    /// across recycles — only the content changes, never the address.
    lane_index: u16,
    /// Index of this slot within `lane_index`. Also fixed for the slot's
    /// lifetime.
    slot_index: u32,
}

impl BucketEntry {
    /// Creates a fresh, unbound entry for a slot at `(lane_index,
    /// slot_index)` — an LRU slot that has never held a bucket before.
    pub fn new(lane_index: u16, slot_index: u32) -> Self {
        Self {
            name: Mutex::new(String::new()),
            hash: AtomicU64::new(0),
            kv: Mutex::new(None),
            flags: AtomicU32::new(FLAG_NONE),
            refcount: AtomicUsize::new(0),
            generation: AtomicU32::new(0),
            fill_mutex: Mutex::new(()),
            fill_cv: Condvar::new(),
            lane_index,
            slot_index,
        }
    }

    /// Lane this slot belongs to.
    pub fn lane_index(&self) -> u16 {
        self.lane_index
    }

    /// Index of this slot within its lane.
    pub fn slot_index(&self) -> u32 {
        self.slot_index
    }

    /// Snapshot handle identifying this exact binding, for staleness checks
    /// across points where no lock is held.
    pub fn handle(&self) -> crate::slot::SlotHandle {
        crate::slot::SlotHandle::new(self.lane_index, self.slot_index, self.generation())
    }

    /// (Re)binds this entry to `name`/`hash`, clearing `FILLED`/`DELETED`
    /// and bumping the generation. Used both for first allocation and for
    /// recycling an evicted slot.
    pub fn bind(&self, name: String, hash: u64) {
        *self.name.lock() = name;
        self.hash.store(hash, Ordering::Release);
        *self.kv.lock() = None;
        self.flags.store(FLAG_NONE, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Sets the KV binding once the entry has been attached to its
    /// environment and sub-store.
    pub fn set_kv(&self, binding: KvBinding) {
        *self.kv.lock() = Some(binding);
    }

    /// Returns the current KV binding, if bound.
    pub fn kv(&self) -> Option<KvBinding> {
        self.kv.lock().clone()
    }

    /// Current bucket name.
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    /// `hash(name)` as of the last bind.
    pub fn hash(&self) -> u64 {
        self.hash.load(Ordering::Acquire)
    }

    /// Current generation. Bumped on every `bind`.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// True once `fill` has committed successfully.
    pub fn is_filled(&self) -> bool {
        self.flags.load(Ordering::Acquire) & FLAG_FILLED != 0
    }

    /// True once the entry has been evicted and must not be reused.
    pub fn is_deleted(&self) -> bool {
        self.flags.load(Ordering::Acquire) & FLAG_DELETED != 0
    }

    /// Sets `FLAG_FILLED` and wakes any callers blocked in `wait_for_fill`.
    pub fn mark_filled(&self) {
        self.flags.fetch_or(FLAG_FILLED, Ordering::AcqRel);
        let _guard = self.fill_mutex.lock();
        self.fill_cv.notify_all();
    }

    /// Clears `FLAG_FILLED` (used by watch-driven invalidation: the next
    /// `list_bucket` call re-fills lazily, per spec.md's pinned answer to
    /// "eager vs lazy re-fill").
    pub fn clear_filled(&self) {
        self.flags.fetch_and(!FLAG_FILLED, Ordering::AcqRel);
    }

    /// Sets `FLAG_DELETED`, visible immediately to any racing `get_bucket`
    /// still holding the partition latch.
    pub fn mark_deleted(&self) {
        self.flags.fetch_or(FLAG_DELETED, Ordering::AcqRel);
    }

    /// Locks the per-entry fill mutex. Held by the single caller performing
    /// `fill`, and by `get_bucket` while deciding whether a fill is needed.
    pub fn fill_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.fill_mutex.lock()
    }

    /// Non-blocking variant used by the LRU's reclaim hook: a victim whose
    /// fill mutex is currently held has a fill in progress and must not be
    /// recycled out from under it.
    pub fn try_fill_lock(&self) -> Option<parking_lot::MutexGuard<'_, ()>> {
        self.fill_mutex.try_lock()
    }

    /// Blocks the calling thread until `FLAG_FILLED` is set, re-checking
    /// under the fill mutex to guard against missed wakeups.
    pub fn wait_for_fill(&self, guard: &mut parking_lot::MutexGuard<'_, ()>) {
        while !self.is_filled() && !self.is_deleted() {
            self.fill_cv.wait(guard);
        }
    }

    /// Attempts to pin the entry. Fails if it has been marked `DELETED`
    /// (signals "evicted under us" to the caller, which must retry).
    pub fn ref_entry(&self) -> bool {
        loop {
            if self.is_deleted() {
                return false;
            }
            let current = self.refcount.load(Ordering::Acquire);
            if self
                .refcount
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Unpins the entry. Does not unlink it from the LRU lane; eligibility
    /// for reclaim is determined by the refcount alone.
    pub fn unref_entry(&self) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unref on an entry with refcount already zero");
    }

    /// Current pin count.
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}
