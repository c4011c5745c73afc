// Deterministic scenarios from the spec's testable-properties section:
// fresh listing, paging by marker, and LRU recycling under a full cache.

use std::fs;

use bucket_cache::{BucketCache, GetFlags};
use tempfile::tempdir;

fn make_bucket(root: &std::path::Path, name: &str, objects: &[&str]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for obj in objects {
        fs::write(dir.join(obj), b"x").unwrap();
    }
}

#[test]
fn fresh_bucket_lists_every_object() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    make_bucket(bucket_dir.path(), "stanley", &["alpha", "beta", "gamma"]);

    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 10, 2, 2).unwrap();
    let names = cache.list_bucket("stanley", "").unwrap();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn paging_advances_with_an_exclusive_marker() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    make_bucket(bucket_dir.path(), "stanley", &["a", "b", "c", "d"]);

    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 10, 2, 2).unwrap();
    let first_page = cache.list_bucket("stanley", "").unwrap();
    assert_eq!(first_page, vec!["a", "b", "c", "d"]);

    // Paging with the last-seen key as marker should never repeat it.
    let next = cache.list_bucket("stanley", "b").unwrap();
    assert_eq!(next, vec!["c", "d"]);

    let exhausted = cache.list_bucket("stanley", "d").unwrap();
    assert!(exhausted.is_empty());
}

#[test]
fn listing_is_idempotent_across_repeated_calls() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    make_bucket(bucket_dir.path(), "stanley", &["a", "b"]);

    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 10, 2, 2).unwrap();
    let once = cache.list_bucket("stanley", "").unwrap();
    let twice = cache.list_bucket("stanley", "").unwrap();
    assert_eq!(once, twice);
}

#[test]
fn full_cache_recycles_the_least_recently_used_bucket() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    for name in ["a", "b", "c"] {
        make_bucket(bucket_dir.path(), name, &["obj"]);
    }

    // One lane, capacity 2: the third distinct admission must recycle.
    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 2, 1, 1).unwrap();

    let (handle_a, flags_a) = cache.get_bucket("a", GetFlags::NONE).unwrap();
    assert!(flags_a.created);
    drop(handle_a);
    let (handle_b, flags_b) = cache.get_bucket("b", GetFlags::NONE).unwrap();
    assert!(flags_b.created);
    drop(handle_b);

    assert_eq!(cache.recycle_count(), 0);

    let (handle_c, flags_c) = cache.get_bucket("c", GetFlags::NONE).unwrap();
    assert!(flags_c.created);
    assert!(flags_c.recycled);
    drop(handle_c);

    assert_eq!(cache.recycle_count(), 1);
}

#[test]
fn full_cache_without_an_evictable_victim_reports_cache_full() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    for name in ["a", "b"] {
        make_bucket(bucket_dir.path(), name, &["obj"]);
    }

    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 1, 1, 1).unwrap();
    let (handle_a, _) = cache.get_bucket("a", GetFlags::NONE).unwrap();
    // "a" is pinned (handle still alive), so "b" has no victim to recycle.
    let err = cache.get_bucket("b", GetFlags::NONE).unwrap_err();
    assert!(matches!(err, bucket_cache::CacheError::CacheFull));
    drop(handle_a);
}

#[test]
fn vanished_bucket_surfaces_as_an_error_without_poisoning_the_cache() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    // No directory created for "ghost".
    let cache = BucketCache::try_new(bucket_dir.path(), db_dir.path(), 10, 2, 2).unwrap();
    let err = cache.list_bucket("ghost", "").unwrap_err();
    assert!(matches!(err, bucket_cache::CacheError::BucketVanished(_)));
}
