// Scenario 4: two threads race to admit the same never-before-seen bucket
// name. Exactly one admission should report `created`, and both callers
// must end up pinning the same live entry.

use std::fs;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use bucket_cache::{BucketCache, GetFlags};
use tempfile::tempdir;

#[test]
fn concurrent_first_admission_converges_on_one_entry() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    let dir = bucket_dir.path().join("contested");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("object"), b"x").unwrap();

    let cache = Arc::new(BucketCache::try_new(bucket_dir.path(), db_dir.path(), 10, 4, 2).unwrap());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let (handle, flags) = cache.get_bucket("contested", GetFlags::NONE).unwrap();
                (handle.name(), handle.handle(), flags.created)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.iter().all(|(name, ..)| name == "contested"));

    // Comparing names alone would pass even if every thread had pinned a
    // distinct, independently-admitted slot for "contested" -- the actual
    // claim of this test is that they all converge on the exact same entry.
    let first_handle = results[0].1;
    assert!(
        results.iter().all(|(_, handle, _)| *handle == first_handle),
        "all callers must pin the identical entry, not just entries sharing a name"
    );

    let created_count = results.iter().filter(|(_, _, created)| *created).count();
    assert_eq!(created_count, 1, "exactly one caller should have performed admission");
}

#[test]
fn concurrent_gets_on_distinct_names_all_succeed() {
    let bucket_dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    for i in 0..16 {
        let dir = bucket_dir.path().join(format!("bucket-{i}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("object"), b"x").unwrap();
    }

    let cache = Arc::new(BucketCache::try_new(bucket_dir.path(), db_dir.path(), 16, 4, 2).unwrap());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let name = format!("bucket-{i}");
                let (handle, flags) = cache.get_bucket(&name, GetFlags::LOCK).unwrap();
                assert!(flags.created);
                assert!(handle.is_filled());
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.recycle_count(), 0);
}
