use super::helpers::{count_tables, key_on_disk, open_quiet, quiet_options};
use crate::{Lsm, MergeSettings, Options};
use std::time::Duration;
use tempfile::tempdir;

// -------------------- Scheduler pass --------------------

#[test]
fn compact_folds_level_0_into_level_1() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    // Bursts of a..z, each force-flushed: level 0 collects 4+ files.
    for burst in 0..4u32 {
        for c in b'a'..=b'z' {
            db.put(&[c], format!("{}-{}", c as char, burst).as_bytes())
                .unwrap();
        }
        db.flush().unwrap();
    }
    assert!(db.level_files(0) >= 4);

    // One scheduler pass with file_count=2, data_size=1.
    db.compact().unwrap();

    assert_eq!(db.level_files(0), 0, "level 0 empties after the merge");
    assert!(db.level_files(1) >= 1, "level 1 holds the merge output");

    // Every key still resolves to its most recent value.
    for c in b'a'..=b'z' {
        assert_eq!(
            db.get(&[c]).unwrap(),
            Some(format!("{}-3", c as char).into_bytes()),
            "key {}",
            c as char
        );
    }
}

#[test]
fn compaction_preserves_visibility() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    // Mixed history: overwrites and deletes across several flushes.
    for i in 0..30u32 {
        db.put(format!("k{:02}", i).as_bytes(), b"v1").unwrap();
    }
    db.flush().unwrap();
    for i in 0..30u32 {
        if i % 3 == 0 {
            db.put(format!("k{:02}", i).as_bytes(), b"v2").unwrap();
        }
        if i % 5 == 0 {
            db.delete(format!("k{:02}", i).as_bytes()).unwrap();
        }
    }
    db.flush().unwrap();
    db.flush().unwrap(); // no-op on an empty memtable

    let before: Vec<Option<Vec<u8>>> = (0..30u32)
        .map(|i| db.get(format!("k{:02}", i).as_bytes()).unwrap())
        .collect();

    db.compact().unwrap();

    let after: Vec<Option<Vec<u8>>> = (0..30u32)
        .map(|i| db.get(format!("k{:02}", i).as_bytes()).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn merge_skips_levels_below_thresholds() {
    let dir = tempdir().unwrap();
    let db = Lsm::open(
        dir.path(),
        Options {
            merge: MergeSettings {
                immediate: false,
                max_levels: 4,
                interval: Duration::ZERO,
                data_size: 1,
                file_count: 8, // more files than the test creates
            },
            ..quiet_options()
        },
    )
    .unwrap();

    for burst in 0..3u32 {
        db.put(format!("k{}", burst).as_bytes(), b"v").unwrap();
        db.flush().unwrap();
    }
    assert_eq!(db.level_files(0), 3);

    db.compact().unwrap();
    assert_eq!(db.level_files(0), 3, "below file_count: no merge");
    assert_eq!(db.level_files(1), 0);
}

#[test]
fn repeated_cycles_deepen_the_tree() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    for round in 0..3u32 {
        for burst in 0..4u32 {
            for i in 0..10u32 {
                let key = format!("r{}-b{}-k{:02}", round, burst, i);
                db.put(key.as_bytes(), b"payload").unwrap();
            }
            db.flush().unwrap();
        }
        db.compact().unwrap();
        assert_eq!(db.level_files(0), 0, "round {}", round);
    }

    // Everything written is still visible.
    for round in 0..3u32 {
        for burst in 0..4u32 {
            for i in 0..10u32 {
                let key = format!("r{}-b{}-k{:02}", round, burst, i);
                assert_eq!(
                    db.get(key.as_bytes()).unwrap(),
                    Some(b"payload".to_vec()),
                    "{}",
                    key
                );
            }
        }
    }
}

// -------------------- Tombstone elision --------------------

#[test]
fn tombstones_vanish_when_merge_reaches_the_bottom() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"x", b"1").unwrap();
    db.delete(b"x").unwrap();
    db.put(b"keep", b"v").unwrap();
    db.flush().unwrap();

    assert_eq!(db.get(b"x").unwrap(), None);
    assert!(key_on_disk(dir.path(), b"x"), "tombstone sits in level 0");

    // Level 0 is the deepest occupied level, so this merge elides.
    db.compact_level(0).unwrap();

    assert_eq!(db.get(b"x").unwrap(), None);
    assert!(
        !key_on_disk(dir.path(), b"x"),
        "tombstone physically gone after bottom merge"
    );
    assert_eq!(db.get(b"keep").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn tombstones_survive_merges_above_the_bottom() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    // Seed level 2 so a 0 -> 1 merge is not the deepest.
    db.put(b"deep", b"old").unwrap();
    db.flush().unwrap();
    db.compact_level(0).unwrap();
    db.compact_level(1).unwrap();
    assert!(db.level_files(2) >= 1);

    db.put(b"x", b"1").unwrap();
    db.delete(b"x").unwrap();
    db.flush().unwrap();

    db.compact_level(0).unwrap();

    assert_eq!(db.get(b"x").unwrap(), None);
    assert!(
        key_on_disk(dir.path(), b"x"),
        "tombstone must persist while older levels remain below"
    );
}

#[test]
fn self_compaction_at_deepest_level_drops_tombstones() {
    let dir = tempdir().unwrap();
    let opts = Options {
        merge: MergeSettings {
            immediate: false,
            max_levels: 1,
            interval: Duration::ZERO,
            data_size: 1,
            file_count: 2,
        },
        ..quiet_options()
    };
    let db = Lsm::open(dir.path(), opts).unwrap();

    // Seed level 1 with live data only.
    db.put(b"keep", b"v").unwrap();
    db.flush().unwrap();
    db.compact_level(0).unwrap();
    assert!(db.level_files(1) >= 1);

    // The tombstone merges down to level 1 intact: level 1 is occupied,
    // so a 0 -> 1 merge may not elide.
    db.put(b"x", b"1").unwrap();
    db.delete(b"x").unwrap();
    db.flush().unwrap();
    db.compact_level(0).unwrap();
    assert!(key_on_disk(dir.path(), b"x"));

    // Folding the configured deepest level into itself elides for good.
    db.compact_level(1).unwrap();

    assert!(!key_on_disk(dir.path(), b"x"));
    assert_eq!(db.get(b"keep").unwrap(), Some(b"v".to_vec()));
    assert_eq!(db.level_files(1), 1);
}

// -------------------- Level invariants --------------------

#[test]
fn merge_replaces_target_level_wholesale() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    for burst in 0..3u32 {
        for i in 0..10u32 {
            db.put(format!("b{}-{:02}", burst, i).as_bytes(), b"v")
                .unwrap();
        }
        db.flush().unwrap();
    }
    db.compact_level(0).unwrap();
    let first_gen = db.level_files(1);
    assert!(first_gen >= 1);

    for i in 0..10u32 {
        db.put(format!("z{:02}", i).as_bytes(), b"v").unwrap();
    }
    db.flush().unwrap();
    db.compact_level(0).unwrap();

    assert_eq!(db.level_files(0), 0);
    // The old level-1 tables were merged into the new generation; file
    // counts reflect only the latest install.
    assert_eq!(count_tables(dir.path()), db.level_files(1));

    for burst in 0..3u32 {
        for i in 0..10u32 {
            let key = format!("b{}-{:02}", burst, i);
            assert_eq!(db.get(key.as_bytes()).unwrap(), Some(b"v".to_vec()), "{}", key);
        }
    }
}

// -------------------- Background ticker --------------------

#[test]
fn ticker_merges_on_its_own() {
    let dir = tempdir().unwrap();
    let db = Lsm::open(
        dir.path(),
        Options {
            merge: MergeSettings {
                immediate: false,
                max_levels: 4,
                interval: Duration::from_millis(25),
                data_size: 1,
                file_count: 2,
            },
            ..quiet_options()
        },
    )
    .unwrap();

    for burst in 0..4u32 {
        for i in 0..10u32 {
            db.put(format!("b{}-{:02}", burst, i).as_bytes(), b"v")
                .unwrap();
        }
        db.flush().unwrap();
    }
    assert!(db.level_files(0) >= 4);

    // Give the ticker a few periods to notice and merge.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while db.level_files(0) > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(db.level_files(0), 0, "ticker never merged level 0");
    assert!(db.level_files(1) >= 1);
}

#[test]
fn immediate_mode_merges_after_threshold_flush() {
    let dir = tempdir().unwrap();
    let db = Lsm::open(
        dir.path(),
        Options {
            memtable_threshold: 8,
            sparse_key_distance: 64,
            wal_fsync: false,
            merge: MergeSettings {
                immediate: true,
                max_levels: 4,
                interval: Duration::ZERO,
                data_size: 1,
                file_count: 2,
            },
        },
    )
    .unwrap();

    for i in 0..40u32 {
        db.put(format!("key{:02}", i).as_bytes(), b"some-value")
            .unwrap();
    }
    db.flush().unwrap();

    // Threshold flushes ran merges on the flushing thread; level 0 can
    // hold at most what arrived since the last merge.
    assert!(db.level_files(0) <= 2, "l0 = {}", db.level_files(0));
    for i in 0..40u32 {
        let key = format!("key{:02}", i);
        assert_eq!(db.get(key.as_bytes()).unwrap(), Some(b"some-value".to_vec()), "{}", key);
    }
}
