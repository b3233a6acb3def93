use crate::{Lsm, MergeSettings, Options, Result};
use std::path::Path;
use std::time::Duration;

/// Options for deterministic tests: no background ticker, generous
/// memtable, merge thresholds low enough that one explicit pass fires.
pub fn quiet_options() -> Options {
    Options {
        memtable_threshold: 64_000,
        sparse_key_distance: 64,
        wal_fsync: false,
        merge: MergeSettings {
            immediate: false,
            max_levels: 4,
            interval: Duration::ZERO,
            data_size: 1,
            file_count: 2,
        },
    }
}

/// Opens an engine with the quiet options.
pub fn open_quiet(root: &Path) -> Result<Lsm> {
    Lsm::open(root, quiet_options())
}

/// Counts `.sst` files across every `level-N` directory under `root`.
pub fn count_tables(root: &Path) -> usize {
    let mut n = 0;
    for entry in std::fs::read_dir(root).unwrap().flatten() {
        let path = entry.path();
        let is_level = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("level-"));
        if path.is_dir() && is_level {
            n += std::fs::read_dir(&path)
                .unwrap()
                .flatten()
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|x| x == "sst")
                })
                .count();
        }
    }
    n
}

/// Scans every table under `root` for a raw key, ignoring tombstones vs
/// live records — "physically present" means any record at all.
pub fn key_on_disk(root: &Path, key: &[u8]) -> bool {
    for entry in std::fs::read_dir(root).unwrap().flatten() {
        let path = entry.path();
        let is_level = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("level-"));
        if !path.is_dir() || !is_level {
            continue;
        }
        for file in std::fs::read_dir(&path).unwrap().flatten() {
            let fp = file.path();
            if fp.extension().is_some_and(|x| x == "sst") {
                let reader = sstable::Reader::open(&fp).unwrap();
                for record in reader.iter() {
                    let (k, _) = record.unwrap();
                    if k == key {
                        return true;
                    }
                }
            }
        }
    }
    false
}
