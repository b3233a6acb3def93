//! Filesystem conventions: level directories and SSTable filenames.
//!
//! Each level lives in its own directory under the engine root
//! (`level-0`, `level-1`, ...). Table filenames are
//! `data_<uuid>-<unix_ts>.sst`; uniqueness comes from time plus a random
//! identifier rather than any shared counter, so flushes and compactions
//! never coordinate on naming. Files that do not match the pattern are
//! ignored on load.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Directory of SSTables for `level` under `root`.
#[must_use]
pub fn level_path(root: &Path, level: u8) -> PathBuf {
    root.join(format!("level-{}", level))
}

/// Staging directory that compaction writes its outputs into before the
/// atomic rename over the target level.
#[must_use]
pub fn merge_path(root: &Path) -> PathBuf {
    root.join("level-merge")
}

/// A fresh, process-unique table filename.
#[must_use]
pub fn new_table_name() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("data_{}-{}.sst", Uuid::new_v4(), ts)
}

/// Whether `name` matches the table filename pattern
/// `data_[-0-9a-f]+.sst`.
#[must_use]
pub(crate) fn is_table_name(name: &str) -> bool {
    let Some(body) = name.strip_prefix("data_").and_then(|n| n.strip_suffix(".sst")) else {
        return false;
    };
    !body.is_empty()
        && body
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// The unix timestamp embedded in a table filename, used to restore
/// creation order when a level is reloaded from disk.
#[must_use]
pub(crate) fn table_timestamp(name: &str) -> Option<u64> {
    name.strip_suffix(".sst")?.rsplit('-').next()?.parse().ok()
}
