//! Engine configuration.

use std::time::Duration;

/// Tunables for one [`Lsm`](crate::Lsm) instance.
#[derive(Debug, Clone)]
pub struct Options {
    /// Memtable byte size that triggers a flush to level 0.
    pub memtable_threshold: u32,

    /// Base distance in bytes between sparse-index keys for level-0
    /// tables. Compaction outputs for level L+1 scale this by 2^(L+1).
    pub sparse_key_distance: u32,

    /// Fsync the WAL on every append. Off by default: appends reach the
    /// OS immediately but durability is best-effort until the next
    /// flush or close.
    pub wal_fsync: bool,

    /// Background merge policy.
    pub merge: MergeSettings,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            memtable_threshold: 64_000,
            sparse_key_distance: 4 << 10,
            wal_fsync: false,
            merge: MergeSettings::default(),
        }
    }
}

/// Parameters governing when and how levels merge.
#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// Run a merge pass on the flushing thread right after each flush,
    /// instead of waiting for the ticker. Used by tests that need
    /// deterministic compaction.
    pub immediate: bool,

    /// Deepest level index. The scheduler never merges this level
    /// forward; a manual compaction of it folds the level into itself
    /// and drops tombstones for good.
    pub max_levels: u8,

    /// Tick period of the background merge scheduler. Zero disables the
    /// ticker entirely.
    pub interval: Duration,

    /// Skip merging a level holding fewer than this many bytes.
    pub data_size: u64,

    /// File-count trigger: level L merges once it holds at least this
    /// many files and more than `file_count * (L + 1)`.
    pub file_count: usize,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            immediate: false,
            max_levels: 255,
            interval: Duration::from_secs(2),
            data_size: 1 << 20,
            file_count: 8,
        }
    }
}
