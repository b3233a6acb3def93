//! # Engine — the SiltDB storage engine
//!
//! Ties the [`memtable`], [`wal`], and [`sstable`] crates together into
//! a complete LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                      LSM                         │
//! │                                                  │
//! │ put() ──channel──> WAL drainer ─> WAL append     │
//! │   |                     |                        │
//! │   v                     | (threshold exceeded?)  │
//! │ memtable insert         v                        │
//! │                      flush() ─> level-0 SSTable  │
//! │                                                  │
//! │ merge ticker ─> per-level thresholds ─> compact  │
//! │                 (L and L+1 fold into a new L+1)  │
//! │                                                  │
//! │ get() ─> memtable ─> level 0 young→old ─> deeper │
//! │              (first hit wins)                    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `lib.rs`       | `Lsm` struct, open/shutdown, accessors           |
//! | [`write`]      | `put()`, `delete()`, `flush()` and the flusher   |
//! | [`read`]       | `get()`                                          |
//! | [`compaction`] | merge scheduling and level installation          |
//! | [`tasks`]      | the WAL-drainer and merge-ticker threads         |
//! | [`flock`]      | exclusive ownership of the root directory        |
//!
//! ## Crash safety
//!
//! Every write reaches the WAL before the data can leave the memtable;
//! the WAL is truncated only after its contents are durable in a level-0
//! table. Compactions stage their outputs in a scratch directory and
//! install them with a single directory rename, so readers never observe
//! a half-written level.

mod compaction;
mod error;
mod flock;
mod options;
mod read;
mod tasks;
mod write;

pub use error::{Error, Result};
pub use options::{MergeSettings, Options};

use crossbeam_channel::Sender;
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use sstable::Levels;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;
use wal::Wal;

use flock::DirLock;

/// Maximum allowed key size in bytes.
pub const MAX_KEY_SIZE: usize = 65_535;
/// Maximum allowed value size in bytes.
pub const MAX_VALUE_SIZE: usize = 65_535;

/// Name of the write-ahead log file under the engine root.
const WAL_FILENAME: &str = "wal.log";
/// Name of the root-directory lock file.
const LOCK_FILENAME: &str = "LOCK";

/// Mutable engine state, guarded by one reader-writer lock: point reads
/// take it shared, the write path and the background tasks take it
/// exclusive.
pub(crate) struct State {
    pub(crate) wal: Wal,
    pub(crate) mem: Memtable,
    pub(crate) levels: Levels,
}

/// Everything shared with the background threads.
pub(crate) struct Core {
    pub(crate) root: PathBuf,
    pub(crate) opts: Options,
    pub(crate) state: RwLock<State>,
    _lock: DirLock,
}

/// A single-writer LSM-tree key-value store rooted at one directory.
///
/// # Write path
///
/// `put` hands `(key, encoded value)` to the WAL drainer over a
/// rendezvous channel and inserts into the memtable. The drainer appends
/// to the WAL and, when the memtable crosses its threshold, flushes it
/// to a new level-0 SSTable and truncates the WAL.
///
/// # Read path
///
/// `get` consults the memtable first, then every level in visibility
/// order (level 0 youngest-first, then deeper levels). The first hit —
/// live value or tombstone — is definitive.
///
/// # Background work
///
/// A merge ticker periodically inspects each level and folds level L
/// into L+1 once L exceeds its file-count and byte-size thresholds.
/// [`Lsm::shutdown`] stops both background threads and closes the WAL.
pub struct Lsm {
    core: Arc<Core>,
    /// Write-path side of the drainer channel. Taken (and dropped) on
    /// shutdown, which closes the channel and drains in-flight work.
    wal_tx: Mutex<Option<Sender<(Vec<u8>, Vec<u8>)>>>,
    /// Dropping this cancels the merge ticker.
    stop_tx: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Lsm {
    /// Opens the database rooted at `root`, creating the directory if
    /// needed.
    ///
    /// Recovery: the WAL is replayed into a fresh memtable and every
    /// `level-N` directory is scanned for live tables. A corrupt table
    /// or WAL aborts the open. Only one instance may own a root at a
    /// time — a second open fails with [`Error::Locked`].
    pub fn open<P: AsRef<Path>>(root: P, opts: Options) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let lock = DirLock::acquire(&root.join(LOCK_FILENAME)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                Error::Locked
            } else {
                Error::Io(e)
            }
        })?;

        // An interrupted compaction may have left a staging directory
        // behind; its contents were never installed.
        let staging = sstable::merge_path(&root);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }

        let wal = Wal::open(root.join(WAL_FILENAME), opts.wal_fsync)?;
        let mem = wal.load_mem()?;
        let levels = Levels::open(&root)?;

        let core = Arc::new(Core {
            root: root.clone(),
            opts,
            state: RwLock::new(State { wal, mem, levels }),
            _lock: lock,
        });

        let (wal_tx, wal_rx) = crossbeam_channel::bounded(0);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let mut workers = vec![tasks::spawn_wal_drainer(Arc::clone(&core), wal_rx)?];
        if !core.opts.merge.interval.is_zero() {
            workers.push(tasks::spawn_merge_ticker(Arc::clone(&core), stop_rx)?);
        }

        info!(root = %root.display(), "engine opened");

        Ok(Self {
            core,
            wal_tx: Mutex::new(Some(wal_tx)),
            stop_tx: Mutex::new(Some(stop_tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Root directory of this instance.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.core.root
    }

    /// Current WAL flush-sequence counter.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.core.state.read().wal.sequence()
    }

    /// Number of entries buffered in the memtable (tombstones included).
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.core.state.read().mem.len()
    }

    /// Byte size of the memtable buffer.
    #[must_use]
    pub fn memtable_size(&self) -> usize {
        self.core.state.read().mem.size()
    }

    /// Number of live tables at `level`.
    #[must_use]
    pub fn level_files(&self, level: u8) -> usize {
        self.core.state.read().levels.len(level)
    }

    /// Total on-disk bytes at `level`.
    #[must_use]
    pub fn level_size(&self, level: u8) -> u64 {
        self.core.state.read().levels.size(level)
    }

    /// Deepest level currently holding at least one table.
    #[must_use]
    pub fn max_level(&self) -> Option<u8> {
        self.core.state.read().levels.max_level()
    }

    /// Stops the background threads, drains in-flight writes, and closes
    /// the WAL. Idempotent; puts issued after this fail with
    /// [`Error::Closed`].
    pub fn shutdown(&self) -> Result<()> {
        // Closing the channel lets the drainer finish queued appends
        // before it exits.
        drop(self.wal_tx.lock().take());
        drop(self.stop_tx.lock().take());

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            let _ = handle.join();
        }

        self.core.state.write().wal.close()?;
        Ok(())
    }
}

impl Drop for Lsm {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl std::fmt::Debug for Lsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.core.state.read();
        let mut levels = Vec::new();
        for level in 0..sstable::MAX_LEVELS as u8 {
            let n = st.levels.len(level);
            if n > 0 {
                levels.push((level, n, st.levels.size(level)));
            }
        }
        f.debug_struct("Lsm")
            .field("root", &self.core.root)
            .field("sequence", &st.wal.sequence())
            .field("memtable_entries", &st.mem.len())
            .field("memtable_size", &st.mem.size())
            .field("levels", &levels)
            .finish()
    }
}

#[cfg(test)]
mod tests;
