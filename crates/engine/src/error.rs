//! Errors exposed at the engine facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `put`/`delete` called with an empty key.
    #[error("key required")]
    KeyRequired,

    /// `put` called with an empty value.
    #[error("value required")]
    ValueRequired,

    /// Key exceeds the 65535-byte limit.
    #[error("key too large")]
    KeyTooLarge,

    /// Value exceeds the 65535-byte limit.
    #[error("value too large")]
    ValueTooLarge,

    /// The engine has been shut down; the write channel is closed.
    #[error("engine closed")]
    Closed,

    /// Another engine instance owns the root directory.
    #[error("root directory locked by another instance")]
    Locked,

    /// Write-ahead-log failure (I/O or a corrupt record during replay).
    #[error(transparent)]
    Wal(#[from] wal::WalError),

    /// SSTable failure (I/O or a corrupt table). `KeyNotFound` from a
    /// single table never surfaces here — the read path treats it as
    /// "keep looking".
    #[error(transparent)]
    Table(#[from] sstable::SstError),

    /// Any other filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
