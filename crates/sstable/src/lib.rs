//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk storage files for the SiltDB storage engine, plus
//! the level registry that tracks them and the k-way-merge compaction
//! that rewrites them.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its size threshold
//! the engine flushes it to a level-0 SSTable. SSTables are *write-once,
//! read-many* — once finalized they are never modified, only superseded
//! by compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ DATA REGION (sorted key/value records)                       │
//! │                                                              │
//! │ [key_len: uvarint][val_len: uvarint][key][value]             │
//! │ ... repeated, strictly ascending keys ...                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ INDEX REGION (sparse index)                                  │
//! │                                                              │
//! │ one anchor per data segment, encoded as a record whose       │
//! │ value is the segment's 4-byte data offset:                   │
//! │ [key_len: uvarint][4: uvarint][anchor_key][u32 data_offset]  │
//! │                                                              │
//! │ [u32 offset_of_anchor_i] × count   // into the index region  │
//! │ [u64 sequence_number]                                        │
//! │ [u32 count]                                                  │
//! │ [u32 index_region_total_length]    // includes this trailer  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The file is self-describing: the last
//! 16 bytes carry `(sequence, count, index_length)`, and subtracting
//! `index_length` from the file size yields the first byte of the index
//! region — which is also the end of the data region.
//!
//! The sparse index partitions the data region into segments of roughly
//! `sparse_key_distance` bytes. A point lookup binary-searches the
//! anchors to a single segment and then scans that segment linearly, so
//! the in-memory footprint per table is one anchor per segment rather
//! than one entry per key.

mod compact;
mod format;
mod fs;
mod iterator;
mod level;
mod reader;
mod writer;

pub use compact::{compact, CompactionOutput};
pub use format::{decode_record, encode_record, TRAILER_BYTES};
pub use fs::{level_path, merge_path, new_table_name};
pub use iterator::TableIter;
pub use level::{Levels, TableEntry, MAX_LEVELS};
pub use reader::Reader;
pub use writer::Writer;

use std::io;
use thiserror::Error;

/// Errors raised by SSTable operations.
#[derive(Debug, Error)]
pub enum SstError {
    /// The searched key is not present in the table.
    #[error("key not found")]
    KeyNotFound,

    /// The file's trailer, index, or a record failed to decode.
    #[error("corrupt sstable: {0}")]
    Corrupt(String),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests;
