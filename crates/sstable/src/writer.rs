//! Streaming SSTable writer.
//!
//! Callers deliver strictly ascending, unique keys via
//! [`Writer::write`]; the writer appends each encoded record to the data
//! region and accumulates the sparse index in memory. Finalizing with
//! [`Writer::add_index_block`] appends the index region and trailer,
//! after which the file is immutable and self-describing.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use crate::format::put_record;
use crate::reader::Reader;
use crate::SstError;

pub struct Writer {
    path: PathBuf,
    file: BufWriter<File>,

    /// Sparse-index buffer: concatenated anchor records.
    index: Vec<u8>,
    /// Byte position of each anchor within `index`.
    offsets: Vec<u32>,
    /// Target segment size in data-region bytes.
    sparse_distance: u32,
    /// Encoded bytes written since the last emitted anchor.
    distance: u64,
    /// First key of the current segment and its data offset, emitted
    /// into the index when the segment fills (or at finalization).
    pending: Option<(Vec<u8>, u32)>,

    /// Next record's data-region offset.
    data_pos: u64,
    /// Raw key+value payload bytes written; drives compaction rollover.
    raw_bytes: u64,
    entries: u64,
    /// Scratch buffer for record encoding.
    record: Vec<u8>,

    indexed: bool,
    closed: bool,
}

impl Writer {
    /// Creates the table file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, sparse_distance: u32) -> Result<Self, SstError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: BufWriter::new(file),
            index: Vec::new(),
            offsets: Vec::new(),
            sparse_distance,
            distance: 0,
            pending: None,
            data_pos: 0,
            raw_bytes: 0,
            entries: 0,
            record: Vec::with_capacity(256),
            indexed: false,
            closed: false,
        })
    }

    /// Appends one record. Keys must arrive strictly ascending and
    /// unique; the writer does not re-sort.
    pub fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), SstError> {
        self.record.clear();
        let encoded = put_record(&mut self.record, key, value);
        self.file.write_all(&self.record)?;

        if self.pending.is_none() {
            let offset = u32::try_from(self.data_pos).map_err(|_| {
                SstError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "data region exceeds u32 offset space",
                ))
            })?;
            self.pending = Some((key.to_vec(), offset));
        }

        self.distance += encoded as u64;
        if self.distance >= u64::from(self.sparse_distance) {
            self.emit_pending();
            self.distance = 0;
        }

        self.data_pos += encoded as u64;
        self.raw_bytes += (key.len() + value.len()) as u64;
        self.entries += 1;
        Ok(())
    }

    /// Moves the pending anchor into the index buffer.
    fn emit_pending(&mut self) {
        if let Some((key, offset)) = self.pending.take() {
            self.offsets.push(self.index.len() as u32);
            put_record(&mut self.index, &key, &offset.to_le_bytes());
        }
    }

    /// Finalizes the file: emits the trailing anchor, then appends the
    /// offset table, the sequence stamp, the anchor count, and the total
    /// index-region length.
    pub fn add_index_block(&mut self, seq: u64) -> Result<(), SstError> {
        self.emit_pending();

        for offset in &self.offsets {
            self.index.extend_from_slice(&offset.to_le_bytes());
        }
        self.index.extend_from_slice(&seq.to_le_bytes());
        self.index
            .extend_from_slice(&(self.offsets.len() as u32).to_le_bytes());
        // Total index-region length, including this final field itself.
        self.index
            .extend_from_slice(&(self.index.len() as u32 + 4).to_le_bytes());

        self.file.write_all(&self.index)?;
        self.indexed = true;
        Ok(())
    }

    /// Flushes buffers and syncs the file. Refuses to close a file whose
    /// index block was never written — such a file is unusable.
    pub fn close(&mut self) -> Result<(), SstError> {
        if self.closed {
            return Ok(());
        }
        if !self.indexed {
            return Err(SstError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "index block not added",
            )));
        }
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        self.closed = true;
        Ok(())
    }

    /// Closes the writer (if needed) and reopens the finished file as a
    /// [`Reader`].
    pub fn into_reader(mut self) -> Result<Reader, SstError> {
        self.close()?;
        Reader::open(&self.path)
    }

    /// Raw key+value payload bytes written so far.
    #[must_use]
    pub fn data_bytes(&self) -> u64 {
        self.raw_bytes
    }

    /// Number of records written so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
