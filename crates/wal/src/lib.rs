//! # WAL — Write-Ahead Log
//!
//! Crash-safety net for the memtable. Every mutation is appended here
//! before it becomes visible in memory; on restart [`Wal::load_mem`]
//! replays the log to rebuild the memtable exactly as it was.
//!
//! ## File layout
//!
//! ```text
//! [sequence: u64 LE]                        // flush-generation counter
//! [record_len: u32 LE][crc32: u32 LE][body] // repeated
//! ```
//!
//! Body: `[key_len: u32][key][val_len: u32][value]`. The value is already
//! kind-encoded (see [`memtable::value`]), so a tombstone is a one-byte
//! value — the WAL itself never interprets kinds.
//!
//! `record_len` includes the 4-byte CRC but not itself. The sequence
//! header counts completed flushes: the engine stamps the current value
//! into each SSTable trailer, bumps it with [`Wal::up_sequence`] after a
//! successful flush, and then truncates the record region with
//! [`Wal::clear`].
//!
//! ## Durability
//!
//! When `sync` is true every append is followed by `fsync`; otherwise
//! records are flushed to the OS and fsynced only on [`Wal::close`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::Memtable;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Byte length of the sequence header at the start of the file.
const HEADER_BYTES: u64 = 8;

/// Safety cap for a single replayed record.
const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Errors raised by WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record failed CRC validation or declared an absurd length.
    #[error("corrupt wal record")]
    Corrupt,
}

/// Append-only write-ahead log with a persisted flush-sequence counter.
pub struct Wal {
    path: PathBuf,
    file: File,
    seq: u64,
    sync: bool,
    /// Reusable scratch buffer so appends do not allocate.
    buf: Vec<u8>,
}

impl Wal {
    /// Opens (or creates) the log at `path`.
    ///
    /// A fresh file is initialized with sequence 0. An existing file has
    /// its sequence header read back; records are left untouched until
    /// [`load_mem`](Wal::load_mem) replays them.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let seq = if len < HEADER_BYTES {
            // Fresh (or torn-at-birth) log: stamp sequence 0.
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_u64::<LittleEndian>(0)?;
            file.flush()?;
            0
        } else {
            file.seek(SeekFrom::Start(0))?;
            file.read_u64::<LittleEndian>()?
        };

        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path,
            file,
            seq,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current flush-sequence counter.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Appends one `(key, encoded_value)` record.
    ///
    /// The frame is assembled in a scratch buffer and written with a
    /// single `write_all`, so a crash can only produce a truncated tail,
    /// never an interleaved record.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        self.buf.clear();
        self.buf.extend_from_slice(&[0u8; 8]); // frame header, filled below

        self.buf.write_u32::<LittleEndian>(key.len() as u32)?;
        self.buf.extend_from_slice(key);
        self.buf.write_u32::<LittleEndian>(value.len() as u32)?;
        self.buf.extend_from_slice(value);

        let body = &self.buf[8..];
        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        let record_len = body.len() as u64 + 4;
        if record_len > u64::from(u32::MAX) {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "wal record exceeds u32::MAX bytes",
            )));
        }

        let len_bytes = (record_len as u32).to_le_bytes();
        self.buf[0..4].copy_from_slice(&len_bytes);
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }

        Ok(())
    }

    /// Rebuilds a memtable from the logged records.
    ///
    /// Records replay in append order, so a later write for the same key
    /// wins naturally. A truncated tail (crash mid-append) is treated as
    /// clean EOF; a CRC mismatch is corruption and aborts recovery.
    pub fn load_mem(&self) -> Result<Memtable, WalError> {
        let mut mem = Memtable::new();

        let file = File::open(&self.path)?;
        let mut rdr = BufReader::new(file);
        rdr.seek(SeekFrom::Start(HEADER_BYTES))?;

        let mut body = Vec::with_capacity(256);
        loop {
            let record_len = match rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(mem),
                Err(e) => return Err(WalError::Io(e)),
            };
            if record_len <= 4 || record_len > MAX_RECORD_SIZE {
                return Err(WalError::Corrupt);
            }

            let crc = match rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(mem),
                Err(e) => return Err(WalError::Io(e)),
            };

            let body_len = (record_len - 4) as usize;
            body.clear();
            body.resize(body_len, 0);
            match rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(mem),
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != crc {
                return Err(WalError::Corrupt);
            }

            let mut br = &body[..];
            let key_len = br.read_u32::<LittleEndian>()? as usize;
            if key_len > br.len() {
                return Err(WalError::Corrupt);
            }
            let mut key = vec![0u8; key_len];
            br.read_exact(&mut key)?;

            let val_len = br.read_u32::<LittleEndian>()? as usize;
            if val_len > br.len() {
                return Err(WalError::Corrupt);
            }
            let mut value = vec![0u8; val_len];
            br.read_exact(&mut value)?;

            mem.put(key, value);
        }
    }

    /// Bumps the flush-sequence counter and persists the new value in the
    /// header.
    pub fn up_sequence(&mut self) -> Result<(), WalError> {
        self.seq += 1;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_u64::<LittleEndian>(self.seq)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Truncates the record region after a successful flush, keeping the
    /// sequence header.
    pub fn clear(&mut self) -> Result<(), WalError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_u64::<LittleEndian>(self.seq)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Durability barrier: forces everything to disk.
    pub fn close(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
