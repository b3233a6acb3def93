//! Random-access SSTable reader.
//!
//! Opening a reader loads the index region into memory; the data region
//! stays on disk. A point lookup binary-searches the in-memory anchors
//! down to one segment, reads that segment, and scans it linearly.
//!
//! The reader exclusively owns its file handle for its whole lifetime;
//! dropping the reader closes the handle. Iterators borrow the reader
//! and never outlive it.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::{decode_record, get_u32, get_u64, TRAILER_BYTES};
use crate::iterator::TableIter;
use crate::SstError;

pub struct Reader {
    path: PathBuf,
    /// Persistent handle, wrapped in a mutex so lookups work through a
    /// shared reference.
    file: Mutex<File>,
    /// Total file size in bytes.
    size: u64,
    /// First byte of the index region; also the end of the data region.
    data_end: u64,
    /// Sequence number stamped in the trailer at creation time.
    seq: u64,
    /// Concatenated anchor records.
    anchors: Vec<u8>,
    /// Byte position of each anchor within `anchors`.
    offsets: Vec<u32>,
}

impl Reader {
    /// Opens a finalized table and loads its sparse index.
    ///
    /// # Errors
    ///
    /// [`SstError::Corrupt`] when the trailer or index fails validation;
    /// [`SstError::Io`] on any filesystem error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SstError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let size = file.metadata()?.len();

        if size < TRAILER_BYTES {
            return Err(SstError::Corrupt(format!(
                "file too small for trailer: {} bytes",
                size
            )));
        }

        // Trailer: [seq: u64][count: u32][index_len: u32] at EOF - 16.
        let mut trailer = [0u8; TRAILER_BYTES as usize];
        file.seek(SeekFrom::Start(size - TRAILER_BYTES))?;
        file.read_exact(&mut trailer)?;

        let seq = get_u64(&trailer[0..8])?;
        let count = get_u32(&trailer[8..12])? as usize;
        let index_len = u64::from(get_u32(&trailer[12..16])?);

        if index_len < TRAILER_BYTES + count as u64 * 4 || index_len > size {
            return Err(SstError::Corrupt(format!(
                "index length {} inconsistent with file size {} and {} anchors",
                index_len, size, count
            )));
        }

        let data_end = size - index_len;

        // The index region minus the trailer: anchors then offset table.
        let body_len = (index_len - TRAILER_BYTES) as usize;
        let mut body = vec![0u8; body_len];
        file.seek(SeekFrom::Start(data_end))?;
        file.read_exact(&mut body)?;

        let split = body_len - count * 4;
        let mut offsets = Vec::with_capacity(count);
        for chunk in body[split..].chunks_exact(4) {
            let off = get_u32(chunk)?;
            if u64::from(off) >= split as u64 && split != 0 {
                return Err(SstError::Corrupt(format!(
                    "anchor offset {} beyond index body {}",
                    off, split
                )));
            }
            offsets.push(off);
        }
        body.truncate(split);

        Ok(Self {
            path,
            file: Mutex::new(file),
            size,
            data_end,
            seq,
            anchors: body,
            offsets,
        })
    }

    /// Sequence number from the trailer.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Total file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Byte length of the data region.
    #[must_use]
    pub fn data_len(&self) -> u64 {
        self.data_end
    }

    /// Number of sparse-index anchors (= data segments).
    #[must_use]
    pub fn sparse_len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes anchor `i` into its key and data-region offset.
    pub(crate) fn anchor(&self, i: usize) -> Result<(&[u8], u64), SstError> {
        let start = self.offsets[i] as usize;
        let (key, value, _) = decode_record(&self.anchors[start..])?;
        if value.len() != 4 {
            return Err(SstError::Corrupt(format!(
                "anchor {} has {}-byte offset field",
                i,
                value.len()
            )));
        }
        Ok((key, u64::from(get_u32(value)?)))
    }

    /// Data-region bounds `[from, to)` of segment `i`.
    pub(crate) fn segment_bounds(&self, i: usize) -> Result<(u64, u64), SstError> {
        let (_, from) = self.anchor(i)?;
        let to = if i + 1 < self.offsets.len() {
            self.anchor(i + 1)?.1
        } else {
            self.data_end
        };
        Ok((from, to))
    }

    /// Reads the raw data-region bytes `[from, to)`.
    pub(crate) fn read_block(&self, from: u64, to: u64) -> Result<Vec<u8>, SstError> {
        if from > to || to > self.data_end {
            return Err(SstError::Corrupt(format!(
                "segment bounds [{}, {}) outside data region of {} bytes",
                from, to, self.data_end
            )));
        }
        let mut block = vec![0u8; (to - from) as usize];
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.seek(SeekFrom::Start(from))?;
        file.read_exact(&mut block)?;
        Ok(block)
    }

    /// Point lookup: binary search over the anchors, then a linear scan
    /// of the single surviving segment.
    ///
    /// Returns the stored (encoded) value, or [`SstError::KeyNotFound`].
    pub fn search(&self, key: &[u8]) -> Result<Vec<u8>, SstError> {
        let (from, to) = self.locate_segment(key)?;
        if from >= to {
            return Err(SstError::KeyNotFound);
        }
        let block = self.read_block(from, to)?;
        let mut pos = 0;
        while pos < block.len() {
            let (k, v, n) = decode_record(&block[pos..])?;
            if k == key {
                return Ok(v.to_vec());
            }
            pos += n;
        }
        Err(SstError::KeyNotFound)
    }

    /// Narrows the data region to the one segment that can contain `key`.
    ///
    /// Maintains a `[from, to)` byte window. An exact anchor hit pins the
    /// window to that anchor's segment; otherwise each probe halves the
    /// anchor range, raising `from` past smaller anchors and lowering
    /// `to` to larger ones.
    fn locate_segment(&self, key: &[u8]) -> Result<(u64, u64), SstError> {
        let mut low = 0usize;
        let mut high = self.offsets.len();
        let mut from = 0u64;
        let mut to = self.data_end;

        while low < high {
            let mid = (low + high) / 2;
            let (anchor_key, offset) = self.anchor(mid)?;
            match key.cmp(anchor_key) {
                Ordering::Equal => {
                    let end = if mid + 1 < self.offsets.len() {
                        self.anchor(mid + 1)?.1
                    } else {
                        self.data_end
                    };
                    return Ok((offset, end));
                }
                Ordering::Less => {
                    to = offset;
                    high = mid;
                }
                Ordering::Greater => {
                    from = offset;
                    low = mid + 1;
                }
            }
        }

        Ok((from, to))
    }

    /// Lazy ascending iterator over every record in the table.
    #[must_use]
    pub fn iter(&self) -> TableIter<'_> {
        TableIter::new(self)
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("data_end", &self.data_end)
            .field("seq", &self.seq)
            .field("sparse_len", &self.offsets.len())
            .finish()
    }
}
