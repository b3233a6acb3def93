//! Lazy, ascending iteration over a whole SSTable.
//!
//! The iterator walks segments left to right, buffering one segment at a
//! time and decoding records out of the buffer. It borrows the reader —
//! the reader stays open for as long as any iterator is alive — and is
//! finite and non-restartable.

use crate::format::decode_record;
use crate::reader::Reader;
use crate::SstError;

pub struct TableIter<'a> {
    reader: &'a Reader,
    /// Next segment to buffer.
    segment: usize,
    /// Current segment's bytes and the decode position within them.
    block: Vec<u8>,
    pos: usize,
    /// Set after an error; the iterator is fused once poisoned.
    failed: bool,
}

impl<'a> TableIter<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Self {
            reader,
            segment: 0,
            block: Vec::new(),
            pos: 0,
            failed: false,
        }
    }
}

impl Iterator for TableIter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>), SstError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.pos < self.block.len() {
                match decode_record(&self.block[self.pos..]) {
                    Ok((key, value, n)) => {
                        self.pos += n;
                        return Some(Ok((key.to_vec(), value.to_vec())));
                    }
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }

            if self.segment >= self.reader.sparse_len() {
                return None;
            }

            let bounds = self
                .reader
                .segment_bounds(self.segment)
                .and_then(|(from, to)| self.reader.read_block(from, to));
            match bounds {
                Ok(block) => {
                    self.block = block;
                    self.pos = 0;
                    self.segment += 1;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
