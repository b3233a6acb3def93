//! Read path: point lookups.

use memtable::value::{is_tombstone, payload};
use sstable::SstError;

use crate::{Lsm, Result};

impl Lsm {
    /// Looks up a key, returning `Ok(None)` when it was never written or
    /// its newest record is a tombstone.
    ///
    /// Order: memtable first, then every table in visibility order —
    /// level 0 youngest to oldest, then each deeper level. The first
    /// table whose bloom filter admits the key *and* whose lookup hits
    /// holds the definitive answer.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let st = self.core.state.read();

        if let Some(encoded) = st.mem.get(key) {
            if is_tombstone(encoded) {
                return Ok(None);
            }
            return Ok(Some(payload(encoded).to_vec()));
        }

        for entry in st.levels.iter(self.core.opts.merge.max_levels) {
            if let Some(filter) = &entry.filter {
                if !filter.may_contain(key) {
                    continue;
                }
            }
            match entry.reader.search(key) {
                Ok(encoded) => {
                    if is_tombstone(&encoded) {
                        return Ok(None);
                    }
                    return Ok(Some(payload(&encoded).to_vec()));
                }
                Err(SstError::KeyNotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }
}
