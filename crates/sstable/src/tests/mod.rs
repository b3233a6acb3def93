
use crate::{Reader, Writer};
use std::path::Path;

/// Writes a table of already-sorted `(key, value)` pairs and reopens it.
pub(crate) fn build_table(
    path: &Path,
    sparse_distance: u32,
    seq: u64,
    pairs: &[(&[u8], &[u8])],
) -> Reader {
    let mut wr = Writer::create(path, sparse_distance).unwrap();
    for &(key, value) in pairs {
        wr.write(key, value).unwrap();
    }
    wr.add_index_block(seq).unwrap();
    wr.into_reader().unwrap()
}
