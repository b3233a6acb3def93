//! Write path: `put()`, `delete()`, `flush()`, and the internal flusher.
//!
//! A `put` travels over the drainer channel — the drainer owns WAL
//! appends and threshold flushes — and then lands in the memtable.
//! `delete` writes its tombstone to the WAL synchronously under the
//! state lock. Either way the WAL sees a mutation before it can outlive
//! the memtable.

use bloom::BloomFilter;
use memtable::value::{encode, OpKind};
use memtable::Memtable;
use sstable::{level_path, new_table_name, TableEntry, Writer};
use std::path::Path;
use tracing::debug;

use crate::{compaction, Core, Error, Lsm, Result, State, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Lsm {
    /// Inserts a key-value pair.
    ///
    /// Blocks on the drainer channel (the WAL append itself completes
    /// asynchronously), then makes the write visible in the memtable.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyRequired);
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge);
        }
        if value.is_empty() {
            return Err(Error::ValueRequired);
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge);
        }

        let encoded = encode(OpKind::Set, value);

        let tx = self.wal_tx.lock().clone().ok_or(Error::Closed)?;
        tx.send((key.to_vec(), encoded.clone()))
            .map_err(|_| Error::Closed)?;

        self.core.state.write().mem.put(key.to_vec(), encoded);
        Ok(())
    }

    /// Deletes a key by inserting a tombstone. The tombstone shadows any
    /// older value in the tables below until compaction elides it at the
    /// deepest level.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyRequired);
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge);
        }
        if self.wal_tx.lock().is_none() {
            return Err(Error::Closed);
        }

        let encoded = encode(OpKind::Delete, &[]);
        let mut st = self.core.state.write();
        st.wal.append(key, &encoded)?;
        st.mem.put(key.to_vec(), encoded);
        Ok(())
    }

    /// Forces the memtable out to a level-0 table regardless of its
    /// size. A no-op when the memtable is empty.
    pub fn flush(&self) -> Result<()> {
        let flushed = {
            let mut st = self.core.state.write();
            flush_locked(&self.core, &mut st)?
        };
        if flushed && self.core.opts.merge.immediate {
            compaction::merge_pass(&self.core)?;
        }
        Ok(())
    }
}

/// Drains the memtable into a fresh level-0 table. Caller holds the
/// state write lock. Returns whether anything was written.
///
/// On failure before the WAL truncation the snapshot is folded back into
/// the memtable and the partial file removed — the data stays
/// recoverable from memory now and from the WAL after a crash.
pub(crate) fn flush_locked(core: &Core, st: &mut State) -> Result<bool> {
    if st.mem.is_empty() {
        return Ok(false);
    }

    let dir = level_path(&core.root, 0);
    std::fs::create_dir_all(&dir)?;
    let name = new_table_name();
    let path = dir.join(&name);

    let snapshot = st.mem.switch();

    let entry = match write_table(&path, &snapshot, st.wal.sequence(), core.opts.sparse_key_distance)
    {
        Ok(entry) => entry,
        Err(e) => {
            restore(st, &snapshot);
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
    };

    if let Err(e) = st.wal.up_sequence() {
        restore(st, &snapshot);
        drop(entry);
        let _ = std::fs::remove_file(&path);
        return Err(e.into());
    }

    st.levels.append(0, entry);
    st.wal.clear()?;

    debug!(table = %name, entries = snapshot.len(), "memtable flushed to level 0");
    Ok(true)
}

/// Streams a memtable snapshot into a finalized, reopened table with its
/// freshly built bloom filter.
fn write_table(
    path: &Path,
    mem: &Memtable,
    seq: u64,
    sparse_distance: u32,
) -> Result<TableEntry> {
    let mut writer = Writer::create(path, sparse_distance)?;
    let mut filter = BloomFilter::with_capacity(mem.len().max(1), 0.01);

    for (key, value) in mem.iter() {
        filter.insert(key);
        writer.write(key, value)?;
    }

    writer.add_index_block(seq)?;
    let reader = writer.into_reader()?;
    Ok(TableEntry::new(reader, Some(filter)))
}

/// Puts a failed flush's snapshot back into the live memtable. The lock
/// was held throughout, so nothing newer can be clobbered.
fn restore(st: &mut State, snapshot: &Memtable) {
    for (key, value) in snapshot.iter() {
        st.mem.put(key.to_vec(), value.to_vec());
    }
}
