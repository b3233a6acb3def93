//! K-way merge compaction.
//!
//! Merges the records of a set of input tables into a new, size-bounded
//! set of output tables inside the `level-merge` staging directory. The
//! caller installs the staging directory over the target level with an
//! atomic rename and then reloads the registry.
//!
//! Duplicate keys resolve by sequence number: the record from the table
//! with the larger trailer sequence (the newer write) wins. When
//! `drop_tombstones` is set — the merge is folding into the deepest
//! level, so no shadowed data can exist below — delete records are
//! elided entirely instead of being copied forward.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use bloom::BloomFilter;
use memtable::value::is_tombstone;

use crate::fs::{merge_path, new_table_name};
use crate::iterator::TableIter;
use crate::reader::Reader;
use crate::writer::Writer;
use crate::SstError;

/// One finished output table: its filename within the staging directory
/// and the bloom filter built while writing it.
pub struct CompactionOutput {
    pub filename: String,
    pub filter: BloomFilter,
}

/// A record waiting in the merge heap, tagged with its source table's
/// sequence number and input index.
struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    seq: u64,
    source: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq && self.source == other.source
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the key comparison so the
        // smallest key pops first. Ties on key surface the higher
        // sequence (newer write) first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Shared merge state: the heap plus one iterator per input.
struct MergeSources<'a> {
    heap: BinaryHeap<Node>,
    iters: Vec<TableIter<'a>>,
    seqs: Vec<u64>,
}

impl<'a> MergeSources<'a> {
    fn new(inputs: &[&'a Reader]) -> Result<Self, SstError> {
        let mut sources = Self {
            heap: BinaryHeap::new(),
            iters: inputs.iter().map(|r| r.iter()).collect(),
            seqs: inputs.iter().map(|r| r.sequence()).collect(),
        };
        for source in 0..inputs.len() {
            sources.advance(source)?;
        }
        Ok(sources)
    }

    /// Pushes `source`'s next record (if any) into the heap. A decode
    /// error inside an input table aborts the merge.
    fn advance(&mut self, source: usize) -> Result<(), SstError> {
        if let Some(record) = self.iters[source].next() {
            let (key, value) = record?;
            self.heap.push(Node {
                key,
                value,
                seq: self.seqs[source],
                source,
            });
        }
        Ok(())
    }
}

/// Merges `inputs` into size-bounded tables under `root/level-merge`.
///
/// Output writers use the given `sparse_distance`; a new output is
/// started whenever the current one's data bytes exceed `size_target`.
/// Returns the staging directory plus one [`CompactionOutput`] per table
/// written, or `None` when the inputs hold no records at all.
pub fn compact(
    root: &Path,
    inputs: &[&Reader],
    size_target: u64,
    sparse_distance: u32,
    drop_tombstones: bool,
) -> Result<Option<(PathBuf, Vec<CompactionOutput>)>, SstError> {
    let mut sources = MergeSources::new(inputs)?;
    if sources.heap.is_empty() {
        return Ok(None);
    }

    // Stage into a clean merge directory; leftovers from an interrupted
    // compaction are garbage by definition.
    let dir = merge_path(root);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;

    // Record-count estimate for bloom sizing: the inputs' data bytes
    // over a small per-record floor.
    let expected_keys = inputs
        .iter()
        .map(|r| (r.data_len() / 4) as usize)
        .sum::<usize>()
        .max(64);

    let plan = MergePlan {
        dir: dir.clone(),
        size_target,
        sparse_distance,
        expected_keys,
        drop_tombstones,
    };

    match run_merge(&plan, &mut sources) {
        Ok(outputs) => Ok(Some((dir, outputs))),
        Err(e) => {
            // The staging directory is garbage now; the next tick retries.
            let _ = std::fs::remove_dir_all(&dir);
            Err(e)
        }
    }
}

struct MergePlan {
    dir: PathBuf,
    size_target: u64,
    sparse_distance: u32,
    expected_keys: usize,
    drop_tombstones: bool,
}

fn run_merge(
    plan: &MergePlan,
    sources: &mut MergeSources<'_>,
) -> Result<Vec<CompactionOutput>, SstError> {
    let mut finished = Vec::new();
    let mut out = MergeOutput::create(plan)?;

    let mut cur = sources.heap.pop().expect("heap is non-empty");
    sources.advance(cur.source)?;

    while let Some(next) = sources.heap.pop() {
        sources.advance(next.source)?;
        if next.key == cur.key {
            // Same key from an older table: keep the newer record.
            if next.seq > cur.seq {
                cur = next;
            }
            continue;
        }
        out = out.write_record(plan, &cur, &mut finished)?;
        cur = next;
    }

    out = out.write_record(plan, &cur, &mut finished)?;
    out.finish(cur.seq, &mut finished)?;
    Ok(finished)
}

/// An in-progress output table and its bloom filter.
struct MergeOutput {
    writer: Writer,
    filter: BloomFilter,
    filename: String,
}

impl MergeOutput {
    fn create(plan: &MergePlan) -> Result<Self, SstError> {
        let filename = new_table_name();
        let writer = Writer::create(plan.dir.join(&filename), plan.sparse_distance)?;
        Ok(Self {
            writer,
            filter: BloomFilter::with_capacity(plan.expected_keys, 0.01),
            filename,
        })
    }

    /// Writes one surviving record, rolling over to a fresh output first
    /// when this one has outgrown its size target.
    fn write_record(
        mut self,
        plan: &MergePlan,
        node: &Node,
        finished: &mut Vec<CompactionOutput>,
    ) -> Result<Self, SstError> {
        if plan.drop_tombstones && is_tombstone(&node.value) {
            return Ok(self);
        }

        if self.writer.data_bytes() > plan.size_target {
            let fresh = MergeOutput::create(plan)?;
            std::mem::replace(&mut self, fresh).finish(node.seq, finished)?;
        }

        self.filter.insert(&node.key);
        self.writer.write(&node.key, &node.value)?;
        Ok(self)
    }

    /// Finalizes the table with `seq` and records it as an output. An
    /// output that received no records (every candidate was an elided
    /// tombstone) is deleted instead of installed.
    fn finish(mut self, seq: u64, finished: &mut Vec<CompactionOutput>) -> Result<(), SstError> {
        if self.writer.is_empty() {
            let path = self.writer.path().to_path_buf();
            drop(self.writer);
            let _ = std::fs::remove_file(path);
            return Ok(());
        }
        self.writer.add_index_block(seq)?;
        self.writer.close()?;
        finished.push(CompactionOutput {
            filename: self.filename,
            filter: self.filter,
        });
        Ok(())
    }
}
