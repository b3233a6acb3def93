//! In-memory registry of live SSTables, grouped by level.
//!
//! Level 0 is the landing zone for memtable flushes and the only level
//! where key ranges of distinct tables may overlap. Deeper levels are
//! compaction products with disjoint ranges. Within a level, entries are
//! ordered by creation recency — youngest last — and readers consult
//! them youngest-first so newer values shadow older ones.
//!
//! The registry owns every [`Reader`] (and therefore every file handle):
//! dropping an entry, via [`Levels::flush`] or [`Levels::reload`],
//! deterministically closes the underlying file.

use std::path::{Path, PathBuf};

use bloom::BloomFilter;

use crate::fs::{is_table_name, level_path, table_timestamp};
use crate::reader::Reader;
use crate::SstError;

/// Number of addressable levels (0 through 254).
pub const MAX_LEVELS: usize = 255;

/// One live table: its reader handle and, when the table was produced by
/// this process, the bloom filter built alongside it. Tables reopened
/// from disk have no filter and are always searched.
pub struct TableEntry {
    pub reader: Reader,
    pub filter: Option<BloomFilter>,
}

impl TableEntry {
    #[must_use]
    pub fn new(reader: Reader, filter: Option<BloomFilter>) -> Self {
        Self { reader, filter }
    }
}

pub struct Levels {
    root: PathBuf,
    levels: Vec<Vec<TableEntry>>,
}

impl Levels {
    /// Opens the registry by scanning `level-0`, `level-1`, ... under
    /// `root`. A corrupt table aborts the scan — the engine refuses to
    /// start rather than silently dropping data.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, SstError> {
        let mut levels = Self {
            root: root.as_ref().to_path_buf(),
            levels: (0..MAX_LEVELS).map(|_| Vec::new()).collect(),
        };
        for level in 0..MAX_LEVELS as u8 {
            levels.reload(level)?;
        }
        Ok(levels)
    }

    /// Pushes an entry to the tail (youngest position) of a level.
    /// Index 255 is not addressable and is ignored.
    pub fn append(&mut self, level: u8, entry: TableEntry) {
        if let Some(files) = self.levels.get_mut(level as usize) {
            files.push(entry);
        }
    }

    /// Live entries at a level, youngest last.
    #[must_use]
    pub fn entries(&self, level: u8) -> &[TableEntry] {
        self.levels.get(level as usize).map_or(&[], Vec::as_slice)
    }

    /// Number of live tables at a level.
    #[must_use]
    pub fn len(&self, level: u8) -> usize {
        self.entries(level).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }

    /// Total on-disk byte size of a level.
    #[must_use]
    pub fn size(&self, level: u8) -> u64 {
        self.entries(level).iter().map(|e| e.reader.size()).sum()
    }

    /// Truncates a level to empty, dropping its readers (and closing
    /// their file handles). Returns the number of entries dropped.
    pub fn flush(&mut self, level: u8) -> usize {
        match self.levels.get_mut(level as usize) {
            Some(files) => {
                let n = files.len();
                files.clear();
                n
            }
            None => 0,
        }
    }

    /// Rescans a level's directory and replaces the in-memory list.
    ///
    /// Files are ordered by the creation timestamp embedded in their
    /// names (oldest first), so the youngest-last invariant holds across
    /// restarts. Non-matching filenames are ignored.
    pub fn reload(&mut self, level: u8) -> Result<(), SstError> {
        if level as usize >= self.levels.len() {
            return Ok(());
        }
        let dir = level_path(&self.root, level);
        let mut fresh = Vec::new();

        if dir.is_dir() {
            let mut names: Vec<String> = std::fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|n| is_table_name(n))
                .collect();
            names.sort_by_key(|n| (table_timestamp(n).unwrap_or(0), n.clone()));

            for name in names {
                let reader = Reader::open(dir.join(&name))?;
                fresh.push(TableEntry::new(reader, None));
            }
        }

        self.levels[level as usize] = fresh;
        Ok(())
    }

    /// Largest level index holding at least one table.
    #[must_use]
    pub fn max_level(&self) -> Option<u8> {
        self.levels
            .iter()
            .rposition(|files| !files.is_empty())
            .map(|i| i as u8)
    }

    /// Attaches a bloom filter to the entry whose file has the given
    /// name. Used after a compaction install: `reload` reopens the new
    /// tables filterless, and the filters built during the merge are
    /// re-attached here.
    pub fn attach_filter(&mut self, level: u8, filename: &str, filter: BloomFilter) {
        let Some(files) = self.levels.get_mut(level as usize) else {
            return;
        };
        for entry in files {
            let matches = entry
                .reader
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == filename);
            if matches {
                entry.filter = Some(filter);
                return;
            }
        }
    }

    /// Visibility-order iterator over all tables in levels
    /// `0..=max_level`: level 0 youngest first, then level 0 oldest, then
    /// level 1 youngest, and so on downward. A read walks this order and
    /// stops at the first table that yields a hit.
    pub fn iter(&self, max_level: u8) -> impl Iterator<Item = &TableEntry> {
        let end = (max_level as usize).min(MAX_LEVELS - 1);
        self.levels[..=end]
            .iter()
            .flat_map(|files| files.iter().rev())
    }
}
