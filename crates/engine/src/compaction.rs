//! Compaction scheduling and level installation.
//!
//! The merge pass walks every occupied level and folds level L into
//! L + 1 once L exceeds both its file-count and byte-size thresholds.
//! The k-way merge itself lives in [`sstable::compact`]; this module
//! decides *when* to run it and installs its outputs atomically.

use sstable::{level_path, Reader};
use std::path::PathBuf;
use tracing::debug;

use crate::{Core, Lsm, Result};

impl Lsm {
    /// Runs one scheduler pass on the calling thread: every level whose
    /// thresholds are exceeded is merged into the next. The background
    /// ticker calls this same routine.
    pub fn compact(&self) -> Result<()> {
        merge_pass(&self.core)
    }

    /// Merges `level` into `level + 1` unconditionally — or, when
    /// `level` is the configured deepest level, folds it into itself,
    /// discarding tombstones for good.
    pub fn compact_level(&self, level: u8) -> Result<()> {
        compact_level(&self.core, level)
    }
}

/// One pass over all occupied levels.
///
/// A level L is merged when: the file-count trigger is enabled, L holds
/// at least `file_count` tables *and* more than `file_count * (L + 1)`,
/// and its byte size reaches `data_size`. The deepest configured level
/// is never merged forward by the scheduler.
pub(crate) fn merge_pass(core: &Core) -> Result<()> {
    let merge = &core.opts.merge;
    let Some(max) = core.state.read().levels.max_level() else {
        return Ok(());
    };

    for level in 0..=max {
        if level == merge.max_levels {
            continue;
        }
        let (files, bytes) = {
            let st = core.state.read();
            (st.levels.len(level), st.levels.size(level))
        };
        let need = merge.file_count > 0
            && files >= merge.file_count
            && files > merge.file_count * (usize::from(level) + 1)
            && bytes >= merge.data_size;
        if need {
            debug!(level, files, bytes, "level exceeds merge thresholds");
            compact_level(core, level)?;
        }
    }
    Ok(())
}

/// Merges all tables at `level` with all tables at `level + 1` and
/// installs the result as the new `level + 1`; `level` is then emptied.
///
/// Tombstones are elided when nothing can live below the target: the
/// merge reaches the deepest occupied level, or it is a self-compaction
/// of the configured deepest level.
pub(crate) fn compact_level(core: &Core, level: u8) -> Result<()> {
    let mut guard = core.state.write();
    let st = &mut *guard;

    let Some(current_max) = st.levels.max_level() else {
        return Ok(());
    };
    if level > current_max {
        debug!(level, current_max, "nothing to merge at level");
        return Ok(());
    }

    let merge = &core.opts.merge;
    let self_compact = level == merge.max_levels;
    if !self_compact && usize::from(level) + 1 >= sstable::MAX_LEVELS {
        return Ok(()); // no level below the last addressable one
    }
    let target = if self_compact { level } else { level + 1 };
    let drop_tombstones = self_compact || level == current_max;

    // Deeper levels hold bigger tables: scale both the output size
    // target and the sparse distance by 2^(L+1).
    let shift = u32::from(level).saturating_add(1).min(20);
    let size_target = u64::from(core.opts.memtable_threshold) << shift;
    let sparse_distance =
        u32::try_from(u64::from(core.opts.sparse_key_distance) << shift).unwrap_or(u32::MAX);

    let inputs: Vec<&Reader> = if self_compact {
        st.levels.entries(level).iter().map(|e| &e.reader).collect()
    } else {
        st.levels
            .entries(level)
            .iter()
            .chain(st.levels.entries(target).iter())
            .map(|e| &e.reader)
            .collect()
    };

    let Some((staging, outputs)) =
        sstable::compact(&core.root, &inputs, size_target, sparse_distance, drop_tombstones)?
    else {
        return Ok(());
    };
    drop(inputs);

    let source_paths: Vec<PathBuf> = if self_compact {
        Vec::new() // the whole level directory is replaced below
    } else {
        st.levels
            .entries(level)
            .iter()
            .map(|e| e.reader.path().to_path_buf())
            .collect()
    };

    // Atomic install: replace the target directory with the staging
    // directory in one rename, then unlink the source tables.
    let target_dir = level_path(&core.root, target);
    if target_dir.exists() {
        std::fs::remove_dir_all(&target_dir)?;
    }
    std::fs::rename(&staging, &target_dir)?;
    for path in source_paths {
        let _ = std::fs::remove_file(path);
    }

    // Fresh readers over the installed tables; the old entries drop
    // here, closing their handles. Filters built during the merge are
    // re-attached to the reopened readers.
    st.levels.reload(target)?;
    for output in outputs {
        st.levels.attach_filter(target, &output.filename, output.filter);
    }
    if !self_compact {
        st.levels.flush(level);
    }

    debug!(level, target, "compaction installed");
    Ok(())
}
