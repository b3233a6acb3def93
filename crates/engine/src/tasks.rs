//! Background workers: the WAL drainer and the merge ticker.
//!
//! The drainer owns the ordering between WAL appends and threshold
//! flushes. It exits when the write channel closes, after draining
//! whatever is still queued — shutdown closes the channel first and the
//! WAL only after the drainer has joined. The ticker wakes on a fixed
//! interval and runs one merge pass; errors in either loop are logged
//! and retried on the next message or tick, never propagated.

use crossbeam_channel::Receiver;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::{compaction, write, Core};

pub(crate) fn spawn_wal_drainer(
    core: Arc<Core>,
    rx: Receiver<(Vec<u8>, Vec<u8>)>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("siltdb-wal".into())
        .spawn(move || {
            while let Ok((key, value)) = rx.recv() {
                let mut flushed = false;
                {
                    let mut st = core.state.write();
                    if let Err(e) = st.wal.append(&key, &value) {
                        error!(error = %e, "wal append failed");
                    }
                    if st.mem.size() >= core.opts.memtable_threshold as usize {
                        match write::flush_locked(&core, &mut st) {
                            Ok(did_flush) => flushed = did_flush,
                            Err(e) => error!(error = %e, "memtable flush failed"),
                        }
                    }
                }
                if flushed && core.opts.merge.immediate {
                    if let Err(e) = compaction::merge_pass(&core) {
                        error!(error = %e, "immediate merge failed");
                    }
                }
            }
        })
}

pub(crate) fn spawn_merge_ticker(
    core: Arc<Core>,
    stop: Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    let interval = core.opts.merge.interval;
    thread::Builder::new()
        .name("siltdb-merge".into())
        .spawn(move || {
            let ticks = crossbeam_channel::tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(ticks) -> _ => {
                        if let Err(e) = compaction::merge_pass(&core) {
                            debug!(error = %e, "merge pass failed");
                        }
                    }
                    recv(stop) -> _ => break,
                }
            }
        })
}
