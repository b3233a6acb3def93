//! # CLI — SiltDB interactive shell
//!
//! A REPL over the storage engine. Reads commands from stdin, executes
//! them against the engine, and prints results to stdout. Works
//! interactively and scripted (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (writes a tombstone)
//! FLUSH              Force the memtable out to level 0
//! COMPACT            Run one merge pass over all levels
//! STATS              Print engine debug info
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings come from environment variables:
//!
//! ```text
//! SILT_ROOT              Engine root directory      (default: "data")
//! SILT_MEMTABLE_BYTES    Flush threshold in bytes   (default: 64000)
//! SILT_SPARSE_DISTANCE   Sparse index distance      (default: 4096)
//! SILT_WAL_FSYNC         fsync every WAL append     (default: "false")
//! SILT_MERGE_INTERVAL_MS Merge tick period, 0 = off (default: 2000)
//! SILT_MERGE_FILES       Per-level file trigger     (default: 8)
//! SILT_MERGE_BYTES       Per-level byte trigger     (default: 1048576)
//! ```

use anyhow::Result;
use engine::{Lsm, MergeSettings, Options};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Reads a configuration value from the environment, falling back to
/// `default`.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let root: String = env_or("SILT_ROOT", "data".to_string());
    let opts = Options {
        memtable_threshold: env_or("SILT_MEMTABLE_BYTES", 64_000),
        sparse_key_distance: env_or("SILT_SPARSE_DISTANCE", 4 << 10),
        wal_fsync: env_or("SILT_WAL_FSYNC", false),
        merge: MergeSettings {
            immediate: false,
            max_levels: 255,
            interval: Duration::from_millis(env_or("SILT_MERGE_INTERVAL_MS", 2000)),
            data_size: env_or("SILT_MERGE_BYTES", 1 << 20),
            file_count: env_or("SILT_MERGE_FILES", 8),
        },
    };

    let db = Lsm::open(&root, opts)?;
    println!(
        "SiltDB started (root={}, seq={}, memtable={}B)",
        root,
        db.sequence(),
        db.memtable_size()
    );
    println!("Commands: SET key value | GET key | DEL key | FLUSH | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if let Some(key) = parts.next() {
                        let value: String = parts.collect::<Vec<&str>>().join(" ");
                        if value.is_empty() {
                            println!("ERR usage: SET key value");
                        } else {
                            match db.put(key.as_bytes(), value.as_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR set failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => {
                    if let Some(key) = parts.next() {
                        match db.get(key.as_bytes()) {
                            Ok(Some(value)) => {
                                println!("{}", String::from_utf8_lossy(&value));
                            }
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(key) = parts.next() {
                        match db.delete(key.as_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR delete failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "FLUSH" => match db.flush() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR flush failed: {}", e),
                },
                "COMPACT" => match db.compact() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR compact failed: {}", e),
                },
                "STATS" => println!("{:#?}", db),
                "EXIT" | "QUIT" => {
                    db.shutdown()?;
                    println!("bye");
                    return Ok(());
                }
                other => println!("ERR unknown command: {}", other),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    db.shutdown()?;
    Ok(())
}
