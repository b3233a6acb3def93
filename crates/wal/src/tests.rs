use super::*;
use memtable::value::{encode, is_tombstone, payload, OpKind};
use std::io::Write as _;
use tempfile::tempdir;

fn set(v: &[u8]) -> Vec<u8> {
    encode(OpKind::Set, v)
}

// -------------------- Append & replay --------------------

#[test]
fn append_and_load_roundtrip() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let mut wal = Wal::open(&path, false)?;
    wal.append(b"a", &set(b"1"))?;
    wal.append(b"b", &set(b"2"))?;
    wal.append(b"a", &set(b"3"))?; // overwrite

    let mem = wal.load_mem()?;
    assert_eq!(mem.len(), 2);
    assert_eq!(payload(mem.get(b"a").unwrap()), b"3");
    assert_eq!(payload(mem.get(b"b").unwrap()), b"2");
    Ok(())
}

#[test]
fn tombstones_replay_as_tombstones() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let mut wal = Wal::open(&path, false)?;
    wal.append(b"k", &set(b"v"))?;
    wal.append(b"k", &encode(OpKind::Delete, &[]))?;

    let mem = wal.load_mem()?;
    assert!(is_tombstone(mem.get(b"k").unwrap()));
    Ok(())
}

#[test]
fn empty_log_loads_empty_memtable() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log"), false)?;
    assert!(wal.load_mem()?.is_empty());
    Ok(())
}

#[test]
fn records_survive_reopen() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut wal = Wal::open(&path, true)?;
        wal.append(b"k", &set(b"v"))?;
        wal.close()?;
    }

    let wal = Wal::open(&path, true)?;
    let mem = wal.load_mem()?;
    assert_eq!(payload(mem.get(b"k").unwrap()), b"v");
    Ok(())
}

// -------------------- Corruption --------------------

#[test]
fn truncated_tail_is_clean_eof() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut wal = Wal::open(&path, false)?;
        wal.append(b"a", &set(b"1"))?;
        wal.append(b"b", &set(b"2"))?;
        wal.close()?;
    }

    // Chop off the last 3 bytes, simulating a crash mid-append.
    let len = std::fs::metadata(&path).unwrap().len();
    let f = OpenOptions::new().write(true).open(&path).unwrap();
    f.set_len(len - 3).unwrap();
    drop(f);

    let wal = Wal::open(&path, false)?;
    let mem = wal.load_mem()?;
    assert_eq!(payload(mem.get(b"a").unwrap()), b"1");
    assert!(mem.get(b"b").is_none(), "partial record must not replay");
    Ok(())
}

#[test]
fn crc_mismatch_is_corruption() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut wal = Wal::open(&path, false)?;
        wal.append(b"key", &set(b"value"))?;
        wal.close()?;
    }

    // Flip a byte inside the record body.
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let mut f = OpenOptions::new().write(true).open(&path).unwrap();
    f.write_all(&bytes).unwrap();
    drop(f);

    let wal = Wal::open(&path, false)?;
    assert!(matches!(wal.load_mem(), Err(WalError::Corrupt)));
    Ok(())
}

// -------------------- Sequence counter --------------------

#[test]
fn sequence_starts_at_zero_and_persists() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut wal = Wal::open(&path, false)?;
        assert_eq!(wal.sequence(), 0);
        wal.up_sequence()?;
        wal.up_sequence()?;
        assert_eq!(wal.sequence(), 2);
    }

    let wal = Wal::open(&path, false)?;
    assert_eq!(wal.sequence(), 2);
    Ok(())
}

#[test]
fn clear_drops_records_and_keeps_sequence() -> Result<(), WalError> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let mut wal = Wal::open(&path, false)?;
    wal.append(b"k", &set(b"v"))?;
    wal.up_sequence()?;
    wal.clear()?;

    assert_eq!(wal.sequence(), 1);
    assert!(wal.load_mem()?.is_empty());

    // Appends keep working after a clear.
    wal.append(b"k2", &set(b"v2"))?;
    let mem = wal.load_mem()?;
    assert_eq!(payload(mem.get(b"k2").unwrap()), b"v2");
    Ok(())
}
