use super::helpers::open_quiet;
use tempfile::tempdir;

#[test]
fn reads_hit_flushed_tables() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"a", b"1").unwrap();
    db.put(b"b", b"2").unwrap();
    db.flush().unwrap();

    assert_eq!(db.memtable_len(), 0);
    assert_eq!(db.level_files(0), 1);
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(b"missing").unwrap(), None);
}

#[test]
fn younger_table_shadows_older_table() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"k", b"old").unwrap();
    db.flush().unwrap();
    db.put(b"k", b"new").unwrap();
    db.flush().unwrap();

    assert_eq!(db.level_files(0), 2);
    assert_eq!(db.get(b"k").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn memtable_shadows_all_tables() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"k", b"disk").unwrap();
    db.flush().unwrap();
    db.put(b"k", b"memory").unwrap();

    assert_eq!(db.get(b"k").unwrap(), Some(b"memory".to_vec()));
}

#[test]
fn tombstone_in_table_hides_older_value() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"k", b"v").unwrap();
    db.flush().unwrap();
    db.delete(b"k").unwrap();
    db.flush().unwrap();

    // Both records live in tables now; the younger tombstone wins.
    assert_eq!(db.memtable_len(), 0);
    assert_eq!(db.get(b"k").unwrap(), None);
}

#[test]
fn tombstone_in_memtable_hides_table_value() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    db.put(b"k", b"v").unwrap();
    db.flush().unwrap();
    db.delete(b"k").unwrap();

    assert_eq!(db.get(b"k").unwrap(), None);
}

#[test]
fn reads_span_many_tables() {
    let dir = tempdir().unwrap();
    let db = open_quiet(dir.path()).unwrap();

    for burst in 0..5u32 {
        for i in 0..20u32 {
            let key = format!("k{:02}-{}", i, burst).into_bytes();
            db.put(&key, format!("v{}", burst).as_bytes()).unwrap();
        }
        db.flush().unwrap();
    }

    assert_eq!(db.level_files(0), 5);
    for burst in 0..5u32 {
        for i in 0..20u32 {
            let key = format!("k{:02}-{}", i, burst).into_bytes();
            assert_eq!(
                db.get(&key).unwrap(),
                Some(format!("v{}", burst).into_bytes())
            );
        }
    }
}
