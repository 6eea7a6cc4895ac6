#![allow(clippy::unwrap_used)]

use super::*;

// ── Schema ────────────────────────────────────────────────────

#[test]
fn test_fresh_database_has_current_version() {
    let db = Database::open_in_memory().unwrap();
    let version: i32 = db
        .lock()
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, schema::CURRENT_VERSION);
}

#[test]
fn test_reopen_keeps_slots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finanzas.db");
    {
        let db = Database::open(&path).unwrap();
        db.write_slot("greeting", "hola").unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.read_slot("greeting").unwrap().as_deref(), Some("hola"));
}

// ── Slots ─────────────────────────────────────────────────────

#[test]
fn test_missing_slot_reads_none() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.read_slot("nothing").unwrap().is_none());
}

#[test]
fn test_write_slot_overwrites() {
    let db = Database::open_in_memory().unwrap();
    db.write_slot("k", "one").unwrap();
    db.write_slot("k", "two").unwrap();
    assert_eq!(db.read_slot("k").unwrap().as_deref(), Some("two"));
}

#[test]
fn test_clear_slot() {
    let db = Database::open_in_memory().unwrap();
    db.write_slot("k", "v").unwrap();
    db.clear_slot("k").unwrap();
    assert!(db.read_slot("k").unwrap().is_none());
    // Clearing an absent slot is fine
    db.clear_slot("k").unwrap();
}

#[test]
fn test_update_slot_writes_replacement() {
    let db = Database::open_in_memory().unwrap();
    db.write_slot("n", "1").unwrap();
    let seen: Option<String> = db
        .update_slot::<_, rusqlite::Error, _>("n", |current| Ok((Some("2".into()), current)))
        .unwrap();
    assert_eq!(seen.as_deref(), Some("1"));
    assert_eq!(db.read_slot("n").unwrap().as_deref(), Some("2"));
}

#[test]
fn test_update_slot_none_leaves_value() {
    let db = Database::open_in_memory().unwrap();
    db.write_slot("n", "1").unwrap();
    db.update_slot::<_, rusqlite::Error, _>("n", |_| Ok((None, ())))
        .unwrap();
    assert_eq!(db.read_slot("n").unwrap().as_deref(), Some("1"));
}

#[test]
fn test_update_slot_error_rolls_back() {
    #[derive(Debug)]
    struct Boom;
    impl From<rusqlite::Error> for Boom {
        fn from(_: rusqlite::Error) -> Self {
            Boom
        }
    }

    let db = Database::open_in_memory().unwrap();
    db.write_slot("n", "1").unwrap();
    let result = db.update_slot::<(), Boom, _>("n", |_| Err(Boom));
    assert!(result.is_err());
    assert_eq!(db.read_slot("n").unwrap().as_deref(), Some("1"));
}
