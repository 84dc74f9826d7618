use presetcal_core::db::migrations::latest_version;
use presetcal_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn fresh_database_gets_event_and_preset_tables() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(user_version(&conn), latest_version());
    for table in ["calendars", "events", "presets"] {
        assert!(has_table(&conn, table), "missing table {table}");
    }
}

#[test]
fn reopening_a_migrated_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presetcal.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO presets (position, title, date_epoch_ms) VALUES (0, 'Kept', 5);",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(user_version(&conn), latest_version());
    let title: String = conn
        .query_row("SELECT title FROM presets WHERE position = 0;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(title, "Kept");
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 42;")
        .unwrap();

    match open_db(&path) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must not open"),
    }
}

#[test]
fn only_one_default_calendar_is_allowed() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO calendars (uuid, title, is_default) VALUES ('a', 'A', 1);",
        [],
    )
    .unwrap();
    let second = conn.execute(
        "INSERT INTO calendars (uuid, title, is_default) VALUES ('b', 'B', 1);",
        [],
    );
    assert!(second.is_err());
}

#[test]
fn events_reject_inverted_windows_and_unknown_calendars() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO calendars (uuid, title, is_default) VALUES ('cal', 'Cal', 1);",
        [],
    )
    .unwrap();

    let inverted = conn.execute(
        "INSERT INTO events (identifier, calendar_uuid, title, start_epoch_ms, end_epoch_ms)
         VALUES ('e1', 'cal', 't', 10, 5);",
        [],
    );
    assert!(inverted.is_err());

    let orphaned = conn.execute(
        "INSERT INTO events (identifier, calendar_uuid, title, start_epoch_ms, end_epoch_ms)
         VALUES ('e2', 'missing', 't', 0, 0);",
        [],
    );
    assert!(orphaned.is_err());
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn has_table(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}
