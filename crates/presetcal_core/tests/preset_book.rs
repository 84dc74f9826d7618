use presetcal_core::db::open_db_in_memory;
use presetcal_core::{
    AuthorizationState, AuthorizationStatus, CoordinatorError, EntityType, EventCoordinator,
    EventStore, MockEventStore, Preset, PresetBook, PresetBookError, PresetRepository,
    PresetValidationError, ReconcileReport, SqlitePresetRepository, StoreEvent,
    ORPHANED_TITLE_SUFFIX,
};
use rusqlite::Connection;

const NOW_MS: i64 = 1_767_225_600_000;

type Book<'conn> = PresetBook<MockEventStore, SqlitePresetRepository<'conn>>;

fn book_with_store(conn: &Connection, store: MockEventStore) -> Book<'_> {
    PresetBook::load(
        EventCoordinator::new(store),
        SqlitePresetRepository::try_new(conn).unwrap(),
    )
}

fn book(conn: &Connection) -> Book<'_> {
    book_with_store(conn, MockEventStore::new())
}

fn stored(conn: &Connection) -> Vec<Preset> {
    SqlitePresetRepository::try_new(conn)
        .unwrap()
        .load_presets()
        .unwrap()
}

fn identifier_at(book: &Book<'_>, index: usize) -> String {
    book.presets()[index]
        .event_identifier()
        .expect("preset should be linked")
        .to_string()
}

#[test]
fn add_links_event_and_persists() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);

    let index = book.add("Yoga", NOW_MS).unwrap();
    assert_eq!(index, 0);

    let identifier = identifier_at(&book, 0);
    let event = book
        .coordinator()
        .store()
        .event_with_identifier(&identifier)
        .unwrap()
        .unwrap();
    assert_eq!(event.title(), "Yoga");
    assert_eq!(stored(&conn), book.presets().to_vec());
}

#[test]
fn add_rejects_empty_title_before_touching_calendar() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);

    assert!(matches!(
        book.add("", NOW_MS),
        Err(PresetBookError::InvalidPreset(PresetValidationError::EmptyTitle))
    ));
    assert_eq!(book.coordinator().store().committed_count(), 0);
    assert!(book.is_empty());
}

#[test]
fn add_under_denied_access_keeps_book_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let store = MockEventStore::with_authorization(AuthorizationState::with_status(
        EntityType::Event,
        AuthorizationStatus::Denied,
    ));
    let mut book = book_with_store(&conn, store);

    assert!(matches!(
        book.add("Blocked", NOW_MS),
        Err(PresetBookError::Coordinator(
            CoordinatorError::AuthorizationDenied
        ))
    ));
    assert!(book.is_empty());
    assert!(stored(&conn).is_empty());
}

#[test]
fn add_drops_event_when_presets_cannot_be_saved() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("Kept", NOW_MS).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_presets BEFORE INSERT ON presets
         BEGIN SELECT RAISE(ABORT, 'read only'); END;",
    )
    .unwrap();

    let err = book.add("Lost", NOW_MS).unwrap_err();
    assert!(matches!(err, PresetBookError::Repo(_)));
    assert_eq!(book.len(), 1);
    assert_eq!(book.presets()[0].title(), "Kept");
    assert_eq!(book.coordinator().store().committed_count(), 1);
    assert_eq!(book.coordinator().store().staged_count(), 0);
    assert_eq!(stored(&conn), book.presets().to_vec());
}

#[test]
fn edit_updates_event_and_preset() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("Draft", NOW_MS).unwrap();

    book.edit(0, "Final", NOW_MS + 3_600_000).unwrap();

    let preset = &book.presets()[0];
    assert_eq!(preset.title(), "Final");
    assert_eq!(preset.date_epoch_ms(), NOW_MS + 3_600_000);
    let event = book
        .coordinator()
        .store()
        .event_with_identifier(&identifier_at(&book, 0))
        .unwrap()
        .unwrap();
    assert_eq!(event.title(), "Final");
    assert_eq!(event.start_epoch_ms(), NOW_MS + 3_600_000);
    assert_eq!(stored(&conn)[0].title(), "Final");
}

#[test]
fn edit_keeps_preset_when_event_is_gone() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("Original", NOW_MS).unwrap();
    let identifier = identifier_at(&book, 0);
    book.coordinator_mut()
        .store_mut()
        .remove_committed(&identifier);

    assert!(matches!(
        book.edit(0, "Changed", NOW_MS),
        Err(PresetBookError::Coordinator(CoordinatorError::EventNotFound(_)))
    ));
    assert_eq!(book.presets()[0].title(), "Original");
}

#[test]
fn edit_and_delete_check_index() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);

    assert!(matches!(
        book.edit(3, "x", NOW_MS),
        Err(PresetBookError::IndexOutOfRange { index: 3, len: 0 })
    ));
    assert!(matches!(
        book.delete(0),
        Err(PresetBookError::IndexOutOfRange { index: 0, len: 0 })
    ));
}

#[test]
fn delete_removes_event_and_preset() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("First", NOW_MS).unwrap();
    book.add("Second", NOW_MS).unwrap();
    let identifier = identifier_at(&book, 0);

    let removed = book.delete(0).unwrap();

    assert_eq!(removed.title(), "First");
    assert_eq!(book.len(), 1);
    assert_eq!(book.presets()[0].title(), "Second");
    assert!(book.coordinator().store().committed_record(&identifier).is_none());
    assert_eq!(stored(&conn).len(), 1);
}

#[test]
fn delete_proceeds_locally_when_event_is_missing() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("Gone elsewhere", NOW_MS).unwrap();
    let identifier = identifier_at(&book, 0);
    book.coordinator_mut()
        .store_mut()
        .remove_committed(&identifier);

    book.delete(0).unwrap();
    assert!(book.is_empty());
    assert!(stored(&conn).is_empty());
}

#[test]
fn delete_keeps_preset_when_access_is_denied() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("Protected", NOW_MS).unwrap();
    book.coordinator()
        .store()
        .set_authorization_status(AuthorizationStatus::Restricted);

    assert!(matches!(
        book.delete(0),
        Err(PresetBookError::Coordinator(
            CoordinatorError::AuthorizationRestricted
        ))
    ));
    assert_eq!(book.len(), 1);
}

#[test]
fn reconcile_updates_drift_and_tags_orphans_once() {
    let conn = open_db_in_memory().unwrap();
    SqlitePresetRepository::try_new(&conn)
        .unwrap()
        .replace_presets(&[Preset::new("Loose", NOW_MS, None).unwrap()])
        .unwrap();
    let mut book = book(&conn);
    book.add("Drifting", NOW_MS).unwrap();
    book.add("Orphan", NOW_MS).unwrap();
    book.add("Steady", NOW_MS).unwrap();

    let drifting = identifier_at(&book, 1);
    let orphan = identifier_at(&book, 2);
    let store = book.coordinator_mut().store_mut();
    store.update_committed(&drifting, |record| {
        record.title = "Drifted".to_string();
        record.start_epoch_ms = NOW_MS + 60_000;
    });
    store.remove_committed(&orphan);

    let report = book.reconcile().unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            updated: 1,
            orphaned: 1,
            unlinked: 1,
            failed: 0,
        }
    );
    assert_eq!(book.presets()[1].title(), "Drifted");
    assert_eq!(book.presets()[1].date_epoch_ms(), NOW_MS + 60_000);
    assert_eq!(
        book.presets()[2].title(),
        format!("Orphan{ORPHANED_TITLE_SUFFIX}")
    );
    assert_eq!(book.presets()[3].title(), "Steady");

    let again = book.reconcile().unwrap();
    assert_eq!(
        again,
        ReconcileReport {
            updated: 0,
            orphaned: 0,
            unlinked: 1,
            failed: 0,
        }
    );
    assert_eq!(
        book.presets()[2].title(),
        format!("Orphan{ORPHANED_TITLE_SUFFIX}")
    );
    assert_eq!(stored(&conn), book.presets().to_vec());
}

#[test]
fn reconcile_counts_authorization_failures() {
    let conn = open_db_in_memory().unwrap();
    let mut book = book(&conn);
    book.add("One", NOW_MS).unwrap();
    book.add("Two", NOW_MS).unwrap();
    book.coordinator()
        .store()
        .set_authorization_status(AuthorizationStatus::Denied);

    let report = book.reconcile().unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.updated, 0);
}

#[test]
fn corrupted_preset_table_loads_as_empty_book() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO presets (position, title, date_epoch_ms, event_identifier)
         VALUES (0, 'Fine', 0, NULL), (1, '', 0, NULL);",
        [],
    )
    .unwrap();

    let book = book(&conn);
    assert!(book.is_empty());
}

#[test]
fn reload_restores_order_and_links() {
    let conn = open_db_in_memory().unwrap();
    let identifiers = {
        let mut book = book(&conn);
        book.add("A", NOW_MS).unwrap();
        book.add("B", NOW_MS + 1).unwrap();
        vec![identifier_at(&book, 0), identifier_at(&book, 1)]
    };

    let reloaded = book(&conn);
    let titles: Vec<&str> = reloaded.presets().iter().map(Preset::title).collect();
    assert_eq!(titles, vec!["A", "B"]);
    assert_eq!(
        reloaded.presets()[1].event_identifier(),
        Some(identifiers[1].as_str())
    );
}
