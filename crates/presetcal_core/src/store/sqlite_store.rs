//! SQLite-backed calendar backend.
//!
//! # Responsibility
//! - Persist event records in the `events` table under a default calendar.
//! - Ask for access through an `AccessPrompter` on a background thread.
//!
//! # Invariants
//! - Exactly one default calendar exists after `open*` returns.
//! - Identifiers are `CALENDAR-UUID:EVENT-UUID` in uppercase, so they pass
//!   the preset identifier codec.
//! - Staged changes reach disk in one transaction; a failed commit keeps them
//!   staged, except the change whose `commit = true` save or remove failed.
//! - Saves only target calendars present in the `calendars` table.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::{open_db, open_db_in_memory};
use crate::store::record::{EventRecord, StoreBinding};
use crate::store::staging::{StagedChange, StagedChanges};
use crate::store::{
    compose_event_identifier, AccessCompletion, AccessPrompter, AuthorizationState,
    AuthorizationStatus, CalendarRef, EntityType, EventStore, StoreError, StoreEvent, StoreResult,
};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const DEFAULT_CALENDAR_TITLE: &str = "Presets";
const ACCESS_PROMPT_THREAD_NAME: &str = "presetcal-access-prompt";

const EVENT_SELECT_SQL: &str = "SELECT
    e.identifier,
    e.title,
    e.start_epoch_ms,
    e.end_epoch_ms,
    c.uuid AS calendar_uuid,
    c.title AS calendar_title
FROM events e
JOIN calendars c ON c.uuid = e.calendar_uuid";

/// Event record produced by `SqliteEventStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteEvent {
    record: EventRecord,
    binding: StoreBinding,
}

impl SqliteEvent {
    pub fn record(&self) -> &EventRecord {
        &self.record
    }
}

impl StoreEvent for SqliteEvent {
    type Store = SqliteEventStore;

    fn create_event(store: &SqliteEventStore) -> Self {
        store.bind(EventRecord::blank())
    }

    fn title(&self) -> &str {
        &self.record.title
    }

    fn set_title(&mut self, title: String) {
        self.record.title = title;
    }

    fn start_epoch_ms(&self) -> i64 {
        self.record.start_epoch_ms
    }

    fn set_start_epoch_ms(&mut self, start_epoch_ms: i64) {
        self.record.start_epoch_ms = start_epoch_ms;
    }

    fn end_epoch_ms(&self) -> i64 {
        self.record.end_epoch_ms
    }

    fn set_end_epoch_ms(&mut self, end_epoch_ms: i64) {
        self.record.end_epoch_ms = end_epoch_ms;
    }

    fn calendar(&self) -> Option<&CalendarRef> {
        self.record.calendar.as_ref()
    }

    fn set_calendar(&mut self, calendar: Option<CalendarRef>) {
        self.record.calendar = calendar;
    }

    fn identifier(&self) -> Option<&str> {
        self.record.identifier()
    }
}

/// Persistent calendar store.
pub struct SqliteEventStore {
    conn: Connection,
    store_id: Uuid,
    generation: u64,
    authorization: AuthorizationState,
    prompter: Arc<dyn AccessPrompter>,
    default_calendar: CalendarRef,
    staged: StagedChanges,
}

impl SqliteEventStore {
    /// Opens (or creates) the store database at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        authorization: AuthorizationState,
        prompter: Arc<dyn AccessPrompter>,
    ) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?, authorization, prompter)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory(
        authorization: AuthorizationState,
        prompter: Arc<dyn AccessPrompter>,
    ) -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?, authorization, prompter)
    }

    /// Wraps a connection returned by `db::open_db*` (migrations applied).
    pub fn from_connection(
        conn: Connection,
        authorization: AuthorizationState,
        prompter: Arc<dyn AccessPrompter>,
    ) -> StoreResult<Self> {
        let default_calendar = ensure_default_calendar(&conn)?;
        Ok(Self {
            conn,
            store_id: Uuid::new_v4(),
            generation: 0,
            authorization,
            prompter,
            default_calendar,
            staged: StagedChanges::default(),
        })
    }

    pub fn authorization(&self) -> &AuthorizationState {
        &self.authorization
    }

    /// Number of committed events.
    pub fn event_count(&self) -> StoreResult<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get::<_, i64>(0))?;
        usize::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative event count `{count}`")))
    }

    fn binding(&self) -> StoreBinding {
        StoreBinding {
            store_id: self.store_id,
            generation: self.generation,
        }
    }

    fn bind(&self, record: EventRecord) -> SqliteEvent {
        SqliteEvent {
            record,
            binding: self.binding(),
        }
    }

    fn load_record(&self, identifier: &str) -> StoreResult<Option<EventRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE e.identifier = ?1;"))?;
        let mut rows = stmt.query([identifier])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_event_row(row)?)),
            None => Ok(None),
        }
    }

    fn calendar_exists(&self, calendar_id: Uuid) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM calendars WHERE uuid = ?1);",
            [calendar_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn contains(&self, identifier: &str) -> StoreResult<bool> {
        match self.staged.get(identifier) {
            Some(StagedChange::Save(_)) => Ok(true),
            Some(StagedChange::Remove) => Ok(false),
            None => {
                let exists: i64 = self.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM events WHERE identifier = ?1);",
                    [identifier],
                    |row| row.get(0),
                )?;
                Ok(exists == 1)
            }
        }
    }

    fn flush_staged(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for (identifier, change) in self.staged.iter() {
            match change {
                StagedChange::Save(record) => {
                    let calendar = record
                        .calendar
                        .as_ref()
                        .ok_or(StoreError::MissingCalendar)?;
                    tx.execute(
                        "INSERT INTO events (
                            identifier,
                            calendar_uuid,
                            title,
                            start_epoch_ms,
                            end_epoch_ms
                        ) VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT (identifier) DO UPDATE SET
                            calendar_uuid = excluded.calendar_uuid,
                            title = excluded.title,
                            start_epoch_ms = excluded.start_epoch_ms,
                            end_epoch_ms = excluded.end_epoch_ms,
                            updated_at = (strftime('%s', 'now') * 1000);",
                        params![
                            identifier,
                            calendar.id.to_string(),
                            record.title.as_str(),
                            record.start_epoch_ms,
                            record.end_epoch_ms,
                        ],
                    )?;
                }
                StagedChange::Remove => {
                    tx.execute("DELETE FROM events WHERE identifier = ?1;", [identifier])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl EventStore for SqliteEventStore {
    type Event = SqliteEvent;

    fn authorization_status(&self, entity: EntityType) -> StoreResult<AuthorizationStatus> {
        Ok(self.authorization.status(entity))
    }

    fn request_access(&self, entity: EntityType, completion: AccessCompletion) {
        let current = self.authorization.status(entity);
        if current.is_decided() {
            completion(Ok(current == AuthorizationStatus::Authorized));
            return;
        }

        let state = self.authorization.clone();
        let prompter = Arc::clone(&self.prompter);
        info!(
            "event=access_prompt module=store status=start backend=sqlite entity={}",
            entity.as_str()
        );
        let spawned = std::thread::Builder::new()
            .name(ACCESS_PROMPT_THREAD_NAME.to_string())
            .spawn(move || {
                let granted = prompter.prompt(entity);
                let status = state.record_decision(entity, granted);
                info!(
                    "event=access_prompt module=store status=ok backend=sqlite entity={} decision={}",
                    entity.as_str(),
                    status.as_str()
                );
                completion(Ok(status == AuthorizationStatus::Authorized));
            });

        // On spawn failure the completion is dropped with the closure, which
        // the waiting caller observes as a dropped request.
        if let Err(err) = spawned {
            error!(
                "event=access_prompt module=store status=error backend=sqlite entity={} error={}",
                entity.as_str(),
                err
            );
        }
    }

    fn save(&mut self, event: &mut SqliteEvent, commit: bool) -> StoreResult<()> {
        event.binding.check_against(self.binding())?;
        let calendar_id = event
            .record
            .calendar
            .as_ref()
            .map(|calendar| calendar.id)
            .ok_or(StoreError::MissingCalendar)?;
        event.record.validate_window()?;
        if !self.calendar_exists(calendar_id)? {
            return Err(StoreError::UnknownCalendar(calendar_id));
        }

        let first_save = event.record.identifier().is_none();
        let identifier = event
            .record
            .ensure_identifier(|| compose_event_identifier(calendar_id));
        let previous = self
            .staged
            .stage_save(identifier.clone(), event.record.clone());

        if commit {
            if let Err(err) = self.commit() {
                self.staged.restore(&identifier, previous);
                if first_save {
                    event.record.clear_identifier();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn remove(&mut self, event: &SqliteEvent, commit: bool) -> StoreResult<()> {
        event.binding.check_against(self.binding())?;
        let identifier = event.identifier().ok_or(StoreError::UnsavedEvent)?;
        if !self.contains(identifier)? {
            return Err(StoreError::EventNotFound(identifier.to_string()));
        }
        let previous = self.staged.stage_remove(identifier.to_string());

        if commit {
            if let Err(err) = self.commit() {
                self.staged.restore(identifier, previous);
                return Err(err);
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let changes = self.staged.len();
        match self.flush_staged() {
            Ok(()) => {
                self.staged.clear();
                info!(
                    "event=store_commit module=store status=ok backend=sqlite changes={} duration_ms={}",
                    changes,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_commit module=store status=error backend=sqlite changes={} duration_ms={} error={}",
                    changes,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn event_with_identifier(&self, identifier: &str) -> StoreResult<Option<SqliteEvent>> {
        let record = match self.staged.get(identifier) {
            Some(StagedChange::Save(record)) => Some(record.clone()),
            Some(StagedChange::Remove) => None,
            None => self.load_record(identifier)?,
        };
        Ok(record.map(|record| self.bind(record)))
    }

    fn reset(&mut self) {
        debug!(
            "event=store_reset module=store status=ok backend=sqlite discarded={}",
            self.staged.len()
        );
        self.staged.clear();
        self.generation += 1;
    }

    fn default_calendar(&self) -> Option<CalendarRef> {
        Some(self.default_calendar.clone())
    }
}

fn ensure_default_calendar(conn: &Connection) -> StoreResult<CalendarRef> {
    let existing = conn
        .query_row(
            "SELECT uuid, title FROM calendars WHERE is_default = 1;",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    if let Some((uuid_text, title)) = existing {
        return Ok(CalendarRef {
            id: parse_uuid(&uuid_text, "calendars.uuid")?,
            title,
        });
    }

    let calendar = CalendarRef {
        id: Uuid::new_v4(),
        title: DEFAULT_CALENDAR_TITLE.to_string(),
    };
    conn.execute(
        "INSERT INTO calendars (uuid, title, is_default) VALUES (?1, ?2, 1);",
        params![calendar.id.to_string(), calendar.title.as_str()],
    )?;
    info!("event=default_calendar_created module=store status=ok backend=sqlite");
    Ok(calendar)
}

fn parse_event_row(row: &Row<'_>) -> StoreResult<EventRecord> {
    let identifier: String = row.get("identifier")?;
    let calendar_uuid: String = row.get("calendar_uuid")?;
    let mut record = EventRecord::blank().with_identifier(identifier);
    record.title = row.get("title")?;
    record.start_epoch_ms = row.get("start_epoch_ms")?;
    record.end_epoch_ms = row.get("end_epoch_ms")?;
    record.calendar = Some(CalendarRef {
        id: parse_uuid(&calendar_uuid, "events.calendar_uuid")?,
        title: row.get("calendar_title")?,
    });
    record
        .validate_window()
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;
    Ok(record)
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
