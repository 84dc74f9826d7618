//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose preset flows to Dart via FRB as sync, envelope-returning calls.
//! - Own process-wide wiring: database path, authorization state and the
//!   answer the host collected from its permission dialog.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported through `ok = false` plus a readable `message`.
//! - All calls share one `AuthorizationState`, so the user is asked once per
//!   process.

use log::warn;
use presetcal_core::db::open_db;
use presetcal_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AccessPrompter, AuthorizationState, EntityType, EventCoordinator, Preset, PresetBook,
    PresetBookError, SqliteEventStore, SqlitePresetRepository,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

const DB_PATH_ENV: &str = "PRESETCAL_DB_PATH";
const DB_FILE_NAME: &str = "presetcal.sqlite3";

const ANSWER_NONE: u8 = 0;
const ANSWER_GRANTED: u8 = 1;
const ANSWER_DENIED: u8 = 2;

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static AUTHORIZATION: OnceLock<AuthorizationState> = OnceLock::new();
static ACCESS_ANSWER: AtomicU8 = AtomicU8::new(ANSWER_NONE);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// `level` is one of `trace|debug|info|warn|error`; `log_dir` must be an
/// absolute directory.
///
/// # FFI contract
/// - Idempotent for the same `level + log_dir`; reconfiguration is rejected.
/// - Never panics; returns an empty string on success, the error otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One preset as shown in the list UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetItem {
    pub title: String,
    pub date_epoch_ms: i64,
    pub event_identifier: Option<String>,
    /// Backend event disappeared; the title carries the orphan suffix.
    pub orphaned: bool,
}

impl From<&Preset> for PresetItem {
    fn from(preset: &Preset) -> Self {
        Self {
            title: preset.title().to_string(),
            date_epoch_ms: preset.date_epoch_ms(),
            event_identifier: preset.event_identifier().map(str::to_owned),
            orphaned: preset.is_orphaned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetListResponse {
    pub ok: bool,
    pub items: Vec<PresetItem>,
    pub message: String,
}

/// Envelope for add/edit/delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetActionResponse {
    pub ok: bool,
    /// Index the operation applied to, when it succeeded.
    pub index: Option<u32>,
    pub message: String,
}

impl PresetActionResponse {
    fn success(message: impl Into<String>, index: usize) -> Self {
        Self {
            ok: true,
            index: u32::try_from(index).ok(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            index: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetReconcileResponse {
    pub ok: bool,
    pub updated: u32,
    pub orphaned: u32,
    pub unlinked: u32,
    pub failed: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarAccessResponse {
    pub ok: bool,
    /// `not_determined|restricted|denied|authorized`.
    pub status: String,
    pub message: String,
}

/// Reports the current calendar authorization status for events.
///
/// # FFI contract
/// - Sync call, in-memory only. Never prompts.
#[flutter_rust_bridge::frb(sync)]
pub fn calendar_authorization_status() -> CalendarAccessResponse {
    let status = authorization().status(EntityType::Event);
    CalendarAccessResponse {
        ok: true,
        status: status.as_str().to_string(),
        message: format!("Calendar access is {}.", status.as_str()),
    }
}

/// Hands the answer from the host permission dialog to core.
///
/// The answer is recorded as the event decision unless one already exists,
/// and is what later access prompts return.
#[flutter_rust_bridge::frb(sync)]
pub fn calendar_set_access_answer(granted: bool) -> CalendarAccessResponse {
    ACCESS_ANSWER.store(
        if granted { ANSWER_GRANTED } else { ANSWER_DENIED },
        Ordering::SeqCst,
    );
    let status = authorization().record_decision(EntityType::Event, granted);
    CalendarAccessResponse {
        ok: true,
        status: status.as_str().to_string(),
        message: format!("Calendar access is {}.", status.as_str()),
    }
}

/// Lists stored presets in display order.
///
/// # FFI contract
/// - Sync call, DB-backed. Never panics.
/// - An unreadable preset table yields an empty list with `ok = true`.
#[flutter_rust_bridge::frb(sync)]
pub fn preset_list() -> PresetListResponse {
    let listed = with_preset_book(|book| {
        Ok(book
            .presets()
            .iter()
            .map(PresetItem::from)
            .collect::<Vec<_>>())
    });
    match listed {
        Ok(items) => PresetListResponse {
            ok: true,
            message: format!("Loaded {} preset(s).", items.len()),
            items,
        },
        Err(message) => PresetListResponse {
            ok: false,
            items: Vec::new(),
            message: failure_message("preset_list", message),
        },
    }
}

/// Creates a preset together with its calendar event.
#[flutter_rust_bridge::frb(sync)]
pub fn preset_add(title: String, date_epoch_ms: i64) -> PresetActionResponse {
    match with_preset_book(|book| book.add(title.trim(), date_epoch_ms)) {
        Ok(index) => PresetActionResponse::success("Preset created.", index),
        Err(message) => PresetActionResponse::failure(failure_message("preset_add", message)),
    }
}

/// Updates title and date of the preset at `index` and of its event.
#[flutter_rust_bridge::frb(sync)]
pub fn preset_edit(index: u32, title: String, date_epoch_ms: i64) -> PresetActionResponse {
    let index = index as usize;
    match with_preset_book(|book| book.edit(index, title.trim(), date_epoch_ms)) {
        Ok(()) => PresetActionResponse::success("Preset updated.", index),
        Err(message) => PresetActionResponse::failure(failure_message("preset_edit", message)),
    }
}

/// Deletes the preset at `index` and its event.
#[flutter_rust_bridge::frb(sync)]
pub fn preset_delete(index: u32) -> PresetActionResponse {
    let index = index as usize;
    match with_preset_book(|book| book.delete(index)) {
        Ok(_) => PresetActionResponse::success("Preset deleted.", index),
        Err(message) => PresetActionResponse::failure(failure_message("preset_delete", message)),
    }
}

/// Pulls calendar-side edits into presets and tags orphaned ones.
///
/// Hosts call this when the calendar reports external changes.
#[flutter_rust_bridge::frb(sync)]
pub fn preset_reconcile() -> PresetReconcileResponse {
    match with_preset_book(|book| book.reconcile()) {
        Ok(report) => PresetReconcileResponse {
            ok: true,
            updated: saturating_u32(report.updated),
            orphaned: saturating_u32(report.orphaned),
            unlinked: saturating_u32(report.unlinked),
            failed: saturating_u32(report.failed),
            message: format!(
                "Reconciled: {} updated, {} orphaned.",
                report.updated, report.orphaned
            ),
        },
        Err(message) => PresetReconcileResponse {
            ok: false,
            updated: 0,
            orphaned: 0,
            unlinked: 0,
            failed: 0,
            message: failure_message("preset_reconcile", message),
        },
    }
}

/// Answers access prompts with the value from `calendar_set_access_answer`.
///
/// Without an answer the prompt counts as refused.
struct HostAnswerPrompter;

impl AccessPrompter for HostAnswerPrompter {
    fn prompt(&self, _entity: EntityType) -> bool {
        ACCESS_ANSWER.load(Ordering::SeqCst) == ANSWER_GRANTED
    }
}

fn authorization() -> &'static AuthorizationState {
    AUTHORIZATION.get_or_init(AuthorizationState::new)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

type FfiBook<'conn> = PresetBook<SqliteEventStore, SqlitePresetRepository<'conn>>;

fn with_preset_book<T>(
    f: impl FnOnce(&mut FfiBook<'_>) -> Result<T, PresetBookError>,
) -> Result<T, String> {
    let db_path = resolve_db_path();
    let store = SqliteEventStore::open(
        &db_path,
        authorization().clone(),
        Arc::new(HostAnswerPrompter),
    )
    .map_err(|err| format!("calendar store open failed: {err}"))?;
    let conn = open_db(&db_path).map_err(|err| format!("preset DB open failed: {err}"))?;
    let repo = SqlitePresetRepository::try_new(&conn)
        .map_err(|err| format!("preset repo init failed: {err}"))?;

    let mut book = PresetBook::load(EventCoordinator::new(store), repo);
    f(&mut book).map_err(|err| err.to_string())
}

fn failure_message(operation: &str, message: String) -> String {
    warn!("event=ffi_call module=ffi status=error op={}", operation);
    format!("{operation} failed: {message}")
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        calendar_authorization_status, calendar_set_access_answer, core_version, init_logging,
        ping, preset_add, preset_delete, preset_edit, preset_list, preset_reconcile,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/presetcal-logs".to_string()).is_empty());
        assert!(!init_logging("info".to_string(), "relative/logs".to_string()).is_empty());
    }

    #[test]
    fn preset_add_rejects_blank_title() {
        calendar_set_access_answer(true);
        let response = preset_add("   ".to_string(), 0);
        assert!(!response.ok);
        assert!(response.message.starts_with("preset_add failed"));
    }

    #[test]
    fn preset_flow_add_edit_reconcile_delete() {
        let granted = calendar_set_access_answer(true);
        assert!(granted.ok);
        assert_eq!(calendar_authorization_status().status, "authorized");

        let title = unique_token("ffi-preset");
        let added = preset_add(title.clone(), 1_700_000_000_000);
        assert!(added.ok, "{}", added.message);
        let index = added.index.expect("add should report index");

        let listed = preset_list();
        assert!(listed.ok, "{}", listed.message);
        let item = &listed.items[index as usize];
        assert_eq!(item.title, title);
        assert!(item.event_identifier.is_some());
        assert!(!item.orphaned);

        let renamed = format!("{title}-renamed");
        let edited = preset_edit(index, renamed.clone(), 1_700_000_360_000);
        assert!(edited.ok, "{}", edited.message);
        let listed = preset_list();
        assert_eq!(listed.items[index as usize].title, renamed);
        assert_eq!(listed.items[index as usize].date_epoch_ms, 1_700_000_360_000);

        let reconciled = preset_reconcile();
        assert!(reconciled.ok, "{}", reconciled.message);

        let deleted = preset_delete(index);
        assert!(deleted.ok, "{}", deleted.message);
        assert!(preset_list()
            .items
            .iter()
            .all(|item| !item.title.starts_with(&title)));

        let out_of_range = preset_delete(u32::MAX);
        assert!(!out_of_range.ok);
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
