//! Core domain logic for presetcal.
//! Presets, calendar store contracts and the coordinator that keeps them in sync.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::identifier::{validate_event_identifier, IdentifierError};
pub use model::preset::{Preset, PresetValidationError, ORPHANED_TITLE_SUFFIX};
pub use repo::preset_repo::{
    load_presets_or_empty, PresetRepository, RepoError, RepoResult, SqlitePresetRepository,
};
pub use service::event_coordinator::{
    CoordinatorError, CoordinatorResult, EventCoordinator, EVENT_DURATION_MS,
};
pub use service::preset_book::{PresetBook, PresetBookError, PresetBookResult, ReconcileReport};
pub use store::mock_store::{MockEvent, MockEventStore};
pub use store::record::EventRecord;
pub use store::sqlite_store::{SqliteEvent, SqliteEventStore};
pub use store::{
    AccessCompletion, AccessPrompter, AuthorizationState, AuthorizationStatus, CalendarRef,
    EntityType, EventStore, FixedPrompter, StoreError, StoreEvent, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
