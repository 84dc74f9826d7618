//! Calendar backend capability contracts.
//!
//! # Responsibility
//! - Define what any calendar backend (persistent or test double) must offer
//!   to the coordinator: authorization, save, fetch, remove, reset.
//! - Bind each event record type to exactly one store type at compile time.
//!
//! # Invariants
//! - `EventStore::Event::Store == Self`: a store only ever produces and
//!   accepts its own record type.
//! - Record identifiers are assigned by the store on first save and never
//!   change afterwards.
//! - Records obtained before `reset()` must not be reused.
//!
//! # See also
//! - `service::event_coordinator` for the only consumer of these traits.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod authorization;
pub mod mock_store;
pub mod record;
pub mod sqlite_store;
mod staging;

pub use authorization::{AccessPrompter, AuthorizationState, FixedPrompter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Completion handed to `EventStore::request_access`.
///
/// Receives `Ok(true)` when access is granted. May run on any thread.
pub type AccessCompletion = Box<dyn FnOnce(StoreResult<bool>) + Send + 'static>;

/// Kind of schedulable item authorization is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    Event,
    Reminder,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Reminder => "reminder",
        }
    }
}

/// Backend authorization state for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// Access is blocked by policy; the user cannot change it.
    Restricted,
    /// The user refused access.
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDetermined => "not_determined",
            Self::Restricted => "restricted",
            Self::Denied => "denied",
            Self::Authorized => "authorized",
        }
    }

    /// Whether a decision exists, so a request would not prompt again.
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::NotDetermined)
    }
}

/// Reference to one backend calendar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarRef {
    pub id: Uuid,
    pub title: String,
}

/// Backend failure reported by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Record was created by or fetched from another store instance.
    ForeignEvent,
    /// Record was obtained before the last `reset()`.
    StaleEvent,
    /// Operation needs an identifier but the record was never saved.
    UnsavedEvent,
    /// Record has no calendar and the backend requires one.
    MissingCalendar,
    /// Record points at a calendar the backend does not know.
    UnknownCalendar(Uuid),
    InvalidEventWindow { start: i64, end: i64 },
    EventNotFound(String),
    /// The access completion was dropped without being called.
    AccessRequestDropped,
    /// Status still undetermined after an access request completed.
    AuthorizationUndetermined,
    Db(DbError),
    InvalidData(String),
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignEvent => write!(f, "event belongs to a different store instance"),
            Self::StaleEvent => write!(f, "event reference was invalidated by a store reset"),
            Self::UnsavedEvent => write!(f, "event has not been saved yet"),
            Self::MissingCalendar => write!(f, "event has no calendar"),
            Self::UnknownCalendar(id) => write!(f, "calendar does not exist: {id}"),
            Self::InvalidEventWindow { start, end } => {
                write!(f, "event end ({end}) must be >= start ({start})")
            }
            Self::EventNotFound(id) => write!(f, "event not found in store: {id}"),
            Self::AccessRequestDropped => {
                write!(f, "access request finished without a decision")
            }
            Self::AuthorizationUndetermined => {
                write!(f, "authorization still undetermined after access request")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::Backend(message) => write!(f, "calendar backend failure: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Calendar backend contract.
pub trait EventStore: Sized {
    type Event: StoreEvent<Store = Self>;

    /// Current decision for `entity`. Synchronous, never prompts.
    fn authorization_status(&self, entity: EntityType) -> StoreResult<AuthorizationStatus>;

    /// Asks for access once; later calls report the existing decision.
    ///
    /// `completion` may be invoked on another thread.
    fn request_access(&self, entity: EntityType, completion: AccessCompletion);

    /// Creates or updates `event`, assigning its identifier on first save.
    ///
    /// With `commit = false` the change is staged until `commit()`.
    fn save(&mut self, event: &mut Self::Event, commit: bool) -> StoreResult<()>;

    /// Removes a saved event.
    fn remove(&mut self, event: &Self::Event, commit: bool) -> StoreResult<()>;

    /// Flushes staged changes.
    fn commit(&mut self) -> StoreResult<()>;

    /// Looks an event up by identifier. Absence is `Ok(None)`.
    fn event_with_identifier(&self, identifier: &str) -> StoreResult<Option<Self::Event>>;

    /// Drops staged changes and invalidates every record handed out so far.
    fn reset(&mut self);

    /// Calendar new events are placed in.
    fn default_calendar(&self) -> Option<CalendarRef>;
}

/// Mutable event record bound to one store type.
pub trait StoreEvent: Sized {
    type Store: EventStore<Event = Self>;

    /// Factory for a blank, unsaved record bound to `store`.
    fn create_event(store: &Self::Store) -> Self;

    fn title(&self) -> &str;
    fn set_title(&mut self, title: String);
    fn start_epoch_ms(&self) -> i64;
    fn set_start_epoch_ms(&mut self, start_epoch_ms: i64);
    fn end_epoch_ms(&self) -> i64;
    fn set_end_epoch_ms(&mut self, end_epoch_ms: i64);
    fn calendar(&self) -> Option<&CalendarRef>;
    fn set_calendar(&mut self, calendar: Option<CalendarRef>);

    /// `None` until the record was first saved.
    fn identifier(&self) -> Option<&str>;
}

/// Builds a composite `CALENDAR:EVENT` identifier in uppercase UUID form.
pub(crate) fn compose_event_identifier(prefix: Uuid) -> String {
    format!(
        "{}:{}",
        prefix.hyphenated().to_string().to_uppercase(),
        Uuid::new_v4().hyphenated().to_string().to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::{compose_event_identifier, AuthorizationStatus};
    use crate::model::identifier::validate_event_identifier;
    use uuid::Uuid;

    #[test]
    fn composed_identifiers_pass_the_codec() {
        let identifier = compose_event_identifier(Uuid::new_v4());
        validate_event_identifier(&identifier).expect("composed identifier should validate");
        assert_eq!(identifier, identifier.to_uppercase());
    }

    #[test]
    fn only_not_determined_is_undecided() {
        assert!(!AuthorizationStatus::NotDetermined.is_decided());
        assert!(AuthorizationStatus::Denied.is_decided());
        assert!(AuthorizationStatus::Restricted.is_decided());
        assert!(AuthorizationStatus::Authorized.is_decided());
    }
}
