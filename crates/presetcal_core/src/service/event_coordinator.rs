//! Preset-to-calendar event coordination.
//!
//! # Responsibility
//! - Materialize presets as backend events and keep both sides in sync.
//! - Run the authorization state machine before every operation.
//!
//! # Invariants
//! - Events are always resolved through the preset's stored identifier,
//!   never by matching title/date.
//! - Event end is `start + EVENT_DURATION_MS`.
//! - Expected conditions (authorization, missing identifier, missing event)
//!   are returned as `CoordinatorError`, never panics.
//! - Drift compares title and start only.
//! - Log lines carry identifiers and status only, never preset titles.

use crate::model::preset::{Preset, PresetValidationError};
use crate::store::{AuthorizationStatus, EntityType, EventStore, StoreError, StoreEvent};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc;

/// Fixed length of every materialized event: two hours.
pub const EVENT_DURATION_MS: i64 = 2 * 60 * 60 * 1000;

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Coordinator failures surfaced to the UI collaborator.
#[derive(Debug)]
pub enum CoordinatorError {
    AuthorizationDenied,
    AuthorizationRestricted,
    /// The preset was never linked to a backend event.
    MissingIdentifier,
    /// The linked event is gone, most likely deleted outside the app.
    EventNotFound(String),
    /// Backend data cannot be held by a preset (for example an empty title).
    InvalidPreset(PresetValidationError),
    /// Backend failure; not retried.
    Unexpected(StoreError),
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationDenied => write!(f, "calendar access was denied"),
            Self::AuthorizationRestricted => write!(f, "calendar access is restricted"),
            Self::MissingIdentifier => write!(f, "preset has no linked calendar event"),
            Self::EventNotFound(id) => write!(f, "calendar event not found: {id}"),
            Self::InvalidPreset(err) => write!(f, "{err}"),
            Self::Unexpected(err) => write!(f, "unexpected calendar error: {err}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPreset(err) => Some(err),
            Self::Unexpected(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(value: StoreError) -> Self {
        Self::Unexpected(value)
    }
}

/// Orchestrates one store on behalf of the preset collection.
pub struct EventCoordinator<S: EventStore> {
    store: S,
}

impl<S: EventStore> EventCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates a backend event for `preset` and returns its identifier.
    ///
    /// The preset is not modified; callers store the identifier themselves.
    pub fn create_event(&mut self, preset: &Preset) -> CoordinatorResult<String> {
        self.confirm_authorization(EntityType::Event)?;

        let mut event = <S::Event as StoreEvent>::create_event(&self.store);
        copy_preset_into(preset, &mut event);
        event.set_calendar(self.store.default_calendar());
        self.store.save(&mut event, true)?;

        let identifier = event
            .identifier()
            .map(str::to_owned)
            .ok_or(CoordinatorError::Unexpected(StoreError::UnsavedEvent))?;
        info!("event=calendar_event_create module=coordinator status=ok identifier={}", identifier);
        Ok(identifier)
    }

    /// Removes the event linked to `preset`.
    pub fn remove_event(&mut self, preset: &Preset) -> CoordinatorResult<()> {
        self.confirm_authorization(EntityType::Event)?;

        let (identifier, event) = self.linked_event(preset)?;
        self.store.remove(&event, true)?;
        info!("event=calendar_event_remove module=coordinator status=ok identifier={}", identifier);
        Ok(())
    }

    /// Overwrites the linked event with the preset's title and date.
    pub fn edit_event(&mut self, preset: &Preset) -> CoordinatorResult<()> {
        self.confirm_authorization(EntityType::Event)?;

        let (identifier, mut event) = self.linked_event(preset)?;
        copy_preset_into(preset, &mut event);
        self.store.save(&mut event, true)?;
        info!("event=calendar_event_edit module=coordinator status=ok identifier={}", identifier);
        Ok(())
    }

    /// Whether the linked event's title or start differs from the preset.
    pub fn needs_update(&mut self, preset: &Preset) -> CoordinatorResult<bool> {
        self.confirm_authorization(EntityType::Event)?;

        let (identifier, event) = self.linked_event(preset)?;
        let drifted = has_drifted(preset, &event);
        debug!(
            "event=preset_drift_check module=coordinator status=ok identifier={} drifted={}",
            identifier, drifted
        );
        Ok(drifted)
    }

    /// Pulls title and start from the linked event into `preset` when they
    /// diverge.
    pub fn apply_backend_changes(&mut self, preset: &mut Preset) -> CoordinatorResult<()> {
        self.confirm_authorization(EntityType::Event)?;

        let (identifier, event) = self.linked_event(preset)?;
        if !has_drifted(preset, &event) {
            return Ok(());
        }

        preset
            .set_title(event.title())
            .map_err(CoordinatorError::InvalidPreset)?;
        preset.set_date_epoch_ms(event.start_epoch_ms());
        info!(
            "event=preset_update_from_backend module=coordinator status=ok identifier={}",
            identifier
        );
        Ok(())
    }

    fn linked_event(&self, preset: &Preset) -> CoordinatorResult<(String, S::Event)> {
        let identifier = preset
            .event_identifier()
            .ok_or(CoordinatorError::MissingIdentifier)?;
        match self.store.event_with_identifier(identifier)? {
            Some(event) => Ok((identifier.to_string(), event)),
            None => {
                warn!(
                    "event=calendar_event_lookup module=coordinator status=not_found identifier={}",
                    identifier
                );
                Err(CoordinatorError::EventNotFound(identifier.to_string()))
            }
        }
    }

    /// Authorization state machine.
    ///
    /// `NotDetermined` issues one access request, waits for its completion on
    /// the calling thread, resets the store and evaluates the status once more.
    fn confirm_authorization(&mut self, entity: EntityType) -> CoordinatorResult<()> {
        let status = self.store.authorization_status(entity)?;
        if status.is_decided() {
            return authorization_outcome(entity, status);
        }

        self.await_access_decision(entity)?;
        self.store.reset();

        let status = self.store.authorization_status(entity)?;
        authorization_outcome(entity, status)
    }

    fn await_access_decision(&self, entity: EntityType) -> CoordinatorResult<()> {
        let (sender, receiver) = mpsc::channel();
        self.store.request_access(
            entity,
            Box::new(move |outcome| {
                // The receiver only disappears if the caller already gave up.
                let _ = sender.send(outcome);
            }),
        );

        match receiver.recv() {
            Ok(Ok(granted)) => {
                info!(
                    "event=access_request module=coordinator status=ok entity={} granted={}",
                    entity.as_str(),
                    granted
                );
                Ok(())
            }
            Ok(Err(err)) => {
                warn!(
                    "event=access_request module=coordinator status=error entity={} error={}",
                    entity.as_str(),
                    err
                );
                Ok(())
            }
            Err(_) => Err(CoordinatorError::Unexpected(StoreError::AccessRequestDropped)),
        }
    }
}

fn authorization_outcome(entity: EntityType, status: AuthorizationStatus) -> CoordinatorResult<()> {
    match status {
        AuthorizationStatus::Authorized => Ok(()),
        AuthorizationStatus::Denied => {
            warn!(
                "event=authorization_check module=coordinator status=denied entity={}",
                entity.as_str()
            );
            Err(CoordinatorError::AuthorizationDenied)
        }
        AuthorizationStatus::Restricted => {
            warn!(
                "event=authorization_check module=coordinator status=restricted entity={}",
                entity.as_str()
            );
            Err(CoordinatorError::AuthorizationRestricted)
        }
        AuthorizationStatus::NotDetermined => {
            warn!(
                "event=authorization_check module=coordinator status=undetermined entity={}",
                entity.as_str()
            );
            Err(CoordinatorError::Unexpected(StoreError::AuthorizationUndetermined))
        }
    }
}

fn copy_preset_into<E: StoreEvent>(preset: &Preset, event: &mut E) {
    let start = preset.date_epoch_ms();
    event.set_title(preset.title().to_string());
    event.set_start_epoch_ms(start);
    event.set_end_epoch_ms(start.saturating_add(EVENT_DURATION_MS));
}

fn has_drifted<E: StoreEvent>(preset: &Preset, event: &E) -> bool {
    preset.title() != event.title() || preset.date_epoch_ms() != event.start_epoch_ms()
}
