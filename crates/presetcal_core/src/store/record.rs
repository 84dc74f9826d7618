//! Backend-neutral event record fields and store binding.
//!
//! # Invariants
//! - `identifier` is written only by store implementations, at most once.
//! - A binding names the store instance and reset generation a record
//!   belongs to; stores reject records with any other binding.

use crate::store::{CalendarRef, StoreError, StoreResult};
use uuid::Uuid;

/// Field storage shared by the concrete record types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub title: String,
    /// Unix epoch milliseconds.
    pub start_epoch_ms: i64,
    /// Unix epoch milliseconds. Stores reject values below `start_epoch_ms`.
    pub end_epoch_ms: i64,
    pub calendar: Option<CalendarRef>,
    identifier: Option<String>,
}

impl EventRecord {
    /// Unsaved record with empty title and a zero-length window at epoch.
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            start_epoch_ms: 0,
            end_epoch_ms: 0,
            calendar: None,
            identifier: None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub(crate) fn with_identifier(mut self, identifier: String) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub(crate) fn clear_identifier(&mut self) {
        self.identifier = None;
    }

    /// Returns the identifier, assigning one from `make` if the record has none.
    pub(crate) fn ensure_identifier(&mut self, make: impl FnOnce() -> String) -> String {
        self.identifier.get_or_insert_with(make).clone()
    }

    pub(crate) fn validate_window(&self) -> StoreResult<()> {
        if self.end_epoch_ms < self.start_epoch_ms {
            return Err(StoreError::InvalidEventWindow {
                start: self.start_epoch_ms,
                end: self.end_epoch_ms,
            });
        }
        Ok(())
    }
}

/// Store instance + reset generation a record was handed out under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoreBinding {
    pub store_id: Uuid,
    pub generation: u64,
}

impl StoreBinding {
    /// Checks a record binding against the store's current binding.
    pub fn check_against(self, current: StoreBinding) -> StoreResult<()> {
        if self.store_id != current.store_id {
            return Err(StoreError::ForeignEvent);
        }
        if self.generation != current.generation {
            return Err(StoreError::StaleEvent);
        }
        Ok(())
    }
}
