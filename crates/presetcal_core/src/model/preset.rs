//! Event creation preset model.
//!
//! # Responsibility
//! - Hold the user's intent for one calendar event (title + date).
//! - Carry the backend identifier once an event was materialized.
//!
//! # Invariants
//! - `title` is never empty, at construction, on mutation and on decode.
//! - `event_identifier` only passes the identifier codec when written through
//!   `set_event_identifier`. Construction and decoding accept any value; this
//!   asymmetry is known and kept.
//!
//! # See also
//! - `model::identifier` for the identifier grammar.

use crate::model::identifier::{validate_event_identifier, IdentifierError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Title suffix used to flag presets whose backend event disappeared.
pub const ORPHANED_TITLE_SUFFIX: &str = " - deleted!";

/// Preset construction and mutation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetValidationError {
    EmptyTitle,
}

impl Display for PresetValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "preset title must not be empty"),
        }
    }
}

impl Error for PresetValidationError {}

/// A reusable plan for one calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PresetRecord")]
pub struct Preset {
    title: String,
    /// Unix epoch milliseconds.
    date_epoch_ms: i64,
    event_identifier: Option<String>,
}

/// Unchecked wire shape used while decoding.
#[derive(Deserialize)]
struct PresetRecord {
    title: String,
    date_epoch_ms: i64,
    #[serde(default)]
    event_identifier: Option<String>,
}

impl TryFrom<PresetRecord> for Preset {
    type Error = PresetValidationError;

    fn try_from(value: PresetRecord) -> Result<Self, Self::Error> {
        Self::new(value.title, value.date_epoch_ms, value.event_identifier)
    }
}

impl Preset {
    /// Creates a preset.
    ///
    /// The identifier is stored as given; format checks only happen in
    /// `set_event_identifier`.
    ///
    /// # Errors
    /// - `PresetValidationError::EmptyTitle` when `title` is empty.
    pub fn new(
        title: impl Into<String>,
        date_epoch_ms: i64,
        event_identifier: Option<String>,
    ) -> Result<Self, PresetValidationError> {
        let title = title.into();
        if title.is_empty() {
            return Err(PresetValidationError::EmptyTitle);
        }
        Ok(Self {
            title,
            date_epoch_ms,
            event_identifier,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date_epoch_ms(&self) -> i64 {
        self.date_epoch_ms
    }

    pub fn event_identifier(&self) -> Option<&str> {
        self.event_identifier.as_deref()
    }

    /// Replaces the title, keeping the old one when the new one is empty.
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), PresetValidationError> {
        let title = title.into();
        if title.is_empty() {
            return Err(PresetValidationError::EmptyTitle);
        }
        self.title = title;
        Ok(())
    }

    pub fn set_date_epoch_ms(&mut self, date_epoch_ms: i64) {
        self.date_epoch_ms = date_epoch_ms;
    }

    /// Stores a backend identifier after codec validation.
    ///
    /// On failure the previous identifier stays in place.
    pub fn set_event_identifier(&mut self, candidate: &str) -> Result<(), IdentifierError> {
        validate_event_identifier(candidate)?;
        self.event_identifier = Some(candidate.to_string());
        Ok(())
    }

    /// Tags the title as orphaned. Returns `false` when already tagged.
    pub fn mark_orphaned(&mut self) -> bool {
        if self.is_orphaned() {
            return false;
        }
        self.title.push_str(ORPHANED_TITLE_SUFFIX);
        true
    }

    pub fn is_orphaned(&self) -> bool {
        self.title.ends_with(ORPHANED_TITLE_SUFFIX)
    }
}
