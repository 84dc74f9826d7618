//! Ordered preset collection backed by a calendar and a repository.
//!
//! # Responsibility
//! - Run the add/edit/delete flows the UI offers for presets.
//! - Reconcile presets with their events after the calendar changed.
//!
//! # Invariants
//! - The in-memory list is persisted after every successful mutation.
//! - A preset is only appended after its event exists and its identifier
//!   passed the codec.
//! - Orphaned presets are tagged once and otherwise left intact.

use crate::model::identifier::IdentifierError;
use crate::model::preset::{Preset, PresetValidationError};
use crate::repo::preset_repo::{load_presets_or_empty, PresetRepository, RepoError};
use crate::service::event_coordinator::{CoordinatorError, EventCoordinator};
use crate::store::EventStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PresetBookResult<T> = Result<T, PresetBookError>;

#[derive(Debug)]
pub enum PresetBookError {
    InvalidPreset(PresetValidationError),
    InvalidIdentifier(IdentifierError),
    IndexOutOfRange { index: usize, len: usize },
    Coordinator(CoordinatorError),
    Repo(RepoError),
}

impl Display for PresetBookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPreset(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "preset index {index} out of range for {len} presets")
            }
            Self::Coordinator(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PresetBookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPreset(err) => Some(err),
            Self::InvalidIdentifier(err) => Some(err),
            Self::IndexOutOfRange { .. } => None,
            Self::Coordinator(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<PresetValidationError> for PresetBookError {
    fn from(value: PresetValidationError) -> Self {
        Self::InvalidPreset(value)
    }
}

impl From<IdentifierError> for PresetBookError {
    fn from(value: IdentifierError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

impl From<CoordinatorError> for PresetBookError {
    fn from(value: CoordinatorError) -> Self {
        Self::Coordinator(value)
    }
}

impl From<RepoError> for PresetBookError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome counters of one `PresetBook::reconcile` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Presets that took title/date from their event.
    pub updated: usize,
    /// Presets newly tagged because their event disappeared.
    pub orphaned: usize,
    /// Presets without an event identifier.
    pub unlinked: usize,
    pub failed: usize,
}

pub struct PresetBook<S: EventStore, R: PresetRepository> {
    coordinator: EventCoordinator<S>,
    repo: R,
    presets: Vec<Preset>,
}

impl<S: EventStore, R: PresetRepository> PresetBook<S, R> {
    /// Builds the book from the stored list; a failed reload starts empty.
    pub fn load(coordinator: EventCoordinator<S>, repo: R) -> Self {
        let presets = load_presets_or_empty(&repo);
        Self {
            coordinator,
            repo,
            presets,
        }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn coordinator(&self) -> &EventCoordinator<S> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut EventCoordinator<S> {
        &mut self.coordinator
    }

    /// Creates the event for a new preset and appends it.
    ///
    /// Returns the new preset's index. When the preset cannot be linked or
    /// persisted, it is dropped again and its event is removed.
    pub fn add(&mut self, title: &str, date_epoch_ms: i64) -> PresetBookResult<usize> {
        let mut preset = Preset::new(title, date_epoch_ms, None)?;
        let identifier = self.coordinator.create_event(&preset)?;
        if let Err(err) = preset.set_event_identifier(&identifier) {
            self.roll_back_event(&preset, &identifier);
            return Err(err.into());
        }

        self.presets.push(preset);
        let index = self.presets.len() - 1;
        if let Err(err) = self.persist() {
            if let Some(preset) = self.presets.pop() {
                self.roll_back_event(&preset, &identifier);
            }
            return Err(err);
        }
        info!(
            "event=preset_add module=preset_book status=ok index={} identifier={}",
            index, identifier
        );
        Ok(index)
    }

    /// Updates the preset at `index` and its event.
    ///
    /// The stored preset is only replaced after the event was saved.
    pub fn edit(&mut self, index: usize, title: &str, date_epoch_ms: i64) -> PresetBookResult<()> {
        let mut edited = preset_at(&self.presets, index)?.clone();
        edited.set_title(title)?;
        edited.set_date_epoch_ms(date_epoch_ms);

        self.coordinator.edit_event(&edited)?;
        self.presets[index] = edited;
        self.persist()?;
        info!("event=preset_edit module=preset_book status=ok index={}", index);
        Ok(())
    }

    /// Removes the preset at `index` together with its event.
    ///
    /// A preset whose event is already gone, or was never created, is still
    /// removed locally.
    pub fn delete(&mut self, index: usize) -> PresetBookResult<Preset> {
        let preset = preset_at(&self.presets, index)?;
        match self.coordinator.remove_event(preset) {
            Ok(()) => {}
            Err(CoordinatorError::MissingIdentifier) | Err(CoordinatorError::EventNotFound(_)) => {
                warn!("event=preset_delete module=preset_book status=local_only index={}", index);
            }
            Err(err) => return Err(err.into()),
        }

        let removed = self.presets.remove(index);
        self.persist()?;
        info!("event=preset_delete module=preset_book status=ok index={}", index);
        Ok(removed)
    }

    /// Pulls backend edits into every linked preset and tags orphans.
    pub fn reconcile(&mut self) -> PresetBookResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for (index, preset) in self.presets.iter_mut().enumerate() {
            if preset.event_identifier().is_none() {
                report.unlinked += 1;
                continue;
            }

            match self.coordinator.needs_update(preset) {
                Ok(false) => {}
                Ok(true) => match self.coordinator.apply_backend_changes(preset) {
                    Ok(()) => report.updated += 1,
                    Err(err) => {
                        report.failed += 1;
                        warn!(
                            "event=preset_reconcile module=preset_book status=error index={} error={}",
                            index, err
                        );
                    }
                },
                Err(CoordinatorError::EventNotFound(_)) => {
                    if preset.mark_orphaned() {
                        report.orphaned += 1;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "event=preset_reconcile module=preset_book status=error index={} error={}",
                        index, err
                    );
                }
            }
        }

        self.persist()?;
        info!(
            "event=preset_reconcile module=preset_book status=ok updated={} orphaned={} unlinked={} failed={}",
            report.updated, report.orphaned, report.unlinked, report.failed
        );
        Ok(report)
    }

    fn roll_back_event(&mut self, preset: &Preset, identifier: &str) {
        let removed = Preset::new(
            preset.title(),
            preset.date_epoch_ms(),
            Some(identifier.to_string()),
        )
        .map_err(CoordinatorError::InvalidPreset)
        .and_then(|linked| self.coordinator.remove_event(&linked));
        match removed {
            Ok(()) => info!(
                "event=preset_add_rollback module=preset_book status=ok identifier={}",
                identifier
            ),
            Err(err) => warn!(
                "event=preset_add_rollback module=preset_book status=error identifier={} error={}",
                identifier, err
            ),
        }
    }

    fn persist(&self) -> PresetBookResult<()> {
        self.repo.replace_presets(&self.presets)?;
        Ok(())
    }
}

fn preset_at(presets: &[Preset], index: usize) -> PresetBookResult<&Preset> {
    presets.get(index).ok_or(PresetBookError::IndexOutOfRange {
        index,
        len: presets.len(),
    })
}
