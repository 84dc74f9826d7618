//! Shared authorization decisions and user prompting.
//!
//! # Responsibility
//! - Hold per-entity authorization decisions in an explicit, cloneable handle
//!   instead of ambient process globals.
//! - Abstract the out-of-band user prompt.
//!
//! # Invariants
//! - Once an entity is decided, `record_decision` keeps the first decision.
//! - Clones share state: stores built from clones of one handle observe the
//!   same decisions (process-wide semantics when the app keeps one handle).

use crate::store::{AuthorizationStatus, EntityType};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle over authorization decisions.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationState {
    decisions: Arc<Mutex<BTreeMap<EntityType, AuthorizationStatus>>>,
}

impl AuthorizationState {
    /// Creates an empty state where every entity is `NotDetermined`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state with one preset decision.
    pub fn with_status(entity: EntityType, status: AuthorizationStatus) -> Self {
        let state = Self::new();
        state.set_status(entity, status);
        state
    }

    pub fn status(&self, entity: EntityType) -> AuthorizationStatus {
        self.lock()
            .get(&entity)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined)
    }

    /// Overwrites the decision, including back to `NotDetermined`.
    ///
    /// Used by hosts that learn the platform decision directly and by tests.
    pub fn set_status(&self, entity: EntityType, status: AuthorizationStatus) {
        let mut decisions = self.lock();
        if status == AuthorizationStatus::NotDetermined {
            decisions.remove(&entity);
        } else {
            decisions.insert(entity, status);
        }
    }

    /// Records a prompt answer unless a decision already exists.
    ///
    /// Returns the effective status after the call.
    pub fn record_decision(&self, entity: EntityType, granted: bool) -> AuthorizationStatus {
        let mut decisions = self.lock();
        *decisions.entry(entity).or_insert(if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<EntityType, AuthorizationStatus>> {
        // Decisions are plain values; a poisoned map is still consistent.
        self.decisions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Out-of-band user prompt for calendar access.
///
/// Called off the caller's thread; may block until the user answers.
pub trait AccessPrompter: Send + Sync {
    fn prompt(&self, entity: EntityType) -> bool;
}

/// Prompter that always gives the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPrompter {
    granted: bool,
}

impl FixedPrompter {
    pub fn granting() -> Self {
        Self { granted: true }
    }

    pub fn denying() -> Self {
        Self { granted: false }
    }
}

impl AccessPrompter for FixedPrompter {
    fn prompt(&self, _entity: EntityType) -> bool {
        self.granted
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorizationState;
    use crate::store::{AuthorizationStatus, EntityType};

    #[test]
    fn defaults_to_not_determined() {
        let state = AuthorizationState::new();
        assert_eq!(
            state.status(EntityType::Event),
            AuthorizationStatus::NotDetermined
        );
    }

    #[test]
    fn first_decision_wins() {
        let state = AuthorizationState::new();
        assert_eq!(
            state.record_decision(EntityType::Event, false),
            AuthorizationStatus::Denied
        );
        assert_eq!(
            state.record_decision(EntityType::Event, true),
            AuthorizationStatus::Denied
        );
    }

    #[test]
    fn clones_share_decisions_per_entity() {
        let state = AuthorizationState::new();
        let shared = state.clone();
        shared.record_decision(EntityType::Event, true);

        assert_eq!(
            state.status(EntityType::Event),
            AuthorizationStatus::Authorized
        );
        assert_eq!(
            state.status(EntityType::Reminder),
            AuthorizationStatus::NotDetermined
        );
    }

    #[test]
    fn set_status_can_return_to_not_determined() {
        let state = AuthorizationState::with_status(
            EntityType::Event,
            AuthorizationStatus::Restricted,
        );
        state.set_status(EntityType::Event, AuthorizationStatus::NotDetermined);
        assert_eq!(
            state.status(EntityType::Event),
            AuthorizationStatus::NotDetermined
        );
    }
}
