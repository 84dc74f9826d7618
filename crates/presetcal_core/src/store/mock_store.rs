//! In-memory calendar backend for tests and previews.
//!
//! # Responsibility
//! - Implement the store contracts without any platform or disk dependency.
//! - Let callers script authorization outcomes deterministically and
//!   simulate edits made outside the app.
//!
//! # Invariants
//! - Authorization lives in the instance's own `AuthorizationState`, never in
//!   process globals, so parallel tests do not interfere.
//! - `MockEventStore` only produces and accepts `MockEvent`.

use crate::store::record::{EventRecord, StoreBinding};
use crate::store::staging::{StagedChange, StagedChanges};
use crate::store::{
    compose_event_identifier, AccessCompletion, AuthorizationState, AuthorizationStatus,
    CalendarRef, EntityType, EventStore, StoreError, StoreEvent, StoreResult,
};
use log::debug;
use std::cell::Cell;
use std::collections::BTreeMap;
use uuid::Uuid;

const MOCK_CALENDAR_TITLE: &str = "Mock Calendar";

/// Event record produced by `MockEventStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEvent {
    record: EventRecord,
    binding: StoreBinding,
}

impl MockEvent {
    pub fn record(&self) -> &EventRecord {
        &self.record
    }
}

impl StoreEvent for MockEvent {
    type Store = MockEventStore;

    fn create_event(store: &MockEventStore) -> Self {
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

/// Scriptable in-memory store.
#[derive(Debug)]
pub struct MockEventStore {
    store_id: Uuid,
    generation: u64,
    authorization: AuthorizationState,
    grant_on_request: bool,
    deliver_access_on_thread: bool,
    drop_access_completion: bool,
    leave_undetermined: bool,
    prompt_count: Cell<usize>,
    default_calendar: Option<CalendarRef>,
    events: BTreeMap<String, EventRecord>,
    staged: StagedChanges,
    save_failure: Option<String>,
}

impl Default for MockEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventStore {
    /// Store with event access already authorized.
    pub fn new() -> Self {
        Self::with_authorization(AuthorizationState::with_status(
            EntityType::Event,
            AuthorizationStatus::Authorized,
        ))
    }

    /// Store reading decisions from `authorization`.
    pub fn with_authorization(authorization: AuthorizationState) -> Self {
        Self {
            store_id: Uuid::new_v4(),
            generation: 0,
            authorization,
            grant_on_request: true,
            deliver_access_on_thread: false,
            drop_access_completion: false,
            leave_undetermined: false,
            prompt_count: Cell::new(0),
            default_calendar: Some(CalendarRef {
                id: Uuid::new_v4(),
                title: MOCK_CALENDAR_TITLE.to_string(),
            }),
            events: BTreeMap::new(),
            staged: StagedChanges::default(),
            save_failure: None,
        }
    }

    pub fn authorization(&self) -> &AuthorizationState {
        &self.authorization
    }

    /// Forces the event authorization status.
    pub fn set_authorization_status(&self, status: AuthorizationStatus) {
        self.authorization.set_status(EntityType::Event, status);
    }

    /// Resets event authorization to `NotDetermined` and scripts the answer
    /// the next prompt will give.
    pub fn prepare_access_prompt(&mut self, grant: bool) {
        self.grant_on_request = grant;
        self.set_authorization_status(AuthorizationStatus::NotDetermined);
    }

    /// Delivers access completions from a spawned thread instead of inline.
    pub fn deliver_access_on_thread(&mut self, enabled: bool) {
        self.deliver_access_on_thread = enabled;
    }

    /// Drops access completions without calling them.
    pub fn drop_access_completion(&mut self, enabled: bool) {
        self.drop_access_completion = enabled;
    }

    /// Completes access prompts without recording any decision.
    pub fn leave_undetermined_after_prompt(&mut self, enabled: bool) {
        self.leave_undetermined = enabled;
    }

    /// Number of prompts shown so far.
    pub fn prompt_count(&self) -> usize {
        self.prompt_count.get()
    }

    pub fn set_default_calendar(&mut self, calendar: Option<CalendarRef>) {
        self.default_calendar = calendar;
    }

    /// Makes every following save fail with `StoreError::Backend`.
    pub fn fail_saves_with(&mut self, message: Option<String>) {
        self.save_failure = message;
    }

    pub fn committed_count(&self) -> usize {
        self.events.len()
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    pub fn committed_record(&self, identifier: &str) -> Option<&EventRecord> {
        self.events.get(identifier)
    }

    /// Plants a committed event as if created outside the app.
    ///
    /// Returns the assigned identifier.
    pub fn insert_committed(&mut self, mut record: EventRecord) -> String {
        let prefix = self.identifier_prefix(&record);
        let identifier = record.ensure_identifier(|| compose_event_identifier(prefix));
        self.events.insert(identifier.clone(), record);
        identifier
    }

    /// Edits a committed event as if changed outside the app.
    pub fn update_committed(
        &mut self,
        identifier: &str,
        edit: impl FnOnce(&mut EventRecord),
    ) -> bool {
        match self.events.get_mut(identifier) {
            Some(record) => {
                edit(record);
                true
            }
            None => false,
        }
    }

    /// Deletes a committed event as if removed outside the app.
    pub fn remove_committed(&mut self, identifier: &str) -> bool {
        self.events.remove(identifier).is_some()
    }

    fn binding(&self) -> StoreBinding {
        StoreBinding {
            store_id: self.store_id,
            generation: self.generation,
        }
    }

    fn bind(&self, record: EventRecord) -> MockEvent {
        MockEvent {
            record,
            binding: self.binding(),
        }
    }

    fn identifier_prefix(&self, record: &EventRecord) -> Uuid {
        record
            .calendar
            .as_ref()
            .map_or(self.store_id, |calendar| calendar.id)
    }

    fn contains(&self, identifier: &str) -> bool {
        match self.staged.get(identifier) {
            Some(StagedChange::Save(_)) => true,
            Some(StagedChange::Remove) => false,
            None => self.events.contains_key(identifier),
        }
    }
}

impl EventStore for MockEventStore {
    type Event = MockEvent;

    fn authorization_status(&self, entity: EntityType) -> StoreResult<AuthorizationStatus> {
        Ok(self.authorization.status(entity))
    }

    fn request_access(&self, entity: EntityType, completion: AccessCompletion) {
        let current = self.authorization.status(entity);
        if current.is_decided() {
            completion(Ok(current == AuthorizationStatus::Authorized));
            return;
        }

        self.prompt_count.set(self.prompt_count.get() + 1);
        if self.drop_access_completion {
            drop(completion);
            return;
        }

        let state = self.authorization.clone();
        let granted = self.grant_on_request;
        let record = !self.leave_undetermined;
        let deliver = move || {
            let status = if record {
                state.record_decision(entity, granted)
            } else {
                state.status(entity)
            };
            completion(Ok(status == AuthorizationStatus::Authorized));
        };

        if self.deliver_access_on_thread {
            std::thread::spawn(deliver);
        } else {
            deliver();
        }
    }

    fn save(&mut self, event: &mut MockEvent, commit: bool) -> StoreResult<()> {
        event.binding.check_against(self.binding())?;
        if let Some(message) = &self.save_failure {
            return Err(StoreError::Backend(message.clone()));
        }
        event.record.validate_window()?;

        let prefix = self.identifier_prefix(&event.record);
        let identifier = event
            .record
            .ensure_identifier(|| compose_event_identifier(prefix));
        self.staged.stage_save(identifier, event.record.clone());

        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn remove(&mut self, event: &MockEvent, commit: bool) -> StoreResult<()> {
        event.binding.check_against(self.binding())?;
        let identifier = event.identifier().ok_or(StoreError::UnsavedEvent)?;
        if !self.contains(identifier) {
            return Err(StoreError::EventNotFound(identifier.to_string()));
        }
        self.staged.stage_remove(identifier.to_string());

        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        for (identifier, change) in self.staged.iter() {
            match change {
                StagedChange::Save(record) => {
                    self.events.insert(identifier.clone(), record.clone());
                }
                StagedChange::Remove => {
                    self.events.remove(identifier);
                }
            }
        }
        self.staged.clear();
        Ok(())
    }

    fn event_with_identifier(&self, identifier: &str) -> StoreResult<Option<MockEvent>> {
        let record = match self.staged.get(identifier) {
            Some(StagedChange::Save(record)) => Some(record.clone()),
            Some(StagedChange::Remove) => None,
            None => self.events.get(identifier).cloned(),
        };
        Ok(record.map(|record| self.bind(record)))
    }

    fn reset(&mut self) {
        debug!(
            "event=store_reset module=store status=ok backend=mock discarded={}",
            self.staged.len()
        );
        self.staged.clear();
        self.generation += 1;
    }

    fn default_calendar(&self) -> Option<CalendarRef> {
        self.default_calendar.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{MockEvent, MockEventStore};
    use crate::store::{EventStore, StoreError, StoreEvent};

    #[test]
    fn identifiers_are_assigned_on_first_save_only() {
        let mut store = MockEventStore::new();
        let mut event = MockEvent::create_event(&store);
        assert_eq!(event.identifier(), None);

        store.save(&mut event, true).unwrap();
        let first = event.identifier().map(str::to_owned);
        store.save(&mut event, true).unwrap();

        assert!(first.is_some());
        assert_eq!(event.identifier().map(str::to_owned), first);
        assert_eq!(store.committed_count(), 1);
    }

    #[test]
    fn staged_saves_are_visible_but_reset_discards_them() {
        let mut store = MockEventStore::new();
        let mut event = MockEvent::create_event(&store);
        store.save(&mut event, false).unwrap();
        let identifier = event.identifier().unwrap().to_string();

        assert!(store.event_with_identifier(&identifier).unwrap().is_some());
        assert_eq!(store.committed_count(), 0);

        store.reset();
        assert!(store.event_with_identifier(&identifier).unwrap().is_none());
        assert_eq!(store.staged_count(), 0);
    }

    #[test]
    fn records_from_another_instance_are_rejected() {
        let first = MockEventStore::new();
        let mut second = MockEventStore::new();
        let mut event = MockEvent::create_event(&first);

        let err = second.save(&mut event, true).unwrap_err();
        assert!(matches!(err, StoreError::ForeignEvent));
    }
}
