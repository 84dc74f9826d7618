//! Uncommitted changes shared by store implementations.

use crate::store::record::EventRecord;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) enum StagedChange {
    Save(EventRecord),
    Remove,
}

/// Changes saved with `commit = false`, keyed by event identifier.
#[derive(Debug, Default)]
pub(crate) struct StagedChanges {
    changes: BTreeMap<String, StagedChange>,
}

impl StagedChanges {
    /// Returns the change previously staged under `identifier`.
    pub fn stage_save(
        &mut self,
        identifier: String,
        record: EventRecord,
    ) -> Option<StagedChange> {
        self.changes.insert(identifier, StagedChange::Save(record))
    }

    /// Returns the change previously staged under `identifier`.
    pub fn stage_remove(&mut self, identifier: String) -> Option<StagedChange> {
        self.changes.insert(identifier, StagedChange::Remove)
    }

    /// Puts back `previous` after a failed flush of `identifier`.
    pub fn restore(&mut self, identifier: &str, previous: Option<StagedChange>) {
        match previous {
            Some(change) => {
                self.changes.insert(identifier.to_string(), change);
            }
            None => {
                self.changes.remove(identifier);
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&StagedChange> {
        self.changes.get(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StagedChange)> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
