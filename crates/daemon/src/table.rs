use chrono::{DateTime, Utc};
use slotlock_common::LeaseRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Result of [`LeaseTable::insert_if_absent_or_expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was installed. `reaped` holds the expired record it replaced, if any.
    Inserted { reaped: Option<LeaseRecord> },
    /// A live lease already holds the key; the table is unchanged.
    Occupied(LeaseRecord),
}

/// Map from resource identifier to lease record.
///
/// The table does no locking of its own; callers serialize access.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: HashMap<String, LeaseRecord>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lookup, including records that have expired but not been purged.
    pub fn get(&self, resource_id: &str) -> Option<&LeaseRecord> {
        self.leases.get(resource_id)
    }

    /// Lookup that treats an expired record as absent.
    pub fn get_live(&self, resource_id: &str, now: DateTime<Utc>) -> Option<&LeaseRecord> {
        self.leases
            .get(resource_id)
            .filter(|lease| lease.is_live_at(now))
    }

    pub fn get_live_mut(&mut self, resource_id: &str, now: DateTime<Utc>) -> Option<&mut LeaseRecord> {
        self.leases
            .get_mut(resource_id)
            .filter(|lease| lease.is_live_at(now))
    }

    /// Unconditional insert; returns the previous record.
    pub fn put(&mut self, record: LeaseRecord) -> Option<LeaseRecord> {
        self.leases.insert(record.resource_id.clone(), record)
    }

    pub fn delete(&mut self, resource_id: &str) -> Option<LeaseRecord> {
        self.leases.remove(resource_id)
    }

    /// Installs `record` unless a live lease already holds its key.
    /// An expired record under the key is replaced in the same step.
    pub fn insert_if_absent_or_expired(&mut self, record: LeaseRecord, now: DateTime<Utc>) -> InsertOutcome {
        match self.leases.entry(record.resource_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                InsertOutcome::Inserted { reaped: None }
            }
            Entry::Occupied(mut slot) => {
                if slot.get().is_live_at(now) {
                    InsertOutcome::Occupied(slot.get().clone())
                } else {
                    let stale = slot.insert(record);
                    InsertOutcome::Inserted { reaped: Some(stale) }
                }
            }
        }
    }

    /// Deletes every record with `acquired_at + ttl_seconds <= now` and returns them.
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<LeaseRecord> {
        let expired: Vec<String> = self
            .leases
            .iter()
            .filter(|(_, lease)| !lease.is_live_at(now))
            .map(|(resource_id, _)| resource_id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|resource_id| self.leases.remove(&resource_id))
            .collect()
    }

    /// Live leases ordered by resource identifier.
    pub fn live(&self, now: DateTime<Utc>) -> Vec<LeaseRecord> {
        let mut live: Vec<LeaseRecord> = self
            .leases
            .values()
            .filter(|lease| lease.is_live_at(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        live
    }

    /// Number of stored records, live or not.
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}
