use crate::clock::{Clock, SystemClock};
use crate::error::{LeaseError, Result};
use crate::table::{InsertOutcome, LeaseTable};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use slotlock_common::{LeaseRecord, MAX_TTL_SECONDS};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted(LeaseRecord),
    /// A live lease exists; carries the current holder's record.
    Conflict(LeaseRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed(LeaseRecord),
    NotOwner,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotOwner,
    NotFound,
}

/// Grants, renews, releases and inspects leases.
///
/// Every operation runs as one critical section over the whole table and
/// reads the clock inside it, so operations on a key are linearizable and
/// expiry is re-checked at the moment of each call.
pub struct LeaseManager {
    table: Mutex<LeaseTable>,
    clock: Arc<dyn Clock>,
}

impl LeaseManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(LeaseTable::new()),
            clock,
        }
    }

    pub fn acquire(&self, resource_id: &str, owner_id: &str, ttl_seconds: i64) -> Result<AcquireOutcome> {
        validate_id("resource_id", resource_id)?;
        validate_id("owner_id", owner_id)?;
        let ttl_seconds = validate_ttl(ttl_seconds)?;

        let mut table = self.table.lock();
        let now = self.clock.now();
        let candidate = LeaseRecord {
            resource_id: resource_id.to_string(),
            owner_id: owner_id.to_string(),
            acquired_at: now,
            ttl_seconds,
        };

        match table.insert_if_absent_or_expired(candidate.clone(), now) {
            InsertOutcome::Inserted { reaped } => {
                if let Some(stale) = reaped {
                    debug!(resource_id, previous_owner = %stale.owner_id, "replaced expired lease");
                }
                debug!(resource_id, owner_id, ttl_seconds, "lease granted");
                Ok(AcquireOutcome::Granted(candidate))
            }
            InsertOutcome::Occupied(holder) => {
                debug!(resource_id, owner_id, holder = %holder.owner_id, "lease conflict");
                Ok(AcquireOutcome::Conflict(holder))
            }
        }
    }

    pub fn renew(&self, resource_id: &str, owner_id: &str, ttl_seconds: i64) -> Result<RenewOutcome> {
        validate_id("resource_id", resource_id)?;
        validate_id("owner_id", owner_id)?;
        let ttl_seconds = validate_ttl(ttl_seconds)?;

        let mut table = self.table.lock();
        let now = self.clock.now();

        let Some(lease) = table.get_live_mut(resource_id, now) else {
            return Ok(RenewOutcome::NotFound);
        };
        if lease.owner_id != owner_id {
            debug!(resource_id, owner_id, holder = %lease.owner_id, "renew by non-owner refused");
            return Ok(RenewOutcome::NotOwner);
        }

        lease.acquired_at = now;
        lease.ttl_seconds = ttl_seconds;
        debug!(resource_id, owner_id, ttl_seconds, "lease renewed");
        Ok(RenewOutcome::Renewed(lease.clone()))
    }

    pub fn release(&self, resource_id: &str, owner_id: &str) -> Result<ReleaseOutcome> {
        validate_id("resource_id", resource_id)?;
        validate_id("owner_id", owner_id)?;

        let mut table = self.table.lock();
        let now = self.clock.now();

        let holder = match table.get(resource_id) {
            None => return Ok(ReleaseOutcome::NotFound),
            Some(lease) if !lease.is_live_at(now) => {
                // Logically absent already; purge it while we hold the lock.
                table.delete(resource_id);
                return Ok(ReleaseOutcome::NotFound);
            }
            Some(lease) => lease.owner_id.clone(),
        };

        if holder != owner_id {
            debug!(resource_id, owner_id, holder = %holder, "release by non-owner refused");
            return Ok(ReleaseOutcome::NotOwner);
        }

        table.delete(resource_id);
        debug!(resource_id, owner_id, "lease released");
        Ok(ReleaseOutcome::Released)
    }

    /// Returns the live lease for `resource_id`, or `None` if absent or expired.
    pub fn inspect(&self, resource_id: &str) -> Result<Option<LeaseRecord>> {
        validate_id("resource_id", resource_id)?;

        let table = self.table.lock();
        let now = self.clock.now();
        Ok(table.get_live(resource_id, now).cloned())
    }

    /// All live leases, ordered by resource identifier.
    pub fn list(&self) -> Vec<LeaseRecord> {
        let table = self.table.lock();
        let now = self.clock.now();
        table.live(now)
    }

    /// Deletes every expired record and returns what was removed.
    pub fn reap_expired(&self) -> Vec<LeaseRecord> {
        let mut table = self.table.lock();
        let now = self.clock.now();
        table.remove_expired(now)
    }

    /// Current time on the coordinator's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Records physically held, including expired ones awaiting reaping.
    pub fn stored_count(&self) -> usize {
        self.table.lock().len()
    }
}

impl Default for LeaseManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LeaseError::InvalidInput(format!("{field} must be a non-empty string")));
    }
    Ok(())
}

fn validate_ttl(ttl_seconds: i64) -> Result<u64> {
    if ttl_seconds <= 0 {
        return Err(LeaseError::InvalidInput(
            "ttl_seconds must be a positive integer".to_string(),
        ));
    }
    if ttl_seconds > MAX_TTL_SECONDS {
        return Err(LeaseError::InvalidInput(format!(
            "ttl_seconds must not exceed {MAX_TTL_SECONDS}"
        )));
    }
    Ok(ttl_seconds as u64)
}
