use crate::manager::LeaseManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Background task that purges expired leases on a fixed interval.
///
/// Purely a memory and listing hygiene measure: every lease operation
/// re-checks expiry on its own.
pub struct ReaperHandle {
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops the sweep loop. A sweep never spans an await point, so
    /// aborting cannot interrupt one halfway.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn spawn_reaper(manager: Arc<LeaseManager>, interval: Duration) -> ReaperHandle {
    let task = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&manager);
        }
    });
    ReaperHandle { task }
}

/// Runs one reaping pass and returns how many records were purged.
pub fn sweep(manager: &LeaseManager) -> usize {
    let reaped = manager.reap_expired();
    for lease in &reaped {
        info!(
            resource_id = %lease.resource_id,
            owner_id = %lease.owner_id,
            "Reaped expired lease"
        );
    }
    debug!(reaped = reaped.len(), "Reaper sweep complete");
    reaped.len()
}
