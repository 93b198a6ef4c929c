//! In-process lock coordinator: time-bounded exclusive leases keyed by
//! opaque resource identifiers, served over HTTP.

pub mod clock;
pub mod config;
pub mod error;
pub mod handler;
pub mod manager;
pub mod reaper;
pub mod request_id;
pub mod server;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoordinatorConfig;
pub use error::LeaseError;
pub use manager::{AcquireOutcome, LeaseManager, ReleaseOutcome, RenewOutcome};
