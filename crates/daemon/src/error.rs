use thiserror::Error;

/// Failures of a lease operation that the caller must fix before retrying.
///
/// Conflicts, ownership mismatches and missing leases are ordinary
/// outcomes and are reported through the per-operation outcome enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("{0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, LeaseError>;
