use thiserror::Error;

/// Errors raised while building or validating engine-level configuration.
///
/// These are programmer-facing failures (a bad default tolerance, an invalid
/// iteration cap) distinct from the data-driven `AllocationError` records an
/// `allocate()` call returns for caller-supplied inputs — see
/// [`crate::domain::allocation::types::AllocationError`].
#[derive(Debug, Error)]
pub enum AllocationConfigError {
    #[error("default_tolerance must be in [0, 1], got {0}")]
    InvalidTolerance(f64),

    #[error("default_max_iterations must be > 0")]
    InvalidMaxIterations,

    #[error("max_accounts must be > 0")]
    InvalidMaxAccounts,
}
