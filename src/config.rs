use std::env;
use std::str::FromStr;

use crate::domain::errors::AllocationConfigError;

/// Crate-level defaults for the allocation engine.
///
/// These are knobs for callers that don't supply every field of
/// [`crate::domain::allocation::types::Policy::MinDispersion`] explicitly, and for
/// bounding the size of a single `allocate()` call. None of this is read by
/// `allocate()` itself — the engine stays a pure function of its explicit arguments.
#[derive(Debug, Clone)]
pub struct AllocationEngineConfig {
    /// Default `tolerance` for MIN_DISPERSION when the caller doesn't specify one.
    pub default_tolerance: f64,
    /// Default `max_iterations` for MIN_DISPERSION when the caller doesn't specify one.
    pub default_max_iterations: usize,
    /// Soft cap on account count a caller should allocate across in one call;
    /// enforced by callers, not by `allocate()`.
    pub max_accounts: usize,
}

impl Default for AllocationEngineConfig {
    fn default() -> Self {
        Self {
            default_tolerance: 0.05,
            default_max_iterations: 1000,
            max_accounts: 5_000,
        }
    }
}

impl AllocationEngineConfig {
    pub fn validate(&self) -> Result<(), AllocationConfigError> {
        if !(0.0..=1.0).contains(&self.default_tolerance) {
            return Err(AllocationConfigError::InvalidTolerance(
                self.default_tolerance,
            ));
        }
        if self.default_max_iterations == 0 {
            return Err(AllocationConfigError::InvalidMaxIterations);
        }
        if self.max_accounts == 0 {
            return Err(AllocationConfigError::InvalidMaxAccounts);
        }
        Ok(())
    }

    /// Loads crate-level defaults from the environment, layering `.env` values
    /// over hardcoded defaults and falling back to the default for anything unset
    /// or unparseable.
    pub fn from_env() -> Result<Self, AllocationConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(raw) = env::var("ALLOCATION_DEFAULT_TOLERANCE") {
            config.default_tolerance = parse_env("ALLOCATION_DEFAULT_TOLERANCE", &raw, config.default_tolerance);
        }
        if let Ok(raw) = env::var("ALLOCATION_DEFAULT_MAX_ITERATIONS") {
            config.default_max_iterations =
                parse_env("ALLOCATION_DEFAULT_MAX_ITERATIONS", &raw, config.default_max_iterations);
        }
        if let Ok(raw) = env::var("ALLOCATION_MAX_ACCOUNTS") {
            config.max_accounts = parse_env("ALLOCATION_MAX_ACCOUNTS", &raw, config.max_accounts);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!("invalid value for {name}: {raw:?}, using default");
        fallback
    })
}
