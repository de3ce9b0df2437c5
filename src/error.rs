//! Error types for the policy engines.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: an engine found its own state inconsistent, e.g. it
//!   had to evict but no victim existed. Returned by `reference` and by the
//!   engines' `check_invariants` methods.
//! - [`ConfigError`]: construction parameters were rejected (zero capacity,
//!   out-of-range fractions).
//!
//! ## Example Usage
//!
//! ```
//! use evictsim::error::ConfigError;
//! use evictsim::policy::cacheus::CacheusPolicy;
//!
//! let engine: Result<CacheusPolicy, ConfigError> = CacheusPolicy::try_with_write_fraction(100, 0.2);
//! assert!(engine.is_ok());
//!
//! let bad = CacheusPolicy::try_with_write_fraction(100, 1.5);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// An engine's internal structures disagree with each other.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Invalid construction parameters.
///
/// # Example
///
/// ```
/// use evictsim::policy::arc::ArcPolicy;
///
/// let err = ArcPolicy::try_new(0).unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Rejects `capacity == 0`.
pub(crate) fn check_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::new("cache capacity must be greater than zero"));
    }
    Ok(())
}

/// Rejects fractions outside `[0.0, 1.0]` or non-finite values.
pub(crate) fn check_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::new(format!(
            "{name} must be in [0.0, 1.0], got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
