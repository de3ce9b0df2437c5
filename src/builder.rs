//! Unified builder for all replacement engines.
//!
//! Lets a driver pick an engine by name or by [`PolicyKind`] and hold any of
//! them behind one concrete [`Policy`] type, without trait objects.
//!
//! ## Example
//!
//! ```rust
//! use evictsim::builder::{PolicyBuilder, PolicyKind};
//! use evictsim::{AccessType, ReplacementPolicy, replay};
//!
//! let kind: PolicyKind = "LIRS".parse().unwrap();
//! let mut policy = PolicyBuilder::new(100).build(kind);
//! replay(&mut policy, [(1, AccessType::Read), (1, AccessType::Write)]).unwrap();
//! assert_eq!(policy.name(), "LIRS");
//! assert!(policy.is_dirty(1));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, InvariantError};
use crate::policy::arc::ArcPolicy;
use crate::policy::cacheus::{CacheusPolicy, DEFAULT_WRITE_FRACTION};
use crate::policy::lfu::LfuPolicy;
use crate::policy::lirs::{DEFAULT_LIR_FRACTION, LirDemotion, LirsPolicy};
use crate::stats::{LifetimeTotals, RunCounters};
use crate::traits::{AccessType, BlockKey, ReplacementPolicy};

/// Available replacement engines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyKind {
    /// Adaptive Replacement Cache.
    Arc,
    /// Read/write segmented recency with a configurable Write share.
    Cacheus { write_fraction: f64 },
    /// Least Frequently Used.
    Lfu,
    /// LIRS with a configurable high-value share and demotion mode.
    Lirs {
        lir_fraction: f64,
        demotion: LirDemotion,
    },
}

impl PolicyKind {
    /// Every engine with its default parameters.
    pub fn defaults() -> [PolicyKind; 4] {
        [
            PolicyKind::Arc,
            PolicyKind::Cacheus {
                write_fraction: DEFAULT_WRITE_FRACTION,
            },
            PolicyKind::Lfu,
            PolicyKind::Lirs {
                lir_fraction: DEFAULT_LIR_FRACTION,
                demotion: LirDemotion::Bounded,
            },
        ]
    }

    /// Name the engine reports in the result log.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Arc => "ARC",
            PolicyKind::Cacheus { .. } => "CACHEUS",
            PolicyKind::Lfu => "LFU",
            PolicyKind::Lirs { .. } => "LIRS",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses an engine name, case-insensitively, with default parameters.
impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        PolicyKind::defaults()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::new(format!("unknown policy {name:?}")))
    }
}

/// Any replacement engine, dispatched by `match`.
pub struct Policy {
    inner: PolicyInner,
}

enum PolicyInner {
    Arc(ArcPolicy),
    Cacheus(CacheusPolicy),
    Lfu(LfuPolicy),
    Lirs(LirsPolicy),
}

macro_rules! dispatch {
    ($self:expr, $engine:ident => $body:expr) => {
        match $self {
            PolicyInner::Arc($engine) => $body,
            PolicyInner::Cacheus($engine) => $body,
            PolicyInner::Lfu($engine) => $body,
            PolicyInner::Lirs($engine) => $body,
        }
    };
}

impl Policy {
    /// Runs the wrapped engine's own consistency check.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        dispatch!(&self.inner, engine => engine.check_invariants())
    }

    pub fn as_arc(&self) -> Option<&ArcPolicy> {
        match &self.inner {
            PolicyInner::Arc(arc) => Some(arc),
            _ => None,
        }
    }

    pub fn as_cacheus(&self) -> Option<&CacheusPolicy> {
        match &self.inner {
            PolicyInner::Cacheus(cacheus) => Some(cacheus),
            _ => None,
        }
    }

    pub fn as_lfu(&self) -> Option<&LfuPolicy> {
        match &self.inner {
            PolicyInner::Lfu(lfu) => Some(lfu),
            _ => None,
        }
    }

    pub fn as_lirs(&self) -> Option<&LirsPolicy> {
        match &self.inner {
            PolicyInner::Lirs(lirs) => Some(lirs),
            _ => None,
        }
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(&self.inner, engine => fmt::Debug::fmt(engine, f))
    }
}

impl ReplacementPolicy for Policy {
    fn name(&self) -> &'static str {
        dispatch!(&self.inner, engine => engine.name())
    }

    fn capacity(&self) -> usize {
        dispatch!(&self.inner, engine => engine.capacity())
    }

    fn len(&self) -> usize {
        dispatch!(&self.inner, engine => engine.len())
    }

    fn contains(&self, key: BlockKey) -> bool {
        dispatch!(&self.inner, engine => engine.contains(key))
    }

    fn is_dirty(&self, key: BlockKey) -> bool {
        dispatch!(&self.inner, engine => engine.is_dirty(key))
    }

    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError> {
        dispatch!(&mut self.inner, engine => engine.reference(key, access))
    }

    fn counters(&self) -> &RunCounters {
        dispatch!(&self.inner, engine => engine.counters())
    }

    fn lifetime(&self) -> &LifetimeTotals {
        dispatch!(&self.inner, engine => engine.lifetime())
    }

    fn reset_run(&mut self) {
        dispatch!(&mut self.inner, engine => engine.reset_run())
    }

    fn resident_keys(&self) -> Vec<BlockKey> {
        dispatch!(&self.inner, engine => engine.resident_keys())
    }
}

/// Builder for engine instances.
#[derive(Debug, Clone, Copy)]
pub struct PolicyBuilder {
    capacity: usize,
}

impl PolicyBuilder {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Builds an engine of the given kind.
    ///
    /// # Panics
    ///
    /// Panics if the capacity or the kind's parameters are invalid. See
    /// [`try_build`](Self::try_build).
    ///
    /// # Example
    ///
    /// ```rust
    /// use evictsim::builder::{PolicyBuilder, PolicyKind};
    /// use evictsim::policy::lirs::LirDemotion;
    /// use evictsim::ReplacementPolicy;
    ///
    /// let arc = PolicyBuilder::new(64).build(PolicyKind::Arc);
    ///
    /// // 25% of the capacity targeted at written blocks
    /// let cacheus = PolicyBuilder::new(64).build(PolicyKind::Cacheus { write_fraction: 0.25 });
    ///
    /// let lirs = PolicyBuilder::new(64).build(PolicyKind::Lirs {
    ///     lir_fraction: 0.1,
    ///     demotion: LirDemotion::Disabled,
    /// });
    /// assert_eq!(lirs.capacity(), 64);
    /// ```
    pub fn build(self, kind: PolicyKind) -> Policy {
        match self.try_build(kind) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_build(self, kind: PolicyKind) -> Result<Policy, ConfigError> {
        let inner = match kind {
            PolicyKind::Arc => PolicyInner::Arc(ArcPolicy::try_new(self.capacity)?),
            PolicyKind::Cacheus { write_fraction } => PolicyInner::Cacheus(
                CacheusPolicy::try_with_write_fraction(self.capacity, write_fraction)?,
            ),
            PolicyKind::Lfu => PolicyInner::Lfu(LfuPolicy::try_new(self.capacity)?),
            PolicyKind::Lirs {
                lir_fraction,
                demotion,
            } => PolicyInner::Lirs(LirsPolicy::try_with_config(
                self.capacity,
                lir_fraction,
                demotion,
            )?),
        };

        tracing::debug!(policy = kind.name(), capacity = self.capacity, "built policy");
        Ok(Policy { inner })
    }
}
