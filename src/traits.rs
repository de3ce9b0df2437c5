//! # Policy capability contract
//!
//! Every engine implements [`ReplacementPolicy`]. The trait is object safe,
//! so drivers can hold `Box<dyn ReplacementPolicy>` or use the
//! [`Policy`](crate::builder::Policy) enum.
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                      ReplacementPolicy                        │
//!   │                                                               │
//!   │  reference(key, access) → Result<(), InvariantError>          │
//!   │  report_hits(sink)      → HitStats      (one result-log line) │
//!   │  reset_run()            (calls, hits, migration ← 0)          │
//!   │  report_lifetime(sink)  (lifetime totals)                     │
//!   │  dump(sink)             (resident keys)                       │
//!   └───────────────┬──────────────┬──────────────┬─────────────────┘
//!                   │              │              │
//!          ┌────────┴──┐   ┌───────┴───┐   ┌──────┴────┐   ┌───────────┐
//!          │ ArcPolicy │   │ Cacheus   │   │ LfuPolicy │   │ LirsPolicy│
//!          └───────────┘   └───────────┘   └───────────┘   └───────────┘
//! ```
//!
//! Engines share no state. Each one is driven by a single caller at a time.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::error::{ConfigError, InvariantError};
use crate::stats::{HitStats, LifetimeTotals, RunCounters};

/// Identifier of a cached block.
pub type BlockKey = u64;

/// Kind of access recorded in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Read,
    Write,
}

impl AccessType {
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, AccessType::Write)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessType::Read => "Read",
            AccessType::Write => "Write",
        })
    }
}

impl FromStr for AccessType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "r" => Ok(AccessType::Read),
            "write" | "w" => Ok(AccessType::Write),
            other => Err(ConfigError::new(format!("unknown access type {other:?}"))),
        }
    }
}

/// Shared capability of all replacement engines.
pub trait ReplacementPolicy {
    /// Name written at the start of the result-log line.
    fn name(&self) -> &'static str;

    fn capacity(&self) -> usize;

    /// Number of resident blocks. History/ghost records are not counted.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` is resident.
    fn contains(&self, key: BlockKey) -> bool;

    /// Returns `true` if the resident block's last recorded state is dirty.
    /// Unknown keys are never dirty.
    fn is_dirty(&self, key: BlockKey) -> bool;

    /// Applies one trace access.
    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError>;

    fn counters(&self) -> &RunCounters;

    fn lifetime(&self) -> &LifetimeTotals;

    /// Zeroes the per-run `calls`, `hits` and `migration` counters. Cache
    /// contents and lifetime totals are untouched.
    fn reset_run(&mut self);

    /// Resident keys, in no guaranteed order.
    fn resident_keys(&self) -> Vec<BlockKey>;

    fn hit_stats(&self) -> HitStats {
        HitStats::new(self.name(), self.capacity(), self.counters())
    }

    /// Appends one result-log line to `sink` and returns the snapshot it
    /// was rendered from.
    fn report_hits(&self, sink: &mut dyn Write) -> io::Result<HitStats> {
        let stats = self.hit_stats();
        stats.write_line(sink)?;
        tracing::info!(
            policy = stats.policy,
            calls = stats.calls,
            hits = stats.hits,
            read_hits = stats.read_hits,
            write_hits = stats.write_hits,
            evicted_dirty = stats.evicted_dirty_pages,
            "hit report"
        );
        Ok(stats)
    }

    fn report_lifetime(&self, sink: &mut dyn Write) -> io::Result<()> {
        self.lifetime().write_summary(sink)
    }

    /// Diagnostic listing of the resident keys.
    fn dump(&self, sink: &mut dyn Write) -> io::Result<()> {
        write!(sink, "{} cached keys:", self.name())?;
        for key in self.resident_keys() {
            write!(sink, " {key}")?;
        }
        writeln!(sink)
    }
}

/// Drives `policy` over `accesses`, stopping at the first invariant error.
///
/// Returns the number of accesses applied.
///
/// ```
/// use evictsim::policy::lfu::LfuPolicy;
/// use evictsim::{AccessType, ReplacementPolicy, replay};
///
/// let mut lfu = LfuPolicy::new(2);
/// let trace = [1, 2, 1, 3].map(|k| (k, AccessType::Read));
/// assert_eq!(replay(&mut lfu, trace).unwrap(), 4);
/// assert_eq!(lfu.counters().hits, 1);
/// ```
pub fn replay<P, I>(policy: &mut P, accesses: I) -> Result<u64, InvariantError>
where
    P: ReplacementPolicy + ?Sized,
    I: IntoIterator<Item = (BlockKey, AccessType)>,
{
    let mut applied = 0u64;
    for (key, access) in accesses {
        if let Err(err) = policy.reference(key, access) {
            tracing::warn!(policy = policy.name(), key, %access, applied, error = %err, "replay aborted");
            return Err(err);
        }
        applied += 1;
    }
    Ok(applied)
}
