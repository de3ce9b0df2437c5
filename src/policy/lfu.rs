//! Least Frequently Used (LFU) engine.
//!
//! Every resident block carries a reference count. On a full miss the block
//! with the lowest count is evicted; ties go to the least recently referenced
//! block of that count.
//!
//! ```text
//!   FrequencyBuckets<BlockKey>
//!     freq=1: MRU [3] ◄──► [2] LRU    ◄── victim
//!     freq=2: MRU [1] LRU
//!
//!   dirty: FxHashSet<BlockKey>   (resident blocks written since insertion)
//! ```
//!
//! Frequencies are not aged and are forgotten on eviction: a block that comes
//! back starts again at 1.
//!
//! ## Example
//!
//! ```
//! use evictsim::policy::lfu::LfuPolicy;
//! use evictsim::{AccessType, ReplacementPolicy};
//!
//! let mut lfu = LfuPolicy::new(2);
//! for key in [1, 2, 1, 3] {
//!     lfu.reference(key, AccessType::Read).unwrap();
//! }
//! assert!(lfu.contains(1) && lfu.contains(3));
//! assert!(!lfu.contains(2));
//! ```

use std::fmt;

use rustc_hash::FxHashSet;

use crate::ds::{FrequencyBuckets, prealloc};
use crate::error::{ConfigError, InvariantError, check_capacity};
use crate::stats::{Accounting, LifetimeTotals, RunCounters};
use crate::traits::{AccessType, BlockKey, ReplacementPolicy};

const NAME: &str = "LFU";

pub struct LfuPolicy {
    buckets: FrequencyBuckets<BlockKey>,
    dirty: FxHashSet<BlockKey>,
    capacity: usize,
    acct: Accounting,
}

impl LfuPolicy {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        check_capacity(capacity)?;
        Ok(Self {
            buckets: FrequencyBuckets::with_capacity(prealloc(capacity)),
            dirty: FxHashSet::default(),
            capacity,
            acct: Accounting::default(),
        })
    }

    /// Reference count of a resident block.
    pub fn frequency(&self, key: BlockKey) -> Option<u64> {
        self.buckets.frequency(&key)
    }

    /// Lowest reference count among resident blocks.
    pub fn min_frequency(&self) -> Option<u64> {
        self.buckets.min_freq()
    }

    fn evict(&mut self) -> Result<(), InvariantError> {
        let (victim, freq) = self.buckets.pop_min().ok_or_else(|| {
            InvariantError::new("LFU: eviction required but no frequency bucket is populated")
        })?;
        let dirty = self.dirty.remove(&victim);
        if dirty {
            self.acct.dirty_eviction();
        }
        tracing::debug!(policy = NAME, victim, freq, dirty, "evicted resident block");
        Ok(())
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.buckets.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "resident count {} exceeds capacity {}",
                self.buckets.len(),
                self.capacity
            )));
        }
        if let Some(key) = self.dirty.iter().find(|k| !self.buckets.contains(k)) {
            return Err(InvariantError::new(format!(
                "key {key} is marked dirty but not resident"
            )));
        }
        self.buckets.check_invariants()
    }
}

impl fmt::Debug for LfuPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuPolicy")
            .field("capacity", &self.capacity)
            .field("len", &self.buckets.len())
            .field("min_frequency", &self.buckets.min_freq())
            .finish_non_exhaustive()
    }
}

impl ReplacementPolicy for LfuPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }

    fn contains(&self, key: BlockKey) -> bool {
        self.buckets.contains(&key)
    }

    fn is_dirty(&self, key: BlockKey) -> bool {
        self.dirty.contains(&key)
    }

    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError> {
        self.acct.call();
        tracing::trace!(policy = NAME, key, %access, "reference");

        if self.buckets.touch(&key)?.is_some() {
            self.acct.hit(access);
        } else {
            if self.buckets.len() >= self.capacity {
                self.evict()?;
            }
            if !self.buckets.insert(key) {
                return Err(InvariantError::new(format!(
                    "LFU: key {key} missed but is already tracked"
                )));
            }
        }

        if access.is_write() {
            self.dirty.insert(key);
        }
        Ok(())
    }

    fn counters(&self) -> &RunCounters {
        &self.acct.run
    }

    fn lifetime(&self) -> &LifetimeTotals {
        &self.acct.lifetime
    }

    fn reset_run(&mut self) {
        self.acct.run.reset_run();
    }

    fn resident_keys(&self) -> Vec<BlockKey> {
        self.buckets.iter().map(|(&key, _)| key).collect()
    }
}
