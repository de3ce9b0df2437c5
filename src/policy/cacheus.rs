//! Segmented read/write recency engine (CACHEUS).
//!
//! Resident blocks live in one of two LRU segments chosen by the type of the
//! block's most recent access. Each segment has a fixed target size derived
//! from `write_fraction`; eviction drains whichever segment is over its target.
//!
//! ```text
//!   Read segment  (target = C - write_target)   Write segment (target = write_target)
//!   ┌────────────────────────────────────┐      ┌────────────────────────────────┐
//!   │ MRU [9] ◄──► [4] ◄──► [2] LRU      │      │ MRU [7] ◄──► [3] LRU           │
//!   └────────────────────────────────────┘      └────────────────────────────────┘
//!
//!   Victim on a full miss:
//!     1. LRU of Read   if |Read|  > read_target
//!     2. LRU of Write  if |Write| > write_target
//!     3. LRU of Read   if non-empty
//!     4. LRU of Write  if non-empty
//! ```
//!
//! A hit moves the block to the MRU end of the segment matching the current
//! access, so a written block that is later read migrates to the Read
//! segment. Its dirty flag stays set until eviction.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId, prealloc};
use crate::error::{ConfigError, InvariantError, check_capacity, check_fraction};
use crate::stats::{Accounting, LifetimeTotals, RunCounters};
use crate::traits::{AccessType, BlockKey, ReplacementPolicy};

const NAME: &str = "CACHEUS";

/// Default share of the capacity targeted at the Write segment.
pub const DEFAULT_WRITE_FRACTION: f64 = 0.1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    Read,
    Write,
}

impl From<AccessType> for Segment {
    fn from(access: AccessType) -> Self {
        match access {
            AccessType::Read => Segment::Read,
            AccessType::Write => Segment::Write,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    segment: Segment,
    slot: SlotId,
    dirty: bool,
}

pub struct CacheusPolicy {
    entries: FxHashMap<BlockKey, Entry>,
    read: IntrusiveList<BlockKey>,
    write: IntrusiveList<BlockKey>,
    read_target: usize,
    write_target: usize,
    capacity: usize,
    acct: Accounting,
}

impl CacheusPolicy {
    /// Creates an engine with the default write fraction.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        Self::with_write_fraction(capacity, DEFAULT_WRITE_FRACTION)
    }

    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        Self::try_with_write_fraction(capacity, DEFAULT_WRITE_FRACTION)
    }

    /// # Panics
    ///
    /// Panics on invalid parameters. See
    /// [`try_with_write_fraction`](Self::try_with_write_fraction).
    pub fn with_write_fraction(capacity: usize, write_fraction: f64) -> Self {
        match Self::try_with_write_fraction(capacity, write_fraction) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    /// Sets `write_target = clamp(round(write_fraction * C), 1, C)`.
    ///
    /// # Errors
    ///
    /// `capacity == 0`, or `write_fraction` outside `[0.0, 1.0]`.
    pub fn try_with_write_fraction(
        capacity: usize,
        write_fraction: f64,
    ) -> Result<Self, ConfigError> {
        check_capacity(capacity)?;
        check_fraction("write_fraction", write_fraction)?;

        let write_target = ((write_fraction * capacity as f64).round() as usize).clamp(1, capacity);
        let reserve = prealloc(capacity);
        Ok(Self {
            entries: FxHashMap::with_capacity_and_hasher(reserve, Default::default()),
            read: IntrusiveList::with_capacity(reserve),
            write: IntrusiveList::with_capacity(prealloc(write_target)),
            read_target: capacity - write_target,
            write_target,
            capacity,
            acct: Accounting::default(),
        })
    }

    pub fn read_len(&self) -> usize {
        self.read.len()
    }

    pub fn write_len(&self) -> usize {
        self.write.len()
    }

    pub fn read_target(&self) -> usize {
        self.read_target
    }

    pub fn write_target(&self) -> usize {
        self.write_target
    }

    pub fn segment_of(&self, key: BlockKey) -> Option<Segment> {
        self.entries.get(&key).map(|e| e.segment)
    }

    /// Hook run after every reference. Segment targets are fixed for the
    /// lifetime of the engine, so this does nothing.
    #[inline]
    pub fn adapt_segments(&mut self) {}

    fn segment(&self, segment: Segment) -> &IntrusiveList<BlockKey> {
        match segment {
            Segment::Read => &self.read,
            Segment::Write => &self.write,
        }
    }

    fn segment_mut(&mut self, segment: Segment) -> &mut IntrusiveList<BlockKey> {
        match segment {
            Segment::Read => &mut self.read,
            Segment::Write => &mut self.write,
        }
    }

    fn victim_segment(&self) -> Option<Segment> {
        if self.read.len() > self.read_target && !self.read.is_empty() {
            Some(Segment::Read)
        } else if self.write.len() > self.write_target && !self.write.is_empty() {
            Some(Segment::Write)
        } else if !self.read.is_empty() {
            Some(Segment::Read)
        } else if !self.write.is_empty() {
            Some(Segment::Write)
        } else {
            None
        }
    }

    fn evict(&mut self) -> Result<(), InvariantError> {
        let segment = self.victim_segment().ok_or_else(|| {
            InvariantError::new("CACHEUS: eviction required but both segments are empty")
        })?;
        let victim = self.segment_mut(segment).pop_back().ok_or_else(|| {
            InvariantError::new(format!("CACHEUS: {segment:?} segment lost its LRU node"))
        })?;
        let entry = self.entries.remove(&victim).ok_or_else(|| {
            InvariantError::new(format!("CACHEUS: evicted key {victim} was not indexed"))
        })?;
        if entry.dirty {
            self.acct.dirty_eviction();
        }
        tracing::debug!(
            policy = NAME,
            victim,
            segment = ?segment,
            dirty = entry.dirty,
            "evicted resident block"
        );
        Ok(())
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let resident = self.read.len() + self.write.len();
        if resident > self.capacity {
            return Err(InvariantError::new(format!(
                "resident count {resident} exceeds capacity {}",
                self.capacity
            )));
        }
        if resident != self.entries.len() {
            return Err(InvariantError::new(format!(
                "{} indexed keys but {resident} listed",
                self.entries.len()
            )));
        }
        for segment in [Segment::Read, Segment::Write] {
            for (slot, &key) in self.segment(segment).iter_entries() {
                match self.entries.get(&key) {
                    Some(e) if e.segment == segment && e.slot == slot => {},
                    _ => {
                        return Err(InvariantError::new(format!(
                            "key {key} in {segment:?} segment disagrees with its index entry"
                        )));
                    },
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CacheusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheusPolicy")
            .field("capacity", &self.capacity)
            .field("read_len", &self.read.len())
            .field("read_target", &self.read_target)
            .field("write_len", &self.write.len())
            .field("write_target", &self.write_target)
            .finish_non_exhaustive()
    }
}

impl ReplacementPolicy for CacheusPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, key: BlockKey) -> bool {
        self.entries.contains_key(&key)
    }

    fn is_dirty(&self, key: BlockKey) -> bool {
        self.entries.get(&key).is_some_and(|e| e.dirty)
    }

    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError> {
        self.acct.call();
        tracing::trace!(policy = NAME, key, %access, "reference");

        let target = Segment::from(access);
        if let Some(entry) = self.entries.get(&key).copied() {
            self.acct.hit(access);
            if self.segment_mut(entry.segment).remove(entry.slot) != Some(key) {
                return Err(InvariantError::new(format!(
                    "CACHEUS: index entry of key {key} does not match its {:?} node",
                    entry.segment
                )));
            }
            let slot = self.segment_mut(target).push_front(key);
            self.entries.insert(key, Entry {
                segment: target,
                slot,
                dirty: entry.dirty || access.is_write(),
            });
        } else {
            if self.entries.len() >= self.capacity {
                self.evict()?;
            }
            let slot = self.segment_mut(target).push_front(key);
            self.entries.insert(key, Entry {
                segment: target,
                slot,
                dirty: access.is_write(),
            });
        }

        self.adapt_segments();
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
        self.read.iter().chain(self.write.iter()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AccessType::{Read, Write};

    fn run(cache: &mut CacheusPolicy, keys: &[BlockKey], access: AccessType) {
        for &key in keys {
            cache.reference(key, access).unwrap();
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn cacheus_targets_from_fraction() {
        let cache = CacheusPolicy::new(10);
        assert_eq!(cache.write_target(), 1);
        assert_eq!(cache.read_target(), 9);

        let cache = CacheusPolicy::with_write_fraction(100, 0.25);
        assert_eq!(cache.write_target(), 25);
        assert_eq!(cache.read_target(), 75);
    }

    #[test]
    fn cacheus_write_target_is_clamped() {
        let cache = CacheusPolicy::with_write_fraction(4, 0.0);
        assert_eq!(cache.write_target(), 1);
        assert_eq!(cache.read_target(), 3);

        let cache = CacheusPolicy::with_write_fraction(4, 1.0);
        assert_eq!(cache.write_target(), 4);
        assert_eq!(cache.read_target(), 0);
    }

    #[test]
    fn cacheus_rejects_bad_config() {
        assert!(CacheusPolicy::try_new(0).is_err());
        assert!(CacheusPolicy::try_with_write_fraction(8, -0.5).is_err());
        assert!(CacheusPolicy::try_with_write_fraction(8, f64::INFINITY).is_err());
    }

    #[test]
    fn cacheus_huge_capacity_builds_lazily() {
        let mut cache = CacheusPolicy::try_new(usize::MAX).unwrap();
        run(&mut cache, &[1, 2], Write);
        assert_eq!(cache.write_len(), 2);
        assert_eq!(cache.read_target() + cache.write_target(), usize::MAX);
    }

    #[test]
    fn cacheus_inserts_by_access_type() {
        let mut cache = CacheusPolicy::new(10);
        run(&mut cache, &[1], Read);
        run(&mut cache, &[2], Write);
        assert_eq!(cache.segment_of(1), Some(Segment::Read));
        assert_eq!(cache.segment_of(2), Some(Segment::Write));
        assert!(!cache.is_dirty(1));
        assert!(cache.is_dirty(2));
    }

    #[test]
    fn cacheus_hit_moves_to_segment_of_current_access() {
        let mut cache = CacheusPolicy::new(10);
        run(&mut cache, &[1], Write);
        run(&mut cache, &[1], Read);
        assert_eq!(cache.segment_of(1), Some(Segment::Read));
        assert!(cache.is_dirty(1));
        assert_eq!(cache.write_len(), 0);
        assert_eq!(cache.read_len(), 1);
        assert_eq!(cache.counters().read_hits, 1);
    }

    #[test]
    fn cacheus_all_write_trace_evicts_from_write_segment() {
        let mut cache = CacheusPolicy::new(10);
        run(&mut cache, &(1..=10).collect::<Vec<_>>(), Write);
        assert_eq!(cache.write_len(), 10);

        run(&mut cache, &[11], Write);
        assert!(!cache.contains(1));
        assert!(cache.contains(11));
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.counters().evicted_dirty_pages, 1);
    }

    #[test]
    fn cacheus_over_target_read_segment_is_drained_first() {
        let mut cache = CacheusPolicy::with_write_fraction(4, 0.5);
        run(&mut cache, &[1, 2, 3], Read);
        run(&mut cache, &[4], Write);
        // Read holds 3 against a target of 2.
        run(&mut cache, &[5], Write);
        assert!(!cache.contains(1));
        assert!(cache.contains(4));
        assert_eq!(cache.counters().evicted_dirty_pages, 0);
    }

    #[test]
    fn cacheus_falls_back_to_non_empty_segment() {
        let mut cache = CacheusPolicy::with_write_fraction(2, 1.0);
        // read_target = 0, write_target = 2
        run(&mut cache, &[1], Read);
        run(&mut cache, &[2], Write);
        run(&mut cache, &[3], Write);
        assert!(!cache.contains(1));
        assert!(cache.contains(2) && cache.contains(3));
    }

    #[test]
    fn cacheus_single_slot() {
        let mut cache = CacheusPolicy::new(1);
        assert_eq!(cache.write_target(), 1);
        assert_eq!(cache.read_target(), 0);
        run(&mut cache, &[1], Read);
        run(&mut cache, &[2], Write);
        run(&mut cache, &[3], Read);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(3));
        assert_eq!(cache.counters().evicted_dirty_pages, 1);
    }

    #[test]
    fn cacheus_reset_run_keeps_contents() {
        let mut cache = CacheusPolicy::new(4);
        run(&mut cache, &[1, 1, 2], Read);
        cache.reset_run();
        assert_eq!(cache.counters().calls, 0);
        assert_eq!(cache.counters().hits, 0);
        assert_eq!(cache.lifetime().hits, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cacheus_name_in_report() {
        let cache = CacheusPolicy::new(3);
        let mut out = Vec::new();
        cache.report_hits(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("CACHEUS CacheSize 3 calls 0 "));
    }
}
