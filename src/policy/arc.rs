//! Adaptive Replacement Cache (ARC) engine.
//!
//! Balances recency against frequency with two resident lists, two ghost
//! lists and an adaptive pivot `p`, the target size of L1.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ArcPolicy Layout                              │
//! │                                                                         │
//! │   entries: FxHashMap<BlockKey, Entry { list, slot, dirty }>             │
//! │                                                                         │
//! │   L1 (seen once)                      L2 (seen at least twice)          │
//! │   ┌──────────────────────────┐        ┌──────────────────────────┐      │
//! │   │ MRU                 LRU  │        │ MRU                 LRU  │      │
//! │   │ [5] ◄──► [4] ◄──► [3] ─┐ │        │ [1] ◄──► [...]        ─┐ │      │
//! │   └────────────────────────┼─┘        └────────────────────────┼─┘      │
//! │                            ▼ evict                             ▼ evict  │
//! │   T1 (ghosts of L1)                   T2 (ghosts of L2)                 │
//! │   ┌──────────────────────────┐        ┌──────────────────────────┐      │
//! │   │ keys only, no dirty bit  │        │ keys only, no dirty bit  │      │
//! │   └──────────────────────────┘        └──────────────────────────┘      │
//! │                                                                         │
//! │   |L1| + |L2| <= C        |T1| + |T2| <= C        0 <= p <= C           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transitions
//!
//! | Reference of `x`   | Effect                                                  |
//! |--------------------|---------------------------------------------------------|
//! | hit in L1 or L2    | hit; move to MRU of L2                                  |
//! | ghost hit in T1    | `p += 1` (max C); replace if full; insert at MRU of L2  |
//! | ghost hit in T2    | `p -= 1` (min 0); replace if full; insert at MRU of L2  |
//! | miss               | replace if full; insert at MRU of L1                    |
//!
//! Replacement evicts the LRU of L1 into T1 when `|L1| > p`, otherwise the
//! LRU of L2 into T2. If the chosen list is empty the other one is used; this
//! only happens when `p == C`. Ghost lists are trimmed afterwards, T2 first.
//!
//! Ghost hits are misses for hit accounting.
//!
//! ## Example
//!
//! ```
//! use evictsim::policy::arc::{ArcList, ArcPolicy};
//! use evictsim::{AccessType, ReplacementPolicy};
//!
//! let mut arc = ArcPolicy::new(2);
//! arc.reference(1, AccessType::Read).unwrap();
//! arc.reference(1, AccessType::Read).unwrap();
//! assert_eq!(arc.list_of(1), Some(ArcList::L2));
//! assert_eq!(arc.counters().hits, 1);
//! ```

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId, prealloc};
use crate::error::{ConfigError, InvariantError, check_capacity};
use crate::stats::{Accounting, LifetimeTotals, RunCounters};
use crate::traits::{AccessType, BlockKey, ReplacementPolicy};

const NAME: &str = "ARC";

/// List a key currently occupies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArcList {
    /// Resident, referenced once.
    L1,
    /// Resident, referenced at least twice.
    L2,
    /// Ghost of an L1 eviction.
    T1,
    /// Ghost of an L2 eviction.
    T2,
}

impl ArcList {
    #[inline]
    pub fn is_resident(self) -> bool {
        matches!(self, ArcList::L1 | ArcList::L2)
    }
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    list: ArcList,
    slot: SlotId,
    dirty: bool,
}

pub struct ArcPolicy {
    entries: FxHashMap<BlockKey, Entry>,
    l1: IntrusiveList<BlockKey>,
    l2: IntrusiveList<BlockKey>,
    t1: IntrusiveList<BlockKey>,
    t2: IntrusiveList<BlockKey>,
    /// Target size of L1.
    p: usize,
    capacity: usize,
    acct: Accounting,
}

impl ArcPolicy {
    /// Creates an ARC engine with pivot `p = 0`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`. See [`try_new`](Self::try_new).
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        Self::try_with_initial_p(capacity, 0)
    }

    /// Creates an engine whose pivot starts at `initial_p`, clamped to `C`.
    pub fn try_with_initial_p(capacity: usize, initial_p: usize) -> Result<Self, ConfigError> {
        check_capacity(capacity)?;
        let reserve = prealloc(capacity);
        Ok(Self {
            entries: FxHashMap::with_capacity_and_hasher(
                prealloc(capacity.saturating_mul(2)),
                Default::default(),
            ),
            l1: IntrusiveList::with_capacity(reserve),
            l2: IntrusiveList::with_capacity(reserve),
            t1: IntrusiveList::new(),
            t2: IntrusiveList::new(),
            p: initial_p.min(capacity),
            capacity,
            acct: Accounting::default(),
        })
    }

    /// Current pivot: the adaptive target size of L1.
    pub fn p(&self) -> usize {
        self.p
    }

    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    pub fn l2_len(&self) -> usize {
        self.l2.len()
    }

    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    /// Which list `key` occupies, resident or ghost.
    pub fn list_of(&self, key: BlockKey) -> Option<ArcList> {
        self.entries.get(&key).map(|e| e.list)
    }

    #[inline]
    fn resident_len(&self) -> usize {
        self.l1.len() + self.l2.len()
    }

    #[inline]
    fn ghost_len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn list(&self, kind: ArcList) -> &IntrusiveList<BlockKey> {
        match kind {
            ArcList::L1 => &self.l1,
            ArcList::L2 => &self.l2,
            ArcList::T1 => &self.t1,
            ArcList::T2 => &self.t2,
        }
    }

    fn list_mut(&mut self, kind: ArcList) -> &mut IntrusiveList<BlockKey> {
        match kind {
            ArcList::L1 => &mut self.l1,
            ArcList::L2 => &mut self.l2,
            ArcList::T1 => &mut self.t1,
            ArcList::T2 => &mut self.t2,
        }
    }

    fn link_front(&mut self, key: BlockKey, list: ArcList, dirty: bool) {
        let slot = self.list_mut(list).push_front(key);
        self.entries.insert(key, Entry { list, slot, dirty });
    }

    /// Removes `key` from its list and from the index together.
    fn unlink(&mut self, key: BlockKey) -> Result<Entry, InvariantError> {
        let entry = self
            .entries
            .remove(&key)
            .ok_or_else(|| InvariantError::new(format!("ARC: key {key} is not indexed")))?;
        match self.list_mut(entry.list).remove(entry.slot) {
            Some(found) if found == key => Ok(entry),
            _ => Err(InvariantError::new(format!(
                "ARC: index entry of key {key} does not match its {:?} node",
                entry.list
            ))),
        }
    }

    /// Evicts one resident block into its ghost list.
    fn replace(&mut self) -> Result<(), InvariantError> {
        let (source, ghost) = if self.l1.len() > self.p || self.l2.is_empty() {
            (ArcList::L1, ArcList::T1)
        } else {
            (ArcList::L2, ArcList::T2)
        };

        let victim = self.list_mut(source).pop_back().ok_or_else(|| {
            InvariantError::new("ARC: replacement required but no resident block exists")
        })?;
        let entry = self.entries.remove(&victim).ok_or_else(|| {
            InvariantError::new(format!("ARC: evicted key {victim} was not indexed"))
        })?;
        if entry.list != source {
            return Err(InvariantError::new(format!(
                "ARC: key {victim} found in {source:?} but tagged {:?}",
                entry.list
            )));
        }

        if entry.dirty {
            self.acct.dirty_eviction();
        }
        self.link_front(victim, ghost, false);
        tracing::debug!(
            policy = NAME,
            victim,
            from = ?source,
            dirty = entry.dirty,
            p = self.p,
            "evicted resident block"
        );

        self.trim_ghosts(self.capacity);
        Ok(())
    }

    /// Drops ghost records, T2 LRU first, until `|T1| + |T2| <= limit`.
    fn trim_ghosts(&mut self, limit: usize) {
        while self.ghost_len() > limit {
            let Some(dropped) = self.t2.pop_back().or_else(|| self.t1.pop_back()) else {
                break;
            };
            self.entries.remove(&dropped);
            tracing::trace!(policy = NAME, key = dropped, "dropped ghost record");
        }
    }

    /// Validates list/index consistency and the size bounds.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.resident_len() > self.capacity {
            return Err(InvariantError::new(format!(
                "resident count {} exceeds capacity {}",
                self.resident_len(),
                self.capacity
            )));
        }
        if self.ghost_len() > self.capacity {
            return Err(InvariantError::new(format!(
                "ghost count {} exceeds capacity {}",
                self.ghost_len(),
                self.capacity
            )));
        }
        if self.p > self.capacity {
            return Err(InvariantError::new(format!(
                "p {} exceeds capacity {}",
                self.p, self.capacity
            )));
        }

        let mut listed = 0usize;
        for kind in [ArcList::L1, ArcList::L2, ArcList::T1, ArcList::T2] {
            for (slot, &key) in self.list(kind).iter_entries() {
                listed += 1;
                match self.entries.get(&key) {
                    Some(entry) if entry.list == kind && entry.slot == slot => {
                        if !kind.is_resident() && entry.dirty {
                            return Err(InvariantError::new(format!(
                                "ghost key {key} carries a dirty flag"
                            )));
                        }
                    },
                    Some(entry) => {
                        return Err(InvariantError::new(format!(
                            "key {key} listed in {kind:?} but indexed as {:?}",
                            entry.list
                        )));
                    },
                    None => {
                        return Err(InvariantError::new(format!(
                            "key {key} listed in {kind:?} but not indexed"
                        )));
                    },
                }
            }
        }
        if listed != self.entries.len() {
            return Err(InvariantError::new(format!(
                "{} indexed keys but {} listed",
                self.entries.len(),
                listed
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ArcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArcPolicy")
            .field("capacity", &self.capacity)
            .field("p", &self.p)
            .field("l1_len", &self.l1.len())
            .field("l2_len", &self.l2.len())
            .field("t1_len", &self.t1.len())
            .field("t2_len", &self.t2.len())
            .finish_non_exhaustive()
    }
}

impl ReplacementPolicy for ArcPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.resident_len()
    }

    fn contains(&self, key: BlockKey) -> bool {
        self.list_of(key).is_some_and(ArcList::is_resident)
    }

    fn is_dirty(&self, key: BlockKey) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|e| e.list.is_resident() && e.dirty)
    }

    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError> {
        self.acct.call();
        tracing::trace!(policy = NAME, key, %access, "reference");

        match self.list_of(key) {
            Some(ArcList::L1 | ArcList::L2) => {
                self.acct.hit(access);
                let entry = self.unlink(key)?;
                self.link_front(key, ArcList::L2, entry.dirty || access.is_write());
            },
            Some(ghost @ (ArcList::T1 | ArcList::T2)) => {
                self.p = match ghost {
                    ArcList::T1 => self.p.saturating_add(1).min(self.capacity),
                    _ => self.p.saturating_sub(1),
                };
                tracing::debug!(policy = NAME, key, ghost = ?ghost, p = self.p, "ghost hit");
                self.unlink(key)?;
                if self.resident_len() >= self.capacity {
                    self.replace()?;
                }
                self.link_front(key, ArcList::L2, access.is_write());
                self.trim_ghosts(self.capacity);
            },
            None => {
                let resident = self.resident_len();
                if resident >= self.capacity {
                    self.replace()?;
                } else if resident + self.ghost_len() >= self.capacity {
                    self.trim_ghosts(self.capacity - resident - 1);
                }
                self.link_front(key, ArcList::L1, access.is_write());
            },
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
        self.l1.iter().chain(self.l2.iter()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AccessType::{Read, Write};

    fn run(arc: &mut ArcPolicy, keys: &[BlockKey], access: AccessType) {
        for &key in keys {
            arc.reference(key, access).unwrap();
            arc.check_invariants().unwrap();
        }
    }

    #[test]
    fn arc_new_engine() {
        let arc = ArcPolicy::new(8);
        assert_eq!(arc.capacity(), 8);
        assert_eq!(arc.p(), 0);
        assert!(arc.is_empty());
        assert_eq!(arc.name(), "ARC");
    }

    #[test]
    fn arc_zero_capacity_is_rejected() {
        assert!(ArcPolicy::try_new(0).is_err());
    }

    #[test]
    fn arc_huge_capacity_builds_lazily() {
        let mut arc = ArcPolicy::try_new(usize::MAX).unwrap();
        run(&mut arc, &[1, 2, 1], Read);
        assert_eq!(arc.l2_len(), 1);
        assert_eq!(arc.len(), 2);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn arc_new_panics_on_zero_capacity() {
        let _ = ArcPolicy::new(0);
    }

    #[test]
    fn arc_initial_p_is_clamped() {
        let arc = ArcPolicy::try_with_initial_p(4, 10).unwrap();
        assert_eq!(arc.p(), 4);
    }

    #[test]
    fn arc_second_reference_promotes_to_l2() {
        let mut arc = ArcPolicy::new(4);
        run(&mut arc, &[1], Read);
        assert_eq!(arc.list_of(1), Some(ArcList::L1));
        run(&mut arc, &[1], Read);
        assert_eq!(arc.list_of(1), Some(ArcList::L2));
        run(&mut arc, &[1], Read);
        assert_eq!(arc.list_of(1), Some(ArcList::L2));
        assert_eq!(arc.counters().hits, 2);
        assert_eq!(arc.len(), 1);
    }

    #[test]
    fn arc_miss_when_full_evicts_l1_while_above_pivot() {
        let mut arc = ArcPolicy::new(4);
        run(&mut arc, &[1, 2, 3, 4, 1], Read);
        assert_eq!(arc.l1_len(), 3);
        assert_eq!(arc.l2_len(), 1);
        assert_eq!(arc.counters().hits, 1);

        run(&mut arc, &[5], Read);
        assert_eq!(arc.list_of(2), Some(ArcList::T1));
        assert_eq!(arc.list_of(1), Some(ArcList::L2));
        assert_eq!(arc.list_of(5), Some(ArcList::L1));
        assert_eq!(arc.t1_len(), 1);
        assert_eq!(arc.t2_len(), 0);
        assert_eq!(arc.len(), 4);
        assert!(!arc.contains(2));
    }

    #[test]
    fn arc_ghost_hit_in_t1_grows_pivot() {
        let mut arc = ArcPolicy::new(4);
        run(&mut arc, &[1, 2, 3, 4, 1, 5], Read);
        assert_eq!(arc.list_of(2), Some(ArcList::T1));

        run(&mut arc, &[2], Read);
        assert_eq!(arc.p(), 1);
        assert_eq!(arc.list_of(2), Some(ArcList::L2));
        assert_eq!(arc.list_of(3), Some(ArcList::T1));
        assert_eq!(arc.counters().hits, 1, "ghost hit is not a cache hit");
        assert_eq!(arc.counters().calls, 7);
    }

    #[test]
    fn arc_ghost_hit_in_t2_shrinks_pivot() {
        let mut arc = ArcPolicy::try_with_initial_p(2, 1).unwrap();
        run(&mut arc, &[1, 1, 2, 2, 3], Read);
        assert_eq!(arc.list_of(1), Some(ArcList::T2));

        run(&mut arc, &[1], Read);
        assert_eq!(arc.p(), 0);
        assert_eq!(arc.list_of(1), Some(ArcList::L2));
        assert_eq!(arc.list_of(3), Some(ArcList::T1));
        assert_eq!(arc.t2_len(), 0);
    }

    #[test]
    fn arc_pivot_never_leaves_bounds() {
        let mut arc = ArcPolicy::new(2);
        for round in 0..20u64 {
            run(&mut arc, &[round * 3, round * 3 + 1, round * 3 + 2, round * 3], Read);
            assert!(arc.p() <= arc.capacity());
        }
    }

    #[test]
    fn arc_single_slot_falls_back_to_l1_when_l2_empty() {
        let mut arc = ArcPolicy::new(1);
        run(&mut arc, &[1, 2], Read);
        assert_eq!(arc.list_of(1), Some(ArcList::T1));

        run(&mut arc, &[1], Read);
        assert_eq!(arc.p(), 1);
        assert_eq!(arc.list_of(1), Some(ArcList::L2));
        assert_eq!(arc.list_of(2), Some(ArcList::T1));
        assert_eq!(arc.len(), 1);
    }

    #[test]
    fn arc_ghost_lists_stay_within_capacity() {
        let mut arc = ArcPolicy::new(3);
        run(&mut arc, &(0..50).collect::<Vec<_>>(), Read);
        assert_eq!(arc.len(), 3);
        assert!(arc.t1_len() + arc.t2_len() <= 3);
    }

    #[test]
    fn arc_dirty_eviction_counted_once() {
        let mut arc = ArcPolicy::new(1);
        run(&mut arc, &[1], Write);
        assert!(arc.is_dirty(1));
        run(&mut arc, &[2, 3, 4], Read);
        assert_eq!(arc.counters().evicted_dirty_pages, 1);
        assert!(!arc.is_dirty(1));
    }

    #[test]
    fn arc_read_only_eviction_is_clean() {
        let mut arc = ArcPolicy::new(2);
        run(&mut arc, &[1, 2, 3, 4, 5], Read);
        assert_eq!(arc.counters().evicted_dirty_pages, 0);
    }

    #[test]
    fn arc_write_hit_marks_dirty_and_read_hit_keeps_it() {
        let mut arc = ArcPolicy::new(2);
        run(&mut arc, &[1], Read);
        assert!(!arc.is_dirty(1));
        run(&mut arc, &[1], Write);
        assert!(arc.is_dirty(1));
        run(&mut arc, &[1], Read);
        assert!(arc.is_dirty(1));
        assert_eq!(arc.counters().read_hits, 1);
        assert_eq!(arc.counters().write_hits, 1);
    }

    #[test]
    fn arc_reset_run_keeps_contents() {
        let mut arc = ArcPolicy::new(2);
        run(&mut arc, &[1, 2, 1], Read);
        arc.reset_run();
        assert_eq!(arc.counters().calls, 0);
        assert_eq!(arc.counters().hits, 0);
        assert_eq!(arc.lifetime().calls, 3);
        assert!(arc.contains(1) && arc.contains(2));

        run(&mut arc, &[2], Read);
        assert_eq!(arc.counters().hits, 1);
    }

    #[test]
    fn arc_report_hits_writes_one_line() {
        let mut arc = ArcPolicy::new(4);
        run(&mut arc, &[1, 1], Read);
        let mut out = Vec::new();
        let stats = arc.report_hits(&mut out).unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ARC CacheSize 4 calls 2 hits 1 hitRatio 0.5 readHits 1 readHitRatio 0.5 \
             writeHits 0 writeHitRatio 0 evictedDirtyPage 0\n"
        );
    }

    #[test]
    fn arc_dump_lists_resident_keys() {
        let mut arc = ArcPolicy::new(2);
        run(&mut arc, &[1, 2, 3], Read);
        let mut out = Vec::new();
        arc.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("ARC cached keys:"));
        assert!(text.contains(" 2") && text.contains(" 3"));
        assert!(!text.contains(" 1"));
    }
}
