//! Low Inter-reference Recency Set (LIRS) engine.
//!
//! Separates resident blocks into a small high-value set, blocks that were
//! re-referenced while still resident, and resident-ordinary candidates that
//! absorb one-time traffic. Evicted ordinary blocks are remembered in a
//! bounded history so a quick return can be recognised.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            LirsPolicy Layout                             │
//! │                                                                          │
//! │   entries: FxHashMap<BlockKey, Entry { status, stack, queue, dirty }>    │
//! │                                                                          │
//! │   stack (recency stack, every unpruned key)                              │
//! │   top [7] ◄──► [3] ◄──► [9] ◄──► [2] bottom   bottom is kept high-value  │
//! │                                                                          │
//! │   lir (high-value set, MRU → LRU)        candidates (newest → oldest)    │
//! │   ┌──────────────────────────┐           ┌──────────────────────────┐    │
//! │   │ [3] ◄──► [2]             │           │ [7] ◄──► [9]        ─────┼──► evict
//! │   └──────────────────────────┘           └──────────────────────────┘    │
//! │                                                                          │
//! │   history: GhostList (non-resident ordinary keys, capacity C)            │
//! │                                                                          │
//! │   |lir| + |candidates| <= C     |lir| <= lir_target     |history| <= C   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference protocol
//!
//! Every reference moves the key to the top of the stack, then:
//!
//! | Status of `x`        | Effect                                                |
//! |----------------------|-------------------------------------------------------|
//! | high-value           | hit; prune                                            |
//! | resident-ordinary    | hit; promote if the set has room, else see below      |
//! | non-resident / new   | miss; evict oldest candidate if full; insert ordinary |
//!
//! When the high-value set is full, [`LirDemotion::Bounded`] promotes the key
//! and demotes the least recently referenced high-value key to the newest
//! candidate. [`LirDemotion::Disabled`] leaves the key ordinary.
//!
//! Pruning pops entries from the stack bottom until a high-value key is there.
//! A history overflow forgets the dropped key entirely, stack entry included.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ds::{GhostList, IntrusiveList, SlotId, prealloc};
use crate::error::{ConfigError, InvariantError, check_capacity, check_fraction};
use crate::stats::{Accounting, LifetimeTotals, RunCounters};
use crate::traits::{AccessType, BlockKey, ReplacementPolicy};

const NAME: &str = "LIRS";

/// Default share of the capacity targeted at the high-value set.
pub const DEFAULT_LIR_FRACTION: f64 = 0.01;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LirsStatus {
    /// Member of the high-value set.
    HighValue,
    /// Resident, eligible for eviction.
    ResidentOrdinary,
    /// Evicted, still remembered in history.
    NonResident,
}

impl LirsStatus {
    #[inline]
    pub fn is_resident(self) -> bool {
        !matches!(self, LirsStatus::NonResident)
    }
}

/// What happens when a resident-ordinary key is hit while the high-value set
/// is already at its target size.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LirDemotion {
    /// Promote the key and demote the least recently referenced high-value key.
    #[default]
    Bounded,
    /// Keep the key ordinary.
    Disabled,
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    status: LirsStatus,
    /// Node in `stack`, if not pruned.
    stack: Option<SlotId>,
    /// Node in `lir` or `candidates`, matching `status`.
    queue: Option<SlotId>,
    dirty: bool,
}

pub struct LirsPolicy {
    entries: FxHashMap<BlockKey, Entry>,
    stack: IntrusiveList<BlockKey>,
    lir: IntrusiveList<BlockKey>,
    candidates: IntrusiveList<BlockKey>,
    history: GhostList<BlockKey>,
    lir_target: usize,
    demotion: LirDemotion,
    capacity: usize,
    acct: Accounting,
}

impl LirsPolicy {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, DEFAULT_LIR_FRACTION, LirDemotion::default())
    }

    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        Self::try_with_config(capacity, DEFAULT_LIR_FRACTION, LirDemotion::default())
    }

    /// # Panics
    ///
    /// Panics on invalid parameters. See [`try_with_config`](Self::try_with_config).
    pub fn with_config(capacity: usize, lir_fraction: f64, demotion: LirDemotion) -> Self {
        match Self::try_with_config(capacity, lir_fraction, demotion) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    /// Sets `lir_target = clamp(round(lir_fraction * C), 1, C)`.
    ///
    /// # Errors
    ///
    /// `capacity == 0`, or `lir_fraction` outside `[0.0, 1.0]`.
    pub fn try_with_config(
        capacity: usize,
        lir_fraction: f64,
        demotion: LirDemotion,
    ) -> Result<Self, ConfigError> {
        check_capacity(capacity)?;
        check_fraction("lir_fraction", lir_fraction)?;

        let lir_target = ((lir_fraction * capacity as f64).round() as usize).clamp(1, capacity);
        let reserve = prealloc(capacity);
        Ok(Self {
            entries: FxHashMap::with_capacity_and_hasher(
                prealloc(capacity.saturating_mul(2)),
                Default::default(),
            ),
            stack: IntrusiveList::with_capacity(reserve),
            lir: IntrusiveList::with_capacity(prealloc(lir_target)),
            candidates: IntrusiveList::with_capacity(reserve),
            history: GhostList::new(capacity),
            lir_target,
            demotion,
            capacity,
            acct: Accounting::default(),
        })
    }

    pub fn lir_len(&self) -> usize {
        self.lir.len()
    }

    pub fn lir_target(&self) -> usize {
        self.lir_target
    }

    pub fn demotion(&self) -> LirDemotion {
        self.demotion
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn status_of(&self, key: BlockKey) -> Option<LirsStatus> {
        self.entries.get(&key).map(|e| e.status)
    }

    #[inline]
    fn resident_len(&self) -> usize {
        self.lir.len() + self.candidates.len()
    }

    fn entry(&self, key: BlockKey) -> Result<Entry, InvariantError> {
        self.entries
            .get(&key)
            .copied()
            .ok_or_else(|| InvariantError::new(format!("LIRS: key {key} is not indexed")))
    }

    fn entry_mut(&mut self, key: BlockKey) -> Result<&mut Entry, InvariantError> {
        self.entries
            .get_mut(&key)
            .ok_or_else(|| InvariantError::new(format!("LIRS: key {key} is not indexed")))
    }

    fn missing_node(key: BlockKey, list: &str) -> InvariantError {
        InvariantError::new(format!("LIRS: key {key} has no node in {list}"))
    }

    /// Moves `key` to the top of the recency stack, re-adding it if pruned.
    fn touch_stack(&mut self, key: BlockKey) -> Result<(), InvariantError> {
        match self.entry(key)?.stack {
            Some(slot) => {
                if !self.stack.move_to_front(slot) {
                    return Err(Self::missing_node(key, "stack"));
                }
            },
            None => {
                let slot = self.stack.push_front(key);
                self.entry_mut(key)?.stack = Some(slot);
            },
        }
        Ok(())
    }

    fn promote(&mut self, key: BlockKey) -> Result<(), InvariantError> {
        let slot = self
            .entry(key)?
            .queue
            .ok_or_else(|| Self::missing_node(key, "candidates"))?;
        if self.candidates.remove(slot) != Some(key) {
            return Err(Self::missing_node(key, "candidates"));
        }
        let slot = self.lir.push_front(key);
        let entry = self.entry_mut(key)?;
        entry.status = LirsStatus::HighValue;
        entry.queue = Some(slot);
        tracing::debug!(policy = NAME, key, "promoted to high-value set");
        Ok(())
    }

    fn demote_lru_lir(&mut self) -> Result<(), InvariantError> {
        let key = self
            .lir
            .pop_back()
            .ok_or_else(|| InvariantError::new("LIRS: demotion requested with an empty high-value set"))?;
        let slot = self.candidates.push_front(key);
        let entry = self.entry_mut(key)?;
        entry.status = LirsStatus::ResidentOrdinary;
        entry.queue = Some(slot);
        tracing::debug!(policy = NAME, key, "demoted from high-value set");
        Ok(())
    }

    /// Pops stack entries until a high-value key sits at the bottom.
    fn prune(&mut self) {
        while let Some(&bottom) = self.stack.back() {
            match self.entries.get_mut(&bottom) {
                Some(entry) if entry.status == LirsStatus::HighValue => break,
                Some(entry) => entry.stack = None,
                None => {},
            }
            self.stack.pop_back();
        }
    }

    /// Evicts the oldest candidate into history.
    fn evict(&mut self) -> Result<(), InvariantError> {
        if self.candidates.is_empty() {
            if self.lir.is_empty() {
                return Err(InvariantError::new(
                    "LIRS: eviction required but no block is resident",
                ));
            }
            self.demote_lru_lir()?;
            self.prune();
        }

        let victim = self
            .candidates
            .pop_back()
            .ok_or_else(|| InvariantError::new("LIRS: candidate list lost its oldest node"))?;
        let dirty = {
            let entry = self.entry_mut(victim)?;
            entry.status = LirsStatus::NonResident;
            entry.queue = None;
            std::mem::take(&mut entry.dirty)
        };
        if dirty {
            self.acct.dirty_eviction();
        }
        tracing::debug!(policy = NAME, victim, dirty, "evicted resident block");

        if let Some(dropped) = self.history.record(victim) {
            self.forget(dropped);
        }
        Ok(())
    }

    /// Erases every trace of `key`.
    fn forget(&mut self, key: BlockKey) {
        if let Some(entry) = self.entries.remove(&key) {
            if let Some(slot) = entry.stack {
                self.stack.remove(slot);
            }
        }
        tracing::trace!(policy = NAME, key, "dropped history record");
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.resident_len() > self.capacity {
            return Err(InvariantError::new(format!(
                "resident count {} exceeds capacity {}",
                self.resident_len(),
                self.capacity
            )));
        }
        if self.lir.len() > self.lir_target {
            return Err(InvariantError::new(format!(
                "high-value set size {} exceeds target {}",
                self.lir.len(),
                self.lir_target
            )));
        }
        if self.history.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "history size {} exceeds capacity {}",
                self.history.len(),
                self.capacity
            )));
        }

        let queues = [
            (&self.lir, LirsStatus::HighValue),
            (&self.candidates, LirsStatus::ResidentOrdinary),
        ];
        for (list, status) in queues {
            for (slot, &key) in list.iter_entries() {
                match self.entries.get(&key) {
                    Some(e) if e.status == status && e.queue == Some(slot) => {},
                    _ => {
                        return Err(InvariantError::new(format!(
                            "key {key} queued as {status:?} disagrees with its index entry"
                        )));
                    },
                }
            }
        }
        for (slot, &key) in self.stack.iter_entries() {
            if self.entries.get(&key).and_then(|e| e.stack) != Some(slot) {
                return Err(InvariantError::new(format!(
                    "stack node of key {key} disagrees with its index entry"
                )));
            }
        }
        for &key in self.history.iter() {
            if self.status_of(key) != Some(LirsStatus::NonResident) {
                return Err(InvariantError::new(format!(
                    "history key {key} is not marked non-resident"
                )));
            }
        }

        let non_resident = self
            .entries
            .values()
            .filter(|e| e.status == LirsStatus::NonResident)
            .count();
        if non_resident != self.history.len()
            || self.entries.len() != self.resident_len() + non_resident
        {
            return Err(InvariantError::new(format!(
                "{} indexed keys but {} resident and {} in history",
                self.entries.len(),
                self.resident_len(),
                self.history.len()
            )));
        }
        if self.entries.values().any(|e| e.dirty && !e.status.is_resident()) {
            return Err(InvariantError::new("non-resident key carries a dirty flag"));
        }
        Ok(())
    }
}

impl fmt::Debug for LirsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LirsPolicy")
            .field("capacity", &self.capacity)
            .field("lir_len", &self.lir.len())
            .field("lir_target", &self.lir_target)
            .field("candidates", &self.candidates.len())
            .field("stack_len", &self.stack.len())
            .field("history_len", &self.history.len())
            .field("demotion", &self.demotion)
            .finish_non_exhaustive()
    }
}

impl ReplacementPolicy for LirsPolicy {
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
        self.status_of(key).is_some_and(LirsStatus::is_resident)
    }

    fn is_dirty(&self, key: BlockKey) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|e| e.status.is_resident() && e.dirty)
    }

    fn reference(&mut self, key: BlockKey, access: AccessType) -> Result<(), InvariantError> {
        self.acct.call();
        tracing::trace!(policy = NAME, key, %access, "reference");

        match self.status_of(key) {
            Some(LirsStatus::HighValue) => {
                self.acct.hit(access);
                let entry = self.entry_mut(key)?;
                entry.dirty |= access.is_write();
                let slot = entry.queue.ok_or_else(|| Self::missing_node(key, "lir"))?;
                if !self.lir.move_to_front(slot) {
                    return Err(Self::missing_node(key, "lir"));
                }
                self.touch_stack(key)?;
                self.prune();
            },
            Some(LirsStatus::ResidentOrdinary) => {
                self.acct.hit(access);
                let entry = self.entry_mut(key)?;
                entry.dirty |= access.is_write();
                let slot = entry.queue.ok_or_else(|| Self::missing_node(key, "candidates"))?;
                self.touch_stack(key)?;

                if self.lir.len() < self.lir_target {
                    self.promote(key)?;
                    self.prune();
                } else {
                    match self.demotion {
                        LirDemotion::Bounded => {
                            self.promote(key)?;
                            self.demote_lru_lir()?;
                            self.prune();
                        },
                        LirDemotion::Disabled => {
                            if !self.candidates.move_to_front(slot) {
                                return Err(Self::missing_node(key, "candidates"));
                            }
                        },
                    }
                }
            },
            status => {
                if status.is_some() {
                    self.history.remove(&key);
                }
                if self.resident_len() >= self.capacity {
                    self.evict()?;
                }
                let queue = self.candidates.push_front(key);
                let stack = self.entries.get(&key).and_then(|e| e.stack);
                self.entries.insert(key, Entry {
                    status: LirsStatus::ResidentOrdinary,
                    stack,
                    queue: Some(queue),
                    dirty: access.is_write(),
                });
                self.touch_stack(key)?;
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
        self.lir.iter().chain(self.candidates.iter()).copied().collect()
    }
}
