//! Frequency buckets for LFU tracking.
//!
//! An ascending map from access frequency to a bucket of keys. Each bucket is
//! an [`IntrusiveList`] ordered MRU → LRU, so ties at the lowest frequency are
//! broken by recency: `pop_min` takes the back of the first bucket.
//!
//! ```text
//!   index: FxHashMap<K, (freq, SlotId)>
//!
//!   buckets: BTreeMap<u64, IntrusiveList<K>>
//!     freq=1: head ─► [c] ◄──► [b] ◄── tail   (pop_min evicts b)
//!     freq=3: head ─► [a] ◄── tail
//! ```
//!
//! ## Operations
//!
//! | Operation  | Time       | Notes                                  |
//! |------------|------------|----------------------------------------|
//! | `insert`   | O(log F)   | New key starts at freq=1, front        |
//! | `touch`    | O(log F)   | freq+1, front of the new bucket        |
//! | `pop_min`  | O(log F)   | LRU of the lowest-frequency bucket     |
//!
//! `F` is the number of distinct live frequencies, not the number of keys.
//! Empty buckets are removed immediately, so the first map entry is always
//! the minimum live frequency.
use std::collections::BTreeMap;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    freq: u64,
    slot: SlotId,
}

#[derive(Debug)]
pub struct FrequencyBuckets<K> {
    buckets: BTreeMap<u64, IntrusiveList<K>>,
    index: FxHashMap<K, Position>,
}

impl<K> FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.index.get(key).map(|pos| pos.freq)
    }

    /// Lowest live frequency.
    pub fn min_freq(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    /// Tracks `key` at frequency 1. Returns `false` if it was already tracked.
    pub fn insert(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let slot = self.buckets.entry(1).or_default().push_front(key.clone());
        self.index.insert(key, Position { freq: 1, slot });
        true
    }

    /// Increments the frequency of `key` and returns the new frequency.
    ///
    /// `Ok(None)` means `key` is not tracked. An index entry that does not
    /// resolve to `key` in its bucket is reported as an error.
    pub fn touch(&mut self, key: &K) -> Result<Option<u64>, InvariantError> {
        let Some(&pos) = self.index.get(key) else {
            return Ok(None);
        };
        match self.unlink(pos) {
            Some(unlinked) if unlinked == *key => {},
            _ => {
                return Err(InvariantError::new(format!(
                    "frequency index entry at freq {} does not resolve to its key",
                    pos.freq
                )));
            },
        }
        let freq = pos.freq.saturating_add(1);
        let slot = self.buckets.entry(freq).or_default().push_front(key.clone());
        self.index.insert(key.clone(), Position { freq, slot });
        Ok(Some(freq))
    }

    /// Removes the least recently touched key of the lowest frequency.
    pub fn pop_min(&mut self) -> Option<(K, u64)> {
        let mut entry = self.buckets.first_entry()?;
        let freq = *entry.key();
        let key = entry.get_mut().pop_back()?;
        if entry.get().is_empty() {
            entry.remove();
        }
        self.index.remove(&key);
        Some((key, freq))
    }

    /// Iterates `(key, freq)` by ascending frequency, MRU first within a bucket.
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.buckets
            .iter()
            .flat_map(|(&freq, bucket)| bucket.iter().map(move |key| (key, freq)))
    }

    fn unlink(&mut self, pos: Position) -> Option<K> {
        let bucket = self.buckets.get_mut(&pos.freq)?;
        let key = bucket.remove(pos.slot)?;
        if bucket.is_empty() {
            self.buckets.remove(&pos.freq);
        }
        Some(key)
    }

    /// Cross-checks buckets against the key index.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut total = 0usize;
        for (&freq, bucket) in &self.buckets {
            if freq == 0 {
                return Err(InvariantError::new("bucket at frequency zero"));
            }
            if bucket.is_empty() {
                return Err(InvariantError::new(format!(
                    "empty bucket left at freq {freq}"
                )));
            }
            total += bucket.len();
        }
        if total != self.index.len() {
            return Err(InvariantError::new(format!(
                "buckets hold {total} keys but the index has {}",
                self.index.len()
            )));
        }
        for (key, pos) in &self.index {
            let resolved = self
                .buckets
                .get(&pos.freq)
                .and_then(|bucket| bucket.get(pos.slot));
            if resolved != Some(key) {
                return Err(InvariantError::new(format!(
                    "index entry at freq {} points at the wrong node",
                    pos.freq
                )));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn swap_positions(&mut self, a: &K, b: &K) {
        let pa = self.index[a];
        let pb = self.index[b];
        self.index.insert(a.clone(), pb);
        self.index.insert(b.clone(), pa);
    }
}

impl<K> Default for FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
