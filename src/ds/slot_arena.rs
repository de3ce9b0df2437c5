//! Slot arena with stable `u32` handles.
//!
//! Nodes of every engine list live here. A [`SlotId`] stays valid until the
//! slot is removed; freed slots are recycled LIFO, so a stale id may later
//! name a different value. Engines never keep an id past the removal of the
//! key that owns it.

/// Stable handle into a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u32);

impl SlotId {
    /// Returns the raw slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its handle, reusing a freed slot if any.
    pub fn insert(&mut self, value: T) -> SlotId {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(value);
                idx
            },
            None => {
                let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                assert!(idx < u32::MAX, "slot arena exhausted");
                self.slots.push(Some(value));
                idx
            },
        };
        self.len += 1;
        SlotId(idx)
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let value = self.slots.get_mut(id.index())?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_arena_insert_remove_reuse() {
        let mut arena = SlotArena::new();
        let id1 = arena.insert(10u64);
        let id2 = arena.insert(20u64);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(id1), Some(&10));
        assert_eq!(arena.get(id2), Some(&20));

        assert_eq!(arena.remove(id1), Some(10));
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(id1));

        let id3 = arena.insert(30);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(id3), Some(&30));
        assert_eq!(id1.index(), id3.index());
    }

    #[test]
    fn slot_arena_double_remove_is_none() {
        let mut arena = SlotArena::new();
        let id = arena.insert(1u64);
        assert_eq!(arena.remove(id), Some(1));
        assert_eq!(arena.remove(id), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn slot_arena_get_mut_updates_in_place() {
        let mut arena = SlotArena::with_capacity(4);
        let id = arena.insert(5u64);
        if let Some(v) = arena.get_mut(id) {
            *v = 6;
        }
        assert_eq!(arena.get(id), Some(&6));
        assert_eq!(arena.remove(id), Some(6));
        assert_eq!(arena.get_mut(id), None);
    }
}
