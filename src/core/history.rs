//! Fixed-capacity history ring.

/// Bounded ring that keeps the most recent `capacity` items.
///
/// Slots are allocated as items arrive, so a large capacity costs nothing up
/// front. Once full, pushing overwrites the slot at `head` and evicts the
/// oldest item in O(1).
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest item once the ring is full, zero before that.
    head: usize,
}

impl<T> HistoryRing<T> {
    /// Create an empty ring. A zero capacity ring discards every push.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            head: 0,
        }
    }

    /// Maximum number of retained items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append `item`, returning the evicted oldest item when the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Drop every retained item.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

impl<T: Clone> HistoryRing<T> {
    /// Copy of the retained items, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_without_eviction() {
        let mut ring = HistoryRing::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.snapshot(), vec![1, 2]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut ring = HistoryRing::new(3);
        for i in 0..3 {
            ring.push(i);
        }
        assert_eq!(ring.push(3), Some(0));
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.snapshot(), vec![2, 3, 4]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_never_exceeds_capacity_over_many_wraps() {
        let mut ring = HistoryRing::new(7);
        for i in 0..1_000 {
            ring.push(i);
            assert!(ring.len() <= 7);
        }
        assert_eq!(ring.snapshot(), (993..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_capacity_discards() {
        let mut ring = HistoryRing::new(0);
        assert_eq!(ring.push("x"), Some("x"));
        assert!(ring.is_empty());
        assert!(ring.snapshot().is_empty());
    }

    #[test]
    fn test_huge_capacity_allocates_on_demand() {
        let mut ring = HistoryRing::new(usize::MAX);
        assert_eq!(ring.capacity(), usize::MAX);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_clear_resets_order() {
        let mut ring = HistoryRing::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(9);
        assert_eq!(ring.snapshot(), vec![9]);
    }
}
