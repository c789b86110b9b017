//! Fixed-capacity rolling history.
//!
//! Storage grows once up to `capacity` and is then overwritten in place, so the
//! per-sample hot path never reallocates. Iteration is always oldest → newest.

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Appends `value`, evicting the oldest entry when full.
    pub fn push(&mut self, value: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    // `head` stays at 0 until the buffer first fills, so this split is valid
    // in both phases.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.slots[self.head..]
            .iter()
            .chain(self.slots[..self.head].iter())
    }

    /// Element `index` positions after the oldest entry.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + index) % self.slots.len())
    }

    pub fn last(&self) -> Option<&T> {
        self.slots
            .len()
            .checked_sub(1)
            .and_then(|newest| self.get(newest))
    }

    /// Iterator over the newest `count` entries, still oldest → newest.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.slots.len().saturating_sub(count);
        self.iter().skip(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_before_wrapping() {
        let mut buffer = RingBuffer::new(4);
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);

        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(buffer.last(), Some(&3));
        assert!(!buffer.is_full());
    }

    #[test]
    fn evicts_oldest_entries_on_overflow() {
        let mut buffer = RingBuffer::new(3);
        for value in 1..=5 {
            buffer.push(value);
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(buffer.get(0), Some(&3));
        assert_eq!(buffer.last(), Some(&5));
        assert_eq!(buffer.get(3), None);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = RingBuffer::new(30);
        for value in 0..1_000 {
            buffer.push(value);
            assert!(buffer.len() <= buffer.capacity());
        }
        assert!(buffer.is_full());
    }

    #[test]
    fn tail_returns_newest_entries_in_order() {
        let mut buffer = RingBuffer::new(5);
        for value in 0..7 {
            buffer.push(value);
        }

        assert_eq!(buffer.tail(2).copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(buffer.tail(10).count(), 5);
    }

    #[test]
    fn clear_resets_wrapped_state() {
        let mut buffer = RingBuffer::new(2);
        buffer.push('a');
        buffer.push('b');
        buffer.push('c');
        buffer.clear();
        buffer.push('d');

        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec!['d']);
    }
}
