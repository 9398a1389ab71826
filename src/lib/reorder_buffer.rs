//! Releases region results in region order regardless of completion order.
//!
//! Workers finish regions in any order; the merger inserts each result under its region
//! index and drains whatever prefix is complete, so output stays genomically ordered.
//!
//! # Example
//!
//! ```
//! use umiec_lib::reorder_buffer::ReorderBuffer;
//!
//! let mut buffer: ReorderBuffer<&str> = ReorderBuffer::new();
//! buffer.insert(1, "chr1:501-900");
//! assert_eq!(buffer.try_pop_next(), None);
//! buffer.insert(0, "chr1:1-400");
//! let ready: Vec<_> = buffer.drain_ready().collect();
//! assert_eq!(ready, vec!["chr1:1-400", "chr1:501-900"]);
//! ```

use std::collections::VecDeque;

/// A buffer keyed by sequence number that yields items strictly in sequence.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    /// Slot `i` holds sequence number `next_seq + i`.
    slots: VecDeque<Option<T>>,
    next_seq: u64,
    pending: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    /// Creates an empty buffer expecting sequence number 0 first.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: VecDeque::new(), next_seq: 0, pending: 0 }
    }

    /// Buffers `item` under `seq`.
    ///
    /// Sequence numbers already released or already buffered are ignored and the item is
    /// returned back to the caller.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, seq: u64, item: T) -> Option<T> {
        if seq < self.next_seq {
            return Some(item);
        }
        let index = (seq - self.next_seq) as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        if self.slots[index].is_some() {
            return Some(item);
        }
        self.slots[index] = Some(item);
        self.pending += 1;
        None
    }

    /// Pops the item with the next sequence number, if it has arrived.
    #[must_use]
    pub fn try_pop_next(&mut self) -> Option<T> {
        let item = self.slots.front_mut()?.take()?;
        self.slots.pop_front();
        self.next_seq += 1;
        self.pending -= 1;
        Some(item)
    }

    /// Yields consecutive ready items until the first gap.
    pub fn drain_ready(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.try_pop_next())
    }

    /// The next sequence number to be released.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_in_order() {
        let mut buffer = ReorderBuffer::new();
        for i in 0..3u64 {
            assert!(buffer.insert(i, i * 10).is_none());
        }
        assert_eq!(buffer.drain_ready().collect::<Vec<_>>(), vec![0, 10, 20]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.next_seq(), 3);
    }

    #[test]
    fn test_gap_blocks_release() {
        let mut buffer = ReorderBuffer::new();
        buffer.insert(0, 'a');
        buffer.insert(2, 'c');
        assert_eq!(buffer.drain_ready().collect::<Vec<_>>(), vec!['a']);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.try_pop_next(), None);
        buffer.insert(1, 'b');
        assert_eq!(buffer.drain_ready().collect::<Vec<_>>(), vec!['b', 'c']);
    }

    #[test]
    fn test_duplicate_and_stale_are_returned() {
        let mut buffer = ReorderBuffer::new();
        assert_eq!(buffer.insert(1, "first"), None);
        assert_eq!(buffer.insert(1, "again"), Some("again"));
        buffer.insert(0, "zero");
        let _ = buffer.drain_ready().count();
        assert_eq!(buffer.insert(0, "stale"), Some("stale"));
    }

    proptest! {
        #[test]
        fn prop_any_insert_order_releases_in_sequence(
            order in Just((0..40u64).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let mut buffer = ReorderBuffer::new();
            let mut released = Vec::new();
            for seq in order {
                buffer.insert(seq, seq);
                released.extend(buffer.drain_ready());
            }
            prop_assert_eq!(released, (0..40u64).collect::<Vec<_>>());
            prop_assert!(buffer.is_empty());
        }
    }
}
