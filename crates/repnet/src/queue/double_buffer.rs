use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

/// Items enqueued while a batch is being drained are seen on the next swap.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    active: VecDeque<T>,
    pending: VecDeque<T>,
}

impl<T> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self {
            active: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            active: VecDeque::with_capacity(capacity),
            pending: VecDeque::with_capacity(capacity),
        }
    }

    pub fn enqueue(&mut self, item: T) {
        self.pending.push_back(item);
    }

    pub fn swap_and_drain(&mut self) -> Drain<'_, T> {
        // Leftovers from an abandoned drain are dropped by `Drain` itself,
        // so active is always empty here.
        debug_assert!(self.active.is_empty());
        std::mem::swap(&mut self.active, &mut self.pending);
        self.active.drain(..)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = DoubleBuffer::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        let drained: Vec<_> = queue.swap_and_drain().collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn follow_up_items_land_in_next_batch() {
        let mut queue = DoubleBuffer::new();
        queue.enqueue("a");
        queue.enqueue("b");

        let batch: Vec<_> = queue.swap_and_drain().collect();
        for item in &batch {
            queue.enqueue(if *item == "a" { "a2" } else { "b2" });
        }

        assert_eq!(batch, vec!["a", "b"]);
        assert_eq!(queue.pending_len(), 2);
        assert_eq!(queue.swap_and_drain().collect::<Vec<_>>(), vec!["a2", "b2"]);
    }

    #[test]
    fn every_item_drained_exactly_once() {
        let mut queue = DoubleBuffer::new();
        let mut seen = Vec::new();
        let mut next = 0u32;

        for epoch in 0..10u32 {
            for _ in 0..epoch {
                queue.enqueue(next);
                next += 1;
            }
            seen.extend(queue.swap_and_drain());
        }
        seen.extend(queue.swap_and_drain());

        assert_eq!(seen, (0..next).collect::<Vec<_>>());
    }

    #[test]
    fn empty_swap_yields_nothing() {
        let mut queue: DoubleBuffer<u8> = DoubleBuffer::with_capacity(4);
        assert_eq!(queue.swap_and_drain().count(), 0);
    }
}
