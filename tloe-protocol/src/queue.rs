//! Fixed-capacity FIFO ring buffer
//!
//! Backs the retransmission buffer, the outbound control-frame queue and the
//! inbound payload queue. Elements are stored by value in a slice of optional
//! slots; the queue never grows, so overflow is always reported to the caller.

use std::fmt;

/// Bounded FIFO queue
pub struct BoundedQueue<T> {
    slots: Box<[Option<T>]>,
    /// Index of the front element
    head: usize,
    len: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` elements
    ///
    /// # Panics
    /// Panics if capacity is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");

        BoundedQueue {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Append an element at the back.
    ///
    /// When the queue is full the element is handed back untouched.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }

        let idx = self.slot(self.len);
        self.slots[idx] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the front element
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = self.slot(1);
        self.len -= 1;
        item
    }

    /// Front element without removing it
    pub fn peek_front(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Most recently enqueued element
    pub fn peek_back(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.slot(self.len - 1)].as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate front to back
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Slots outside the live range are always `None`.
        let (wrapped, tail) = self.slots.split_at(self.head);
        tail.iter().chain(wrapped.iter()).filter_map(Option::as_ref)
    }

    /// Iterate front to back with mutable access
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let (wrapped, tail) = self.slots.split_at_mut(self.head);
        tail.iter_mut()
            .chain(wrapped.iter_mut())
            .filter_map(Option::as_mut)
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
