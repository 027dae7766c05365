/*!
 * Bounded Queue
 * Mutex-guarded FIFO with non-blocking try-operations
 */

use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use parking_lot::Mutex;
use std::collections::VecDeque;

const DETAIL_QUEUE_FULL: u32 = 0x0001;
const DETAIL_QUEUE_EMPTY: u32 = 0x0002;

fn queue_full() -> Status {
    Status::with_module(
        StatusCode::WouldBlock,
        "queue is full",
        ErrorModule::Concurrent,
        DETAIL_QUEUE_FULL,
    )
}

fn queue_empty() -> Status {
    Status::with_module(
        StatusCode::WouldBlock,
        "queue is empty",
        ErrorModule::Concurrent,
        DETAIL_QUEUE_EMPTY,
    )
}

/// Bounded concurrent FIFO queue.
///
/// All operations are non-blocking; a full queue reports `WouldBlock` rather
/// than waiting. Sizes are approximate under concurrency.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Capacity 0 means unbounded
    pub fn new(capacity: usize) -> Self {
        Self { items: Mutex::new(VecDeque::new()), capacity }
    }

    pub fn try_push(&self, value: T) -> CoreResult<()> {
        let mut items = self.items.lock();
        if self.capacity > 0 && items.len() >= self.capacity {
            return Err(queue_full());
        }
        items.push_back(value);
        Ok(())
    }

    /// Push as many values as fit, returning the count admitted.
    /// `WouldBlock` when not all of them fit.
    pub fn try_push_batch(&self, values: impl IntoIterator<Item = T>) -> CoreResult<usize> {
        let mut items = self.items.lock();
        let mut pushed = 0;
        for value in values {
            if self.capacity > 0 && items.len() >= self.capacity {
                return Err(queue_full());
            }
            items.push_back(value);
            pushed += 1;
        }
        Ok(pushed)
    }

    pub fn try_pop(&self) -> CoreResult<T> {
        self.items.lock().pop_front().ok_or_else(queue_empty)
    }

    /// Pop up to `capacity` values into a vector.
    /// `WouldBlock` when the queue was empty.
    pub fn try_pop_batch(&self, capacity: usize) -> CoreResult<Vec<T>> {
        let mut items = self.items.lock();
        if items.is_empty() {
            return Err(queue_empty());
        }
        let count = capacity.min(items.len());
        Ok(items.drain(..count).collect())
    }

    pub fn approx_size(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the head without removing it
    pub fn try_peek(&self) -> CoreResult<T> {
        self.items.lock().front().cloned().ok_or_else(queue_empty)
    }
}
