/*!
 * Ring Buffer
 * Fixed-capacity FIFO ring with peek support
 */

use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use parking_lot::Mutex;
use std::collections::VecDeque;

const DETAIL_QUEUE_FULL: u32 = 0x0001;
const DETAIL_QUEUE_EMPTY: u32 = 0x0002;

/// Fixed-capacity ring buffer.
///
/// A full ring rejects new values with `WouldBlock`; it never overwrites.
pub struct RingBuffer<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Capacity must be > 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self { items: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    pub fn try_push(&self, value: T) -> CoreResult<()> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(Status::with_module(
                StatusCode::WouldBlock,
                "ring buffer is full",
                ErrorModule::Concurrent,
                DETAIL_QUEUE_FULL,
            ));
        }
        items.push_back(value);
        Ok(())
    }

    pub fn try_pop(&self) -> CoreResult<T> {
        self.items.lock().pop_front().ok_or_else(|| {
            Status::with_module(
                StatusCode::WouldBlock,
                "ring buffer is empty",
                ErrorModule::Concurrent,
                DETAIL_QUEUE_EMPTY,
            )
        })
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the oldest value without removing it
    pub fn try_peek(&self) -> CoreResult<T> {
        self.items.lock().front().cloned().ok_or_else(|| {
            Status::with_module(
                StatusCode::WouldBlock,
                "ring buffer is empty",
                ErrorModule::Concurrent,
                DETAIL_QUEUE_EMPTY,
            )
        })
    }
}
