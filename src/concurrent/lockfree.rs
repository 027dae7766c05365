/*!
 * Lock-Free Queue
 * Fixed-capacity MPMC queue over crossbeam's ArrayQueue
 */

use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;

const DETAIL_QUEUE_FULL: u32 = 0x0001;
const DETAIL_QUEUE_EMPTY: u32 = 0x0002;

/// Lock-free fixed-capacity queue.
///
/// Clones share the same storage. Drop-in alternative to
/// [`BoundedQueue`](super::queue::BoundedQueue) for hot paths; the one
/// capability it cannot offer is peeking, which reports `Unsupported`.
pub struct LockFreeQueue<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> LockFreeQueue<T> {
    /// Capacity must be > 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self { queue: Arc::new(ArrayQueue::new(capacity)) }
    }

    pub fn try_push(&self, value: T) -> CoreResult<()> {
        self.queue.push(value).map_err(|_| {
            Status::with_module(
                StatusCode::WouldBlock,
                "queue is full",
                ErrorModule::Concurrent,
                DETAIL_QUEUE_FULL,
            )
        })
    }

    pub fn try_pop(&self) -> CoreResult<T> {
        self.queue.pop().ok_or_else(|| {
            Status::with_module(
                StatusCode::WouldBlock,
                "queue is empty",
                ErrorModule::Concurrent,
                DETAIL_QUEUE_EMPTY,
            )
        })
    }

    /// Peeking would race the consumer side; not offered by this backend
    pub fn try_peek(&self) -> CoreResult<T> {
        Err(Status::with_module(
            StatusCode::Unsupported,
            "peek is not supported on the lock-free queue",
            ErrorModule::Concurrent,
            0,
        ))
    }

    pub fn approx_size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T> Clone for LockFreeQueue<T> {
    fn clone(&self) -> Self {
        Self { queue: Arc::clone(&self.queue) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let queue = LockFreeQueue::new(4);
        queue.try_push(1u32).unwrap();
        queue.try_push(2).unwrap();
        assert_eq!(queue.try_pop().unwrap(), 1);
        assert_eq!(queue.try_pop().unwrap(), 2);
    }

    #[test]
    fn test_full_and_empty() {
        let queue = LockFreeQueue::new(1);
        queue.try_push(9u8).unwrap();
        assert_eq!(queue.try_push(10).unwrap_err().code(), StatusCode::WouldBlock);
        queue.try_pop().unwrap();
        assert_eq!(queue.try_pop().unwrap_err().code(), StatusCode::WouldBlock);
    }

    #[test]
    fn test_peek_unsupported() {
        let queue: LockFreeQueue<u32> = LockFreeQueue::new(2);
        assert_eq!(queue.try_peek().unwrap_err().code(), StatusCode::Unsupported);
    }

    #[test]
    fn test_clones_share_storage() {
        let queue = LockFreeQueue::new(2);
        let other = queue.clone();
        queue.try_push(5u32).unwrap();
        assert_eq!(other.try_pop().unwrap(), 5);
    }
}
