/*!
 * Concurrent Module
 * Fixed-capacity containers with non-blocking try-operations
 */

pub mod lockfree;
pub mod map;
pub mod object_pool;
pub mod queue;
pub mod ring_buffer;
pub mod set;

// Re-export public API
pub use lockfree::LockFreeQueue;
pub use map::ConcurrentMap;
pub use object_pool::{ObjectPool, ObjectPoolStats};
pub use queue::BoundedQueue;
pub use ring_buffer::RingBuffer;
pub use set::ConcurrentSet;
