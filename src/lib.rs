/*!
 * corestack
 * Core toolkit library:
 * - Status taxonomy with packed error codes
 * - Concurrent containers with non-blocking try-operations
 * - Cross-process shared-memory byte channel (SPSC framed ring)
 * - Task runtime: thread-pool executor and task-graph scheduler
 * - Allocator façade with JSON-driven configuration
 */

pub mod concurrent;
pub mod core;
pub mod ipc;
pub mod memory;
pub mod task;

pub use crate::core::{CoreResult, ErrorModule, SerialKey, Status, StatusCode, TaskId};
pub use concurrent::{
    BoundedQueue, ConcurrentMap, ConcurrentSet, LockFreeQueue, ObjectPool, RingBuffer,
};
pub use ipc::{ChannelOptions, ChannelStats, ShmChannel};
pub use memory::{Allocator, AllocatorBackend, AllocatorOptions, SystemAllocator};
pub use task::{
    ExecutorOptions, ExecutorPolicy, ExecutorStats, GraphRunOptions, GraphRunStats,
    GraphTaskOptions, TaskGraph, TaskPriority, TaskSubmitOptions, ThreadPoolExecutor,
};
