/*!
 * Core Types
 * Common aliases used across the toolkit
 */

/// Task identifier allocated by the executor (starts at 1, monotonic)
pub type TaskId = u64;

/// Opaque tag serializing tasks that share the same non-zero value
pub type SerialKey = u64;

/// Timeout in milliseconds; 0 means "wait indefinitely"
pub type TimeoutMs = u32;
