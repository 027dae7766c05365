/*!
 * Memory Module
 * Allocator capability, system backend, and process-wide configuration
 */

pub mod allocator;
pub mod config;

// Re-export public API
pub use allocator::{Allocator, AllocatorStats, SystemAllocator};
pub use config::{
    configure, configure_from_file, configure_from_str, current_backend, global, global_stats,
    AllocatorBackend, AllocatorOptions,
};
