/*!
 * IPC Module
 * Cross-process shared-memory byte channel
 */

pub mod channel;
pub mod layout;
mod shm;
pub mod types;

// Re-export public API
pub use channel::ShmChannel;
pub use types::{ChannelOptions, ChannelStats};
