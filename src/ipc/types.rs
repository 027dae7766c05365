/*!
 * Channel Types
 * Options and statistics for the shared-memory byte channel
 */

use serde::{Deserialize, Serialize};

/// Options for opening a channel endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelOptions {
    /// Channel name; decorated into the host's shared-object namespace
    pub name: String,
    /// Ring slot-count hint, must be > 0
    pub capacity: u32,
    /// Maximum payload bytes per message, must be > 0
    pub message_max_bytes: u32,
    /// Count a shared drop when the local outbox rejects a message
    pub drop_when_full: bool,
    /// Reserved for blocking wrappers; the try-operations never wait
    pub timeout_ms: u32,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            capacity: 1024,
            message_max_bytes: 4096,
            drop_when_full: true,
            timeout_ms: 0,
        }
    }
}

impl ChannelOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_message_max_bytes(mut self, message_max_bytes: u32) -> Self {
        self.message_max_bytes = message_max_bytes;
        self
    }

    pub fn with_drop_when_full(mut self, drop_when_full: bool) -> Self {
        self.drop_when_full = drop_when_full;
        self
    }
}

/// Channel statistics snapshot
///
/// `send_ok` / `recv_ok` / `dropped_when_full` come from the shared header
/// and are visible to both endpoints; the would-block counters are local to
/// this endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelStats {
    pub send_ok: u64,
    pub recv_ok: u64,
    pub dropped_when_full: u64,
    pub would_block_send: u64,
    pub would_block_recv: u64,
}
