/*!
 * Task Types
 * Options, policies, and statistics for the executor and task graph
 */

use crate::core::SerialKey;
use serde::{Deserialize, Serialize};

/// Scheduling priority of a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl TaskPriority {
    /// Pick-policy score: High before Normal before Low
    pub(crate) fn score(self) -> u8 {
        match self {
            TaskPriority::High => 2,
            TaskPriority::Normal => 1,
            TaskPriority::Low => 0,
        }
    }
}

/// Queue pick policy of the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPolicy {
    /// Strict submission order
    Fifo,
    /// Highest priority first, FIFO within a priority
    Priority,
    /// Submission order regardless of priority
    Fair,
    /// Priority-with-fairness; picks like `Priority`
    #[default]
    HybridFairPriority,
}

/// Executor construction and reconfiguration options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorOptions {
    /// 0 means the host's hardware parallelism (at least 1)
    pub worker_count: usize,
    /// 0 means unbounded
    pub queue_capacity: usize,
    /// Accepted but not required behavior; `stolen` stays 0 without it
    pub enable_work_stealing: bool,
    pub policy: ExecutorPolicy,
}

/// Per-submission options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskSubmitOptions {
    pub priority: TaskPriority,
    /// Caller-defined tag carried for diagnostics
    pub tag: u32,
    /// 0 means no serial-group constraint
    pub serial_key: SerialKey,
}

/// Executor statistics snapshot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub rejected: u64,
    pub stolen: u64,
    pub queue_depth: usize,
    pub queue_high_watermark: usize,
}

/// Per-node options of a graph task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GraphTaskOptions {
    pub name: Option<String>,
    pub priority: TaskPriority,
    /// 0 means no serial-group constraint
    pub serial_key: SerialKey,
}

/// Options for one graph run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GraphRunOptions {
    /// Abort after the first level containing a failed node
    pub fail_fast: bool,
    /// Upper bound on nodes dispatched per level; 0 means all ready nodes
    pub max_concurrency: u32,
}

impl Default for GraphRunOptions {
    fn default() -> Self {
        Self { fail_fast: true, max_concurrency: 0 }
    }
}

/// Outcome counts of one graph run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GraphRunStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub canceled: u64,
}
