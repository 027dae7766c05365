/*!
 * Allocator Configuration
 * Process-wide backend selection decoded from a JSON blob
 */

use super::allocator::{Allocator, AllocatorStats, SystemAllocator};
use crate::core::{json, CoreResult, ErrorModule, Status, StatusCode};
use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Selectable allocator backend.
///
/// Only `system` is wired in; vendor backends are recognized names that
/// report `Unsupported` when configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorBackend {
    #[default]
    System,
    Mimalloc,
    Tbb,
}

/// Configuration blob accepted by `configure*`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AllocatorOptions {
    pub backend: AllocatorBackend,
}

struct GlobalAllocator {
    backend: AllocatorBackend,
    allocator: Arc<SystemAllocator>,
}

static GLOBAL: RwLock<Option<GlobalAllocator>> = RwLock::new(None);

fn memory_status(code: StatusCode, message: impl Into<String>) -> Status {
    Status::with_module(code, message, ErrorModule::Memory, 0)
}

/// Install the configured backend process-wide
pub fn configure(options: AllocatorOptions) -> CoreResult<()> {
    match options.backend {
        AllocatorBackend::System => {}
        other => {
            return Err(memory_status(
                StatusCode::Unsupported,
                format!("allocator backend {:?} is not built in", other),
            ))
        }
    }

    let mut global = GLOBAL.write();
    *global = Some(GlobalAllocator {
        backend: options.backend,
        allocator: Arc::new(SystemAllocator::new()),
    });
    info!("Global allocator configured: backend={:?}", options.backend);
    Ok(())
}

/// Configure from a JSON text blob
pub fn configure_from_str(text: &str) -> CoreResult<()> {
    let options: AllocatorOptions = json::from_str(text)?;
    configure(options)
}

/// Configure from a JSON file
pub fn configure_from_file(path: impl AsRef<Path>) -> CoreResult<()> {
    let options: AllocatorOptions = json::load_file(path)?;
    configure(options)
}

/// The process-wide allocator, installing the default backend on first use
pub fn global() -> Arc<dyn Allocator> {
    if let Some(global) = GLOBAL.read().as_ref() {
        return global.allocator.clone();
    }

    let mut global = GLOBAL.write();
    let entry = global.get_or_insert_with(|| GlobalAllocator {
        backend: AllocatorBackend::System,
        allocator: Arc::new(SystemAllocator::new()),
    });
    entry.allocator.clone()
}

/// Currently installed backend, if configured
pub fn current_backend() -> Option<AllocatorBackend> {
    GLOBAL.read().as_ref().map(|global| global.backend)
}

/// Statistics of the process-wide allocator
pub fn global_stats() -> AllocatorStats {
    GLOBAL.read().as_ref().map(|global| global.allocator.stats()).unwrap_or_default()
}
