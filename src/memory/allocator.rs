/*!
 * Allocator Backends
 * Typed allocation capability with usage statistics
 */

use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use serde::{Deserialize, Serialize};
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

const DETAIL_INVALID_ALIGNMENT: u32 = 0x0001;

fn memory_status(code: StatusCode, message: impl Into<String>, detail_id: u32) -> Status {
    Status::with_module(code, message, ErrorModule::Memory, detail_id)
}

/// Allocation capability implemented by every backend
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes at `align`; zero-size requests are rejected
    fn allocate(&self, size: usize, align: usize) -> CoreResult<NonNull<u8>>;

    /// Return memory obtained from `allocate` with the same size and align.
    ///
    /// # Safety
    /// `ptr` must come from this allocator's `allocate(size, align)` and must
    /// not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize);

    fn name(&self) -> &'static str;
}

/// Allocator usage counters (relaxed; monitoring only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AllocatorStats {
    pub alloc_calls: u64,
    pub dealloc_calls: u64,
    pub bytes_in_use: u64,
    pub peak_bytes: u64,
}

/// Backend over the process heap
#[derive(Default)]
pub struct SystemAllocator {
    alloc_calls: AtomicU64,
    dealloc_calls: AtomicU64,
    bytes_in_use: AtomicU64,
    peak_bytes: AtomicU64,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            alloc_calls: self.alloc_calls.load(Ordering::Relaxed),
            dealloc_calls: self.dealloc_calls.load(Ordering::Relaxed),
            bytes_in_use: self.bytes_in_use.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
        }
    }

    fn record_alloc(&self, size: usize) {
        self.alloc_calls.fetch_add(1, Ordering::Relaxed);
        let in_use = self.bytes_in_use.fetch_add(size as u64, Ordering::Relaxed) + size as u64;
        self.peak_bytes.fetch_max(in_use, Ordering::Relaxed);
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize, align: usize) -> CoreResult<NonNull<u8>> {
        if size == 0 {
            return Err(memory_status(StatusCode::InvalidArgument, "size must be > 0", 0));
        }
        if align == 0 || !align.is_power_of_two() {
            return Err(memory_status(
                StatusCode::InvalidArgument,
                "alignment must be a power of two",
                DETAIL_INVALID_ALIGNMENT,
            ));
        }
        let layout = Layout::from_size_align(size, align).map_err(|e| {
            memory_status(StatusCode::InvalidArgument, format!("bad layout: {}", e), 0)
        })?;

        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            memory_status(StatusCode::InternalError, "system allocation failed", 0)
        })?;

        self.record_alloc(size);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        if let Ok(layout) = Layout::from_size_align(size, align) {
            dealloc(ptr.as_ptr(), layout);
            self.dealloc_calls.fetch_add(1, Ordering::Relaxed);
            self.bytes_in_use.fetch_sub(size as u64, Ordering::Relaxed);
        }
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
