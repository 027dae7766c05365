/*!
 * Shared Ring Layout
 * Bit-exact memory layout and frame format of the cross-process ring
 */

use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use std::sync::atomic::AtomicU64;

/// "LKIP"
pub const CHANNEL_MAGIC: u32 = 0x4C4B_4950;
pub const CHANNEL_VERSION: u32 = 2;

pub const FRAME_HEADER_BYTES: usize = std::mem::size_of::<FrameHeader>();
pub const SHARED_HEADER_BYTES: usize = std::mem::size_of::<SharedHeader>();

pub const FRAME_KIND_DATA: u32 = 0;
pub const FRAME_KIND_WRAP: u32 = 1;

/// Shared mapping header.
///
/// Laid out little-endian at offset 0 of the mapping. The index and
/// statistics atomics each sit on their own 64-byte line so the producer and
/// consumer never share one.
#[repr(C, align(64))]
pub struct SharedHeader {
    pub magic: u32,             // 0x00
    pub version: u32,           // 0x04
    pub capacity: u32,          // 0x08
    pub message_max_bytes: u32, // 0x0C
    pub ring_bytes: u32,        // 0x10
    pub ring_mask: u32,         // 0x14
    pub reserved0: u64,         // 0x18
    pub reserved1: u64,         // 0x20
    _pad0: [u8; 24],

    pub write_index: AtomicU64, // 0x40, monotonic byte counter
    _pad1: [u8; 56],

    pub read_index: AtomicU64, // 0x80, monotonic byte counter
    _pad2: [u8; 56],

    pub send_ok: AtomicU64,           // 0xC0
    pub recv_ok: AtomicU64,           // 0xC8
    pub dropped_when_full: AtomicU64, // 0xD0
    _pad3: [u8; 40],
}

/// Frame header preceding every ring record, always 8-byte aligned
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Payload bytes; 0 for Wrap sentinels
    pub size: u32,
    /// FRAME_KIND_DATA or FRAME_KIND_WRAP
    pub kind: u32,
}

pub fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

pub fn next_pow2(mut v: u32) -> u32 {
    if v <= 1 {
        return 1;
    }
    v -= 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v + 1
}

/// Bytes one frame occupies in the ring: header + payload, padded to 8
pub fn frame_stride(payload_bytes: u32) -> usize {
    align_up(FRAME_HEADER_BYTES + payload_bytes as usize, std::mem::size_of::<u64>())
}

/// Ring byte-count for the requested geometry: the power of two covering
/// `capacity` maximally-sized frames
pub fn ring_bytes_for(capacity: u32, message_max_bytes: u32) -> CoreResult<u32> {
    let target = frame_stride(message_max_bytes)
        .checked_mul(capacity as usize)
        .filter(|&t| t <= u32::MAX as usize)
        .ok_or_else(|| {
            Status::with_module(
                StatusCode::InvalidArgument,
                "channel memory size is too large",
                ErrorModule::Ipc,
                0,
            )
        })?;
    Ok(next_pow2(target as u32))
}

/// Total mapping size: header plus ring
pub fn total_bytes(capacity: u32, message_max_bytes: u32) -> CoreResult<usize> {
    Ok(SHARED_HEADER_BYTES + ring_bytes_for(capacity, message_max_bytes)? as usize)
}

/// How many bytes the ring stays contiguous from a byte index
pub fn contiguous_from(index: u64, ring_bytes: usize, ring_mask: usize) -> usize {
    ring_bytes - (index as usize & ring_mask)
}

/// Occupied bytes between two monotonic indices, clamped to the ring size
pub fn used_bytes(write: u64, read: u64, ring_bytes: usize) -> usize {
    if write < read {
        return ring_bytes;
    }
    let used = write - read;
    if used > ring_bytes as u64 {
        ring_bytes
    } else {
        used as usize
    }
}
