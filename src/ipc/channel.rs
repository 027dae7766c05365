/*!
 * Shared-Memory Channel
 * SPSC variable-length framed ring over a named shared mapping
 */

use super::layout::{
    self, FrameHeader, SharedHeader, CHANNEL_MAGIC, CHANNEL_VERSION, FRAME_HEADER_BYTES,
    FRAME_KIND_DATA, FRAME_KIND_WRAP, SHARED_HEADER_BYTES,
};
use super::shm::ShmMapping;
use super::types::{ChannelOptions, ChannelStats};
use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
use log::info;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;

const SHARED_NAME_PREFIX: &str = "/corestack.";

// Module-local detail ids, mirrored in the error catalog.
const DETAIL_QUEUE_FULL: u32 = 0x0001;
const DETAIL_QUEUE_EMPTY: u32 = 0x0002;

fn ipc_status(code: StatusCode, message: impl Into<String>) -> Status {
    Status::with_module(code, message, ErrorModule::Ipc, 0)
}

fn ring_full() -> Status {
    Status::with_module(
        StatusCode::WouldBlock,
        "channel queue is full",
        ErrorModule::Ipc,
        DETAIL_QUEUE_FULL,
    )
}

fn ring_empty() -> Status {
    Status::with_module(
        StatusCode::WouldBlock,
        "channel has no message",
        ErrorModule::Ipc,
        DETAIL_QUEUE_EMPTY,
    )
}

/// Shared-memory byte channel endpoint.
///
/// Single producer, single consumer: exactly one thread may drive each
/// endpoint, which `&mut self` on the try-operations enforces. A server
/// endpoint constructs and owns the named mapping; a client endpoint
/// attaches to it. Sends spill into a process-local outbox when the shared
/// ring is momentarily full, so submission latency is decoupled from the
/// consumer's drain rate.
pub struct ShmChannel {
    options: ChannelOptions,
    outbox: VecDeque<Vec<u8>>,
    would_block_send: u64,
    would_block_recv: u64,
    pending_drop: u64,
    mapping: Option<ShmMapping>,
}

/// Raw pointers into the mapped region, copied out of the mapping so ring
/// operations don't hold a borrow of the endpoint.
#[derive(Clone, Copy)]
struct RawRing {
    header: *const SharedHeader,
    base: *mut u8,
}

impl ShmChannel {
    pub fn new() -> Self {
        Self {
            options: ChannelOptions::default(),
            outbox: VecDeque::new(),
            would_block_send: 0,
            would_block_recv: 0,
            pending_drop: 0,
            mapping: None,
        }
    }

    /// Create the named mapping and initialize the ring header.
    ///
    /// Fails with `AlreadyInitialized` if this endpoint is already open or
    /// another server owns the name, `InvalidArgument` on a bad geometry.
    pub fn open_server(&mut self, options: ChannelOptions) -> CoreResult<()> {
        if self.mapping.is_some() {
            return Err(ipc_status(StatusCode::AlreadyInitialized, "channel already opened"));
        }
        Self::validate_options(&options)?;

        let ring_bytes = layout::ring_bytes_for(options.capacity, options.message_max_bytes)?;
        let total = SHARED_HEADER_BYTES + ring_bytes as usize;
        let shared_name = decorate_name(&options.name);
        let mapping = ShmMapping::create(&shared_name, total)?;

        unsafe {
            std::ptr::write_bytes(mapping.as_mut_ptr(), 0, mapping.len());
            let header = &mut *(mapping.as_mut_ptr() as *mut SharedHeader);
            header.magic = CHANNEL_MAGIC;
            header.version = CHANNEL_VERSION;
            header.capacity = options.capacity;
            header.message_max_bytes = options.message_max_bytes;
            header.ring_bytes = ring_bytes;
            header.ring_mask = ring_bytes - 1;
            header.write_index.store(0, Ordering::Relaxed);
            header.read_index.store(0, Ordering::Relaxed);
            header.send_ok.store(0, Ordering::Relaxed);
            header.recv_ok.store(0, Ordering::Relaxed);
            header.dropped_when_full.store(0, Ordering::Relaxed);
        }

        info!(
            "Opened channel server '{}' (ring {} bytes, max message {} bytes)",
            options.name, ring_bytes, options.message_max_bytes
        );

        self.options = options;
        self.outbox.clear();
        self.pending_drop = 0;
        self.mapping = Some(mapping);
        Ok(())
    }

    /// Attach to a mapping created by a server endpoint.
    ///
    /// Validates magic, version, and ring geometry, then adopts the server's
    /// `capacity` and `message_max_bytes`.
    pub fn open_client(&mut self, options: ChannelOptions) -> CoreResult<()> {
        if self.mapping.is_some() {
            return Err(ipc_status(StatusCode::AlreadyInitialized, "channel already opened"));
        }
        if options.name.is_empty() {
            return Err(ipc_status(StatusCode::InvalidArgument, "channel name is empty"));
        }

        let shared_name = decorate_name(&options.name);
        let probe = ShmMapping::open(&shared_name, SHARED_HEADER_BYTES)?;
        let (capacity, message_max_bytes, ring_bytes) = {
            let header = unsafe { &*(probe.as_mut_ptr() as *const SharedHeader) };
            if header.magic != CHANNEL_MAGIC || header.version != CHANNEL_VERSION {
                return Err(ipc_status(
                    StatusCode::InternalError,
                    "channel header magic/version mismatch",
                ));
            }
            if header.ring_bytes == 0 || !header.ring_bytes.is_power_of_two() {
                return Err(ipc_status(StatusCode::InternalError, "channel ring_bytes is invalid"));
            }
            (header.capacity, header.message_max_bytes, header.ring_bytes)
        };
        drop(probe);

        let total = SHARED_HEADER_BYTES + ring_bytes as usize;
        let mapping = ShmMapping::open(&shared_name, total)?;

        info!(
            "Opened channel client '{}' (ring {} bytes, max message {} bytes)",
            options.name, ring_bytes, message_max_bytes
        );

        self.options = ChannelOptions { capacity, message_max_bytes, ..options };
        self.outbox.clear();
        self.pending_drop = 0;
        self.mapping = Some(mapping);
        Ok(())
    }

    /// Release local handles. Idempotent; a server endpoint also retires the
    /// shared name.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.mapping.take().is_some() {
            info!("Closed channel '{}'", self.options.name);
        }
        self.outbox.clear();
        Ok(())
    }

    /// Non-blocking send of one message.
    ///
    /// Drains at most one spilled entry, admits the message into the local
    /// outbox, then flushes a small burst into the shared ring. Returns
    /// `WouldBlock` when the outbox is at its limit.
    pub fn try_send(&mut self, data: &[u8]) -> CoreResult<()> {
        let Some(ring) = self.ring() else {
            return Err(ipc_status(StatusCode::NotInitialized, "channel is not opened"));
        };
        if data.len() > self.options.message_max_bytes as usize {
            return Err(ipc_status(StatusCode::InvalidArgument, "message exceeds max bytes"));
        }

        self.drain_outbox(ring, 1);

        if self.outbox.len() >= self.outbox_limit() {
            self.would_block_send += 1;
            if self.options.drop_when_full {
                self.pending_drop += 1;
                unsafe { &*ring.header }.dropped_when_full.fetch_add(1, Ordering::Relaxed);
            }
            return Err(Status::with_module(
                StatusCode::WouldBlock,
                "local pending queue is full",
                ErrorModule::Ipc,
                DETAIL_QUEUE_FULL,
            ));
        }

        self.outbox.push_back(data.to_vec());

        let flush_budget = self.outbox_limit().min(8).max(1);
        self.drain_outbox(ring, flush_budget);
        Ok(())
    }

    /// Non-blocking receive of one message into `buf`.
    ///
    /// Returns the payload length. `WouldBlock` when no complete frame is
    /// visible; `BufferTooSmall` leaves the frame unconsumed so a retry with
    /// a larger buffer sees the same payload.
    pub fn try_recv(&mut self, buf: &mut [u8]) -> CoreResult<u32> {
        let Some(ring) = self.ring() else {
            return Err(ipc_status(StatusCode::NotInitialized, "channel is not opened"));
        };

        self.drain_outbox(ring, 1);

        let result = ring.read_frame(self.options.message_max_bytes, buf);
        if let Err(status) = &result {
            if status.code() == StatusCode::WouldBlock {
                self.would_block_recv += 1;
            }
        }
        result
    }

    /// Cumulative statistics: shared counters plus local would-block counts
    pub fn stats(&self) -> ChannelStats {
        let mut out = ChannelStats {
            would_block_send: self.would_block_send,
            would_block_recv: self.would_block_recv,
            ..ChannelStats::default()
        };
        if let Some(ring) = self.ring() {
            let header = unsafe { &*ring.header };
            out.send_ok = header.send_ok.load(Ordering::Relaxed);
            out.recv_ok = header.recv_ok.load(Ordering::Relaxed);
            out.dropped_when_full = header.dropped_when_full.load(Ordering::Relaxed);
        }
        out
    }

    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Messages this producer refused while its outbox was full with
    /// `drop_when_full` set; resets on reopen
    pub fn pending_drops(&self) -> u64 {
        self.pending_drop
    }

    fn validate_options(options: &ChannelOptions) -> CoreResult<()> {
        if options.name.is_empty() {
            return Err(ipc_status(StatusCode::InvalidArgument, "channel name is empty"));
        }
        if options.capacity == 0 {
            return Err(ipc_status(StatusCode::InvalidArgument, "capacity must be > 0"));
        }
        if options.message_max_bytes == 0 {
            return Err(ipc_status(StatusCode::InvalidArgument, "message_max_bytes must be > 0"));
        }
        Ok(())
    }

    fn outbox_limit(&self) -> usize {
        (self.options.capacity as usize * 2).max(4)
    }

    fn ring(&self) -> Option<RawRing> {
        self.mapping.as_ref().map(|mapping| RawRing {
            header: mapping.as_mut_ptr() as *const SharedHeader,
            base: unsafe { mapping.as_mut_ptr().add(SHARED_HEADER_BYTES) },
        })
    }

    /// Push up to `budget` outbox entries into the shared ring, stopping at
    /// the first full-ring signal.
    fn drain_outbox(&mut self, ring: RawRing, budget: usize) {
        let mut remaining = budget;
        while remaining > 0 {
            let Some(front) = self.outbox.front() else {
                break;
            };
            match ring.write_frame(front) {
                Ok(()) => {
                    self.outbox.pop_front();
                    remaining -= 1;
                }
                Err(status) if status.code() == StatusCode::WouldBlock => {
                    self.would_block_send += 1;
                    break;
                }
                Err(_) => {
                    // Entry can never fit; discard rather than wedge the queue.
                    self.outbox.pop_front();
                }
            }
        }
    }
}

impl Default for ShmChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ShmChannel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn decorate_name(name: &str) -> String {
    format!("{}{}", SHARED_NAME_PREFIX, name)
}

impl RawRing {
    fn header(&self) -> &SharedHeader {
        unsafe { &*self.header }
    }

    /// Write one frame, emitting a Wrap sentinel first when the contiguous
    /// tail cannot hold it. Publishes `write_index` with release ordering.
    fn write_frame(&self, payload: &[u8]) -> CoreResult<()> {
        let header = self.header();
        let ring_bytes = header.ring_bytes as usize;
        let ring_mask = header.ring_mask as usize;

        let need = layout::frame_stride(payload.len() as u32);
        if need > ring_bytes {
            return Err(ipc_status(StatusCode::InvalidArgument, "frame exceeds ring size"));
        }

        let mut write = header.write_index.load(Ordering::Acquire);
        let read = header.read_index.load(Ordering::Acquire);
        let mut free = ring_bytes - layout::used_bytes(write, read, ring_bytes);

        let contiguous = layout::contiguous_from(write, ring_bytes, ring_mask);
        if contiguous < FRAME_HEADER_BYTES || contiguous < need {
            // The frame must stay physically contiguous: retire the tail with
            // a Wrap sentinel and restart at offset 0.
            if free < contiguous + need {
                return Err(ring_full());
            }
            if contiguous >= FRAME_HEADER_BYTES {
                let tail_off = write as usize & ring_mask;
                unsafe {
                    let wrap = self.base.add(tail_off) as *mut FrameHeader;
                    wrap.write(FrameHeader { size: 0, kind: FRAME_KIND_WRAP });
                }
            }
            write += contiguous as u64;
            header.write_index.store(write, Ordering::Release);

            let read = header.read_index.load(Ordering::Acquire);
            free = ring_bytes - layout::used_bytes(write, read, ring_bytes);
            if free < need {
                return Err(ring_full());
            }
        } else if free < need {
            return Err(ring_full());
        }

        let off = write as usize & ring_mask;
        unsafe {
            let ptr = self.base.add(off);
            (ptr as *mut FrameHeader)
                .write(FrameHeader { size: payload.len() as u32, kind: FRAME_KIND_DATA });
            if !payload.is_empty() {
                std::ptr::copy_nonoverlapping(
                    payload.as_ptr(),
                    ptr.add(FRAME_HEADER_BYTES),
                    payload.len(),
                );
            }
            let pad = need - FRAME_HEADER_BYTES - payload.len();
            if pad > 0 {
                std::ptr::write_bytes(ptr.add(FRAME_HEADER_BYTES + payload.len()), 0, pad);
            }
        }

        header.write_index.store(write + need as u64, Ordering::Release);
        header.send_ok.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Read one data frame into `buf`, skipping Wrap sentinels and short
    /// tails. Never consumes a frame it cannot deliver.
    fn read_frame(&self, message_max_bytes: u32, buf: &mut [u8]) -> CoreResult<u32> {
        let header = self.header();
        let ring_bytes = header.ring_bytes as usize;
        let ring_mask = header.ring_mask as usize;

        let mut read = header.read_index.load(Ordering::Acquire);
        let mut write = header.write_index.load(Ordering::Acquire);
        if read >= write {
            return Err(ring_empty());
        }

        let mut contiguous = layout::contiguous_from(read, ring_bytes, ring_mask);
        if contiguous < FRAME_HEADER_BYTES {
            // Tail too short to even hold a header; the writer skipped it.
            read += contiguous as u64;
            header.read_index.store(read, Ordering::Release);
            write = header.write_index.load(Ordering::Acquire);
            if read >= write {
                return Err(ring_empty());
            }
            contiguous = layout::contiguous_from(read, ring_bytes, ring_mask);
        }

        loop {
            let off = read as usize & ring_mask;
            let frame = unsafe { (self.base.add(off) as *const FrameHeader).read() };

            if frame.kind == FRAME_KIND_WRAP {
                read += contiguous as u64;
                header.read_index.store(read, Ordering::Release);
                write = header.write_index.load(Ordering::Acquire);
                if read >= write {
                    return Err(ring_empty());
                }
                contiguous = layout::contiguous_from(read, ring_bytes, ring_mask);
                if contiguous < FRAME_HEADER_BYTES {
                    read += contiguous as u64;
                    header.read_index.store(read, Ordering::Release);
                    write = header.write_index.load(Ordering::Acquire);
                    if read >= write {
                        return Err(ring_empty());
                    }
                    contiguous = layout::contiguous_from(read, ring_bytes, ring_mask);
                }
                continue;
            }

            if frame.kind != FRAME_KIND_DATA {
                return Err(ipc_status(StatusCode::InternalError, "corrupted frame marker"));
            }

            let required = frame.size;
            if required > message_max_bytes {
                return Err(ipc_status(StatusCode::InternalError, "corrupted frame size"));
            }

            let frame_bytes = layout::frame_stride(required);
            if frame_bytes > contiguous || read + frame_bytes as u64 > write {
                // Publish still in flight; retry later.
                return Err(Status::with_module(
                    StatusCode::WouldBlock,
                    "incomplete frame",
                    ErrorModule::Ipc,
                    DETAIL_QUEUE_EMPTY,
                ));
            }

            if required as usize > buf.len() {
                return Err(Status::with_module(
                    StatusCode::BufferTooSmall,
                    format!("buffer too small, required={}", required),
                    ErrorModule::Ipc,
                    0,
                ));
            }

            if required > 0 {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        self.base.add(off + FRAME_HEADER_BYTES),
                        buf.as_mut_ptr(),
                        required as usize,
                    );
                }
            }

            header.read_index.store(read + frame_bytes as u64, Ordering::Release);
            header.recv_ok.fetch_add(1, Ordering::Relaxed);
            return Ok(required);
        }
    }
}
