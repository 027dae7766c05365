/*!
 * Status Taxonomy
 * Centralized status codes, packed error codes, and the error catalog
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable status codes shared by every subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    InvalidArgument,
    NotInitialized,
    AlreadyInitialized,
    NotFound,
    WouldBlock,
    BufferTooSmall,
    IoError,
    InternalError,
    Unsupported,
}

impl StatusCode {
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::NotInitialized => "not_initialized",
            StatusCode::AlreadyInitialized => "already_initialized",
            StatusCode::NotFound => "not_found",
            StatusCode::WouldBlock => "would_block",
            StatusCode::BufferTooSmall => "buffer_too_small",
            StatusCode::IoError => "io_error",
            StatusCode::InternalError => "internal_error",
            StatusCode::Unsupported => "unsupported",
        }
    }
}

/// Module identifiers embedded in packed error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ErrorModule {
    Core = 0x00,
    Api = 0x01,
    Log = 0x10,
    Ipc = 0x20,
    Memory = 0x30,
    Concurrent = 0x40,
    Task = 0x50,
    Json = 0x60,
}

impl ErrorModule {
    pub fn name(self) -> &'static str {
        match self {
            ErrorModule::Core => "core",
            ErrorModule::Api => "api",
            ErrorModule::Log => "log",
            ErrorModule::Ipc => "ipc",
            ErrorModule::Memory => "memory",
            ErrorModule::Concurrent => "concurrent",
            ErrorModule::Task => "task",
            ErrorModule::Json => "json",
        }
    }
}

/// Pack a status into a stable `u32` code.
///
/// Layout: `0xMMSDDDDD`: module id in the top byte, status code family in
/// the next 4 bits, module-local detail id in the low 20 bits.
pub const fn make_error_code(module: ErrorModule, code: StatusCode, detail_id: u32) -> u32 {
    ((module as u32) << 24) | (((code as u32) & 0x0F) << 20) | (detail_id & 0x000F_FFFF)
}

/// Render a packed code as `"0x%08X"`
pub fn format_code_hex(packed: u32) -> String {
    format!("0x{:08X}", packed)
}

/// One row of the static error catalog
pub struct CatalogEntry {
    pub code: u32,
    pub symbol: &'static str,
    pub description: &'static str,
}

macro_rules! catalog_entry {
    ($module:ident, $code:ident, $detail:expr, $symbol:expr, $description:expr) => {
        CatalogEntry {
            code: make_error_code(ErrorModule::$module, StatusCode::$code, $detail),
            symbol: $symbol,
            description: $description,
        }
    };
}

/// Unified lookup table for diagnostics. Missing entries are legal; lookups
/// fall back to "unknown". Keep appending rows as modules grow detail ids.
pub static ERROR_CATALOG: &[CatalogEntry] = &[
    catalog_entry!(Core, Ok, 0x0000, "CORE_OK", "Operation succeeded"),
    catalog_entry!(Core, InvalidArgument, 0x0000, "CORE_INVALID_ARGUMENT", "Invalid argument"),
    catalog_entry!(Core, NotInitialized, 0x0000, "CORE_NOT_INITIALIZED", "Object not initialized"),
    catalog_entry!(
        Core,
        AlreadyInitialized,
        0x0000,
        "CORE_ALREADY_INITIALIZED",
        "Object already initialized"
    ),
    catalog_entry!(Core, NotFound, 0x0000, "CORE_NOT_FOUND", "Resource not found"),
    catalog_entry!(Core, WouldBlock, 0x0000, "CORE_WOULD_BLOCK", "Operation would block"),
    catalog_entry!(Core, BufferTooSmall, 0x0000, "CORE_BUFFER_TOO_SMALL", "Buffer is too small"),
    catalog_entry!(Core, IoError, 0x0000, "CORE_IO_ERROR", "I/O error"),
    catalog_entry!(Core, InternalError, 0x0000, "CORE_INTERNAL_ERROR", "Internal error"),
    catalog_entry!(Core, Unsupported, 0x0000, "CORE_UNSUPPORTED", "Operation unsupported"),
    catalog_entry!(Task, WouldBlock, 0x0001, "TASK_QUEUE_FULL", "Task queue is full"),
    catalog_entry!(Ipc, WouldBlock, 0x0001, "IPC_QUEUE_FULL", "IPC channel queue is full"),
    catalog_entry!(Ipc, WouldBlock, 0x0002, "IPC_QUEUE_EMPTY", "IPC channel has no message"),
    catalog_entry!(
        Memory,
        InvalidArgument,
        0x0001,
        "MEM_INVALID_ALIGNMENT",
        "Invalid memory alignment"
    ),
    catalog_entry!(Json, InvalidArgument, 0x0001, "JSON_PARSE_FAILED", "JSON parse failed"),
    catalog_entry!(Concurrent, WouldBlock, 0x0001, "QUEUE_FULL", "Concurrent queue is full"),
    catalog_entry!(Concurrent, WouldBlock, 0x0002, "QUEUE_EMPTY", "Concurrent queue is empty"),
];

/// Look up a packed code in the catalog
pub fn find_catalog_entry(packed: u32) -> Option<&'static CatalogEntry> {
    ERROR_CATALOG.iter().find(|entry| entry.code == packed)
}

/// Symbol for a packed code, falling back for uncataloged codes
pub fn catalog_symbol(packed: u32) -> &'static str {
    find_catalog_entry(packed).map(|entry| entry.symbol).unwrap_or("unknown")
}

/// Failure value carried by every fallible operation in the crate.
///
/// A `Status` always represents a failure; success is `Ok(T)` of
/// [`CoreResult`]. `StatusCode::Ok` exists only for packed-code and catalog
/// compatibility.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[error("{message} [{}]", format_code_hex(*.packed))]
pub struct Status {
    code: StatusCode,
    message: String,
    packed: u32,
}

impl Status {
    /// Create a status in the `Core` module family
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            packed: make_error_code(ErrorModule::Core, code, 0),
        }
    }

    /// Create a status attributed to a specific module and detail id
    pub fn with_module(
        code: StatusCode,
        message: impl Into<String>,
        module: ErrorModule,
        detail_id: u32,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            packed: make_error_code(module, code, detail_id),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn packed_code(&self) -> u32 {
        self.packed
    }

    pub fn hex_code_string(&self) -> String {
        format_code_hex(self.packed)
    }
}

/// Result type for toolkit operations
pub type CoreResult<T> = Result<T, Status>;
