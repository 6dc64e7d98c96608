//! # Monet - Zero-Copy Stream Image Polling
//!
//! Monet is the subscriber side of a shared-memory messaging transport: it
//! polls memory-mapped logs of framed messages written by a publisher
//! process and delivers payloads to user handlers without copying.
//!
//! ## Features
//!
//! - **Mapped term logs**: Three rotating term buffers plus a metadata page,
//!   file-backed or memfd-backed
//! - **Lock-free consumption**: Frame visibility via acquire-loaded frame
//!   lengths; no locks, no blocking, no dependence on publisher counters
//! - **Controlled polling**: Per-fragment abort/break/continue/commit flow
//!   control with committed-position visibility mid-poll
//! - **Bounded polling**: Consumption capped at a caller-supplied position,
//!   safe for bounds beyond `i32::MAX`
//! - **64-bit stream positions**: Shift-and-mask arithmetic between
//!   positions and (term id, term offset) pairs, tolerant of term id
//!   rollover
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Mapped Log                      │
//! ├──────────────┬──────────────┬──────────────┬────┤
//! │   term 0     │   term 1     │   term 2     │meta│
//! │  [frames...] │  [frames...] │  [frames...] │    │
//! └──────────────┴──────────────┴──────────────┴────┘
//!        ▲ publisher appends          ▲ tail counters
//!        │                            │
//!        ▼ subscriber polls           │
//! ┌─────────────────┐    ┌────────────────────────┐
//! │      Image      │───▶│  subscriber position   │
//! │  (poll engine)  │    │  (owned, 64-bit)       │
//! └─────────────────┘    └────────────────────────┘
//! ```
//!
//! A poll scans one term at a time: the subscriber position selects the
//! active term and offset, frame headers steer the scan, and the position
//! cell is advanced past everything consumed.

// Core modules
pub mod error;
pub mod image;
pub mod logbuffer;

// Main API re-exports
pub use error::{MonetError, Result};
pub use image::{ControlledAction, Header, HeaderValues, Image, PositionCell};
pub use logbuffer::{
    align_frame_length, compute_position, index_by_position, position_bits_to_shift,
    term_id_from_position, term_offset_from_position, BackingType, Frame, FrameHeader,
    LogBufferConfig, LogMetadata, MappedLogBuffer, DATA_HEADER_LENGTH, FRAME_ALIGNMENT,
    HDR_TYPE_DATA, HDR_TYPE_PAD, PARTITION_COUNT,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Default configuration constants
pub mod config {
    /// Default term buffer length (64 KiB)
    pub const DEFAULT_TERM_LENGTH: i32 = 64 * 1024;

    /// Default page size for log files
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// Default fragment limit for poll loops
    pub const DEFAULT_FRAGMENT_LIMIT: usize = 10;
}
