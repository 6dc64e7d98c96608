//! Frame headers and frame decoding within a term buffer
//!
//! Every unit in a term is a fixed-size header followed by an optional
//! payload. The publisher finishes a frame by release-storing its length,
//! so a subscriber that acquire-loads a non-zero length is guaranteed to
//! observe the rest of the header and the payload bytes.

use std::sync::atomic::{AtomicI32, Ordering};

use super::descriptor::align_frame_length;

/// Length in bytes of a frame header
pub const DATA_HEADER_LENGTH: i32 = 32;

/// Frame type value for padding frames
pub const HDR_TYPE_PAD: i16 = 0x00;

/// Frame type value for data frames
pub const HDR_TYPE_DATA: i16 = 0x01;

/// Current frame header version
pub const FRAME_VERSION: i8 = 0;

/// Flags value marking a single-fragment message (begin and end set)
pub const FRAME_FLAGS_UNFRAGMENTED: u8 = 0xC0;

/// Fixed-size header prefixing every frame in a term buffer
///
/// All fields are little-endian on the wire. `frame_length` is the first
/// field and doubles as the publication barrier: zero means the frame has
/// not been written yet.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Total frame length in bytes, header included
    pub frame_length: i32,
    /// Protocol version of the frame
    pub version: i8,
    /// Fragmentation flags
    pub flags: u8,
    /// Frame type, distinguishing data from padding
    pub frame_type: i16,
    /// Offset of this frame within its term
    pub term_offset: i32,
    /// Session the frame belongs to
    pub session_id: i32,
    /// Stream the frame belongs to
    pub stream_id: i32,
    /// Term the frame belongs to
    pub term_id: i32,
    /// Reserved for application use
    pub reserved_value: i64,
}

impl FrameHeader {
    /// Size of the frame header in bytes
    pub const LENGTH: usize = std::mem::size_of::<FrameHeader>();

    /// Check whether this header describes a padding frame
    pub fn is_padding(&self) -> bool {
        self.frame_type == HDR_TYPE_PAD
    }
}

/// Decoded view of the frame at one term offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// No frame has been published at this offset yet
    Empty,
    /// A data frame of the given raw length
    Data { length: i32 },
    /// A padding frame of the given raw length
    Padding { length: i32 },
}

impl Frame {
    /// Aligned length the scan advances by for this frame, zero when empty
    pub fn aligned_length(&self) -> i32 {
        match self {
            Frame::Empty => 0,
            Frame::Data { length } | Frame::Padding { length } => align_frame_length(*length),
        }
    }
}

/// Acquire-load the frame length at `offset` within a term buffer
///
/// # Safety
///
/// `term_ptr` must point at a term buffer of at least `offset + 4` readable
/// bytes and `offset` must be frame aligned.
pub unsafe fn frame_length_volatile(term_ptr: *const u8, offset: i32) -> i32 {
    let length = &*(term_ptr.add(offset as usize) as *const AtomicI32);
    i32::from_le(length.load(Ordering::Acquire))
}

/// Decode the frame at `offset` within a term buffer of length `capacity`
///
/// A zero or negative length reads as [`Frame::Empty`], as does a length
/// shorter than a header or extending past the end of the term: the scan
/// must stop without advancing in all three cases.
///
/// # Safety
///
/// `term_ptr` must point at a readable term buffer of `capacity` bytes and
/// `offset` must be frame aligned and within the term.
pub unsafe fn peek(term_ptr: *const u8, offset: i32, capacity: i32) -> Frame {
    let length = frame_length_volatile(term_ptr, offset);

    if length < DATA_HEADER_LENGTH || length > capacity - offset {
        return Frame::Empty;
    }

    let header = &*(term_ptr.add(offset as usize) as *const FrameHeader);
    if header.is_padding() {
        Frame::Padding { length }
    } else {
        Frame::Data { length }
    }
}
