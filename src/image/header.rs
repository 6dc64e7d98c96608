//! Read-only handle over the header of a delivered frame

use crate::logbuffer::descriptor::{align_frame_length, compute_position};
use crate::logbuffer::frame::FrameHeader;

/// Handle passed to fragment handlers alongside each payload
///
/// Borrows the frame header in the mapped term buffer for the duration of
/// the handler call. Handlers that need the fields beyond the call should
/// take a [`values`](Header::values) snapshot rather than retain the handle.
#[derive(Debug)]
pub struct Header<'a> {
    frame: &'a FrameHeader,
    initial_term_id: i32,
    position_bits_to_shift: u32,
}

/// Snapshot of the header fields of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderValues {
    /// Total frame length in bytes, header included
    pub frame_length: i32,
    /// Protocol version of the frame
    pub version: i8,
    /// Fragmentation flags
    pub flags: u8,
    /// Frame type
    pub frame_type: i16,
    /// Offset of the frame within its term
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

impl<'a> Header<'a> {
    pub(crate) fn new(
        frame: &'a FrameHeader,
        initial_term_id: i32,
        position_bits_to_shift: u32,
    ) -> Self {
        Self {
            frame,
            initial_term_id,
            position_bits_to_shift,
        }
    }

    /// Snapshot of all header fields
    pub fn values(&self) -> HeaderValues {
        HeaderValues {
            frame_length: self.frame.frame_length,
            version: self.frame.version,
            flags: self.frame.flags,
            frame_type: self.frame.frame_type,
            term_offset: self.frame.term_offset,
            session_id: self.frame.session_id,
            stream_id: self.frame.stream_id,
            term_id: self.frame.term_id,
            reserved_value: self.frame.reserved_value,
        }
    }

    /// Total frame length in bytes, header included
    pub fn frame_length(&self) -> i32 {
        self.frame.frame_length
    }

    /// Frame type
    pub fn frame_type(&self) -> i16 {
        self.frame.frame_type
    }

    /// Fragmentation flags
    pub fn flags(&self) -> u8 {
        self.frame.flags
    }

    /// Session the frame belongs to
    pub fn session_id(&self) -> i32 {
        self.frame.session_id
    }

    /// Stream the frame belongs to
    pub fn stream_id(&self) -> i32 {
        self.frame.stream_id
    }

    /// Term the frame belongs to
    pub fn term_id(&self) -> i32 {
        self.frame.term_id
    }

    /// Offset of the frame within its term
    pub fn term_offset(&self) -> i32 {
        self.frame.term_offset
    }

    /// Term id the stream started with
    pub fn initial_term_id(&self) -> i32 {
        self.initial_term_id
    }

    /// Stream position at the end of this frame
    pub fn position(&self) -> i64 {
        let next_term_offset = align_frame_length(self.frame.term_offset + self.frame.frame_length);
        compute_position(
            self.frame.term_id,
            next_term_offset,
            self.position_bits_to_shift,
            self.initial_term_id,
        )
    }
}
