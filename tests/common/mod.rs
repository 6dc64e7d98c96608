//! Shared fixtures for image integration tests
//!
//! The log is written the way a publisher would: payload and header first,
//! frame length release-stored last so the subscriber's acquire load
//! observes complete frames only.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use monet::logbuffer::descriptor::{
    align_frame_length, compute_position, index_by_position, pack_tail, position_bits_to_shift,
    term_id_from_position, term_offset_from_position,
};
use monet::logbuffer::frame::{
    FrameHeader, DATA_HEADER_LENGTH, FRAME_FLAGS_UNFRAGMENTED, FRAME_VERSION, HDR_TYPE_DATA,
    HDR_TYPE_PAD,
};
use monet::{Image, LogBufferConfig, MappedLogBuffer};

pub const TERM_LENGTH: i32 = 64 * 1024;
pub const INITIAL_TERM_ID: i32 = 1234;
pub const STREAM_ID: i32 = 101;
pub const SESSION_ID: i32 = 110;
pub const CORRELATION_ID: i64 = 27;
pub const SUBSCRIBER_POSITION_ID: i32 = 49;
pub const MESSAGE_LENGTH: usize = 120;

/// A freshly created log buffer in a temp directory, with append helpers
pub struct TestLog {
    pub log: Arc<MappedLogBuffer>,
    shift: u32,
    _dir: TempDir,
}

impl TestLog {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("image.logbuffer");

        let config = LogBufferConfig::new("image-test", TERM_LENGTH)
            .with_initial_term_id(INITIAL_TERM_ID)
            .with_correlation_id(CORRELATION_ID)
            .with_file_path(&path);

        let log = Arc::new(MappedLogBuffer::new(config).expect("create log"));

        Self {
            log,
            shift: position_bits_to_shift(TERM_LENGTH),
            _dir: dir,
        }
    }

    /// Build an image over this log joined at `initial_position`
    pub fn image_at(&self, initial_position: i64) -> Image {
        Image::new(
            self.log.clone(),
            SUBSCRIBER_POSITION_ID,
            initial_position,
            CORRELATION_ID,
            SESSION_ID,
            "none",
        )
        .expect("create image")
    }

    /// Append one message at `position`
    ///
    /// Writes a padding frame to the end of the term instead when the
    /// message would not fit, the same way the publisher-side appender
    /// trips over a term boundary.
    pub fn append_message(&self, position: i64, length: usize) {
        let index = index_by_position(position, self.shift);
        let term_id = term_id_from_position(position, self.shift, INITIAL_TERM_ID);
        let term_offset = term_offset_from_position(position, TERM_LENGTH);

        let frame_length = length as i32 + DATA_HEADER_LENGTH;
        let aligned_length = align_frame_length(frame_length);
        let resulting_offset = term_offset + aligned_length;

        let term = unsafe { self.log.term_buffer_mut(index) };

        if resulting_offset > TERM_LENGTH {
            self.write_frame(term, term_offset, TERM_LENGTH - term_offset, HDR_TYPE_PAD, term_id);
            self.log
                .metadata()
                .tail_counter(index)
                .store(pack_tail(term_id, TERM_LENGTH), Ordering::Release);
        } else {
            unsafe {
                let payload = term.add((term_offset + DATA_HEADER_LENGTH) as usize);
                for i in 0..length {
                    *payload.add(i) = (i % 251) as u8;
                }
            }
            self.write_frame(term, term_offset, frame_length, HDR_TYPE_DATA, term_id);
            self.log
                .metadata()
                .tail_counter(index)
                .store(pack_tail(term_id, resulting_offset), Ordering::Release);
        }
    }

    fn write_frame(
        &self,
        term: *mut u8,
        term_offset: i32,
        frame_length: i32,
        frame_type: i16,
        term_id: i32,
    ) {
        let header = FrameHeader {
            frame_length: 0,
            version: FRAME_VERSION,
            flags: FRAME_FLAGS_UNFRAGMENTED,
            frame_type,
            term_offset,
            session_id: SESSION_ID,
            stream_id: STREAM_ID,
            term_id,
            reserved_value: 0,
        };

        unsafe {
            std::ptr::write(term.add(term_offset as usize) as *mut FrameHeader, header);

            let length_cell = &*(term.add(term_offset as usize) as *const AtomicI32);
            length_cell.store(frame_length.to_le(), Ordering::Release);
        }
    }

    /// Address a delivered payload is expected to start at
    pub fn payload_address(&self, index: usize, term_offset: i32) -> usize {
        self.log.term_buffer(index) as usize + term_offset as usize + DATA_HEADER_LENGTH as usize
    }
}

/// Aligned length a message of `length` payload bytes occupies in a term
pub fn aligned_message_length(length: usize) -> i64 {
    align_frame_length(length as i32 + DATA_HEADER_LENGTH) as i64
}

/// Stream position of (`term_id`, `term_offset`) for the test log geometry
pub fn position_at(term_id: i32, term_offset: i32) -> i64 {
    compute_position(
        term_id,
        term_offset,
        position_bits_to_shift(TERM_LENGTH),
        INITIAL_TERM_ID,
    )
}
