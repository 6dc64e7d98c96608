//! Subscriber image: one consumer's view of a publication stream
//!
//! An [`Image`] advances a subscriber position over the mapped log of one
//! publication and delivers message payloads to user handlers. Each poll
//! call scans at most the term containing the current position; callers
//! loop to cross term boundaries.

pub mod header;
pub mod position;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{MonetError, Result};
use crate::logbuffer::descriptor::{
    align_frame_length, index_by_position, is_position_aligned, position_bits_to_shift,
    term_offset_from_position, FRAME_ALIGNMENT,
};
use crate::logbuffer::frame::{self, Frame, FrameHeader, DATA_HEADER_LENGTH};
use crate::logbuffer::map::MappedLogBuffer;

pub use header::{Header, HeaderValues};
pub use position::PositionCell;

/// Disposition returned by a controlled fragment handler
///
/// Steers the poll loop after each delivered fragment. The variants are
/// matched exhaustively; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledAction {
    /// Discard this fragment and stop; the position does not move past it
    Abort,
    /// Keep this fragment and stop; the position moves past it
    Break,
    /// Keep this fragment and continue; the position is written at the end
    /// of the poll
    Continue,
    /// Keep this fragment, write the position immediately, and continue;
    /// a later abort rolls back only past this point
    Commit,
}

/// A subscriber's view of one publication stream over a mapped log
///
/// The image exclusively owns its subscriber position cell. Polling
/// operations are not synchronized against each other; callers serialize
/// access per image. The mapped log is shared with the publisher process,
/// which appends frames concurrently: the poll loop keys off acquire-loaded
/// frame lengths alone and never off the publisher's tail counters, so a
/// slow tail update can never stall a subscriber.
#[derive(Debug)]
pub struct Image {
    /// The mapped log this image consumes
    log: Arc<MappedLogBuffer>,
    /// Subscriber position cell, written only by this image
    subscriber_position: PositionCell,
    /// Source identity of the publisher, as reported by the driver
    source_identity: String,
    /// Correlation id of the image registration
    correlation_id: i64,
    /// Session id of the publication
    session_id: i32,
    /// Counter id of the subscriber position
    subscriber_position_id: i32,
    /// Term id the stream started with
    initial_term_id: i32,
    /// Length in bytes of each term buffer
    term_length: i32,
    /// Mask for extracting a term offset from a position
    term_length_mask: i64,
    /// Bits a position is shifted by to obtain its term count
    position_bits_to_shift: u32,
    /// Set once the image is closed; closed images poll as empty
    is_closed: AtomicBool,
}

impl Image {
    /// Create an image over a mapped log
    ///
    /// `initial_position` is the join position supplied by the driver; it
    /// must be non-negative and frame aligned. Term length and initial term
    /// id are taken from the log metadata.
    pub fn new(
        log: Arc<MappedLogBuffer>,
        subscriber_position_id: i32,
        initial_position: i64,
        correlation_id: i64,
        session_id: i32,
        source_identity: impl Into<String>,
    ) -> Result<Self> {
        if initial_position < 0 {
            return Err(MonetError::invalid_parameter(
                "initial_position",
                "initial position cannot be negative",
            ));
        }

        if !is_position_aligned(initial_position) {
            return Err(MonetError::alignment(initial_position, FRAME_ALIGNMENT));
        }

        let term_length = log.term_length();
        let initial_term_id = log.metadata().initial_term_id;

        Ok(Self {
            log,
            subscriber_position: PositionCell::new(initial_position),
            source_identity: source_identity.into(),
            correlation_id,
            session_id,
            subscriber_position_id,
            initial_term_id,
            term_length,
            term_length_mask: term_length as i64 - 1,
            position_bits_to_shift: position_bits_to_shift(term_length),
            is_closed: AtomicBool::new(false),
        })
    }

    /// Current subscriber position
    pub fn position(&self) -> i64 {
        self.subscriber_position.load_acquire()
    }

    /// Move the subscriber position to `new_position`
    ///
    /// The position must be frame aligned and within the window from the
    /// current position to the end of the term containing it. On a closed
    /// image a valid position is accepted but not applied.
    pub fn set_position(&self, new_position: i64) -> Result<()> {
        let current = self.subscriber_position.load_acquire();
        let limit = (current - (current & self.term_length_mask)) + self.term_length as i64;

        if !is_position_aligned(new_position) {
            return Err(MonetError::alignment(new_position, FRAME_ALIGNMENT));
        }

        if new_position < current || new_position > limit {
            return Err(MonetError::position_out_of_range(
                new_position, current, limit,
            ));
        }

        if !self.is_closed() {
            self.subscriber_position.store_release(new_position);
        }

        Ok(())
    }

    /// Poll for new fragments, delivering each to `handler`
    ///
    /// Scans forward within the term containing the current position until
    /// `fragment_limit` data fragments have been delivered, an unwritten
    /// frame is reached, or the term ends. Padding frames advance the
    /// position without invoking the handler. The position cell is written
    /// once, after the scan.
    ///
    /// Returns the number of fragments delivered.
    pub fn poll<F>(&self, mut handler: F, fragment_limit: usize) -> usize
    where
        F: FnMut(&[u8], &Header),
    {
        if self.is_closed() {
            return 0;
        }

        let position = self.subscriber_position.load_acquire();
        let initial_offset = term_offset_from_position(position, self.term_length);
        let index = index_by_position(position, self.position_bits_to_shift);
        let term = self.log.term_buffer(index);
        let capacity = self.term_length;

        let mut offset = initial_offset;
        let mut fragments_read = 0usize;

        while fragments_read < fragment_limit && offset < capacity {
            match unsafe { frame::peek(term, offset, capacity) } {
                Frame::Empty => break,
                Frame::Padding { length } => {
                    offset += align_frame_length(length);
                }
                Frame::Data { length } => {
                    let frame_offset = offset;
                    offset += align_frame_length(length);

                    self.dispatch(term, frame_offset, length, &mut handler);
                    fragments_read += 1;
                }
            }
        }

        let new_position = position + (offset - initial_offset) as i64;
        if new_position > position {
            self.subscriber_position.store_release(new_position);
        }

        fragments_read
    }

    /// Poll for new fragments with per-fragment flow control
    ///
    /// Like [`poll`](Image::poll), but the handler steers the scan through
    /// its returned [`ControlledAction`]. A commit makes the position cell
    /// visible before the next handler invocation; an abort discards only
    /// the fragments delivered since the last commit.
    pub fn controlled_poll<F>(&self, mut handler: F, fragment_limit: usize) -> usize
    where
        F: FnMut(&[u8], &Header) -> ControlledAction,
    {
        if self.is_closed() {
            return 0;
        }

        let mut initial_position = self.subscriber_position.load_acquire();
        let mut initial_offset = term_offset_from_position(initial_position, self.term_length);
        let index = index_by_position(initial_position, self.position_bits_to_shift);
        let term = self.log.term_buffer(index);
        let capacity = self.term_length;

        let mut offset = initial_offset;
        let mut fragments_read = 0usize;

        'scan: while fragments_read < fragment_limit && offset < capacity {
            match unsafe { frame::peek(term, offset, capacity) } {
                Frame::Empty => break,
                Frame::Padding { length } => {
                    offset += align_frame_length(length);
                }
                Frame::Data { length } => {
                    let frame_offset = offset;
                    let aligned_length = align_frame_length(length);
                    offset += aligned_length;

                    match self.dispatch(term, frame_offset, length, &mut handler) {
                        ControlledAction::Abort => {
                            offset -= aligned_length;
                            break 'scan;
                        }
                        ControlledAction::Break => {
                            fragments_read += 1;
                            break 'scan;
                        }
                        ControlledAction::Commit => {
                            fragments_read += 1;
                            initial_position += (offset - initial_offset) as i64;
                            initial_offset = offset;
                            self.subscriber_position.store_release(initial_position);
                        }
                        ControlledAction::Continue => {
                            fragments_read += 1;
                        }
                    }
                }
            }
        }

        let new_position = initial_position + (offset - initial_offset) as i64;
        if new_position > initial_position {
            self.subscriber_position.store_release(new_position);
        }

        fragments_read
    }

    /// Poll for new fragments up to a bounding position
    ///
    /// Like [`poll`](Image::poll), but a data fragment whose aligned end
    /// would carry the position past `max_position` is not delivered.
    /// Padding runs to the end of the term regardless of the bound.
    pub fn bounded_poll<F>(&self, mut handler: F, max_position: i64, fragment_limit: usize) -> usize
    where
        F: FnMut(&[u8], &Header),
    {
        if self.is_closed() {
            return 0;
        }

        let position = self.subscriber_position.load_acquire();
        let initial_offset = term_offset_from_position(position, self.term_length);
        let index = index_by_position(position, self.position_bits_to_shift);
        let term = self.log.term_buffer(index);
        let capacity = self.term_length;
        let end_offset = Self::bounded_end_offset(initial_offset, position, max_position, capacity);

        let mut offset = initial_offset;
        let mut fragments_read = 0usize;

        while fragments_read < fragment_limit && (offset as i64) < end_offset {
            match unsafe { frame::peek(term, offset, capacity) } {
                Frame::Empty => break,
                Frame::Padding { length } => {
                    offset += align_frame_length(length);
                }
                Frame::Data { length } => {
                    let frame_offset = offset;
                    let aligned_length = align_frame_length(length);
                    offset += aligned_length;

                    if offset as i64 > end_offset {
                        offset -= aligned_length;
                        break;
                    }

                    self.dispatch(term, frame_offset, length, &mut handler);
                    fragments_read += 1;
                }
            }
        }

        let new_position = position + (offset - initial_offset) as i64;
        if new_position > position {
            self.subscriber_position.store_release(new_position);
        }

        fragments_read
    }

    /// Poll with both per-fragment flow control and a bounding position
    ///
    /// Combines [`controlled_poll`](Image::controlled_poll) and
    /// [`bounded_poll`](Image::bounded_poll).
    pub fn bounded_controlled_poll<F>(
        &self,
        mut handler: F,
        max_position: i64,
        fragment_limit: usize,
    ) -> usize
    where
        F: FnMut(&[u8], &Header) -> ControlledAction,
    {
        if self.is_closed() {
            return 0;
        }

        let mut initial_position = self.subscriber_position.load_acquire();
        let mut initial_offset = term_offset_from_position(initial_position, self.term_length);
        let index = index_by_position(initial_position, self.position_bits_to_shift);
        let term = self.log.term_buffer(index);
        let capacity = self.term_length;
        let end_offset =
            Self::bounded_end_offset(initial_offset, initial_position, max_position, capacity);

        let mut offset = initial_offset;
        let mut fragments_read = 0usize;

        'scan: while fragments_read < fragment_limit && (offset as i64) < end_offset {
            match unsafe { frame::peek(term, offset, capacity) } {
                Frame::Empty => break,
                Frame::Padding { length } => {
                    offset += align_frame_length(length);
                }
                Frame::Data { length } => {
                    let frame_offset = offset;
                    let aligned_length = align_frame_length(length);
                    offset += aligned_length;

                    if offset as i64 > end_offset {
                        offset -= aligned_length;
                        break 'scan;
                    }

                    match self.dispatch(term, frame_offset, length, &mut handler) {
                        ControlledAction::Abort => {
                            offset -= aligned_length;
                            break 'scan;
                        }
                        ControlledAction::Break => {
                            fragments_read += 1;
                            break 'scan;
                        }
                        ControlledAction::Commit => {
                            fragments_read += 1;
                            initial_position += (offset - initial_offset) as i64;
                            initial_offset = offset;
                            self.subscriber_position.store_release(initial_position);
                        }
                        ControlledAction::Continue => {
                            fragments_read += 1;
                        }
                    }
                }
            }
        }

        let new_position = initial_position + (offset - initial_offset) as i64;
        if new_position > initial_position {
            self.subscriber_position.store_release(new_position);
        }

        fragments_read
    }

    /// Close the image; all subsequent polls return 0 without side effects
    pub fn close(&self) {
        if !self.is_closed.swap(true, Ordering::AcqRel) {
            debug!(
                correlation_id = self.correlation_id,
                session_id = self.session_id,
                "closing image"
            );
        }
    }

    /// Whether the image has been closed
    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    /// Length in bytes of each term buffer
    pub fn term_length(&self) -> i32 {
        self.term_length
    }

    /// Term id the stream started with
    pub fn initial_term_id(&self) -> i32 {
        self.initial_term_id
    }

    /// Session id of the publication
    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    /// Correlation id of the image registration
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Counter id of the subscriber position
    pub fn subscriber_position_id(&self) -> i32 {
        self.subscriber_position_id
    }

    /// Source identity of the publisher
    pub fn source_identity(&self) -> &str {
        &self.source_identity
    }

    /// Scan window end for a bounded poll, as an offset within the term
    ///
    /// Computed in 64 bits so bounds beyond `i32::MAX` clamp to the term
    /// length instead of overflowing.
    fn bounded_end_offset(
        initial_offset: i32,
        position: i64,
        max_position: i64,
        capacity: i32,
    ) -> i64 {
        let window = (initial_offset as i64).saturating_add(max_position.saturating_sub(position));
        std::cmp::min(capacity as i64, window)
    }

    /// Hand one data frame's payload and header to a handler
    fn dispatch<R>(
        &self,
        term: *const u8,
        frame_offset: i32,
        length: i32,
        f: impl FnOnce(&[u8], &Header) -> R,
    ) -> R {
        let header_ref = unsafe { &*(term.add(frame_offset as usize) as *const FrameHeader) };
        let header = Header::new(header_ref, self.initial_term_id, self.position_bits_to_shift);
        let payload = unsafe {
            std::slice::from_raw_parts(
                term.add((frame_offset + DATA_HEADER_LENGTH) as usize),
                (length - DATA_HEADER_LENGTH) as usize,
            )
        };

        f(payload, &header)
    }
}
