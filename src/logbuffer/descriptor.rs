//! Log buffer layout constants and stream position arithmetic
//!
//! A mapped log is three equally sized term buffers followed by a single
//! metadata page. A stream position is a 64-bit byte counter that grows
//! monotonically across all terms ever written; the term length is a power
//! of two, so every conversion between positions and (term id, term offset)
//! pairs reduces to shifts and masks.

use std::sync::atomic::AtomicI64;

use crate::error::{MonetError, Result};

/// Number of term buffers rotated through by a log
pub const PARTITION_COUNT: usize = 3;

/// Alignment of frames and positions within a term, in bytes
pub const FRAME_ALIGNMENT: i32 = 32;

/// Minimum supported term length (64 KiB)
pub const TERM_MIN_LENGTH: i32 = 64 * 1024;

/// Maximum supported term length (1 GiB)
pub const TERM_MAX_LENGTH: i32 = 1024 * 1024 * 1024;

/// Length of the metadata page that trails the three term buffers
pub const LOG_META_DATA_LENGTH: usize = 4096;

/// Validate a term length: power of two within the supported bounds
pub fn check_term_length(term_length: i32) -> Result<()> {
    if term_length < TERM_MIN_LENGTH
        || term_length > TERM_MAX_LENGTH
        || !(term_length as u32).is_power_of_two()
    {
        return Err(MonetError::invalid_parameter(
            "term_length",
            format!(
                "term length {} must be a power of 2 between {} and {}",
                term_length, TERM_MIN_LENGTH, TERM_MAX_LENGTH
            ),
        ));
    }

    Ok(())
}

/// Total mapped length of a log with the given term length
pub fn compute_log_length(term_length: i32) -> usize {
    (term_length as usize * PARTITION_COUNT) + LOG_META_DATA_LENGTH
}

/// Number of bits a position is shifted by to obtain its term count
pub fn position_bits_to_shift(term_length: i32) -> u32 {
    term_length.trailing_zeros()
}

/// Compute the stream position for a (term id, term offset) pair
///
/// The difference to the initial term id wraps in 32 bits so term id
/// rollover is handled; the product is sign-extended to 64 bits.
pub fn compute_position(term_id: i32, term_offset: i32, shift: u32, initial_term_id: i32) -> i64 {
    let term_count = term_id.wrapping_sub(initial_term_id) as i64;
    (term_count << shift) + term_offset as i64
}

/// Select the term buffer index active at `position`
///
/// Negative positions are not supported.
pub fn index_by_position(position: i64, shift: u32) -> usize {
    ((position >> shift) % PARTITION_COUNT as i64) as usize
}

/// Term id of the term containing `position`
pub fn term_id_from_position(position: i64, shift: u32, initial_term_id: i32) -> i32 {
    ((position >> shift) as i32).wrapping_add(initial_term_id)
}

/// Byte offset of `position` within its term
pub fn term_offset_from_position(position: i64, term_length: i32) -> i32 {
    (position & (term_length as i64 - 1)) as i32
}

/// Round a raw frame length up to the frame alignment
pub fn align_frame_length(length: i32) -> i32 {
    (length + (FRAME_ALIGNMENT - 1)) & !(FRAME_ALIGNMENT - 1)
}

/// Check whether a position sits on a frame alignment boundary
pub fn is_position_aligned(position: i64) -> bool {
    position & (FRAME_ALIGNMENT as i64 - 1) == 0
}

/// Pack a (term id, tail offset) pair into a 64-bit tail counter value
pub fn pack_tail(term_id: i32, tail_offset: i32) -> i64 {
    ((term_id as i64) << 32) | (tail_offset as i64 & 0xFFFF_FFFF)
}

/// Term id half of a packed tail counter value
pub fn term_id_from_tail(raw_tail: i64) -> i32 {
    (raw_tail >> 32) as i32
}

/// Tail offset half of a packed tail counter value, clamped to the term length
pub fn tail_offset_from_tail(raw_tail: i64, term_length: i32) -> i32 {
    std::cmp::min(raw_tail & 0xFFFF_FFFF, term_length as i64) as i32
}

/// Metadata block trailing the three term buffers of a mapped log
///
/// The tail counters are written by the publisher process while subscribers
/// hold the same mapping, so they are declared atomic. The remaining fields
/// are fixed at log creation.
#[repr(C)]
pub struct LogMetadata {
    /// Magic number for validation
    pub magic: u64,
    /// Version of the log layout
    pub version: u32,
    /// Length in bytes of each term buffer
    pub term_length: i32,
    /// Term id the stream started with
    pub initial_term_id: i32,
    /// Page size the backing file was created with
    pub page_size: i32,
    /// Correlation id assigned when the log was registered
    pub correlation_id: i64,
    /// Per-partition tail counters packing `(term_id << 32) | tail_offset`
    pub term_tail_counters: [AtomicI64; PARTITION_COUNT],
}

impl LogMetadata {
    /// Magic number constant
    pub const MAGIC: u64 = 0x4D4F_4E45_544C_4F47; // "MONETLOG"

    /// Current layout version constant
    pub const VERSION: u32 = 1;

    /// Initialize the metadata block for a freshly created log
    pub fn init(&mut self, term_length: i32, initial_term_id: i32, correlation_id: i64) {
        self.magic = Self::MAGIC;
        self.version = Self::VERSION;
        self.term_length = term_length;
        self.initial_term_id = initial_term_id;
        self.page_size = LOG_META_DATA_LENGTH as i32;
        self.correlation_id = correlation_id;

        // Inactive partitions start one rotation cycle behind the active one.
        for (index, counter) in self.term_tail_counters.iter_mut().enumerate() {
            let expected_term_id = if index == 0 {
                initial_term_id
            } else {
                initial_term_id.wrapping_add(index as i32 - PARTITION_COUNT as i32)
            };
            *counter = AtomicI64::new(pack_tail(expected_term_id, 0));
        }
    }

    /// Validate the metadata block of an opened log
    pub fn validate(&self, mapped_length: usize) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(MonetError::invalid_parameter(
                "magic",
                "invalid log metadata magic number",
            ));
        }

        if self.version != Self::VERSION {
            return Err(MonetError::version_mismatch(Self::VERSION, self.version));
        }

        check_term_length(self.term_length)?;

        if compute_log_length(self.term_length) != mapped_length {
            return Err(MonetError::invalid_parameter(
                "term_length",
                format!(
                    "term length {} inconsistent with mapped length {}",
                    self.term_length, mapped_length
                ),
            ));
        }

        Ok(())
    }

    /// Tail counter for the given partition index
    pub fn tail_counter(&self, index: usize) -> &AtomicI64 {
        &self.term_tail_counters[index]
    }
}
