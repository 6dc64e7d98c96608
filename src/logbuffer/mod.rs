//! Log buffer layout, frame decoding, and memory mapping

pub mod descriptor;
pub mod frame;
pub mod map;

pub use descriptor::{
    align_frame_length, check_term_length, compute_log_length, compute_position,
    index_by_position, is_position_aligned, pack_tail, position_bits_to_shift, tail_offset_from_tail,
    term_id_from_position, term_id_from_tail, term_offset_from_position, LogMetadata,
    FRAME_ALIGNMENT, LOG_META_DATA_LENGTH, PARTITION_COUNT, TERM_MAX_LENGTH, TERM_MIN_LENGTH,
};
pub use frame::{Frame, FrameHeader, DATA_HEADER_LENGTH, HDR_TYPE_DATA, HDR_TYPE_PAD};
pub use map::{BackingType, LogBufferConfig, MappedLogBuffer};
