//! Subscriber position reporting and repositioning

mod common;

use common::*;
use monet::MonetError;

#[test]
fn test_position_reflects_join_position() {
    let log = TestLog::new();
    let expected = TERM_LENGTH as i64 - 32;
    let image = log.image_at(expected);

    assert_eq!(image.position(), expected);
}

#[test]
fn test_set_position_to_end_of_term() {
    let log = TestLog::new();
    let image = log.image_at(TERM_LENGTH as i64 - 32);

    image.set_position(TERM_LENGTH as i64).unwrap();

    assert_eq!(image.position(), TERM_LENGTH as i64);
}

#[test]
fn test_set_position_cannot_pass_end_of_term() {
    let log = TestLog::new();
    let expected = TERM_LENGTH as i64 - 32;
    let image = log.image_at(expected);

    let result = image.set_position(TERM_LENGTH as i64 + 32);

    assert!(matches!(result, Err(MonetError::PositionOutOfRange { .. })));
    assert_eq!(image.position(), expected);
}

#[test]
fn test_set_position_at_term_boundary() {
    let log = TestLog::new();
    let term_start = TERM_LENGTH as i64;
    let image = log.image_at(term_start);

    // Repositioning to the current position is a no-op.
    image.set_position(term_start).unwrap();
    assert_eq!(image.position(), term_start);

    // From a term boundary, a full term ahead is the whole valid window.
    image.set_position(term_start + TERM_LENGTH as i64).unwrap();
    assert_eq!(image.position(), term_start + TERM_LENGTH as i64);
}

#[test]
fn test_set_position_rejects_one_frame_past_window() {
    let log = TestLog::new();
    let term_start = TERM_LENGTH as i64;
    let image = log.image_at(term_start);

    let result = image.set_position(term_start + TERM_LENGTH as i64 + 32);

    assert!(matches!(result, Err(MonetError::PositionOutOfRange { .. })));
    assert_eq!(image.position(), term_start);
}

#[test]
fn test_set_position_rejects_rewind() {
    let log = TestLog::new();
    let term_start = TERM_LENGTH as i64;
    let image = log.image_at(term_start);

    let result = image.set_position(term_start - 32);

    assert!(matches!(result, Err(MonetError::PositionOutOfRange { .. })));
    assert_eq!(image.position(), term_start);
}

#[test]
fn test_set_position_rejects_misaligned_position() {
    let log = TestLog::new();
    let image = log.image_at(0);

    let result = image.set_position(48);

    assert!(matches!(result, Err(MonetError::Alignment { .. })));
    assert_eq!(image.position(), 0);
}

#[test]
fn test_set_position_on_closed_image_is_inert() {
    let log = TestLog::new();
    let image = log.image_at(0);

    image.close();

    image.set_position(32).unwrap();
    assert_eq!(image.position(), 0);
}

#[test]
fn test_polling_advances_reported_position() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    assert_eq!(image.position(), 0);

    image.poll(|_, _| {}, usize::MAX);
    assert_eq!(image.position(), aligned);

    log.append_message(aligned, MESSAGE_LENGTH);
    image.poll(|_, _| {}, usize::MAX);
    assert_eq!(image.position(), 2 * aligned);
}
