//! Controlled polling: per-fragment abort, break, continue, and commit

mod common;

use common::*;
use monet::logbuffer::frame::HDR_TYPE_DATA;
use monet::ControlledAction;

#[test]
fn test_no_fragments_for_empty_term() {
    let log = TestLog::new();
    let image = log.image_at(0);

    let mut called = false;
    let fragments = image.controlled_poll(
        |_, _| {
            called = true;
            ControlledAction::Continue
        },
        usize::MAX,
    );

    assert_eq!(fragments, 0);
    assert!(!called);
    assert_eq!(image.position(), 0);
}

#[test]
fn test_continue_delivers_one_fragment() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);

    let expected_payload = log.payload_address(0, 0);
    let fragments = image.controlled_poll(
        |payload, header| {
            assert_eq!(payload.as_ptr() as usize, expected_payload);
            assert_eq!(payload.len(), MESSAGE_LENGTH);
            assert_eq!(header.frame_type(), HDR_TYPE_DATA);
            ControlledAction::Continue
        },
        usize::MAX,
    );

    assert_eq!(fragments, 1);
    assert_eq!(image.position(), aligned);
}

#[test]
fn test_abort_leaves_position_unchanged() {
    let log = TestLog::new();
    let image = log.image_at(0);

    log.append_message(0, MESSAGE_LENGTH);

    let fragments = image.controlled_poll(|_, _| ControlledAction::Abort, usize::MAX);

    assert_eq!(fragments, 0);
    assert_eq!(image.position(), 0);
}

#[test]
fn test_abort_keeps_previously_continued_fragments() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);

    let mut fragment_count = 0;
    let fragments = image.controlled_poll(
        |_, _| {
            fragment_count += 1;
            if fragment_count == 1 {
                ControlledAction::Continue
            } else {
                ControlledAction::Abort
            }
        },
        usize::MAX,
    );

    assert_eq!(fragments, 1);
    assert_eq!(image.position(), aligned);
}

#[test]
fn test_break_stops_after_first_fragment() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);

    let expected_payload = log.payload_address(0, 0);
    let fragments = image.controlled_poll(
        |payload, header| {
            assert_eq!(payload.as_ptr() as usize, expected_payload);
            assert_eq!(payload.len(), MESSAGE_LENGTH);
            assert_eq!(header.values().frame_type, HDR_TYPE_DATA);
            ControlledAction::Break
        },
        usize::MAX,
    );

    assert_eq!(fragments, 1);
    assert_eq!(image.position(), aligned);
}

#[test]
fn test_commit_is_visible_before_next_fragment() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);

    let mut fragment_count = 0;
    let fragments = image.controlled_poll(
        |payload, _| {
            fragment_count += 1;

            match fragment_count {
                1 => {
                    assert_eq!(image.position(), 0);
                    assert_eq!(payload.as_ptr() as usize, log.payload_address(0, 0));
                }
                2 => {
                    // The first fragment's commit has already landed.
                    assert_eq!(image.position(), aligned);
                    assert_eq!(
                        payload.as_ptr() as usize,
                        log.payload_address(0, aligned as i32)
                    );
                }
                _ => unreachable!(),
            }

            assert_eq!(payload.len(), MESSAGE_LENGTH);
            ControlledAction::Commit
        },
        usize::MAX,
    );

    assert_eq!(fragments, 2);
    assert_eq!(image.position(), aligned * 2);
}

#[test]
fn test_commit_covers_all_pending_fragments() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);
    log.append_message(2 * aligned, MESSAGE_LENGTH);

    let mut fragment_count = 0;
    let fragments = image.controlled_poll(
        |payload, _| {
            fragment_count += 1;
            assert_eq!(payload.len(), MESSAGE_LENGTH);

            match fragment_count {
                1 => {
                    assert_eq!(image.position(), 0);
                    ControlledAction::Continue
                }
                2 => {
                    // The first fragment was only continued, nothing
                    // committed yet.
                    assert_eq!(image.position(), 0);
                    ControlledAction::Commit
                }
                3 => {
                    // The commit on the second fragment covered both.
                    assert_eq!(image.position(), 2 * aligned);
                    ControlledAction::Continue
                }
                _ => unreachable!(),
            }
        },
        usize::MAX,
    );

    assert_eq!(fragments, 3);
    assert_eq!(image.position(), 3 * aligned);
}

#[test]
fn test_continue_defers_position_to_end_of_poll() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);

    let mut fragment_count = 0;
    let fragments = image.controlled_poll(
        |_, _| {
            fragment_count += 1;
            assert_eq!(image.position(), 0);
            ControlledAction::Continue
        },
        usize::MAX,
    );

    assert_eq!(fragments, 2);
    assert_eq!(fragment_count, 2);
    assert_eq!(image.position(), aligned * 2);
}

#[test]
fn test_controlled_poll_honors_fragment_limit() {
    let log = TestLog::new();
    let image = log.image_at(0);
    let aligned = aligned_message_length(MESSAGE_LENGTH);

    log.append_message(0, MESSAGE_LENGTH);
    log.append_message(aligned, MESSAGE_LENGTH);

    let fragments = image.controlled_poll(|_, _| ControlledAction::Continue, 1);

    assert_eq!(fragments, 1);
    assert_eq!(image.position(), aligned);
}
