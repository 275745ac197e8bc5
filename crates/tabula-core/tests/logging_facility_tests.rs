#![allow(clippy::unwrap_used, clippy::expect_used)]

use tabula_core::errors::{ExError, ExErrorKind, TabulaError};
use tabula_core::logging_facility::test_capture::init_test_capture;
use tabula_core::types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use tabula_core::{log_op_end, log_op_error, log_op_start};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "tabula_log_start_unique_1";

    log_op_start!(op_name, entity = "Person");

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[0].field("entity"), Some("Person"));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "tabula_log_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "tabula_log_error_unique_3";

    let err = TabulaError::SchemaDrift { version: 2 };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(
        event.field("err.kind"),
        Some(format!("{:?}", ExErrorKind::Migration).as_str())
    );
    assert_eq!(event.field("err.code"), Some("ERR_MIGRATION"));
    assert!(event.field("message").unwrap().contains("version 2"));
}

#[test]
fn test_log_op_error_accepts_borrowed_ex_error() {
    let capture = init_test_capture();
    let op_name = "tabula_log_error_borrowed_unique_5";

    let result: Result<(), ExError> = Err(ExError::new(ExErrorKind::NotFound)
        .with_entity("Person")
        .with_message("Entity Person with id 7 not found"));
    if let Err(err) = &result {
        log_op_error!(op_name, err, duration_ms = 2, entity = "Person");
    }

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(events[0].field("err.code"), Some("ERR_NOT_FOUND"));
    assert_eq!(events[0].field("entity"), Some("Person"));
    assert!(result.is_err());
}

#[test]
fn test_start_end_pair() {
    let capture = init_test_capture();
    let op_name = "tabula_log_pair_unique_4";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 0, row_count = 3);

    capture.assert_event_exists(op_name, EVENT_START);
    capture.assert_event_exists(op_name, EVENT_END);
    assert_eq!(
        capture.count_events(|e| e.op.as_deref() == Some(op_name)),
        2
    );
}
