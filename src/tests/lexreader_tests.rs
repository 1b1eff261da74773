// src/tests/lexreader_tests.rs

//! tests for `lexreader.rs`

#![allow(non_snake_case)]

use ::more_asserts::assert_lt;

use crate::common::{Offset, ParseError, ResultS3};
use crate::data::datetime::{micros_to_datetimel, Datelike, EpochMicros, Timelike};
use crate::data::event::EventValues;
use crate::readers::lexreader::{LexReader, MAX_LINES};
use crate::readers::{EventReader, Summary};
use crate::tests::common::{syslog_lex_reader, FO_0, DT_SYSLOG};

const LINES3: &str = "\
03/15/2024 10:30:00 alice:host1- message one
03/15/2024 10:31:05 bob:host2- message two
12/31/2024 23:59:59 carol:host3- message three
";

/// Pull events until `Done`, panicking on any error.
fn drain(reader: &mut LexReader) -> Vec<crate::data::event::Event> {
    let mut events = Vec::new();
    loop {
        match reader.next_event() {
            ResultS3::Found(event) => events.push(event),
            ResultS3::Done => break,
            ResultS3::Err(err) => panic!("unexpected error: {}", err),
        }
    }

    events
}

fn attr(
    event: &crate::data::event::Event,
    name: &str,
) -> String {
    event
        .values()
        .value(name)
        .unwrap_or_else(|| panic!("attribute {:?} missing", name))
        .to_string()
}

#[test]
fn test_three_wellformed_lines() {
    let mut reader: LexReader = syslog_lex_reader(LINES3);
    assert!(!reader.verified());
    let events = drain(&mut reader);
    assert!(reader.verified());
    assert_eq!(events.len(), 3);

    let dt = micros_to_datetimel(events[0].timestamp(), &FO_0).unwrap();
    assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));
    assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 30, 0));
    assert_eq!(events[0].data_type(), DT_SYSLOG);
    assert_eq!(attr(&events[0], "body"), "message one");
    assert_eq!(attr(&events[0], "user"), "alice");
    assert_eq!(attr(&events[0], "host"), "host1");
    assert_eq!(attr(&events[2], "body"), "message three");

    // file order, strictly increasing record offsets
    assert_eq!(events[0].offset(), 0);
    assert_lt!(events[0].offset(), events[1].offset());
    assert_lt!(events[1].offset(), events[2].offset());

    let summary: Summary = reader.summary();
    assert_eq!(summary.count_events, 3);
    assert_eq!(summary.count_records_malformed, 0);
    assert_eq!(summary.count_inputs_unmatched, 0);
}

#[test]
fn test_unterminated_last_line_still_parses() {
    let mut reader: LexReader =
        syslog_lex_reader("03/15/2024 10:30:00 alice:host1- no newline at end");
    let events = drain(&mut reader);
    assert_eq!(events.len(), 1);
    assert_eq!(attr(&events[0], "body"), "no newline at end");
}

#[test]
fn test_no_matching_lines_is_format_mismatch() {
    let mut reader: LexReader = syslog_lex_reader("hello world\nnothing to see here\n");
    match reader.next_event() {
        ResultS3::Err(err) => assert!(err.is_mismatch(), "expected FormatMismatch, got {}", err),
        result => panic!("expected Err, got {}", result),
    }
    // a rejected reader stays rejected
    assert!(matches!(reader.next_event(), ResultS3::Done));
    assert!(!reader.verified());
}

#[test]
fn test_empty_stream_is_format_mismatch() {
    let mut reader: LexReader = syslog_lex_reader("");
    assert!(matches!(
        reader.next_event(),
        ResultS3::Err(ParseError::FormatMismatch { .. })
    ));
}

#[test]
fn test_rejects_past_error_threshold_before_verification() {
    // one more garbage line than tolerated; the well-formed line at the
    // end must never be reached
    let mut input = String::new();
    for i in 0..(MAX_LINES * 2 + 1) {
        input.push_str(format!("garbage line {}\n", i).as_str());
    }
    input.push_str("03/15/2024 10:30:00 alice:host1- message one\n");
    let mut reader: LexReader = syslog_lex_reader(input.as_str());
    assert!(matches!(
        reader.next_event(),
        ResultS3::Err(ParseError::FormatMismatch { .. })
    ));
}

#[test]
fn test_tolerates_garbage_below_threshold_before_verification() {
    let mut input = String::new();
    for i in 0..(MAX_LINES * 2) {
        input.push_str(format!("garbage line {}\n", i).as_str());
    }
    input.push_str("03/15/2024 10:30:00 alice:host1- message one\n");
    let mut reader: LexReader = syslog_lex_reader(input.as_str());
    let events = drain(&mut reader);
    assert_eq!(events.len(), 1);
    assert_eq!(attr(&events[0], "body"), "message one");
}

#[test]
fn test_malformed_record_after_verification_is_dropped() {
    // the middle line matches the machine lexically but its fields do
    // not resolve to a valid date
    let input: &str = "\
03/15/2024 10:30:00 alice:host1- message one
13/40/2024 10:30:00 bob:host2- broken date
03/16/2024 11:00:00 carol:host3- message two
";
    let mut reader: LexReader = syslog_lex_reader(input);
    let events = drain(&mut reader);
    assert_eq!(events.len(), 2);
    assert_eq!(attr(&events[0], "body"), "message one");
    assert_eq!(attr(&events[1], "body"), "message two");
    let summary: Summary = reader.summary();
    assert_eq!(summary.count_events, 2);
    assert_eq!(summary.count_records_malformed, 1);
}

#[test]
fn test_gives_up_after_long_unmatched_streak() {
    let mut input = String::from("03/15/2024 10:30:00 alice:host1- message one\n");
    for i in 0..(MAX_LINES + 1) {
        input.push_str(format!("garbage line {}\n", i).as_str());
    }
    input.push_str("03/16/2024 11:00:00 bob:host2- never reached\n");
    let mut reader: LexReader = syslog_lex_reader(input.as_str());
    let events = drain(&mut reader);
    // verified by the first record, then gave up mid-stream; no error
    assert_eq!(events.len(), 1);
    assert_eq!(reader.summary().count_inputs_unmatched, MAX_LINES + 1);
}

#[test]
fn test_parse_is_deterministic() {
    let collect = |input: &str| -> Vec<(EpochMicros, Offset, String)> {
        let mut reader: LexReader = syslog_lex_reader(input);
        drain(&mut reader)
            .iter()
            .map(|event| (event.timestamp(), event.offset(), attr(event, "body")))
            .collect()
    };
    assert_eq!(collect(LINES3), collect(LINES3));
}

#[test]
fn test_events_iterator_adapter() {
    let reader: LexReader = syslog_lex_reader(LINES3);
    let results: Vec<_> = reader.events().collect();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(Result::is_ok));
}
