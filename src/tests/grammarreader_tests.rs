// src/tests/grammarreader_tests.rs

//! tests for `grammarreader.rs`

#![allow(non_snake_case)]

use std::io::Cursor;
use std::sync::Arc;

use ::test_case::test_case;

use crate::common::{FPath, FileOffset, ParseError, ResultS3};
use crate::data::datetime::{
    micros_to_datetimel,
    parse_hms,
    ymd_hms_to_micros,
    Datelike,
    EpochMicros,
    FixedOffset,
    Month,
    Year,
};
use crate::data::event::{Event, MapValues, TIMESTAMP_DESC_WRITTEN};
use crate::readers::grammarreader::{
    GramElem,
    GramFields,
    GramValue,
    GrammarEventBuilder,
    GrammarReader,
    GrammarState,
    LineGrammar,
    MAX_LINE_LENGTH,
};
use crate::readers::{EventReader, Summary};
use crate::tests::common::FO_0;

const DT_APP: &str = "test:applog:entry";

/// Three candidate line shapes: a header (the designated verification
/// grammar), a dated entry, and a "repeated N times" continuation.
fn applog_grammars() -> Vec<LineGrammar> {
    vec![
        LineGrammar::new(
            "header",
            vec![GramElem::literal("# applog v"), GramElem::num("version", 2)],
        ),
        LineGrammar::new(
            "entry",
            vec![
                GramElem::month_name("month"),
                GramElem::ws(),
                GramElem::num_range("day", 2, 1, 31),
                GramElem::ws(),
                GramElem::time_hms("time"),
                GramElem::ws(),
                GramElem::text("body"),
            ],
        ),
        LineGrammar::new(
            "repeat",
            vec![
                GramElem::literal("last message repeated "),
                GramElem::num("count", 6),
                GramElem::literal(" times"),
            ],
        ),
    ]
}

#[derive(Debug)]
struct AppLogBuilder {
    tz_offset: FixedOffset,
}

impl AppLogBuilder {
    fn int_field(
        fields: &GramFields,
        name: &'static str,
        offset: FileOffset,
    ) -> std::result::Result<i64, ParseError> {
        fields
            .get(name)
            .and_then(GramValue::as_int)
            .ok_or_else(|| ParseError::RecordMalformed {
                offset,
                reason: format!("field {:?} not captured", name),
            })
    }
}

impl GrammarEventBuilder for AppLogBuilder {
    fn build(
        &mut self,
        key: &'static str,
        fields: &GramFields,
        state: &mut GrammarState,
        offset: FileOffset,
    ) -> std::result::Result<Vec<Event>, ParseError> {
        match key {
            "header" => Ok(vec![]),
            "entry" => {
                let month: Month = AppLogBuilder::int_field(fields, "month", offset)? as Month;
                let day: u32 = AppLogBuilder::int_field(fields, "day", offset)? as u32;
                let time: &str = fields
                    .get("time")
                    .and_then(GramValue::as_str)
                    .unwrap_or("");
                let body: &str = fields
                    .get("body")
                    .and_then(GramValue::as_str)
                    .unwrap_or("");
                let year: Year = state.update_year(month);
                let (hour, minute, second) =
                    parse_hms(time).ok_or_else(|| ParseError::RecordMalformed {
                        offset,
                        reason: format!("bad time {:?}", time),
                    })?;
                let micros: EpochMicros =
                    ymd_hms_to_micros(&self.tz_offset, year, month, day, hour, minute, second)
                        .ok_or_else(|| ParseError::RecordMalformed {
                            offset,
                            reason: format!("no valid datetime {}-{}-{}", year, month, day),
                        })?;
                let values: MapValues = MapValues::new(DT_APP).with("body", body);

                Ok(vec![Event::new(
                    micros,
                    TIMESTAMP_DESC_WRITTEN,
                    Arc::new(values),
                    "LOG",
                    "App Log",
                )])
            }
            "repeat" => {
                let count: i64 = AppLogBuilder::int_field(fields, "count", offset)?;
                let previous: &Event = match state.event_last.as_ref() {
                    Some(event) => event,
                    None => {
                        return Err(ParseError::RecordMalformed {
                            offset,
                            reason: String::from("repeat continuation with no previous record"),
                        })
                    }
                };
                let events: Vec<Event> = (0..count)
                    .map(|_| {
                        let mut event: Event = previous.clone();
                        // reset so the reader re-tags with this line's offset
                        event.set_offset(0);

                        event
                    })
                    .collect();

                Ok(events)
            }
            _ => Err(ParseError::RecordMalformed {
                offset,
                reason: format!("unknown grammar key {:?}", key),
            }),
        }
    }
}

fn applog_reader(input: &[u8]) -> std::result::Result<GrammarReader, ParseError> {
    GrammarReader::open(
        FPath::from("app.log"),
        Box::new(Cursor::new(input.to_vec())),
        applog_grammars(),
        Box::new(AppLogBuilder { tz_offset: *FO_0 }),
        2023,
    )
}

fn drain(reader: &mut GrammarReader) -> Vec<Event> {
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

const APPLOG: &str = "\
# applog v1
Nov 15 10:00:00 first
Dec 31 23:59:59 second
Jan 01 00:00:10 third
!!! unparsable junk
Feb 02 08:00:00 fourth
last message repeated 2 times
";

#[test]
fn test_full_parse_with_rollover_and_repeats() {
    let mut reader: GrammarReader = applog_reader(APPLOG.as_bytes()).unwrap();
    let events = drain(&mut reader);
    assert_eq!(events.len(), 6);

    let year_of = |event: &Event| {
        micros_to_datetimel(event.timestamp(), &FO_0)
            .unwrap()
            .year()
    };
    // the year increments exactly once at the Dec -> Jan boundary
    assert_eq!(year_of(&events[0]), 2023);
    assert_eq!(year_of(&events[1]), 2023);
    assert_eq!(year_of(&events[2]), 2024);
    assert_eq!(year_of(&events[3]), 2024);

    // the continuation line replays the previous record
    assert_eq!(events[4].timestamp(), events[3].timestamp());
    assert_eq!(events[5].timestamp(), events[3].timestamp());

    // byte offsets point at the originating line
    let offset_of = |needle: &str| APPLOG.find(needle).unwrap() as FileOffset;
    assert_eq!(events[0].offset(), offset_of("Nov 15"));
    assert_eq!(events[1].offset(), offset_of("Dec 31"));
    assert_eq!(events[3].offset(), offset_of("Feb 02"));
    assert_eq!(events[4].offset(), offset_of("last message"));
    assert_eq!(events[5].offset(), offset_of("last message"));

    assert_eq!(events[0].data_type(), DT_APP);

    let summary: Summary = reader.summary();
    assert_eq!(summary.count_events, 6);
    assert_eq!(summary.count_inputs_unmatched, 1);
    assert_eq!(summary.count_records_malformed, 0);
}

#[test]
fn test_header_mismatch_rejected_at_open() {
    let result = applog_reader(b"not an applog header\nNov 15 10:00:00 first\n");
    match result {
        Err(err) => assert!(err.is_mismatch(), "expected FormatMismatch, got {}", err),
        Ok(_) => panic!("expected open to fail"),
    }
}

#[test]
fn test_empty_stream_rejected_at_open() {
    assert!(matches!(
        applog_reader(b""),
        Err(ParseError::FormatMismatch { .. })
    ));
}

#[test]
fn test_binary_first_line_rejected_at_open() {
    let input: &[u8] = b"\x00\x01\x02\x03 binary garbage\n";
    assert!(matches!(
        applog_reader(input),
        Err(ParseError::FormatMismatch { .. })
    ));
}

#[test]
fn test_overlong_first_line_rejected_at_open() {
    let mut input: Vec<u8> = vec![b'a'; MAX_LINE_LENGTH + 50];
    input.push(b'\n');
    assert!(matches!(
        applog_reader(input.as_slice()),
        Err(ParseError::FormatMismatch { .. })
    ));
}

#[test]
fn test_overlong_line_mid_stream_skipped() {
    let mut input: Vec<u8> = Vec::new();
    input.extend_from_slice(b"# applog v1\n");
    input.extend_from_slice(vec![b'x'; MAX_LINE_LENGTH + 100].as_slice());
    input.push(b'\n');
    input.extend_from_slice(b"Nov 15 10:00:00 still here\n");
    let mut reader: GrammarReader = applog_reader(input.as_slice()).unwrap();
    let events = drain(&mut reader);
    assert_eq!(events.len(), 1);
    assert_eq!(reader.summary().count_inputs_unmatched, 1);
}

#[test]
fn test_malformed_record_dropped_stream_continues() {
    // a repeat continuation as the first record has nothing to repeat
    let input: &str = "\
# applog v1
last message repeated 3 times
Nov 15 10:00:00 recovered
";
    let mut reader: GrammarReader = applog_reader(input.as_bytes()).unwrap();
    let events = drain(&mut reader);
    assert_eq!(events.len(), 1);
    let summary: Summary = reader.summary();
    assert_eq!(summary.count_records_malformed, 1);
    assert_eq!(summary.count_events, 1);
}

#[test]
fn test_blank_lines_skipped_quietly() {
    let input: &str = "# applog v1\n\n\nNov 15 10:00:00 after blanks\n\n";
    let mut reader: GrammarReader = applog_reader(input.as_bytes()).unwrap();
    let events = drain(&mut reader);
    assert_eq!(events.len(), 1);
    assert_eq!(reader.summary().count_inputs_unmatched, 0);
}

#[test_case(&[11, 12, 1, 2], 2023, 2024; "one rollover")]
#[test_case(&[1, 2, 3], 2023, 2023; "no rollover")]
#[test_case(&[12, 1, 12, 1], 2023, 2025; "two rollovers")]
#[test_case(&[6], 2023, 2023; "single record")]
fn test_grammar_state_update_year(
    months: &[Month],
    initial: Year,
    expect: Year,
) {
    let mut state = GrammarState::new(initial);
    let mut last: Year = initial;
    for month in months.iter() {
        last = state.update_year(*month);
    }
    assert_eq!(last, expect);
    assert_eq!(state.year, expect);
}

#[test]
fn test_gramelem_text_until_leaves_delimiter() {
    let grammar = LineGrammar::new(
        "kv",
        vec![
            GramElem::text_until("key", '='),
            GramElem::literal("="),
            GramElem::text("value"),
        ],
    );
    let fields: GramFields = grammar.match_line("color=dark red").unwrap();
    assert_eq!(fields.get("key"), Some(&GramValue::Str(String::from("color"))));
    assert_eq!(
        fields.get("value"),
        Some(&GramValue::Str(String::from("dark red")))
    );
}

#[test]
fn test_gramelem_num_range_checked() {
    let grammar = LineGrammar::new("day", vec![GramElem::num_range("day", 2, 1, 31)]);
    assert!(grammar.match_line("15").is_some());
    assert!(grammar.match_line("32").is_none());
    assert!(grammar.match_line("0").is_none());
    assert!(grammar.match_line("xx").is_none());
}
