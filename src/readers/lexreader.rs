// src/readers/lexreader.rs

//! Implements a [`LexReader`], a state-machine text parser driven by a
//! table of `(state, trigger pattern, action, next state)` transitions.
//!
//! A `LexReader` handles text formats whose records are not
//! line-delimited in a simple way (free-text bodies, embedded
//! delimiters). It is also able to *decline* a stream that does not
//! match: before any record has been completed, unmatched input counts
//! toward a rejection threshold and exceeding it yields
//! [`ParseError::FormatMismatch`] so a dispatcher can try another
//! reader. After the first completed record the reader is "verified"
//! and localized corruption is tolerated by skipping records.
//!
//! Sibling of [`GrammarReader`], for formats too irregular to describe
//! as per-line grammars.
//!
//! [`LexReader`]: self::LexReader
//! [`GrammarReader`]: crate::readers::grammarreader::GrammarReader
//! [`ParseError::FormatMismatch`]: crate::common::ParseError

use std::io::{BufRead, Read};

use ::memchr::memchr;
use ::regex::bytes::Regex;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Count, FPath, FileOffset, ParseError, ResultS3};
use crate::data::datetime::{
    month_abbr_to_num,
    parse_hms,
    ymd_hms_to_micros,
    EpochMicros,
    FixedOffset,
    Month,
    Year,
};
use crate::data::event::Event;
use crate::de_wrn;
use crate::readers::{EventReader, ResultNextEvent, Summary};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// transition table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error tolerance after verification; before verification the
/// rejection threshold is `MAX_LINES * 2`.
pub const MAX_LINES: Count = 15;

/// The start state of every transition table.
pub const STATE_INITIAL: &str = "INITIAL";

/// Read-ahead chunk size.
const CHUNK_SZ: usize = 4096;

/// A record-accumulator field a transition may capture into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LexField {
    Year,
    Month,
    Day,
    Time,
    Host,
    User,
    Pid,
    Body,
}

/// The action bound to a transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LexAction {
    /// Store the match (capture group 1, else the whole match) into the
    /// accumulator field.
    Capture(LexField),
    /// Append the match to the accumulator body (multi-line bodies).
    AppendBody,
    /// The accumulated record is ready; convert it and yield an event.
    PushRecord,
    /// Consume the match, change state, capture nothing.
    Skip,
}

/// One row of the transition table.
///
/// The pattern is implicitly anchored at the unconsumed front of the
/// input buffer. Within one state, the first matching pattern wins, in
/// table order. A pattern that can match the empty string must change
/// state, otherwise it is ignored (it could never make progress).
pub struct LexTransition {
    pub state: &'static str,
    pub pattern: Regex,
    pub action: LexAction,
    pub next_state: &'static str,
}

impl LexTransition {
    pub fn new(
        state: &'static str,
        pattern: &str,
        action: LexAction,
        next_state: &'static str,
    ) -> std::result::Result<LexTransition, ::regex::Error> {
        // anchor at the front; `(?:…)` keeps the caller's group 1 intact
        let pattern = Regex::new(format!("^(?:{})", pattern).as_str())?;

        Ok(LexTransition {
            state,
            pattern,
            action,
            next_state,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// record accumulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The in-progress record accumulator. Fields are raw captured strings;
/// numeric conversion happens at record completion so a bad capture
/// fails that record, not the stream.
#[derive(Clone, Debug, Default)]
pub struct LexFields {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub pid: Option<String>,
    pub body: String,
}

impl LexFields {
    pub fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.day.is_none()
            && self.time.is_none()
            && self.host.is_none()
            && self.user.is_none()
            && self.pid.is_none()
            && self.body.is_empty()
    }

    fn set(
        &mut self,
        field: LexField,
        value: String,
    ) {
        match field {
            LexField::Year => self.year = Some(value),
            LexField::Month => self.month = Some(value),
            LexField::Day => self.day = Some(value),
            LexField::Time => self.time = Some(value),
            LexField::Host => self.host = Some(value),
            LexField::User => self.user = Some(value),
            LexField::Pid => self.pid = Some(value),
            LexField::Body => self.body = value,
        }
    }

    /// Resolve the accumulated fields to a timestamp.
    ///
    /// Time and year are mandatory; month and day default to `1`.
    /// The month accepts a number or a three-letter English
    /// abbreviation.
    pub fn to_micros(
        &self,
        tz_offset: &FixedOffset,
    ) -> std::result::Result<EpochMicros, String> {
        let time: &str = match self.time.as_deref() {
            Some(val) => val,
            None => return Err(String::from("no time field captured")),
        };
        let year: Year = match self.year.as_deref() {
            Some(val) => match val.parse() {
                Ok(year) => year,
                Err(_) => return Err(format!("year {:?} is not a number", val)),
            },
            None => return Err(String::from("no year field captured")),
        };
        let month: Month = match self.month.as_deref() {
            Some(val) => match val.parse::<Month>().ok().or_else(|| month_abbr_to_num(val)) {
                Some(month) => month,
                None => return Err(format!("month {:?} not recognized", val)),
            },
            None => 1,
        };
        let day: u32 = match self.day.as_deref() {
            Some(val) => match val.parse() {
                Ok(day) => day,
                Err(_) => return Err(format!("day {:?} is not a number", val)),
            },
            None => 1,
        };
        let (hour, minute, second) = match parse_hms(time) {
            Some(hms) => hms,
            None => return Err(format!("time {:?} is not HH:MM:SS", time)),
        };
        match ymd_hms_to_micros(tz_offset, year, month, day, hour, minute, second) {
            Some(micros) => Ok(micros),
            None => Err(format!(
                "no valid datetime from {}-{}-{} {:?}",
                year, month, day, time
            )),
        }
    }
}

/// Decides the schema of a completed record (which `data_type`, which
/// attributes); one implementation per concrete artifact format.
pub trait LexEventBuilder {
    fn build(
        &self,
        fields: &LexFields,
        timestamp: EpochMicros,
        offset: FileOffset,
    ) -> Event;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LexReader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// State-machine text parser. See the [module documentation].
///
/// [module documentation]: self
pub struct LexReader {
    path: FPath,
    input: Box<dyn BufRead>,
    transitions: Vec<LexTransition>,
    builder: Box<dyn LexEventBuilder>,
    /// `FixedOffset` timezone for datetime formats without a timezone.
    tz_offset: FixedOffset,
    /// Unconsumed input.
    buffer: Vec<u8>,
    eof: bool,
    /// Current machine state.
    state: &'static str,
    /// The in-progress record accumulator.
    fields: LexFields,
    /// Byte offset of the consumed front of the stream.
    offset: FileOffset,
    /// Byte offset where the in-progress record began.
    record_offset: FileOffset,
    /// Unmatched/malformed count before verification.
    count_errors: Count,
    /// Consecutive unmatched count since the last completed record.
    count_error_streak: Count,
    /// Has at least one record been completed?
    verified: bool,
    done: bool,
    summary: Summary,
}

impl std::fmt::Debug for LexReader {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("LexReader")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("verified", &self.verified)
            .field("done", &self.done)
            .field("summary", &self.summary)
            .finish()
    }
}

impl LexReader {
    pub fn new(
        path: FPath,
        input: Box<dyn BufRead>,
        transitions: Vec<LexTransition>,
        builder: Box<dyn LexEventBuilder>,
        tz_offset: FixedOffset,
    ) -> LexReader {
        defñ!("({:?})", path);
        LexReader {
            path,
            input,
            transitions,
            builder,
            tz_offset,
            buffer: Vec::new(),
            eof: false,
            state: STATE_INITIAL,
            fields: LexFields::default(),
            offset: 0,
            record_offset: 0,
            count_errors: 0,
            count_error_streak: 0,
            verified: false,
            done: false,
            summary: Summary::default(),
        }
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Read ahead until the buffer holds a newline (so patterns near the
    /// buffer end cannot be cut short) or the stream is exhausted.
    fn fill(&mut self) -> std::io::Result<()> {
        while !self.eof
            && (self.buffer.len() < CHUNK_SZ || memchr(b'\n', self.buffer.as_slice()).is_none())
        {
            let mut chunk: [u8; CHUNK_SZ] = [0; CHUNK_SZ];
            let read = self.input.read(&mut chunk)?;
            if read == 0 {
                self.eof = true;
                break;
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }

        Ok(())
    }

    /// Drop everything through the next newline; the offending record
    /// is skipped.
    fn skip_record(&mut self) {
        let skip: usize = match memchr(b'\n', self.buffer.as_slice()) {
            Some(at) => at + 1,
            None => self.buffer.len(),
        };
        self.buffer.drain(..skip);
        self.offset += skip as FileOffset;
        self.state = STATE_INITIAL;
        self.fields = LexFields::default();
    }

    /// Convert the accumulated fields to an event; the accumulator is
    /// reset whether conversion succeeds or fails.
    fn complete_record(&mut self) -> std::result::Result<Event, String> {
        let fields: LexFields = std::mem::take(&mut self.fields);
        let micros: EpochMicros = fields.to_micros(&self.tz_offset)?;
        let mut event: Event = self.builder.build(&fields, micros, self.record_offset);
        if event.offset() == 0 {
            event.set_offset(self.record_offset);
        }

        Ok(event)
    }

    /// First transition valid in the current state whose pattern matches
    /// the front of the buffer. Returns
    /// `(matched length, transition index, captured text)`.
    fn match_transition(&self) -> Option<(usize, usize, Option<String>)> {
        for (index, transition) in self.transitions.iter().enumerate() {
            if transition.state != self.state {
                continue;
            }
            let caps = match transition.pattern.captures(self.buffer.as_slice()) {
                Some(caps) => caps,
                None => continue,
            };
            let end: usize = caps.get(0).map_or(0, |m| m.end());
            if end == 0 && transition.next_state == self.state {
                // an empty match that does not change state can never
                // make progress
                continue;
            }
            let captured: Option<String> = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());

            return Some((end, index, captured));
        }

        None
    }
}

impl EventReader for LexReader {
    fn next_event(&mut self) -> ResultNextEvent {
        defn!("LexReader {:?} state {:?}", self.path, self.state);
        if self.done {
            defx!("done");
            return ResultS3::Done;
        }
        loop {
            if let Err(err) = self.fill() {
                self.done = true;
                defx!("I/O error");
                return ResultS3::Err(ParseError::Io(err));
            }
            match self.match_transition() {
                Some((len, index, captured)) => {
                    let action: LexAction = self.transitions[index].action;
                    let next_state: &'static str = self.transitions[index].next_state;
                    let match_offset: FileOffset = self.offset;
                    self.buffer.drain(..len);
                    self.offset += len as FileOffset;
                    self.state = next_state;
                    defo!("matched {} bytes, action {:?}, -> {:?}", len, action, next_state);
                    match action {
                        LexAction::Skip => {}
                        LexAction::Capture(field) => {
                            if self.fields.is_empty() {
                                self.record_offset = match_offset;
                            }
                            self.fields.set(field, captured.unwrap_or_default());
                        }
                        LexAction::AppendBody => {
                            if self.fields.is_empty() {
                                self.record_offset = match_offset;
                            }
                            self.fields.body.push_str(captured.unwrap_or_default().as_str());
                        }
                        LexAction::PushRecord => {
                            let record_offset: FileOffset = self.record_offset;
                            match self.complete_record() {
                                Ok(event) => {
                                    self.verified = true;
                                    self.count_error_streak = 0;
                                    self.summary.count_events += 1;
                                    defx!("found event at offset {}", record_offset);
                                    return ResultS3::Found(event);
                                }
                                Err(reason) => {
                                    self.summary.count_records_malformed += 1;
                                    if !self.verified {
                                        self.count_errors += 1;
                                        if self.count_errors > MAX_LINES * 2 {
                                            self.done = true;
                                            defx!("rejecting; {} errors before verification", self.count_errors);
                                            return ResultS3::Err(ParseError::FormatMismatch {
                                                path: self.path.clone(),
                                                format: "lexer text log",
                                                reason,
                                            });
                                        }
                                    } else {
                                        de_wrn!(
                                            "{:?}: dropping record at offset {}: {}",
                                            self.path, record_offset, reason,
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
                None => {
                    if self.buffer.is_empty() && self.eof {
                        self.done = true;
                        if !self.fields.is_empty() {
                            de_wrn!(
                                "{:?}: dropping unterminated record at offset {}",
                                self.path, self.record_offset,
                            );
                        }
                        if !self.verified {
                            defx!("end of stream, zero verified records");
                            return ResultS3::Err(ParseError::FormatMismatch {
                                path: self.path.clone(),
                                format: "lexer text log",
                                reason: String::from("no records found"),
                            });
                        }
                        defx!("end of stream");
                        return ResultS3::Done;
                    }
                    let unmatched_offset: FileOffset = self.offset;
                    self.skip_record();
                    if !self.verified {
                        self.count_errors += 1;
                        if self.count_errors > MAX_LINES * 2 {
                            self.done = true;
                            defx!("rejecting; {} unmatched before verification", self.count_errors);
                            return ResultS3::Err(ParseError::FormatMismatch {
                                path: self.path.clone(),
                                format: "lexer text log",
                                reason: format!(
                                    "{} unmatched inputs without a complete record",
                                    self.count_errors
                                ),
                            });
                        }
                    } else {
                        self.summary.count_inputs_unmatched += 1;
                        self.count_error_streak += 1;
                        de_wrn!(
                            "{:?}: unmatched input at offset {}, skipping",
                            self.path, unmatched_offset,
                        );
                        if self.count_error_streak > MAX_LINES {
                            self.done = true;
                            de_wrn!(
                                "{:?}: {} consecutive unmatched inputs, giving up at offset {}",
                                self.path, self.count_error_streak, self.offset,
                            );
                            defx!("giving up after verification");
                            return ResultS3::Done;
                        }
                    }
                }
            }
        }
    }

    fn path(&self) -> &FPath {
        &self.path
    }

    fn summary(&self) -> Summary {
        self.summary
    }
}
