// src/readers/grammarreader.rs

//! Implements a [`GrammarReader`], a declarative per-line structural
//! matcher supporting multiple candidate line shapes in one file.
//!
//! Each logical record is one line of bounded length whose shape is
//! described as a [`LineGrammar`], a composition of primitive matchers
//! ([`GramElem`]). The first grammar in the candidate list is the
//! designated header/verification grammar: it must match the first line
//! of the stream or the whole input is rejected with
//! [`ParseError::FormatMismatch`]. After that the reader is best-effort:
//! each line is tried against every candidate grammar in declared
//! order, a line matching nothing is logged and skipped. This is the
//! "optimistic, mostly-correct" policy real-world hand-written logs
//! need.
//!
//! State carried across lines is explicit in [`GrammarState`]: the
//! reconstructed year with December→January rollover detection, and the
//! previous record for "repeated N times" lines.
//!
//! [`GrammarReader`]: self::GrammarReader
//! [`ParseError::FormatMismatch`]: crate::common::ParseError

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::io::BufRead;

use ::bstr::ByteSlice;
use ::memchr::memchr;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{FPath, FileOffset, ParseError, ResultS3};
use crate::data::datetime::{month_abbr_to_num, parse_hms, Month, Year};
use crate::data::event::Event;
use crate::de_wrn;
use crate::readers::{EventReader, ResultNextEvent, Summary};

/// Longest line accepted as "text"; longer lines are treated as binary
/// garbage. This bound is the only proactive safeguard against
/// unbounded buffering of malformed input.
pub const MAX_LINE_LENGTH: usize = 400;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// grammar primitives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One structured field captured by a grammar match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GramValue {
    Str(String),
    Int(i64),
}

impl GramValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GramValue::Str(s) => Some(s.as_str()),
            GramValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            GramValue::Str(_) => None,
            GramValue::Int(i) => Some(*i),
        }
    }
}

/// Field map produced by one grammar match.
pub type GramFields = BTreeMap<&'static str, GramValue>;

/// A primitive matcher; a [`LineGrammar`] is an ordered composition of
/// these.
#[derive(Clone, Debug)]
pub enum GramElem {
    /// A fixed literal.
    Literal(&'static str),
    /// A run of one or more spaces or tabs.
    Ws,
    /// Up to `max_width` ASCII digits, value range-checked
    /// `min..=max`, captured as [`GramValue::Int`].
    Num {
        name: &'static str,
        max_width: usize,
        min: i64,
        max: i64,
    },
    /// A three-letter English month abbreviation, captured as the month
    /// number `1..=12`.
    MonthName { name: &'static str },
    /// A bounded-width `HH:MM:SS` clock reading, captured as
    /// [`GramValue::Str`].
    TimeHms { name: &'static str },
    /// A free-text span up to (not including) the delimiter, or to the
    /// end of the line when `until` is `None`.
    Text {
        name: &'static str,
        until: Option<char>,
    },
}

impl GramElem {
    pub fn literal(text: &'static str) -> GramElem {
        GramElem::Literal(text)
    }

    pub fn ws() -> GramElem {
        GramElem::Ws
    }

    pub fn num(
        name: &'static str,
        max_width: usize,
    ) -> GramElem {
        GramElem::Num {
            name,
            max_width,
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    pub fn num_range(
        name: &'static str,
        max_width: usize,
        min: i64,
        max: i64,
    ) -> GramElem {
        GramElem::Num {
            name,
            max_width,
            min,
            max,
        }
    }

    pub fn month_name(name: &'static str) -> GramElem {
        GramElem::MonthName { name }
    }

    pub fn time_hms(name: &'static str) -> GramElem {
        GramElem::TimeHms { name }
    }

    pub fn text(name: &'static str) -> GramElem {
        GramElem::Text { name, until: None }
    }

    pub fn text_until(
        name: &'static str,
        until: char,
    ) -> GramElem {
        GramElem::Text {
            name,
            until: Some(until),
        }
    }

    /// Match against the front of `rest`; on success return the
    /// remainder, capturing into `fields`.
    fn match_front<'a>(
        &self,
        rest: &'a str,
        fields: &mut GramFields,
    ) -> Option<&'a str> {
        match self {
            GramElem::Literal(text) => rest.strip_prefix(text),
            GramElem::Ws => {
                let trimmed: &str = rest.trim_start_matches([' ', '\t']);
                if trimmed.len() == rest.len() {
                    return None;
                }

                Some(trimmed)
            }
            GramElem::Num {
                name,
                max_width,
                min,
                max,
            } => {
                let digits: usize = rest
                    .bytes()
                    .take(*max_width)
                    .take_while(u8::is_ascii_digit)
                    .count();
                if digits == 0 {
                    return None;
                }
                let value: i64 = rest[..digits].parse().ok()?;
                if value < *min || value > *max {
                    return None;
                }
                fields.insert(name, GramValue::Int(value));

                Some(&rest[digits..])
            }
            GramElem::MonthName { name } => {
                let abbr: &str = rest.get(..3)?;
                let month = month_abbr_to_num(abbr)?;
                fields.insert(name, GramValue::Int(month as i64));

                Some(&rest[3..])
            }
            GramElem::TimeHms { name } => {
                let reading: &str = rest.get(..8)?;
                parse_hms(reading)?;
                fields.insert(name, GramValue::Str(reading.to_string()));

                Some(&rest[8..])
            }
            GramElem::Text { name, until } => match until {
                Some(delimiter) => {
                    let at: usize = rest.find(*delimiter)?;
                    fields.insert(name, GramValue::Str(rest[..at].to_string()));

                    // the delimiter is left for the next element
                    Some(&rest[at..])
                }
                None => {
                    fields.insert(name, GramValue::Str(rest.to_string()));

                    Some("")
                }
            },
        }
    }
}

/// One named candidate line shape.
#[derive(Clone, Debug)]
pub struct LineGrammar {
    pub key: &'static str,
    pub elems: Vec<GramElem>,
}

impl LineGrammar {
    pub fn new(
        key: &'static str,
        elems: Vec<GramElem>,
    ) -> LineGrammar {
        LineGrammar { key, elems }
    }

    /// Match every element in order against the front of `line`.
    /// Trailing unmatched text is allowed.
    pub fn match_line(
        &self,
        line: &str,
    ) -> Option<GramFields> {
        let mut fields = GramFields::new();
        let mut rest: &str = line;
        for elem in self.elems.iter() {
            rest = elem.match_front(rest, &mut fields)?;
        }

        Some(fields)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// cross-line state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Explicit state carried across lines of one file.
#[derive(Clone, Debug)]
pub struct GrammarState {
    /// Current reconstructed year, for formats without an explicit year
    /// field.
    pub year: Year,
    /// Month of the last record; a decrease means the log crossed a
    /// December→January boundary.
    pub month_last: Month,
    /// The previous record, for "repeated N times" lines.
    pub event_last: Option<Event>,
}

impl GrammarState {
    pub fn new(initial_year: Year) -> GrammarState {
        GrammarState {
            year: initial_year,
            month_last: 0,
            event_last: None,
        }
    }

    /// Track the month of the record being built and return the
    /// inferred year. The year increments exactly once per month
    /// decrease between consecutive records.
    pub fn update_year(
        &mut self,
        month: Month,
    ) -> Year {
        if self.month_last != 0 && month < self.month_last {
            self.year += 1;
        }
        self.month_last = month;

        self.year
    }
}

/// Turns one grammar match into zero or more events; one implementation
/// per concrete artifact format. `key` names the matched grammar.
pub trait GrammarEventBuilder {
    fn build(
        &mut self,
        key: &'static str,
        fields: &GramFields,
        state: &mut GrammarState,
        offset: FileOffset,
    ) -> std::result::Result<Vec<Event>, ParseError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GrammarReader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Is this plausibly a line of text? NUL bytes or too many
/// non-printable bytes mean binary garbage.
fn is_plausible_text(line: &[u8]) -> bool {
    if line.is_empty() {
        return false;
    }
    let mut printable: usize = 0;
    for byte in line.iter() {
        match byte {
            0x00 => return false,
            0x20..=0x7E | b'\t' | b'\n' | b'\r' => printable += 1,
            // tolerate UTF-8 multi-byte sequences
            0x80..=0xFF => printable += 1,
            _ => {}
        }
    }

    printable * 4 >= line.len() * 3
}

/// Grammar-driven structured line parser. See the
/// [module documentation].
///
/// [module documentation]: self
pub struct GrammarReader {
    path: FPath,
    input: Box<dyn BufRead>,
    grammars: Vec<LineGrammar>,
    builder: Box<dyn GrammarEventBuilder>,
    state: GrammarState,
    /// The verified first line, run through normal candidate matching
    /// on the first [`next_event`] call.
    ///
    /// [`next_event`]: GrammarReader#method.next_event
    first_line: Option<Vec<u8>>,
    /// Events built from the current line, not yet pulled.
    pending: VecDeque<Event>,
    /// Byte offset of the next unread line.
    offset_next: FileOffset,
    done: bool,
    summary: Summary,
}

impl std::fmt::Debug for GrammarReader {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("GrammarReader")
            .field("path", &self.path)
            .field("grammars", &self.grammars.len())
            .field("offset_next", &self.offset_next)
            .field("done", &self.done)
            .field("summary", &self.summary)
            .finish()
    }
}

/// Read one line (through the newline) off `input`, refusing to buffer
/// more than [`MAX_LINE_LENGTH`] bytes. Returns `None` at end of
/// stream; the `bool` is `true` when the line was truncated at the
/// bound.
fn read_line_bounded(input: &mut dyn BufRead) -> std::io::Result<Option<(Vec<u8>, bool)>> {
    let mut line: Vec<u8> = Vec::new();
    loop {
        let available: &[u8] = input.fill_buf()?;
        if available.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            return Ok(Some((line, false)));
        }
        match memchr(b'\n', available) {
            Some(at) => {
                line.extend_from_slice(&available[..=at]);
                input.consume(at + 1);
                let too_long: bool = line_too_long(line.as_slice());
                return Ok(Some((line, too_long)));
            }
            None => {
                let taken: usize = available.len();
                line.extend_from_slice(available);
                input.consume(taken);
                if line_too_long(&line) {
                    return Ok(Some((line, true)));
                }
            }
        }
    }
}

fn line_too_long(line: &[u8]) -> bool {
    line.len() > MAX_LINE_LENGTH
}

/// Throw away input through the next newline. Returns the count of
/// bytes discarded.
fn discard_to_newline(input: &mut dyn BufRead) -> std::io::Result<usize> {
    let mut discarded: usize = 0;
    loop {
        let available: &[u8] = input.fill_buf()?;
        if available.is_empty() {
            return Ok(discarded);
        }
        match memchr(b'\n', available) {
            Some(at) => {
                input.consume(at + 1);
                return Ok(discarded + at + 1);
            }
            None => {
                let taken: usize = available.len();
                input.consume(taken);
                discarded += taken;
            }
        }
    }
}

impl GrammarReader {
    /// Open and verify: read the first line (bounded), sniff that it is
    /// plausibly text, and require the designated verification grammar
    /// (the first in `grammars`) to match it. Any failure is
    /// [`ParseError::FormatMismatch`] so a dispatcher can move on.
    ///
    /// [`ParseError::FormatMismatch`]: crate::common::ParseError
    pub fn open(
        path: FPath,
        mut input: Box<dyn BufRead>,
        grammars: Vec<LineGrammar>,
        builder: Box<dyn GrammarEventBuilder>,
        initial_year: Year,
    ) -> std::result::Result<GrammarReader, ParseError> {
        defn!("({:?})", path);
        let mismatch = |reason: String| ParseError::FormatMismatch {
            path: path.clone(),
            format: "structured text log",
            reason,
        };
        debug_assert!(!grammars.is_empty(), "no grammars configured");
        let (line, truncated) = match read_line_bounded(&mut input)? {
            Some(first) => first,
            None => {
                defx!("empty stream");
                return Err(mismatch(String::from("empty stream")));
            }
        };
        if truncated {
            defx!("first line too long");
            return Err(mismatch(format!(
                "first line exceeds {} bytes",
                MAX_LINE_LENGTH
            )));
        }
        if !is_plausible_text(line.as_slice()) {
            defx!("not text");
            return Err(mismatch(String::from("not plausibly text")));
        }
        let line_str = line.trim_with(|c| c == '\n' || c == '\r').to_str_lossy();
        let verify: &LineGrammar = &grammars[0];
        if verify.match_line(line_str.as_ref()).is_none() {
            defx!("verification grammar {:?} did not match", verify.key);
            return Err(mismatch(format!(
                "first line does not match the {:?} grammar",
                verify.key
            )));
        }
        defx!("verified with grammar {:?}", verify.key);
        let offset_next: FileOffset = line.len() as FileOffset;

        Ok(GrammarReader {
            path,
            input,
            grammars,
            builder,
            state: GrammarState::new(initial_year),
            first_line: Some(line),
            pending: VecDeque::new(),
            offset_next,
            done: false,
            summary: Summary::default(),
        })
    }

    pub fn state(&self) -> &GrammarState {
        &self.state
    }

    /// Try each candidate grammar in declared order; the first match
    /// wins. Returns `false` when no grammar matched.
    fn parse_line(
        &mut self,
        line: &str,
        offset: FileOffset,
    ) -> bool {
        for grammar in self.grammars.iter() {
            let fields: GramFields = match grammar.match_line(line) {
                Some(fields) => fields,
                None => continue,
            };
            defo!("line at offset {} matched grammar {:?}", offset, grammar.key);
            match self.builder.build(grammar.key, &fields, &mut self.state, offset) {
                Ok(events) => {
                    for mut event in events {
                        if event.offset() == 0 {
                            event.set_offset(offset);
                        }
                        self.state.event_last = Some(event.clone());
                        self.pending.push_back(event);
                    }
                }
                Err(err) => {
                    self.summary.count_records_malformed += 1;
                    de_wrn!(
                        "{:?}: dropping {:?} record at offset {}: {}",
                        self.path, grammar.key, offset, err,
                    );
                }
            }

            return true;
        }

        false
    }
}

impl EventReader for GrammarReader {
    fn next_event(&mut self) -> ResultNextEvent {
        defn!("GrammarReader {:?}", self.path);
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.summary.count_events += 1;
                defx!("found pending event");
                return ResultS3::Found(event);
            }
            if self.done {
                defx!("done");
                return ResultS3::Done;
            }
            let (line, offset): (Vec<u8>, FileOffset) = match self.first_line.take() {
                Some(first) => (first, 0),
                None => {
                    let offset: FileOffset = self.offset_next;
                    match read_line_bounded(&mut self.input) {
                        Ok(Some((line, truncated))) => {
                            self.offset_next += line.len() as FileOffset;
                            if truncated {
                                // flush the rest of the over-long line,
                                // unless it already ended at a newline
                                if !line.ends_with(b"\n") {
                                    match discard_to_newline(&mut self.input) {
                                        Ok(discarded) => {
                                            self.offset_next += discarded as FileOffset
                                        }
                                        Err(err) => {
                                            self.done = true;
                                            return ResultS3::Err(ParseError::Io(err));
                                        }
                                    }
                                }
                                self.summary.count_inputs_unmatched += 1;
                                de_wrn!(
                                    "{:?}: line at offset {} exceeds {} bytes, skipping",
                                    self.path, offset, MAX_LINE_LENGTH,
                                );
                                continue;
                            }
                            (line, offset)
                        }
                        Ok(None) => {
                            self.done = true;
                            defx!("end of stream");
                            return ResultS3::Done;
                        }
                        Err(err) => {
                            self.done = true;
                            defx!("I/O error");
                            return ResultS3::Err(ParseError::Io(err));
                        }
                    }
                }
            };
            let line_cow = line.trim_with(|c| c == '\n' || c == '\r').to_str_lossy();
            let line_str: &str = line_cow.as_ref();
            if line_str.is_empty() {
                continue;
            }
            // XXX: `line_cow` borrows `line`; take an owned copy so
            //      `parse_line` may borrow `self` mutably
            let line_owned: String = line_str.to_string();
            if !self.parse_line(line_owned.as_str(), offset) {
                self.summary.count_inputs_unmatched += 1;
                de_wrn!(
                    "{:?}: no grammar matched line at offset {}, skipping",
                    self.path, offset,
                );
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
