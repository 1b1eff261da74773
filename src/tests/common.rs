// src/tests/common.rs

//! Common test helpers: timezone fixtures, a typed [`EventValues`]
//! schema, and a small syslog-like lexer definition shared by several
//! test modules.

#![allow(non_snake_case)]

use std::io::Cursor;
use std::sync::Arc;

use ::lazy_static::lazy_static;

use crate::common::FileOffset;
use crate::data::datetime::{EpochMicros, FixedOffset};
use crate::data::event::{
    AttrValue,
    Event,
    EventValues,
    MapValues,
    TIMESTAMP_DESC_VISITED,
    TIMESTAMP_DESC_WRITTEN,
};
use crate::readers::lexreader::{
    LexAction,
    LexEventBuilder,
    LexField,
    LexFields,
    LexReader,
    LexTransition,
    STATE_INITIAL,
};

lazy_static! {
    /// UTC
    pub static ref FO_0: FixedOffset = FixedOffset::east_opt(0).unwrap();
    /// UTC+01:00
    pub static ref FO_P1: FixedOffset = FixedOffset::east_opt(3600).unwrap();
    /// UTC-08:00
    pub static ref FO_M8: FixedOffset = FixedOffset::west_opt(8 * 3600).unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// a typed per-data_type schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DT_VISIT: &str = "app:history:visit";

/// One plain struct per `data_type`, fields known at compile time.
#[derive(Debug)]
pub struct VisitValues {
    pub url: String,
    pub title: Option<String>,
    pub n: i64,
}

impl EventValues for VisitValues {
    fn data_type(&self) -> &str {
        DT_VISIT
    }

    fn value(
        &self,
        name: &str,
    ) -> Option<AttrValue> {
        match name {
            "url" => Some(AttrValue::Str(self.url.clone())),
            "title" => self.title.clone().map(AttrValue::Str),
            "n" => Some(AttrValue::Int(self.n)),
            _ => None,
        }
    }

    fn names(&self) -> Vec<&str> {
        vec!["url", "title", "n"]
    }
}

pub fn visit_event(
    url: &str,
    title: Option<&str>,
    n: i64,
) -> Event {
    Event::new(
        0,
        TIMESTAMP_DESC_VISITED,
        Arc::new(VisitValues {
            url: url.to_string(),
            title: title.map(String::from),
            n,
        }),
        "HIST",
        "Browser History",
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// a syslog-like lexer definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DT_SYSLOG: &str = "test:syslog:line";

/// Transitions for lines of the shape
/// `MM/DD/YYYY HH:MM:SS user:host- body`.
pub fn syslog_transitions() -> Vec<LexTransition> {
    vec![
        LexTransition::new(STATE_INITIAL, r"(\d{1,2})/", LexAction::Capture(LexField::Month), "DAY")
            .unwrap(),
        LexTransition::new("DAY", r"(\d{1,2})/", LexAction::Capture(LexField::Day), "YEAR").unwrap(),
        LexTransition::new("YEAR", r"(\d{4}) ", LexAction::Capture(LexField::Year), "TIME").unwrap(),
        LexTransition::new("TIME", r"(\d{2}:\d{2}:\d{2}) ", LexAction::Capture(LexField::Time), "USER")
            .unwrap(),
        LexTransition::new("USER", r"(\w+):", LexAction::Capture(LexField::User), "HOST").unwrap(),
        LexTransition::new("HOST", r"([\w.-]+)- ", LexAction::Capture(LexField::Host), "BODY")
            .unwrap(),
        LexTransition::new("BODY", r"([^\n]*)", LexAction::Capture(LexField::Body), "EOL").unwrap(),
        LexTransition::new("EOL", r"\n|$", LexAction::PushRecord, STATE_INITIAL).unwrap(),
    ]
}

#[derive(Debug)]
pub struct SyslogLexBuilder;

impl LexEventBuilder for SyslogLexBuilder {
    fn build(
        &self,
        fields: &LexFields,
        timestamp: EpochMicros,
        offset: FileOffset,
    ) -> Event {
        let mut values: MapValues = MapValues::new(DT_SYSLOG);
        values.insert("body", fields.body.as_str());
        if let Some(host) = fields.host.as_deref() {
            values.insert("host", host);
        }
        if let Some(user) = fields.user.as_deref() {
            values.insert("user", user);
        }

        Event::new(
            timestamp,
            TIMESTAMP_DESC_WRITTEN,
            Arc::new(values),
            "LOG",
            "Lexer Text Log",
        )
        .with_offset(offset)
    }
}

/// A ready-to-pull [`LexReader`] over in-memory input.
pub fn syslog_lex_reader(input: &str) -> LexReader {
    LexReader::new(
        String::from("test.log"),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
        syslog_transitions(),
        Box::new(SyslogLexBuilder),
        *FO_0,
    )
}
