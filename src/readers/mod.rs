// src/readers/mod.rs

//! The `readers` modules implement the three event-extraction
//! strategies behind one [`EventReader`] trait:
//!
//! - [`LexReader`], a state-machine text parser for formats whose
//!   records are not simply line-delimited.
//! - [`GrammarReader`], a declarative per-line matcher supporting
//!   several candidate line shapes in one file.
//! - [`SqliteReader`], a query-to-event extraction framework for
//!   artifacts stored in an embedded SQLite database.
//!
//! Every reader produces a lazy, single-pass, non-restartable sequence
//! of [`Event`]s. A dispatcher offers an input stream to candidate
//! readers in turn; a reader that cannot verify the input's structure
//! signals [`ParseError::FormatMismatch`] so the dispatcher can try the
//! next candidate.
//!
//! [`LexReader`]: crate::readers::lexreader::LexReader
//! [`GrammarReader`]: crate::readers::grammarreader::GrammarReader
//! [`SqliteReader`]: crate::readers::sqlitereader::SqliteReader
//! [`Event`]: crate::data::event::Event
//! [`ParseError::FormatMismatch`]: crate::common::ParseError

pub mod grammarreader;
pub mod lexreader;
pub mod sqlitereader;

use crate::common::{Count, FPath, ParseError, ResultS3};
use crate::data::event::Event;

/// Typed result of one "pull the next event" request.
pub type ResultNextEvent = ResultS3<Event, ParseError>;

/// Per-reader counters for the dispatcher's per-file diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// Events yielded to the consumer.
    pub count_events: Count,
    /// Records dropped because their fields did not resolve.
    pub count_records_malformed: Count,
    /// Inputs (lines, buffers) that matched nothing.
    pub count_inputs_unmatched: Count,
}

/// One event-extraction strategy driving one input stream.
///
/// Implementors guarantee:
/// - production is lazy: no record work happens until the consumer calls
///   [`next_event`], and production pauses between calls;
/// - the sequence is single-pass and non-restartable;
/// - scoped resources (scratch files, database handles, descriptors) are
///   released deterministically when the reader is dropped, even when
///   iteration is abandoned early.
///
/// [`next_event`]: EventReader::next_event
pub trait EventReader {
    /// Pull the next [`Event`].
    ///
    /// `Err(ParseError::FormatMismatch)` may only be returned before any
    /// event has been yielded; after the first event the input format is
    /// considered verified and per-record problems are absorbed.
    fn next_event(&mut self) -> ResultNextEvent;

    /// The display name of the input stream.
    fn path(&self) -> &FPath;

    /// Counters so far.
    fn summary(&self) -> Summary;

    /// Adapt this reader into an [`Iterator`] of
    /// `Result<Event, ParseError>`. The iterator fuses after `Done` or
    /// the first error.
    fn events(self) -> EventsIter<Self>
    where
        Self: Sized,
    {
        EventsIter {
            reader: self,
            done: false,
        }
    }
}

/// [`Iterator`] adapter over an [`EventReader`]. See
/// [`EventReader::events`].
pub struct EventsIter<R: EventReader> {
    reader: R,
    done: bool,
}

impl<R: EventReader> EventsIter<R> {
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: EventReader> Iterator for EventsIter<R> {
    type Item = std::result::Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_event() {
            ResultS3::Found(event) => Some(Ok(event)),
            ResultS3::Done => {
                self.done = true;

                None
            }
            ResultS3::Err(err) => {
                self.done = true;

                Some(Err(err))
            }
        }
    }
}
