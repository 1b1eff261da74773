// src/common.rs
//
// common imports, type aliases, and other globals (avoids circular imports)

use std::fmt;

use ::thiserror::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// paths, counts, offsets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `F`ake `Path` or `F`ile `Path`; a display name for an input stream,
/// used in diagnostics and `FormatMismatch` messages.
pub type FPath = String;
pub type FPaths = Vec<FPath>;

/// A count of anything.
pub type Count = u64;

/// A source-relative position of an [`Event`]: byte offset, row id, or
/// record index, depending on the producing reader. `0` is the "unset"
/// sentinel (see [`Event::offset`]).
///
/// [`Event`]: crate::data::event::Event
/// [`Event::offset`]: crate::data::event::Event#method.offset
pub type Offset = u64;

/// An [`Offset`] known to be a byte offset into a stream.
pub type FileOffset = Offset;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// custom Results enums for various *Reader functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `Result` Extended; for event-pulling functions.
///
/// A three-state result: a reader either found the next item, ran out of
/// input without error, or hit an error.
#[derive(Debug)]
pub enum ResultS3<T, E> {
    /// Contains the success data
    Found(T),
    /// Input is exhausted, or other condition that means "Done", nothing to return, but no bad errors happened
    Done,
    /// Contains the error value, something bad happened
    Err(E),
}

impl<T, E> ResultS3<T, E> {
    /// Returns `true` if the result is [`Found`, `Done`].
    ///
    /// [`Found`]: ResultS3::Found
    /// [`Done`]: ResultS3::Done
    #[allow(dead_code)]
    #[inline(always)]
    pub const fn is_ok(&self) -> bool {
        matches!(*self, ResultS3::Found(_) | ResultS3::Done)
    }

    /// Returns `true` if the result is [`Found`].
    ///
    /// [`Found`]: ResultS3::Found
    #[inline(always)]
    pub const fn is_found(&self) -> bool {
        matches!(*self, ResultS3::Found(_))
    }

    /// Returns `true` if the result is [`Err`].
    ///
    /// [`Err`]: ResultS3::Err
    #[inline(always)]
    pub const fn is_err(&self) -> bool {
        matches!(*self, ResultS3::Err(_))
    }

    /// Returns `true` if the result is [`Done`].
    ///
    /// [`Done`]: ResultS3::Done
    #[inline(always)]
    pub const fn is_done(&self) -> bool {
        matches!(*self, ResultS3::Done)
    }

    /// Converts from `ResultS3<T, E>` to [`Option<T>`],
    /// consuming `self`, and discarding the error, if any.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn ok(self) -> Option<T> {
        match self {
            ResultS3::Found(x) => Some(x),
            ResultS3::Done => None,
            ResultS3::Err(_) => None,
        }
    }

    /// Converts from `ResultS3<T, E>` to [`Option<E>`],
    /// consuming `self`, and discarding the success value, if any.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn err(self) -> Option<E> {
        match self {
            ResultS3::Found(_) => None,
            ResultS3::Done => None,
            ResultS3::Err(x) => Some(x),
        }
    }

    /// Returns the contained [`Found`] value, consuming `self`.
    ///
    /// # Panics
    ///
    /// Panics if the value is not `Found`. Intended for tests.
    ///
    /// [`Found`]: ResultS3::Found
    #[allow(dead_code)]
    #[track_caller]
    pub fn unwrap(self) -> T
    where
        E: fmt::Debug,
    {
        match self {
            ResultS3::Found(x) => x,
            ResultS3::Done => panic!("called `ResultS3::unwrap()` on a `Done` value"),
            ResultS3::Err(err) => panic!("called `ResultS3::unwrap()` on an `Err` value: {:?}", err),
        }
    }
}

impl<T, E> fmt::Display for ResultS3<T, E>
where
    E: fmt::Display,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ResultS3::Found(_) => {
                write!(f, "ResultS3::Found")
            }
            ResultS3::Done => {
                write!(f, "ResultS3::Done")
            }
            ResultS3::Err(err) => {
                write!(f, "ResultS3::Err({})", err)
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// error taxonomy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors raised by the event readers.
///
/// `FormatMismatch` is the expected, recoverable "not my format" signal;
/// a dispatcher trying several readers against unknown input should move
/// on to the next candidate reader. It never indicates a bug.
///
/// `RecordMalformed` is per-record. Before a reader has verified the
/// input format it counts toward format rejection; after verification it
/// is logged and the record is dropped, preserving forward progress.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input does not have the structure this reader expects.
    #[error("unable to parse {path:?} as {format}: {reason}")]
    FormatMismatch {
        path: FPath,
        format: &'static str,
        reason: String,
    },
    /// One record's fields do not resolve to a valid timestamp or structure.
    #[error("malformed record at offset {offset}: {reason}")]
    RecordMalformed { offset: Offset, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sql(#[from] ::rusqlite::Error),
}

impl ParseError {
    /// Is this the recoverable "wrong format, try another reader" signal?
    pub const fn is_mismatch(&self) -> bool {
        matches!(*self, ParseError::FormatMismatch { .. })
    }

    pub const fn is_malformed(&self) -> bool {
        matches!(*self, ParseError::RecordMalformed { .. })
    }
}

/// Errors raised by the message-formatting layer.
///
/// `DataTypeMismatch` indicates a dispatch/wiring defect upstream, not bad
/// input data; given a correctly built [`FormatterRegistry`] it is
/// unreachable.
///
/// [`FormatterRegistry`]: crate::printer::registry::FormatterRegistry
#[derive(Debug, Error)]
pub enum FormatterError {
    /// An event was routed to a formatter for a different `data_type`.
    #[error("formatter for data_type {expected:?} given event of data_type {got:?}")]
    DataTypeMismatch { expected: String, got: String },
    /// A flat template referenced an attribute the event does not have.
    #[error("attribute {attribute:?} missing from event of data_type {data_type:?}")]
    MissingAttribute { attribute: String, data_type: String },
    /// A conditional message piece has more than one `{placeholder}`.
    #[error("message piece {piece:?} has more than one placeholder")]
    BadPiece { piece: String },
}
