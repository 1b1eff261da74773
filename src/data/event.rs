// src/data/event.rs

//! Implements [`Event`] and [`EventContainer`], the atomic extracted
//! facts shared by every reader and by the formatting layer.
//!
//! An `Event` is one timestamped fact with a schema tag (`data_type`)
//! and typed attribute values. Attribute access goes through the
//! [`EventValues`] trait so that a concrete artifact extractor can define
//! one plain struct per `data_type` with fields known at compile time;
//! [`MapValues`] is the open name→value fallback for generic callers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ::once_cell::sync::OnceCell;

use crate::common::Offset;
use crate::data::datetime::EpochMicros;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// attribute values
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One attribute value of an [`Event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    StrList(Vec<String>),
}

impl AttrValue {
    /// Is this value "meaningful" for conditional message assembly?
    ///
    /// A boolean or numeric value is always meaningful, including zero
    /// and `false`. A string or sequence is meaningful only if non-empty.
    pub fn is_meaningful(&self) -> bool {
        match self {
            AttrValue::Str(s) => !s.is_empty(),
            AttrValue::Int(_) => true,
            AttrValue::Bool(_) => true,
            AttrValue::StrList(l) => !l.is_empty(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::StrList(l) => write!(f, "{}", l.join(", ")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> AttrValue {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> AttrValue {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> AttrValue {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> AttrValue {
        AttrValue::Bool(b)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventValues
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The attribute values of an [`Event`], keyed by the event's
/// `data_type` schema.
///
/// A concrete artifact extractor defines one plain struct per
/// `data_type` implementing this trait; [`MapValues`] is the open-map
/// implementation for schemas assembled at runtime. The default fallback
/// formatter relies on [`names`] to enumerate arbitrary fields.
///
/// [`names`]: EventValues::names
pub trait EventValues: fmt::Debug + Send + Sync {
    /// The dotted schema tag, e.g. `"app:history:visit"`. Exactly one
    /// per event, immutable after creation; used as the formatter
    /// lookup key.
    fn data_type(&self) -> &str;

    /// The value of the named attribute, or `None` if this schema has
    /// no such attribute or the field is unset.
    fn value(
        &self,
        name: &str,
    ) -> Option<AttrValue>;

    /// All attribute names of this schema, in declaration order.
    fn names(&self) -> Vec<&str>;
}

/// A shareable pointer to the values of one source record.
/// Sibling [`Event`]s of one [`EventContainer`] share one allocation.
pub type EventValuesP = Arc<dyn EventValues + Send + Sync>;

/// Open name→value attribute map implementing [`EventValues`], for
/// schemas not known at compile time. Keys iterate in sorted order, so
/// rendering is deterministic.
#[derive(Clone, Debug)]
pub struct MapValues {
    data_type: String,
    map: BTreeMap<String, AttrValue>,
}

impl MapValues {
    pub fn new(data_type: &str) -> MapValues {
        MapValues {
            data_type: data_type.to_string(),
            map: BTreeMap::new(),
        }
    }

    pub fn insert<V: Into<AttrValue>>(
        &mut self,
        name: &str,
        value: V,
    ) {
        self.map.insert(name.to_string(), value.into());
    }

    /// Builder-style [`insert`].
    ///
    /// [`insert`]: MapValues::insert
    pub fn with<V: Into<AttrValue>>(
        mut self,
        name: &str,
        value: V,
    ) -> MapValues {
        self.insert(name, value);

        self
    }
}

impl EventValues for MapValues {
    fn data_type(&self) -> &str {
        self.data_type.as_str()
    }

    fn value(
        &self,
        name: &str,
    ) -> Option<AttrValue> {
        self.map.get(name).cloned()
    }

    fn names(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// common `timestamp_desc` labels
pub const TIMESTAMP_DESC_CREATION: &str = "Creation Time";
pub const TIMESTAMP_DESC_MODIFICATION: &str = "Modification Time";
pub const TIMESTAMP_DESC_ACCESS: &str = "Last Access Time";
pub const TIMESTAMP_DESC_VISITED: &str = "Last Visited";
pub const TIMESTAMP_DESC_WRITTEN: &str = "Content Written";

/// One extracted, timestamped fact.
///
/// Created by a reader as soon as enough fields are known; immutable once
/// handed to the consumer, except for the lazily-filled message cache
/// written the first time the event is rendered (see
/// [`FormatterRegistry::get_messages_cached`]).
///
/// [`FormatterRegistry::get_messages_cached`]: crate::printer::registry::FormatterRegistry#method.get_messages_cached
#[derive(Clone)]
pub struct Event {
    /// Microseconds since the Unix epoch, UTC. `0` means "not a time"
    /// and is a valid, non-error value.
    timestamp: EpochMicros,
    /// Short semantic label for the timestamp, e.g. "Creation Time".
    timestamp_desc: String,
    /// The typed attribute values; the `data_type` lives here.
    values: EventValuesP,
    /// Source-relative position for provenance and default
    /// disambiguation. `0` means "unset"; the database framework adopts
    /// a row `id` when a callback leaves this unset.
    offset: Offset,
    /// The originating query text, set by the database framework.
    query: Option<String>,
    /// Short human label for the producing subsystem, e.g. "LOG".
    source_short: &'static str,
    /// Long human label for the producing subsystem.
    source_long: &'static str,
    /// Rendered `(long, short)` messages, filled on first render.
    message_cache: OnceCell<(String, String)>,
}

impl fmt::Debug for Event {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("Event")
            .field("timestamp", &self.timestamp)
            .field("timestamp_desc", &self.timestamp_desc)
            .field("data_type", &self.data_type())
            .field("offset", &self.offset)
            .field("query", &self.query)
            .field("source", &self.source_short)
            .finish()
    }
}

impl Event {
    pub fn new(
        timestamp: EpochMicros,
        timestamp_desc: &str,
        values: EventValuesP,
        source_short: &'static str,
        source_long: &'static str,
    ) -> Event {
        Event {
            timestamp,
            timestamp_desc: timestamp_desc.to_string(),
            values,
            offset: 0,
            query: None,
            source_short,
            source_long,
            message_cache: OnceCell::new(),
        }
    }

    /// Builder-style offset.
    pub fn with_offset(
        mut self,
        offset: Offset,
    ) -> Event {
        self.offset = offset;

        self
    }

    pub fn timestamp(&self) -> EpochMicros {
        self.timestamp
    }

    pub fn timestamp_desc(&self) -> &str {
        self.timestamp_desc.as_str()
    }

    pub fn values(&self) -> &EventValuesP {
        &self.values
    }

    pub fn data_type(&self) -> &str {
        self.values.data_type()
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn source_short(&self) -> &'static str {
        self.source_short
    }

    pub fn source_long(&self) -> &'static str {
        self.source_long
    }

    pub fn set_offset(
        &mut self,
        offset: Offset,
    ) {
        self.offset = offset;
    }

    pub fn set_query(
        &mut self,
        query: &str,
    ) {
        self.query = Some(query.to_string());
    }

    pub(crate) fn message_cache(&self) -> &OnceCell<(String, String)> {
        &self.message_cache
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventContainer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An ordered group of sibling [`Event`]s produced by one source record
/// with several timestamps (e.g. separate "created" and "modified"
/// values). The children share `data_type` and non-temporal attributes
/// through one [`EventValuesP`] allocation and differ only in
/// `timestamp`/`timestamp_desc`.
///
/// Owned exclusively by the producing reader until yielded; the consumer
/// flattens the children via [`into_events`].
///
/// [`into_events`]: EventContainer::into_events
#[derive(Clone, Debug)]
pub struct EventContainer {
    values: EventValuesP,
    offset: Offset,
    source_short: &'static str,
    source_long: &'static str,
    timestamps: Vec<(EpochMicros, String)>,
}

impl EventContainer {
    pub fn new(
        values: EventValuesP,
        source_short: &'static str,
        source_long: &'static str,
    ) -> EventContainer {
        EventContainer {
            values,
            offset: 0,
            source_short,
            source_long,
            timestamps: Vec::new(),
        }
    }

    /// Builder-style offset, applied to every flattened child.
    pub fn with_offset(
        mut self,
        offset: Offset,
    ) -> EventContainer {
        self.offset = offset;

        self
    }

    /// Add one `(timestamp, timestamp_desc)` pair.
    pub fn push(
        &mut self,
        timestamp: EpochMicros,
        timestamp_desc: &str,
    ) {
        self.timestamps.push((timestamp, timestamp_desc.to_string()));
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Flatten into individual [`Event`]s, in insertion order.
    pub fn into_events(self) -> Vec<Event> {
        let values = self.values;
        let offset = self.offset;
        let source_short = self.source_short;
        let source_long = self.source_long;
        self.timestamps
            .into_iter()
            .map(|(timestamp, timestamp_desc)| {
                Event::new(
                    timestamp,
                    timestamp_desc.as_str(),
                    values.clone(),
                    source_short,
                    source_long,
                )
                .with_offset(offset)
            })
            .collect()
    }
}
