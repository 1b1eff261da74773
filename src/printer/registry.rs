// src/printer/registry.rs

//! Implements the [`FormatterRegistry`], the explicit, build-once index
//! from `data_type` to [`EventFormatter`].
//!
//! The registry is an explicitly constructed, passed-by-reference
//! object (not process-global mutable state) with a documented
//! lifecycle: empty → built → read-only. The `data_type → formatter`
//! index is built lazily, exactly once, on the first lookup; concurrent
//! readers after construction need no locking. A spec whose `data_type`
//! collides with an already-indexed one is warned about and dropped;
//! the earliest-registered spec wins.

use std::collections::BTreeMap;

use ::once_cell::sync::OnceCell;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::FormatterError;
use crate::data::event::Event;
use crate::e_wrn;
use crate::printer::formatter::{EventFormatter, FallbackFormatter, FormatterSpec};

type MapDataTypeToFormatter = BTreeMap<String, Box<dyn EventFormatter>>;

/// The index from `data_type` to formatter. See the
/// [module documentation].
///
/// [module documentation]: self
pub struct FormatterRegistry {
    specs: Vec<FormatterSpec>,
    /// Built exactly once, on first lookup.
    index: OnceCell<MapDataTypeToFormatter>,
    fallback: FallbackFormatter,
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("specs", &self.specs.len())
            .field("built", &self.index.get().is_some())
            .finish()
    }
}

impl FormatterRegistry {
    pub fn new(specs: Vec<FormatterSpec>) -> FormatterRegistry {
        FormatterRegistry {
            specs,
            index: OnceCell::new(),
            fallback: FallbackFormatter,
        }
    }

    /// Has the index been built yet?
    pub fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    /// Compile and index every spec. A spec with a duplicate
    /// `data_type` is dropped with a warning; a spec with a bad piece
    /// fails the whole build.
    fn build_index(&self) -> std::result::Result<MapDataTypeToFormatter, FormatterError> {
        defn!("{} specs", self.specs.len());
        let mut index = MapDataTypeToFormatter::new();
        for spec in self.specs.iter() {
            let data_type: &str = spec.data_type();
            if index.contains_key(data_type) {
                e_wrn!(
                    "duplicate formatter registration for data_type {:?}; keeping the first",
                    data_type,
                );
                continue;
            }
            index.insert(data_type.to_string(), spec.compile()?);
        }
        defx!("indexed {} formatters", index.len());

        Ok(index)
    }

    /// The formatter for this event's `data_type`, or the fallback
    /// formatter when the `data_type` is unmapped. Builds the index on
    /// first call.
    pub fn get_formatter(
        &self,
        event: &Event,
    ) -> std::result::Result<&dyn EventFormatter, FormatterError> {
        let index: &MapDataTypeToFormatter =
            self.index.get_or_try_init(|| self.build_index())?;

        Ok(match index.get(event.data_type()) {
            Some(formatter) => formatter.as_ref(),
            None => &self.fallback,
        })
    }

    /// Render `(long, short)` messages for this event.
    pub fn get_messages(
        &self,
        event: &Event,
    ) -> std::result::Result<(String, String), FormatterError> {
        self.get_formatter(event)?.get_messages(event)
    }

    /// Render through the event's message cache: the messages are
    /// computed on the first call and reused afterwards.
    pub fn get_messages_cached<'e>(
        &self,
        event: &'e Event,
    ) -> std::result::Result<&'e (String, String), FormatterError> {
        event
            .message_cache()
            .get_or_try_init(|| self.get_messages(event))
    }
}
