// src/printer/mod.rs

//! The `printer` modules turn an [`Event`]'s attribute values into a
//! long and a short display string through declarative
//! [`FormatterSpec`]s indexed by a [`FormatterRegistry`].
//!
//! [`Event`]: crate::data::event::Event
//! [`FormatterSpec`]: crate::printer::formatter::FormatterSpec
//! [`FormatterRegistry`]: crate::printer::registry::FormatterRegistry

pub mod formatter;
pub mod registry;
