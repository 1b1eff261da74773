// src/tests/mod.rs

//! Tests for _cslib_.
//!
//! Tests are placed at `src/tests/`, inside the `cslib`. This is a
//! reasonable trade-off of separation and access: tests placed at
//! top-level path `tests/` do not have crate-internal visibility, which
//! some of these tests need.

pub mod common;
pub mod datetime_tests;
pub mod grammarreader_tests;
pub mod lexreader_tests;
