// src/data/mod.rs

//! The `data` modules define the data structures shared by every reader
//! and by the formatting layer.

pub mod datetime;
pub mod event;
