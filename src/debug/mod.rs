// src/debug/mod.rs

pub mod printers;
