//! Storage providers for the campaign history log
//!
//! This crate provides implementations of the `HistoryStore` trait for:
//!
//! - Local filesystem (a single JSON document, written atomically)
//! - In-process memory

#![warn(missing_docs)]
#![warn(clippy::all)]

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
