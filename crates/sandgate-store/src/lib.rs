//! # sandgate-store
//!
//! Append-only persisted history of validation runs.
//!
//! One JSON record per line at a fixed path. Records are immutable once
//! appended; unparsable lines are skipped on read, never rewritten.

#![allow(dead_code)]

mod store;

pub use store::ResultStore;
