//! # sandgate-decision
//!
//! Confidence scoring and the merge/review/revert decision.
//!
//! The engine is a pure function of the three check outcomes plus
//! coverage; it keeps no state across runs.

#![allow(dead_code)]

mod engine;

pub use engine::DecisionEngine;
