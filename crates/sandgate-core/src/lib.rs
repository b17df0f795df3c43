//! # sandgate-core
//!
//! Core types for the Sandgate change-validation pipeline.
//!
//! Sandgate takes a proposed patch set, applies it on an ephemeral branch,
//! runs real checks (tests, linters, live endpoint probes) against it, and
//! deterministically decides whether to merge, hand off for review, or
//! discard the change.
//!
//! ## Core paradigm
//!
//! - Every validation run owns exactly one isolated workspace
//! - Check failures are outcomes, not errors; only isolation and patch
//!   application are fatal to a run
//! - The decision is a pure function of the check outcomes
//! - Every run is appended to an immutable history, exactly once

#![allow(dead_code)]

mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::{CheckConfig, Language, ProbeConfig, RouteSpec, SandgateConfig};
pub use error::{Result, SandgateError};
pub use types::*;
