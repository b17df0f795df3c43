//! # sandgate-checks
//!
//! The three validation signals for Sandgate:
//! - Test suite execution with pass/fail/coverage parsing
//! - Static analysis in fix-then-report mode plus formatting
//! - Live HTTP probes against the service's critical routes
//!
//! Check failures and timeouts are folded into their outcome structs;
//! nothing in this crate escalates a failing tool into a pipeline error.

#![allow(dead_code)]

mod lint;
mod probe;
mod tests_runner;

pub use lint::LintRunner;
pub use probe::EndpointProbe;
pub use tests_runner::TestRunner;
