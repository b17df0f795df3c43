//! # sandgate-pipeline
//!
//! The validation run lifecycle for Sandgate.
//!
//! This crate provides:
//! - The pipeline orchestrator and its single entry point,
//!   `run_validation(patch_set)`
//! - Fan-out of the three checks with a join barrier before scoring
//! - Decision execution with merge-conflict downgrade to review
//! - Fail-open history persistence and workspace cleanup

#![allow(dead_code)]

mod pipeline;

pub use pipeline::{CheckPhase, CheckSuite, PipelineOrchestrator};
