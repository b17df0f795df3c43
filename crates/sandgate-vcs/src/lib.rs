//! # sandgate-vcs
//!
//! Git integration layer for Sandgate.
//!
//! This crate provides:
//! - Git command execution abstraction (real and mock)
//! - Ephemeral workspace creation, patch application, and decision
//!   execution (fast-forward merge, revert, review handoff)

#![allow(dead_code)]

mod command;
mod isolation;

pub use command::{GitCommand, GitExecutor, GitOutput, MockGitExecutor};
pub use isolation::{IsolationManager, WorkspaceHandle, WorkspaceState};
