//! Unified error types for Sandgate

use thiserror::Error;

/// Unified error type for all Sandgate operations
#[derive(Error, Debug)]
pub enum SandgateError {
    // VCS errors
    #[error("Git command failed: {0}")]
    GitCommand(String),

    // Run-fatal: trunk could not be synced or the branch created
    #[error("Workspace isolation failed: {0}")]
    Isolation(String),

    // Run-fatal: a patch did not apply cleanly
    #[error("Patch '{patch}' failed to apply: {detail}")]
    PatchApply { patch: String, detail: String },

    // Fatal to the merge step only; callers downgrade to review
    #[error("Merge is no longer fast-forward: {0}")]
    MergeConflict(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    // Pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    // Store errors
    #[error("Result store error: {0}")]
    Store(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using SandgateError
pub type Result<T> = std::result::Result<T, SandgateError>;
