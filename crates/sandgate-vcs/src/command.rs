//! Git command execution abstraction

use async_trait::async_trait;
use sandgate_core::{Result, SandgateError};
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Output from a git command
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn err(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Trait for executing git commands (allows mocking in tests)
#[async_trait]
pub trait GitExecutor: Send + Sync {
    /// Execute a git command with the given arguments
    async fn exec(&self, args: &[&str]) -> Result<GitOutput>;

    /// Get the repository root
    fn repo_root(&self) -> &PathBuf;
}

/// Real git command executor
#[derive(Clone)]
pub struct GitCommand {
    repo_root: PathBuf,
}

impl GitCommand {
    /// Create a new git command executor for the given repository
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Auto-detect repository root from current directory
    pub async fn detect() -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .await
            .map_err(|e| SandgateError::GitCommand(format!("Failed to run git rev-parse: {}", e)))?;

        if !output.status.success() {
            return Err(SandgateError::GitCommand(
                "Not in a git repository".to_string(),
            ));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(root))
    }
}

#[async_trait]
impl GitExecutor for GitCommand {
    #[instrument(skip(self), fields(repo = %self.repo_root.display()))]
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("Executing git {:?}", args);

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| SandgateError::GitCommand(format!("Failed to execute git: {}", e)))?;

        let git_output = GitOutput::from(output);

        if !git_output.success {
            debug!("Git command failed: {}", git_output.stderr);
        }

        Ok(git_output)
    }

    fn repo_root(&self) -> &PathBuf {
        &self.repo_root
    }
}

/// Mock git executor for testing
#[derive(Clone, Default)]
pub struct MockGitExecutor {
    repo_root: PathBuf,
    responses: std::collections::HashMap<String, GitOutput>,
    /// Response for any command not explicitly stubbed
    fallback: Option<GitOutput>,
}

impl MockGitExecutor {
    pub fn new() -> Self {
        Self {
            repo_root: PathBuf::from("/mock/repo"),
            responses: std::collections::HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_response(mut self, command: &str, output: GitOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Succeed any command that has no explicit stub
    pub fn permissive(mut self) -> Self {
        self.fallback = Some(GitOutput::ok(""));
        self
    }

    /// Stub a command by prefix (branch names carry a random suffix)
    pub fn with_prefix_response(mut self, prefix: &str, output: GitOutput) -> Self {
        self.responses.insert(format!("prefix:{}", prefix), output);
        self
    }
}

#[async_trait]
impl GitExecutor for MockGitExecutor {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");

        if let Some(output) = self.responses.get(&key) {
            return Ok(output.clone());
        }

        for (stub, output) in &self.responses {
            if let Some(prefix) = stub.strip_prefix("prefix:") {
                if key.starts_with(prefix) {
                    return Ok(output.clone());
                }
            }
        }

        self.fallback
            .clone()
            .ok_or_else(|| SandgateError::GitCommand(format!("No mock response for: {}", key)))
    }

    fn repo_root(&self) -> &PathBuf {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_executor() {
        let executor = MockGitExecutor::new()
            .with_response("status --porcelain", GitOutput::ok("M src/api.py"));

        let output = executor.exec(&["status", "--porcelain"]).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "M src/api.py");
    }

    #[tokio::test]
    async fn test_mock_prefix_response() {
        let executor = MockGitExecutor::new()
            .with_prefix_response("checkout -b sandbox-validate-", GitOutput::ok(""));

        let output = executor
            .exec(&["checkout", "-b", "sandbox-validate-20250101-abc123"])
            .await
            .unwrap();
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_mock_unstubbed_command_errors() {
        let executor = MockGitExecutor::new();
        assert!(executor.exec(&["push"]).await.is_err());
    }
}
