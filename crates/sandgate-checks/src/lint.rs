//! Static analysis in fix-then-report mode
//!
//! Each configured tool runs with its auto-fix flags first (formatter
//! last, in apply mode). Whatever the tools could not fix themselves is
//! counted as unresolved. A crashing or missing tool is a failed outcome,
//! never a pipeline error.

use regex::Regex;
use sandgate_core::{CheckConfig, LintOutcome, SandgateConfig};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

const MAX_REPORTED_LINES: usize = 10;

fn issue_re() -> &'static Regex {
    // "path:line:" diagnostics plus bare ruff/flake8 codes
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^\S+:\d+)|(^(error|warning)(\[|:))|(^[EWF]\d{2,})").expect("static regex")
    })
}

/// Runs the configured lint and format tools inside a workspace
pub struct LintRunner {
    commands: Vec<Vec<String>>,
    timeout: Duration,
}

impl LintRunner {
    pub fn new(commands: Vec<Vec<String>>, timeout_secs: u64) -> Self {
        Self {
            commands,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build from config, falling back to language auto-detection
    pub fn detect(config: &CheckConfig, workspace: &Path) -> Self {
        let commands = if !config.lint_commands.is_empty() {
            config.lint_commands.clone()
        } else {
            SandgateConfig::detect_language(workspace)
                .map(SandgateConfig::default_lint_commands)
                .unwrap_or_default()
        };
        Self::new(commands, config.lint_timeout_secs)
    }

    /// Run every tool; success iff nothing unresolved remains afterwards.
    pub async fn run(&self, workspace: &Path) -> LintOutcome {
        if self.commands.is_empty() {
            info!("No lint tools configured or detected, skipping lint");
            return LintOutcome::clean();
        }

        let mut outcome = LintOutcome::clean();

        for command in &self.commands {
            let Some(program) = command.first() else {
                continue;
            };
            let tool = tool_name(command);

            info!("Running {} in fix mode", tool);

            let mut cmd = Command::new(program);
            cmd.args(&command[1..])
                .current_dir(workspace)
                .kill_on_drop(true);

            let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    warn!("{} failed to start: {}", tool, e);
                    outcome.success = false;
                    outcome
                        .unresolved
                        .push(format!("failed to run {}: {}", tool, e));
                    *outcome.issues_by_tool.entry(tool).or_insert(0) += 1;
                    continue;
                }
                Err(_) => {
                    warn!("{} exceeded {}s timeout", tool, self.timeout.as_secs());
                    outcome.success = false;
                    outcome
                        .unresolved
                        .push(format!("{}: timeout exceeded", tool));
                    *outcome.issues_by_tool.entry(tool).or_insert(0) += 1;
                    continue;
                }
            };

            if output.status.success() {
                outcome.issues_by_tool.entry(tool).or_insert(0);
                continue;
            }

            // Non-zero exit: whatever the fix pass left behind is unresolved
            let combined = format!(
                "{}\n{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            let issues = count_issue_lines(&combined);

            outcome.success = false;
            *outcome.issues_by_tool.entry(tool.clone()).or_insert(0) += issues;

            for line in combined
                .lines()
                .filter(|l| issue_re().is_match(l))
                .take(MAX_REPORTED_LINES)
            {
                outcome.unresolved.push(format!("{}: {}", tool, line.trim()));
            }
            if outcome.unresolved.is_empty() {
                outcome
                    .unresolved
                    .push(format!("{}: exited nonzero", tool));
            }

            warn!("{} left {} unresolved issue(s)", tool, issues);
        }

        outcome
    }
}

/// Human-readable tool name: keep the subcommand for runner programs
fn tool_name(command: &[String]) -> String {
    match command {
        [first, second, ..]
            if matches!(first.as_str(), "cargo" | "npx" | "npm" | "python" | "python3") =>
        {
            let sub = if second == "-m" && command.len() > 2 {
                &command[2]
            } else {
                second
            };
            format!("{} {}", first, sub)
        }
        [first, ..] => first.clone(),
        [] => String::new(),
    }
}

/// Count diagnostic lines; a nonzero exit with no recognizable lines still
/// counts as one unresolved issue.
fn count_issue_lines(output: &str) -> u32 {
    let count = output.lines().filter(|l| issue_re().is_match(l)).count() as u32;
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tool_name() {
        let name = tool_name(&["cargo".into(), "clippy".into(), "--fix".into()]);
        assert_eq!(name, "cargo clippy");

        let name = tool_name(&["python".into(), "-m".into(), "pytest".into()]);
        assert_eq!(name, "python pytest");

        assert_eq!(tool_name(&["ruff".into(), "check".into()]), "ruff");
    }

    #[test]
    fn test_count_issue_lines() {
        let out = "app.py:12:1: F401 'os' imported but unused\nE501 line too long\nok";
        assert_eq!(count_issue_lines(out), 2);

        // Nonzero exit with unparseable output still counts once
        assert_eq!(count_issue_lines("something broke"), 1);
    }

    #[tokio::test]
    async fn test_clean_run() {
        let dir = tempdir().unwrap();
        let runner = LintRunner::new(vec![vec!["true".to_string()]], 10);

        let outcome = runner.run(dir.path()).await;
        assert!(outcome.success);
        assert!(outcome.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_failing_tool_is_recorded_not_raised() {
        let dir = tempdir().unwrap();
        let runner = LintRunner::new(vec![vec!["false".to_string()]], 10);

        let outcome = runner.run(dir.path()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.total_issues(), 1);
        assert!(!outcome.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_is_recorded() {
        let dir = tempdir().unwrap();
        let runner = LintRunner::new(vec![vec!["definitely-not-a-linter".to_string()]], 10);

        let outcome = runner.run(dir.path()).await;
        assert!(!outcome.success);
        assert!(outcome.unresolved[0].contains("failed to run"));
    }

    #[tokio::test]
    async fn test_later_tools_still_run_after_failure() {
        let dir = tempdir().unwrap();
        let runner = LintRunner::new(
            vec![vec!["false".to_string()], vec!["true".to_string()]],
            10,
        );

        let outcome = runner.run(dir.path()).await;
        assert!(!outcome.success);
        // Both tools appear in the per-tool counts
        assert_eq!(outcome.issues_by_tool.len(), 2);
    }

    #[tokio::test]
    async fn test_no_tools_is_clean() {
        let dir = tempdir().unwrap();
        let runner = LintRunner::detect(&sandgate_core::CheckConfig::default(), dir.path());

        let outcome = runner.run(dir.path()).await;
        assert!(outcome.success);
    }
}
