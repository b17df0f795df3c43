//! Test suite execution and summary parsing

use regex::Regex;
use sandgate_core::{CheckConfig, SandgateConfig, TestOutcome};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

const MAX_OUTPUT_CHARS: usize = 4000;

fn passed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+passed").expect("static regex"))
}

fn failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+failed").expect("static regex"))
}

fn coverage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"TOTAL.*?(\d+)%").expect("static regex"))
}

/// Executes the full test suite inside a workspace and parses the result.
///
/// Timeouts and tool failures are normal, recoverable outcomes here; the
/// runner never raises for them.
pub struct TestRunner {
    command: Vec<String>,
    timeout: Duration,
}

impl TestRunner {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build from config, falling back to language auto-detection
    pub fn detect(config: &CheckConfig, workspace: &Path) -> Self {
        let command = if !config.test_command.is_empty() {
            config.test_command.clone()
        } else {
            SandgateConfig::detect_language(workspace)
                .map(SandgateConfig::default_test_command)
                .unwrap_or_default()
        };
        Self::new(command, config.test_timeout_secs)
    }

    /// Run the suite, capturing stdout and computing coverage when the
    /// tooling reports one.
    pub async fn run(&self, workspace: &Path) -> TestOutcome {
        let start = Instant::now();

        if self.command.is_empty() {
            // Cannot confirm correctness without a suite
            return TestOutcome::inconclusive(
                "no test command configured or detected",
                start.elapsed().as_secs_f64(),
            );
        }

        info!("Running test suite: {}", self.command.join(" "));

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .current_dir(workspace)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Test command failed to start: {}", e);
                return TestOutcome::inconclusive(
                    format!("failed to run {}: {}", self.command[0], e),
                    start.elapsed().as_secs_f64(),
                );
            }
            Err(_) => {
                warn!("Test suite exceeded {}s timeout", self.timeout.as_secs());
                return TestOutcome::inconclusive(
                    format!("timeout exceeded ({}s)", self.timeout.as_secs()),
                    start.elapsed().as_secs_f64(),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let combined = format!("{}\n{}", stdout, stderr);

        let (passed, failed, summary_found) = parse_summary(&combined);
        let coverage = read_coverage(workspace, &combined);

        // A clean exit with no parseable summary cannot confirm correctness
        let success = output.status.success() && summary_found && failed == 0;

        let outcome = TestOutcome {
            passed,
            failed,
            coverage,
            raw_output: truncate(&combined, MAX_OUTPUT_CHARS),
            duration_secs: start.elapsed().as_secs_f64(),
            success,
        };

        if outcome.success {
            info!("Tests passed: {} ({:.1}s)", passed, outcome.duration_secs);
        } else {
            warn!(
                "Tests not confirmed: {} passed, {} failed, summary_found={}",
                passed, failed, summary_found
            );
        }

        outcome
    }
}

/// Parse "N passed" / "M failed" counts from a test summary.
///
/// Tolerates absent or malformed lines: returns (0, 0, false) when no
/// count could be read.
fn parse_summary(output: &str) -> (u32, u32, bool) {
    let passed = passed_re()
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    let failed = failed_re()
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let found = passed.is_some() || failed.is_some();
    (passed.unwrap_or(0), failed.unwrap_or(0), found)
}

/// Coverage fraction in 0.0..=1.0, from a JSON report when present, else
/// from the textual summary, else unknown.
fn read_coverage(workspace: &Path, output: &str) -> Option<f64> {
    if let Some(value) = read_coverage_json(&workspace.join("coverage.json")) {
        return Some(value);
    }

    coverage_re()
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|pct| (pct / 100.0).clamp(0.0, 1.0))
}

fn read_coverage_json(path: &PathBuf) -> Option<f64> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    let pct = value.get("totals")?.get("percent_covered")?.as_f64()?;
    debug!("Coverage report: {:.1}%", pct);
    Some((pct / 100.0).clamp(0.0, 1.0))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...[truncated]", &s[..cut])
    } else {
        s.to_string()
    }
}
