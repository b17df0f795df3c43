//! Core type definitions for the Sandgate validation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Terminal outcome of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Fast-forward the change into trunk
    Merge,
    /// Leave the workspace intact for a human to inspect
    Review,
    /// Discard the workspace; trunk is untouched
    Revert,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Review => write!(f, "review"),
            Self::Revert => write!(f, "revert"),
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "review" => Ok(Self::Review),
            "revert" => Ok(Self::Revert),
            _ => Err(format!("Invalid decision: {}", s)),
        }
    }
}

/// A single diff to apply inside the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    /// Short human-readable label (defaults to the file name)
    pub name: String,
    /// Path to a unified-diff file on disk
    pub path: PathBuf,
}

impl Patch {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

/// One or more patches applied atomically to a working tree.
///
/// Immutable once constructed; consumed exactly once by the isolation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSet {
    pub id: Uuid,
    pub patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patches,
        }
    }

    pub fn from_files(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self::new(paths.into_iter().map(Patch::from_file).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Result of running the test suite inside a workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Tests that passed
    pub passed: u32,
    /// Tests that failed
    pub failed: u32,
    /// Coverage fraction in 0.0..=1.0 if the tooling reported one
    pub coverage: Option<f64>,
    /// Captured diagnostic output (truncated)
    pub raw_output: String,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// Zero failures and the process exited cleanly within the timeout
    pub success: bool,
}

impl TestOutcome {
    /// Outcome for a suite that never produced a parseable result
    pub fn inconclusive(reason: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            raw_output: reason.into(),
            duration_secs,
            ..Self::default()
        }
    }
}

/// Result of the static-analysis and formatting pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintOutcome {
    /// Remaining issue counts per tool, after auto-fixable ones were corrected
    pub issues_by_tool: BTreeMap<String, u32>,
    /// Unresolved issue lines (or tool failures) for the error log
    pub unresolved: Vec<String>,
    /// No unresolved issues remain after the fix pass
    pub success: bool,
}

impl LintOutcome {
    pub fn clean() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn total_issues(&self) -> u32 {
        self.issues_by_tool.values().sum()
    }
}

/// HTTP method used for a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    Get,
    Post,
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Classification of a single probed route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// 2xx or 3xx response
    Ok,
    /// 4xx or 5xx response
    Failed { code: u16 },
    /// Connection failed; the live service may simply not be running
    Unreachable,
}

/// Outcome for one probed route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    pub path: String,
    pub method: ProbeMethod,
    pub status: RouteStatus,
}

/// Result of probing the critical live routes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointOutcome {
    pub routes: Vec<RouteResult>,
    /// No route returned an unexpected status. All routes unreachable is
    /// inconclusive, not failing.
    pub success: bool,
}

impl EndpointOutcome {
    pub fn from_routes(routes: Vec<RouteResult>) -> Self {
        let success = !routes
            .iter()
            .any(|r| matches!(r.status, RouteStatus::Failed { .. }));
        Self { routes, success }
    }

    pub fn reachable_count(&self) -> usize {
        self.routes
            .iter()
            .filter(|r| r.status != RouteStatus::Unreachable)
            .count()
    }
}

/// Weights and thresholds for the merge decision.
///
/// The defaults are the tuning constants the pipeline shipped with; they
/// sum to 1.0 when every signal succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Credit when the test suite succeeds (default 0.40)
    pub tests: f64,
    /// Credit when lint succeeds (default 0.25)
    pub lint: f64,
    /// Penalty when lint has unresolved issues (default 0.10)
    pub lint_penalty: f64,
    /// Credit when endpoint probes succeed (default 0.25)
    pub endpoints: f64,
    /// Penalty when a probed route failed (default 0.15)
    pub endpoints_penalty: f64,
    /// Bonus when coverage exceeds `coverage_floor` (default 0.10)
    pub coverage_bonus: f64,
    /// Coverage fraction required for the bonus (default 0.70)
    pub coverage_floor: f64,
    /// Minimum confidence for an automatic merge (default 0.85)
    pub merge_threshold: f64,
    /// Minimum confidence to hand off for review (default 0.70)
    pub review_threshold: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            tests: 0.40,
            lint: 0.25,
            lint_penalty: 0.10,
            endpoints: 0.25,
            endpoints_penalty: 0.15,
            coverage_bonus: 0.10,
            coverage_floor: 0.70,
            merge_threshold: 0.85,
            review_threshold: 0.70,
        }
    }
}

/// Immutable record of one validation run.
///
/// Created once per run and appended to the result store exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Unique run identifier
    pub run_id: Uuid,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// Name of the ephemeral branch used by this run
    pub workspace: String,
    pub tests: TestOutcome,
    pub lint: LintOutcome,
    pub endpoints: EndpointOutcome,
    /// Coverage fraction carried up from the test outcome
    pub coverage: Option<f64>,
    pub decision: Decision,
    /// Heuristic confidence in 0.0..=1.0
    pub confidence: f64,
    /// Total wall-clock duration in seconds
    pub duration_secs: f64,
    /// Empty on success
    pub error_log: Vec<String>,
}

impl ValidationRecord {
    /// Record for a run that never reached the check phase
    pub fn aborted(
        run_id: Uuid,
        workspace: impl Into<String>,
        decision: Decision,
        errors: Vec<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            workspace: workspace.into(),
            tests: TestOutcome::default(),
            lint: LintOutcome::default(),
            endpoints: EndpointOutcome::default(),
            coverage: None,
            decision,
            confidence: 0.0,
            duration_secs,
            error_log: errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing() {
        let d: Decision = "MERGE".parse().unwrap();
        assert_eq!(d, Decision::Merge);
        assert_eq!(d.to_string(), "merge");
        assert!("ship-it".parse::<Decision>().is_err());
    }

    #[test]
    fn test_endpoint_outcome_failed_route() {
        let outcome = EndpointOutcome::from_routes(vec![
            RouteResult {
                path: "/health".to_string(),
                method: ProbeMethod::Get,
                status: RouteStatus::Ok,
            },
            RouteResult {
                path: "/insights".to_string(),
                method: ProbeMethod::Get,
                status: RouteStatus::Failed { code: 500 },
            },
        ]);
        assert!(!outcome.success);
        assert_eq!(outcome.reachable_count(), 2);
    }

    #[test]
    fn test_endpoint_outcome_unreachable_is_not_failure() {
        let outcome = EndpointOutcome::from_routes(vec![RouteResult {
            path: "/health".to_string(),
            method: ProbeMethod::Get,
            status: RouteStatus::Unreachable,
        }]);
        assert!(outcome.success);
        assert_eq!(outcome.reachable_count(), 0);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoringWeights::default();
        let max = w.tests + w.lint + w.endpoints + w.coverage_bonus;
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_patch_set_from_files() {
        let set = PatchSet::from_files(vec![PathBuf::from("/tmp/fix-timeout.diff")]);
        assert_eq!(set.patches.len(), 1);
        assert_eq!(set.patches[0].name, "fix-timeout.diff");
    }

    #[test]
    fn test_validation_record_roundtrip() {
        let record = ValidationRecord::aborted(
            Uuid::new_v4(),
            "sandbox-validate-x",
            Decision::Revert,
            vec!["patch failed".to_string()],
            1.25,
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: ValidationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, record.run_id);
        assert_eq!(back.decision, Decision::Revert);
        assert_eq!(back.error_log, record.error_log);
    }
}
