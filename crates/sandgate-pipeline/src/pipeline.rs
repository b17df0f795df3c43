//! Pipeline orchestration: workspace, checks, decision, history
//!
//! One orchestrator instance is constructed per process and injected with
//! everything it needs; there is no ambient global state. Each call to
//! `run_validation` owns exactly one ephemeral workspace from creation to
//! its terminal state.

use async_trait::async_trait;
use sandgate_checks::{EndpointProbe, LintRunner, TestRunner};
use sandgate_core::fail_open::{fail_open, fail_open_with_retries};
use sandgate_core::{
    Decision, EndpointOutcome, LintOutcome, PatchSet, Result, SandgateConfig, SandgateError,
    TestOutcome, ValidationRecord,
};
use sandgate_decision::DecisionEngine;
use sandgate_store::ResultStore;
use sandgate_vcs::{GitCommand, GitExecutor, IsolationManager, WorkspaceHandle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

const STORE_RETRIES: usize = 3;

/// The concurrent check phase of a validation run.
///
/// Behind a trait so the orchestrator's fault handling can be exercised
/// without real tooling in the workspace.
#[async_trait]
pub trait CheckPhase: Send + Sync {
    async fn run(
        &self,
        config: &SandgateConfig,
        workspace: &Path,
    ) -> Result<(TestOutcome, LintOutcome, EndpointOutcome)>;
}

/// Default check phase: tests, lint, and endpoint probes as concurrent
/// tasks, joined before scoring.
///
/// Check failures are already folded into the outcomes by the runners;
/// only a panicking task surfaces as an error here.
pub struct CheckSuite;

#[async_trait]
impl CheckPhase for CheckSuite {
    async fn run(
        &self,
        config: &SandgateConfig,
        workspace: &Path,
    ) -> Result<(TestOutcome, LintOutcome, EndpointOutcome)> {
        let test_runner = TestRunner::detect(&config.checks, workspace);
        let lint_runner = LintRunner::detect(&config.checks, workspace);
        let probe = EndpointProbe::from_config(&config.probe);
        let routes = config.probe.routes.clone();
        let workspace = workspace.to_path_buf();

        let tests_task = tokio::spawn({
            let workspace = workspace.clone();
            async move { test_runner.run(&workspace).await }
        });
        let lint_task = tokio::spawn({
            let workspace = workspace.clone();
            async move { lint_runner.run(&workspace).await }
        });
        let probe_task = tokio::spawn(async move { probe.run(&routes).await });

        let (tests, lint, endpoints) = tokio::join!(tests_task, lint_task, probe_task);

        Ok((
            tests.map_err(|e| SandgateError::Pipeline(format!("test check task: {}", e)))?,
            lint.map_err(|e| SandgateError::Pipeline(format!("lint check task: {}", e)))?,
            endpoints.map_err(|e| SandgateError::Pipeline(format!("probe task: {}", e)))?,
        ))
    }
}

/// Sequences isolation, checks, decision, and history for validation runs.
///
/// The sole observable contract is the returned `ValidationRecord`; any
/// internal fault is folded into it rather than surfaced to the caller.
pub struct PipelineOrchestrator<E: GitExecutor> {
    repo_root: PathBuf,
    config: SandgateConfig,
    isolation: IsolationManager<E>,
    engine: DecisionEngine,
    store: ResultStore,
    checks: Box<dyn CheckPhase>,
}

impl PipelineOrchestrator<GitCommand> {
    /// Create an orchestrator over the real git repository at `repo_root`
    pub fn new(repo_root: impl Into<PathBuf>, config: SandgateConfig) -> Self {
        let repo_root = repo_root.into();
        let executor = GitCommand::new(&repo_root);
        Self::with_executor(repo_root, config, executor)
    }
}

impl<E: GitExecutor + 'static> PipelineOrchestrator<E> {
    /// Create an orchestrator with a custom executor (mockable in tests)
    pub fn with_executor(
        repo_root: impl Into<PathBuf>,
        config: SandgateConfig,
        executor: E,
    ) -> Self {
        let repo_root = repo_root.into();
        let isolation = IsolationManager::new(executor, &config.trunk, &config.remote);
        let engine = DecisionEngine::new(config.weights.clone());
        let store = ResultStore::new(repo_root.join(&config.store_path));
        Self {
            repo_root,
            config,
            isolation,
            engine,
            store,
            checks: Box::new(CheckSuite),
        }
    }

    /// Substitute the check phase
    pub fn with_check_phase(mut self, checks: Box<dyn CheckPhase>) -> Self {
        self.checks = checks;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run the full validation pipeline for one patch set.
    ///
    /// Sequence: create workspace, apply patches, fan out the three checks,
    /// score, execute the decision, persist the record. Isolation and patch
    /// failures abort to a revert record; anything unexpected in the check
    /// phase becomes a review record with the fault in the error log.
    pub async fn run_validation(&mut self, patch_set: PatchSet) -> Result<ValidationRecord> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        info!("Validation run {} starting", run_id);

        // 1. Isolate
        let handle = match self.isolation.create_workspace().await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Run {} aborted, no workspace: {}", run_id, e);
                let record = ValidationRecord::aborted(
                    run_id,
                    "",
                    Decision::Revert,
                    vec![e.to_string()],
                    start.elapsed().as_secs_f64(),
                );
                self.persist(&record).await;
                return Ok(record);
            }
        };

        // 2. Apply the patch set
        if let Err(e) = self.isolation.apply_patches(&handle, &patch_set).await {
            error!("Run {} aborted, patches did not apply: {}", run_id, e);
            self.discard(&handle).await;
            let record = ValidationRecord::aborted(
                run_id,
                &handle.branch,
                Decision::Revert,
                vec![e.to_string()],
                start.elapsed().as_secs_f64(),
            );
            self.persist(&record).await;
            return Ok(record);
        }

        // Push the applied patches so a review decision has a reachable
        // branch; local checks do not depend on this succeeding.
        let message = format!("sandbox: apply patch set {} for validation", patch_set.id);
        fail_open("workspace_push", || {
            self.isolation.commit_and_push(&handle, &message)
        })
        .await;

        // 3. The check barrier: all three signals land before scoring
        let (tests, lint, endpoints) =
            match self.checks.run(&self.config, &self.repo_root).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    // Unexpected fault: flag for human attention, never merge
                    error!("Run {} check phase fault: {}", run_id, e);
                    let mut record = ValidationRecord::aborted(
                        run_id,
                        &handle.branch,
                        Decision::Review,
                        vec![e.to_string()],
                        start.elapsed().as_secs_f64(),
                    );
                    if self
                        .isolation
                        .execute_decision(&handle, Decision::Review)
                        .await
                        .is_err()
                    {
                        record.error_log.push("review handoff failed".to_string());
                    }
                    self.persist(&record).await;
                    return Ok(record);
                }
            };

        // 4. Score and decide
        let coverage = tests.coverage;
        let (decision, confidence) = self.engine.decide(&tests, &lint, &endpoints, coverage);

        // 5. Execute the decision; a merge that can no longer fast-forward
        // is downgraded to review, never forced
        let mut error_log = Vec::new();
        let decision = match self.isolation.execute_decision(&handle, decision).await {
            Ok(()) => decision,
            Err(SandgateError::MergeConflict(detail)) => {
                warn!("Run {} merge downgraded to review: {}", run_id, detail);
                error_log.push(format!("merge no longer fast-forward: {}", detail));
                if let Err(e) = self
                    .isolation
                    .execute_decision(&handle, Decision::Review)
                    .await
                {
                    error_log.push(format!("review handoff failed: {}", e));
                }
                Decision::Review
            }
            Err(e) => {
                warn!("Run {} decision execution failed: {}", run_id, e);
                error_log.push(format!("decision execution failed: {}", e));
                decision
            }
        };

        let record = ValidationRecord {
            run_id,
            timestamp: chrono::Utc::now(),
            workspace: handle.branch.clone(),
            tests,
            lint,
            endpoints,
            coverage,
            decision,
            confidence,
            duration_secs: start.elapsed().as_secs_f64(),
            error_log,
        };

        // 6. Persist exactly once, fail-open
        self.persist(&record).await;

        info!(
            "Validation run {} finished: {} (confidence {:.2}, {:.1}s)",
            run_id, record.decision, record.confidence, record.duration_secs
        );

        Ok(record)
    }

    /// Revert a workspace without failing the caller
    async fn discard(&mut self, handle: &WorkspaceHandle) {
        let branch = handle.branch.clone();
        if self
            .isolation
            .execute_decision(handle, Decision::Revert)
            .await
            .is_err()
        {
            warn!("Workspace {} cleanup failed, may need manual removal", branch);
        }
    }

    /// Persist a record with retries; history must never fail a run
    async fn persist(&self, record: &ValidationRecord) {
        fail_open_with_retries(
            "result_store_append",
            || self.store.append(record),
            STORE_RETRIES,
        )
        .await;
    }

    /// Revert every workspace this orchestrator still owns.
    ///
    /// Called on cancellation so an aborted run cannot leak an isolated
    /// workspace that already had patches applied.
    pub async fn cleanup_abandoned(&mut self) -> usize {
        let active = self.isolation.active_workspaces();
        let mut cleaned = 0;

        for branch in active {
            let handle = WorkspaceHandle {
                branch: branch.clone(),
                created_at: chrono::Utc::now(),
            };
            if self
                .isolation
                .execute_decision(&handle, Decision::Revert)
                .await
                .is_ok()
            {
                cleaned += 1;
            } else {
                warn!("Could not clean up workspace {}", branch);
            }
        }

        cleaned
    }

    /// Workspace accounting: (created, reached a terminal state)
    pub fn workspace_counts(&self) -> (usize, usize) {
        (
            self.isolation.created_count(),
            self.isolation.terminal_count(),
        )
    }
}
