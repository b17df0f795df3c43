//! Ephemeral workspace isolation
//!
//! A workspace is an ephemeral branch cut from the synced trunk tip. It is
//! owned exclusively by the validation run that created it until the run
//! terminates by merge, revert, or review handoff. Nothing touches trunk
//! until an explicit fast-forward merge.

use chrono::{DateTime, Utc};
use sandgate_core::{Decision, PatchSet, Result, SandgateError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::command::GitExecutor;

/// Short collision-resistant suffix for workspace names
fn unique_suffix(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(&digest[..3])
}

/// Handle to an ephemeral workspace (branch)
#[derive(Debug, Clone)]
pub struct WorkspaceHandle {
    /// Branch name, unique per run
    pub branch: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    /// Owned by a running validation
    Active,
    /// Fast-forwarded into trunk
    Merged,
    /// Discarded without touching trunk
    Reverted,
    /// Left intact for human review
    HandedOff,
}

impl WorkspaceState {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Active
    }
}

/// Creates ephemeral workspaces, applies patch sets, and executes the
/// pipeline's terminal decision against trunk.
pub struct IsolationManager<E: GitExecutor> {
    executor: E,
    trunk: String,
    remote: String,
    workspaces: HashMap<String, WorkspaceState>,
}

impl<E: GitExecutor> IsolationManager<E> {
    pub fn new(executor: E, trunk: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            executor,
            trunk: trunk.into(),
            remote: remote.into(),
            workspaces: HashMap::new(),
        }
    }

    /// Branch an ephemeral workspace from the latest trunk state.
    ///
    /// Fatal for the run if trunk cannot be synced.
    pub async fn create_workspace(&mut self) -> Result<WorkspaceHandle> {
        let created_at = Utc::now();
        let stamp = created_at.format("%Y%m%d%H%M%S").to_string();
        let seed = format!("{}-{}", stamp, uuid::Uuid::new_v4());
        let branch = format!("sandbox-validate-{}-{}", stamp, unique_suffix(&seed));

        let checkout = self.executor.exec(&["checkout", &self.trunk]).await?;
        if !checkout.success {
            return Err(SandgateError::Isolation(format!(
                "Cannot check out trunk '{}': {}",
                self.trunk, checkout.stderr
            )));
        }

        let pull = self
            .executor
            .exec(&["pull", &self.remote, &self.trunk])
            .await?;
        if !pull.success {
            return Err(SandgateError::Isolation(format!(
                "Cannot sync trunk from {}: {}",
                self.remote, pull.stderr
            )));
        }

        let create = self.executor.exec(&["checkout", "-b", &branch]).await?;
        if !create.success {
            return Err(SandgateError::Isolation(format!(
                "Cannot create branch {}: {}",
                branch, create.stderr
            )));
        }

        info!("Created ephemeral workspace {}", branch);
        self.workspaces.insert(branch.clone(), WorkspaceState::Active);

        Ok(WorkspaceHandle { branch, created_at })
    }

    /// Apply each patch in order; stops at the first failure.
    ///
    /// No partial-apply rollback is attempted. On failure the workspace is
    /// simply discarded later by `execute_decision(Revert, ..)`.
    pub async fn apply_patches(&self, handle: &WorkspaceHandle, patch_set: &PatchSet) -> Result<()> {
        for patch in &patch_set.patches {
            let path = patch.path.to_str().ok_or_else(|| {
                SandgateError::PatchApply {
                    patch: patch.name.clone(),
                    detail: "patch path contains non-UTF-8 characters".to_string(),
                }
            })?;

            let output = self.executor.exec(&["apply", path]).await?;
            if !output.success {
                return Err(SandgateError::PatchApply {
                    patch: patch.name.clone(),
                    detail: output.stderr.trim().to_string(),
                });
            }
            debug!("Applied patch {} in {}", patch.name, handle.branch);
        }
        Ok(())
    }

    /// Commit the applied patches and push the workspace branch so a later
    /// review decision has something reachable to hand off.
    pub async fn commit_and_push(&self, handle: &WorkspaceHandle, message: &str) -> Result<()> {
        let add = self.executor.exec(&["add", "-A"]).await?;
        if !add.success {
            return Err(SandgateError::GitCommand(add.stderr));
        }

        let commit = self.executor.exec(&["commit", "-m", message]).await?;
        if !commit.success {
            return Err(SandgateError::GitCommand(commit.stderr));
        }

        let push = self
            .executor
            .exec(&["push", "-u", &self.remote, &handle.branch])
            .await?;
        if !push.success {
            return Err(SandgateError::GitCommand(push.stderr));
        }

        debug!("Committed and pushed {}", handle.branch);
        Ok(())
    }

    /// Execute the pipeline's terminal decision for a workspace.
    ///
    /// - `Merge`: fast-forward-only merge into trunk, then push. Fails with
    ///   `MergeConflict` if trunk advanced past a fast-forward point; trunk
    ///   history is never rewritten or force-pushed.
    /// - `Revert`: discard the branch entirely; trunk is untouched.
    /// - `Review`: leave the branch intact and pushed for a human.
    pub async fn execute_decision(
        &mut self,
        handle: &WorkspaceHandle,
        decision: Decision,
    ) -> Result<()> {
        match decision {
            Decision::Merge => self.merge(handle).await,
            Decision::Revert => self.revert(handle).await,
            Decision::Review => self.hand_off(handle).await,
        }
    }

    async fn merge(&mut self, handle: &WorkspaceHandle) -> Result<()> {
        let checkout = self.executor.exec(&["checkout", &self.trunk]).await?;
        if !checkout.success {
            return Err(SandgateError::GitCommand(checkout.stderr));
        }

        let merge = self
            .executor
            .exec(&["merge", "--ff-only", &handle.branch])
            .await?;
        if !merge.success {
            return Err(SandgateError::MergeConflict(merge.stderr.trim().to_string()));
        }

        let push = self
            .executor
            .exec(&["push", &self.remote, &self.trunk])
            .await?;
        if !push.success {
            return Err(SandgateError::GitCommand(push.stderr));
        }

        info!("Merged {} into {}", handle.branch, self.trunk);
        self.workspaces
            .insert(handle.branch.clone(), WorkspaceState::Merged);
        Ok(())
    }

    async fn revert(&mut self, handle: &WorkspaceHandle) -> Result<()> {
        let checkout = self.executor.exec(&["checkout", &self.trunk]).await?;
        if !checkout.success {
            return Err(SandgateError::GitCommand(checkout.stderr));
        }

        let delete = self
            .executor
            .exec(&["branch", "-D", &handle.branch])
            .await?;
        if !delete.success {
            warn!("Branch delete warning: {}", delete.stderr);
        }

        // The branch may never have been pushed; ignore remote delete failure
        let remote_ref = format!(":{}", handle.branch);
        if let Ok(out) = self.executor.exec(&["push", &self.remote, &remote_ref]).await {
            if !out.success {
                debug!("Remote branch delete skipped: {}", out.stderr);
            }
        }

        info!("Reverted workspace {} (trunk untouched)", handle.branch);
        self.workspaces
            .insert(handle.branch.clone(), WorkspaceState::Reverted);
        Ok(())
    }

    async fn hand_off(&mut self, handle: &WorkspaceHandle) -> Result<()> {
        // The local branch survives either way, so a failed push does not
        // lose the workspace; it just stays local.
        let push = self
            .executor
            .exec(&["push", "-u", &self.remote, &handle.branch])
            .await?;
        if !push.success {
            warn!(
                "Review branch {} not pushed ({}), left local",
                handle.branch,
                push.stderr.trim()
            );
        } else {
            info!("Workspace {} handed off for review", handle.branch);
        }

        self.workspaces
            .insert(handle.branch.clone(), WorkspaceState::HandedOff);
        Ok(())
    }

    /// State of a tracked workspace
    pub fn workspace_state(&self, branch: &str) -> Option<WorkspaceState> {
        self.workspaces.get(branch).copied()
    }

    /// Workspaces still owned by a run
    pub fn active_workspaces(&self) -> Vec<String> {
        self.workspaces
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(b, _)| b.clone())
            .collect()
    }

    /// Total workspaces created by this manager
    pub fn created_count(&self) -> usize {
        self.workspaces.len()
    }

    /// Workspaces that reached a terminal state
    pub fn terminal_count(&self) -> usize {
        self.workspaces.values().filter(|s| s.is_terminal()).count()
    }
}
