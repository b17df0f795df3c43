//! Configuration management for Sandgate
//!
//! This module provides configuration structures for repository-level
//! pipeline settings: trunk and remote names, check commands and timeouts,
//! probe routes, the result store path, and the scoring weights.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{ProbeMethod, ScoringWeights};
use crate::Result;

/// Repository-level Sandgate configuration
///
/// Loaded from `.sandgate/config.toml` in the repo root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandgateConfig {
    /// Canonical branch that validated changes integrate into
    #[serde(default = "default_trunk")]
    pub trunk: String,

    /// Remote that ephemeral branches are pushed to
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Append-only run history, relative to the repo root
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Check commands and timeouts
    #[serde(default)]
    pub checks: CheckConfig,

    /// Live endpoint probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Scoring weights and decision thresholds
    #[serde(default)]
    pub weights: ScoringWeights,
}

/// Commands and timeouts for the test and lint stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Test command; auto-detected from the workspace when empty
    #[serde(default)]
    pub test_command: Vec<String>,

    /// Lint commands run in fix mode, then a formatter in apply mode;
    /// auto-detected from the workspace when empty
    #[serde(default)]
    pub lint_commands: Vec<Vec<String>>,

    /// Test suite timeout in seconds
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,

    /// Per-tool lint timeout in seconds
    #[serde(default = "default_lint_timeout")]
    pub lint_timeout_secs: u64,
}

/// Live endpoint probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Base URL of the service under test
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Critical routes to probe
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteSpec>,

    /// Per-route timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub route_timeout_secs: u64,
}

/// One route to probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub path: String,
    pub method: ProbeMethod,
}

/// Supported project languages for check auto-detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
}

// Default value providers
fn default_trunk() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_store_path() -> String {
    ".sandgate/history.jsonl".to_string()
}

fn default_test_timeout() -> u64 {
    60
}

fn default_lint_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_routes() -> Vec<RouteSpec> {
    vec![
        RouteSpec {
            path: "/health".to_string(),
            method: ProbeMethod::Get,
        },
        RouteSpec {
            path: "/insights/pending".to_string(),
            method: ProbeMethod::Get,
        },
    ]
}

impl SandgateConfig {
    /// Load configuration from `.sandgate/config.toml` or use defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".sandgate/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content).map_err(|e| {
                crate::SandgateError::Config(format!("Failed to parse config file: {}", e))
            })?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.sandgate/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(".sandgate");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| crate::SandgateError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Detect the primary programming language of a workspace
    pub fn detect_language(workspace: &Path) -> Option<Language> {
        if workspace.join("Cargo.toml").exists() {
            Some(Language::Rust)
        } else if workspace.join("pyproject.toml").exists()
            || workspace.join("pytest.ini").exists()
        {
            Some(Language::Python)
        } else if workspace.join("package.json").exists() {
            Some(Language::JavaScript)
        } else {
            None
        }
    }

    /// Default test command for a language
    pub fn default_test_command(lang: Language) -> Vec<String> {
        let cmd: &[&str] = match lang {
            Language::Rust => &["cargo", "test"],
            Language::Python => &["python", "-m", "pytest", "-v", "--tb=short"],
            Language::JavaScript => &["npm", "test"],
        };
        cmd.iter().map(|s| s.to_string()).collect()
    }

    /// Default lint commands for a language: fixers first, formatter last
    pub fn default_lint_commands(lang: Language) -> Vec<Vec<String>> {
        let cmds: &[&[&str]] = match lang {
            Language::Rust => &[
                &["cargo", "clippy", "--fix", "--allow-dirty", "--allow-staged"],
                &["cargo", "fmt"],
            ],
            Language::Python => &[
                &["ruff", "check", "--select=E,F,W", ".", "--fix"],
                &["black", "."],
            ],
            Language::JavaScript => &[&["npx", "eslint", ".", "--fix"]],
        };
        cmds.iter()
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .collect()
    }
}

impl Default for SandgateConfig {
    fn default() -> Self {
        Self {
            trunk: default_trunk(),
            remote: default_remote(),
            store_path: default_store_path(),
            checks: CheckConfig::default(),
            probe: ProbeConfig::default(),
            weights: ScoringWeights::default(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            test_command: Vec::new(),
            lint_commands: Vec::new(),
            test_timeout_secs: default_test_timeout(),
            lint_timeout_secs: default_lint_timeout(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            routes: default_routes(),
            route_timeout_secs: default_probe_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SandgateConfig::default();
        assert_eq!(config.trunk, "main");
        assert_eq!(config.checks.test_timeout_secs, 60);
        assert_eq!(config.probe.route_timeout_secs, 5);
        assert_eq!(config.probe.routes.len(), 2);
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        SandgateConfig::write_default(dir.path()).unwrap();

        let loaded = SandgateConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.remote, "origin");
        assert!((loaded.weights.merge_threshold - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let loaded = SandgateConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.store_path, ".sandgate/history.jsonl");
    }

    #[test]
    fn test_language_detection() {
        let dir = tempdir().unwrap();
        assert_eq!(SandgateConfig::detect_language(dir.path()), None);

        std::fs::write(dir.path().join("pyproject.toml"), "[tool]").unwrap();
        assert_eq!(
            SandgateConfig::detect_language(dir.path()),
            Some(Language::Python)
        );
    }
}
