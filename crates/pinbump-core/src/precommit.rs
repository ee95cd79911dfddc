use crate::config::PreCommitConfig;
use crate::paths;
use crate::process;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreCommitOutcome {
    /// No `.pre-commit-config.yaml` at the root.
    NotConfigured,
    /// Turned off in `pinbump.yaml`.
    Disabled,
    /// Dry run: autoupdate would have been invoked.
    DryRun,
    /// Autoupdate ran and rewrote the config.
    Updated,
    /// Autoupdate ran and every hook was already current.
    Unchanged,
    /// The binary is missing or the command failed.
    Skipped { reason: String },
}

impl PreCommitOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, PreCommitOutcome::Updated)
    }
}

/// Run `pre-commit autoupdate` for the repository's own hook config.
pub fn autoupdate(root: &Path, settings: &PreCommitConfig, dry_run: bool) -> PreCommitOutcome {
    if !paths::pre_commit_config_path(root).exists() {
        return PreCommitOutcome::NotConfigured;
    }
    if !settings.enabled {
        return PreCommitOutcome::Disabled;
    }
    if dry_run {
        return PreCommitOutcome::DryRun;
    }
    let program = match which::which("pre-commit") {
        Ok(p) => p,
        Err(_) => {
            return PreCommitOutcome::Skipped {
                reason: "pre-commit is not installed".to_string(),
            }
        }
    };
    run_autoupdate(
        &[program.display().to_string()],
        root,
        settings.timeout_seconds,
    )
}

fn run_autoupdate(program: &[String], root: &Path, timeout_seconds: u64) -> PreCommitOutcome {
    let config = paths::pre_commit_config_path(root);
    let before = std::fs::read(&config).unwrap_or_default();

    let mut argv = program.to_vec();
    argv.push("autoupdate".to_string());
    let output = match process::run_captured(
        &argv,
        root,
        process::timeout_from_secs(timeout_seconds),
    ) {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!("pre-commit autoupdate failed: {e}");
            return PreCommitOutcome::Skipped {
                reason: e.to_string(),
            };
        }
    };
    if !output.success() {
        tracing::warn!("pre-commit autoupdate failed: {}", output.diagnostics());
        return PreCommitOutcome::Skipped {
            reason: output.diagnostics().to_string(),
        };
    }

    let after = std::fs::read(&config).unwrap_or_default();
    if after == before {
        PreCommitOutcome::Unchanged
    } else {
        PreCommitOutcome::Updated
    }
}
