//! The update cycle.
//!
//! Manifest: every exact pin is looked up, accepted bumps are staged into one
//! candidate, and the candidate is validated once as a batch before it is
//! written. Workflows: every `*.yml` file in each configured directory is
//! handled on its own and written as soon as it changes. Pre-commit: the
//! repository's own hooks are autoupdated.

use crate::apply::{self, ApplyOutcome};
use crate::config::Config;
use crate::error::{PinError, Result};
use crate::io;
use crate::mutate::{CandidateDocument, PinChange};
use crate::oracle::VersionSource;
use crate::paths;
use crate::pin::{normalize_tag, scan_actions, scan_dependencies};
use crate::precommit::{self, PreCommitOutcome};
use crate::validate::{AcceptAll, Validator};
use crate::version::is_downgrade;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The registry lookup failed or returned nothing.
    Unavailable,
    /// The registry's latest sorts below the pin and downgrades are off.
    Downgrade { latest: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPin {
    pub name: String,
    pub current: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub path: PathBuf,
    pub outcome: Option<ApplyOutcome>,
    pub skipped: Vec<SkippedPin>,
    /// Set when the manifest existed but could not be read or written.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowFileReport {
    pub path: PathBuf,
    pub outcome: Option<ApplyOutcome>,
    pub skipped: Vec<SkippedPin>,
    /// Set when the file could not be read or written.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDirReport {
    pub dir: PathBuf,
    pub found: bool,
    pub files: Vec<WorkflowFileReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub manifest: ManifestReport,
    pub workflows: Vec<WorkflowDirReport>,
    pub pre_commit: PreCommitOutcome,
}

/// Handed to the `run_with` callback as each surface starts or finishes.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'r> {
    /// Lookups and validation for the manifest are about to run.
    ManifestStarted(&'r Path),
    Manifest(&'r ManifestReport),
    WorkflowDir(&'r WorkflowDirReport),
    PreCommit(&'r PreCommitOutcome),
}

impl UpdateSummary {
    /// True when any surface was written.
    pub fn any_updates(&self) -> bool {
        self.manifest
            .outcome
            .as_ref()
            .is_some_and(ApplyOutcome::is_committed)
            || self.workflow_files().any(|f| {
                f.outcome
                    .as_ref()
                    .is_some_and(ApplyOutcome::is_committed)
            })
            || self.pre_commit.is_updated()
    }

    /// Changes a dry run would have attempted.
    pub fn pending_changes(&self) -> usize {
        let manifest = match &self.manifest.outcome {
            Some(ApplyOutcome::DryRun { changes }) => changes.len(),
            _ => 0,
        };
        let workflows: usize = self
            .workflow_files()
            .filter_map(|f| match &f.outcome {
                Some(ApplyOutcome::DryRun { changes }) => Some(changes.len()),
                _ => None,
            })
            .sum();
        manifest + workflows
    }

    /// One line per surface that did not go through cleanly: a rejected or
    /// unwritable manifest, an unwritable workflow file, a failed autoupdate.
    pub fn failures(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(ApplyOutcome::Rejected { .. }) = self.manifest.outcome {
            out.push(format!(
                "{}: validation failed",
                self.manifest.path.display()
            ));
        }
        if let Some(err) = &self.manifest.error {
            out.push(format!("{}: {err}", self.manifest.path.display()));
        }
        for file in self.workflow_files() {
            if let Some(err) = &file.error {
                out.push(format!("{}: {err}", file.path.display()));
            }
        }
        if let PreCommitOutcome::Skipped { reason } = &self.pre_commit {
            out.push(format!("pre-commit autoupdate: {reason}"));
        }
        out
    }

    fn workflow_files(&self) -> impl Iterator<Item = &WorkflowFileReport> {
        self.workflows.iter().flat_map(|d| d.files.iter())
    }
}

// ---------------------------------------------------------------------------
// Updater
// ---------------------------------------------------------------------------

pub struct Updater<'a> {
    root: &'a Path,
    config: &'a Config,
    source: &'a dyn VersionSource,
    manifest_validator: &'a dyn Validator,
    dry_run: bool,
    /// Action lookups are shared across workflow files within one run.
    action_cache: RefCell<HashMap<(String, String), Option<String>>>,
}

impl<'a> Updater<'a> {
    pub fn new(
        root: &'a Path,
        config: &'a Config,
        source: &'a dyn VersionSource,
        manifest_validator: &'a dyn Validator,
    ) -> Self {
        Self {
            root,
            config,
            source,
            manifest_validator,
            dry_run: false,
            action_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The only fatal condition: the manifest must exist before anything runs.
    pub fn ensure_manifest(&self) -> Result<PathBuf> {
        let path = self.config.manifest_path(self.root);
        if !path.is_file() {
            return Err(PinError::ManifestNotFound(path));
        }
        Ok(path)
    }

    /// Run every surface in order.
    pub fn run(&self) -> Result<UpdateSummary> {
        self.run_with(|_| {})
    }

    /// Run every surface in order, calling `on_progress` as each one starts
    /// or finishes. Only a missing manifest is returned as an error.
    pub fn run_with(&self, mut on_progress: impl FnMut(Progress<'_>)) -> Result<UpdateSummary> {
        let path = self.ensure_manifest()?;
        on_progress(Progress::ManifestStarted(&path));
        let manifest = self.update_manifest()?;
        on_progress(Progress::Manifest(&manifest));

        let mut workflows = Vec::new();
        for dir in self.config.workflow_paths(self.root) {
            let report = self.update_workflow_dir(&dir);
            on_progress(Progress::WorkflowDir(&report));
            workflows.push(report);
        }

        let pre_commit = self.update_pre_commit();
        on_progress(Progress::PreCommit(&pre_commit));

        Ok(UpdateSummary {
            manifest,
            workflows,
            pre_commit,
        })
    }

    // -----------------------------------------------------------------------
    // Manifest
    // -----------------------------------------------------------------------

    /// Errors past `ensure_manifest` (unreadable text, a failed write) are
    /// recorded on the report instead of returned.
    pub fn update_manifest(&self) -> Result<ManifestReport> {
        let path = self.ensure_manifest()?;
        let mut skipped = Vec::new();
        let report = match self.apply_manifest(&path, &mut skipped) {
            Ok(outcome) => ManifestReport {
                path,
                outcome: Some(outcome),
                skipped,
                error: None,
            },
            Err(e) => {
                tracing::warn!("failed to update {}: {e}", path.display());
                ManifestReport {
                    path,
                    outcome: None,
                    skipped,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(report)
    }

    fn apply_manifest(&self, path: &Path, skipped: &mut Vec<SkippedPin>) -> Result<ApplyOutcome> {
        let text = std::fs::read_to_string(path)?;
        let mut document = CandidateDocument::new(text.as_str());
        let mut lookups: HashMap<String, Option<String>> = HashMap::new();

        for pin in scan_dependencies(&text) {
            if !pin.is_updatable() {
                continue;
            }
            let latest = lookups
                .entry(pin.package.clone())
                .or_insert_with(|| self.source.latest_package_version(&pin.package))
                .clone();
            let Some(latest) = latest else {
                skipped.push(SkippedPin {
                    name: pin.package.clone(),
                    current: pin.version.clone(),
                    reason: SkipReason::Unavailable,
                });
                continue;
            };
            if latest == pin.version {
                continue;
            }
            if let Some(reason) = self.refuse_downgrade(&pin.package, &pin.version, &latest) {
                skipped.push(SkippedPin {
                    name: pin.package.clone(),
                    current: pin.version.clone(),
                    reason,
                });
                continue;
            }
            tracing::info!("{}: {} -> {}", pin.package, pin.version, latest);
            document.replace(
                pin.version_span.clone(),
                &latest,
                PinChange {
                    name: pin.package.clone(),
                    from: pin.version.clone(),
                    to: latest.clone(),
                },
            );
        }

        apply::commit_or_discard(path, &document, self.manifest_validator, self.dry_run)
    }

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// A missing directory or an unreadable listing yields an empty report;
    /// a failure on one file is recorded and the next file is tried.
    pub fn update_workflow_dir(&self, dir: &Path) -> WorkflowDirReport {
        if !dir.is_dir() {
            tracing::warn!("{} not found", paths::display_relative(self.root, dir));
            return WorkflowDirReport {
                dir: dir.to_path_buf(),
                found: false,
                files: Vec::new(),
            };
        }

        let files = match io::files_with_extension(dir, paths::WORKFLOW_EXTENSION) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("cannot list {}: {e}", dir.display());
                Vec::new()
            }
        };

        let reports = files
            .into_iter()
            .map(|path| {
                let mut skipped = Vec::new();
                match self.update_workflow_file(&path, &mut skipped) {
                    Ok(outcome) => WorkflowFileReport {
                        path,
                        outcome: Some(outcome),
                        skipped,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!("failed to update {}: {e}", path.display());
                        WorkflowFileReport {
                            path,
                            outcome: None,
                            skipped,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        WorkflowDirReport {
            dir: dir.to_path_buf(),
            found: true,
            files: reports,
        }
    }

    fn update_workflow_file(
        &self,
        path: &Path,
        skipped: &mut Vec<SkippedPin>,
    ) -> Result<ApplyOutcome> {
        let text = std::fs::read_to_string(path)?;
        let mut document = CandidateDocument::new(text.as_str());

        for pin in scan_actions(&text) {
            if !pin.looks_like_version_tag() {
                continue;
            }
            let Some(latest) = self.latest_action(&pin.owner, &pin.repo) else {
                skipped.push(SkippedPin {
                    name: pin.slug(),
                    current: pin.git_ref.clone(),
                    reason: SkipReason::Unavailable,
                });
                continue;
            };
            let latest = normalize_tag(&pin.git_ref, &latest);
            if latest == pin.git_ref {
                continue;
            }
            if let Some(reason) = self.refuse_downgrade(&pin.slug(), &pin.git_ref, &latest) {
                skipped.push(SkippedPin {
                    name: pin.slug(),
                    current: pin.git_ref.clone(),
                    reason,
                });
                continue;
            }
            tracing::info!("{}: {} -> {}", pin.slug(), pin.git_ref, latest);
            document.replace(
                pin.ref_span.clone(),
                &latest,
                PinChange {
                    name: pin.slug(),
                    from: pin.git_ref.clone(),
                    to: latest.clone(),
                },
            );
        }

        apply::commit_or_discard(path, &document, &AcceptAll, self.dry_run)
    }

    fn latest_action(&self, owner: &str, repo: &str) -> Option<String> {
        let key = (owner.to_string(), repo.to_string());
        if let Some(hit) = self.action_cache.borrow().get(&key) {
            return hit.clone();
        }
        let latest = self.source.latest_action_version(owner, repo);
        self.action_cache.borrow_mut().insert(key, latest.clone());
        latest
    }

    // -----------------------------------------------------------------------
    // Pre-commit
    // -----------------------------------------------------------------------

    pub fn update_pre_commit(&self) -> PreCommitOutcome {
        precommit::autoupdate(self.root, &self.config.pre_commit, self.dry_run)
    }

    fn refuse_downgrade(&self, name: &str, current: &str, latest: &str) -> Option<SkipReason> {
        if !is_downgrade(current, latest) {
            return None;
        }
        tracing::warn!("{name}: registry latest {latest} sorts below pinned {current}");
        if self.config.allow_downgrades {
            None
        } else {
            Some(SkipReason::Downgrade {
                latest: latest.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
