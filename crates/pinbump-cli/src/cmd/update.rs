use crate::output::{format_rows, print_json};
use anyhow::Context;
use pinbump_core::apply::ApplyOutcome;
use pinbump_core::config::{Config, WarnLevel};
use pinbump_core::mutate::PinChange;
use pinbump_core::oracle::HttpOracle;
use pinbump_core::paths;
use pinbump_core::precommit::PreCommitOutcome;
use pinbump_core::update::{
    ManifestReport, Progress, SkipReason, SkippedPin, UpdateSummary, Updater, WorkflowDirReport,
};
use pinbump_core::validate::{AcceptAll, TemplateValidator, Validator};
use std::path::Path;

/// `pinbump update`: one full cycle over the manifest, every workflow
/// directory and the pre-commit hooks.
///
/// An invalid config or a missing manifest is fatal. Everything else is
/// reported per item as each surface finishes and the command still exits 0.
pub fn run(
    root: &Path,
    github_token: Option<String>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load pinbump.yaml")?;
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid pinbump.yaml: {}", errors.join("; "));
    }
    let oracle =
        HttpOracle::new(&config.registry, github_token).context("failed to build HTTP client")?;
    if !oracle.has_token() {
        tracing::info!("no GitHub token; action lookups are unauthenticated");
    }

    let validator: Box<dyn Validator> = if config.validation.enabled {
        Box::new(TemplateValidator::new(
            root,
            &config.manifest,
            config.validation.clone(),
        ))
    } else {
        tracing::warn!("manifest validation is disabled in pinbump.yaml");
        Box::new(AcceptAll)
    };

    let summary = Updater::new(root, &config, &oracle, validator.as_ref())
        .dry_run(dry_run)
        .run_with(|step| {
            if !json {
                print_progress(root, step);
            }
        })?;

    if json {
        return print_json(&summary);
    }
    print_result(&summary, dry_run);
    Ok(())
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

fn print_progress(root: &Path, step: Progress<'_>) {
    match step {
        Progress::ManifestStarted(path) => println!(
            "Checking Python dependencies in {}...",
            paths::display_relative(root, path)
        ),
        Progress::Manifest(report) => print_manifest(root, report),
        Progress::WorkflowDir(report) => print_workflow_dir(root, report),
        Progress::PreCommit(outcome) => print_pre_commit(outcome),
    }
}

fn print_manifest(root: &Path, report: &ManifestReport) {
    print_skipped("  ", &report.skipped);

    if let Some(err) = &report.error {
        println!("  [!] Failed: {err}");
        return;
    }
    match &report.outcome {
        Some(ApplyOutcome::Unchanged) | None => println!("  No Python updates found."),
        Some(ApplyOutcome::DryRun { changes }) => {
            print_changes("  ", changes);
            println!("  (dry run) validation and write skipped.");
        }
        Some(ApplyOutcome::Committed { changes }) => {
            print_changes("  ", changes);
            println!("  [OK] Validation successful.");
            println!(
                "Wrote validated changes to {}.",
                paths::display_relative(root, &report.path)
            );
        }
        Some(ApplyOutcome::Rejected {
            changes,
            diagnostics,
        }) => {
            print_changes("  ", changes);
            println!("  [!] Validation FAILED:\n{diagnostics}");
            println!("  [!] Skipping updates due to validation failure.");
        }
    }
}

fn print_workflow_dir(root: &Path, report: &WorkflowDirReport) {
    let dir = paths::display_relative(root, &report.dir);
    if !report.found {
        println!("Warning: {dir} not found.");
        return;
    }
    println!("Checking GitHub Actions in {dir}/*.{}...", paths::WORKFLOW_EXTENSION);

    for file in &report.files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.display().to_string());
        println!("  Scanning {name}...");
        print_skipped("    ", &file.skipped);

        if let Some(err) = &file.error {
            println!("    [!] Failed: {err}");
            continue;
        }
        match &file.outcome {
            Some(ApplyOutcome::Committed { changes }) => {
                print_changes("    -> ", changes);
                println!("  Wrote changes to {name}.");
            }
            Some(ApplyOutcome::DryRun { changes }) => {
                print_changes("    -> ", changes);
                println!("  (dry run) {name} not written.");
            }
            // Workflows are never gated, so a rejection cannot happen here.
            Some(ApplyOutcome::Rejected { .. }) | Some(ApplyOutcome::Unchanged) | None => {}
        }
    }
}

fn print_pre_commit(outcome: &PreCommitOutcome) {
    match outcome {
        PreCommitOutcome::NotConfigured => {}
        PreCommitOutcome::Disabled => println!("Pre-commit autoupdate disabled."),
        PreCommitOutcome::DryRun => println!("(dry run) pre-commit autoupdate skipped."),
        PreCommitOutcome::Updated => println!("Updated root pre-commit hooks."),
        PreCommitOutcome::Unchanged => println!("Pre-commit hooks already up to date."),
        PreCommitOutcome::Skipped { reason } => {
            println!("  [!] Failed to run pre-commit autoupdate: {reason}")
        }
    }
}

fn print_result(summary: &UpdateSummary, dry_run: bool) {
    println!();
    if summary.any_updates() {
        println!("Updates completed successfully.");
    } else if dry_run && summary.pending_changes() > 0 {
        println!(
            "Dry run: {} change(s) would be attempted.",
            summary.pending_changes()
        );
    } else {
        println!("No updates found.");
    }

    let failures = summary.failures();
    if !failures.is_empty() {
        eprintln!("warning: {} item(s) did not update:", failures.len());
        for f in &failures {
            eprintln!("  {f}");
        }
    }
}

fn print_changes(indent: &str, changes: &[PinChange]) {
    let rows: Vec<Vec<String>> = changes
        .iter()
        .map(|c| {
            vec![
                format!("{}:", c.name),
                c.from.clone(),
                "->".to_string(),
                c.to.clone(),
            ]
        })
        .collect();
    for line in format_rows(&rows) {
        println!("{indent}{line}");
    }
}

fn print_skipped(indent: &str, skipped: &[SkippedPin]) {
    for s in skipped {
        match &s.reason {
            SkipReason::Unavailable => {
                println!("{indent}[!] Skipped {}: no latest version available", s.name)
            }
            SkipReason::Downgrade { latest } => println!(
                "{indent}[!] Skipped {}: latest {latest} is older than {}",
                s.name, s.current
            ),
        }
    }
}
