//! Candidate validation.
//!
//! `TemplateValidator` proves a manifest rewrite resolves: it copies the
//! template into a scratch directory, injects the candidate manifest into the
//! copy, renders the copy non-interactively, and runs the resolver inside the
//! rendered project. The real manifest is never written, and the scratch
//! directory is removed when the call returns, whatever the outcome.

use crate::config::ValidationConfig;
use crate::error::{PinError, Result};
use crate::io;
use crate::paths;
use crate::process::{self, CommandOutput};
use serde::Serialize;
use std::path::{Path, PathBuf};

const TEMPLATE_COPY_DIR: &str = "template";
const RENDER_OUTPUT_DIR: &str = "rendered";

// ---------------------------------------------------------------------------
// Verdict / Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    /// Captured stderr (or the error) when the candidate was rejected.
    pub diagnostics: Option<String>,
}

impl ValidationVerdict {
    pub fn passed() -> Self {
        Self {
            passed: true,
            diagnostics: None,
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostics: Some(diagnostics.into()),
        }
    }
}

/// Gate between a staged candidate and the file it would replace.
pub trait Validator {
    fn validate(&self, candidate: &str) -> ValidationVerdict;

    /// Short label for progress output.
    fn name(&self) -> &'static str;
}

/// Approves everything. Used for surfaces with no resolve check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _candidate: &str) -> ValidationVerdict {
        ValidationVerdict::passed()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

// ---------------------------------------------------------------------------
// TemplateValidator
// ---------------------------------------------------------------------------

pub struct TemplateValidator {
    template_root: PathBuf,
    manifest: PathBuf,
    settings: ValidationConfig,
}

impl TemplateValidator {
    /// `manifest` is relative to `template_root`.
    pub fn new(template_root: &Path, manifest: &Path, settings: ValidationConfig) -> Self {
        Self {
            template_root: template_root.to_path_buf(),
            manifest: manifest.to_path_buf(),
            settings,
        }
    }

    fn render_argv(&self, template: &Path, output_dir: &Path) -> Vec<String> {
        let mut argv = self.settings.render_command.clone();
        argv.push(template.display().to_string());
        argv.push("--no-input".to_string());
        argv.push(format!("--output-dir={}", output_dir.display()));
        argv.extend(self.settings.answers.iter().map(|(k, v)| format!("{k}={v}")));
        argv
    }

    fn try_validate(&self, candidate: &str) -> Result<ValidationVerdict> {
        // Joined onto the scratch copy below; anything else would land on
        // the real filesystem.
        if !paths::stays_within(&self.manifest) {
            return Err(PinError::ManifestOutsideRoot(self.manifest.clone()));
        }
        let scratch = tempfile::Builder::new()
            .prefix("pinbump-validate-")
            .tempdir()?;
        let timeout = process::timeout_from_secs(self.settings.timeout_seconds);

        let template_copy = scratch.path().join(TEMPLATE_COPY_DIR);
        io::copy_tree(
            &self.template_root,
            &template_copy,
            &self.settings.copy_exclude,
        )?;
        io::atomic_write(&template_copy.join(&self.manifest), candidate.as_bytes())?;

        let output_dir = scratch.path().join(RENDER_OUTPUT_DIR);
        io::ensure_dir(&output_dir)?;

        // cwd stays at the real root so `uv run` finds the tool environment.
        let render = process::run_captured(
            &self.render_argv(&template_copy, &output_dir),
            &self.template_root,
            timeout,
        )?;
        if !render.success() {
            return Ok(ValidationVerdict::failed(format!(
                "template rendering failed ({}): {}",
                exit_label(&render),
                render.diagnostics()
            )));
        }

        let project = locate_project(&output_dir, &self.settings.project_dir)?;
        let resolve = process::run_captured(&self.settings.resolve_command, &project, timeout)?;
        if resolve.success() {
            Ok(ValidationVerdict::passed())
        } else {
            Ok(ValidationVerdict::failed(format!(
                "resolver rejected the candidate ({}): {}",
                exit_label(&resolve),
                resolve.diagnostics()
            )))
        }
    }
}

impl Validator for TemplateValidator {
    fn validate(&self, candidate: &str) -> ValidationVerdict {
        match self.try_validate(candidate) {
            Ok(verdict) => {
                if let Some(diag) = &verdict.diagnostics {
                    tracing::warn!("validation failed: {diag}");
                }
                verdict
            }
            Err(e) => {
                tracing::warn!("validation crashed: {e}");
                ValidationVerdict::failed(format!("validation crashed: {e}"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "template render + resolve"
    }
}

fn exit_label(output: &CommandOutput) -> String {
    match output.code {
        Some(code) => format!("exit {code}"),
        None => "killed by signal".to_string(),
    }
}

/// The expected project directory, or the only directory the renderer
/// produced when the template names it differently.
fn locate_project(output_dir: &Path, expected: &str) -> Result<PathBuf> {
    let preferred = output_dir.join(expected);
    if preferred.is_dir() {
        return Ok(preferred);
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        _ => Err(PinError::RenderedProjectNotFound(output_dir.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = "{{cookiecutter.repo_name}}/pyproject.toml";

    /// A template root with a manifest and a stand-in renderer script that
    /// copies the manifest into `<output-dir>/<project_slug>/`.
    fn template_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join(MANIFEST);
        std::fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        std::fs::write(&manifest, "deps = [\"requests==2.28.0\"]\n").unwrap();
        std::fs::write(dir.path().join("cookiecutter.json"), "{}").unwrap();
        dir
    }

    const RENDER_SCRIPT: &str = r#"
template="$1"; shift
for arg in "$@"; do
  case "$arg" in
    --output-dir=*) out="${arg#--output-dir=}" ;;
    project_slug=*) slug="${arg#project_slug=}" ;;
  esac
done
mkdir -p "$out/$slug"
cp "$template/{{cookiecutter.repo_name}}/pyproject.toml" "$out/$slug/pyproject.toml"
"#;

    fn settings(resolve: &str) -> ValidationConfig {
        ValidationConfig {
            render_command: vec!["sh".into(), "-c".into(), RENDER_SCRIPT.into(), "render".into()],
            resolve_command: vec!["sh".into(), "-c".into(), resolve.into()],
            timeout_seconds: 10,
            ..ValidationConfig::default()
        }
    }

    #[test]
    fn accept_all_always_passes() {
        assert!(AcceptAll.validate("anything").passed);
        assert_eq!(AcceptAll.name(), "none");
    }

    #[test]
    fn render_argv_appends_template_output_and_answers() {
        let v = TemplateValidator::new(
            Path::new("/tpl"),
            Path::new(MANIFEST),
            ValidationConfig::default(),
        );
        let argv = v.render_argv(Path::new("/scratch/template"), Path::new("/scratch/out"));
        assert_eq!(
            argv,
            vec![
                "uv",
                "run",
                "cookiecutter",
                "/scratch/template",
                "--no-input",
                "--output-dir=/scratch/out",
                "ml_framework=pytorch",
                "project_slug=validation_proj",
            ]
        );
    }

    #[test]
    fn locate_project_prefers_expected_name() {
        let out = TempDir::new().unwrap();
        std::fs::create_dir(out.path().join("validation_proj")).unwrap();
        std::fs::create_dir(out.path().join("other")).unwrap();
        assert_eq!(
            locate_project(out.path(), "validation_proj").unwrap(),
            out.path().join("validation_proj")
        );
    }

    #[test]
    fn locate_project_falls_back_to_single_dir() {
        let out = TempDir::new().unwrap();
        std::fs::create_dir(out.path().join("my-repo")).unwrap();
        assert_eq!(
            locate_project(out.path(), "validation_proj").unwrap(),
            out.path().join("my-repo")
        );
    }

    #[test]
    fn locate_project_empty_output_is_error() {
        let out = TempDir::new().unwrap();
        assert!(matches!(
            locate_project(out.path(), "validation_proj"),
            Err(PinError::RenderedProjectNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn resolver_sees_candidate_not_disk_content() {
        let root = template_fixture();
        let v = TemplateValidator::new(
            root.path(),
            Path::new(MANIFEST),
            settings("grep -q 'requests==2.31.0' pyproject.toml"),
        );
        let verdict = v.validate("deps = [\"requests==2.31.0\"]\n");
        assert!(verdict.passed, "{verdict:?}");

        // The real manifest was never touched.
        assert_eq!(
            std::fs::read_to_string(root.path().join(MANIFEST)).unwrap(),
            "deps = [\"requests==2.28.0\"]\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn absolute_manifest_is_never_written() {
        let root = template_fixture();
        let real = root.path().join(MANIFEST);
        let v = TemplateValidator::new(
            root.path(),
            &real,
            settings("echo 'No solution found' >&2; exit 1"),
        );
        let verdict = v.validate("deps = [\"requests==99.0.0\"]\n");
        assert!(!verdict.passed);
        let diag = verdict.diagnostics.unwrap();
        assert!(diag.contains("escapes the template root"), "{diag}");
        assert_eq!(
            std::fs::read_to_string(&real).unwrap(),
            "deps = [\"requests==2.28.0\"]\n"
        );
    }

    #[test]
    fn parent_relative_manifest_is_refused() {
        let root = template_fixture();
        let v = TemplateValidator::new(
            root.path(),
            Path::new("../pyproject.toml"),
            settings("true"),
        );
        let verdict = v.validate("deps = []\n");
        assert!(!verdict.passed);
        assert!(!root.path().parent().unwrap().join("pyproject.toml").exists());
    }

    #[cfg(unix)]
    #[test]
    fn resolver_failure_carries_stderr() {
        let root = template_fixture();
        let v = TemplateValidator::new(
            root.path(),
            Path::new(MANIFEST),
            settings("echo 'No solution found' >&2; exit 1"),
        );
        let verdict = v.validate("deps = [\"requests==99.0.0\"]\n");
        assert!(!verdict.passed);
        let diag = verdict.diagnostics.unwrap();
        assert!(diag.contains("No solution found"), "{diag}");
        assert!(diag.contains("exit 1"), "{diag}");
        assert_eq!(
            std::fs::read_to_string(root.path().join(MANIFEST)).unwrap(),
            "deps = [\"requests==2.28.0\"]\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn render_failure_is_a_failed_verdict() {
        let root = template_fixture();
        let mut cfg = settings("true");
        cfg.render_command = vec!["sh".into(), "-c".into(), "echo 'bad template' >&2; exit 2".into()];
        let v = TemplateValidator::new(root.path(), Path::new(MANIFEST), cfg);
        let verdict = v.validate("x");
        assert!(!verdict.passed);
        assert!(verdict.diagnostics.unwrap().contains("template rendering failed"));
    }

    #[test]
    fn missing_renderer_is_a_failed_verdict() {
        let root = template_fixture();
        let mut cfg = ValidationConfig::default();
        cfg.render_command = vec!["pinbump-no-such-renderer".into()];
        let v = TemplateValidator::new(root.path(), Path::new(MANIFEST), cfg);
        let verdict = v.validate("x");
        assert!(!verdict.passed);
        assert!(verdict.diagnostics.unwrap().contains("validation crashed"));
    }

    #[cfg(unix)]
    #[test]
    fn hung_resolver_is_killed() {
        let root = template_fixture();
        let mut cfg = settings("sleep 5");
        cfg.timeout_seconds = 1;
        let v = TemplateValidator::new(root.path(), Path::new(MANIFEST), cfg);
        let verdict = v.validate("deps = []\n");
        assert!(!verdict.passed);
        assert!(verdict.diagnostics.unwrap().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn scratch_directory_is_removed() {
        let root = template_fixture();
        let marker = TempDir::new().unwrap();
        let record = marker.path().join("cwd.txt");
        let v = TemplateValidator::new(
            root.path(),
            Path::new(MANIFEST),
            settings(&format!("pwd > '{}'", record.display())),
        );
        assert!(v.validate("deps = []\n").passed);

        let project = std::fs::read_to_string(&record).unwrap();
        let project = PathBuf::from(project.trim());
        assert!(project.ends_with("validation_proj"));
        assert!(!project.exists());
    }
}
