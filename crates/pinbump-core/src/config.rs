use crate::error::Result;
use crate::paths;
use crate::version::TagStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_pypi_url")]
    pub pypi_url: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    /// Per-request timeout for registry lookups.
    #[serde(default = "default_lookup_timeout")]
    pub timeout_seconds: u64,
    /// How to pick a tag when an action has no published release.
    #[serde(default)]
    pub tag_strategy: TagStrategy,
}

fn default_pypi_url() -> String {
    "https://pypi.org".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_lookup_timeout() -> u64 {
    5
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pypi_url: default_pypi_url(),
            github_api_url: default_github_api_url(),
            timeout_seconds: default_lookup_timeout(),
            tag_strategy: TagStrategy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Renderer invocation. The template path, `--no-input`,
    /// `--output-dir=<dir>` and the answers are appended.
    #[serde(default = "default_render_command")]
    pub render_command: Vec<String>,
    /// Resolver invocation, run inside the rendered project.
    #[serde(default = "default_resolve_command")]
    pub resolve_command: Vec<String>,
    /// Fixed answers for every template question that matters.
    #[serde(default = "default_answers")]
    pub answers: BTreeMap<String, String>,
    /// Directory name the renderer produces. When absent after rendering,
    /// the single directory in the output is used instead.
    #[serde(default = "default_project_dir")]
    pub project_dir: String,
    /// Wall-clock bound for each subprocess step. `0` disables the bound.
    #[serde(default = "default_validation_timeout")]
    pub timeout_seconds: u64,
    /// Entries skipped when copying the template into the scratch directory.
    #[serde(default = "default_copy_exclude")]
    pub copy_exclude: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_render_command() -> Vec<String> {
    vec!["uv".into(), "run".into(), "cookiecutter".into()]
}

fn default_resolve_command() -> Vec<String> {
    vec!["uv".into(), "lock".into()]
}

fn default_answers() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("project_slug".to_string(), default_project_dir());
    m.insert("ml_framework".to_string(), "pytorch".to_string());
    m
}

fn default_project_dir() -> String {
    "validation_proj".to_string()
}

fn default_validation_timeout() -> u64 {
    600
}

fn default_copy_exclude() -> Vec<String> {
    [".git", "target", ".venv", "node_modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            render_command: default_render_command(),
            resolve_command: default_resolve_command(),
            answers: default_answers(),
            project_dir: default_project_dir(),
            timeout_seconds: default_validation_timeout(),
            copy_exclude: default_copy_exclude(),
        }
    }
}

// ---------------------------------------------------------------------------
// PreCommitConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCommitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_pre_commit_timeout")]
    pub timeout_seconds: u64,
}

fn default_pre_commit_timeout() -> u64 {
    300
}

impl Default for PreCommitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: default_pre_commit_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    #[serde(default = "default_workflow_dirs")]
    pub workflow_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pre_commit: PreCommitConfig,
    /// When false, a "latest" version that sorts below the pinned one is
    /// refused instead of written.
    #[serde(default = "default_true")]
    pub allow_downgrades: bool,
}

fn default_manifest() -> PathBuf {
    PathBuf::from(paths::MANIFEST_FILE)
}

fn default_workflow_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from(paths::TEMPLATE_WORKFLOWS_DIR),
        PathBuf::from(paths::ROOT_WORKFLOWS_DIR),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            workflow_dirs: default_workflow_dirs(),
            registry: RegistryConfig::default(),
            validation: ValidationConfig::default(),
            pre_commit: PreCommitConfig::default(),
            allow_downgrades: true,
        }
    }
}

impl Config {
    /// Load `pinbump.yaml` from the template root, or defaults when the file
    /// does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.manifest)
    }

    pub fn workflow_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.workflow_dirs
            .iter()
            .map(|d| paths::resolve(root, d))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // The validator injects the candidate at this path inside a copy of
        // the template, so it must live under the root.
        if !paths::stays_within(&self.manifest) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "manifest '{}' must be relative to the template root and stay inside it",
                    self.manifest.display()
                ),
            });
        }

        let mut seen = Vec::new();
        for dir in &self.workflow_dirs {
            if seen.contains(&dir) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "workflow_dirs lists '{}' more than once; files will be checked twice",
                        dir.display()
                    ),
                });
            }
            seen.push(dir);
        }

        if self.registry.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "registry.timeout_seconds must be greater than 0".to_string(),
            });
        }

        let v = &self.validation;
        if v.enabled {
            if v.render_command.iter().all(|s| s.trim().is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "validation.render_command is empty".to_string(),
                });
            }
            if v.resolve_command.iter().all(|s| s.trim().is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "validation.resolve_command is empty".to_string(),
                });
            }
            if v.timeout_seconds == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "validation.timeout_seconds is 0: a hung renderer or resolver \
                              will block the run"
                        .to_string(),
                });
            }
            if !v.answers.contains_key("project_slug") {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "validation.answers has no project_slug; the rendered directory \
                              name will come from the template default"
                        .to_string(),
                });
            }
        } else {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "validation is disabled: manifest updates are written without a \
                          resolve check"
                    .to_string(),
            });
        }

        if self.pre_commit.enabled && self.pre_commit.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "pre_commit.timeout_seconds is 0: autoupdate runs unbounded".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
