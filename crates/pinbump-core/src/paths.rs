use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory constants (relative to the template root)
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "pinbump.yaml";
pub const COOKIECUTTER_FILE: &str = "cookiecutter.json";

pub const MANIFEST_FILE: &str = "{{cookiecutter.repo_name}}/pyproject.toml";
pub const TEMPLATE_WORKFLOWS_DIR: &str = "{{cookiecutter.repo_name}}/.github/workflows";
pub const ROOT_WORKFLOWS_DIR: &str = ".github/workflows";
pub const PRE_COMMIT_CONFIG: &str = ".pre-commit-config.yaml";

pub const WORKFLOW_EXTENSION: &str = "yml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn pre_commit_config_path(root: &Path) -> PathBuf {
    root.join(PRE_COMMIT_CONFIG)
}

/// Resolve a configured path against the template root. Absolute paths pass
/// through unchanged.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

/// True when `configured` is relative and cannot climb out of the directory
/// it is joined to.
pub fn stays_within(configured: &Path) -> bool {
    use std::path::Component;
    configured
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Render `path` relative to `root` when possible, for progress output.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/tpl");
        assert_eq!(config_path(root), PathBuf::from("/tmp/tpl/pinbump.yaml"));
        assert_eq!(
            resolve(root, Path::new(MANIFEST_FILE)),
            PathBuf::from("/tmp/tpl/{{cookiecutter.repo_name}}/pyproject.toml")
        );
        assert_eq!(
            pre_commit_config_path(root),
            PathBuf::from("/tmp/tpl/.pre-commit-config.yaml")
        );
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/tmp/tpl");
        assert_eq!(
            resolve(root, Path::new("/etc/pyproject.toml")),
            PathBuf::from("/etc/pyproject.toml")
        );
    }

    #[test]
    fn stays_within_rejects_escapes() {
        assert!(stays_within(Path::new(MANIFEST_FILE)));
        assert!(stays_within(Path::new("./pkg/pyproject.toml")));
        assert!(!stays_within(Path::new("/etc/pyproject.toml")));
        assert!(!stays_within(Path::new("../other/pyproject.toml")));
        assert!(!stays_within(Path::new("pkg/../../pyproject.toml")));
    }

    #[test]
    fn display_relative_strips_root() {
        let root = Path::new("/tmp/tpl");
        let path = root.join(".github/workflows/ci.yml");
        assert_eq!(display_relative(root, &path), ".github/workflows/ci.yml");
        assert_eq!(
            display_relative(root, Path::new("/elsewhere/x.yml")),
            "/elsewhere/x.yml"
        );
    }
}
