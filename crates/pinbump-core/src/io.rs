use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A crash mid-write leaves the previous content in place.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Recursively copy `src` into `dst`, skipping any entry whose file name is
/// listed in `exclude`. Symlinks are followed.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[String]) -> Result<()> {
    ensure_dir(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if exclude.iter().any(|e| name.to_str() == Some(e.as_str())) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        if std::fs::metadata(&from)?.is_dir() {
            copy_tree(&from, &to, exclude)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

/// List the regular files directly inside `dir` with the given extension,
/// sorted by path so runs are deterministic.
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pyproject.toml");
        atomic_write(&path, b"[project]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[project]");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/ci.yml");
        atomic_write(&path, b"on: push").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ci.yml");
        std::fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn copy_tree_skips_excluded_names() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("{{cookiecutter.repo_name}}/src")).unwrap();
        std::fs::write(
            src.path().join("{{cookiecutter.repo_name}}/src/main.py"),
            "print()",
        )
        .unwrap();
        std::fs::write(src.path().join("cookiecutter.json"), "{}").unwrap();
        std::fs::create_dir_all(src.path().join(".git/objects")).unwrap();
        std::fs::write(src.path().join(".git/HEAD"), "ref").unwrap();

        let dst = TempDir::new().unwrap();
        let target = dst.path().join("copy");
        copy_tree(src.path(), &target, &[".git".to_string()]).unwrap();

        assert!(target.join("cookiecutter.json").exists());
        assert!(target
            .join("{{cookiecutter.repo_name}}/src/main.py")
            .exists());
        assert!(!target.join(".git").exists());
    }

    #[test]
    fn files_with_extension_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("release.yml"), "").unwrap();
        std::fs::write(dir.path().join("ci.yml"), "").unwrap();
        std::fs::write(dir.path().join("notes.yaml"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.yml")).unwrap();

        let files = files_with_extension(dir.path(), "yml").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["ci.yml", "release.yml"]);
    }
}
