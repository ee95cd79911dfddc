use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("manifest path escapes the template root: {0}")]
    ManifestOutsideRoot(PathBuf),

    #[error("command is empty: configure a program to run")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("'{program}' timed out after {seconds}s")]
    CommandTimedOut { program: String, seconds: u64 },

    #[error("rendered project not found in {0}")]
    RenderedProjectNotFound(PathBuf),

    #[error("overlapping edits at byte {0}")]
    OverlappingEdits(usize),

    #[error("unexpected response from {url}: {reason}")]
    BadResponse { url: String, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PinError>;
