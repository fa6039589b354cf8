use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// A file handed to the tree builder does not live under its project root.
    #[error("File {} is not within project root {}", file.display(), root.display())]
    FileOutsideRoot { file: PathBuf, root: PathBuf },

    #[error("Invalid test pattern: {0}")]
    InvalidPattern(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Runner error: {0}")]
    Runner(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Test load failed: {0}")]
    Load(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TestTreeError>;
