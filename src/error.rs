//! Crate-level errors.
//!
//! Only failures that stop a whole run end up here. Per-file problems are
//! logged and recorded in the run report instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::config::ConfigError;

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Errors that can occur while organizing or restoring a directory.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root directory is missing or not a directory.
    #[error("Invalid root directory {}: {source}", path.display())]
    InvalidRoot { path: PathBuf, source: io::Error },
    /// A category directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// A file could not be moved.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// The directory walk failed at the root.
    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    /// The run history could not be written.
    #[error("Failed to write history file {}: {source}", path.display())]
    HistoryWriteFailed { path: PathBuf, source: io::Error },
    /// The run history could not be read.
    #[error("Failed to read history file {}: {source}", path.display())]
    HistoryReadFailed { path: PathBuf, source: io::Error },
    /// The run history is not valid JSON of the expected shape.
    #[error("Invalid history file format: {reason}")]
    InvalidHistoryFormat { reason: String },
    /// There is no previous run to undo.
    #[error("No previous organization found to undo in {}", .0.display())]
    NothingToUndo(PathBuf),
    /// The worker pool could not be started.
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    /// Reading the directory from the interactive prompt failed.
    #[error("Failed to read input: {0}")]
    Prompt(io::Error),
}
