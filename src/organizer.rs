/// Filesystem side of sorting: moving files into category folders, removing
/// directories left empty, and recording what moved so a run can be undone.
///
/// Moves never overwrite. A destination name is reserved atomically with
/// `create_new` before the rename, and taken names get a ` (n)` suffix, so two
/// workers sending same-named files to the same folder both keep their file.
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::{OrganizeError, OrganizeResult};
use crate::router::FileTask;

/// File inside the output folder that records the last run.
pub const HISTORY_FILE_NAME: &str = ".precision_sort_history.json";

/// Upper bound on ` (n)` suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// A single successful move, kept for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub category: String,
}

/// Every move of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of the run.
    pub timestamp: String,
    pub root: PathBuf,
    pub operations: Vec<Operation>,
}

impl OperationLog {
    pub fn new(root: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            root,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    fn history_file_path(output_root: &Path) -> PathBuf {
        output_root.join(HISTORY_FILE_NAME)
    }

    /// Writes the log as JSON into `output_root`.
    pub fn save(&self, output_root: &Path) -> OrganizeResult<()> {
        let path = Self::history_file_path(output_root);
        let write_error = |source| OrganizeError::HistoryWriteFailed {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(&path, json).map_err(write_error)
    }

    /// Reads the log from `output_root`, if there is one.
    pub fn load(output_root: &Path) -> OrganizeResult<Option<Self>> {
        let path = Self::history_file_path(output_root);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(OrganizeError::HistoryReadFailed { path, source }),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| OrganizeError::InvalidHistoryFormat {
                reason: format!("JSON parse error: {}", e),
            })
    }

    /// Removes the history file; a missing file is not an error.
    pub fn delete(output_root: &Path) -> OrganizeResult<()> {
        let path = Self::history_file_path(output_root);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OrganizeError::HistoryWriteFailed { path, source }),
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub source: PathBuf,
    /// Where the file ended up, or where it was headed when the move failed.
    pub destination: PathBuf,
    pub category: String,
    pub error: Option<String>,
}

impl MoveOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The history record for a successful move.
    pub fn to_operation(&self) -> Option<Operation> {
        self.is_success().then(|| Operation {
            original_path: self.source.clone(),
            new_path: self.destination.clone(),
            category: self.category.clone(),
        })
    }
}

/// Moves files of one root into `<root>/<output_dir>/<category>/`.
#[derive(Debug, Clone)]
pub struct FileOrganizer {
    root: PathBuf,
    output_root: PathBuf,
}

impl FileOrganizer {
    pub fn new(root: impl Into<PathBuf>, output_dir_name: &str) -> Self {
        let root = root.into();
        let output_root = root.join(output_dir_name);
        Self { root, output_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<output_dir>`.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.output_root.join(category)
    }

    /// Creates `dir` and any missing parents. Succeeds when the directory
    /// already exists, including when another worker created it concurrently.
    pub fn ensure_dir(dir: &Path) -> OrganizeResult<()> {
        fs::create_dir_all(dir).map_err(|source| OrganizeError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })
    }

    /// Moves the task's file into its category folder. Failures are logged and
    /// reported in the outcome; the file then stays where it was.
    pub fn move_file(&self, task: &FileTask, category: &str) -> MoveOutcome {
        let category_dir = self.category_dir(category);
        let intended = category_dir.join(task.path().file_name().unwrap_or_default());

        match self.try_move(task.path(), &category_dir) {
            Ok(destination) => {
                info!("Moved {} to {} folder.", task.file_name(), category);
                MoveOutcome {
                    source: task.path().to_path_buf(),
                    destination,
                    category: category.to_string(),
                    error: None,
                }
            }
            Err(e) => {
                error!("Error moving {}: {}", task.file_name(), e);
                MoveOutcome {
                    source: task.path().to_path_buf(),
                    destination: intended,
                    category: category.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn try_move(&self, file_path: &Path, category_dir: &Path) -> OrganizeResult<PathBuf> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| OrganizeError::FileMoveFailure {
                from: file_path.to_path_buf(),
                to: category_dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "file has no name component"),
            })?;

        Self::ensure_dir(category_dir)?;

        let destination = reserve_destination(category_dir, Path::new(file_name)).map_err(
            |source| OrganizeError::FileMoveFailure {
                from: file_path.to_path_buf(),
                to: category_dir.join(file_name),
                source,
            },
        )?;

        if let Err(source) = relocate(file_path, &destination) {
            // Drop the empty reservation; the original is untouched.
            let _ = fs::remove_file(&destination);
            return Err(OrganizeError::FileMoveFailure {
                from: file_path.to_path_buf(),
                to: destination,
                source,
            });
        }

        Ok(destination)
    }

    /// Removes every empty directory under the root, deepest first, output
    /// folder included. The root itself is left alone. After a run that moved
    /// anything the history file keeps the output folder in place.
    pub fn cleanup_empty_dirs(&self) -> Vec<PathBuf> {
        remove_empty_dirs(&self.root, false)
    }
}

/// `report.txt` → `report (2).txt`, `.env` → `.env (2)`.
fn numbered_name(file_name: &Path, n: usize) -> PathBuf {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.extension() {
        Some(ext) => PathBuf::from(format!("{} ({}).{}", stem, n, ext.to_string_lossy())),
        None => PathBuf::from(format!("{} ({})", stem, n)),
    }
}

/// Claims a free name in `dir` by creating an empty placeholder file.
///
/// `create_new` fails if the name exists, so only one caller can win a given
/// name even under concurrency.
pub fn reserve_destination(dir: &Path, file_name: &Path) -> io::Result<PathBuf> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            dir.join(file_name)
        } else {
            dir.join(numbered_name(file_name, attempt))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free name for {} after {} attempts",
            file_name.display(),
            MAX_NAME_ATTEMPTS
        ),
    ))
}

/// Renames `from` onto `to`, falling back to copy and delete across devices.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                // Keep exactly one copy: the original.
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Removes empty directories below `start`, deepest first, and returns the
/// ones removed.
///
/// `start` itself is removed only when `include_start` is set. `remove_dir` refuses non-empty
/// directories, so a directory that gains a file concurrently is skipped.
pub fn remove_empty_dirs(start: &Path, include_start: bool) -> Vec<PathBuf> {
    let mut dirs: Vec<(usize, PathBuf)> = WalkDir::new(start)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry during cleanup: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| include_start || entry.depth() > 0)
        .map(|entry| (entry.depth(), entry.into_path()))
        .collect();

    dirs.sort_by(|(a, _), (b, _)| b.cmp(a));

    let mut removed = Vec::new();
    for (_, dir) in dirs {
        match fs::remove_dir(&dir) {
            Ok(()) => {
                info!("Removed empty folder: {}", dir.display());
                removed.push(dir);
            }
            Err(e)
                if e.kind() == io::ErrorKind::DirectoryNotEmpty
                    || e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove folder {}: {}", dir.display(), e),
        }
    }
    removed
}
