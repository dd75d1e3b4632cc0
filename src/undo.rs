/// Reverting the most recent organize run.
///
/// The run history lives inside the output folder. Undo moves every recorded
/// file back to its original path, recreating parent folders that cleanup
/// removed, then drops the emptied output tree.
use crate::error::{OrganizeError, OrganizeResult};
use crate::organizer::{FileOrganizer, Operation, OperationLog, remove_empty_dirs};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of an undo.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back.
    pub restored_files: usize,
    /// Files that could not be moved back, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer at their recorded location.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Restores files moved by the last run.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent organization of `root`.
    ///
    /// A file found at an original location is backed up with a timestamp
    /// suffix before the restored file takes its place. The history is deleted
    /// only when every file was restored.
    ///
    /// # Errors
    ///
    /// Fails when the root is invalid, the history is missing, or the history
    /// cannot be parsed.
    ///
    /// ```no_run
    /// use precision_sort::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/path/to/directory"), "Sorted_Output") {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(root: &Path, output_dir: &str) -> OrganizeResult<UndoReport> {
        if let Err(source) = fs::metadata(root) {
            return Err(OrganizeError::InvalidRoot {
                path: root.to_path_buf(),
                source,
            });
        }

        let organizer = FileOrganizer::new(root, output_dir);
        let output_root = organizer.output_root();
        let log = OperationLog::load(output_root)?
            .ok_or_else(|| OrganizeError::NothingToUndo(root.to_path_buf()))?;

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore_file(operation) {
                Ok(()) => {
                    info!(
                        "Restored {} to {}",
                        operation.new_path.display(),
                        operation.original_path.display()
                    );
                    report.restored_files += 1;
                }
                Err(RestoreFailure::Missing(path, reason)) => {
                    warn!("Skipping {}: {}", path.display(), reason);
                    report.skipped_files.push((path, reason));
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    warn!("Could not restore {}: {}", path.display(), reason);
                    report.failed_restores.push((path, reason));
                }
            }
        }

        if report.is_complete_success() {
            if let Err(e) = OperationLog::delete(output_root) {
                warn!("Could not delete history file: {}", e);
            }
            remove_empty_dirs(output_root, true);
        }

        Ok(report)
    }

    fn restore_file(operation: &Operation) -> Result<(), RestoreFailure> {
        if !operation.new_path.exists() {
            return Err(RestoreFailure::Missing(
                operation.new_path.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if let Some(parent) = operation.original_path.parent() {
            FileOrganizer::ensure_dir(parent).map_err(|e| {
                RestoreFailure::Failed(operation.original_path.clone(), e.to_string())
            })?;
        }

        if operation.original_path.exists() {
            let backup_path = Self::generate_backup_path(&operation.original_path);
            fs::rename(&operation.original_path, &backup_path).map_err(|e| {
                RestoreFailure::Failed(
                    operation.original_path.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        fs::rename(&operation.new_path, &operation.original_path).map_err(|e| {
            RestoreFailure::Failed(
                operation.new_path.clone(),
                format!("Failed to restore file: {}", e),
            )
        })
    }

    /// `file.txt` → `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::FileTask;
    use tempfile::TempDir;

    fn organize_one(root: &Path, relative: &str, category: &str) -> Operation {
        let path = root.join(relative);
        let outcome = FileOrganizer::new(root, "Sorted_Output")
            .move_file(&FileTask::new(&path, root), category);
        outcome.to_operation().expect("move failed")
    }

    fn save(root: &Path, operations: Vec<Operation>) {
        let mut log = OperationLog::new(root.to_path_buf());
        for operation in operations {
            log.add_operation(operation);
        }
        log.save(&root.join("Sorted_Output"))
            .expect("Failed to save history");
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = UndoManager::undo(temp_dir.path(), "Sorted_Output");
        assert!(matches!(result, Err(OrganizeError::NothingToUndo(_))));
    }

    #[test]
    fn test_undo_restores_into_removed_parent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("inbox/deep")).unwrap();
        fs::write(root.join("inbox/deep/report.txt"), "Q3").unwrap();

        let operation = organize_one(root, "inbox/deep/report.txt", "Report");
        save(root, vec![operation]);
        fs::remove_dir_all(root.join("inbox")).unwrap();

        let report = UndoManager::undo(root, "Sorted_Output").expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert_eq!(fs::read_to_string(root.join("inbox/deep/report.txt")).unwrap(), "Q3");
        assert!(!root.join("Sorted_Output").exists());
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("test.txt"), "original content").unwrap();

        let operation = organize_one(root, "test.txt", "Note");
        save(root, vec![operation]);
        fs::write(root.join("test.txt"), "new content").unwrap();

        let report = UndoManager::undo(root, "Sorted_Output").expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert_eq!(fs::read_to_string(root.join("test.txt")).unwrap(), "original content");
        let backups = fs::read_dir(root)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_undo_with_missing_file_keeps_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        save(
            root,
            vec![Operation {
                original_path: root.join("gone.txt"),
                new_path: root.join("Sorted_Output/Note/gone.txt"),
                category: "Note".to_string(),
            }],
        );

        let report = UndoManager::undo(root, "Sorted_Output").expect("Undo failed");

        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.total_processed(), 1);
        assert!(OperationLog::load(&root.join("Sorted_Output")).unwrap().is_some());
    }

    #[test]
    fn test_undo_invalid_root() {
        let result = UndoManager::undo(Path::new("/non/existent/path"), "Sorted_Output");
        assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));
    }
}
