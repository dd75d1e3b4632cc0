//! Concurrent organization of a whole tree.
//!
//! The walk runs on the calling thread and produces one [`FileTask`] per
//! regular file. The tasks then run on a rayon pool sized by the configured
//! worker count; each one routes its file and moves it. The call returns after
//! every task has finished and the empty-directory cleanup has run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classifier::Classifiers;
use crate::config::{CompiledFilters, SorterConfig};
use crate::error::{OrganizeError, OrganizeResult};
use crate::organizer::{FileOrganizer, MoveOutcome, OperationLog};
use crate::output::OutputFormatter;
use crate::router::{FileRouter, FileTask};

/// Cooperative cancellation shared between the caller and the workers.
///
/// Tasks check it before they start, so a file is either fully processed or
/// not touched at all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Summary of one organize run.
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub moved: Vec<MoveOutcome>,
    pub failed: Vec<MoveOutcome>,
    /// Files left untouched because the run was cancelled.
    pub skipped: usize,
    pub removed_dirs: Vec<PathBuf>,
}

impl OrganizeReport {
    /// Number of moved files per category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.moved {
            *counts.entry(outcome.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }
}

/// Where a file would go, as computed by a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub category: String,
    pub destination: PathBuf,
    /// MIME type sniffed from the file content, when recognizable.
    pub mime_type: Option<String>,
}

/// Walks a root, routes every file and moves it, in parallel.
pub struct Dispatcher {
    router: FileRouter,
    filters: CompiledFilters,
    output_dir: String,
    workers: usize,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(router: FileRouter, filters: CompiledFilters, output_dir: &str, workers: usize) -> Self {
        Self {
            router,
            filters,
            output_dir: output_dir.to_string(),
            workers: workers.max(1),
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Builds a dispatcher from configuration and the startup classifiers.
    pub fn from_config(config: &SorterConfig, classifiers: Option<Classifiers>) -> OrganizeResult<Self> {
        config.validate()?;
        let filters = config.filters.compile()?;
        let router = FileRouter::from_config(config, classifiers);
        Ok(Self::new(
            router,
            filters,
            &config.sorting.output_dir,
            config.sorting.resolved_workers(),
        ))
    }

    /// Shares a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn router(&self) -> &FileRouter {
        &self.router
    }

    /// Sorts every file under `root` into `<root>/<output_dir>/<category>/`,
    /// then removes directories left empty.
    ///
    /// # Errors
    ///
    /// Fails only for problems that affect the whole run: an invalid root or a
    /// worker pool that cannot start. Per-file failures are in the report.
    pub fn organize(&self, root: &Path) -> OrganizeResult<OrganizeReport> {
        let root = validate_root(root)?;
        let organizer = FileOrganizer::new(&root, &self.output_dir);
        let tasks = self.discover(&root, organizer.output_root())?;
        info!("Organizing {} files under {}", tasks.len(), root.display());

        let progress = self.progress_bar(tasks.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("sort-worker-{index}"))
            .build()?;

        let outcomes: Vec<Option<MoveOutcome>> = pool.install(|| {
            tasks
                .par_iter()
                .progress_with(progress.clone())
                .map(|task| self.process(task, &organizer))
                .collect()
        });
        progress.finish_and_clear();

        let mut report = OrganizeReport::default();
        for outcome in outcomes {
            match outcome {
                Some(outcome) if outcome.is_success() => report.moved.push(outcome),
                Some(outcome) => report.failed.push(outcome),
                None => report.skipped += 1,
            }
        }

        self.record_history(&root, &organizer, &report);
        report.removed_dirs = organizer.cleanup_empty_dirs();

        info!(
            moved = report.moved.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            removed_dirs = report.removed_dirs.len(),
            "Organization finished"
        );
        Ok(report)
    }

    /// Computes where every file would go without touching the filesystem.
    /// Classifiers are still consulted.
    pub fn plan(&self, root: &Path) -> OrganizeResult<Vec<PlannedMove>> {
        let root = validate_root(root)?;
        let organizer = FileOrganizer::new(&root, &self.output_dir);
        let tasks = self.discover(&root, organizer.output_root())?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("plan-worker-{index}"))
            .build()?;

        let progress = self.progress_bar(tasks.len());
        let mut planned: Vec<PlannedMove> = pool.install(|| {
            tasks
                .par_iter()
                .progress_with(progress.clone())
                .filter(|_| !self.cancel.is_cancelled())
                .map(|task| {
                    let category = self.router.route(task);
                    PlannedMove {
                        source: task.path().to_path_buf(),
                        destination: organizer.category_dir(&category).join(task.file_name()),
                        category,
                        mime_type: infer::get_from_path(task.path())
                            .ok()
                            .flatten()
                            .map(|kind| kind.mime_type().to_string()),
                    }
                })
                .collect()
        });
        progress.finish_and_clear();

        planned.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(planned)
    }

    fn process(&self, task: &FileTask, organizer: &FileOrganizer) -> Option<MoveOutcome> {
        if self.cancel.is_cancelled() {
            debug!("Cancelled before {}", task.relative_path().display());
            return None;
        }
        let category = self.router.route(task);
        Some(organizer.move_file(task, &category))
    }

    /// Collects every regular file below `root`, and every symlink to one,
    /// skipping the output folder and anything the filters exclude.
    fn discover(&self, root: &Path, output_root: &Path) -> OrganizeResult<Vec<FileTask>> {
        let mut tasks = Vec::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.path() != output_root);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(OrganizeError::Walk {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            // Links are not followed into directories, but a link to a regular
            // file is sorted like the file; the link itself is moved.
            if !entry.file_type().is_file() && !(entry.path_is_symlink() && entry.path().is_file()) {
                debug!("Skipping non-regular entry: {}", entry.path().display());
                continue;
            }

            let task = FileTask::new(entry.into_path(), root);
            if self.filters.should_include(task.relative_path()) {
                tasks.push(task);
            } else {
                debug!("Excluded by filters: {}", task.relative_path().display());
            }
        }

        Ok(tasks)
    }

    fn record_history(&self, root: &Path, organizer: &FileOrganizer, report: &OrganizeReport) {
        if report.moved.is_empty() {
            return;
        }

        let mut log = OperationLog::new(root.to_path_buf());
        for operation in report.moved.iter().filter_map(MoveOutcome::to_operation) {
            log.add_operation(operation);
        }

        if let Err(e) = log.save(organizer.output_root()) {
            warn!("Could not save history, undo will not be available: {}", e);
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if self.show_progress {
            OutputFormatter::create_progress_bar(total as u64)
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Resolves the root to an absolute path and checks that it is a directory.
fn validate_root(root: &Path) -> OrganizeResult<PathBuf> {
    let invalid = |source| OrganizeError::InvalidRoot {
        path: root.to_path_buf(),
        source,
    };

    let resolved = fs::canonicalize(root).map_err(invalid)?;
    if !resolved.is_dir() {
        return Err(invalid(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension_map::ExtensionMap;
    use tempfile::TempDir;

    fn extension_only(workers: usize) -> Dispatcher {
        let router = FileRouter::new(ExtensionMap::default(), None, Vec::new(), 5000);
        Dispatcher::new(router, CompiledFilters::allow_all(), "Sorted_Output", workers)
    }

    #[test]
    fn test_invalid_root() {
        let result = extension_only(2).organize(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let result = extension_only(2).organize(&file);
        assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));
    }

    #[test]
    fn test_discover_skips_output_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        fs::create_dir_all(root.join("Sorted_Output/Other")).unwrap();
        fs::write(root.join("Sorted_Output/Other/old.bin"), "x").unwrap();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested/new.bin"), "y").unwrap();
        fs::write(root.join("top.zip"), "z").unwrap();

        let dispatcher = extension_only(1);
        let mut found: Vec<PathBuf> = dispatcher
            .discover(&root, &root.join("Sorted_Output"))
            .unwrap()
            .into_iter()
            .map(|task| task.relative_path().to_path_buf())
            .collect();
        found.sort();

        assert_eq!(found, vec![PathBuf::from("nested/new.bin"), PathBuf::from("top.zip")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_includes_links_to_files() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outside = TempDir::new().expect("Failed to create temp directory");
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        fs::write(outside.path().join("target.zip"), "z").unwrap();
        fs::create_dir(outside.path().join("folder")).unwrap();
        fs::write(outside.path().join("folder/inner.zip"), "i").unwrap();
        symlink(outside.path().join("target.zip"), root.join("linked.zip")).unwrap();
        symlink(outside.path().join("folder"), root.join("linked_dir")).unwrap();
        symlink(outside.path().join("missing.zip"), root.join("dangling.zip")).unwrap();

        let found: Vec<PathBuf> = extension_only(1)
            .discover(&root, &root.join("Sorted_Output"))
            .unwrap()
            .into_iter()
            .map(|task| task.relative_path().to_path_buf())
            .collect();

        assert_eq!(found, vec![PathBuf::from("linked.zip")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_file_is_moved_as_link() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outside = TempDir::new().expect("Failed to create temp directory");
        let target = outside.path().join("target.zip");
        fs::write(&target, "z").unwrap();
        symlink(&target, temp_dir.path().join("linked.zip")).unwrap();

        let report = extension_only(1).organize(temp_dir.path()).unwrap();

        assert_eq!(report.moved.len(), 1);
        let moved = temp_dir.path().join("Sorted_Output/Compressed Archives/linked.zip");
        assert!(fs::symlink_metadata(&moved).unwrap().file_type().is_symlink());
        assert!(target.is_file());
    }

    #[test]
    fn test_cancelled_run_touches_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.zip"), "x").unwrap();
        fs::write(temp_dir.path().join("b.mp3"), "y").unwrap();

        let cancel = CancellationToken::new();
        let dispatcher = extension_only(2).with_cancellation(cancel.clone());
        cancel.cancel();

        let report = dispatcher.organize(temp_dir.path()).unwrap();

        assert_eq!(report.skipped, 2);
        assert!(report.moved.is_empty());
        assert!(!report.is_complete_success());
        assert!(temp_dir.path().join("a.zip").exists());
        assert!(!temp_dir.path().join("Sorted_Output").exists());
    }

    #[test]
    fn test_category_counts() {
        let outcome = |category: &str| MoveOutcome {
            source: PathBuf::from("/r/x"),
            destination: PathBuf::from("/r/Sorted_Output/x"),
            category: category.to_string(),
            error: None,
        };
        let report = OrganizeReport {
            moved: vec![outcome("Audio Files"), outcome("Other"), outcome("Audio Files")],
            ..Default::default()
        };

        let counts = report.category_counts();
        assert_eq!(counts.get("Audio Files"), Some(&2));
        assert_eq!(counts.get("Other"), Some(&1));
        assert!(report.is_complete_success());
    }

    #[test]
    fn test_plan_moves_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("song.mp3"), [0xFF, 0xFB, 0x10, 0x00]).unwrap();

        let planned = extension_only(2).plan(temp_dir.path()).unwrap();

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].category, "Audio Files");
        assert!(planned[0].destination.ends_with("Sorted_Output/Audio Files/song.mp3"));
        assert!(temp_dir.path().join("song.mp3").exists());
        assert!(!temp_dir.path().join("Sorted_Output").exists());
    }
}
