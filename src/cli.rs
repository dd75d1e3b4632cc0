//! Command-line interface.
//!
//! Parses arguments, and runs one of three commands against a directory:
//! organize, dry run, or undo of the last organize.

use clap::{ArgAction, Parser};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::classifier::Classifiers;
use crate::config::SorterConfig;
use crate::dispatcher::{Dispatcher, OrganizeReport, PlannedMove};
use crate::error::{OrganizeError, OrganizeResult};
use crate::output::OutputFormatter;
use crate::undo::{UndoManager, UndoReport};

/// Sort files into category folders by extension or by AI classification.
#[derive(Debug, Parser)]
#[command(name = "precision-sort", version, about, long_about = None)]
pub struct Cli {
    /// Directory to organize. Prompted for when omitted.
    pub directory: Option<PathBuf>,

    /// Show where files would go without moving anything.
    #[arg(long, conflicts_with = "undo")]
    pub dry_run: bool,

    /// Move the files of the last run back where they came from.
    #[arg(long)]
    pub undo: bool,

    /// Configuration file (TOML).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Worker threads (default: one per core).
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Sort documents and images by extension instead of classifying them.
    #[arg(long)]
    pub extensions_only: bool,

    /// Show a progress bar.
    #[arg(long)]
    pub progress: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn organize_command(&self) -> OrganizeCommand {
        if self.undo {
            OrganizeCommand::Undo
        } else {
            OrganizeCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }

    /// Applies command-line flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut SorterConfig) {
        if let Some(workers) = self.workers {
            config.sorting.workers = workers;
        }
        if self.extensions_only {
            config.sorting.classify = false;
        }
    }
}

/// What to do with the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files, or only report the plan when `dry_run` is set.
    Organize { dry_run: bool },
    /// Undo the previous organization.
    Undo,
}

impl OrganizeCommand {
    /// Whether the command needs the classifiers loaded.
    pub fn needs_classifiers(&self) -> bool {
        matches!(self, OrganizeCommand::Organize { .. })
    }
}

/// Runs `command` against `dir_path`.
///
/// `classifiers` are the adapters built at startup; with `None` every file is
/// sorted by extension.
pub fn run_cli(
    command: OrganizeCommand,
    dir_path: &Path,
    config: &SorterConfig,
    classifiers: Option<Classifiers>,
    show_progress: bool,
) -> OrganizeResult<()> {
    match command {
        OrganizeCommand::Organize { dry_run: false } => {
            organize_directory(dir_path, config, classifiers, show_progress).map(|_| ())
        }
        OrganizeCommand::Organize { dry_run: true } => {
            organize_directory_dry_run(dir_path, config, classifiers, show_progress).map(|_| ())
        }
        OrganizeCommand::Undo => undo_organization(dir_path, config).map(|_| ()),
    }
}

/// Organizes `base_path` and prints a summary.
pub fn organize_directory(
    base_path: &Path,
    config: &SorterConfig,
    classifiers: Option<Classifiers>,
    show_progress: bool,
) -> OrganizeResult<OrganizeReport> {
    OutputFormatter::info(&format!("Organizing contents of: {}", base_path.display()));

    let dispatcher = Dispatcher::from_config(config, classifiers)?.with_progress(show_progress);
    if !dispatcher.router().classifies() {
        OutputFormatter::warning("Classification disabled; sorting by extension only.");
    }

    let report = dispatcher.organize(base_path)?;

    if report.moved.is_empty() && report.failed.is_empty() {
        OutputFormatter::plain("No files found to organize.");
    } else {
        OutputFormatter::summary_table(&report.category_counts());
    }

    if !report.failed.is_empty() {
        OutputFormatter::header("FAILED");
        for outcome in &report.failed {
            OutputFormatter::error(&format!(
                " - {}: {}",
                outcome.source.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        OutputFormatter::warning("Some files could not be organized. They were left in place.");
    }

    if !report.moved.is_empty() {
        OutputFormatter::info(&format!(
            "Use 'precision-sort {} --undo' to revert changes.",
            base_path.display()
        ));
    }

    Ok(report)
}

/// Computes and prints the plan for `base_path` without moving anything.
pub fn organize_directory_dry_run(
    base_path: &Path,
    config: &SorterConfig,
    classifiers: Option<Classifiers>,
    show_progress: bool,
) -> OrganizeResult<Vec<PlannedMove>> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", base_path.display()));

    let dispatcher = Dispatcher::from_config(config, classifiers)?.with_progress(show_progress);
    let planned = dispatcher.plan(base_path)?;

    if planned.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return Ok(planned);
    }

    let root = std::fs::canonicalize(base_path).unwrap_or_else(|_| base_path.to_path_buf());
    OutputFormatter::plan_listing(&root, &planned);

    let mut counts = std::collections::BTreeMap::new();
    for entry in &planned {
        *counts.entry(entry.category.clone()).or_insert(0) += 1;
    }
    OutputFormatter::summary_table(&counts);
    OutputFormatter::dry_run_notice("No files were modified.");

    Ok(planned)
}

/// Restores the last run in `base_path` and prints what happened.
pub fn undo_organization(base_path: &Path, config: &SorterConfig) -> OrganizeResult<UndoReport> {
    OutputFormatter::info("Undoing previous organization...");

    let report = UndoManager::undo(base_path, &config.sorting.output_dir)?;
    OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));

    if !report.skipped_files.is_empty() {
        OutputFormatter::plain(&format!("  Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::plain(&format!("  Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.is_complete_success() {
        OutputFormatter::warning("History file was kept. Fix the issues above and try again.");
    }

    Ok(report)
}

/// Asks for the directory on stdin.
pub fn prompt_for_directory() -> OrganizeResult<PathBuf> {
    println!("Enter the directory path to organize files (e.g., /path/to/directory):");
    io::stdout().flush().map_err(OrganizeError::Prompt)?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(OrganizeError::Prompt)?;
    Ok(PathBuf::from(line.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organize() {
        let cli = Cli::try_parse_from(["precision-sort", "/tmp/inbox", "-w", "4", "--extensions-only"])
            .unwrap();
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp/inbox")));
        assert_eq!(cli.organize_command(), OrganizeCommand::Organize { dry_run: false });

        let mut config = SorterConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.sorting.workers, 4);
        assert!(!config.sorting.classify);
    }

    #[test]
    fn test_parse_dry_run_and_undo() {
        let dry = Cli::try_parse_from(["precision-sort", "dir", "--dry-run", "-vv"]).unwrap();
        assert_eq!(dry.organize_command(), OrganizeCommand::Organize { dry_run: true });
        assert_eq!(dry.verbose, 2);

        let undo = Cli::try_parse_from(["precision-sort", "dir", "--undo"]).unwrap();
        assert_eq!(undo.organize_command(), OrganizeCommand::Undo);
        assert!(!undo.organize_command().needs_classifiers());
    }

    #[test]
    fn test_dry_run_conflicts_with_undo() {
        let result = Cli::try_parse_from(["precision-sort", "dir", "--dry-run", "--undo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_is_optional() {
        let cli = Cli::try_parse_from(["precision-sort"]).unwrap();
        assert!(cli.directory.is_none());
    }
}
