//! Terminal output: banner, status lines, progress bar and summary tables.
//!
//! Logging goes through `tracing`; this module is only for what the user reads
//! at the end of a run.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

use crate::dispatcher::PlannedMove;

/// Styled CLI output.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints the program banner.
    pub fn banner() {
        println!("{}", "SORT WITH PRECISION - Powered by AI".blue().bold());
    }

    /// Prints a success message in green.
    ///
    /// ```no_run
    /// use precision_sort::output::OutputFormatter;
    /// OutputFormatter::success("File organization completed successfully!");
    /// ```
    pub fn success(message: &str) {
        println!("{}", message.green().bold());
    }

    /// Prints an error message in red on stderr.
    pub fn error(message: &str) {
        eprintln!("{}", message.red().bold());
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints a table of file counts per category.
    ///
    /// ```no_run
    /// use precision_sort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Report".to_string(), 3);
    /// counts.insert("golden_retriever".to_string(), 1);
    /// OutputFormatter::summary_table(&counts);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>) {
        Self::header("SUMMARY");

        let total: usize = category_counts.values().sum();
        let width = category_counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Category".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                Self::files_word(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            Self::files_word(total),
            width = width
        );
    }

    /// Prints the planned destination of each file for a dry run.
    pub fn plan_listing(root: &Path, planned: &[PlannedMove]) {
        Self::header("DRY RUN: files would be organized as follows");
        for entry in planned {
            let source = entry.source.strip_prefix(root).unwrap_or(&entry.source);
            let destination = entry
                .destination
                .strip_prefix(root)
                .unwrap_or(&entry.destination);
            let mime = entry
                .mime_type
                .as_deref()
                .map(|mime| format!(" ({})", mime))
                .unwrap_or_default();
            println!(" - {}{}", source.display(), mime.dimmed());
            println!("   → {}", destination.display());
        }
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    fn files_word(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }
}
