//! Per-file category decisions.
//!
//! [`FileRouter::route`] looks at the normalized extension and either asks a
//! classifier or falls back to the extension table. Classifier and read
//! failures never escape: the file is routed to [`UNCLASSIFIED_CATEGORY`].

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::classifier::{Classifiers, sanitize_label};
use crate::config::SorterConfig;
use crate::extension_map::{ExtensionKind, ExtensionMap, extension_of};

/// Category for files whose content could not be read or classified.
pub const UNCLASSIFIED_CATEGORY: &str = "Unclassified";

/// One discovered file, owned by the worker that processes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    path: PathBuf,
    root: PathBuf,
}

impl FileTask {
    pub fn new(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root directory being organized.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Display-friendly file name.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path relative to the root, used for filter matching and logs.
    pub fn relative_path(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }
}

/// Reads at most `max_chars` characters of UTF-8 text from the start of a file.
///
/// Only the bytes that can hold `max_chars` characters are read. Invalid UTF-8
/// after the first `max_chars` characters is ignored, as is a multi-byte
/// character cut off by the byte limit; an invalid sequence inside the prefix
/// is an `InvalidData` error.
pub fn read_text_prefix(path: &Path, max_chars: usize) -> io::Result<String> {
    let byte_limit = max_chars.saturating_mul(4) as u64;
    let mut buffer = Vec::new();
    File::open(path)?.take(byte_limit).read_to_end(&mut buffer)?;

    let text = match std::str::from_utf8(&buffer) {
        Ok(text) => text,
        Err(e) => {
            // valid_up_to is a char boundary by construction
            let valid = std::str::from_utf8(&buffer[..e.valid_up_to()])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            // error_len() is None only for a truncated sequence at the very end.
            let cut_at_limit = e.error_len().is_none() && buffer.len() as u64 == byte_limit;
            let prefix_complete = valid.chars().take(max_chars).count() == max_chars;
            if !cut_at_limit && !prefix_complete {
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
            valid
        }
    };

    Ok(text.chars().take(max_chars).collect())
}

/// Decides the category of each file.
///
/// Shared by reference across workers; everything inside is read-only after
/// construction.
pub struct FileRouter {
    extensions: ExtensionMap,
    classifiers: Option<Classifiers>,
    labels: Vec<String>,
    max_text_chars: usize,
}

impl FileRouter {
    /// Creates a router. With `classifiers` set to `None` every file is
    /// categorized by extension.
    pub fn new(
        extensions: ExtensionMap,
        classifiers: Option<Classifiers>,
        labels: Vec<String>,
        max_text_chars: usize,
    ) -> Self {
        Self {
            extensions,
            classifiers,
            labels,
            max_text_chars,
        }
    }

    /// Builds a router from configuration. Classifiers are dropped when
    /// `sorting.classify` is off.
    pub fn from_config(config: &SorterConfig, classifiers: Option<Classifiers>) -> Self {
        let classifiers = classifiers.filter(|_| config.sorting.classify);
        Self::new(
            config.sorting.extension_map(),
            classifiers,
            config.sorting.text_labels.clone(),
            config.sorting.max_text_chars,
        )
    }

    pub fn classifies(&self) -> bool {
        self.classifiers.is_some()
    }

    /// Returns the category folder name for a file. Never fails.
    pub fn route(&self, task: &FileTask) -> String {
        let ext = extension_of(task.path());

        let category = match (&self.classifiers, ExtensionKind::of(&ext)) {
            (Some(classifiers), ExtensionKind::Document) => self.route_document(task, classifiers),
            (Some(classifiers), ExtensionKind::Image) => self.route_image(task, classifiers),
            _ => self.extensions.category_for(&ext).to_string(),
        };

        debug!(file = %task.relative_path().display(), ext = %ext, category = %category, "Routed");
        category
    }

    fn route_document(&self, task: &FileTask, classifiers: &Classifiers) -> String {
        let content = match read_text_prefix(task.path(), self.max_text_chars) {
            Ok(content) => content,
            Err(e) => {
                error!("Error reading {}: {}", task.file_name(), e);
                return UNCLASSIFIED_CATEGORY.to_string();
            }
        };

        match classifiers.text().classify_text(&content, &self.labels) {
            Ok(label) => Self::usable(task, &label),
            Err(e) => {
                error!("Error classifying text of {}: {}", task.file_name(), e);
                UNCLASSIFIED_CATEGORY.to_string()
            }
        }
    }

    fn route_image(&self, task: &FileTask, classifiers: &Classifiers) -> String {
        match classifiers.image().classify_image(task.path()) {
            Ok(label) => Self::usable(task, &label),
            Err(e) => {
                error!("Error classifying image {}: {}", task.file_name(), e);
                UNCLASSIFIED_CATEGORY.to_string()
            }
        }
    }

    fn usable(task: &FileTask, label: &str) -> String {
        sanitize_label(label).unwrap_or_else(|| {
            error!(
                "Classifier returned unusable label {:?} for {}",
                label,
                task.file_name()
            );
            UNCLASSIFIED_CATEGORY.to_string()
        })
    }
}
