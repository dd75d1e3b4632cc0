//! Extension-based categorization.
//!
//! Maps a normalized file extension (lowercase, leading dot) to the name of the
//! folder the file is sorted into. Unknown extensions land in [`OTHER_CATEGORY`].
//!
//! # Examples
//!
//! ```
//! use precision_sort::extension_map::ExtensionMap;
//!
//! let map = ExtensionMap::default();
//! assert_eq!(map.category_for(".zip"), "Compressed Archives");
//! assert_eq!(map.category_for("MP3"), "Audio Files");
//! assert_eq!(map.category_for(".unknown"), "Other");
//! ```
use std::collections::HashMap;
use std::path::Path;

/// Category used when an extension has no mapping.
pub const OTHER_CATEGORY: &str = "Other";

/// Extensions whose content is read and sent to the text classifier.
pub const DOCUMENT_EXTENSIONS: [&str; 5] = [".txt", ".doc", ".docx", ".pdf", ".md"];

/// Extensions that are sent to the image classifier.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".bmp"];

/// Which routing branch an extension belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    /// Document-like files, classified by their text content.
    Document,
    /// Raster images, classified by the image model.
    Image,
    /// Everything else, categorized by the extension table alone.
    Other,
}

impl ExtensionKind {
    /// Classifies an already normalized extension.
    pub fn of(normalized_ext: &str) -> Self {
        if DOCUMENT_EXTENSIONS.contains(&normalized_ext) {
            ExtensionKind::Document
        } else if IMAGE_EXTENSIONS.contains(&normalized_ext) {
            ExtensionKind::Image
        } else {
            ExtensionKind::Other
        }
    }
}

/// Normalizes an extension: trims whitespace, lowercases, and ensures a single
/// leading dot. An empty input stays empty.
///
/// ```
/// use precision_sort::extension_map::normalize_extension;
///
/// assert_eq!(normalize_extension(" .PNG "), ".png");
/// assert_eq!(normalize_extension("Zip"), ".zip");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// Returns the normalized extension of a path, or an empty string when the
/// file name has none (`Makefile`, `.bashrc`).
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Lookup table from normalized extension to category name.
///
/// Built once before dispatch and only read afterwards, so workers share it by
/// reference.
#[derive(Debug, Clone)]
pub struct ExtensionMap {
    categories: HashMap<String, String>,
}

impl ExtensionMap {
    /// Creates a map holding the standard extension table.
    pub fn new() -> Self {
        let mut map = Self {
            categories: HashMap::new(),
        };
        map.populate_standard_mappings();
        map
    }

    fn populate_standard_mappings(&mut self) {
        // Documents
        self.add_mapping(".txt", "Text Files");
        self.add_mapping(".doc", "Word Documents");
        self.add_mapping(".docx", "Word Documents");
        self.add_mapping(".pdf", "PDF Files");
        self.add_mapping(".md", "Markdown Files");

        // Images
        self.add_mapping(".jpg", "JPEG Images");
        self.add_mapping(".jpeg", "JPEG Images");
        self.add_mapping(".png", "PNG Images");
        self.add_mapping(".gif", "GIF Images");
        self.add_mapping(".bmp", "BMP Images");

        // Office
        self.add_mapping(".xlsx", "Excel Files");
        self.add_mapping(".csv", "CSV Files");
        self.add_mapping(".ppt", "PowerPoint Presentations");
        self.add_mapping(".pptx", "PowerPoint Presentations");

        // Archives
        self.add_mapping(".zip", "Compressed Archives");
        self.add_mapping(".rar", "Compressed Archives");
        self.add_mapping(".7z", "Compressed Archives");
        self.add_mapping(".tar", "Compressed Archives");
        self.add_mapping(".gz", "Compressed Archives");

        // Media
        self.add_mapping(".mp3", "Audio Files");
        self.add_mapping(".wav", "Audio Files");
        self.add_mapping(".mp4", "Video Files");
        self.add_mapping(".avi", "Video Files");
        self.add_mapping(".mov", "Video Files");
        self.add_mapping(".mkv", "Video Files");

        // Code and markup
        self.add_mapping(".py", "Python Scripts");
        self.add_mapping(".js", "JavaScript Files");
        self.add_mapping(".html", "HTML Files");
        self.add_mapping(".css", "CSS Files");
        self.add_mapping(".json", "JSON Files");
        self.add_mapping(".xml", "XML Files");
    }

    /// Adds or replaces a mapping. The extension is normalized first; empty
    /// extensions are ignored.
    pub fn add_mapping(&mut self, ext: &str, category: &str) {
        let key = normalize_extension(ext);
        if key.is_empty() {
            return;
        }
        self.categories.insert(key, category.to_string());
    }

    /// Returns the category for an extension, or [`OTHER_CATEGORY`].
    pub fn category_for(&self, ext: &str) -> &str {
        self.categories
            .get(&normalize_extension(ext))
            .map(String::as_str)
            .unwrap_or(OTHER_CATEGORY)
    }

    /// Number of known extensions.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for ExtensionMap {
    fn default() -> Self {
        Self::new()
    }
}
