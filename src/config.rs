//! Configuration loading and file filtering.
//!
//! Everything is optional; a missing file means defaults. The file is TOML:
//!
//! ```toml
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [sorting]
//! output_dir = "Sorted_Output"
//! max_text_chars = 5000
//! workers = 0
//! classify = true
//!
//! [sorting.extensions]
//! ".heic" = "HEIC Images"
//!
//! [text_classifier]
//! endpoint = "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
//! api_token_env = "HF_TOKEN"
//!
//! [image_classifier]
//! endpoint = "http://localhost:8501/v1/models/resnet50:predict"
//! class_index = "imagenet_class_index.json"
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::extension_map::ExtensionMap;

/// Labels offered to the zero-shot text classifier by default.
pub const DEFAULT_TEXT_LABELS: [&str; 9] = [
    "Note",
    "Guide",
    "Report",
    "Documentation",
    "Manual",
    "Plan",
    "Email",
    "Database",
    "Code",
];

/// Name of the folder created under the root to hold sorted files.
pub const DEFAULT_OUTPUT_DIR: &str = "Sorted_Output";

/// Characters of document content sent to the text classifier.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 5000;

const LOCAL_CONFIG_FILE: &str = ".precision-sort.toml";

/// Errors that can occur during configuration loading and filtering.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub filters: FilterRules,
    pub sorting: SortingSettings,
    pub text_classifier: TextClassifierSettings,
    pub image_classifier: ImageClassifierSettings,
}

/// Which files are picked up by the directory walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to true so
    /// that every regular file is sorted.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Include rules win over every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames (e.g. ".DS_Store").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions without the dot (e.g. "bak").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regexes matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Whitelist patterns that override exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Sorting behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingSettings {
    /// Folder under the root that receives the category folders.
    pub output_dir: String,
    /// Upper bound on characters read from a document.
    pub max_text_chars: usize,
    /// Candidate labels for the text classifier.
    pub text_labels: Vec<String>,
    /// Worker threads; 0 means one per available core.
    pub workers: usize,
    /// When false, documents and images are sorted by extension only.
    pub classify: bool,
    /// Extra or overriding extension mappings.
    pub extensions: BTreeMap<String, String>,
}

impl Default for SortingSettings {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            text_labels: DEFAULT_TEXT_LABELS.iter().map(|s| s.to_string()).collect(),
            workers: 0,
            classify: true,
            extensions: BTreeMap::new(),
        }
    }
}

impl SortingSettings {
    /// Worker count with `0` resolved to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Standard extension table plus the configured overrides.
    pub fn extension_map(&self) -> ExtensionMap {
        let mut map = ExtensionMap::default();
        for (ext, category) in &self.extensions {
            map.add_mapping(ext, category);
        }
        map
    }
}

/// Zero-shot text classification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextClassifierSettings {
    pub endpoint: String,
    /// Environment variable holding a bearer token, if any.
    pub api_token_env: Option<String>,
    pub timeout_secs: u64,
    /// Put a mutex in front of the adapter.
    pub serialize: bool,
}

impl Default for TextClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
                .to_string(),
            api_token_env: Some("HF_TOKEN".to_string()),
            timeout_secs: 120,
            serialize: false,
        }
    }
}

/// Image classification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageClassifierSettings {
    pub endpoint: String,
    /// Keras-style `imagenet_class_index.json`.
    pub class_index: PathBuf,
    pub timeout_secs: u64,
    /// Put a mutex in front of the adapter.
    pub serialize: bool,
}

impl Default for ImageClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8501/v1/models/resnet50:predict".to_string(),
            class_index: PathBuf::from("imagenet_class_index.json"),
            timeout_secs: 120,
            serialize: false,
        }
    }
}

impl SorterConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.precision-sort.toml` in the current directory
    /// 3. `~/.config/precision-sort/config.toml`
    /// 4. defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a file is found but cannot be read, parsed or
    /// validated, or if `config_path` does not exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("precision-sort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let output_dir = self.sorting.output_dir.trim();
        if output_dir.is_empty()
            || output_dir == "."
            || output_dir == ".."
            || output_dir.contains(['/', '\\'])
        {
            return Err(ConfigError::ConfigInvalid(format!(
                "sorting.output_dir must be a single folder name, got '{}'",
                self.sorting.output_dir
            )));
        }
        if self.sorting.max_text_chars == 0 {
            return Err(ConfigError::ConfigInvalid(
                "sorting.max_text_chars must be greater than zero".to_string(),
            ));
        }
        if self.sorting.text_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ConfigError::ConfigInvalid(
                "sorting.text_labels must contain at least one label".to_string(),
            ));
        }
        Ok(())
    }
}

impl FilterRules {
    /// Compile into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Filters that let every file through.
    pub fn allow_all() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    /// Decides whether a file is sorted. `relative_path` is relative to the
    /// root being organized.
    ///
    /// Order: include patterns, hidden files, exact name, extension, glob,
    /// regex; anything left is included.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}
