//! precision-sort - sorts the files of a directory tree into category folders
//!
//! Documents are labelled by a zero-shot text classifier, images by an
//! ImageNet classifier, and everything else by extension. Files land in
//! `<root>/Sorted_Output/<category>/`, and directories left empty are removed.
//! Runs are recorded so they can be undone.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extension_map;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod router;
pub mod undo;

pub use classifier::{ClassifierError, Classifiers, ImageClassifier, Serialized, TextClassifier};
pub use config::{CompiledFilters, ConfigError, SorterConfig};
pub use dispatcher::{CancellationToken, Dispatcher, OrganizeReport, PlannedMove};
pub use error::{OrganizeError, OrganizeResult};
pub use extension_map::ExtensionMap;
pub use organizer::{FileOrganizer, MoveOutcome};
pub use router::{FileRouter, FileTask};
pub use undo::{UndoManager, UndoReport};

pub use cli::{OrganizeCommand, run_cli};
