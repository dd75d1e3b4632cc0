//! Classifier adapters.
//!
//! The router only sees two narrow traits: [`TextClassifier`] picks one label
//! out of a candidate list for a piece of text, and [`ImageClassifier`] names
//! the top-1 object in an image file. The concrete adapters talk to external
//! inference services; tests plug in stubs.
//!
//! Both adapters are built once at startup and shared by every worker through
//! [`Classifiers`]. An adapter whose runtime cannot take concurrent calls is
//! wrapped in [`Serialized`], which puts a mutex in front of it.

pub mod image;
pub mod text;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::config::SorterConfig;

pub use self::image::ImageNetClassifier;
pub use self::text::ZeroShotTextClassifier;

/// Errors raised by classifier adapters.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The inference request could not be sent or its body not read.
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The inference service answered with a non-success status.
    #[error("{endpoint} answered {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response did not have the expected shape.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
    /// The model returned a label outside the candidate set.
    #[error("Classifier returned unknown label '{label}'")]
    UnknownLabel { label: String },
    /// No candidate labels were supplied.
    #[error("No candidate labels supplied")]
    EmptyLabels,
    /// The image could not be opened or decoded.
    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: ::image::ImageError,
    },
    /// The class index table could not be loaded.
    #[error("Invalid class index {}: {reason}", path.display())]
    ClassIndex { path: PathBuf, reason: String },
    /// Building the HTTP client failed.
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    /// A serialized adapter's lock was poisoned by a panicking worker.
    #[error("Classifier lock poisoned")]
    Poisoned,
}

/// Zero-shot text classification over a fixed candidate label set.
pub trait TextClassifier {
    /// Returns the single best label for `content`, which must be one of
    /// `labels`.
    fn classify_text(&self, content: &str, labels: &[String]) -> Result<String, ClassifierError>;
}

/// Top-1 image classification.
pub trait ImageClassifier {
    /// Returns the human-readable name of the most likely class.
    fn classify_image(&self, path: &Path) -> Result<String, ClassifierError>;
}

/// Mutual-exclusion boundary around an adapter.
///
/// Every call takes the lock, so at most one inference runs at a time no matter
/// how many workers share the adapter. The inner adapter only needs to be
/// `Send`.
#[derive(Debug)]
pub struct Serialized<C> {
    inner: Mutex<C>,
}

impl<C> Serialized<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<C: TextClassifier> TextClassifier for Serialized<C> {
    fn classify_text(&self, content: &str, labels: &[String]) -> Result<String, ClassifierError> {
        let guard = self.inner.lock().map_err(|_| ClassifierError::Poisoned)?;
        guard.classify_text(content, labels)
    }
}

impl<C: ImageClassifier> ImageClassifier for Serialized<C> {
    fn classify_image(&self, path: &Path) -> Result<String, ClassifierError> {
        let guard = self.inner.lock().map_err(|_| ClassifierError::Poisoned)?;
        guard.classify_image(path)
    }
}

/// Shared handle to both adapters.
///
/// Cloning is cheap; clones point at the same adapters.
#[derive(Clone)]
pub struct Classifiers {
    text: Arc<dyn TextClassifier + Send + Sync>,
    image: Arc<dyn ImageClassifier + Send + Sync>,
}

impl Classifiers {
    /// Wraps already constructed adapters.
    pub fn new(
        text: Arc<dyn TextClassifier + Send + Sync>,
        image: Arc<dyn ImageClassifier + Send + Sync>,
    ) -> Self {
        Self { text, image }
    }

    /// Builds the HTTP adapters described by the configuration, wrapping each
    /// in [`Serialized`] when its `serialize` flag is set.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built or the image class index cannot
    /// be loaded.
    pub fn from_config(config: &SorterConfig) -> Result<Self, ClassifierError> {
        let text_settings = &config.text_classifier;
        let text = ZeroShotTextClassifier::from_settings(text_settings)?;
        let text: Arc<dyn TextClassifier + Send + Sync> = if text_settings.serialize {
            Arc::new(Serialized::new(text))
        } else {
            Arc::new(text)
        };

        let image_settings = &config.image_classifier;
        let image = ImageNetClassifier::from_settings(image_settings)?;
        let image: Arc<dyn ImageClassifier + Send + Sync> = if image_settings.serialize {
            Arc::new(Serialized::new(image))
        } else {
            Arc::new(image)
        };

        info!(
            text_endpoint = %text_settings.endpoint,
            image_endpoint = %image_settings.endpoint,
            "Classifiers ready"
        );
        Ok(Self { text, image })
    }

    pub fn text(&self) -> &(dyn TextClassifier + Send + Sync) {
        self.text.as_ref()
    }

    pub fn image(&self) -> &(dyn ImageClassifier + Send + Sync) {
        self.image.as_ref()
    }
}

/// Turns raw model output into a usable folder name.
///
/// Path separators and control characters become `_`. Returns `None` when
/// nothing usable is left (empty, `.` or `..`).
///
/// ```
/// use precision_sort::classifier::sanitize_label;
///
/// assert_eq!(sanitize_label(" golden_retriever ").as_deref(), Some("golden_retriever"));
/// assert_eq!(sanitize_label("cassette/player").as_deref(), Some("cassette_player"));
/// assert_eq!(sanitize_label(".."), None);
/// ```
pub fn sanitize_label(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." || cleaned.chars().all(|c| c == '_')
    {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Records the highest number of overlapping calls it has seen.
    struct OverlapProbe {
        active: AtomicUsize,
        peak: Arc<AtomicUsize>,
    }

    impl TextClassifier for OverlapProbe {
        fn classify_text(&self, _: &str, labels: &[String]) -> Result<String, ClassifierError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(labels[0].clone())
        }
    }

    #[test]
    fn test_serialized_adapter_never_overlaps() {
        let peak = Arc::new(AtomicUsize::new(0));
        let adapter = Arc::new(Serialized::new(OverlapProbe {
            active: AtomicUsize::new(0),
            peak: Arc::clone(&peak),
        }));
        let labels = vec!["Note".to_string()];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                let labels = labels.clone();
                thread::spawn(move || adapter.classify_text("text", &labels))
            })
            .collect();

        for handle in handles {
            let label = handle.join().expect("worker panicked").expect("classify failed");
            assert_eq!(label, "Note");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sanitize_label_replaces_separators() {
        assert_eq!(sanitize_label("a/b\\c").as_deref(), Some("a_b_c"));
        assert_eq!(sanitize_label("tab\there").as_deref(), Some("tab_here"));
        assert_eq!(sanitize_label("Report").as_deref(), Some("Report"));
    }

    #[test]
    fn test_sanitize_label_rejects_unusable() {
        assert_eq!(sanitize_label(""), None);
        assert_eq!(sanitize_label("   "), None);
        assert_eq!(sanitize_label("."), None);
        assert_eq!(sanitize_label("//"), None);
    }
}
