//! ImageNet classification over HTTP.
//!
//! Preprocessing happens locally and matches what ResNet50 was trained on:
//! 224×224 input, BGR channel order, ImageNet channel means subtracted. The
//! tensor is posted to a TensorFlow Serving style `:predict` endpoint and the
//! top-1 index is decoded through the Keras class index table.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::image::DynamicImage;
use ::image::imageops::FilterType;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassifierError, ImageClassifier};
use crate::config::ImageClassifierSettings;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Per-channel means in BGR order.
pub const IMAGENET_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// One image as rows of BGR pixels, `INPUT_SIZE` × `INPUT_SIZE` × 3.
pub type ImageTensor = Vec<Vec<[f32; 3]>>;

/// Resizes and normalizes an image into the model's input tensor.
pub fn preprocess(image: &DynamicImage) -> ImageTensor {
    let rgb = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
        .to_rgb8();

    rgb.rows()
        .map(|row| {
            row.map(|pixel| {
                let [r, g, b] = pixel.0;
                [
                    f32::from(b) - IMAGENET_MEAN_BGR[0],
                    f32::from(g) - IMAGENET_MEAN_BGR[1],
                    f32::from(r) - IMAGENET_MEAN_BGR[2],
                ]
            })
            .collect()
        })
        .collect()
}

/// Index of the highest score, ignoring NaNs.
pub fn top1(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
}

/// Human-readable ImageNet class names, indexed by model output position.
#[derive(Debug, Clone)]
pub struct ImageNetLabels {
    names: Vec<String>,
}

impl ImageNetLabels {
    /// Parses a Keras `imagenet_class_index.json` document:
    /// `{"0": ["n01440764", "tench"], "1": [...], ...}`.
    pub fn from_json_str(content: &str) -> Result<Self, String> {
        let raw: HashMap<String, (String, String)> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut indexed = raw
            .into_iter()
            .map(|(key, (_wnid, name))| {
                key.parse::<usize>()
                    .map(|index| (index, name))
                    .map_err(|_| format!("class key '{key}' is not an index"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indexed.sort_by_key(|(index, _)| *index);

        for (position, (index, _)) in indexed.iter().enumerate() {
            if *index != position {
                return Err(format!("class index {position} is missing"));
            }
        }
        if indexed.is_empty() {
            return Err("class index is empty".to_string());
        }

        Ok(Self {
            names: indexed.into_iter().map(|(_, name)| name).collect(),
        })
    }

    /// Loads the table from a file.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let invalid = |reason: String| ClassifierError::ClassIndex {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::from_json_str(&content).map_err(invalid)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [&'a ImageTensor; 1],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

/// Image adapter backed by a remote ResNet50 served behind a predict endpoint.
#[derive(Debug, Clone)]
pub struct ImageNetClassifier {
    client: Client,
    endpoint: String,
    labels: ImageNetLabels,
}

impl ImageNetClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        labels: ImageNetLabels,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClassifierError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            labels,
        })
    }

    /// Loads the class index named in the settings and builds the adapter.
    pub fn from_settings(settings: &ImageClassifierSettings) -> Result<Self, ClassifierError> {
        let labels = ImageNetLabels::load(&settings.class_index)?;
        debug!(
            classes = labels.len(),
            path = %settings.class_index.display(),
            "Loaded ImageNet class index"
        );
        Self::new(
            settings.endpoint.clone(),
            labels,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn decode(&self, body: &str) -> Result<String, ClassifierError> {
        let malformed = |reason: String| ClassifierError::MalformedResponse {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let response: PredictResponse =
            serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
        let scores = response
            .predictions
            .first()
            .ok_or_else(|| malformed("empty predictions".to_string()))?;
        let index = top1(scores).ok_or_else(|| malformed("no scores".to_string()))?;

        self.labels
            .name(index)
            .map(str::to_string)
            .ok_or_else(|| malformed(format!("class {index} outside the class index")))
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, ClassifierError> {
    let decode_error = |source| ClassifierError::Decode {
        path: PathBuf::from(path),
        source,
    };
    ::image::ImageReader::open(path)
        .map_err(|e| decode_error(::image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_error(::image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}

impl ImageClassifier for ImageNetClassifier {
    fn classify_image(&self, path: &Path) -> Result<String, ClassifierError> {
        let tensor = preprocess(&load_image(path)?);
        let request = PredictRequest {
            instances: [&tensor],
        };

        let request_error = |source| ClassifierError::Request {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(request_error)?;
        let status = response.status();
        let body = response.text().map_err(request_error)?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        self.decode(&body)
    }
}
