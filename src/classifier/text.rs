//! Zero-shot text classification over HTTP.
//!
//! Speaks the Hugging Face inference contract for zero-shot pipelines:
//! the request carries the text plus `candidate_labels`, the response lists the
//! labels ranked by score.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassifierError, TextClassifier};
use crate::config::TextClassifierSettings;

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroShotPrediction {
    labels: Vec<String>,
    #[serde(default)]
    scores: Vec<f64>,
}

/// Some deployments wrap the prediction in a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotPrediction),
    Batch(Vec<ZeroShotPrediction>),
}

/// Removes duplicate labels, keeping the first occurrence, and drops blanks.
pub fn dedupe_labels(labels: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !unique.iter().any(|seen| seen == label) {
            unique.push(label.to_string());
        }
    }
    unique
}

/// Picks the top-ranked label out of a raw response body and checks it is one
/// of the candidates.
fn best_label(endpoint: &str, body: &str, candidates: &[String]) -> Result<String, ClassifierError> {
    let malformed = |reason: String| ClassifierError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason,
    };

    let response: ZeroShotResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let prediction = match response {
        ZeroShotResponse::Single(prediction) => prediction,
        ZeroShotResponse::Batch(mut batch) => {
            if batch.is_empty() {
                return Err(malformed("empty prediction list".to_string()));
            }
            batch.swap_remove(0)
        }
    };

    let top = prediction
        .labels
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no labels in prediction".to_string()))?;

    if !candidates.iter().any(|candidate| *candidate == top) {
        return Err(ClassifierError::UnknownLabel { label: top });
    }

    if let Some(score) = prediction.scores.first() {
        debug!(label = %top, score, "Zero-shot prediction");
    }
    Ok(top)
}

/// Text adapter backed by a remote zero-shot classification model
/// (by default `facebook/bart-large-mnli`).
#[derive(Debug, Clone)]
pub struct ZeroShotTextClassifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl ZeroShotTextClassifier {
    /// Creates an adapter for `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClassifierError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    /// Creates an adapter from configuration, reading the bearer token from
    /// the configured environment variable when it is set.
    pub fn from_settings(settings: &TextClassifierSettings) -> Result<Self, ClassifierError> {
        let token = settings
            .api_token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|token| !token.is_empty());
        Self::new(
            settings.endpoint.clone(),
            token,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TextClassifier for ZeroShotTextClassifier {
    fn classify_text(&self, content: &str, labels: &[String]) -> Result<String, ClassifierError> {
        let candidates = dedupe_labels(labels);
        if candidates.is_empty() {
            return Err(ClassifierError::EmptyLabels);
        }

        let request = ZeroShotRequest {
            inputs: content,
            parameters: ZeroShotParameters {
                candidate_labels: &candidates,
                multi_label: false,
            },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let request_error = |source| ClassifierError::Request {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = builder.send().map_err(request_error)?;
        let status = response.status();
        let body = response.text().map_err(request_error)?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        best_label(&self.endpoint, &body, &candidates)
    }
}
