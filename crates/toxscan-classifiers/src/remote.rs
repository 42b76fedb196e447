//! Client for the hosted moderation API
//!
//! Request:
//! ```text
//! POST /api/v1/moderate/
//! {"token": "<api key>", "text": "<content>"}
//! ```
//!
//! Response:
//! ```text
//! {"class": "flag", "confidence": "0.9523"}
//! ```
//!
//! `confidence` arrives either as a number or as a numeric string.

use crate::classifier::Classifier;
use crate::config::ClassifierConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use toxscan_core::{ClassificationError, Error, Result, ToxicityResult};
use tracing::debug;

/// Error bodies longer than this are cut before being reported
const MAX_ERROR_BODY: usize = 256;

/// Toxicity classifier backed by the hosted moderation API
pub struct RemoteClassifier {
    name: String,
    api_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ModerateRequest<'a> {
    token: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ModerateResponse {
    class: Option<String>,
    confidence: Option<Value>,
}

impl RemoteClassifier {
    /// Create a client for `api_url`; every request is bounded by `timeout`
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: "moderatehatespeech".to_string(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            http,
        })
    }

    /// Create a client from classifier configuration
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("remote classifier requires an api_key"))?;

        Self::new(&config.api_url, api_key, config.timeout())
    }

    /// Endpoint this client posts to
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> std::result::Result<ToxicityResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }

        let request = ModerateRequest {
            token: &self.api_key,
            text,
        };

        debug!(url = %self.api_url, chars = text.len(), "Moderation request");

        let response = self
            .http
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse a moderation response body into a result.
///
/// Any deviation from `{class: string, confidence: number-or-numeric-string}`
/// with a confidence in `[0, 1]` is a [`ClassificationError::Malformed`].
pub fn parse_response(body: &str) -> std::result::Result<ToxicityResult, ClassificationError> {
    let response: ModerateResponse = serde_json::from_str(body)
        .map_err(|e| ClassificationError::Malformed(format!("invalid JSON: {}", e)))?;

    let label = response
        .class
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ClassificationError::Malformed("missing field `class`".to_string()))?;

    let confidence = match response.confidence {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => {
            return Err(ClassificationError::Malformed(
                "missing field `confidence`".to_string(),
            ))
        }
    }
    .ok_or_else(|| ClassificationError::Malformed("confidence is not numeric".to_string()))?;

    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ClassificationError::Malformed(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }

    Ok(ToxicityResult::new(label, confidence))
}

fn transport_error(e: reqwest::Error) -> ClassificationError {
    if e.is_timeout() {
        ClassificationError::Timeout
    } else {
        ClassificationError::Transport(e.to_string())
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
