// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Remote retinal image classifier client

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::{OculareError, Result};

/// Classifier verdict for one image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierReport {
    /// Disease name -> probability in `[0, 1]`
    #[serde(default)]
    pub disease_probabilities: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub diagnosis: Option<DiagnosisNote>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub most_likely_disease: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub uncertain_prediction: bool,
    /// Set by the service when it could not analyze the image
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisNote {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

impl ClassifierReport {
    /// Probabilities, or an empty map when the service sent none
    pub fn probabilities(&self) -> HashMap<String, f64> {
        self.disease_probabilities.clone().unwrap_or_default()
    }
}

/// Trait for image classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Submit raw image bytes and return the service's report
    async fn classify(&self, image: &[u8], filename: &str) -> Result<ClassifierReport>;
}

/// HTTP client for the upload endpoint of the classification service
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    /// Create a new classifier client
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check if the service answers at all
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .get(&self.url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                OculareError::ClassifierUnavailable(format!(
                    "Cannot connect to classifier at {}: {}",
                    self.url, e
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &[u8], filename: &str) -> Result<ClassifierReport> {
        let part = Part::bytes(image.to_vec())
            .file_name(filename.to_string())
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        debug!("Submitting {} ({} bytes) to {}", filename, image.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OculareError::ClassifierUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OculareError::ClassifierUnavailable(format!(
                "Classifier returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                OculareError::ClassifierUnavailable(format!("Unreadable response: {}", e))
            })?;

        parse_report(body)
    }
}

/// Decode a response body, unwrapping the `analysis_result` envelope when present
pub fn parse_report(body: serde_json::Value) -> Result<ClassifierReport> {
    let payload = match body {
        serde_json::Value::Object(mut map) if map.contains_key("analysis_result") => {
            map.remove("analysis_result").unwrap_or_default()
        }
        other => other,
    };

    let report: ClassifierReport = serde_json::from_value(payload).map_err(|e| {
        OculareError::ClassifierUnavailable(format!("Unexpected response shape: {}", e))
    })?;

    if let Some(ref message) = report.error {
        warn!("Classifier reported an error: {}", message);
    }
    if let Some(ref version) = report.model_version {
        debug!("Classified with model v{}", version);
    }

    Ok(report)
}
