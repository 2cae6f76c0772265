//! Client for an HTTP inference service.
//!
//! Batches are posted as `{"instances": [[...], ...]}` and the service
//! answers `{"predictions": [[...], ...]}`, one probability row per window.

use crate::error::{ClassifierError, ConfigurationError};
use crate::model::Classifier;
use serde::{Deserialize, Serialize};

/// Remote inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Full URL of the predict endpoint
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of probability columns the service returns
    pub num_classes: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8501/v1/models/ecg:predict".to_string(),
            timeout_secs: 10,
            num_classes: 5,
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Vec<f64>],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f64>>,
}

/// Blocking classifier backed by a remote inference service.
pub struct RemoteClassifier {
    config: RemoteConfig,
    input_len: usize,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl RemoteClassifier {
    /// Create a client for windows of `input_len` samples.
    pub fn new(config: RemoteConfig, input_len: usize) -> Result<Self, ConfigurationError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ConfigurationError::InvalidModel(format!("failed to create inference runtime: {e}"))
            })?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ConfigurationError::InvalidModel(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            input_len,
            client,
            runtime,
        })
    }

    async fn predict_async(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&PredictRequest { instances: batch })
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClassifierError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Response(e.to_string()))?;

        Ok(body.predictions)
    }
}

impl Classifier for RemoteClassifier {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        if let Some(window) = batch.iter().find(|w| w.len() != self.input_len) {
            return Err(ClassifierError::InputWidth {
                expected: self.input_len,
                actual: window.len(),
            });
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.runtime.block_on(self.predict_async(batch))
    }
}
