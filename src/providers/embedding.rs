//! HTTP embedding client (OpenAI-compatible `/embeddings` endpoint)

use crate::config::EmbeddingConfig;
use crate::providers::{EmbeddingClient, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding client over an OpenAI-compatible HTTP API
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    pub fn new(cfg: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .map_err(|_| ProviderError::MissingApiKey(cfg.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.min(5)))
            .build()
            .map_err(|e| ProviderError::Connection {
                endpoint: cfg.endpoint.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_key,
            model: cfg.model.clone(),
            dimension: cfg.dimension,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                endpoint: self.endpoint.clone(),
            }
        } else if e.is_connect() {
            ProviderError::Connection {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            }
        } else {
            ProviderError::Api {
                endpoint: self.endpoint.clone(),
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = json!({
            "model": self.model,
            "input": [text],
            "dimensions": self.dimension,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let body: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    endpoint: self.endpoint.clone(),
                    message: e.to_string(),
                })?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::MalformedResponse {
                endpoint: self.endpoint.clone(),
                message: "empty data array".to_string(),
            })?;

        if embedding.len() != self.dimension {
            return Err(ProviderError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}
