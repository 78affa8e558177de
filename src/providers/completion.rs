//! HTTP completion client (OpenAI-compatible `/chat/completions` endpoint)

use crate::config::LlmConfig;
use crate::providers::{CompletionClient, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Completion client over an OpenAI-compatible HTTP API
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpCompletionClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self, ProviderError> {
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
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
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
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let body: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    endpoint: self.endpoint.clone(),
                    message: e.to_string(),
                })?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse {
                endpoint: self.endpoint.clone(),
                message: "no choices returned".to_string(),
            })
    }
}
