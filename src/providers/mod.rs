//! External collaborator interfaces
//!
//! The embedding service, the completion service and the member store are
//! reached exclusively through these traits; concrete implementations are
//! wired at startup. HTTP-backed clients live in the submodules, tests wire
//! deterministic stand-ins.

mod completion;
mod embedding;

pub use completion::HttpCompletionClient;
pub use embedding::HttpEmbeddingClient;

use crate::search::{MemberProfile, SearchFilter};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Failed to connect to {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("API error from {endpoint} (HTTP {status}): {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Member store error: {0}")]
    Store(String),
}

impl ProviderError {
    /// Transient failures are worth one retry; everything else is not
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Connection { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Embedding service: text in, pre-normalized fixed-dimension vector out
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Completion service: prompt in, raw completion text out
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Vector hit from the member store, before score conversion
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub profile: MemberProfile,
    /// Cosine distance, smaller is closer
    pub distance: f32,
}

/// Full-text hit from the member store, before rank normalization
#[derive(Debug, Clone)]
pub struct TextHit {
    pub profile: MemberProfile,
    /// Backend rank statistic, larger is better; 0 for filter-only matches
    pub rank: f32,
    /// Indexed fields the query text actually hit
    pub matched_fields: Vec<String>,
}

/// Read-only member corpus supporting both retrieval modalities
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Nearest-neighbor search over member embeddings, restricted by the
    /// filter predicates
    async fn vector_search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<VectorHit>, ProviderError>;

    /// Ranked full-text search over indexed member text, restricted by the
    /// same predicates
    async fn text_search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<TextHit>, ProviderError>;
}
