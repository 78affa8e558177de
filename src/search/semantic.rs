//! Semantic retrieval branch
//!
//! Embeds the query via the external embedding service, then runs a
//! nearest-neighbor query over member embeddings. The embedding call is a
//! hard dependency of this branch only: its failure fails the branch, never
//! the whole request.

use crate::providers::{EmbeddingClient, MemberStore};
use crate::search::{CandidateMatch, SearchError, SearchFilter};
use std::sync::Arc;

pub struct SemanticSearch {
    embedding: Arc<dyn EmbeddingClient>,
    store: Arc<dyn MemberStore>,
}

impl SemanticSearch {
    pub fn new(embedding: Arc<dyn EmbeddingClient>, store: Arc<dyn MemberStore>) -> Self {
        Self { embedding, store }
    }

    /// Top-`limit` members by cosine similarity, restricted by the filter
    pub async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<CandidateMatch>, SearchError> {
        let embedding = match self.embedding.embed(text).await {
            Ok(v) => v,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "Embedding call failed, retrying once");
                self.embedding
                    .embed(text)
                    .await
                    .map_err(SearchError::Embedding)?
            }
            Err(e) => return Err(SearchError::Embedding(e)),
        };

        let hits = self
            .store
            .vector_search(&embedding, filter, limit)
            .await
            .map_err(SearchError::Store)?;

        let restricted = filter.restricted_fields();
        Ok(hits
            .into_iter()
            .map(|hit| CandidateMatch {
                profile: hit.profile,
                // Cosine distance to similarity, clamped into [0,1]
                semantic_score: Some((1.0 - hit.distance).clamp(0.0, 1.0)),
                keyword_score: None,
                matched_fields: restricted.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, VectorHit};
    use crate::search::MemberProfile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyEmbedding {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl EmbeddingClient for FlakyEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(ProviderError::Timeout {
                    endpoint: "embed".into(),
                });
            }
            Ok(vec![0.0; 768])
        }
    }

    struct FixedStore {
        hits: Vec<VectorHit>,
    }

    #[async_trait]
    impl MemberStore for FixedStore {
        async fn vector_search(
            &self,
            _embedding: &[f32],
            _filter: &SearchFilter,
            _limit: usize,
        ) -> Result<Vec<VectorHit>, ProviderError> {
            Ok(self.hits.clone())
        }

        async fn text_search(
            &self,
            _query: &str,
            _filter: &SearchFilter,
            _limit: usize,
        ) -> Result<Vec<crate::providers::TextHit>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn profile(id: &str) -> MemberProfile {
        MemberProfile {
            member_id: id.to_string(),
            name: format!("Member {}", id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_distance_to_similarity() {
        let store = Arc::new(FixedStore {
            hits: vec![
                VectorHit {
                    profile: profile("a"),
                    distance: 0.19,
                },
                VectorHit {
                    profile: profile("b"),
                    distance: 1.7,
                },
            ],
        });
        let embedding = Arc::new(FlakyEmbedding {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });

        let search = SemanticSearch::new(embedding, store);
        let results = search
            .search("query", &SearchFilter::default(), 10)
            .await
            .unwrap();

        assert!((results[0].semantic_score.unwrap() - 0.81).abs() < 1e-6);
        // Distances past 1.0 clamp to zero similarity
        assert_eq!(results[1].semantic_score, Some(0.0));
        assert!(results.iter().all(|c| c.keyword_score.is_none()));
    }

    #[tokio::test]
    async fn test_transient_embedding_failure_retried_once() {
        let embedding = Arc::new(FlakyEmbedding {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let store = Arc::new(FixedStore { hits: Vec::new() });

        let search = SemanticSearch::new(embedding.clone(), store);
        let results = search
            .search("query", &SearchFilter::default(), 10)
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(embedding.calls.load(Ordering::SeqCst), 2);
    }
}
