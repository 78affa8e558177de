//! Keyword retrieval branch
//!
//! Ranked full-text search over the indexed member text, normalized so the
//! best lexical hit scores 1.0. Filter-only matches (no lexical hit) carry a
//! zero score and are kept only when the filter actually restricts something.

use crate::providers::MemberStore;
use crate::search::{CandidateMatch, SearchError, SearchFilter};
use std::sync::Arc;

pub struct KeywordSearch {
    store: Arc<dyn MemberStore>,
}

impl KeywordSearch {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    /// Top-`limit` members by lexical rank, restricted by the filter
    pub async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<CandidateMatch>, SearchError> {
        let hits = self
            .store
            .text_search(text, filter, limit)
            .await
            .map_err(SearchError::Store)?;

        let max_rank = hits.iter().map(|h| h.rank).fold(0.0_f32, f32::max);
        let restricted = filter.restricted_fields();

        Ok(hits
            .into_iter()
            .filter(|hit| hit.rank > 0.0 || !filter.is_empty())
            .map(|hit| {
                let score = if max_rank > 0.0 {
                    (hit.rank / max_rank).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let mut matched_fields = restricted.clone();
                matched_fields.extend(hit.matched_fields.iter().cloned());
                CandidateMatch {
                    profile: hit.profile,
                    semantic_score: None,
                    keyword_score: Some(score),
                    matched_fields,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, TextHit, VectorHit};
    use crate::search::MemberProfile;
    use async_trait::async_trait;

    struct FixedStore {
        hits: Vec<TextHit>,
    }

    #[async_trait]
    impl MemberStore for FixedStore {
        async fn vector_search(
            &self,
            _embedding: &[f32],
            _filter: &SearchFilter,
            _limit: usize,
        ) -> Result<Vec<VectorHit>, ProviderError> {
            Ok(Vec::new())
        }

        async fn text_search(
            &self,
            _query: &str,
            _filter: &SearchFilter,
            _limit: usize,
        ) -> Result<Vec<TextHit>, ProviderError> {
            Ok(self.hits.clone())
        }
    }

    fn hit(id: &str, rank: f32, fields: &[&str]) -> TextHit {
        TextHit {
            profile: MemberProfile {
                member_id: id.to_string(),
                name: format!("Member {}", id),
                ..Default::default()
            },
            rank,
            matched_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_rank_normalized_by_maximum() {
        let store = Arc::new(FixedStore {
            hits: vec![hit("a", 4.0, &["name"]), hit("b", 1.0, &["skills"])],
        });

        let results = KeywordSearch::new(store)
            .search("query", &SearchFilter::default(), 10)
            .await
            .unwrap();

        assert_eq!(results[0].keyword_score, Some(1.0));
        assert_eq!(results[1].keyword_score, Some(0.25));
        assert!(results[0].matched_fields.contains("name"));
    }

    #[tokio::test]
    async fn test_filter_only_matches_dropped_without_filter() {
        let store = Arc::new(FixedStore {
            hits: vec![hit("a", 0.0, &[])],
        });

        let results = KeywordSearch::new(store)
            .search("query", &SearchFilter::default(), 10)
            .await
            .unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_filter_only_matches_kept_with_filter() {
        let store = Arc::new(FixedStore {
            hits: vec![hit("a", 0.0, &[])],
        });
        let filter = SearchFilter {
            location: Some("Chennai".to_string()),
            ..Default::default()
        };

        let results = KeywordSearch::new(store)
            .search("query", &filter, 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].keyword_score, Some(0.0));
        assert!(results[0].matched_fields.contains("location"));
    }
}
