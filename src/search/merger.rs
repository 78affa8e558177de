//! Result merger and ranker
//!
//! Runs both retrieval branches concurrently under a joint deadline, merges
//! candidates by member identity into one weighted score, orders them
//! deterministically and paginates strictly after sorting. A single failed
//! branch is absorbed with a warning; only both branches failing surfaces.

use crate::config::SearchConfig;
use crate::search::{
    CandidateMatch, KeywordSearch, RankedResult, SearchError, SearchFilter, SearchPage,
    SemanticSearch,
};
use ahash::AHashMap;
use std::time::Duration;

pub struct HybridSearch {
    semantic: SemanticSearch,
    keyword: KeywordSearch,
    cfg: SearchConfig,
}

impl HybridSearch {
    pub fn new(semantic: SemanticSearch, keyword: KeywordSearch, cfg: SearchConfig) -> Self {
        Self {
            semantic,
            keyword,
            cfg,
        }
    }

    /// Run both branches and return one page of merged results.
    /// `page` is 1-based.
    pub async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage, SearchError> {
        let page = page.max(1);
        let offset = (page - 1) * page_size;
        // Overfetch so deduplication and pagination never starve a page
        let fetch_limit = (offset + page_size) * self.cfg.candidate_multiplier;
        let deadline = Duration::from_secs(self.cfg.branch_deadline_secs);

        let (semantic, keyword) = tokio::join!(
            tokio::time::timeout(deadline, self.semantic.search(text, filter, fetch_limit)),
            tokio::time::timeout(deadline, self.keyword.search(text, filter, fetch_limit)),
        );

        let semantic = resolve_branch("semantic", semantic, deadline);
        let keyword = resolve_branch("keyword", keyword, deadline);

        let (semantic, keyword) = match (semantic, keyword) {
            (None, None) => return Err(SearchError::AllBranchesFailed),
            (s, k) => (s.unwrap_or_default(), k.unwrap_or_default()),
        };

        let merged = self.merge(semantic, keyword);
        let total_results = merged.len();
        let total_pages = total_results.div_ceil(page_size);

        let results = merged
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect::<Vec<_>>();

        tracing::debug!(
            total_results,
            page,
            returned = results.len(),
            "Merged retrieval branches"
        );

        Ok(SearchPage {
            results,
            page,
            total_pages,
            total_results,
        })
    }

    /// Merge candidates by member id, weight the scores, order totally
    fn merge(
        &self,
        semantic: Vec<CandidateMatch>,
        keyword: Vec<CandidateMatch>,
    ) -> Vec<RankedResult> {
        let mut by_member: AHashMap<String, CandidateMatch> = AHashMap::new();

        for candidate in semantic.into_iter().chain(keyword) {
            match by_member.get_mut(&candidate.profile.member_id) {
                Some(existing) => {
                    if existing.semantic_score.is_none() {
                        existing.semantic_score = candidate.semantic_score;
                    }
                    if existing.keyword_score.is_none() {
                        existing.keyword_score = candidate.keyword_score;
                    }
                    existing
                        .matched_fields
                        .extend(candidate.matched_fields.into_iter());
                }
                None => {
                    by_member.insert(candidate.profile.member_id.clone(), candidate);
                }
            }
        }

        let mut ranked: Vec<RankedResult> = by_member
            .into_values()
            .map(|candidate| {
                // One-sided candidates keep their raw score: the missing
                // branch must not bleed weight away
                let final_score = match (candidate.semantic_score, candidate.keyword_score) {
                    (Some(s), Some(k)) => {
                        self.cfg.semantic_weight * s + self.cfg.keyword_weight * k
                    }
                    (Some(s), None) => s,
                    (None, Some(k)) => k,
                    (None, None) => 0.0,
                };
                RankedResult {
                    member_id: candidate.profile.member_id.clone(),
                    profile: candidate.profile,
                    final_score: final_score.clamp(0.0, 1.0),
                    matched_fields: candidate.matched_fields,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.member_id.cmp(&b.member_id))
        });

        ranked
    }
}

fn resolve_branch(
    branch: &'static str,
    outcome: Result<Result<Vec<CandidateMatch>, SearchError>, tokio::time::error::Elapsed>,
    deadline: Duration,
) -> Option<Vec<CandidateMatch>> {
    match outcome {
        Ok(Ok(candidates)) => Some(candidates),
        Ok(Err(e)) => {
            tracing::warn!(branch, error = %e, "Retrieval branch failed, continuing without it");
            None
        }
        Err(_) => {
            tracing::warn!(branch, ?deadline, "Retrieval branch missed the deadline");
            None
        }
    }
}
