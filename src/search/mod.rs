//! Hybrid member search: semantic and keyword retrieval run concurrently
//! and merge into one deterministically ordered, paginated result list.

mod keyword;
mod merger;
mod semantic;

pub use keyword::KeywordSearch;
pub use merger::HybridSearch;
pub use semantic::SemanticSearch;

use crate::query::{EntitySet, TurnoverTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    Embedding(#[source] crate::providers::ProviderError),

    #[error("Member store query failed: {0}")]
    Store(#[source] crate::providers::ProviderError),

    #[error("Both retrieval branches failed")]
    AllBranchesFailed,
}

/// A member profile as stored in the directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnover_tier: Option<TurnoverTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Deterministic projection of an entity set into store predicates.
/// Built once per request, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graduation_years: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degree: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnover_tier: Option<TurnoverTier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

impl SearchFilter {
    pub fn from_entities(entities: &EntitySet) -> Self {
        Self {
            location: entities.location.clone(),
            graduation_years: entities.graduation_years.clone(),
            degree: entities.degree.clone(),
            branch: entities.branch.clone(),
            turnover_tier: entities.turnover_tier,
            skills: entities.skills.clone(),
            services: entities.services.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.graduation_years.is_empty()
            && self.degree.is_empty()
            && self.branch.is_empty()
            && self.turnover_tier.is_none()
            && self.skills.is_empty()
            && self.services.is_empty()
    }

    /// Field names this filter restricts on, for "matched on" reporting
    pub fn restricted_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        if self.location.is_some() {
            fields.insert("location".to_string());
        }
        if !self.graduation_years.is_empty() {
            fields.insert("graduation year".to_string());
        }
        if !self.degree.is_empty() {
            fields.insert("degree".to_string());
        }
        if !self.branch.is_empty() {
            fields.insert("branch".to_string());
        }
        if self.turnover_tier.is_some() {
            fields.insert("turnover tier".to_string());
        }
        if !self.skills.is_empty() {
            fields.insert("skills".to_string());
        }
        if !self.services.is_empty() {
            fields.insert("services".to_string());
        }
        fields
    }
}

/// A member produced by one retrieval branch before the merge.
/// At most one of the two scores is set.
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    pub profile: MemberProfile,
    pub semantic_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub matched_fields: BTreeSet<String>,
}

/// One merged, scored member; ordered by `(final_score desc, member_id asc)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub member_id: String,
    pub profile: MemberProfile,
    pub final_score: f32,
    pub matched_fields: BTreeSet<String>,
}

/// One page of ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<RankedResult>,
    pub page: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

impl SearchPage {
    pub fn empty(page: usize) -> Self {
        Self {
            results: Vec::new(),
            page,
            total_pages: 0,
            total_results: 0,
        }
    }
}
