//! Query understanding: intent classification, entity extraction and the
//! orchestrator that composes the deterministic path with the LLM fallback.

mod extractor;
mod intent;
mod llm;
mod orchestrator;

pub use extractor::{RegexExtraction, RegexExtractor};
pub use intent::{IntentClassification, IntentClassifier};
pub use llm::{ExtractionError, FallbackExtractor, LlmExtraction, LlmExtractor};
pub use orchestrator::{ContextProvider, NoContext, QueryPipeline};

use serde::{Deserialize, Serialize};

/// The caller's high-level goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FindBusiness,
    FindPeers,
    FindSpecificPerson,
    FindAlumniBusiness,
    GetInfo,
    ListMembers,
    Compare,
}

/// How the final extraction was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Regex,
    Llm,
    Hybrid,
}

/// Business turnover tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnoverTier {
    Low,
    Medium,
    High,
}

/// Structured entities extracted from a query
///
/// All string values are canonicalized before they land here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnover_tier: Option<TurnoverTier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graduation_years: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degree: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch: Vec<String>,
}

impl EntitySet {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.services.is_empty()
            && self.location.is_none()
            && self.turnover_tier.is_none()
            && self.graduation_years.is_empty()
            && self.degree.is_empty()
            && self.branch.is_empty()
    }

    /// Drop fields the given intent's template does not support
    pub fn retain_for_intent(&mut self, intent: Intent) {
        match intent {
            Intent::FindBusiness => {
                self.graduation_years.clear();
                self.degree.clear();
                self.branch.clear();
            }
            Intent::FindPeers => {
                self.services.clear();
                self.turnover_tier = None;
            }
            Intent::FindSpecificPerson => {
                self.turnover_tier = None;
            }
            // Alumni businesses, info, listing and comparison queries can
            // legitimately constrain on any field
            Intent::FindAlumniBusiness
            | Intent::GetInfo
            | Intent::ListMembers
            | Intent::Compare => {}
        }
    }
}

/// Result of understanding one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedQuery {
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_intent: Option<Intent>,
    pub entities: EntitySet,
    pub confidence: f32,
    pub method: ExtractionMethod,
    pub normalized_query: String,
}
