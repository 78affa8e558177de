//! LLM fallback extraction
//!
//! Invoked only for queries the deterministic extractor is unsure about.
//! The model's output is parsed into a strict schema, canonicalized through
//! the same pattern library as the regex path, and never trusted blindly:
//! malformed JSON gets exactly one repair retry, then the caller falls back
//! to the regex-only result.

use crate::config::LlmConfig;
use crate::patterns::PatternLibrary;
use crate::providers::{CompletionClient, ProviderError};
use crate::query::{EntitySet, Intent, TurnoverTier};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Completion call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion call failed: {0}")]
    Completion(#[from] ProviderError),

    #[error("Model returned malformed payload: {0}")]
    MalformedResponse(String),
}

/// Entities as reported by the fallback, already canonicalized
#[derive(Debug, Clone)]
pub struct LlmExtraction {
    pub intent: Option<Intent>,
    pub entities: EntitySet,
    pub confidence: f32,
}

/// Abstract fallback extractor; the orchestrator depends on this, not on a
/// concrete LLM client, so tests can wire a deterministic stand-in.
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    async fn extract(&self, query: &str, context: &str) -> Result<LlmExtraction, ExtractionError>;
}

/// Raw model payload, loosely typed on purpose; canonicalization happens
/// after parsing
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    turnover_tier: Option<String>,
    #[serde(default)]
    graduation_years: Vec<i32>,
    #[serde(default)]
    degree: Vec<String>,
    #[serde(default)]
    branch: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

const INSTRUCTION: &str = r#"You extract search filters from queries sent to a community member directory.
Return ONLY a JSON object with these fields (omit fields that do not apply):
  "intent": one of "find_business", "find_peers", "find_specific_person", "find_alumni_business", "get_info", "list_members", "compare"
  "skills": list of skill phrases
  "services": list of service phrases a business offers
  "location": city name
  "turnover_tier": "low", "medium" or "high"
  "graduation_years": list of 4-digit years
  "degree": list of degrees (BE, BTech, MBA, ...)
  "branch": list of engineering branches
  "confidence": number between 0 and 1

Examples:
Q: 1995 batch mechanical in Chennai
A: {"intent":"find_peers","graduation_years":[1995],"branch":["Mechanical"],"location":"Chennai","confidence":0.9}
Q: anyone doing interiors near bangalore
A: {"intent":"find_business","services":["interior design"],"location":"Bengaluru","confidence":0.8}
Q: need a CA for filing returns
A: {"intent":"find_business","services":["accounting"],"confidence":0.8}
Q: classmates of the 02 passout batch settled abroad
A: {"intent":"find_peers","graduation_years":[2002],"confidence":0.7}
Q: who are they?
A: {"intent":"get_info","confidence":0.4}
"#;

/// Completion-backed fallback extractor
pub struct LlmExtractor {
    client: Arc<dyn CompletionClient>,
    library: Arc<PatternLibrary>,
    cfg: LlmConfig,
}

impl LlmExtractor {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        library: Arc<PatternLibrary>,
        cfg: LlmConfig,
    ) -> Self {
        Self {
            client,
            library,
            cfg,
        }
    }

    fn build_prompt(&self, query: &str, context: &str) -> String {
        let mut prompt = String::from(INSTRUCTION);
        if !context.is_empty() {
            prompt.push_str("\nRecent conversation:\n");
            prompt.push_str(context);
            prompt.push('\n');
        }
        prompt.push_str("\nQ: ");
        prompt.push_str(query);
        prompt.push_str("\nA:");
        prompt
    }

    /// Pull the JSON object out of a completion that may carry code fences
    /// or prose around it
    fn json_body(raw: &str) -> Option<&str> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end < start {
            return None;
        }
        Some(&raw[start..=end])
    }

    fn parse_intent(raw: &str) -> Option<Intent> {
        match raw.trim().to_lowercase().as_str() {
            "find_business" => Some(Intent::FindBusiness),
            "find_peers" => Some(Intent::FindPeers),
            "find_specific_person" => Some(Intent::FindSpecificPerson),
            "find_alumni_business" => Some(Intent::FindAlumniBusiness),
            "get_info" => Some(Intent::GetInfo),
            "list_members" => Some(Intent::ListMembers),
            "compare" => Some(Intent::Compare),
            _ => None,
        }
    }

    fn parse_tier(raw: &str) -> Option<TurnoverTier> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(TurnoverTier::Low),
            "medium" => Some(TurnoverTier::Medium),
            "high" => Some(TurnoverTier::High),
            _ => None,
        }
    }

    fn title_case(raw: &str) -> String {
        raw.split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse and canonicalize one completion payload
    fn parse_payload(&self, raw: &str) -> Result<LlmExtraction, ExtractionError> {
        let body = Self::json_body(raw)
            .ok_or_else(|| ExtractionError::MalformedResponse("no JSON object found".into()))?;
        let parsed: RawExtraction = serde_json::from_str(body)
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let mut entities = EntitySet::default();

        for raw_skill in parsed.skills.iter().chain(parsed.services.iter()) {
            let (canonical, service) = self.library.canonical_skill(raw_skill);
            if canonical.is_empty() {
                continue;
            }
            // Phrases the model put under "services" stay services even when
            // the library does not know them
            let bucket = if service || parsed.services.iter().any(|s| s == raw_skill) {
                &mut entities.services
            } else {
                &mut entities.skills
            };
            if !bucket.contains(&canonical) {
                bucket.push(canonical);
            }
        }

        if let Some(location) = parsed.location.as_deref() {
            let trimmed = location.trim();
            if !trimmed.is_empty() {
                entities.location = Some(
                    self.library
                        .canonical_city(trimmed)
                        .unwrap_or_else(|| Self::title_case(trimmed)),
                );
            }
        }

        entities.turnover_tier = parsed.turnover_tier.as_deref().and_then(Self::parse_tier);

        entities.graduation_years = parsed
            .graduation_years
            .into_iter()
            .filter(|y| (1950..=2049).contains(y))
            .collect();
        entities.graduation_years.sort_unstable();
        entities.graduation_years.dedup();

        for raw_degree in &parsed.degree {
            let canonical = self
                .library
                .canonical_degree(raw_degree)
                .unwrap_or_else(|| raw_degree.trim().to_uppercase());
            if !canonical.is_empty() && !entities.degree.contains(&canonical) {
                entities.degree.push(canonical);
            }
        }

        for raw_branch in &parsed.branch {
            let canonical = self
                .library
                .canonical_branch(raw_branch)
                .unwrap_or_else(|| Self::title_case(raw_branch));
            if !canonical.is_empty() && !entities.branch.contains(&canonical) {
                entities.branch.push(canonical);
            }
        }

        Ok(LlmExtraction {
            intent: parsed.intent.as_deref().and_then(Self::parse_intent),
            entities,
            confidence: parsed.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl FallbackExtractor for LlmExtractor {
    async fn extract(&self, query: &str, context: &str) -> Result<LlmExtraction, ExtractionError> {
        let timeout = Duration::from_secs(self.cfg.timeout_secs);
        let prompt = self.build_prompt(query, context);

        let raw = tokio::time::timeout(timeout, self.client.complete(&prompt))
            .await
            .map_err(|_| ExtractionError::Timeout(timeout))??;

        match self.parse_payload(&raw) {
            Ok(extraction) => Ok(extraction),
            Err(first_error) => {
                // One repair retry, then give up and let the caller fall
                // back to the regex-only result
                tracing::warn!(error = %first_error, "Repairing malformed extraction payload");

                let repair_prompt = format!(
                    "{}\n\nYour previous reply was not valid JSON. Return valid JSON only, no prose.",
                    prompt
                );
                let raw = tokio::time::timeout(timeout, self.client.complete(&repair_prompt))
                    .await
                    .map_err(|_| ExtractionError::Timeout(timeout))??;

                self.parse_payload(&raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        replies: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.replies[n.min(self.replies.len() - 1)].clone())
        }
    }

    fn extractor_with(replies: Vec<&str>) -> (LlmExtractor, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient {
            replies: replies.into_iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        });
        let extractor = LlmExtractor::new(
            client.clone(),
            Arc::new(PatternLibrary::builtin().unwrap()),
            LlmConfig::default(),
        );
        (extractor, client)
    }

    #[tokio::test]
    async fn test_parses_and_canonicalizes() {
        let (ex, _) = extractor_with(vec![
            r#"{"intent":"find_business","services":["web design"],"location":"bangalore","confidence":0.8}"#,
        ]);
        let result = ex.extract("web guys in blr", "").await.unwrap();
        assert_eq!(result.intent, Some(Intent::FindBusiness));
        assert_eq!(result.entities.services, vec!["web development".to_string()]);
        assert_eq!(result.entities.location, Some("Bengaluru".to_string()));
        assert!((result.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_strips_code_fences() {
        let (ex, _) = extractor_with(vec![
            "```json\n{\"intent\":\"find_peers\",\"graduation_years\":[1995]}\n```",
        ]);
        let result = ex.extract("95 batch", "").await.unwrap();
        assert_eq!(result.entities.graduation_years, vec![1995]);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_repair_retry_succeeds() {
        let (ex, client) = extractor_with(vec![
            "sorry, here is the answer you wanted",
            r#"{"intent":"find_peers","confidence":0.5}"#,
        ]);
        let result = ex.extract("anything", "").await.unwrap();
        assert_eq!(result.intent, Some(Intent::FindPeers));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_error() {
        let (ex, client) = extractor_with(vec!["not json", "still not json"]);
        let result = ex.extract("anything", "").await;
        assert!(matches!(
            result,
            Err(ExtractionError::MalformedResponse(_))
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_intent_and_bogus_years_dropped() {
        let (ex, _) = extractor_with(vec![
            r#"{"intent":"world_domination","graduation_years":[1995,123,1995],"confidence":2.5}"#,
        ]);
        let result = ex.extract("anything", "").await.unwrap();
        assert_eq!(result.intent, None);
        assert_eq!(result.entities.graduation_years, vec![1995]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_prompt_includes_context() {
        let (ex, _) = extractor_with(vec!["{}"]);
        let prompt = ex.build_prompt("who are they?", "1. \"1995 batch\" (2m ago, 4 results)");
        assert!(prompt.contains("Recent conversation:"));
        assert!(prompt.contains("1995 batch"));
        assert!(prompt.ends_with("Q: who are they?\nA:"));
    }
}
