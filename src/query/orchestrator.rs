//! Query understanding orchestrator
//!
//! Composes the intent classifier and regex extractor, and gates the LLM
//! fallback on regex confidence. Fallback failures are absorbed here: a
//! timeout or unparseable payload downgrades the result to regex-only, it
//! never propagates to the caller.

use crate::config::ExtractionConfig;
use crate::patterns::normalize;
use crate::query::{
    EntitySet, ExtractedQuery, ExtractionMethod, FallbackExtractor, IntentClassification,
    IntentClassifier, LlmExtraction, RegexExtraction, RegexExtractor,
};
use std::sync::Arc;

/// Supplies conversational context for a caller; implemented by the
/// session store and injected at startup, so there is no runtime coupling
/// between the understanding pipeline and session management.
pub trait ContextProvider: Send + Sync {
    fn context_for(&self, caller_id: &str) -> String;
}

/// Context provider with no memory, for wiring the pipeline standalone
pub struct NoContext;

impl ContextProvider for NoContext {
    fn context_for(&self, _caller_id: &str) -> String {
        String::new()
    }
}

/// The understanding pipeline: classify, extract, optionally fall back
pub struct QueryPipeline {
    classifier: IntentClassifier,
    extractor: RegexExtractor,
    fallback: Option<Arc<dyn FallbackExtractor>>,
    context: Arc<dyn ContextProvider>,
    cfg: ExtractionConfig,
}

impl QueryPipeline {
    pub fn new(
        classifier: IntentClassifier,
        extractor: RegexExtractor,
        fallback: Option<Arc<dyn FallbackExtractor>>,
        context: Arc<dyn ContextProvider>,
        cfg: ExtractionConfig,
    ) -> Self {
        Self {
            classifier,
            extractor,
            fallback,
            context,
            cfg,
        }
    }

    /// Turn a raw query from a caller into a structured extraction
    pub async fn understand(&self, query: &str, caller_id: &str) -> ExtractedQuery {
        let normalized = normalize(query);

        // Both are pure and share nothing; run them concurrently
        let (classification, regex) = tokio::join!(
            async { self.classifier.classify(&normalized) },
            async { self.extractor.extract(&normalized) },
        );

        if regex.confidence >= self.cfg.llm_fallback_threshold {
            tracing::debug!(
                confidence = regex.confidence,
                patterns = ?regex.matched_patterns,
                "Fast path, skipping LLM fallback"
            );
            return self.finish(
                classification,
                regex.entities,
                regex.confidence,
                ExtractionMethod::Regex,
                normalized,
            );
        }

        let Some(fallback) = &self.fallback else {
            return self.finish(
                classification,
                regex.entities,
                regex.confidence,
                ExtractionMethod::Regex,
                normalized,
            );
        };

        // History is rendered to an owned string here; no session state is
        // held across the network call
        let context = self.context.context_for(caller_id);

        match fallback.extract(query, &context).await {
            Ok(llm) => self.merge(classification, regex, llm, normalized),
            Err(e) => {
                // Degradation, not an error: keep the regex result and its
                // unmodified confidence
                tracing::warn!(error = %e, "LLM fallback degraded to regex-only extraction");
                self.finish(
                    classification,
                    regex.entities,
                    regex.confidence,
                    ExtractionMethod::Regex,
                    normalized,
                )
            }
        }
    }

    fn merge(
        &self,
        classification: IntentClassification,
        regex: RegexExtraction,
        llm: LlmExtraction,
        normalized: String,
    ) -> ExtractedQuery {
        let regex_empty = regex.entities.is_empty();
        let llm_empty = llm.entities.is_empty();

        let mut llm_confidence = llm.confidence.min(self.cfg.max_llm_confidence);
        if regex_empty && llm_empty {
            // Neither extractor found anything: a genuinely ambiguous query
            llm_confidence *= self.cfg.ambiguous_discount;
        }

        let prefer_llm_scalars = llm_confidence > regex.confidence;
        let entities = merge_entities(regex.entities, &llm.entities, prefer_llm_scalars);

        let mut confidence = regex.confidence.max(llm_confidence);

        // The deterministic classifier names the intent; the model only
        // overrides when no rule matched at all. Disagreement between the
        // two costs a fixed penalty.
        let mut classification = classification;
        match llm.intent {
            Some(llm_intent) if !classification.rule_matched => {
                classification.primary = llm_intent;
            }
            Some(llm_intent) if llm_intent != classification.primary => {
                confidence = (confidence - self.cfg.intent_disagreement_penalty).max(0.0);
            }
            _ => {}
        }

        let method = match (regex_empty, llm_empty) {
            (true, false) => ExtractionMethod::Llm,
            (false, true) | (true, true) => ExtractionMethod::Regex,
            (false, false) => ExtractionMethod::Hybrid,
        };

        tracing::debug!(method = ?method, confidence, "Merged fallback extraction");

        self.finish(classification, entities, confidence, method, normalized)
    }

    fn finish(
        &self,
        classification: IntentClassification,
        mut entities: EntitySet,
        confidence: f32,
        method: ExtractionMethod,
        normalized_query: String,
    ) -> ExtractedQuery {
        entities.retain_for_intent(classification.primary);

        ExtractedQuery {
            intent: classification.primary,
            secondary_intent: classification.secondary,
            entities,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            normalized_query,
        }
    }
}

fn union(into: &mut Vec<String>, from: &[String]) {
    for value in from {
        if !into.contains(value) {
            into.push(value.clone());
        }
    }
}

/// Per-field merge: LLM values fill gaps, array fields union, scalar fields
/// follow the higher-confidence source.
fn merge_entities(mut base: EntitySet, llm: &EntitySet, prefer_llm_scalars: bool) -> EntitySet {
    union(&mut base.skills, &llm.skills);
    union(&mut base.services, &llm.services);
    union(&mut base.degree, &llm.degree);
    union(&mut base.branch, &llm.branch);

    for year in &llm.graduation_years {
        if !base.graduation_years.contains(year) {
            base.graduation_years.push(*year);
        }
    }
    base.graduation_years.sort_unstable();

    base.location = match (base.location.take(), llm.location.clone()) {
        (None, llm_loc) => llm_loc,
        (regex_loc, None) => regex_loc,
        (Some(regex_loc), Some(llm_loc)) => {
            Some(if prefer_llm_scalars { llm_loc } else { regex_loc })
        }
    };

    base.turnover_tier = match (base.turnover_tier.take(), llm.turnover_tier) {
        (None, tier) => tier,
        (tier, None) => tier,
        (Some(regex_tier), Some(llm_tier)) => {
            Some(if prefer_llm_scalars { llm_tier } else { regex_tier })
        }
    };

    base
}
