//! Deterministic entity extraction over the pattern library
//!
//! Pure function of the normalized query: no I/O, no failure mode beyond
//! "no match". Re-running the extractor on its own normalized input yields
//! the same result.

use crate::config::ExtractionConfig;
use crate::patterns::PatternLibrary;
use crate::query::EntitySet;
use std::sync::Arc;

/// Entities plus extraction confidence and the rules that fired
#[derive(Debug, Clone)]
pub struct RegexExtraction {
    pub entities: EntitySet,
    pub confidence: f32,
    pub matched_patterns: Vec<String>,
}

/// Regex/dictionary entity extractor
pub struct RegexExtractor {
    library: Arc<PatternLibrary>,
    cfg: ExtractionConfig,
}

impl RegexExtractor {
    pub fn new(library: Arc<PatternLibrary>, cfg: ExtractionConfig) -> Self {
        Self { library, cfg }
    }

    /// Extract entities from a normalized query
    pub fn extract(&self, normalized: &str) -> RegexExtraction {
        let mut entities = EntitySet::default();
        let mut matched_patterns = Vec::new();
        let mut confidence = 0.0_f32;

        let years = self.library.extract_years(normalized, self.cfg.year_pivot);
        if !years.years.is_empty() {
            entities.graduation_years = years.years;
            matched_patterns.extend(years.patterns.iter().map(|p| p.to_string()));
            confidence += self.cfg.year_weight;
        }

        if let Some(location) = self.library.find_location(normalized) {
            entities.location = Some(location);
            matched_patterns.push("location_dictionary".to_string());
            confidence += self.cfg.location_weight;
        }

        let branches = self.library.find_branches(normalized);
        let degrees = self.library.find_degrees(normalized);
        if !branches.is_empty() || !degrees.is_empty() {
            // Degree and branch share one precision slot
            confidence += self.cfg.degree_branch_weight;
        }
        if !branches.is_empty() {
            entities.branch = branches;
            matched_patterns.push("branch_dictionary".to_string());
        }
        if !degrees.is_empty() {
            entities.degree = degrees;
            matched_patterns.push("degree_dictionary".to_string());
        }

        let (skills, services) = self.library.find_skills(normalized);
        if !skills.is_empty() || !services.is_empty() {
            confidence += self.cfg.skill_weight;
        }
        if !skills.is_empty() {
            entities.skills = skills;
            matched_patterns.push("skill_phrase".to_string());
        }
        if !services.is_empty() {
            entities.services = services;
            matched_patterns.push("service_phrase".to_string());
        }

        if let Some(tier) = self.library.find_turnover(normalized) {
            // Tier keywords are too loose to count toward confidence
            entities.turnover_tier = Some(tier);
            matched_patterns.push("turnover_tier".to_string());
        }

        RegexExtraction {
            entities,
            confidence: confidence.min(1.0),
            matched_patterns,
        }
    }
}
