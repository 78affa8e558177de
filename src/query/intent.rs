//! Keyword rule groups for intent classification
//!
//! Pure and deterministic: the only "failure" is low confidence, which
//! callers handle, not an error.

use crate::config::ExtractionConfig;
use crate::query::Intent;

/// Classified intent with an ambiguity-aware confidence
#[derive(Debug, Clone, PartialEq)]
pub struct IntentClassification {
    pub primary: Intent,
    pub secondary: Option<Intent>,
    pub confidence: f32,
    /// False when no rule group matched and the default intent was assumed
    pub rule_matched: bool,
}

struct RuleGroup {
    intent: Intent,
    terms: &'static [&'static str],
}

/// Ordered rule groups; more specific intents come first so that equal
/// match counts break toward them.
const RULE_GROUPS: &[RuleGroup] = &[
    RuleGroup {
        intent: Intent::FindAlumniBusiness,
        terms: &[
            "alumni business",
            "alumni businesses",
            "batchmate company",
            "batchmates running",
            "classmates running",
            "alumni running",
            "batchmate who runs",
            "our batch doing business",
        ],
    },
    RuleGroup {
        intent: Intent::Compare,
        terms: &["compare", " vs ", "versus", "difference between", "better of"],
    },
    RuleGroup {
        intent: Intent::FindSpecificPerson,
        terms: &[
            "contact of",
            "number of",
            "phone number",
            "details of",
            "named",
            "name is",
            "whose name",
            "reach out to",
        ],
    },
    RuleGroup {
        intent: Intent::GetInfo,
        terms: &[
            "tell me about",
            "info about",
            "information about",
            "profile of",
            "what does",
            "know more about",
        ],
    },
    RuleGroup {
        intent: Intent::FindBusiness,
        terms: &[
            "company",
            "companies",
            "business",
            "businesses",
            "provider",
            "providers",
            "services in",
            "service provider",
            "firm",
            "vendor",
            "supplier",
            "dealer",
            "shop",
            "agency",
        ],
    },
    RuleGroup {
        intent: Intent::FindPeers,
        terms: &[
            "batchmate",
            "batchmates",
            "batch mate",
            "classmate",
            "classmates",
            "passout",
            "passouts",
            "pass out",
            "passed out",
            "my batch",
            "our batch",
            "juniors",
            "seniors",
            "alumni",
            "batch",
        ],
    },
    RuleGroup {
        intent: Intent::ListMembers,
        terms: &["list", "show all", "all members", "everyone", "every member"],
    },
];

/// Classifies a normalized query into a primary and optional secondary intent
pub struct IntentClassifier {
    matched_confidence: f32,
    ambiguous_confidence: f32,
    default_confidence: f32,
}

impl IntentClassifier {
    pub fn new(cfg: &ExtractionConfig) -> Self {
        Self {
            matched_confidence: cfg.matched_intent_confidence,
            ambiguous_confidence: cfg.ambiguous_intent_confidence,
            default_confidence: cfg.default_intent_confidence,
        }
    }

    /// Classify a normalized query. Target latency is well under a
    /// millisecond; this is substring scanning over a few dozen terms.
    pub fn classify(&self, normalized: &str) -> IntentClassification {
        let padded = format!(" {} ", normalized);

        let mut matches: Vec<(usize, Intent)> = Vec::new();
        for group in RULE_GROUPS {
            let count = group
                .terms
                .iter()
                .filter(|term| {
                    if term.starts_with(' ') {
                        // Terms with embedded spacing match as-is
                        padded.contains(*term)
                    } else {
                        padded.contains(&format!(" {} ", term))
                    }
                })
                .count();
            if count > 0 {
                matches.push((count, group.intent));
            }
        }

        match matches.len() {
            0 => IntentClassification {
                primary: Intent::ListMembers,
                secondary: None,
                confidence: self.default_confidence,
                rule_matched: false,
            },
            1 => IntentClassification {
                primary: matches[0].1,
                secondary: None,
                confidence: self.matched_confidence,
                rule_matched: true,
            },
            _ => {
                // Primary is the group with the most matched terms; rule
                // order breaks ties. Ambiguity is signalled, not hidden.
                matches.sort_by(|a, b| b.0.cmp(&a.0));
                IntentClassification {
                    primary: matches[0].1,
                    secondary: Some(matches[1].1),
                    confidence: self.ambiguous_confidence,
                    rule_matched: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::normalize;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(&ExtractionConfig::default())
    }

    #[test]
    fn test_peer_intent() {
        let c = classifier().classify(&normalize("1995 batch mechanical"));
        assert_eq!(c.primary, Intent::FindPeers);
        assert!(c.secondary.is_none());
        assert!(c.confidence >= 0.7);
    }

    #[test]
    fn test_business_intent() {
        let c = classifier().classify(&normalize("find web development company in Chennai"));
        assert_eq!(c.primary, Intent::FindBusiness);
    }

    #[test]
    fn test_default_intent() {
        let c = classifier().classify(&normalize("hmm maybe chennai"));
        assert_eq!(c.primary, Intent::ListMembers);
        assert!((c.confidence - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ambiguous_intent_scaled_down() {
        // Both peer and business vocabulary present
        let c = classifier().classify(&normalize("batchmates with companies"));
        assert!(c.secondary.is_some());
        assert!((c.confidence - 0.6).abs() < f32::EPSILON);

        let intents = [Some(c.primary), c.secondary];
        assert!(intents.contains(&Some(Intent::FindPeers)));
        assert!(intents.contains(&Some(Intent::FindBusiness)));
    }

    #[test]
    fn test_more_matches_wins_primary() {
        // Two peer terms vs one business term
        let c = classifier().classify(&normalize("batchmates who passed out with a company"));
        assert_eq!(c.primary, Intent::FindPeers);
        assert_eq!(c.secondary, Some(Intent::FindBusiness));
    }

    #[test]
    fn test_specific_person() {
        let c = classifier().classify(&normalize("contact of the treasurer"));
        assert_eq!(c.primary, Intent::FindSpecificPerson);
    }

    #[test]
    fn test_list_members() {
        let c = classifier().classify(&normalize("show all members from Salem"));
        assert_eq!(c.primary, Intent::ListMembers);
    }

    #[test]
    fn test_compare() {
        let c = classifier().classify(&normalize("compare caterers in Madurai"));
        // "compare" and business vocab can both fire; compare must win ties
        assert!(c.primary == Intent::Compare || c.secondary == Some(Intent::Compare));
    }
}
