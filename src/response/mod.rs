//! Intent-aware response formatting
//!
//! Pure templating over ranked results: no network, no LLM. Business
//! intents lead with the organization, peer intents with batch and branch.
//! Empty and low-confidence outcomes get clarification prose instead of a
//! bare empty list.

use crate::query::{ExtractedQuery, Intent, TurnoverTier};
use crate::search::RankedResult;
use std::collections::BTreeSet;

pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Render one page of results for the extracted intent
    pub fn format(&self, results: &[RankedResult], extracted: &ExtractedQuery) -> String {
        if results.is_empty() {
            return self.no_results(extracted);
        }

        let mut out = String::new();
        out.push_str(&self.header(results.len(), extracted.intent));
        out.push('\n');

        for (i, result) in results.iter().enumerate() {
            out.push('\n');
            out.push_str(&format!("{}. {}", i + 1, self.entry(result, extracted.intent)));
        }

        let matched = Self::matched_on(results);
        if !matched.is_empty() {
            out.push_str(&format!("\n\nMatched on: {}.", matched));
        }

        out
    }

    /// Clarification prose for queries below the confidence floor
    pub fn clarification(&self, extracted: &ExtractedQuery) -> String {
        if extracted.entities.is_empty() {
            "I couldn't quite work out what to search for. Try mentioning a batch year, \
             branch, city or service, e.g. \"1995 batch mechanical in Chennai\" or \
             \"caterers in Madurai\"."
                .to_string()
        } else {
            format!(
                "I'm not fully sure what you meant, though I picked up {}. Could you \
                 rephrase with a bit more detail?",
                Self::describe_entities(extracted)
            )
        }
    }

    fn header(&self, count: usize, intent: Intent) -> String {
        let noun = match intent {
            Intent::FindBusiness | Intent::FindAlumniBusiness => {
                if count == 1 {
                    "business"
                } else {
                    "businesses"
                }
            }
            Intent::FindPeers => {
                if count == 1 {
                    "batchmate"
                } else {
                    "batchmates"
                }
            }
            _ => {
                if count == 1 {
                    "member"
                } else {
                    "members"
                }
            }
        };
        format!("Found {} {}:", count, noun)
    }

    fn entry(&self, result: &RankedResult, intent: Intent) -> String {
        let p = &result.profile;
        match intent {
            Intent::FindBusiness | Intent::FindAlumniBusiness | Intent::Compare => {
                let mut line = p.name.clone();
                if let Some(org) = &p.organization {
                    line.push_str(&format!(" - {}", org));
                }
                let offerings: Vec<&str> = p
                    .services
                    .iter()
                    .chain(p.skills.iter())
                    .map(|s| s.as_str())
                    .collect();
                if !offerings.is_empty() {
                    line.push_str(&format!("\n   Services: {}", offerings.join(", ")));
                }
                if let Some(location) = &p.location {
                    line.push_str(&format!("\n   Location: {}", location));
                }
                if let Some(tier) = p.turnover_tier {
                    line.push_str(&format!("\n   Turnover: {}", tier_label(tier)));
                }
                if let Some(phone) = &p.phone {
                    line.push_str(&format!("\n   Contact: {}", phone));
                }
                line
            }
            Intent::FindPeers => {
                let mut line = p.name.clone();
                let mut tags = Vec::new();
                if let Some(year) = p.graduation_year {
                    tags.push(format!("{} batch", year));
                }
                if let Some(branch) = &p.branch {
                    tags.push(branch.clone());
                }
                if !tags.is_empty() {
                    line.push_str(&format!(" ({})", tags.join(", ")));
                }
                match (&p.designation, &p.organization) {
                    (Some(role), Some(org)) => {
                        line.push_str(&format!("\n   {} at {}", role, org));
                    }
                    (Some(role), None) => line.push_str(&format!("\n   {}", role)),
                    (None, Some(org)) => line.push_str(&format!("\n   At {}", org)),
                    (None, None) => {}
                }
                if let Some(phone) = &p.phone {
                    line.push_str(&format!("\n   Contact: {}", phone));
                }
                line
            }
            _ => {
                let mut line = p.name.clone();
                let mut details = Vec::new();
                if let Some(year) = p.graduation_year {
                    details.push(format!("{} batch", year));
                }
                if let Some(branch) = &p.branch {
                    details.push(branch.clone());
                }
                if let Some(org) = &p.organization {
                    details.push(org.clone());
                }
                if let Some(location) = &p.location {
                    details.push(location.clone());
                }
                if !details.is_empty() {
                    line.push_str(&format!(" - {}", details.join(", ")));
                }
                if let Some(phone) = &p.phone {
                    line.push_str(&format!("\n   Contact: {}", phone));
                }
                line
            }
        }
    }

    fn matched_on(results: &[RankedResult]) -> String {
        let fields: BTreeSet<&str> = results
            .iter()
            .flat_map(|r| r.matched_fields.iter().map(|f| f.as_str()))
            .collect();
        fields.into_iter().collect::<Vec<_>>().join(", ")
    }

    fn no_results(&self, extracted: &ExtractedQuery) -> String {
        if extracted.entities.is_empty() {
            "No members matched. Try adding something specific, like a batch year, a \
             branch, a city or a service."
                .to_string()
        } else {
            format!(
                "No members matched {}. Try relaxing one of those, or check the spelling \
                 of names and places.",
                Self::describe_entities(extracted)
            )
        }
    }

    fn describe_entities(extracted: &ExtractedQuery) -> String {
        let e = &extracted.entities;
        let mut parts = Vec::new();
        if !e.graduation_years.is_empty() {
            let years: Vec<String> = e.graduation_years.iter().map(|y| y.to_string()).collect();
            parts.push(format!("batch {}", years.join("/")));
        }
        if !e.branch.is_empty() {
            parts.push(e.branch.join("/"));
        }
        if !e.degree.is_empty() {
            parts.push(e.degree.join("/"));
        }
        if !e.skills.is_empty() || !e.services.is_empty() {
            let offerings: Vec<&str> = e
                .services
                .iter()
                .chain(e.skills.iter())
                .map(|s| s.as_str())
                .collect();
            parts.push(format!("\"{}\"", offerings.join("\", \"")));
        }
        if let Some(location) = &e.location {
            parts.push(format!("in {}", location));
        }
        if let Some(tier) = e.turnover_tier {
            parts.push(format!("{} turnover", tier_label(tier)));
        }
        parts.join(", ")
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn tier_label(tier: TurnoverTier) -> &'static str {
    match tier {
        TurnoverTier::Low => "low",
        TurnoverTier::Medium => "medium",
        TurnoverTier::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EntitySet, ExtractionMethod};
    use crate::search::MemberProfile;

    fn extracted(intent: Intent, entities: EntitySet) -> ExtractedQuery {
        ExtractedQuery {
            intent,
            secondary_intent: None,
            entities,
            confidence: 0.8,
            method: ExtractionMethod::Regex,
            normalized_query: String::new(),
        }
    }

    fn ranked(profile: MemberProfile, fields: &[&str]) -> RankedResult {
        RankedResult {
            member_id: profile.member_id.clone(),
            profile,
            final_score: 0.9,
            matched_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_business_template() {
        let profile = MemberProfile {
            member_id: "m1".to_string(),
            name: "Ravi Kumar".to_string(),
            organization: Some("Kumar Web Solutions".to_string()),
            services: vec!["web development".to_string()],
            location: Some("Chennai".to_string()),
            turnover_tier: Some(TurnoverTier::Medium),
            phone: Some("+911234567890".to_string()),
            ..Default::default()
        };
        let results = vec![ranked(profile, &["location", "services"])];
        let query = extracted(Intent::FindBusiness, EntitySet::default());

        let text = ResponseFormatter::new().format(&results, &query);
        assert!(text.contains("Found 1 business:"));
        assert!(text.contains("Ravi Kumar - Kumar Web Solutions"));
        assert!(text.contains("Services: web development"));
        assert!(text.contains("Location: Chennai"));
        assert!(text.contains("Turnover: medium"));
        assert!(text.contains("Contact: +911234567890"));
        assert!(text.contains("Matched on: location, services."));
    }

    #[test]
    fn test_peer_template() {
        let profile = MemberProfile {
            member_id: "m2".to_string(),
            name: "Anand S".to_string(),
            graduation_year: Some(1995),
            branch: Some("Mechanical".to_string()),
            designation: Some("Plant Head".to_string()),
            organization: Some("Ashok Leyland".to_string()),
            ..Default::default()
        };
        let results = vec![ranked(profile, &["branch", "graduation year"])];
        let query = extracted(Intent::FindPeers, EntitySet::default());

        let text = ResponseFormatter::new().format(&results, &query);
        assert!(text.contains("Found 1 batchmate:"));
        assert!(text.contains("Anand S (1995 batch, Mechanical)"));
        assert!(text.contains("Plant Head at Ashok Leyland"));
        assert!(text.contains("Matched on: branch, graduation year."));
    }

    #[test]
    fn test_default_template() {
        let profile = MemberProfile {
            member_id: "m3".to_string(),
            name: "Priya R".to_string(),
            location: Some("Coimbatore".to_string()),
            ..Default::default()
        };
        let results = vec![ranked(profile, &[])];
        let query = extracted(Intent::ListMembers, EntitySet::default());

        let text = ResponseFormatter::new().format(&results, &query);
        assert!(text.contains("Found 1 member:"));
        assert!(text.contains("Priya R - Coimbatore"));
        // Nothing matched on: no clause
        assert!(!text.contains("Matched on:"));
    }

    #[test]
    fn test_empty_results_with_entities() {
        let entities = EntitySet {
            graduation_years: vec![1995],
            branch: vec!["Mechanical".to_string()],
            location: Some("Chennai".to_string()),
            ..Default::default()
        };
        let query = extracted(Intent::FindPeers, entities);

        let text = ResponseFormatter::new().format(&[], &query);
        assert!(text.contains("No members matched"));
        assert!(text.contains("batch 1995"));
        assert!(text.contains("Mechanical"));
        assert!(text.contains("in Chennai"));
    }

    #[test]
    fn test_empty_results_without_entities() {
        let query = extracted(Intent::ListMembers, EntitySet::default());
        let text = ResponseFormatter::new().format(&[], &query);
        assert!(text.contains("Try adding something specific"));
    }

    #[test]
    fn test_clarification_variants() {
        let formatter = ResponseFormatter::new();

        let vague = extracted(Intent::ListMembers, EntitySet::default());
        assert!(formatter.clarification(&vague).contains("batch year"));

        let partial = extracted(
            Intent::FindBusiness,
            EntitySet {
                services: vec!["catering".to_string()],
                ..Default::default()
            },
        );
        let text = formatter.clarification(&partial);
        assert!(text.contains("catering"));
        assert!(text.contains("rephrase"));
    }
}
