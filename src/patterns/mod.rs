//! Pattern library for query entity extraction
//!
//! This module provides:
//! - Canonical dictionaries (cities, branches, degrees) with alias maps
//! - Curated skill/service phrase lists with synonym expansion
//! - Pre-compiled regexes for graduation years, batches and decade phrases
//!
//! Dictionaries are data: the built-in set covers the community the service
//! ships for, and a TOML file with the same shape can replace it wholesale.

use crate::error::{Result, SamparkError};
use crate::query::TurnoverTier;
use ahash::AHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dictionary entry: one canonical value plus lookup aliases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Skill or service phrase entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    /// Services describe what a business offers; skills describe a person
    #[serde(default)]
    pub service: bool,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Turnover tier keyword entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverEntry {
    pub tier: TurnoverTier,
    pub terms: Vec<String>,
}

/// Pattern dictionary file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsFile {
    pub city: Vec<DictEntry>,
    pub branch: Vec<DictEntry>,
    pub degree: Vec<DictEntry>,
    pub skill: Vec<SkillEntry>,
    pub turnover: Vec<TurnoverEntry>,
}

/// Year candidates found in a query, with the rule names that produced them
#[derive(Debug, Clone, Default)]
pub struct YearMatch {
    pub years: Vec<i32>,
    pub patterns: Vec<&'static str>,
}

/// A phrase hit inside a query
#[derive(Debug, Clone)]
pub struct PhraseHit {
    /// Canonical value from the dictionary
    pub canonical: String,
    /// Byte offset of the matched alias in the padded query
    pub position: usize,
}

struct CompiledSkill {
    canonical: String,
    service: bool,
    phrases: Vec<String>,
}

/// Pattern library with compiled regexes and normalized lookup tables
pub struct PatternLibrary {
    city_phrases: Vec<(String, String)>,
    city_lookup: AHashMap<String, String>,
    branch_phrases: Vec<(String, String)>,
    branch_lookup: AHashMap<String, String>,
    degree_phrases: Vec<(String, String)>,
    degree_lookup: AHashMap<String, String>,
    skills: Vec<CompiledSkill>,
    turnover: Vec<(TurnoverTier, Vec<String>)>,
    four_digit_year: Regex,
    two_digit_before_batch: Regex,
    two_digit_after_batch: Regex,
    decade: Regex,
}

/// Normalize a query for matching: lowercase, punctuation to spaces,
/// collapsed whitespace. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn phrase_position(text: &str, phrase: &str) -> Option<usize> {
    // Word-boundary containment over the normalized text
    let padded = format!(" {} ", text);
    let needle = format!(" {} ", phrase);
    padded.find(&needle)
}

fn alias_pairs(entries: &[DictEntry]) -> (Vec<(String, String)>, AHashMap<String, String>) {
    let mut phrases = Vec::new();
    let mut lookup = AHashMap::new();

    for entry in entries {
        let canonical = entry.name.clone();
        let mut keys = vec![normalize(&entry.name)];
        keys.extend(entry.aliases.iter().map(|a| normalize(a)));

        for key in keys {
            if key.is_empty() {
                continue;
            }
            lookup.entry(key.clone()).or_insert_with(|| canonical.clone());
            phrases.push((key, canonical.clone()));
        }
    }

    // Longest alias first, so "new delhi" wins over "delhi"
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    (phrases, lookup)
}

impl PatternLibrary {
    /// Build the library from a pattern dictionary
    pub fn new(file: PatternsFile) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| SamparkError::Config(format!("Invalid pattern '{}': {}", pattern, e)))
        };

        let (city_phrases, city_lookup) = alias_pairs(&file.city);
        let (branch_phrases, branch_lookup) = alias_pairs(&file.branch);
        let (degree_phrases, degree_lookup) = alias_pairs(&file.degree);

        let skills = file
            .skill
            .iter()
            .map(|entry| {
                let mut phrases = vec![normalize(&entry.name)];
                phrases.extend(entry.synonyms.iter().map(|s| normalize(s)));
                phrases.retain(|p| !p.is_empty());
                CompiledSkill {
                    canonical: entry.name.to_lowercase(),
                    service: entry.service,
                    phrases,
                }
            })
            .collect();

        let turnover = file
            .turnover
            .iter()
            .map(|entry| {
                (
                    entry.tier,
                    entry.terms.iter().map(|t| normalize(t)).collect(),
                )
            })
            .collect();

        Ok(Self {
            city_phrases,
            city_lookup,
            branch_phrases,
            branch_lookup,
            degree_phrases,
            degree_lookup,
            skills,
            turnover,
            four_digit_year: compile(r"\b(19[5-9][0-9]|20[0-4][0-9])\b")?,
            two_digit_before_batch: compile(r"\b([0-9]{2})\s+(?:batch|passouts?|pass\s?outs?|passed\s+out|graduates?|graduated)\b")?,
            two_digit_after_batch: compile(r"\b(?:batch|class|passouts?|pass\s?outs?)\s+(?:of\s+)?([0-9]{2})\b")?,
            decade: compile(r"\b(?:(early|mid|late)\s+)?([0-9])0s\b")?,
        })
    }

    /// Load the library from a TOML dictionary file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SamparkError::Io {
            source: e,
            context: format!("Failed to read patterns file: {:?}", path),
        })?;
        let file: PatternsFile = toml::from_str(&content)?;
        Self::new(file)
    }

    /// Build the library from the built-in dictionaries
    pub fn builtin() -> Result<Self> {
        Self::new(PatternsFile::builtin())
    }

    /// Find the location mentioned earliest in the query, if any
    pub fn find_location(&self, normalized: &str) -> Option<String> {
        let mut best: Option<PhraseHit> = None;
        for (alias, canonical) in &self.city_phrases {
            if let Some(position) = phrase_position(normalized, alias) {
                let replace = match &best {
                    None => true,
                    Some(hit) => position < hit.position,
                };
                if replace {
                    best = Some(PhraseHit {
                        canonical: canonical.clone(),
                        position,
                    });
                }
            }
        }
        best.map(|hit| hit.canonical)
    }

    /// All branches mentioned in the query, in dictionary order, deduped
    pub fn find_branches(&self, normalized: &str) -> Vec<String> {
        Self::find_all(&self.branch_phrases, normalized)
    }

    /// All degrees mentioned in the query, in dictionary order, deduped
    pub fn find_degrees(&self, normalized: &str) -> Vec<String> {
        Self::find_all(&self.degree_phrases, normalized)
    }

    fn find_all(phrases: &[(String, String)], normalized: &str) -> Vec<String> {
        let mut found = Vec::new();
        for (alias, canonical) in phrases {
            if phrase_position(normalized, alias).is_some() && !found.contains(canonical) {
                found.push(canonical.clone());
            }
        }
        found
    }

    /// Skill and service phrases present in the query
    pub fn find_skills(&self, normalized: &str) -> (Vec<String>, Vec<String>) {
        let mut skills = Vec::new();
        let mut services = Vec::new();
        for entry in &self.skills {
            let hit = entry
                .phrases
                .iter()
                .any(|p| phrase_position(normalized, p).is_some());
            if hit {
                let bucket = if entry.service {
                    &mut services
                } else {
                    &mut skills
                };
                if !bucket.contains(&entry.canonical) {
                    bucket.push(entry.canonical.clone());
                }
            }
        }
        (skills, services)
    }

    /// Turnover tier implied by the query, first matching tier wins
    pub fn find_turnover(&self, normalized: &str) -> Option<TurnoverTier> {
        for (tier, terms) in &self.turnover {
            if terms
                .iter()
                .any(|t| phrase_position(normalized, t).is_some())
            {
                return Some(*tier);
            }
        }
        None
    }

    /// Graduation years in the query: explicit 4-digit years, 2-digit years
    /// next to a batch keyword (expanded around `pivot`), and decade phrases
    /// expanded to explicit inclusive lists.
    pub fn extract_years(&self, normalized: &str, pivot: i32) -> YearMatch {
        let mut result = YearMatch::default();

        for caps in self.four_digit_year.captures_iter(normalized) {
            if let Ok(year) = caps[1].parse::<i32>() {
                result.years.push(year);
                if !result.patterns.contains(&"year_4digit") {
                    result.patterns.push("year_4digit");
                }
            }
        }

        for re in [&self.two_digit_before_batch, &self.two_digit_after_batch] {
            for caps in re.captures_iter(normalized) {
                if let Ok(two) = caps[1].parse::<i32>() {
                    let year = if two < pivot { 2000 + two } else { 1900 + two };
                    result.years.push(year);
                    if !result.patterns.contains(&"year_2digit_batch") {
                        result.patterns.push("year_2digit_batch");
                    }
                }
            }
        }

        for caps in self.decade.captures_iter(normalized) {
            if let Ok(digit) = caps[2].parse::<i32>() {
                let base = digit * 10;
                let decade_start = if base >= pivot { 1900 + base } else { 2000 + base };
                let (from, to) = match caps.get(1).map(|m| m.as_str()) {
                    Some("early") => (0, 3),
                    Some("mid") => (4, 6),
                    Some("late") => (7, 9),
                    _ => (0, 9),
                };
                for offset in from..=to {
                    result.years.push(decade_start + offset);
                }
                if !result.patterns.contains(&"year_decade") {
                    result.patterns.push("year_decade");
                }
            }
        }

        result.years.sort_unstable();
        result.years.dedup();
        result
    }

    /// Canonicalize a city name reported by the LLM fallback
    pub fn canonical_city(&self, raw: &str) -> Option<String> {
        self.city_lookup.get(&normalize(raw)).cloned()
    }

    /// Canonicalize a branch name reported by the LLM fallback
    pub fn canonical_branch(&self, raw: &str) -> Option<String> {
        self.branch_lookup.get(&normalize(raw)).cloned()
    }

    /// Canonicalize a degree name reported by the LLM fallback
    pub fn canonical_degree(&self, raw: &str) -> Option<String> {
        self.degree_lookup.get(&normalize(raw)).cloned()
    }

    /// Canonicalize a skill/service phrase; returns the canonical phrase and
    /// whether it is a service. Unknown phrases pass through lowercased.
    pub fn canonical_skill(&self, raw: &str) -> (String, bool) {
        let key = normalize(raw);
        for entry in &self.skills {
            if entry.phrases.iter().any(|p| *p == key) {
                return (entry.canonical.clone(), entry.service);
            }
        }
        (key, false)
    }
}

fn dict(name: &str, aliases: &[&str]) -> DictEntry {
    DictEntry {
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

fn skill(name: &str, service: bool, synonyms: &[&str]) -> SkillEntry {
    SkillEntry {
        name: name.to_string(),
        service,
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

impl PatternsFile {
    /// Built-in dictionaries
    pub fn builtin() -> Self {
        Self {
            city: vec![
                dict("Chennai", &["madras"]),
                dict("Bengaluru", &["bangalore", "blr"]),
                dict("Mumbai", &["bombay", "navi mumbai"]),
                dict("Delhi", &["new delhi"]),
                dict("Hyderabad", &["hyd", "secunderabad"]),
                dict("Coimbatore", &["cbe", "kovai"]),
                dict("Pune", &[]),
                dict("Kolkata", &["calcutta"]),
                dict("Tiruchirappalli", &["trichy"]),
                dict("Madurai", &[]),
                dict("Kochi", &["cochin"]),
                dict("Thiruvananthapuram", &["trivandrum"]),
                dict("Ahmedabad", &[]),
                dict("Salem", &[]),
                dict("Erode", &[]),
                dict("Vellore", &[]),
                dict("Visakhapatnam", &["vizag"]),
                dict("Nagpur", &[]),
                dict("Jaipur", &[]),
                dict("Surat", &[]),
            ],
            branch: vec![
                dict("Mechanical", &["mech", "mechanical engineering"]),
                dict(
                    "Computer Science",
                    &["cse", "computer science engineering", "computers"],
                ),
                dict(
                    "Electronics and Communication",
                    &["ece", "electronics", "electronics engineering"],
                ),
                dict(
                    "Electrical",
                    &["eee", "electrical engineering", "electrical and electronics"],
                ),
                dict("Civil", &["civil engineering"]),
                dict("Chemical", &["chemical engineering"]),
                dict("Information Technology", &["information tech"]),
                dict("Production", &["production engineering"]),
                dict("Metallurgy", &["metallurgical", "metallurgical engineering"]),
                dict("Instrumentation", &["instrumentation engineering"]),
                dict("Automobile", &["automobile engineering"]),
                dict("Textile Technology", &["textile engineering"]),
            ],
            degree: vec![
                dict("BE", &["b e", "bachelor of engineering"]),
                dict("BTech", &["b tech", "btech", "bachelor of technology"]),
                dict("ME", &["m e", "master of engineering"]),
                dict("MTech", &["m tech", "mtech", "master of technology"]),
                dict("MBA", &["mba"]),
                dict("MCA", &["mca"]),
                dict("BSc", &["b sc", "bsc"]),
                dict("MSc", &["m sc", "msc"]),
                dict("BCom", &["b com", "bcom"]),
                dict("Diploma", &["diploma"]),
                dict("PhD", &["ph d", "phd", "doctorate"]),
            ],
            skill: vec![
                skill(
                    "web development",
                    true,
                    &["website", "web design", "web developer", "web dev", "websites"],
                ),
                skill(
                    "software",
                    true,
                    &["software development", "software company", "software services"],
                ),
                skill(
                    "mobile apps",
                    true,
                    &["app development", "android", "ios", "mobile application"],
                ),
                skill(
                    "digital marketing",
                    true,
                    &["seo", "social media marketing", "online marketing"],
                ),
                skill(
                    "accounting",
                    true,
                    &["chartered accountant", "ca", "auditor", "accountant", "taxation", "tax consultant"],
                ),
                skill("legal", true, &["lawyer", "advocate", "legal services"]),
                skill("real estate", true, &["property", "builder", "realty"]),
                skill(
                    "construction",
                    true,
                    &["civil contractor", "contractor", "builders"],
                ),
                skill("catering", true, &["caterer", "food services"]),
                skill("textiles", true, &["garments", "apparel", "fabrics"]),
                skill("printing", true, &["printing press", "offset printing"]),
                skill(
                    "interior design",
                    true,
                    &["interiors", "interior decorator"],
                ),
                skill(
                    "logistics",
                    true,
                    &["transport", "transportation", "freight", "courier"],
                ),
                skill("travel", true, &["tours", "travel agency", "tourism"]),
                skill("insurance", true, &["insurance agent"]),
                skill(
                    "finance",
                    true,
                    &["loans", "investment", "financial services", "wealth management"],
                ),
                skill(
                    "healthcare",
                    true,
                    &["doctor", "clinic", "hospital", "medical"],
                ),
                skill(
                    "education",
                    true,
                    &["training", "coaching", "tuition", "training institute"],
                ),
                skill(
                    "event management",
                    true,
                    &["events", "wedding planning"],
                ),
                skill("photography", true, &["photographer", "videography"]),
                skill(
                    "manufacturing",
                    true,
                    &["fabrication", "machining", "cnc"],
                ),
                skill("export", true, &["import export", "exports"]),
                skill(
                    "data science",
                    false,
                    &["machine learning", "artificial intelligence", "analytics"],
                ),
                skill("cloud", false, &["aws", "azure", "devops"]),
                skill("design", false, &["graphic design", "ui ux"]),
                skill("sales", false, &["business development"]),
                skill("hr", false, &["recruitment", "human resources", "staffing"]),
            ],
            turnover: vec![
                TurnoverEntry {
                    tier: TurnoverTier::High,
                    terms: ["high turnover", "crore turnover", "crores", "above 1 crore", "large scale", "big company"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                TurnoverEntry {
                    tier: TurnoverTier::Medium,
                    terms: ["medium turnover", "mid size", "mid sized", "lakhs turnover"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                TurnoverEntry {
                    tier: TurnoverTier::Low,
                    terms: ["low turnover", "small scale", "small business", "startup"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
            ],
        }
    }
}
