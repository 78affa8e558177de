//! Configuration management for sampark
//!
//! Every tunable the pipeline relies on (confidence thresholds, merge
//! weights, timeouts, session TTLs) lives here as data, loaded from a TOML
//! file with environment overrides. Components receive their section by
//! reference at construction time.

use crate::error::{Result, SamparkError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub session: SessionConfig,
    pub patterns: PatternsConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Query-understanding tunables
///
/// Slot weights follow the precision of each extraction rule: years and
/// cities are near-unambiguous, skill phrases less so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Regex confidence below this invokes the LLM fallback
    pub llm_fallback_threshold: f32,
    /// Final confidence below this triggers a clarification response
    pub min_confidence: f32,
    /// Slot weight: graduation year matched
    pub year_weight: f32,
    /// Slot weight: location matched
    pub location_weight: f32,
    /// Slot weight: degree or branch matched
    pub degree_branch_weight: f32,
    /// Slot weight: skill or service phrase matched
    pub skill_weight: f32,
    /// Confidence reported by the model is clamped to this ceiling
    pub max_llm_confidence: f32,
    /// Subtracted when regex and LLM disagree on intent (floored at 0)
    pub intent_disagreement_penalty: f32,
    /// Multiplier applied to LLM confidence when both extractors found nothing
    pub ambiguous_discount: f32,
    /// Intent confidence when a single rule group matches
    pub matched_intent_confidence: f32,
    /// Intent confidence when two rule groups match (ambiguous)
    pub ambiguous_intent_confidence: f32,
    /// Intent confidence when no rule group matches
    pub default_intent_confidence: f32,
    /// Two-digit years below this expand to 20xx, the rest to 19xx
    pub year_pivot: i32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            llm_fallback_threshold: 0.7,
            min_confidence: 0.3,
            year_weight: 0.3,
            location_weight: 0.25,
            degree_branch_weight: 0.25,
            skill_weight: 0.2,
            max_llm_confidence: 0.95,
            intent_disagreement_penalty: 0.2,
            ambiguous_discount: 0.5,
            matched_intent_confidence: 0.9,
            ambiguous_intent_confidence: 0.6,
            default_intent_confidence: 0.3,
            year_pivot: 50,
        }
    }
}

/// LLM fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    /// Chat-completions endpoint (OpenAI-compatible)
    pub endpoint: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    /// Hard timeout for a single completion call
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.1,
            timeout_secs: 5,
            max_tokens: 512,
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embeddings endpoint (OpenAI-compatible)
    pub endpoint: String,
    pub api_key_env: String,
    pub model: String,
    /// Expected vector dimension; responses with any other length are rejected
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 768,
            timeout_secs: 10,
        }
    }
}

/// Hybrid search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Weight of the semantic score in the merged ranking
    pub semantic_weight: f32,
    /// Weight of the keyword score in the merged ranking
    pub keyword_weight: f32,
    /// Joint deadline for both retrieval branches
    pub branch_deadline_secs: u64,
    /// Candidates fetched per branch = page window x this multiplier
    pub candidate_multiplier: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            branch_deadline_secs: 3,
            candidate_multiplier: 2,
            default_page_size: 10,
            max_page_size: 50,
        }
    }
}

/// Conversation session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turns kept per caller; older turns are evicted FIFO
    pub max_turns: usize,
    /// Sessions idle longer than this are removed by the sweeper
    pub idle_ttl_mins: i64,
    /// Interval between background sweeps
    pub sweep_interval_mins: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            idle_ttl_mins: 30,
            sweep_interval_mins: 10,
        }
    }
}

/// Pattern configuration - optional path to a pattern dictionary file
///
/// When no file is given the built-in dictionaries are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SamparkError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SamparkError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SamparkError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SAMPARK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SAMPARK_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__ENABLED" => {
                self.llm.enabled = value.parse().map_err(|_| SamparkError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("Cannot parse '{}' as boolean", value),
                })?;
            }
            "LLM__ENDPOINT" => {
                self.llm.endpoint = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "EMBEDDING__ENDPOINT" => {
                self.embedding.endpoint = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SamparkError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("sampark").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            extraction: ExtractionConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            session: SessionConfig::default(),
            patterns: PatternsConfig::default(),
        }
    }
}
