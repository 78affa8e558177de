use crate::config::Config;
use crate::error::{Result, SamparkError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_extraction(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_session(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SamparkError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_extraction(config: &Config, errors: &mut Vec<ValidationError>) {
        let ex = &config.extraction;

        for (path, value) in [
            ("extraction.llm_fallback_threshold", ex.llm_fallback_threshold),
            ("extraction.min_confidence", ex.min_confidence),
            ("extraction.max_llm_confidence", ex.max_llm_confidence),
            ("extraction.ambiguous_discount", ex.ambiguous_discount),
            ("extraction.intent_disagreement_penalty", ex.intent_disagreement_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    path,
                    format!("Must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }

        let weight_sum =
            ex.year_weight + ex.location_weight + ex.degree_branch_weight + ex.skill_weight;
        if weight_sum <= 0.0 {
            errors.push(ValidationError::new(
                "extraction.*_weight",
                "Slot weights must sum to a positive value",
            ));
        }

        if !(0..=99).contains(&ex.year_pivot) {
            errors.push(ValidationError::new(
                "extraction.year_pivot",
                format!("Pivot must be a two-digit year, got {}", ex.year_pivot),
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // API key is only required when the fallback is actually enabled
        if config.llm.enabled {
            let env_var = &config.llm.api_key_env;
            match std::env::var(env_var) {
                Ok(key) if key.is_empty() => {
                    errors.push(ValidationError::new(
                        "llm.api_key_env",
                        format!("Environment variable {} is empty", env_var),
                    ));
                }
                Err(_) => {
                    errors.push(ValidationError::new(
                        "llm.api_key_env",
                        format!("Environment variable {} is not set", env_var),
                    ));
                }
                _ => {}
            }

            if config.llm.endpoint.is_empty() {
                errors.push(ValidationError::new(
                    "llm.endpoint",
                    "Endpoint cannot be empty when the LLM fallback is enabled",
                ));
            }
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let s = &config.search;

        if s.semantic_weight <= 0.0 || s.keyword_weight <= 0.0 {
            errors.push(ValidationError::new(
                "search.semantic_weight",
                "Branch weights must be positive",
            ));
        }

        if (s.semantic_weight + s.keyword_weight - 1.0).abs() > 1e-3 {
            errors.push(ValidationError::new(
                "search.keyword_weight",
                format!(
                    "Branch weights must sum to 1.0, got {}",
                    s.semantic_weight + s.keyword_weight
                ),
            ));
        }

        if s.branch_deadline_secs == 0 {
            errors.push(ValidationError::new(
                "search.branch_deadline_secs",
                "Branch deadline must be greater than 0",
            ));
        }

        if s.candidate_multiplier < 2 {
            errors.push(ValidationError::new(
                "search.candidate_multiplier",
                "Candidate multiplier must be at least 2 to survive merge deduplication",
            ));
        }

        if s.default_page_size == 0 || s.default_page_size > s.max_page_size {
            errors.push(ValidationError::new(
                "search.default_page_size",
                format!(
                    "Page size must be in 1..={}, got {}",
                    s.max_page_size, s.default_page_size
                ),
            ));
        }
    }

    fn validate_session(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.session.max_turns == 0 {
            errors.push(ValidationError::new(
                "session.max_turns",
                "History must keep at least one turn",
            ));
        }

        if config.session.idle_ttl_mins <= 0 {
            errors.push(ValidationError::new(
                "session.idle_ttl_mins",
                "Idle TTL must be greater than 0",
            ));
        }

        if config.session.sweep_interval_mins == 0 {
            errors.push(ValidationError::new(
                "session.sweep_interval_mins",
                "Sweep interval must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = Config::default();
        config.extraction.llm_fallback_threshold = 1.5;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.search.semantic_weight = 0.9;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_page_size() {
        let mut config = Config::default();
        config.search.default_page_size = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
