//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use quiz_forge_core::{PipelineSettings, ProviderKind};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub llm_provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_fast_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_fast_model: String,
    pub gemini_api_base: String,
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Provider Settings ---
        let llm_provider = match lookup("LLM_PROVIDER")
            .unwrap_or_else(|| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => ProviderKind::OpenAi,
            "gemini" => ProviderKind::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of openai, gemini", other),
                ))
            }
        };

        let openai_api_key = lookup("OPENAI_API_KEY");
        let gemini_api_key = lookup("GEMINI_API_KEY");

        let selected_key = match llm_provider {
            ProviderKind::OpenAi => ("OPENAI_API_KEY", &openai_api_key),
            ProviderKind::Gemini => ("GEMINI_API_KEY", &gemini_api_key),
        };
        if selected_key.1.is_none() {
            return Err(ConfigError::MissingVar(selected_key.0.to_string()));
        }

        let openai_model = lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let openai_fast_model =
            lookup("OPENAI_FAST_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let gemini_model = lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-pro".to_string());
        let gemini_fast_model =
            lookup("GEMINI_FAST_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let gemini_api_base = lookup("GEMINI_API_BASE")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        // --- Load Pipeline Limits ---
        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            chunk_max_tokens: parse_or(&lookup, "CHUNK_MAX_TOKENS", defaults.chunk_max_tokens)?,
            max_sources: parse_or(&lookup, "MAX_SOURCES", defaults.max_sources)?,
            fetch_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
            fetch_max_bytes: parse_or(&lookup, "FETCH_MAX_BYTES", defaults.fetch_max_bytes)?,
            max_extracted_chars: parse_or(&lookup, "MAX_EXTRACTED_CHARS", defaults.max_extracted_chars)?,
            user_agent: lookup("FETCH_USER_AGENT").unwrap_or_else(|| defaults.user_agent.clone()),
            extraction_concurrency: parse_or(
                &lookup,
                "EXTRACTION_CONCURRENCY",
                defaults.extraction_concurrency,
            )?,
            generation_concurrency: parse_or(
                &lookup,
                "GENERATION_CONCURRENCY",
                defaults.generation_concurrency,
            )?,
            ..defaults
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            llm_provider,
            openai_api_key,
            openai_model,
            openai_fast_model,
            gemini_api_key,
            gemini_model,
            gemini_fast_model,
            gemini_api_base,
            pipeline,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_minimal_environment() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/quiz"), ("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm_provider, ProviderKind::OpenAi);
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.pipeline.chunk_max_tokens, 3000);
        assert_eq!(config.pipeline.max_sources, 50);
        assert_eq!(config.pipeline.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.pipeline.fetch_max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_database_url_is_required() {
        let err = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref k) if k == "DATABASE_URL"));
    }

    #[test]
    fn test_selected_provider_needs_its_key() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("LLM_PROVIDER", "gemini"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref k) if k == "GEMINI_API_KEY"));

        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("LLM_PROVIDER", "Gemini"),
            ("GEMINI_API_KEY", "g-test"),
        ])
        .unwrap();
        assert_eq!(config.llm_provider, ProviderKind::Gemini);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("LLM_PROVIDER", "claude"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "LLM_PROVIDER"));
    }

    #[test]
    fn test_pipeline_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("OPENAI_API_KEY", "sk-test"),
            ("CHUNK_MAX_TOKENS", "500"),
            ("FETCH_TIMEOUT_SECS", "3"),
            ("GENERATION_CONCURRENCY", "2"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.chunk_max_tokens, 500);
        assert_eq!(config.pipeline.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.pipeline.generation_concurrency, 2);
        assert_eq!(config.pipeline.min_extracted_chars, 50);
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("OPENAI_API_KEY", "sk-test"),
            ("MAX_SOURCES", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "MAX_SOURCES"));
    }
}
