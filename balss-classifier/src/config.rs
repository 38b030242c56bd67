//! Configuration resolution for balss-classifier
//!
//! API key priority: ENV → TOML. Every other setting comes from the TOML
//! `[classifier]` section or falls back to a built-in default.

use balss_common::config::TomlConfig;
use balss_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variables checked for the API key, in priority order
pub const API_KEY_ENV_VARS: &[&str] = &["BALSS_OPENAI_API_KEY", "OPENAI_API_KEY"];

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_CACHE_CLEAR_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_AI_CONFIDENCE: f64 = 0.8;

/// Settings for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

/// Resolved classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub ai: AiClientConfig,
    pub cache_capacity: usize,
    pub cache_clear_interval: Duration,
    /// Confidence recorded for AI classifications, in [0, 1)
    pub ai_confidence: f64,
}

impl ClassifierConfig {
    /// Resolve from environment and TOML
    pub fn resolve(toml_config: &TomlConfig) -> Result<Self> {
        let section = &toml_config.classifier;
        let api_key = resolve_api_key(toml_config)?;

        let ai_confidence = section.ai_confidence.unwrap_or(DEFAULT_AI_CONFIDENCE);
        if !(0.0..1.0).contains(&ai_confidence) {
            // 1.0 is reserved for manual classifications
            return Err(Error::Config(format!(
                "ai_confidence must be in [0, 1), got {}",
                ai_confidence
            )));
        }

        let cache_capacity = section.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
        let clear_secs = section
            .cache_clear_interval_secs
            .unwrap_or(DEFAULT_CACHE_CLEAR_INTERVAL_SECS);
        if clear_secs == 0 {
            return Err(Error::Config(
                "cache_clear_interval_secs must be positive".to_string(),
            ));
        }

        Ok(Self {
            ai: AiClientConfig {
                api_key,
                base_url: section
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: section
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                request_timeout: Duration::from_secs(
                    section
                        .request_timeout_secs
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                ),
            },
            cache_capacity,
            cache_clear_interval: Duration::from_secs(clear_secs),
            ai_confidence,
        })
    }
}

/// Resolve the AI service API key
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (*name, value)))
        .find(|(_, value)| is_valid_key(value));

    let toml_key = toml_config
        .classifier
        .openai_api_key
        .as_ref()
        .filter(|key| is_valid_key(key));

    if env_key.is_some() && toml_key.is_some() {
        warn!("API key found in both environment and TOML. Using environment (highest priority).");
    }

    if let Some((name, key)) = env_key {
        info!("API key loaded from environment variable {}", name);
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(
        "AI API key not configured. Please configure using one of:\n\
         1. Environment: BALSS_OPENAI_API_KEY=your-key (or OPENAI_API_KEY)\n\
         2. TOML config: [classifier] openai_api_key = \"your-key\""
            .to_string(),
    ))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
