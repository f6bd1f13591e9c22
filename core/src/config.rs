use crate::cache::CachePolicy;
use crate::features::FieldWeights;
use crate::recommend::RecommendationMode;
use crate::signals::SignalKey;
use crate::tokenizer::TokenizerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("score weights must be finite and non-negative")]
    InvalidWeights,
    #[error("max_tokens must be positive")]
    InvalidTokenLimit,
}

/// Blend weights of the style-mode composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub similarity: f64,
    pub rating: f64,
    pub feedback: f64,
    pub popularity: f64,
    pub freshness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { similarity: 0.35, rating: 0.25, feedback: 0.20, popularity: 0.15, freshness: 0.05 }
    }
}

impl ScoreWeights {
    fn is_valid(&self) -> bool {
        [self.similarity, self.rating, self.feedback, self.popularity, self.freshness]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub weights: ScoreWeights,
    pub field_weights: FieldWeights,
    pub tokenizer: TokenizerConfig,
    pub cache_ttl_secs: u64,
    pub default_mode: RecommendationMode,
    pub default_top_n: usize,
    pub signal_key: SignalKey,
    /// Also drop cached vectors whenever feedback or views change. Vectors
    /// only depend on text, so this is off by default.
    pub invalidate_on_signal_change: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            field_weights: FieldWeights::default(),
            tokenizer: TokenizerConfig::default(),
            cache_ttl_secs: 300,
            default_mode: RecommendationMode::Hybrid,
            default_top_n: 8,
            signal_key: SignalKey::Title,
            invalidate_on_signal_change: false,
        }
    }
}

impl RecommenderConfig {
    /// Load a JSON config; absent fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()
    }

    /// `from_file` when the file exists, defaults otherwise.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() { Self::from_file(path) } else { Ok(Self::default()) }
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if !self.weights.is_valid() {
            return Err(ConfigError::InvalidWeights);
        }
        if self.tokenizer.max_tokens == 0 {
            return Err(ConfigError::InvalidTokenLimit);
        }
        Ok(self)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(Duration::from_secs(self.cache_ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RecommenderConfig =
            serde_json::from_str(r#"{"default_top_n": 3, "weights": {"similarity": 0.5}}"#).unwrap();
        assert_eq!(config.default_top_n, 3);
        assert_eq!(config.weights.similarity, 0.5);
        assert_eq!(config.weights.rating, 0.25);
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn negative_weights_are_rejected() {
        let mut config = RecommenderConfig::default();
        config.weights.feedback = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWeights)));
    }
}
