//! Game configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::llm_client::{LlmConfig, LlmProvider};

/// Tunables for the round lifecycle, the prefetch queue and the puzzle author.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct GameConfig {
    /// Incorrect guesses allowed per round.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// Ready puzzles kept ahead of demand.
    #[serde(default = "default_max_prefetch")]
    max_prefetch: usize,

    /// Finished rounds kept in the session history.
    #[serde(default = "default_max_history")]
    max_history: usize,

    /// Clickable letters offered per round.
    #[serde(default = "default_letter_pool_size")]
    letter_pool_size: usize,

    /// Quiet period before a background fetch starts.
    #[serde(default = "default_prefetch_debounce_ms")]
    prefetch_debounce_ms: u64,

    /// Pause after a failed background fetch.
    #[serde(default = "default_failure_cooldown_ms")]
    failure_cooldown_ms: u64,

    /// Rotation period of the history ticker.
    #[serde(default = "default_ticker_interval_ms")]
    ticker_interval_ms: u64,

    /// Entries requested per list by the one-time content pool expansion.
    #[serde(default = "default_expansion_count")]
    expansion_count: usize,

    /// LLM provider (openai or anthropic).
    #[serde(default = "default_provider")]
    llm_provider: LlmProvider,

    /// LLM model name.
    #[serde(default = "default_model")]
    llm_model: String,

    /// Maximum tokens for LLM responses.
    #[serde(default = "default_max_tokens")]
    llm_max_tokens: u32,

    /// Image service base URL; the image prompt is appended as a path segment.
    #[serde(default = "default_image_base_url")]
    image_base_url: String,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_max_prefetch() -> usize {
    2
}

fn default_max_history() -> usize {
    12
}

fn default_letter_pool_size() -> usize {
    lexilens_core::DEFAULT_LETTER_POOL_SIZE
}

fn default_prefetch_debounce_ms() -> u64 {
    1_000
}

fn default_failure_cooldown_ms() -> u64 {
    5_000
}

fn default_ticker_interval_ms() -> u64 {
    4_000
}

fn default_expansion_count() -> usize {
    5
}

fn default_provider() -> LlmProvider {
    LlmProvider::Anthropic
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_image_base_url() -> String {
    "https://image.pollinations.ai/prompt/".to_string()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_prefetch: default_max_prefetch(),
            max_history: default_max_history(),
            letter_pool_size: default_letter_pool_size(),
            prefetch_debounce_ms: default_prefetch_debounce_ms(),
            failure_cooldown_ms: default_failure_cooldown_ms(),
            ticker_interval_ms: default_ticker_interval_ms(),
            expansion_count: default_expansion_count(),
            llm_provider: default_provider(),
            llm_model: default_model(),
            llm_max_tokens: default_max_tokens(),
            image_base_url: default_image_base_url(),
        }
    }
}

impl GameConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(
            max_attempts = config.max_attempts,
            max_prefetch = config.max_prefetch,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Rejects settings the game cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::new("max_attempts must be at least 1".to_string()));
        }
        if self.max_history == 0 {
            return Err(ConfigError::new("max_history must be at least 1".to_string()));
        }
        if self.ticker_interval_ms == 0 {
            return Err(ConfigError::new("ticker_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Debounce before a background fetch.
    pub fn prefetch_debounce(&self) -> Duration {
        Duration::from_millis(self.prefetch_debounce_ms)
    }

    /// Cooldown after a failed background fetch.
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }

    /// History ticker rotation period.
    pub fn ticker_interval(&self) -> Duration {
        Duration::from_millis(self.ticker_interval_ms)
    }

    /// Creates LLM configuration for the configured provider.
    /// Requires OPENAI_API_KEY or ANTHROPIC_API_KEY environment variable.
    #[instrument(skip(self), fields(provider = ?self.llm_provider, model = %self.llm_model))]
    pub fn create_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let api_key = match self.llm_provider {
            LlmProvider::OpenAI => std::env::var("OPENAI_API_KEY").map_err(|_| {
                ConfigError::new("OPENAI_API_KEY environment variable not set".to_string())
            })?,
            LlmProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                ConfigError::new("ANTHROPIC_API_KEY environment variable not set".to_string())
            })?,
        };

        Ok(LlmConfig::new(
            self.llm_provider,
            api_key,
            self.llm_model.clone(),
            self.llm_max_tokens,
        ))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
