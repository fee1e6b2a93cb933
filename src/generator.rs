//! Puzzle generator and pool expansion contracts, with LLM-backed implementations.

use async_trait::async_trait;
use derive_more::{Display, Error};
use lexilens_core::{GeneratedRound, PuzzleMetadata};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::content::{ContentPick, ContentPool, PoolAdditions};
use crate::llm_client::{LlmClient, LlmError};

/// Produces raw puzzle content. May fail for any upstream reason.
#[async_trait]
pub trait PuzzleGenerator: Send + Sync {
    /// Generates one round.
    async fn generate_round(&self) -> Result<GeneratedRound, GenerationError>;
}

/// Adds variety to the content pool used by future generations.
#[async_trait]
pub trait PoolExpander: Send + Sync {
    /// Requests `count` new entries per pool list.
    async fn expand_pool(&self, count: usize) -> Result<(), GenerationError>;
}

const PUZZLE_SYSTEM_PROMPT: &str = "You write clues for a word-guessing picture game. \
Reply with a single JSON object and nothing else, with keys \
\"word\" (one common English noun, 4 to 8 letters, letters only), \
\"caption\" (one vivid sentence describing a scene that contains the word), \
and \"image_prompt\" (a short prompt for an image generator depicting the caption).";

const EXPANSION_SYSTEM_PROMPT: &str = "You help diversify a picture word game. \
Reply with a single JSON object and nothing else, with keys \
\"styles\" (visual art styles), \"themes\" (short scene settings) and \
\"categories\" (broad word categories), each a list of short strings.";

#[derive(Debug, Deserialize)]
struct PuzzleReply {
    word: String,
    caption: String,
    image_prompt: String,
}

/// Puzzle generator that asks an LLM for the word and caption and builds the
/// image reference from the configured image service.
#[derive(Debug, Clone)]
pub struct LlmPuzzleGenerator {
    client: LlmClient,
    pool: ContentPool,
    image_base_url: String,
}

impl LlmPuzzleGenerator {
    /// Creates a generator drawing prompt variety from `pool`.
    #[instrument(skip(client, pool))]
    pub fn new(client: LlmClient, pool: ContentPool, image_base_url: String) -> Self {
        Self {
            client,
            pool,
            image_base_url,
        }
    }

    /// Builds the image URL by appending the prompt as one encoded path segment.
    #[instrument(skip(self))]
    pub fn image_url(&self, image_prompt: &str) -> Result<String, GenerationError> {
        let mut url = reqwest::Url::parse(&self.image_base_url).map_err(|e| {
            GenerationError::new(format!("Invalid image base URL {}: {}", self.image_base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GenerationError::new(format!(
                    "Image base URL cannot take a path: {}",
                    self.image_base_url
                ))
            })?
            .pop_if_empty()
            .push(image_prompt);
        Ok(url.to_string())
    }
}

fn puzzle_request(pick: &ContentPick) -> String {
    format!(
        "Category: {}. Scene theme: {}. Art style: {}.",
        pick.category, pick.theme, pick.style
    )
}

#[async_trait]
impl PuzzleGenerator for LlmPuzzleGenerator {
    #[instrument(skip(self))]
    async fn generate_round(&self) -> Result<GeneratedRound, GenerationError> {
        let pick = self.pool.pick(&mut rand::rng());
        debug!(?pick, "Generating puzzle");

        let reply: PuzzleReply = self
            .client
            .generate_json(PUZZLE_SYSTEM_PROMPT, &puzzle_request(&pick))
            .await?;

        let image_prompt = format!("{}, {}", reply.image_prompt, pick.style);
        let image_url = self.image_url(&image_prompt)?;

        info!(word_length = reply.word.len(), category = %pick.category, "Puzzle generated");
        Ok(GeneratedRound {
            image_url,
            target_word: reply.word,
            caption: reply.caption,
            metadata: PuzzleMetadata {
                style: pick.style,
                theme: pick.theme,
                category: pick.category,
            },
            letter_pool: None,
        })
    }
}

/// Pool expander that asks an LLM for new styles, themes and categories.
#[derive(Debug, Clone)]
pub struct LlmPoolExpander {
    client: LlmClient,
    pool: ContentPool,
}

impl LlmPoolExpander {
    /// Creates an expander writing into `pool`.
    #[instrument(skip(client, pool))]
    pub fn new(client: LlmClient, pool: ContentPool) -> Self {
        Self { client, pool }
    }
}

#[async_trait]
impl PoolExpander for LlmPoolExpander {
    #[instrument(skip(self))]
    async fn expand_pool(&self, count: usize) -> Result<(), GenerationError> {
        let request = format!("Give {count} new entries for each list.");
        let additions: PoolAdditions = self
            .client
            .generate_json(EXPANSION_SYSTEM_PROMPT, &request)
            .await?;
        let added = self.pool.extend(additions);
        info!(added, "Pool expansion applied");
        Ok(())
    }
}

/// Puzzle generation error.
#[derive(Debug, Clone, Display, Error)]
#[display("Generation error: {} at {}:{}", message, file, line)]
pub struct GenerationError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GenerationError {
    /// Creates a new generation error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Generation error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<LlmError> for GenerationError {
    #[track_caller]
    fn from(err: LlmError) -> Self {
        Self::new(err.message)
    }
}
