//! Lexilens - a picture word-guessing game with a prefetched round queue.
//!
//! Each round shows a generated image and a caption with the hidden word
//! blanked out. The player clicks letters until the word is revealed or the
//! attempts run out.
//!
//! # Architecture
//!
//! - **Controller**: owns the round state and publishes whole snapshots
//! - **Prefetch**: background supervisor keeping ready puzzles queued
//! - **Generator**: LLM-backed puzzle author and content pool expansion
//! - **Surfaces**: JSON HTTP API (axum) and a terminal console
//!
//! Pure game rules live in [`lexilens_core`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lexilens::{
//!     ContentPool, GameConfig, LlmClient, LlmPoolExpander, LlmPuzzleGenerator, RoundController,
//!     Session,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GameConfig::default();
//! let client = LlmClient::new(config.create_llm_config()?);
//! let pool = ContentPool::seeded();
//!
//! let controller = RoundController::new(
//!     &config,
//!     Arc::new(LlmPuzzleGenerator::new(
//!         client.clone(),
//!         pool.clone(),
//!         config.image_base_url().clone(),
//!     )),
//!     Arc::new(LlmPoolExpander::new(client, pool)),
//!     Session::new(*config.max_history()),
//! );
//! controller.start_new_game().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod cli;
mod config;
mod console;
mod content;
mod controller;
mod feedback;
mod generator;
mod llm_client;
mod prefetch;
mod server;
mod ticker;

// Crate-level exports - CLI and configuration
pub use cli::{Cli, Command};
pub use config::{ConfigError, GameConfig};

// Crate-level exports - Round controller
pub use controller::{GameError, RoundController};
pub use feedback::Feedback;
pub use prefetch::EXPANSION_TRIGGER_DEPTH;
pub use ticker::next_highlight;

// Crate-level exports - Content generation
pub use content::{ContentPick, ContentPool, PoolAdditions};
pub use generator::{
    GenerationError, LlmPoolExpander, LlmPuzzleGenerator, PoolExpander, PuzzleGenerator,
};
pub use llm_client::{LlmClient, LlmConfig, LlmError, LlmProvider, parse_json_object};

// Crate-level exports - Presentation surfaces
pub use console::{ConsoleCommand, render, run as run_console};
pub use server::{ErrorBody, GuessView, HistoryView, StateView, router};

// Crate-level exports - Core game types
pub use lexilens_core::{
    Evaluation, GeneratedRound, GuessError, History, HistoryItem, Outcome, Puzzle, PuzzleError,
    PuzzleMetadata, RoundOutcome, RoundState, RoundStatus, Score, Session,
};
