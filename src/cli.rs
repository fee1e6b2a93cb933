//! Command-line interface for lexilens.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::llm_client::LlmProvider;

/// Lexilens - guess the hidden word behind a generated picture
#[derive(Parser, Debug)]
#[command(name = "lexilens")]
#[command(about = "Picture word-guessing game with prefetched rounds", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the game configuration file (defaults apply if missing)
    #[arg(short, long, default_value = "lexilens.toml", global = true)]
    pub config: PathBuf,

    /// Override the configured LLM provider (openai or anthropic)
    #[arg(long, global = true)]
    pub provider: Option<LlmProvider>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the JSON HTTP API
    Serve {
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Play in the terminal
    Play,
}
