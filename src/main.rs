//! Lexilens - unified CLI
//!
//! Serves the JSON game API or plays in the terminal.

#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use lexilens::{
    Cli, Command, ContentPool, GameConfig, LlmClient, LlmPoolExpander, LlmPuzzleGenerator,
    RoundController, Session,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.command);

    let mut config = GameConfig::load_or_default(&cli.config)?;
    if let Some(provider) = cli.provider {
        config = config.with_llm_provider(provider);
    }

    let controller = Arc::new(build_controller(&config)?);

    let result = match cli.command {
        Command::Serve { port, host } => run_http_server(controller.clone(), host, port).await,
        Command::Play => lexilens::run_console(controller.clone()).await,
    };
    controller.shutdown();
    result
}

/// Logs go to stderr so the console board stays readable on stdout.
fn init_tracing(command: &Command) {
    let default_filter = match command {
        Command::Serve { .. } => "info,lexilens=debug",
        Command::Play => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Wires the LLM client, content pool and controller together.
#[instrument(skip(config), fields(provider = %config.llm_provider(), model = %config.llm_model()))]
fn build_controller(config: &GameConfig) -> Result<RoundController> {
    let client = LlmClient::new(config.create_llm_config()?);
    let pool = ContentPool::seeded();

    let generator = LlmPuzzleGenerator::new(
        client.clone(),
        pool.clone(),
        config.image_base_url().clone(),
    );
    let expander = LlmPoolExpander::new(client, pool);

    info!("Starting round controller");
    Ok(RoundController::new(
        config,
        Arc::new(generator),
        Arc::new(expander),
        Session::new(*config.max_history()),
    ))
}

/// Run the HTTP game API
#[instrument(skip(controller))]
async fn run_http_server(controller: Arc<RoundController>, host: String, port: u16) -> Result<()> {
    let app = lexilens::router(controller);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Server ready at http://{}:{}/api/state", host, port);

    axum::serve(listener, app).await?;
    info!("Server stopped");
    Ok(())
}
