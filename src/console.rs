//! Line-oriented terminal game over a round controller.

use std::sync::Arc;

use lexilens_core::{RoundState, RoundStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

use crate::controller::RoundController;

const HELP: &str = "Type a letter to guess, 'new' for the next round, \
'reset' to clear the session, 'quit' to exit.";

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start the next round.
    NewGame,
    /// Click a letter.
    Guess(char),
    /// Clear score and history.
    Reset,
    /// Print usage.
    Help,
    /// Leave the game.
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut chars = line.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) if c.is_alphabetic() => Some(Self::Guess(c)),
            _ => Some(match line.to_ascii_lowercase().as_str() {
                "new" | "next" => Self::NewGame,
                "reset" => Self::Reset,
                "quit" | "exit" => Self::Quit,
                _ => Self::Help,
            }),
        }
    }
}

/// Renders the state as a few lines of text.
pub fn render(state: &RoundState) -> String {
    let score = state.score();
    let mut out = format!(
        "[{}] won {} / lost {} | ready {}",
        state.status(),
        score.won,
        score.lost,
        state.queue_depth()
    );
    if *state.retrying() {
        out.push_str(" | retrying");
    }

    if let Some(puzzle) = state.current_puzzle() {
        out.push_str(&format!("\nImage: {}", puzzle.image_url()));
        out.push_str(&format!("\nCaption: {}", puzzle.redacted_caption()));
        let guess: Vec<String> = state.user_guess().iter().map(char::to_string).collect();
        out.push_str(&format!(
            "\nWord: {}   misses {}/{}",
            guess.join(" "),
            state.attempts(),
            state.max_attempts()
        ));
        let pool: String = puzzle
            .letter_pool()
            .iter()
            .map(|c| {
                if state.guessed_letters().contains(c) {
                    '.'
                } else {
                    *c
                }
            })
            .collect();
        out.push_str(&format!("\nLetters: {pool}"));
        if state.status().is_finished() {
            out.push_str(&format!("\nThe word was {}", puzzle.target_word()));
        }
    } else if *state.status() == RoundStatus::Loading {
        out.push_str("\nGenerating a puzzle...");
    }

    if let Some(alert) = state.alert() {
        out.push_str(&format!("\n! {alert}"));
    }
    out
}

/// Runs the console loop until stdin closes or the player quits.
#[instrument(skip(controller))]
pub async fn run(controller: Arc<RoundController>) -> anyhow::Result<()> {
    let mut feedback = controller.subscribe_feedback();
    let printer = tokio::spawn(async move {
        loop {
            match feedback.recv().await {
                Ok(signal) => println!("*{signal}*"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Feedback lagged"),
                Err(RecvError::Closed) => return,
            }
        }
    });

    println!("{HELP}");
    println!("{}", render(&controller.snapshot()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        debug!(?command, "Console command");

        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Reset => controller.reset_session(),
            ConsoleCommand::NewGame => {
                println!("{}", render(&controller.snapshot()));
                if let Err(e) = controller.start_new_game().await {
                    warn!(error = %e, "Could not start a round");
                }
            }
            ConsoleCommand::Guess(letter) => {
                if let Err(e) = controller.click_letter(letter) {
                    println!("{e}");
                }
            }
        }
        // Let queued feedback print before the board.
        tokio::task::yield_now().await;
        println!("{}", render(&controller.snapshot()));
    }

    printer.abort();
    info!("Console session ended");
    Ok(())
}
