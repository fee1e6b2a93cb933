//! Guess evaluation for a single letter click.

use std::collections::BTreeSet;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Placeholder for an unrevealed slot in the player's guess.
pub const BLANK: char = '_';

/// Result of a round after a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundOutcome {
    /// The word is not fully revealed and attempts remain.
    Playing,
    /// Every slot of the word is revealed.
    Won,
    /// Attempts are exhausted before the word was revealed.
    Lost,
}

/// Rejected letter clicks.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GuessError {
    /// The letter was already picked this round.
    #[display("letter {letter} was already guessed")]
    AlreadyGuessed {
        /// The repeated letter.
        letter: char,
    },
    /// The input is not an A-Z letter.
    #[display("{input:?} is not a letter")]
    NotALetter {
        /// The rejected input.
        input: char,
    },
    /// There is no word to guess against.
    #[display("target word is empty")]
    EmptyWord,
    /// No round is accepting guesses.
    #[display("no round is in play")]
    NotPlaying,
}

/// Next guess state produced by [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Evaluation {
    guessed_letters: BTreeSet<char>,
    user_guess: Vec<char>,
    attempts: u32,
    outcome: RoundOutcome,
    correct: bool,
}

impl Evaluation {
    /// The revealed guess as a string, blanks included.
    pub fn user_guess_string(&self) -> String {
        self.user_guess.iter().collect()
    }
}

/// Maps every character of `word` to itself when guessed, else to [`BLANK`].
///
/// Repeated letters are revealed together since matching is by character.
pub fn reveal(word: &str, guessed: &BTreeSet<char>) -> Vec<char> {
    word.chars()
        .map(|c| if guessed.contains(&c) { c } else { BLANK })
        .collect()
}

/// Applies one letter click to the current guess state.
///
/// A letter absent from the word costs one attempt. The round is won when
/// the revealed guess equals the word, and lost when it is not won and
/// `attempts` has reached `max_attempts`.
///
/// # Errors
///
/// Returns [`GuessError::AlreadyGuessed`] for a repeated letter, leaving the
/// caller's state untouched.
#[instrument(skip(guessed), fields(guessed_count = guessed.len()))]
pub fn evaluate(
    target_word: &str,
    guessed: &BTreeSet<char>,
    attempts: u32,
    max_attempts: u32,
    clicked: char,
) -> Result<Evaluation, GuessError> {
    if target_word.is_empty() {
        return Err(GuessError::EmptyWord);
    }
    if !clicked.is_ascii_alphabetic() {
        return Err(GuessError::NotALetter { input: clicked });
    }

    let letter = clicked.to_ascii_uppercase();
    if guessed.contains(&letter) {
        debug!(%letter, "Ignoring repeated letter");
        return Err(GuessError::AlreadyGuessed { letter });
    }

    let mut guessed_letters = guessed.clone();
    guessed_letters.insert(letter);

    let correct = target_word.contains(letter);
    let attempts = if correct { attempts } else { attempts + 1 };

    let user_guess = reveal(target_word, &guessed_letters);
    let won = user_guess.iter().copied().eq(target_word.chars());

    let outcome = if won {
        RoundOutcome::Won
    } else if attempts >= max_attempts {
        RoundOutcome::Lost
    } else {
        RoundOutcome::Playing
    };

    debug!(%letter, correct, attempts, ?outcome, "Evaluated guess");

    Ok(Evaluation {
        guessed_letters,
        user_guess,
        attempts,
        outcome,
        correct,
    })
}
