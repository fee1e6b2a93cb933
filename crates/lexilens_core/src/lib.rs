//! Pure game logic for LexiLens.
//!
//! A round shows the player an image and a caption with one word blanked
//! out. The player picks letters from a fixed pool until the word is fully
//! revealed or they run out of attempts.
//!
//! # Architecture
//!
//! - **Puzzle**: validated, immutable round content built from raw generator output
//! - **Evaluator**: pure guess evaluation (letter click to next display and outcome)
//! - **History**: session score and the bounded archive of finished rounds
//! - **Round**: the whole-state snapshot owned by the lifecycle controller
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use lexilens_core::{evaluate, RoundOutcome};
//!
//! let eval = evaluate("GARDEN", &BTreeSet::new(), 0, 4, 'g').unwrap();
//! assert_eq!(eval.user_guess_string(), "G_____");
//! assert_eq!(*eval.outcome(), RoundOutcome::Playing);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod evaluator;
mod history;
mod puzzle;
mod round;

pub use evaluator::{BLANK, Evaluation, GuessError, RoundOutcome, evaluate, reveal};
pub use history::{History, HistoryItem, Outcome, Score, Session};
pub use puzzle::{
    DEFAULT_LETTER_POOL_SIZE, GeneratedRound, MIN_WORD_LENGTH, Puzzle, PuzzleError,
    PuzzleMetadata, REDACTION_MARKER, build_letter_pool, redact_caption,
};
pub use round::{RoundState, RoundStatus};
