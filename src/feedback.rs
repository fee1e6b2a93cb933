//! Presentation feedback signals emitted after guesses.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One-shot signal for sound or animation cues.
///
/// A decisive guess emits `Correct` or `Incorrect` first, then `Win` or `Lose`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Feedback {
    /// The guessed letter occurs in the word.
    Correct,
    /// The guessed letter does not occur in the word.
    Incorrect,
    /// The round was won.
    Win,
    /// The round was lost.
    Lose,
}
