//! Puzzle content and its normalization from raw generator output.

use std::collections::BTreeSet;

use derive_getters::Getters;
use derive_more::{Display, Error};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Shortest target word a puzzle may carry.
pub const MIN_WORD_LENGTH: usize = 3;

/// Default number of clickable letters offered per round.
pub const DEFAULT_LETTER_POOL_SIZE: usize = 12;

/// Fixed-length marker substituted for the target word in captions.
pub const REDACTION_MARKER: &str = "_____";

const ALPHABET: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Descriptive tags attached to a puzzle. Display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleMetadata {
    /// Visual style of the image (e.g. "watercolor").
    #[serde(default)]
    pub style: String,
    /// Scene theme (e.g. "harbor at dawn").
    #[serde(default)]
    pub theme: String,
    /// Word category or domain (e.g. "nature").
    #[serde(default)]
    pub category: String,
}

/// Raw output of a puzzle generator, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRound {
    /// Opaque reference to the visual asset.
    pub image_url: String,
    /// The hidden word, in any case.
    pub target_word: String,
    /// The unredacted caption.
    pub caption: String,
    /// Descriptive tags.
    #[serde(default)]
    pub metadata: PuzzleMetadata,
    /// Letter pool, if the generator already built one.
    #[serde(default)]
    pub letter_pool: Option<Vec<char>>,
}

/// Reasons a generated round cannot become a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum PuzzleError {
    /// The target word has fewer than [`MIN_WORD_LENGTH`] letters.
    #[display("target word has {length} letters, need at least {}", MIN_WORD_LENGTH)]
    WordTooShort {
        /// Length of the rejected word.
        length: usize,
    },
    /// The target word contains something other than A-Z.
    #[display("target word {word:?} is not purely alphabetic")]
    NonAlphabetic {
        /// The rejected word.
        word: String,
    },
}

/// A validated, immutable round.
///
/// Construct with [`Puzzle::from_generated`]; the invariants below hold for
/// every value of this type:
/// - `target_word` is uppercase A-Z with at least [`MIN_WORD_LENGTH`] letters
/// - `letter_pool` contains every letter of `target_word`
/// - `redacted_caption` has no occurrence of `target_word` in any case
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Puzzle {
    image_url: String,
    target_word: String,
    word_length: usize,
    redacted_caption: String,
    letter_pool: Vec<char>,
    metadata: PuzzleMetadata,
}

impl Puzzle {
    /// Validates raw generator output and derives the display fields.
    ///
    /// A supplied letter pool is kept only when it covers the word and has at
    /// least `pool_size` distinct letters; otherwise a fresh pool is built
    /// from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`PuzzleError`] if the word is too short or not alphabetic.
    #[instrument(skip(raw, rng), fields(word_len = raw.target_word.len()))]
    pub fn from_generated<R: Rng + ?Sized>(
        raw: GeneratedRound,
        pool_size: usize,
        rng: &mut R,
    ) -> Result<Self, PuzzleError> {
        let target_word = raw.target_word.trim().to_ascii_uppercase();
        let length = target_word.chars().count();

        if length < MIN_WORD_LENGTH {
            debug!(length, "Rejecting short target word");
            return Err(PuzzleError::WordTooShort { length });
        }
        if !target_word.chars().all(|c| c.is_ascii_alphabetic()) {
            debug!(word = %target_word, "Rejecting non-alphabetic target word");
            return Err(PuzzleError::NonAlphabetic { word: target_word });
        }

        let letter_pool = match raw.letter_pool {
            Some(supplied) => match accept_supplied_pool(&target_word, supplied, pool_size) {
                Some(pool) => pool,
                None => {
                    warn!("Supplied letter pool does not cover the word, rebuilding");
                    build_letter_pool(&target_word, pool_size, rng)
                }
            },
            None => build_letter_pool(&target_word, pool_size, rng),
        };

        Ok(Self {
            image_url: raw.image_url,
            redacted_caption: redact_caption(&raw.caption, &target_word),
            word_length: length,
            target_word,
            letter_pool,
            metadata: raw.metadata,
        })
    }

    /// Unique letters of the target word.
    pub fn unique_letters(&self) -> BTreeSet<char> {
        self.target_word.chars().collect()
    }
}

fn accept_supplied_pool(word: &str, supplied: Vec<char>, pool_size: usize) -> Option<Vec<char>> {
    let mut seen = BTreeSet::new();
    let pool: Vec<char> = supplied
        .into_iter()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_alphabetic() && seen.insert(*c))
        .collect();

    let covers = word.chars().all(|c| seen.contains(&c));
    (covers && pool.len() >= pool_size).then_some(pool)
}

/// Replaces every case-insensitive occurrence of `word` in `caption` with
/// [`REDACTION_MARKER`].
#[instrument(skip(caption))]
pub fn redact_caption(caption: &str, word: &str) -> String {
    if word.is_empty() {
        return caption.to_string();
    }

    // ASCII case folding keeps byte offsets aligned with the original.
    let folded = caption.to_ascii_uppercase();
    let needle = word.to_ascii_uppercase();

    let mut out = String::with_capacity(caption.len());
    let mut last = 0;
    for (start, matched) in folded.match_indices(&needle) {
        out.push_str(&caption[last..start]);
        out.push_str(REDACTION_MARKER);
        last = start + matched.len();
    }
    out.push_str(&caption[last..]);
    out
}

/// Builds a shuffled letter pool covering `word`, padded with distinct
/// random letters up to `pool_size`.
///
/// If the word has more unique letters than `pool_size`, the pool is exactly
/// those letters.
pub fn build_letter_pool<R: Rng + ?Sized>(word: &str, pool_size: usize, rng: &mut R) -> Vec<char> {
    let unique: BTreeSet<char> = word.chars().map(|c| c.to_ascii_uppercase()).collect();
    let mut pool: Vec<char> = unique.iter().copied().collect();

    let mut padding: Vec<char> = ALPHABET
        .iter()
        .copied()
        .filter(|c| !unique.contains(c))
        .collect();
    padding.shuffle(rng);

    let needed = pool_size.saturating_sub(pool.len());
    pool.extend(padding.into_iter().take(needed));
    pool.shuffle(rng);
    pool
}
