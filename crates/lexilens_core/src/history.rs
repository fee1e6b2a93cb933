//! Session score and the bounded archive of finished rounds.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::puzzle::Puzzle;

/// How a finished round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The word was revealed.
    #[display("WON")]
    Won,
    /// Attempts ran out.
    #[display("LOST")]
    Lost,
}

/// Cumulative won/lost counters for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Rounds won.
    pub won: u32,
    /// Rounds lost.
    pub lost: u32,
}

impl Score {
    /// Returns the score with one more round of `outcome` counted.
    pub fn record(self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Won => Self {
                won: self.won + 1,
                ..self
            },
            Outcome::Lost => Self {
                lost: self.lost + 1,
                ..self
            },
        }
    }
}

/// An archived round.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct HistoryItem {
    puzzle: Arc<Puzzle>,
    outcome: Outcome,
    archived_at: DateTime<Utc>,
}

impl HistoryItem {
    /// Archives `puzzle` with the given outcome, stamped now.
    pub fn new(puzzle: Arc<Puzzle>, outcome: Outcome) -> Self {
        Self {
            puzzle,
            outcome,
            archived_at: Utc::now(),
        }
    }
}

/// Bounded list of finished rounds, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    items: VecDeque<HistoryItem>,
    capacity: usize,
}

impl History {
    /// Creates an empty history holding at most `capacity` rounds.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds `item` at the front, evicting the oldest entries beyond capacity.
    #[instrument(skip(self, item), fields(outcome = %item.outcome))]
    pub fn push(&mut self, item: HistoryItem) {
        self.items.push_front(item);
        while self.items.len() > self.capacity {
            if let Some(evicted) = self.items.pop_back() {
                debug!(word = %evicted.puzzle.target_word(), "Evicted oldest history item");
            }
        }
    }

    /// Items, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    /// Item at `index`, where 0 is the newest.
    pub fn get(&self, index: usize) -> Option<&HistoryItem> {
        self.items.get(index)
    }

    /// Number of archived rounds.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing has been archived.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of rounds kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Process-scoped session state: the score and the round archive.
///
/// Handed to the round controller at construction and replaced only by an
/// explicit session reset.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Session {
    score: Score,
    history: History,
}

impl Session {
    /// Creates an empty session keeping up to `max_history` rounds.
    pub fn new(max_history: usize) -> Self {
        Self {
            score: Score::default(),
            history: History::new(max_history),
        }
    }

    /// Counts a finished round in the score.
    pub fn record(&mut self, outcome: Outcome) {
        self.score = self.score.record(outcome);
    }

    /// Archives a finished round.
    pub fn archive(&mut self, item: HistoryItem) {
        self.history.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{GeneratedRound, PuzzleMetadata};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn puzzle(word: &str) -> Arc<Puzzle> {
        let raw = GeneratedRound {
            image_url: format!("https://img.example/{word}.png"),
            target_word: word.to_string(),
            caption: format!("A picture of {word}"),
            metadata: PuzzleMetadata::default(),
            letter_pool: None,
        };
        Arc::new(Puzzle::from_generated(raw, 12, &mut StdRng::seed_from_u64(0)).unwrap())
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut history = History::new(12);
        history.push(HistoryItem::new(puzzle("APPLE"), Outcome::Won));
        history.push(HistoryItem::new(puzzle("MANGO"), Outcome::Lost));

        let words: Vec<&str> = history.iter().map(|i| i.puzzle().target_word().as_str()).collect();
        assert_eq!(words, ["MANGO", "APPLE"]);
    }

    #[test]
    fn test_history_evicts_oldest_beyond_capacity() {
        let mut history = History::new(3);
        for word in ["ONE", "TWO", "SIX", "TEN", "FIVE"] {
            history.push(HistoryItem::new(puzzle(word), Outcome::Won));
            assert!(history.len() <= 3);
        }

        let words: Vec<&str> = history.iter().map(|i| i.puzzle().target_word().as_str()).collect();
        assert_eq!(words, ["FIVE", "TEN", "SIX"]);
    }

    #[test]
    fn test_score_records_outcomes() {
        let score = Score::default()
            .record(Outcome::Won)
            .record(Outcome::Won)
            .record(Outcome::Lost);
        assert_eq!(score, Score { won: 2, lost: 1 });
    }

    #[test]
    fn test_outcome_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Outcome::Won).unwrap(), "\"WON\"");
        assert_eq!(Outcome::Lost.to_string(), "LOST");
    }
}
