//! Round lifecycle state machine.
//!
//! [`RoundState`] is a whole-state snapshot. Every transition takes `&self`
//! and returns the next snapshot, so an owner can swap states atomically and
//! readers never observe a half-applied transition.
//!
//! ```text
//! Idle ──start──▶ Loading ──generated──▶ Playing ──guess──▶ Won | Lost
//!   │               └──failed──▶ Idle                          │
//!   └────────────start (queued puzzle)──▶ Playing ◀──start─────┘
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::evaluator::{BLANK, Evaluation, GuessError, RoundOutcome, evaluate};
use crate::history::{History, HistoryItem, Outcome, Score, Session};
use crate::puzzle::Puzzle;

/// Lifecycle phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// No round yet, or the last foreground generation failed.
    Idle,
    /// Waiting on the generator for a puzzle.
    Loading,
    /// Accepting letter clicks.
    Playing,
    /// The word was revealed.
    Won,
    /// Attempts ran out.
    Lost,
}

impl RoundStatus {
    /// True for Won and Lost.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Complete game state, owned by the round controller.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct RoundState {
    status: RoundStatus,
    current_puzzle: Option<Arc<Puzzle>>,
    prefetch_queue: VecDeque<Arc<Puzzle>>,
    max_prefetch: usize,
    guessed_letters: BTreeSet<char>,
    user_guess: Vec<char>,
    attempts: u32,
    max_attempts: u32,
    session: Session,
    /// A background generation request is in flight.
    prefetching: bool,
    /// The last background generation failed and a retry is pending.
    retrying: bool,
    /// Message from the last failed foreground generation.
    alert: Option<String>,
}

impl RoundState {
    /// Creates an idle state around an existing session.
    #[instrument(skip(session))]
    pub fn new(session: Session, max_attempts: u32, max_prefetch: usize) -> Self {
        Self {
            status: RoundStatus::Idle,
            current_puzzle: None,
            prefetch_queue: VecDeque::with_capacity(max_prefetch),
            max_prefetch,
            guessed_letters: BTreeSet::new(),
            user_guess: Vec::new(),
            attempts: 0,
            max_attempts,
            session,
            prefetching: false,
            retrying: false,
            alert: None,
        }
    }

    /// Session score.
    pub fn score(&self) -> Score {
        *self.session.score()
    }

    /// Archived rounds, newest first.
    pub fn history(&self) -> &History {
        self.session.history()
    }

    /// Number of ready puzzles.
    pub fn queue_depth(&self) -> usize {
        self.prefetch_queue.len()
    }

    /// True when the queue can take another puzzle.
    pub fn wants_prefetch(&self) -> bool {
        self.status != RoundStatus::Idle && self.prefetch_queue.len() < self.max_prefetch
    }

    /// The player's guess as a string, blanks included.
    pub fn user_guess_string(&self) -> String {
        self.user_guess.iter().collect()
    }

    /// Starts a round. With a queued puzzle this is the synchronous fast path
    /// straight to Playing; otherwise the state moves to Loading and the
    /// caller must fetch a puzzle and call [`RoundState::loaded`].
    ///
    /// Returns `None` while already Loading.
    #[instrument(skip(self), fields(status = %self.status, queued = self.prefetch_queue.len()))]
    pub fn start(&self) -> Option<Self> {
        if self.status == RoundStatus::Loading {
            debug!("Start ignored while loading");
            return None;
        }

        let mut next = self.clone();
        next.archive_finished();
        next.alert = None;

        match next.prefetch_queue.pop_front() {
            Some(puzzle) => {
                info!(word_length = puzzle.word_length(), "Starting round from prefetch queue");
                next.install(puzzle);
            }
            None => {
                info!("Prefetch queue empty, loading");
                next.status = RoundStatus::Loading;
                next.current_puzzle = None;
                next.reset_guess(0);
            }
        }
        Some(next)
    }

    /// Installs a foreground-generated puzzle.
    ///
    /// Returns `None` unless Loading.
    #[instrument(skip(self, puzzle), fields(status = %self.status))]
    pub fn loaded(&self, puzzle: Arc<Puzzle>) -> Option<Self> {
        if self.status != RoundStatus::Loading {
            debug!("Generated puzzle arrived outside Loading");
            return None;
        }
        let mut next = self.clone();
        next.install(puzzle);
        Some(next)
    }

    /// Returns to Idle after a failed foreground generation.
    #[instrument(skip(self))]
    pub fn load_failed(&self, message: String) -> Self {
        let mut next = self.clone();
        if self.status == RoundStatus::Loading {
            next.status = RoundStatus::Idle;
            next.current_puzzle = None;
            next.reset_guess(0);
        }
        next.alert = Some(message);
        next
    }

    /// Applies a letter click.
    ///
    /// # Errors
    ///
    /// Returns [`GuessError`] when the click is rejected; `self` is unchanged.
    #[instrument(skip(self), fields(status = %self.status, attempts = self.attempts))]
    pub fn guess(&self, letter: char) -> Result<(Self, Evaluation), GuessError> {
        let puzzle = match (&self.status, &self.current_puzzle) {
            (RoundStatus::Playing, Some(puzzle)) => puzzle,
            _ => return Err(GuessError::NotPlaying),
        };

        let eval = evaluate(
            puzzle.target_word(),
            &self.guessed_letters,
            self.attempts,
            self.max_attempts,
            letter,
        )?;

        let mut next = self.clone();
        next.guessed_letters = eval.guessed_letters().clone();
        next.user_guess = eval.user_guess().clone();
        next.attempts = *eval.attempts();

        match eval.outcome() {
            RoundOutcome::Playing => {}
            RoundOutcome::Won => {
                info!(word = %puzzle.target_word(), attempts = next.attempts, "Round won");
                next.status = RoundStatus::Won;
                next.session.record(Outcome::Won);
            }
            RoundOutcome::Lost => {
                info!(word = %puzzle.target_word(), attempts = next.attempts, "Round lost");
                next.status = RoundStatus::Lost;
                next.session.record(Outcome::Lost);
            }
        }

        Ok((next, eval))
    }

    /// Appends a prefetched puzzle. Returns `None` when the queue is full.
    #[instrument(skip(self, puzzle), fields(queued = self.prefetch_queue.len()))]
    pub fn enqueue(&self, puzzle: Arc<Puzzle>) -> Option<Self> {
        if self.prefetch_queue.len() >= self.max_prefetch {
            debug!("Prefetch queue full, discarding puzzle");
            return None;
        }
        let mut next = self.clone();
        next.push_queue(puzzle);
        Some(next)
    }

    /// Sets the in-flight indicator.
    pub fn with_prefetching(&self, prefetching: bool) -> Self {
        Self {
            prefetching,
            ..self.clone()
        }
    }

    /// Sets the degraded/retrying indicator.
    pub fn with_retrying(&self, retrying: bool) -> Self {
        Self {
            retrying,
            ..self.clone()
        }
    }

    /// Replaces the session, keeping the round and queue.
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    fn install(&mut self, puzzle: Arc<Puzzle>) {
        let length = *puzzle.word_length();
        self.current_puzzle = Some(puzzle);
        self.status = RoundStatus::Playing;
        self.reset_guess(length);
    }

    fn reset_guess(&mut self, length: usize) {
        self.attempts = 0;
        self.guessed_letters.clear();
        self.user_guess = vec![BLANK; length];
    }

    fn push_queue(&mut self, puzzle: Arc<Puzzle>) {
        if self.prefetch_queue.len() < self.max_prefetch {
            self.prefetch_queue.push_back(puzzle);
        }
    }

    fn archive_finished(&mut self) {
        let outcome = match self.status {
            RoundStatus::Won => Outcome::Won,
            RoundStatus::Lost => Outcome::Lost,
            _ => return,
        };
        if let Some(puzzle) = self.current_puzzle.clone() {
            debug!(word = %puzzle.target_word(), %outcome, "Archiving finished round");
            self.session.archive(HistoryItem::new(puzzle, outcome));
        }
    }
}
