//! Round controller: the single owner of the authoritative round state.

use std::sync::{Arc, Mutex};

use derive_more::{Display, Error, From};
use lexilens_core::{
    Evaluation, GeneratedRound, GuessError, HistoryItem, Puzzle, PuzzleError, RoundOutcome,
    RoundState, RoundStatus, Session,
};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::GameConfig;
use crate::feedback::Feedback;
use crate::generator::{GenerationError, PoolExpander, PuzzleGenerator};
use crate::prefetch::{PrefetchSettings, Prefetcher};
use crate::ticker;

const FEEDBACK_CAPACITY: usize = 64;

/// Errors surfaced to the caller of a controller intent.
#[derive(Debug, Display, Error, From)]
pub enum GameError {
    /// The foreground generator call failed.
    #[display("puzzle generation failed: {_0}")]
    Generation(GenerationError),
    /// The generator produced content that is not a valid puzzle.
    #[display("generated puzzle rejected: {_0}")]
    InvalidPuzzle(PuzzleError),
    /// The letter click was not a letter.
    #[display("guess rejected: {_0}")]
    Guess(GuessError),
    /// The foreground generation task panicked or was aborted.
    #[display("puzzle generation interrupted: {_0}")]
    Interrupted(JoinError),
}

/// Returns a Loading round to Idle if foreground generation ends without
/// settling it.
struct LoadingGuard {
    state: Arc<watch::Sender<RoundState>>,
    armed: bool,
}

impl LoadingGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("Foreground generation interrupted, leaving Loading");
            self.state.send_modify(|s| {
                *s = s.load_failed("Puzzle generation was interrupted".to_string())
            });
        }
    }
}

fn build_puzzle(
    raw: GeneratedRound,
    letter_pool_size: usize,
) -> Result<Puzzle, PuzzleError> {
    Puzzle::from_generated(raw, letter_pool_size, &mut rand::rng())
}

/// Generates the foreground puzzle and settles the Loading state.
///
/// Runs as its own task so a dropped caller cannot strand the round in
/// Loading.
async fn load_foreground(
    state: Arc<watch::Sender<RoundState>>,
    generator: Arc<dyn PuzzleGenerator>,
    letter_pool_size: usize,
) -> Result<(), GameError> {
    let mut guard = LoadingGuard {
        state: Arc::clone(&state),
        armed: true,
    };

    let result = match generator.generate_round().await {
        Ok(raw) => build_puzzle(raw, letter_pool_size).map_err(GameError::from),
        Err(e) => Err(GameError::from(e)),
    };
    guard.disarm();

    match result {
        Ok(puzzle) => {
            info!(word_length = *puzzle.word_length(), "Round started from generator");
            let puzzle = Arc::new(puzzle);
            state.send_if_modified(|s| match s.loaded(puzzle) {
                Some(next) => {
                    *s = next;
                    true
                }
                None => false,
            });
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Foreground generation failed");
            let message = e.to_string();
            state.send_modify(|s| *s = s.load_failed(message));
            Err(e)
        }
    }
}

/// Drives the round lifecycle and owns the prefetch and ticker tasks.
///
/// All state changes are whole-snapshot replacements on a watch channel, so
/// subscribers only ever see complete transitions. Must be created inside a
/// Tokio runtime.
pub struct RoundController {
    state: Arc<watch::Sender<RoundState>>,
    generator: Arc<dyn PuzzleGenerator>,
    prefetcher: Arc<Prefetcher>,
    feedback: broadcast::Sender<Feedback>,
    ticker: watch::Receiver<Option<HistoryItem>>,
    letter_pool_size: usize,
    max_history: usize,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RoundController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RoundController")
            .field("status", state.status())
            .field("queue_depth", &state.queue_depth())
            .finish_non_exhaustive()
    }
}

impl RoundController {
    /// Creates the controller around an existing session and starts the
    /// prefetch supervisor and history ticker.
    #[instrument(skip_all, fields(max_attempts = config.max_attempts(), max_prefetch = config.max_prefetch()))]
    pub fn new(
        config: &GameConfig,
        generator: Arc<dyn PuzzleGenerator>,
        expander: Arc<dyn PoolExpander>,
        session: Session,
    ) -> Self {
        let initial = RoundState::new(session, *config.max_attempts(), *config.max_prefetch());
        let state = Arc::new(watch::Sender::new(initial));
        let (feedback, _) = broadcast::channel(FEEDBACK_CAPACITY);

        let prefetcher = Arc::new(Prefetcher::new(
            Arc::clone(&state),
            Arc::clone(&generator),
            expander,
            PrefetchSettings {
                debounce: config.prefetch_debounce(),
                cooldown: config.failure_cooldown(),
                letter_pool_size: *config.letter_pool_size(),
                expansion_count: *config.expansion_count(),
            },
        ));

        let (ticker_tx, ticker_rx) = watch::channel(None);
        let tasks = vec![
            tokio::spawn(Arc::clone(&prefetcher).run()),
            tokio::spawn(ticker::run(
                state.subscribe(),
                ticker_tx,
                config.ticker_interval(),
            )),
        ];

        info!("Round controller ready");
        Self {
            state,
            generator,
            prefetcher,
            feedback,
            ticker: ticker_rx,
            letter_pool_size: *config.letter_pool_size(),
            max_history: *config.max_history(),
            tasks: Mutex::new(tasks),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> RoundState {
        self.state.borrow().clone()
    }

    /// Receiver of state snapshots, updated on every transition.
    pub fn subscribe(&self) -> watch::Receiver<RoundState> {
        self.state.subscribe()
    }

    /// Receiver of correct/incorrect/win/lose signals.
    pub fn subscribe_feedback(&self) -> broadcast::Receiver<Feedback> {
        self.feedback.subscribe()
    }

    /// Receiver of the rotating history highlight.
    pub fn ticker(&self) -> watch::Receiver<Option<HistoryItem>> {
        self.ticker.clone()
    }

    /// True while a background generation request is outstanding.
    pub fn is_prefetching(&self) -> bool {
        self.prefetcher.is_in_flight()
    }

    /// Starts the next round.
    ///
    /// With a ready puzzle this completes synchronously. Otherwise the state
    /// moves to Loading and the generator is awaited; on failure the state
    /// returns to Idle with an alert. Calling this while Loading does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GameError`] when the foreground generation fails or yields
    /// an invalid puzzle. If the caller goes away mid-generation the round
    /// still settles.
    #[instrument(skip(self))]
    pub async fn start_new_game(&self) -> Result<(), GameError> {
        let mut loading = false;
        let started = self.state.send_if_modified(|s| match s.start() {
            Some(next) => {
                loading = *next.status() == RoundStatus::Loading;
                *s = next;
                true
            }
            None => false,
        });

        if !started {
            debug!("Start ignored, round already loading");
            return Ok(());
        }
        if !loading {
            info!("Round started from prefetch queue");
            return Ok(());
        }

        let task = tokio::spawn(load_foreground(
            Arc::clone(&self.state),
            Arc::clone(&self.generator),
            self.letter_pool_size,
        ));
        task.await?
    }

    /// Applies a letter click to the round in play.
    ///
    /// Returns `Ok(None)` without touching state when no round is in play or
    /// the letter was already guessed.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Guess`] when the input is not a letter.
    #[instrument(skip(self))]
    pub fn click_letter(&self, letter: char) -> Result<Option<Evaluation>, GameError> {
        let mut outcome: Result<Evaluation, GuessError> = Err(GuessError::NotPlaying);
        self.state.send_if_modified(|s| match s.guess(letter) {
            Ok((next, eval)) => {
                *s = next;
                outcome = Ok(eval);
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });

        let eval = match outcome {
            Ok(eval) => eval,
            Err(GuessError::AlreadyGuessed { .. } | GuessError::NotPlaying) => {
                debug!("Letter click ignored");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.notify(if *eval.correct() {
            Feedback::Correct
        } else {
            Feedback::Incorrect
        });
        match eval.outcome() {
            RoundOutcome::Won => self.notify(Feedback::Win),
            RoundOutcome::Lost => self.notify(Feedback::Lose),
            RoundOutcome::Playing => {}
        }
        Ok(Some(eval))
    }

    /// Replaces the session with an empty one. The current round and the
    /// prefetch queue are kept.
    #[instrument(skip(self))]
    pub fn reset_session(&self) {
        let session = Session::new(self.max_history);
        self.state.send_modify(|s| *s = s.with_session(session));
        info!("Session reset");
    }

    /// Stops the prefetch supervisor and ticker.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        debug!("Background tasks stopped");
    }

    fn notify(&self, signal: Feedback) {
        if let Err(e) = self.feedback.send(signal) {
            trace!(signal = %e.0, "No feedback listeners");
        }
    }
}

impl Drop for RoundController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
