//! JSON HTTP API over a shared round controller.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use lexilens_core::{HistoryItem, Outcome, RoundOutcome, RoundState, RoundStatus, Score};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tracing::{info, instrument, warn};

use crate::controller::{GameError, RoundController};

/// Client-facing view of the round state.
///
/// The target word is only present once the round is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    /// Lifecycle status.
    pub status: RoundStatus,
    /// Image reference of the round in play.
    pub image_url: Option<String>,
    /// Caption with the word blanked out.
    pub caption: Option<String>,
    /// Letters in the target word.
    pub word_length: Option<usize>,
    /// Clickable letters.
    pub letter_pool: Vec<char>,
    /// Revealed word with blanks.
    pub user_guess: String,
    /// Letters clicked so far, sorted.
    pub guessed_letters: Vec<char>,
    /// Incorrect guesses so far.
    pub attempts: u32,
    /// Incorrect guesses allowed.
    pub max_attempts: u32,
    /// Target word, once Won or Lost.
    pub target_word: Option<String>,
    /// Session tally.
    pub score: Score,
    /// Finished rounds, newest first.
    pub history: Vec<HistoryView>,
    /// Ready puzzles waiting.
    pub queue_depth: usize,
    /// Background fetch outstanding.
    pub prefetching: bool,
    /// Last background fetch failed.
    pub retrying: bool,
    /// Last foreground failure message.
    pub alert: Option<String>,
}

impl From<&RoundState> for StateView {
    fn from(state: &RoundState) -> Self {
        let puzzle = state.current_puzzle().as_deref();
        let decided = state.status().is_finished();
        Self {
            status: *state.status(),
            image_url: puzzle.map(|p| p.image_url().clone()),
            caption: puzzle.map(|p| p.redacted_caption().clone()),
            word_length: puzzle.map(|p| *p.word_length()),
            letter_pool: puzzle.map(|p| p.letter_pool().clone()).unwrap_or_default(),
            user_guess: state.user_guess_string(),
            guessed_letters: state.guessed_letters().iter().copied().collect(),
            attempts: *state.attempts(),
            max_attempts: *state.max_attempts(),
            target_word: puzzle
                .filter(|_| decided)
                .map(|p| p.target_word().clone()),
            score: state.score(),
            history: state.history().iter().map(HistoryView::from).collect(),
            queue_depth: state.queue_depth(),
            prefetching: *state.prefetching(),
            retrying: *state.retrying(),
            alert: state.alert().clone(),
        }
    }
}

/// A finished round as shown in the history strip and ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    /// The solved or missed word.
    pub word: String,
    /// Round result.
    pub outcome: Outcome,
    /// Image reference.
    pub image_url: String,
    /// Redacted caption.
    pub caption: String,
    /// When the round was archived.
    pub archived_at: DateTime<Utc>,
}

impl From<&HistoryItem> for HistoryView {
    fn from(item: &HistoryItem) -> Self {
        Self {
            word: item.puzzle().target_word().clone(),
            outcome: *item.outcome(),
            image_url: item.puzzle().image_url().clone(),
            caption: item.puzzle().redacted_caption().clone(),
            archived_at: *item.archived_at(),
        }
    }
}

/// Response to a letter click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessView {
    /// False when the click was ignored.
    pub accepted: bool,
    /// Whether the letter occurs in the word, when accepted.
    pub correct: Option<bool>,
    /// Round result after the click, when accepted.
    pub outcome: Option<RoundOutcome>,
    /// State after the click.
    pub state: StateView,
}

/// Error payload for rejected requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Builds the API router with request logging.
pub fn router(controller: Arc<RoundController>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/game", post(start_game))
        .route("/api/guess/{letter}", post(guess_letter))
        .route("/api/ticker", get(get_ticker))
        .with_state(controller)
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
}

#[instrument(skip(controller))]
async fn get_state(State(controller): State<Arc<RoundController>>) -> Json<StateView> {
    Json(StateView::from(&controller.snapshot()))
}

#[instrument(skip(controller))]
async fn start_game(
    State(controller): State<Arc<RoundController>>,
) -> (StatusCode, Json<StateView>) {
    let status = match controller.start_new_game().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Start game failed");
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(StateView::from(&controller.snapshot())))
}

#[instrument(skip(controller))]
async fn guess_letter(
    State(controller): State<Arc<RoundController>>,
    Path(letter): Path<String>,
) -> Result<Json<GuessView>, ApiError> {
    let mut chars = letter.chars();
    let clicked = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(bad_request(format!("expected a single letter, got {letter:?}"))),
    };

    let eval = controller
        .click_letter(clicked)
        .map_err(|e: GameError| bad_request(e.to_string()))?;

    Ok(Json(GuessView {
        accepted: eval.is_some(),
        correct: eval.as_ref().map(|e| *e.correct()),
        outcome: eval.as_ref().map(|e| *e.outcome()),
        state: StateView::from(&controller.snapshot()),
    }))
}

#[instrument(skip(controller))]
async fn get_ticker(
    State(controller): State<Arc<RoundController>>,
) -> Json<Option<HistoryView>> {
    let ticker = controller.ticker();
    let item = ticker.borrow().as_ref().map(HistoryView::from);
    Json(item)
}
