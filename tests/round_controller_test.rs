//! Round lifecycle and prefetch queue behaviour against scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lexilens::{
    Feedback, GameConfig, GameError, GeneratedRound, GenerationError, Outcome, PoolExpander,
    PuzzleGenerator, RoundController, RoundOutcome, RoundStatus, Session,
};
use tokio::time::{Instant, sleep, sleep_until};

const FOREGROUND_DELAY: Duration = Duration::from_millis(10);

fn round(word: &str) -> GeneratedRound {
    GeneratedRound {
        image_url: format!("https://img.example/{}", word.to_lowercase()),
        target_word: word.to_string(),
        caption: format!("A {} in the afternoon sun", word.to_lowercase()),
        metadata: Default::default(),
        letter_pool: None,
    }
}

/// Generator that replays a script of words and failures, then a fallback word.
struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<&'static str, &'static str>>>,
    fallback: &'static str,
    delay: Duration,
    calls: Mutex<Vec<Instant>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(script: Vec<Result<&'static str, &'static str>>) -> Arc<Self> {
        Self::with_delay(script, FOREGROUND_DELAY)
    }

    fn with_delay(script: Vec<Result<&'static str, &'static str>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: "PLANET",
            delay,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PuzzleGenerator for ScriptedGenerator {
    async fn generate_round(&self) -> Result<GeneratedRound, GenerationError> {
        self.calls.lock().unwrap().push(Instant::now());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(word)) => Ok(round(word)),
            Some(Err(message)) => Err(GenerationError::new(message)),
            None => Ok(round(self.fallback)),
        }
    }
}

/// Generator whose task dies mid-request.
struct PanickingGenerator;

#[async_trait]
impl PuzzleGenerator for PanickingGenerator {
    async fn generate_round(&self) -> Result<GeneratedRound, GenerationError> {
        sleep(FOREGROUND_DELAY).await;
        panic!("generator crashed");
    }
}

#[derive(Default)]
struct CountingExpander {
    calls: AtomicUsize,
}

#[async_trait]
impl PoolExpander for CountingExpander {
    async fn expand_pool(&self, _count: usize) -> Result<(), GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config() -> GameConfig {
    GameConfig::default().with_max_attempts(4)
}

fn controller(
    generator: &Arc<ScriptedGenerator>,
    expander: &Arc<CountingExpander>,
) -> RoundController {
    controller_with(&config(), generator, expander)
}

fn controller_with(
    config: &GameConfig,
    generator: &Arc<ScriptedGenerator>,
    expander: &Arc<CountingExpander>,
) -> RoundController {
    RoundController::new(
        config,
        generator.clone(),
        expander.clone(),
        Session::new(12),
    )
}

fn queued_words(controller: &RoundController) -> Vec<String> {
    controller
        .snapshot()
        .prefetch_queue()
        .iter()
        .map(|p| p.target_word().clone())
        .collect()
}

fn current_word(controller: &RoundController) -> Option<String> {
    controller
        .snapshot()
        .current_puzzle()
        .as_ref()
        .map(|p| p.target_word().clone())
}

#[tokio::test(start_paused = true)]
async fn test_no_prefetch_while_idle() {
    let generator = ScriptedGenerator::new(vec![]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    sleep(Duration::from_secs(30)).await;

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Idle);
    assert_eq!(state.queue_depth(), 0);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_start_loads_from_generator() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Playing);
    assert_eq!(current_word(&controller).as_deref(), Some("GARDEN"));
    assert_eq!(state.user_guess_string(), "______");
    assert_eq!(*state.attempts(), 0);
    assert!(state.guessed_letters().is_empty());
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_fills_to_capacity_one_request_at_a_time() {
    let generator = ScriptedGenerator::with_delay(
        vec![Ok("GARDEN"), Ok("BALLOON"), Ok("APPLE")],
        Duration::from_millis(900),
    );
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(60)).await;

    let state = controller.snapshot();
    assert_eq!(state.queue_depth(), 2);
    assert!(!*state.prefetching());
    assert_eq!(generator.call_count(), 3);
    assert_eq!(generator.max_active.load(Ordering::SeqCst), 1);
    assert!(!controller.is_prefetching());
}

#[tokio::test(start_paused = true)]
async fn test_fast_path_start_uses_queue_head() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Ok("BALLOON"), Ok("APPLE")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(controller.snapshot().queue_depth(), 2);
    let calls_before = generator.call_count();

    controller.start_new_game().await.unwrap();

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Playing);
    assert_eq!(current_word(&controller).as_deref(), Some("BALLOON"));
    assert_eq!(state.queue_depth(), 1);
    assert_eq!(generator.call_count(), calls_before);
    // Abandoning a round in play neither archives nor scores it.
    assert!(state.history().is_empty());
    assert_eq!(state.score().won + state.score().lost, 0);
}

#[tokio::test(start_paused = true)]
async fn test_winning_round_then_fast_path_archives_it() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Ok("BALLOON"), Ok("APPLE")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let mut feedback = controller.subscribe_feedback();

    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(10)).await;

    let mut last = None;
    for letter in ['g', 'a', 'r', 'd', 'e', 'n'] {
        last = controller.click_letter(letter).unwrap();
    }
    let last = last.unwrap();
    assert_eq!(*last.outcome(), RoundOutcome::Won);

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Won);
    assert_eq!(state.user_guess_string(), "GARDEN");
    assert_eq!(state.score().won, 1);

    let mut signals = Vec::new();
    while let Ok(signal) = feedback.try_recv() {
        signals.push(signal);
    }
    assert_eq!(signals.len(), 7);
    assert!(signals[..6].iter().all(|s| *s == Feedback::Correct));
    assert_eq!(signals[6], Feedback::Win);

    controller.start_new_game().await.unwrap();

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Playing);
    assert_eq!(current_word(&controller).as_deref(), Some("BALLOON"));
    assert_eq!(state.history().len(), 1);
    let archived = state.history().get(0).unwrap();
    assert_eq!(archived.puzzle().target_word(), "GARDEN");
    assert_eq!(*archived.outcome(), Outcome::Won);
}

#[tokio::test(start_paused = true)]
async fn test_losing_round_signals_lose_after_incorrect() {
    let generator = ScriptedGenerator::new(vec![Ok("BALLOON")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let mut feedback = controller.subscribe_feedback();

    controller.start_new_game().await.unwrap();
    for letter in ['x', 'y', 'z'] {
        let eval = controller.click_letter(letter).unwrap().unwrap();
        assert_eq!(*eval.outcome(), RoundOutcome::Playing);
    }
    let eval = controller.click_letter('q').unwrap().unwrap();
    assert_eq!(*eval.outcome(), RoundOutcome::Lost);
    assert_eq!(*eval.attempts(), 4);

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Lost);
    assert_eq!(state.score().lost, 1);

    let mut signals = Vec::new();
    while let Ok(signal) = feedback.try_recv() {
        signals.push(signal);
    }
    assert_eq!(
        signals,
        vec![
            Feedback::Incorrect,
            Feedback::Incorrect,
            Feedback::Incorrect,
            Feedback::Incorrect,
            Feedback::Lose
        ]
    );

    // Clicks after the round is decided change nothing.
    assert!(controller.click_letter('b').unwrap().is_none());
    assert_eq!(controller.snapshot(), state);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_and_invalid_clicks() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    // Not playing yet.
    assert!(controller.click_letter('g').unwrap().is_none());

    controller.start_new_game().await.unwrap();
    controller.click_letter('z').unwrap();
    let before = controller.snapshot();

    assert!(controller.click_letter('Z').unwrap().is_none());
    assert_eq!(controller.snapshot(), before);

    let err = controller.click_letter('7').unwrap_err();
    assert!(matches!(err, GameError::Guess(_)));
    assert_eq!(controller.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn test_foreground_failure_returns_to_idle_with_alert() {
    let generator = ScriptedGenerator::new(vec![Err("upstream unavailable")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    let err = controller.start_new_game().await.unwrap_err();
    assert!(matches!(err, GameError::Generation(_)));

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Idle);
    assert!(state.current_puzzle().is_none());
    assert!(state.alert().as_deref().unwrap().contains("upstream unavailable"));

    // Idle again, so nothing is prefetched.
    sleep(Duration::from_secs(30)).await;
    assert_eq!(generator.call_count(), 1);

    controller.start_new_game().await.unwrap();
    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Playing);
    assert!(state.alert().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_foreground_puzzle_is_a_failure() {
    let generator = ScriptedGenerator::new(vec![Ok("OX")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    let err = controller.start_new_game().await.unwrap_err();
    assert!(matches!(err, GameError::InvalidPuzzle(_)));
    assert_eq!(*controller.snapshot().status(), RoundStatus::Idle);
    assert!(controller.snapshot().alert().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_start_while_loading_is_ignored() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    let (first, second) = tokio::join!(controller.start_new_game(), controller.start_new_game());
    first.unwrap();
    second.unwrap();

    assert_eq!(generator.call_count(), 1);
    assert_eq!(current_word(&controller).as_deref(), Some("GARDEN"));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_start_still_settles_the_round() {
    let generator = ScriptedGenerator::with_delay(vec![Ok("GARDEN")], Duration::from_secs(3));
    let expander = Arc::new(CountingExpander::default());
    let controller = Arc::new(controller(&generator, &expander));

    let caller = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.start_new_game().await })
    };
    sleep(Duration::from_millis(100)).await;
    assert_eq!(*controller.snapshot().status(), RoundStatus::Loading);
    caller.abort();

    sleep(Duration::from_secs(60)).await;

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Playing);
    assert_eq!(current_word(&controller).as_deref(), Some("GARDEN"));
    assert!(state.alert().is_none());

    controller.start_new_game().await.unwrap();
    assert_eq!(*controller.snapshot().status(), RoundStatus::Playing);
    assert_eq!(current_word(&controller).as_deref(), Some("PLANET"));
}

#[tokio::test(start_paused = true)]
async fn test_crashed_foreground_generation_returns_to_idle() {
    let expander = Arc::new(CountingExpander::default());
    let controller = RoundController::new(
        &config(),
        Arc::new(PanickingGenerator),
        expander,
        Session::new(12),
    );

    let err = controller.start_new_game().await.unwrap_err();
    assert!(matches!(err, GameError::Interrupted(_)));

    let state = controller.snapshot();
    assert_eq!(*state.status(), RoundStatus::Idle);
    assert!(state.current_puzzle().is_none());
    assert!(state.alert().as_deref().unwrap().contains("interrupted"));
}

#[tokio::test(start_paused = true)]
async fn test_late_background_result_joins_queue_tail() {
    let generator = ScriptedGenerator::with_delay(
        vec![Ok("GARDEN"), Ok("BALLOON"), Ok("APPLE"), Ok("MANGO")],
        Duration::from_millis(900),
    );
    let expander = Arc::new(CountingExpander::default());
    let config = config().with_max_prefetch(3);
    let controller = controller_with(&config, &generator, &expander);
    let t0 = Instant::now();

    // Foreground ends at 0.9s; background requests run 1.9-2.8, 3.8-4.7 and 5.7-6.6.
    controller.start_new_game().await.unwrap();
    sleep_until(t0 + Duration::from_secs(6)).await;
    assert_eq!(queued_words(&controller), vec!["BALLOON", "APPLE"]);
    assert!(*controller.snapshot().prefetching());

    for letter in ['g', 'a', 'r', 'd', 'e', 'n'] {
        controller.click_letter(letter).unwrap();
    }
    controller.start_new_game().await.unwrap();
    assert_eq!(current_word(&controller).as_deref(), Some("BALLOON"));
    assert_eq!(queued_words(&controller), vec!["APPLE"]);

    sleep_until(t0 + Duration::from_millis(6700)).await;

    let state = controller.snapshot();
    assert_eq!(queued_words(&controller), vec!["APPLE", "MANGO"]);
    assert!(state.queue_depth() <= *state.max_prefetch());
    assert_eq!(current_word(&controller).as_deref(), Some("BALLOON"));
    assert_eq!(state.history().len(), 1);
    assert_eq!(generator.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_failure_sets_retrying_and_cools_down() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Err("rate limited"), Ok("APPLE")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let mut rx = controller.subscribe();

    controller.start_new_game().await.unwrap();

    rx.wait_for(|s| *s.retrying()).await.unwrap();
    assert_eq!(controller.snapshot().queue_depth(), 0);
    assert_eq!(*controller.snapshot().status(), RoundStatus::Playing);

    rx.wait_for(|s| s.queue_depth() == 1).await.unwrap();
    assert!(!*controller.snapshot().retrying());

    let times = generator.call_times();
    let failed_at = times[1];
    let retried_at = times[2];
    assert!(retried_at - failed_at >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_background_puzzle_is_discarded() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Ok("AB"), Ok("APPLE")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let mut rx = controller.subscribe();

    controller.start_new_game().await.unwrap();
    rx.wait_for(|s| s.queue_depth() == 1).await.unwrap();

    let state = controller.snapshot();
    assert_eq!(state.prefetch_queue()[0].target_word(), "APPLE");
    assert!(!*state.retrying());
    assert!(state.alert().is_none());
    assert_eq!(generator.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_restarts_on_state_change() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    sleep(Duration::from_millis(800)).await;
    controller.click_letter('g').unwrap();

    sleep(Duration::from_millis(800)).await;
    assert_eq!(generator.call_count(), 1);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pool_expansion_fires_once() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Ok("BALLOON"), Ok("APPLE")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(expander.calls.load(Ordering::SeqCst), 1);

    // Drain and refill the queue to depth two again.
    controller.start_new_game().await.unwrap();
    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(controller.snapshot().queue_depth(), 2);
    assert_eq!(expander.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_only_see_whole_snapshots() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let mut rx = controller.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = 0;
        while rx.changed().await.is_ok() {
            let state = (*rx.borrow_and_update()).clone();
            seen += 1;
            if *state.status() == RoundStatus::Playing {
                let puzzle = state.current_puzzle().as_ref().expect("puzzle while playing");
                assert_eq!(state.user_guess().len(), *puzzle.word_length());
            }
            if *state.status() == RoundStatus::Loading {
                assert!(state.current_puzzle().is_none());
            }
            assert!(state.queue_depth() <= *state.max_prefetch());
            if seen >= 5 {
                return seen;
            }
        }
        seen
    });

    controller.start_new_game().await.unwrap();
    controller.click_letter('g').unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(watcher.await.unwrap(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_highlights_history() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN"), Ok("BALLOON")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let ticker = controller.ticker();

    controller.start_new_game().await.unwrap();
    for letter in ['g', 'a', 'r', 'd', 'e', 'n'] {
        controller.click_letter(letter).unwrap();
    }
    controller.start_new_game().await.unwrap();
    sleep(Duration::from_secs(9)).await;

    let highlighted = (*ticker.borrow()).clone().unwrap();
    assert_eq!(highlighted.puzzle().target_word(), "GARDEN");
}

#[tokio::test(start_paused = true)]
async fn test_reset_session_keeps_round() {
    let generator = ScriptedGenerator::new(vec![Ok("BALLOON"), Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    for letter in ['w', 'x', 'y', 'z'] {
        controller.click_letter(letter).unwrap();
    }
    controller.start_new_game().await.unwrap();
    assert_eq!(controller.snapshot().history().len(), 1);

    controller.reset_session();

    let state = controller.snapshot();
    assert!(state.history().is_empty());
    assert_eq!(state.score().lost, 0);
    assert_eq!(*state.status(), RoundStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_background_work() {
    let generator = ScriptedGenerator::new(vec![Ok("GARDEN")]);
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);

    controller.start_new_game().await.unwrap();
    controller.shutdown();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(generator.call_count(), 1);
    assert_eq!(controller.snapshot().queue_depth(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_fetch_clears_prefetching() {
    let generator = ScriptedGenerator::with_delay(vec![Ok("GARDEN")], Duration::from_millis(900));
    let expander = Arc::new(CountingExpander::default());
    let controller = controller(&generator, &expander);
    let t0 = Instant::now();

    controller.start_new_game().await.unwrap();
    // The background request runs from 1.9s to 2.8s.
    sleep_until(t0 + Duration::from_millis(2300)).await;
    assert!(*controller.snapshot().prefetching());
    assert!(controller.is_prefetching());

    controller.shutdown();
    sleep(Duration::from_millis(10)).await;

    let state = controller.snapshot();
    assert!(!*state.prefetching());
    assert!(!controller.is_prefetching());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(generator.call_count(), 2);
    assert_eq!(controller.snapshot().queue_depth(), 0);
}
