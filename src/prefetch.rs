//! Background prefetching of puzzles into the bounded ready queue.
//!
//! A single supervisor task watches round snapshots and keeps the queue
//! topped up: one request at a time, a debounce before each request, and a
//! cooldown after a failure. When the queue first holds
//! [`EXPANSION_TRIGGER_DEPTH`] puzzles, a one-time content pool expansion is
//! fired off and never awaited.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lexilens_core::{Puzzle, RoundState};
use tokio::sync::watch;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, instrument, warn};

use crate::generator::{PoolExpander, PuzzleGenerator};

/// Queue depth that triggers the one-time pool expansion.
pub const EXPANSION_TRIGGER_DEPTH: usize = 2;

/// Timing and sizing knobs for the prefetcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PrefetchSettings {
    pub debounce: Duration,
    pub cooldown: Duration,
    pub letter_pool_size: usize,
    pub expansion_count: usize,
}

/// Clears the in-flight flag and the prefetching indicator when a fetch ends,
/// including when the supervisor is aborted mid-request.
struct InFlightGuard<'a> {
    prefetcher: &'a Prefetcher,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.prefetcher.state.send_if_modified(|s| {
            if *s.prefetching() {
                *s = s.with_prefetching(false);
                true
            } else {
                false
            }
        });
        self.prefetcher.in_flight.store(false, Ordering::Release);
    }
}

/// Owns the in-flight flag, the cooldown deadline and the expansion latch.
pub(crate) struct Prefetcher {
    state: Arc<watch::Sender<RoundState>>,
    generator: Arc<dyn PuzzleGenerator>,
    expander: Arc<dyn PoolExpander>,
    settings: PrefetchSettings,
    in_flight: AtomicBool,
    expansion_triggered: AtomicBool,
    cooldown_until: Mutex<Option<Instant>>,
}

impl Prefetcher {
    pub(crate) fn new(
        state: Arc<watch::Sender<RoundState>>,
        generator: Arc<dyn PuzzleGenerator>,
        expander: Arc<dyn PoolExpander>,
        settings: PrefetchSettings,
    ) -> Self {
        Self {
            state,
            generator,
            expander,
            settings,
            in_flight: AtomicBool::new(false),
            expansion_triggered: AtomicBool::new(false),
            cooldown_until: Mutex::new(None),
        }
    }

    /// True while a background request is outstanding.
    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Remaining cooldown deadline, clearing it once expired.
    fn cooldown_deadline(&self) -> Option<Instant> {
        let mut guard = self.cooldown_until.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            Some(deadline) if deadline > Instant::now() => Some(deadline),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }

    fn start_cooldown(&self) {
        let deadline = Instant::now() + self.settings.cooldown;
        *self.cooldown_until.lock().unwrap_or_else(|e| e.into_inner()) = Some(deadline);
    }

    /// Supervisor loop. Runs until the state sender is gone or the task is aborted.
    #[instrument(skip(self))]
    pub(crate) async fn run(self: Arc<Self>) {
        let mut rx = self.state.subscribe();
        info!("Prefetch supervisor started");

        loop {
            let ready = rx.wait_for(|s| s.wants_prefetch()).await.map(|_| ());
            if ready.is_err() {
                debug!("Round state closed, stopping prefetch supervisor");
                return;
            }

            if let Some(deadline) = self.cooldown_deadline() {
                debug!("Prefetch cooling down");
                sleep_until(deadline).await;
                continue;
            }

            // Debounce: any state change restarts the wait.
            tokio::select! {
                _ = sleep(self.settings.debounce) => {}
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
            }

            let still_wanted = self.state.borrow().wants_prefetch();
            if !still_wanted {
                continue;
            }
            self.fetch_one().await;
        }
    }

    /// Issues one background request unless another is already in flight.
    #[instrument(skip(self))]
    pub(crate) async fn fetch_one(&self) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Prefetch already in flight");
            return;
        }
        let in_flight = InFlightGuard { prefetcher: self };
        self.state.send_modify(|s| *s = s.with_prefetching(true));

        let result = self.generator.generate_round().await;

        let mut depth = None;
        match result {
            Ok(raw) => {
                let parsed =
                    Puzzle::from_generated(raw, self.settings.letter_pool_size, &mut rand::rng());
                match parsed {
                    Ok(puzzle) => {
                        let puzzle = Arc::new(puzzle);
                        self.state.send_modify(|s| {
                            let cleared = s.with_prefetching(false).with_retrying(false);
                            *s = match cleared.enqueue(puzzle) {
                                Some(next) => {
                                    depth = Some(next.queue_depth());
                                    next
                                }
                                None => cleared,
                            };
                        });
                        info!(?depth, "Prefetched puzzle");
                    }
                    Err(e) => {
                        debug!(error = %e, "Discarding invalid prefetched puzzle");
                        self.state.send_modify(|s| *s = s.with_prefetching(false));
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, cooldown = ?self.settings.cooldown, "Background generation failed");
                self.start_cooldown();
                self.state
                    .send_modify(|s| *s = s.with_prefetching(false).with_retrying(true));
            }
        }

        drop(in_flight);

        if depth == Some(EXPANSION_TRIGGER_DEPTH) {
            self.expand_pool_once();
        }
    }

    /// Fires the content pool expansion the first time it is called.
    fn expand_pool_once(&self) {
        if self.expansion_triggered.swap(true, Ordering::AcqRel) {
            return;
        }

        let expander = Arc::clone(&self.expander);
        let count = self.settings.expansion_count;
        info!(count, "Triggering one-time content pool expansion");
        tokio::spawn(async move {
            match expander.expand_pool(count).await {
                Ok(()) => info!("Content pool expansion finished"),
                Err(e) => warn!(error = %e, "Content pool expansion failed"),
            }
        });
    }
}
