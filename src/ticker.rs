//! Rotating highlight over the session history.

use std::time::Duration;

use lexilens_core::{History, HistoryItem, RoundState};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument, trace};

/// Picks the item after `cursor`, wrapping around. Returns the item and the
/// new cursor; an empty history yields `None`.
pub fn next_highlight(history: &History, cursor: usize) -> (Option<HistoryItem>, usize) {
    if history.is_empty() {
        return (None, 0);
    }
    let next = (cursor + 1) % history.len();
    (history.get(next).cloned(), next)
}

/// Publishes the next history item every `period` until the round state
/// closes or the task is aborted.
#[instrument(skip(state, highlight))]
pub(crate) async fn run(
    state: watch::Receiver<RoundState>,
    highlight: watch::Sender<Option<HistoryItem>>,
    period: Duration,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // None until the first item is shown, so the newest round leads.
    let mut cursor: Option<usize> = None;

    loop {
        tick.tick().await;
        if state.has_changed().is_err() {
            debug!("Round state closed, stopping ticker");
            return;
        }

        let (item, next) = {
            let snapshot = state.borrow();
            match cursor {
                None => (snapshot.history().get(0).cloned(), 0),
                Some(c) => next_highlight(snapshot.history(), c),
            }
        };
        cursor = item.as_ref().map(|_| next);

        trace!(?cursor, "Ticker advanced");
        highlight.send_if_modified(|current| {
            if *current == item {
                false
            } else {
                *current = item;
                true
            }
        });
    }
}
