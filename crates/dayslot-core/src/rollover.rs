//! Day rollover: purge finished items and defer unfinished ones.
//!
//! The engine runs on demand (foreground, refresh) rather than on a timer.
//! It remembers the start of the last window it handled and does nothing
//! until "now" has moved into a later window.
//!
//! # Policy
//! Items anchored to an external instant are judged by that instant:
//! - anchor before the window start and Done: deleted
//! - anchor before the window start and not Done: becomes a must-do in
//!   Morning, re-anchored at the window start, remembering the original
//!   anchor in `deferred_from`
//! - linked and anchored at or after the window end: deleted (the next
//!   reconcile brings it back once it is in range)
//!
//! Undated items are judged by their completion time when Done and their
//! creation time otherwise. From a previous window, Done items are deleted
//! and open items lose their category.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TimeMathError;
use crate::item::{Category, Item, ItemStore, Kind};
use crate::window::{active_window, DayWindow, TimeWindowConfig};

/// Outcome of [`DayRolloverEngine::rollover`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverSummary {
    /// Window the pass ran for, if it could be computed.
    pub window: Option<DayWindow>,
    /// False when the window had already been handled.
    pub ran: bool,
    /// Finished items removed.
    pub purged: usize,
    /// Anchored items pushed into the new window.
    pub deferred: usize,
    /// Undated items returned to the backlog.
    pub uncategorized: usize,
    /// Linked items anchored beyond the window.
    pub dropped: usize,
}

impl RolloverSummary {
    fn idle(window: Option<DayWindow>) -> Self {
        Self {
            window,
            ran: false,
            purged: 0,
            deferred: 0,
            uncategorized: 0,
            dropped: 0,
        }
    }

    pub fn mutations(&self) -> usize {
        self.purged + self.deferred + self.uncategorized + self.dropped
    }

    /// One-line human-readable description.
    pub fn message(&self) -> String {
        if !self.ran {
            return "rollover: nothing to do".to_string();
        }
        format!(
            "rollover: {} purged, {} deferred, {} uncategorized, {} dropped",
            self.purged, self.deferred, self.uncategorized, self.dropped
        )
    }
}

enum Disposition {
    Keep,
    Delete,
    Replace(Item),
}

/// Computes the active window and performs the purge/defer pass.
#[derive(Debug, Clone, Default)]
pub struct DayRolloverEngine {
    last_window_start: Option<NaiveDateTime>,
}

impl DayRolloverEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that already handled the window starting at `start`.
    pub fn resume(last_window_start: Option<NaiveDateTime>) -> Self {
        Self { last_window_start }
    }

    /// Start of the last window a pass ran for.
    pub fn last_window_start(&self) -> Option<NaiveDateTime> {
        self.last_window_start
    }

    /// `[rollover, next rollover)` around `now`.
    pub fn active_window(
        &self,
        now: NaiveDateTime,
        windows: &TimeWindowConfig,
    ) -> Result<DayWindow, TimeMathError> {
        active_window(now, windows.rollover_time())
    }

    /// Roll the store over into the window containing `now`.
    ///
    /// Repeated calls within one window are no-ops.
    pub fn rollover(
        &mut self,
        store: &mut ItemStore,
        now: NaiveDateTime,
        windows: &TimeWindowConfig,
    ) -> RolloverSummary {
        let window = match self.active_window(now, windows) {
            Ok(window) => window,
            Err(e) => {
                warn!(error = %e, "cannot compute active window, skipping rollover");
                return RolloverSummary::idle(None);
            }
        };

        if self.last_window_start.is_some_and(|last| last >= window.start) {
            debug!(window_start = %window.start, "window already rolled over");
            return RolloverSummary::idle(Some(window));
        }

        let mut summary = RolloverSummary::idle(Some(window));
        summary.ran = true;

        let snapshot = store.items().to_vec();
        for item in snapshot {
            match dispose(&item, &window) {
                Disposition::Keep => {}
                Disposition::Delete => {
                    if store.delete(&item.id).is_some() {
                        if item.is_anchored() && item.start_time >= Some(window.end) {
                            summary.dropped += 1;
                        } else {
                            summary.purged += 1;
                        }
                    }
                }
                Disposition::Replace(next) => {
                    let deferred = next.is_anchored();
                    match store.update(next) {
                        Ok(true) if deferred => summary.deferred += 1,
                        Ok(true) => summary.uncategorized += 1,
                        Ok(false) => {}
                        Err(e) => warn!(item = %item.id, error = %e, "rollover update rejected"),
                    }
                }
            }
        }

        self.last_window_start = Some(window.start);
        info!(
            window_start = %window.start,
            purged = summary.purged,
            deferred = summary.deferred,
            uncategorized = summary.uncategorized,
            dropped = summary.dropped,
            "rollover finished"
        );
        summary
    }
}

fn dispose(item: &Item, window: &DayWindow) -> Disposition {
    match item.start_time {
        Some(at) if at < window.start => {
            if item.is_done() {
                return Disposition::Delete;
            }
            let mut next = item.clone();
            next.kind = Kind::MustDo;
            next.category = Some(Category::Morning);
            next.deferred_from.get_or_insert(at);
            next.start_time = Some(window.start);
            Disposition::Replace(next)
        }
        Some(at) if at >= window.end && item.is_linked() => Disposition::Delete,
        Some(_) => Disposition::Keep,
        None => {
            let reference = if item.is_done() {
                item.completed_at.unwrap_or(item.created_at)
            } else {
                item.created_at
            };
            if reference >= window.start {
                Disposition::Keep
            } else if item.is_done() {
                Disposition::Delete
            } else if item.category.is_some() {
                let mut next = item.clone();
                next.category = None;
                Disposition::Replace(next)
            } else {
                Disposition::Keep
            }
        }
    }
}
