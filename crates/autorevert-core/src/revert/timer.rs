//! Revert timer state machine.
//!
//! The timer is tick-driven: it never reads the wall clock. The caller feeds
//! it one `on_timer()` per clock tick and the timer converts ticks to seconds
//! using the clock's fixed period.
//!
//! ## State Transitions
//!
//! ```text
//! Disabled --start--> Idle --commit--> Armed --tick (elapsed >= threshold)--> Idle
//!                      ^                 |  \--commit--> Armed (elapsed reset)
//!                      \---rolled back---/
//! any --stop--> Disabled
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = RevertTimer::new(threshold, period);
//! timer.start();
//! timer.on_commit();
//! // Once per tick:
//! if let Some(Event::RevertTriggered { .. }) = timer.on_timer() {
//!     revert_action.revert_last_commit();
//! }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::settings::{Threshold, TickPeriod};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RevertState {
    Disabled,
    /// Enabled, waiting for a commit.
    Idle,
    /// Counting down since the most recent qualifying commit.
    Armed { elapsed_ticks: u64 },
}

/// Everything the timer reacts to. All public operations funnel through
/// [`RevertTimer::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Start,
    Stop,
    Commit,
    Tick,
    AllChangesRolledBack,
    NewThreshold(Threshold),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertTimer {
    state: RevertState,
    threshold: Threshold,
    period: TickPeriod,
}

impl RevertTimer {
    /// Create a disabled timer. Nothing happens until `start()`.
    pub fn new(threshold: Threshold, period: TickPeriod) -> Self {
        Self {
            state: RevertState::Disabled,
            threshold,
            period,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> RevertState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, RevertState::Disabled)
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, RevertState::Armed { .. })
    }

    pub fn elapsed_ticks(&self) -> u64 {
        match self.state {
            RevertState::Armed { elapsed_ticks } => elapsed_ticks,
            _ => 0,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn period(&self) -> TickPeriod {
        self.period
    }

    /// Whole seconds left before the revert fires, rounded up.
    /// `None` unless armed.
    pub fn seconds_till_revert(&self) -> Option<u64> {
        match self.state {
            RevertState::Armed { elapsed_ticks } => {
                let remaining_ms = self
                    .threshold
                    .as_millis()
                    .saturating_sub(self.period.elapsed_ms(elapsed_ticks));
                Some(remaining_ms.div_ceil(1000))
            }
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            threshold_secs: self.threshold.as_secs(),
            tick_period_ms: self.period.as_millis(),
            seconds_till_revert: self.seconds_till_revert(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.handle(Input::Start)
    }

    pub fn stop(&mut self) -> Option<Event> {
        self.handle(Input::Stop)
    }

    pub fn on_commit(&mut self) -> Option<Event> {
        self.handle(Input::Commit)
    }

    /// Call once per clock tick regardless of state. Returns
    /// `Some(Event::RevertTriggered)` exactly once per arming cycle.
    pub fn on_timer(&mut self) -> Option<Event> {
        self.handle(Input::Tick)
    }

    pub fn on_all_changes_rolled_back(&mut self) -> Option<Event> {
        self.handle(Input::AllChangesRolledBack)
    }

    /// Replace the threshold. Elapsed ticks are kept; the comparison runs on
    /// the next tick.
    pub fn on_new_settings(&mut self, threshold: Threshold) -> Option<Event> {
        self.handle(Input::NewThreshold(threshold))
    }

    /// The single transition function.
    pub fn handle(&mut self, input: Input) -> Option<Event> {
        let at = Utc::now();
        match (self.state, input) {
            (RevertState::Disabled, Input::Start) => {
                self.state = RevertState::Idle;
                Some(Event::AutoRevertStarted {
                    threshold_secs: self.threshold.as_secs(),
                    at,
                })
            }
            (_, Input::Start) => None,

            (RevertState::Disabled, Input::Stop) => None,
            (_, Input::Stop) => {
                self.state = RevertState::Disabled;
                Some(Event::AutoRevertStopped { at })
            }

            (RevertState::Idle, Input::Commit) => {
                self.state = RevertState::Armed { elapsed_ticks: 0 };
                Some(Event::CountdownArmed {
                    threshold_secs: self.threshold.as_secs(),
                    at,
                })
            }
            (RevertState::Armed { elapsed_ticks }, Input::Commit) => {
                self.state = RevertState::Armed { elapsed_ticks: 0 };
                Some(Event::CountdownRearmed {
                    discarded_ticks: elapsed_ticks,
                    threshold_secs: self.threshold.as_secs(),
                    at,
                })
            }
            (RevertState::Disabled, Input::Commit) => None,

            (RevertState::Armed { elapsed_ticks }, Input::Tick) => {
                let elapsed_ticks = elapsed_ticks.saturating_add(1);
                if self.period.elapsed_ms(elapsed_ticks) >= self.threshold.as_millis() {
                    // Disarm in the same step that decides to revert.
                    self.state = RevertState::Idle;
                    Some(Event::RevertTriggered {
                        elapsed_ticks,
                        threshold_secs: self.threshold.as_secs(),
                        at,
                    })
                } else {
                    self.state = RevertState::Armed { elapsed_ticks };
                    Some(Event::Countdown {
                        elapsed_ticks,
                        remaining_secs: self.seconds_till_revert().unwrap_or(0),
                        at,
                    })
                }
            }
            (_, Input::Tick) => None,

            (RevertState::Armed { .. }, Input::AllChangesRolledBack) => {
                self.state = RevertState::Idle;
                Some(Event::CountdownDisarmed { at })
            }
            (_, Input::AllChangesRolledBack) => None,

            (_, Input::NewThreshold(threshold)) => {
                let previous = self.threshold;
                self.threshold = threshold;
                Some(Event::SettingsChanged {
                    threshold_secs: threshold.as_secs(),
                    previous_threshold_secs: previous.as_secs(),
                    at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(threshold_secs: u64) -> RevertTimer {
        RevertTimer::new(
            Threshold::from_secs(threshold_secs).unwrap(),
            TickPeriod::from_millis(1000).unwrap(),
        )
    }

    fn is_trigger(event: &Option<Event>) -> bool {
        matches!(event, Some(Event::RevertTriggered { .. }))
    }

    #[test]
    fn starts_disabled() {
        let t = timer(3);
        assert_eq!(t.state(), RevertState::Disabled);
        assert!(!t.is_started());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut t = timer(3);
        assert!(t.start().is_some());
        assert!(t.start().is_none());
        assert!(t.is_started());

        assert!(t.stop().is_some());
        assert!(t.stop().is_none());
        assert!(!t.is_started());
    }

    #[test]
    fn reverts_on_third_tick_and_returns_to_idle() {
        let mut t = timer(3);
        t.start();
        t.on_commit();
        assert!(!is_trigger(&t.on_timer()));
        assert!(!is_trigger(&t.on_timer()));
        assert!(is_trigger(&t.on_timer()));
        assert_eq!(t.state(), RevertState::Idle);
        assert_eq!(t.elapsed_ticks(), 0);
        assert!(t.on_timer().is_none());
    }

    #[test]
    fn stop_mid_countdown_cancels_revert() {
        let mut t = timer(5);
        t.start();
        t.on_commit();
        t.on_timer();
        t.on_timer();
        t.stop();
        for _ in 0..10 {
            assert!(t.on_timer().is_none());
        }
        assert!(!t.is_started());
    }

    #[test]
    fn commit_while_disabled_is_ignored() {
        let mut t = timer(1);
        assert!(t.on_commit().is_none());
        assert_eq!(t.state(), RevertState::Disabled);
        assert!(t.on_timer().is_none());
        assert!(!t.is_started());
    }

    #[test]
    fn second_commit_restarts_countdown() {
        let mut t = timer(3);
        t.start();
        t.on_commit();
        t.on_timer();
        t.on_timer();
        match t.on_commit() {
            Some(Event::CountdownRearmed { discarded_ticks, .. }) => assert_eq!(discarded_ticks, 2),
            other => panic!("expected re-arm, got {other:?}"),
        }
        assert!(!is_trigger(&t.on_timer()));
        assert!(!is_trigger(&t.on_timer()));
        assert!(is_trigger(&t.on_timer()));
    }

    #[test]
    fn lowered_threshold_fires_on_next_tick() {
        let mut t = timer(100);
        t.start();
        t.on_commit();
        for _ in 0..5 {
            t.on_timer();
        }
        t.on_new_settings(Threshold::from_secs(2).unwrap());
        // No retroactive firing outside a tick.
        assert!(t.is_armed());
        assert_eq!(t.elapsed_ticks(), 5);
        assert!(is_trigger(&t.on_timer()));
    }

    #[test]
    fn new_settings_keep_state_and_elapsed() {
        let mut t = timer(10);
        t.on_new_settings(Threshold::from_secs(4).unwrap());
        assert_eq!(t.state(), RevertState::Disabled);

        t.start();
        t.on_commit();
        t.on_timer();
        t.on_new_settings(Threshold::from_secs(4).unwrap());
        assert_eq!(t.state(), RevertState::Armed { elapsed_ticks: 1 });
        assert_eq!(t.threshold().as_secs(), 4);
    }

    #[test]
    fn rollback_disarms_only_when_armed() {
        let mut t = timer(3);
        assert!(t.on_all_changes_rolled_back().is_none());
        t.start();
        assert!(t.on_all_changes_rolled_back().is_none());
        t.on_commit();
        t.on_timer();
        assert!(matches!(
            t.on_all_changes_rolled_back(),
            Some(Event::CountdownDisarmed { .. })
        ));
        assert_eq!(t.state(), RevertState::Idle);
        for _ in 0..5 {
            assert!(t.on_timer().is_none());
        }
    }

    #[test]
    fn sub_second_period_converts_ticks_to_seconds() {
        let mut t = RevertTimer::new(
            Threshold::from_secs(1).unwrap(),
            TickPeriod::from_millis(250).unwrap(),
        );
        t.start();
        t.on_commit();
        for _ in 0..3 {
            assert!(!is_trigger(&t.on_timer()));
        }
        assert!(is_trigger(&t.on_timer()));
    }

    #[test]
    fn seconds_till_revert_counts_down() {
        let mut t = timer(3);
        assert_eq!(t.seconds_till_revert(), None);
        t.start();
        t.on_commit();
        assert_eq!(t.seconds_till_revert(), Some(3));
        match t.on_timer() {
            Some(Event::Countdown { remaining_secs, elapsed_ticks, .. }) => {
                assert_eq!(remaining_secs, 2);
                assert_eq!(elapsed_ticks, 1);
            }
            other => panic!("expected countdown, got {other:?}"),
        }
    }

    #[test]
    fn snapshot_reports_state() {
        let mut t = timer(3);
        t.start();
        t.on_commit();
        match t.snapshot() {
            Event::StateSnapshot { state, threshold_secs, seconds_till_revert, .. } => {
                assert_eq!(state, RevertState::Armed { elapsed_ticks: 0 });
                assert_eq!(threshold_secs, 3);
                assert_eq!(seconds_till_revert, Some(3));
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(RevertState::Armed { elapsed_ticks: 2 }).unwrap();
        assert_eq!(json["state"], "armed");
        assert_eq!(json["elapsed_ticks"], 2);
    }
}
