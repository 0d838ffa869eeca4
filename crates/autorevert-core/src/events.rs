use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::revert::RevertState;

/// Every state change of the revert timer produces an Event.
/// Notifiers subscribe to them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    AutoRevertStarted {
        threshold_secs: u64,
        at: DateTime<Utc>,
    },
    AutoRevertStopped {
        at: DateTime<Utc>,
    },
    /// A qualifying commit armed an idle timer.
    CountdownArmed {
        threshold_secs: u64,
        at: DateTime<Utc>,
    },
    /// A new commit restarted a countdown that was already running.
    CountdownRearmed {
        discarded_ticks: u64,
        threshold_secs: u64,
        at: DateTime<Utc>,
    },
    /// All changes were rolled back by hand; nothing left to revert.
    CountdownDisarmed {
        at: DateTime<Utc>,
    },
    /// Armed tick that did not reach the threshold yet.
    Countdown {
        elapsed_ticks: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The threshold was crossed; the timer is already back to idle.
    RevertTriggered {
        elapsed_ticks: u64,
        threshold_secs: u64,
        at: DateTime<Utc>,
    },
    Reverted {
        revision: Option<String>,
        summary: String,
        at: DateTime<Utc>,
    },
    RevertFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        threshold_secs: u64,
        previous_threshold_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: RevertState,
        threshold_secs: u64,
        tick_period_ms: u64,
        seconds_till_revert: Option<u64>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable snake_case name, used for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::AutoRevertStarted { .. } => "auto_revert_started",
            Event::AutoRevertStopped { .. } => "auto_revert_stopped",
            Event::CountdownArmed { .. } => "countdown_armed",
            Event::CountdownRearmed { .. } => "countdown_rearmed",
            Event::CountdownDisarmed { .. } => "countdown_disarmed",
            Event::Countdown { .. } => "countdown",
            Event::RevertTriggered { .. } => "revert_triggered",
            Event::Reverted { .. } => "reverted",
            Event::RevertFailed { .. } => "revert_failed",
            Event::SettingsChanged { .. } => "settings_changed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
