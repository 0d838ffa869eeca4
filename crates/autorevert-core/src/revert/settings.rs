//! Countdown length, clock period and the settings bundle pushed into the timer.

use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of seconds that must elapse, while armed, before a revert fires.
///
/// Always positive; zero is rejected at construction and at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Threshold(NonZeroU64);

impl Threshold {
    pub fn from_secs(secs: u64) -> Result<Self, ValidationError> {
        NonZeroU64::new(secs).map(Self).ok_or_else(|| ValidationError::InvalidValue {
            field: "seconds_till_revert".into(),
            message: "must be greater than zero".into(),
        })
    }

    pub fn as_secs(self) -> u64 {
        self.0.get()
    }

    pub fn as_millis(self) -> u64 {
        self.0.get().saturating_mul(1000)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(NonZeroU64::new(DEFAULT_SECONDS_TILL_REVERT).unwrap_or(NonZeroU64::MIN))
    }
}

impl TryFrom<u64> for Threshold {
    type Error = ValidationError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

impl From<Threshold> for u64 {
    fn from(threshold: Threshold) -> Self {
        threshold.as_secs()
    }
}

/// Fixed period between two clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TickPeriod(NonZeroU64);

impl TickPeriod {
    pub fn from_millis(ms: u64) -> Result<Self, ValidationError> {
        NonZeroU64::new(ms).map(Self).ok_or_else(|| ValidationError::InvalidValue {
            field: "tick_period_ms".into(),
            message: "must be greater than zero".into(),
        })
    }

    pub fn as_millis(self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0.get())
    }

    /// Milliseconds covered by `ticks` ticks of this period.
    pub fn elapsed_ms(self, ticks: u64) -> u64 {
        ticks.saturating_mul(self.0.get())
    }
}

impl Default for TickPeriod {
    fn default() -> Self {
        Self(NonZeroU64::new(DEFAULT_TICK_PERIOD_MS).unwrap_or(NonZeroU64::MIN))
    }
}

impl TryFrom<u64> for TickPeriod {
    type Error = ValidationError;

    fn try_from(ms: u64) -> Result<Self, Self::Error> {
        Self::from_millis(ms)
    }
}

impl From<TickPeriod> for u64 {
    fn from(period: TickPeriod) -> Self {
        period.as_millis()
    }
}

pub const DEFAULT_SECONDS_TILL_REVERT: u64 = 300;
pub const DEFAULT_TICK_PERIOD_MS: u64 = 1000;

/// Settings the owning session pushes into the timer on open and on every edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertSettings {
    /// Start the timer when a session opens; disabling stops a running timer.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub seconds_till_revert: Threshold,
    /// Show a notification after an automatic revert.
    #[serde(default = "default_true")]
    pub notify_on_revert: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RevertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            seconds_till_revert: Threshold::default(),
            notify_on_revert: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(Threshold::from_secs(0).is_err());
        assert_eq!(Threshold::from_secs(3).unwrap().as_secs(), 3);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(TickPeriod::from_millis(0).is_err());
        assert_eq!(TickPeriod::default().as_millis(), 1000);
    }

    #[test]
    fn threshold_deserializes_from_plain_integer() {
        let parsed: RevertSettings =
            toml::from_str("seconds_till_revert = 42\nnotify_on_revert = false").unwrap();
        assert_eq!(parsed.seconds_till_revert.as_secs(), 42);
        assert!(!parsed.notify_on_revert);
        assert!(parsed.enabled);
    }

    #[test]
    fn threshold_zero_fails_to_deserialize() {
        let parsed: Result<RevertSettings, _> = toml::from_str("seconds_till_revert = 0");
        assert!(parsed.is_err());
    }

    #[test]
    fn elapsed_ms_saturates() {
        let period = TickPeriod::from_millis(u64::MAX).unwrap();
        assert_eq!(period.elapsed_ms(2), u64::MAX);
    }
}
