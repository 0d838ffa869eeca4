//! Notification sink for the user-facing side of auto-revert.
//!
//! All methods are fire-and-forget. [`LogNotifier`] is the default sink and
//! reports through `tracing`.

use crate::events::Event;
use crate::revert::{RevertOutcome, RevertSettings};

pub trait Notifier: Send + Sync {
    /// A revert was performed automatically.
    fn on_auto_revert(&self, outcome: &RevertOutcome);

    /// Settings were pushed into the session, even if nothing changed.
    fn on_settings_changed(&self, settings: &RevertSettings);

    /// Every event emitted by the session, including countdown ticks.
    fn on_event(&self, _event: &Event) {}
}

/// Notifier that writes to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_auto_revert(&self, outcome: &RevertOutcome) {
        tracing::info!(
            revision = outcome.revision.as_deref().unwrap_or("-"),
            "auto-revert: {}",
            outcome.summary
        );
    }

    fn on_settings_changed(&self, settings: &RevertSettings) {
        tracing::info!(
            seconds_till_revert = settings.seconds_till_revert.as_secs(),
            enabled = settings.enabled,
            "auto-revert settings changed"
        );
    }

    fn on_event(&self, event: &Event) {
        if let Event::Countdown { remaining_secs, .. } = event {
            tracing::trace!(remaining_secs, "auto-revert countdown");
        }
    }
}
