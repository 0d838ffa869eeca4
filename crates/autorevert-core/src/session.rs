//! Per-workspace auto-revert session.
//!
//! [`AutoRevert`] serializes every timer operation behind one mutex and runs
//! the collaborators (revert action, notifier) after the lock is released, so
//! a collaborator that calls back into the session cannot deadlock it.
//! [`Session`] ties an `AutoRevert` to a [`ClockSource`] for the lifetime of
//! an open workspace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;

use crate::clock::{ClockSource, ListenerId};
use crate::events::Event;
use crate::notify::Notifier;
use crate::revert::{Input, RevertAction, RevertSettings, RevertTimer, Threshold, TickPeriod};

pub struct AutoRevert {
    timer: Mutex<RevertTimer>,
    notify_on_revert: AtomicBool,
    revert: Arc<dyn RevertAction>,
    notifier: Arc<dyn Notifier>,
}

impl AutoRevert {
    pub fn new(
        threshold: Threshold,
        period: TickPeriod,
        revert: Arc<dyn RevertAction>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            timer: Mutex::new(RevertTimer::new(threshold, period)),
            notify_on_revert: AtomicBool::new(true),
            revert,
            notifier,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_started(&self) -> bool {
        self.timer().is_started()
    }

    pub fn seconds_till_revert(&self) -> Option<u64> {
        self.timer().seconds_till_revert()
    }

    pub fn threshold(&self) -> Threshold {
        self.timer().threshold()
    }

    pub fn snapshot(&self) -> Event {
        self.timer().snapshot()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> Option<Event> {
        self.apply(Input::Start)
    }

    pub fn stop(&self) -> Option<Event> {
        self.apply(Input::Stop)
    }

    pub fn on_commit(&self) -> Option<Event> {
        self.apply(Input::Commit)
    }

    pub fn on_all_changes_rolled_back(&self) -> Option<Event> {
        self.apply(Input::AllChangesRolledBack)
    }

    pub fn on_new_settings(&self, threshold: Threshold) -> Option<Event> {
        self.apply(Input::NewThreshold(threshold))
    }

    /// One clock tick. When the countdown expires the revert action runs once
    /// and the returned event is its outcome (`Reverted` or `RevertFailed`).
    pub fn on_timer(&self) -> Option<Event> {
        let event = self.apply(Input::Tick)?;
        if !matches!(event, Event::RevertTriggered { .. }) {
            return Some(event);
        }

        // The timer is already idle here; a failing action cannot re-trigger.
        let outcome = match self.revert.revert_last_commit() {
            Ok(outcome) => {
                tracing::info!(
                    revision = outcome.revision.as_deref().unwrap_or("-"),
                    "auto-revert performed: {}",
                    outcome.summary
                );
                if self.notify_on_revert.load(Ordering::SeqCst) {
                    self.notifier.on_auto_revert(&outcome);
                }
                Event::Reverted {
                    revision: outcome.revision,
                    summary: outcome.summary,
                    at: Utc::now(),
                }
            }
            Err(e) => {
                tracing::warn!("auto-revert failed: {e}");
                Event::RevertFailed {
                    reason: e.to_string(),
                    at: Utc::now(),
                }
            }
        };
        self.notifier.on_event(&outcome);
        Some(outcome)
    }

    /// Push a full settings bundle: threshold, notification flag and the
    /// enabled switch. The notifier hears about it even if nothing changed.
    pub fn apply_settings(&self, settings: &RevertSettings) -> Vec<Event> {
        self.notifier.on_settings_changed(settings);
        self.notify_on_revert
            .store(settings.notify_on_revert, Ordering::SeqCst);

        let mut events: Vec<Event> = self
            .on_new_settings(settings.seconds_till_revert)
            .into_iter()
            .collect();
        let toggled = if settings.enabled {
            self.start()
        } else {
            self.stop()
        };
        events.extend(toggled);
        events
    }

    /// Disable without notifying; used on teardown.
    fn shutdown(&self) {
        self.timer().handle(Input::Stop);
    }

    fn apply(&self, input: Input) -> Option<Event> {
        let event = self.timer().handle(input)?;
        match &event {
            Event::AutoRevertStarted { .. } | Event::AutoRevertStopped { .. } => {
                tracing::info!(event = event.kind(), "auto-revert state changed");
            }
            Event::Countdown { .. } => {}
            Event::SettingsChanged { threshold_secs, .. } => {
                tracing::info!(threshold_secs, "auto-revert threshold updated");
            }
            _ => tracing::debug!(event = event.kind(), "auto-revert transition"),
        }
        self.notifier.on_event(&event);
        Some(event)
    }

    fn timer(&self) -> MutexGuard<'_, RevertTimer> {
        // Transitions never panic midway, so a poisoned state is still consistent.
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AutoRevert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRevert")
            .field("started", &self.is_started())
            .field("threshold", &self.threshold())
            .finish_non_exhaustive()
    }
}

/// An open workspace with auto-revert attached.
///
/// Registers a tick listener on open and removes it on [`Session::close`] or
/// drop. The listener holds only a weak reference, so a stray tick after
/// teardown does nothing.
pub struct Session {
    core: Arc<AutoRevert>,
    clock: Arc<ClockSource>,
    listener: Option<ListenerId>,
}

impl Session {
    pub fn open(
        clock: Arc<ClockSource>,
        settings: RevertSettings,
        revert: Arc<dyn RevertAction>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let core = Arc::new(AutoRevert::new(
            settings.seconds_till_revert,
            clock.period(),
            revert,
            notifier,
        ));
        core.notify_on_revert
            .store(settings.notify_on_revert, Ordering::SeqCst);

        let weak: Weak<AutoRevert> = Arc::downgrade(&core);
        let listener = clock.add_listener(move || {
            if let Some(core) = weak.upgrade() {
                core.on_timer();
            }
        });

        if settings.enabled {
            core.start();
        }
        tracing::info!(
            seconds_till_revert = settings.seconds_till_revert.as_secs(),
            started = settings.enabled,
            "auto-revert session opened"
        );

        Self {
            core,
            clock,
            listener: Some(listener),
        }
    }

    pub fn auto_revert(&self) -> &Arc<AutoRevert> {
        &self.core
    }

    pub fn start(&self) -> Option<Event> {
        self.core.start()
    }

    pub fn stop(&self) -> Option<Event> {
        self.core.stop()
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    pub fn apply_settings(&self, settings: &RevertSettings) -> Vec<Event> {
        self.core.apply_settings(settings)
    }

    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(id) = self.listener.take() {
            self.core.shutdown();
            self.clock.remove_listener(id);
            tracing::info!("auto-revert session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
