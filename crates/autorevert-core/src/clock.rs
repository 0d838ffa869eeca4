//! Periodic tick broadcaster.
//!
//! Listeners are plain closures. Registration and removal may happen
//! concurrently with delivery: `fire()` copies the listener handles out of
//! the lock before calling them, so a listener can remove itself (or others)
//! from inside its own callback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::revert::TickPeriod;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ClockSource::add_listener`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub struct ClockSource {
    period: TickPeriod,
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
}

impl ClockSource {
    pub fn new(period: TickPeriod) -> Self {
        Self {
            period,
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn period(&self) -> TickPeriod {
        self.period
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, Arc::new(listener));
        tracing::debug!(listener = id.0, "clock listener added");
        id
    }

    /// Returns false if the listener was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(listener = id.0, "clock listener removed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver one tick to every registered listener, in registration order.
    /// Returns how many listeners were called.
    pub fn fire(&self) -> usize {
        let listeners: Vec<Listener> = self.lock().values().cloned().collect();
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    /// Drive `fire()` once per period from a tokio task.
    ///
    /// Listeners run on the blocking pool since they may shell out (the git
    /// revert action does). Must be called from within a tokio runtime.
    pub fn spawn(self: &Arc<Self>) -> TickerHandle {
        let clock = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticks = interval(clock.period.as_duration());
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; a tick means one full period passed.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let clock = Arc::clone(&clock);
                if let Err(e) = tokio::task::spawn_blocking(move || clock.fire()).await {
                    tracing::error!("clock listener panicked: {e}");
                }
            }
        });
        TickerHandle(task)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ListenerId, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops the spawned ticker when dropped.
#[derive(Debug)]
pub struct TickerHandle(JoinHandle<()>);

impl TickerHandle {
    /// Stop the ticker now. No tick is delivered after this returns, except
    /// one whose delivery had already begun.
    pub fn stop(self) {
        self.0.abort();
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn clock(ms: u64) -> Arc<ClockSource> {
        Arc::new(ClockSource::new(TickPeriod::from_millis(ms).unwrap()))
    }

    #[test]
    fn fire_reaches_every_listener() {
        let clock = clock(1000);
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            clock.add_listener(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(clock.fire(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let clock = clock(1000);
        let hits = Arc::new(AtomicUsize::new(0));
        let id = {
            let hits = Arc::clone(&hits);
            clock.add_listener(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(clock.remove_listener(id));
        assert!(!clock.remove_listener(id));
        assert_eq!(clock.fire(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_can_register_during_delivery() {
        let clock = clock(1000);
        let inner = Arc::clone(&clock);
        clock.add_listener(move || {
            inner.add_listener(|| {});
        });
        // Would deadlock if delivery held the listener lock.
        clock.fire();
        assert_eq!(clock.listener_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_ticker_delivers_ticks() {
        let clock = clock(1000);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        clock.add_listener(move || {
            let _ = tx.send(());
        });
        let ticker = clock.spawn();
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("tick within timeout")
                .expect("channel open");
        }
        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_delivers_nothing_more() {
        let clock = clock(1000);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        clock.add_listener(move || {
            let _ = tx.send(());
        });
        let ticker = clock.spawn();
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("tick within timeout")
            .expect("channel open");

        ticker.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
