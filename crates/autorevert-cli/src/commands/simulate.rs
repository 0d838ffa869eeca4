use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use autorevert_core::{
    ClockSource, Config, CommitObserver, Event, Notifier, RevertAction, RevertError,
    RevertOutcome, RevertSettings, Session, Threshold, TickPeriod,
};
use clap::Args;

#[derive(Args)]
pub struct SimulateArgs {
    /// Seconds till revert (defaults to the configured value)
    #[arg(long)]
    threshold: Option<u64>,
    /// Clock period in milliseconds
    #[arg(long, default_value = "1000")]
    period_ms: u64,
    /// Make every revert fail, as if the commit could no longer be reverted
    #[arg(long)]
    fail_revert: bool,
    /// Events to replay: start, stop, commit, tick, rollback, settings=<secs>
    #[arg(required = true)]
    events: Vec<SimEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Start,
    Stop,
    Commit,
    Tick,
    Rollback,
    Settings(u64),
}

impl FromStr for SimEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "commit" => Ok(Self::Commit),
            "tick" => Ok(Self::Tick),
            "rollback" => Ok(Self::Rollback),
            other => {
                let secs = other
                    .strip_prefix("settings=")
                    .ok_or_else(|| format!("unknown event: {other}"))?;
                secs.parse()
                    .map(Self::Settings)
                    .map_err(|_| format!("invalid threshold in '{other}'"))
            }
        }
    }
}

/// Prints every session event as one JSON line on stdout.
struct JsonLinesNotifier;

impl Notifier for JsonLinesNotifier {
    fn on_auto_revert(&self, outcome: &RevertOutcome) {
        tracing::info!("auto-revert: {}", outcome.summary);
    }

    fn on_settings_changed(&self, settings: &RevertSettings) {
        tracing::info!(
            seconds_till_revert = settings.seconds_till_revert.as_secs(),
            "settings changed"
        );
    }

    fn on_event(&self, event: &Event) {
        print_event(event);
    }
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!("cannot serialize event: {e}"),
    }
}

struct SimulatedRevert {
    fail: bool,
    count: AtomicUsize,
}

impl RevertAction for SimulatedRevert {
    fn revert_last_commit(&self) -> Result<RevertOutcome, RevertError> {
        if self.fail {
            return Err(RevertError::NothingToRevert(
                "simulated commit is no longer revertible".into(),
            ));
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RevertOutcome {
            revision: Some(format!("sim-{n}")),
            summary: format!("simulated revert #{n}"),
        })
    }
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match args.threshold {
        Some(secs) => RevertSettings {
            seconds_till_revert: Threshold::from_secs(secs)?,
            ..RevertSettings::default()
        },
        None => Config::load()?.revert_settings(),
    };
    // Nothing runs until an explicit `start` event.
    settings.enabled = false;

    let clock = Arc::new(ClockSource::new(TickPeriod::from_millis(args.period_ms)?));
    let session = Session::open(
        Arc::clone(&clock),
        settings,
        Arc::new(SimulatedRevert {
            fail: args.fail_revert,
            count: AtomicUsize::new(0),
        }),
        Arc::new(JsonLinesNotifier),
    );
    let workspace = std::env::current_dir()?;
    let observer = CommitObserver::new(&workspace, session.auto_revert());

    for event in args.events {
        match event {
            SimEvent::Start => {
                session.start();
            }
            SimEvent::Stop => {
                session.stop();
            }
            SimEvent::Commit => {
                session.auto_revert().on_commit();
            }
            SimEvent::Tick => {
                clock.fire();
            }
            SimEvent::Rollback => {
                observer.on_rollback(0);
            }
            SimEvent::Settings(secs) => {
                settings.seconds_till_revert = Threshold::from_secs(secs)?;
                settings.enabled = session.is_started();
                session.apply_settings(&settings);
            }
        }
    }

    print_event(&session.auto_revert().snapshot());
    session.close();
    Ok(())
}
