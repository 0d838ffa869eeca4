use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use autorevert_core::{
    ClockSource, CommitObserver, Config, GitRepo, LogNotifier, Session, Threshold,
};
use clap::Args;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Args)]
pub struct WatchArgs {
    /// Repository to watch
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    /// Seconds till revert for this run, until the config file changes
    #[arg(long)]
    threshold: Option<u64>,
    /// Stop watching after this many seconds
    #[arg(long)]
    for_secs: Option<u64>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Config::path()?;
    let config = Config::load_from(&config_path)?;
    let mut settings = config.revert_settings();
    if let Some(secs) = args.threshold {
        settings.seconds_till_revert = Threshold::from_secs(secs)?;
    }

    let repo = Arc::new(GitRepo::open(&args.repo)?);
    let clock = Arc::new(ClockSource::new(config.tick_period()));
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let session = Session::open(
            Arc::clone(&clock),
            settings,
            Arc::clone(&repo) as Arc<dyn autorevert_core::RevertAction>,
            Arc::new(LogNotifier),
        );
        let observer = CommitObserver::new(repo.path(), session.auto_revert());
        let ticker = clock.spawn();
        tracing::info!(
            repo = %repo.path().display(),
            seconds_till_revert = settings.seconds_till_revert.as_secs(),
            "watching for commits"
        );

        let deadline = args
            .for_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut config_mtime = modified(&config_path);
        let mut polls = interval(clock.period().as_duration());
        polls.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = polls.tick() => {}
                _ = &mut ctrl_c => {
                    tracing::info!("interrupted");
                    break;
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let current_mtime = modified(&config_path);
            if current_mtime != config_mtime {
                config_mtime = current_mtime;
                match Config::load_from(&config_path) {
                    Ok(config) => {
                        session.apply_settings(&config.revert_settings());
                    }
                    Err(e) => tracing::warn!("ignoring config change: {e}"),
                }
            }

            let poll_repo = Arc::clone(&repo);
            match tokio::task::spawn_blocking(move || poll_repo.poll_checkin()).await? {
                Ok(Some(checkin)) => {
                    observer.on_successful_checkin(&checkin);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("cannot read repository state: {e}"),
            }
        }

        ticker.stop();
        session.close();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
