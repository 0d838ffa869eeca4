//! # Auto-Revert Core Library
//!
//! An auto-revert safety net for version control: after a commit that left
//! nothing uncommitted, a countdown starts; if it expires before the feature
//! is stopped, the commit is reverted automatically.
//!
//! ## Architecture
//!
//! - **Revert Timer**: a tick-driven state machine that decides, on every
//!   tick, whether the countdown has expired
//! - **Clock Source**: broadcasts fixed-period ticks to registered listeners
//! - **Session**: binds a timer to a clock, a revert action and a notifier
//!   for the lifetime of an open workspace
//! - **VCS**: commit observer and a git-backed revert action
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`RevertTimer`]: Core state machine
//! - [`ClockSource`]: Tick broadcaster
//! - [`Session`]: Per-workspace lifecycle and listener wiring
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod revert;
pub mod session;
pub mod storage;
pub mod vcs;

pub use clock::{ClockSource, ListenerId, TickerHandle};
pub use error::{ConfigError, RevertError, ValidationError};
pub use events::Event;
pub use notify::{LogNotifier, Notifier};
pub use revert::{
    RevertAction, RevertOutcome, RevertSettings, RevertState, RevertTimer, Threshold, TickPeriod,
};
pub use session::{AutoRevert, Session};
pub use storage::Config;
pub use vcs::{CommitObserver, GitRepo, SuccessfulCheckin};
