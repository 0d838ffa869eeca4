mod action;
mod settings;
mod timer;

pub use action::{RevertAction, RevertOutcome};
pub use settings::{
    RevertSettings, Threshold, TickPeriod, DEFAULT_SECONDS_TILL_REVERT, DEFAULT_TICK_PERIOD_MS,
};
pub use timer::{Input, RevertState, RevertTimer};
