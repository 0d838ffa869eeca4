mod checkin;
mod git;

pub use checkin::{CommitObserver, SuccessfulCheckin};
pub use git::GitRepo;
