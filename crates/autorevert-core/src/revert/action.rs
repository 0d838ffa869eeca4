use serde::{Deserialize, Serialize};

use crate::error::RevertError;

/// What a successful revert did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertOutcome {
    /// Revision created or restored by the revert, when the backend knows it.
    pub revision: Option<String>,
    pub summary: String,
}

/// Reverts the most recent commit in the active workspace.
///
/// Invoked at most once per arming cycle. Failures are reported back but
/// never retried.
pub trait RevertAction: Send + Sync {
    fn revert_last_commit(&self) -> Result<RevertOutcome, RevertError>;
}

impl<F> RevertAction for F
where
    F: Fn() -> Result<RevertOutcome, RevertError> + Send + Sync,
{
    fn revert_last_commit(&self) -> Result<RevertOutcome, RevertError> {
        self()
    }
}
