//! Commit observer.
//!
//! Decides whether a finished commit counts for auto-revert. Only commits
//! that left nothing behind in the active change list arm the timer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::session::AutoRevert;

/// Report of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessfulCheckin {
    pub workspace: PathBuf,
    /// Changes in the active change list before the commit.
    pub changelist_size: usize,
    /// Changes the user selected and committed.
    pub committed_size: usize,
}

impl SuccessfulCheckin {
    pub fn uncommitted_size(&self) -> usize {
        self.changelist_size.saturating_sub(self.committed_size)
    }

    pub fn all_changes_committed(&self) -> bool {
        self.uncommitted_size() == 0
    }
}

/// Forwards qualifying commits and full rollbacks of one workspace to its
/// [`AutoRevert`].
#[derive(Debug, Clone)]
pub struct CommitObserver {
    workspace: PathBuf,
    core: Weak<AutoRevert>,
}

impl CommitObserver {
    pub fn new(workspace: impl Into<PathBuf>, core: &Arc<AutoRevert>) -> Self {
        Self {
            workspace: workspace.into(),
            core: Arc::downgrade(core),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn on_successful_checkin(&self, checkin: &SuccessfulCheckin) -> Option<Event> {
        if checkin.workspace != self.workspace {
            return None;
        }
        if !checkin.all_changes_committed() {
            tracing::debug!(
                uncommitted = checkin.uncommitted_size(),
                "partial commit, auto-revert not armed"
            );
            return None;
        }
        self.core.upgrade()?.on_commit()
    }

    /// Called after a manual rollback with the number of changes still left
    /// in the active change list.
    pub fn on_rollback(&self, remaining_changes: usize) -> Option<Event> {
        if remaining_changes != 0 {
            return None;
        }
        self.core.upgrade()?.on_all_changes_rolled_back()
    }
}
