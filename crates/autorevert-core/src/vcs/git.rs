//! Git-backed collaborators: commit detection by polling `HEAD`, and a revert
//! action built on `git revert`.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::checkin::SuccessfulCheckin;
use crate::error::RevertError;
use crate::revert::{RevertAction, RevertOutcome};

/// Where `HEAD` pointed at the last poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tip {
    head: Option<String>,
    /// Symbolic ref (`refs/heads/main`), `None` when detached.
    branch: Option<String>,
}

/// A git working tree watched for commits.
///
/// The last seen tip sits behind a mutex that the revert also holds, so
/// the commit created by an automatic revert is never reported as a new
/// user commit.
#[derive(Debug)]
pub struct GitRepo {
    path: PathBuf,
    last_tip: Mutex<Tip>,
}

impl GitRepo {
    /// # Errors
    ///
    /// Returns an error if `path` is not inside a git working tree.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RevertError> {
        let path = path.into();
        let repo = Self {
            path,
            last_tip: Mutex::new(Tip::default()),
        };
        let output = repo.git(&["rev-parse", "--is-inside-work-tree"])?;
        if !output.status.success() {
            return Err(command_failed(&["rev-parse", "--is-inside-work-tree"], &output));
        }
        let tip = repo.tip()?;
        *repo.lock() = tip;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report a commit made since the last poll.
    ///
    /// Only a new commit on the same branch whose first parent is the
    /// previously seen `HEAD` counts. Checkouts, resets, pulls and amends
    /// just move the recorded tip. The report counts the files in the new
    /// commit and the tracked changes still pending in the working tree.
    pub fn poll_checkin(&self) -> Result<Option<SuccessfulCheckin>, RevertError> {
        let mut last = self.lock();
        let current = self.tip()?;
        if current == *last {
            return Ok(None);
        }
        let previous = std::mem::replace(&mut *last, current.clone());
        if current.head.is_none() || current.branch != previous.branch {
            tracing::debug!(branch = ?current.branch, "HEAD moved without a commit");
            return Ok(None);
        }
        if self.first_parent()? != previous.head || !self.moved_by_commit()? {
            tracing::debug!("HEAD moved to an unrelated commit");
            return Ok(None);
        }

        let committed_size = self.count_lines(&[
            "diff-tree",
            "--no-commit-id",
            "--name-only",
            "-r",
            "--root",
            "HEAD",
        ])?;
        let remaining = self.pending_changes()?;
        tracing::debug!(committed_size, remaining, "new commit detected");
        Ok(Some(SuccessfulCheckin {
            workspace: self.path.clone(),
            changelist_size: committed_size + remaining,
            committed_size,
        }))
    }

    /// Number of uncommitted changes to tracked files. Untracked files are
    /// not part of any commit and do not count.
    pub fn pending_changes(&self) -> Result<usize, RevertError> {
        self.count_lines(&["status", "--porcelain", "--untracked-files=no"])
    }

    fn tip(&self) -> Result<Tip, RevertError> {
        Ok(Tip {
            head: self.head()?,
            branch: self.optional_line(&["symbolic-ref", "--quiet", "HEAD"])?,
        })
    }

    fn head(&self) -> Result<Option<String>, RevertError> {
        // Unborn branch yields `None`.
        self.optional_line(&["rev-parse", "--verify", "--quiet", "HEAD"])
    }

    /// `None` for a root commit.
    fn first_parent(&self) -> Result<Option<String>, RevertError> {
        self.optional_line(&["rev-parse", "--verify", "--quiet", "HEAD^"])
    }

    /// Whether the latest reflog entry for `HEAD` was written by
    /// `git commit`. Repositories without a reflog are taken at their word.
    fn moved_by_commit(&self) -> Result<bool, RevertError> {
        let subject = self.optional_line(&["reflog", "-1", "--format=%gs", "HEAD"])?;
        Ok(subject.is_none_or(|s| is_commit_subject(&s)))
    }

    fn optional_line(&self, args: &[&str]) -> Result<Option<String>, RevertError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!line.is_empty()).then_some(line))
    }

    fn count_lines(&self, args: &[&str]) -> Result<usize, RevertError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count())
    }

    fn git(&self, args: &[&str]) -> Result<Output, RevertError> {
        // Polling must never take index.lock from a concurrent user command.
        Ok(Command::new("git")
            .arg("--no-optional-locks")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()?)
    }

    fn lock(&self) -> MutexGuard<'_, Tip> {
        self.last_tip.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RevertAction for GitRepo {
    fn revert_last_commit(&self) -> Result<RevertOutcome, RevertError> {
        let mut last = self.lock();
        let target = self
            .head()?
            .ok_or_else(|| RevertError::NothingToRevert("repository has no commits".into()))?;

        let args = ["revert", "--no-edit", "HEAD"];
        let output = self.git(&args)?;
        if !output.status.success() {
            // Leave the tree as it was rather than mid-revert.
            let _ = self.git(&["revert", "--abort"]);
            return Err(command_failed(&args, &output));
        }

        *last = self.tip()?;
        Ok(RevertOutcome {
            revision: last.head.clone(),
            summary: format!("reverted commit {}", short_sha(&target)),
        })
    }
}

/// `commit: msg`, `commit (initial): msg` and `commit (merge): msg` are user
/// commits; `commit (amend)` rewrites one that was already seen.
fn is_commit_subject(subject: &str) -> bool {
    subject.starts_with("commit:")
        || subject.starts_with("commit (initial):")
        || subject.starts_with("commit (merge):")
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

fn command_failed(args: &[&str], output: &Output) -> RevertError {
    RevertError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
