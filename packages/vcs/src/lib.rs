// ABOUTME: Version control gateway used by the Warren orchestrator
// ABOUTME: Defines the VcsGateway trait and its git-backed implementation

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

mod git;

pub use git::GitCli;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("git {args} failed: {stderr}")]
    Command { args: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("repository error at {path}: {source}")]
    Repository {
        path: String,
        #[source]
        source: git2::Error,
    },
}

pub type Result<T> = std::result::Result<T, VcsError>;

/// Result of attempting a merge in a working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merge applied cleanly (or was a fast-forward recorded as a merge
    /// commit).
    Merged,
    /// The merge could not be applied cleanly. The working copy has been
    /// restored to its pre-merge state.
    Conflict,
}

/// Git operations the orchestrator needs, kept primitive so the
/// implementation stays a thin wrapper around one git invocation each.
#[async_trait]
pub trait VcsGateway: Send + Sync {
    /// Create a bare clone of `source` at `dest` (the project's local
    /// origin).
    async fn clone_bare(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Clone `source` into `dest` and check out `branch`, creating the
    /// branch at the clone's HEAD when the origin does not have it yet.
    async fn clone(&self, source: &Path, dest: &Path, branch: &str) -> Result<()>;

    /// Push `branch` from `workdir` to `remote` (a name or a path).
    async fn push(&self, workdir: &Path, remote: &str, branch: &str) -> Result<()>;

    /// Fetch `branch` from `remote` into `workdir` (lands in FETCH_HEAD).
    async fn fetch(&self, workdir: &Path, remote: &str, branch: &str) -> Result<()>;

    /// Merge `reference` into the current branch of `workdir` with a merge
    /// commit. On conflict the merge is aborted and the working copy left
    /// as it was.
    async fn merge(&self, workdir: &Path, reference: &str) -> Result<MergeOutcome>;

    /// Check out an existing branch in `workdir`.
    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<()>;

    /// Set user.name / user.email for commits made inside `workdir`.
    async fn configure_identity(&self, workdir: &Path, name: &str, email: &str) -> Result<()>;

    /// Name of the branch checked out in `workdir`, or "detached".
    fn current_branch(&self, workdir: &Path) -> Result<String>;

    /// Whether `workdir` has uncommitted (staged or modified) changes.
    /// Untracked files do not count.
    fn is_dirty(&self, workdir: &Path) -> Result<bool>;

    /// Delete a working copy directory. Absent paths are fine.
    fn remove_worktree(&self, path: &Path) -> Result<()>;
}
