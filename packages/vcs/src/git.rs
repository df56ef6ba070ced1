// ABOUTME: Git-backed VcsGateway implementation
// ABOUTME: Shells out to the git binary for mutations, uses libgit2 for read-only queries

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{MergeOutcome, Result, VcsError, VcsGateway};

/// Gateway backed by the `git` binary (mutations) and libgit2 (queries).
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Run a git subcommand, capturing output. Non-zero exit becomes a
    /// [`VcsError::Command`] carrying the captured stderr.
    async fn run(&self, workdir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(?args, workdir = ?workdir, "running git");
        let output = cmd.output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(VcsError::Command {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Whether `branch` exists as a local head in the repository at `repo`.
    async fn branch_exists(&self, repo: &Path, branch: &str) -> bool {
        self.run(
            Some(repo),
            &[
                "show-ref",
                "--verify",
                "--quiet",
                &format!("refs/heads/{}", branch),
            ],
        )
        .await
        .is_ok()
    }

    fn open_repo(path: &Path) -> Result<git2::Repository> {
        git2::Repository::open(path).map_err(|source| VcsError::Repository {
            path: path.display().to_string(),
            source,
        })
    }
}

#[async_trait]
impl VcsGateway for GitCli {
    async fn clone_bare(&self, source: &Path, dest: &Path) -> Result<()> {
        let source = source.display().to_string();
        let dest = dest.display().to_string();
        self.run(None, &["clone", "--bare", &source, &dest]).await?;
        Ok(())
    }

    async fn clone(&self, source: &Path, dest: &Path, branch: &str) -> Result<()> {
        let source_str = source.display().to_string();
        let dest_str = dest.display().to_string();
        self.run(None, &["clone", &source_str, &dest_str]).await?;

        if self.branch_exists(source, branch).await {
            self.run(Some(dest), &["checkout", branch]).await?;
        } else {
            self.run(Some(dest), &["checkout", "-b", branch]).await?;
        }
        Ok(())
    }

    async fn push(&self, workdir: &Path, remote: &str, branch: &str) -> Result<()> {
        let refspec = format!("{}:{}", branch, branch);
        self.run(Some(workdir), &["push", remote, &refspec]).await?;
        Ok(())
    }

    async fn fetch(&self, workdir: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run(Some(workdir), &["fetch", remote, branch]).await?;
        Ok(())
    }

    async fn merge(&self, workdir: &Path, reference: &str) -> Result<MergeOutcome> {
        let result = self
            .run(
                Some(workdir),
                &["merge", "--no-ff", "--no-edit", reference],
            )
            .await;

        match result {
            Ok(_) => Ok(MergeOutcome::Merged),
            Err(VcsError::Command { args, stderr }) => {
                // A conflicted merge leaves MERGE_HEAD behind; that is the
                // reliable signal, independent of git's message wording.
                if workdir.join(".git").join("MERGE_HEAD").exists() {
                    if let Err(e) = self.run(Some(workdir), &["merge", "--abort"]).await {
                        warn!("failed to abort conflicted merge: {}", e);
                    }
                    Ok(MergeOutcome::Conflict)
                } else {
                    Err(VcsError::Command { args, stderr })
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<()> {
        self.run(Some(workdir), &["checkout", branch]).await?;
        Ok(())
    }

    async fn configure_identity(&self, workdir: &Path, name: &str, email: &str) -> Result<()> {
        self.run(Some(workdir), &["config", "user.name", name])
            .await?;
        self.run(Some(workdir), &["config", "user.email", email])
            .await?;
        Ok(())
    }

    fn current_branch(&self, workdir: &Path) -> Result<String> {
        let repo = Self::open_repo(workdir)?;
        let head = repo.head().map_err(|source| VcsError::Repository {
            path: workdir.display().to_string(),
            source,
        })?;

        if repo.head_detached().unwrap_or(false) {
            return Ok("detached".to_string());
        }

        Ok(head.shorthand().unwrap_or("detached").to_string())
    }

    fn is_dirty(&self, workdir: &Path) -> Result<bool> {
        let repo = Self::open_repo(workdir)?;

        let mut options = git2::StatusOptions::new();
        options.include_untracked(false).include_ignored(false);

        let statuses = repo
            .statuses(Some(&mut options))
            .map_err(|source| VcsError::Repository {
                path: workdir.display().to_string(),
                source,
            })?;

        Ok(!statuses.is_empty())
    }

    fn remove_worktree(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(path)?;
        Ok(())
    }
}
