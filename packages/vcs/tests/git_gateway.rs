// ABOUTME: Integration tests for the git-backed VcsGateway
// ABOUTME: Exercises clone, push, fetch, merge and status queries against real repositories

use std::path::{Path, PathBuf};
use std::process::Command;

use warren_vcs::{GitCli, MergeOutcome, VcsGateway};

/// Run a git command in `dir`, panicking on failure (test setup only).
fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a repository with one commit and a deterministic identity.
fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--initial-branch=main"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    std::fs::write(dir.join("README.md"), "hello\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial"]);
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", message]);
}

struct Fixture {
    _tmp: tempfile::TempDir,
    project: PathBuf,
    origin: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("project");
    let origin = tmp.path().join("origin.git");
    init_repo(&project);
    Fixture {
        _tmp: tmp,
        project,
        origin,
    }
}

#[tokio::test]
async fn clone_bare_creates_origin() {
    let fx = fixture();
    let gateway = GitCli::new();

    gateway.clone_bare(&fx.project, &fx.origin).await.unwrap();

    assert!(fx.origin.join("HEAD").exists());
}

#[tokio::test]
async fn clone_creates_new_branch_at_head() {
    let fx = fixture();
    let gateway = GitCli::new();
    gateway.clone_bare(&fx.project, &fx.origin).await.unwrap();

    let worktree = fx.project.parent().unwrap().join("wt-alice");
    VcsGateway::clone(&gateway, &fx.origin, &worktree, "sandbox/alice")
        .await
        .unwrap();

    assert!(worktree.join("README.md").exists());
    assert_eq!(
        gateway.current_branch(&worktree).unwrap(),
        "sandbox/alice"
    );
}

#[tokio::test]
async fn clone_checks_out_existing_branch() {
    let fx = fixture();
    let gateway = GitCli::new();
    git(&fx.project, &["branch", "feature"]);
    gateway.clone_bare(&fx.project, &fx.origin).await.unwrap();

    let worktree = fx.project.parent().unwrap().join("wt-feature");
    VcsGateway::clone(&gateway, &fx.origin, &worktree, "feature")
        .await
        .unwrap();

    assert_eq!(gateway.current_branch(&worktree).unwrap(), "feature");
}

#[tokio::test]
async fn push_then_fetch_then_merge_lands_changes() {
    let fx = fixture();
    let gateway = GitCli::new();
    gateway.clone_bare(&fx.project, &fx.origin).await.unwrap();

    // Sandbox clone commits on its branch and pushes to the origin.
    let worktree = fx.project.parent().unwrap().join("wt");
    VcsGateway::clone(&gateway, &fx.origin, &worktree, "sandbox/alice")
        .await
        .unwrap();
    gateway
        .configure_identity(&worktree, "Sandbox", "sandbox@example.com")
        .await
        .unwrap();
    commit_file(&worktree, "feature.txt", "new feature\n", "add feature");
    gateway
        .push(&worktree, "origin", "sandbox/alice")
        .await
        .unwrap();

    // The project fetches the branch from the origin and merges it.
    let origin_str = fx.origin.display().to_string();
    gateway
        .fetch(&fx.project, &origin_str, "sandbox/alice")
        .await
        .unwrap();
    let outcome = gateway.merge(&fx.project, "FETCH_HEAD").await.unwrap();

    assert_eq!(outcome, MergeOutcome::Merged);
    assert!(fx.project.join("feature.txt").exists());
}

#[tokio::test]
async fn conflicting_merge_reports_conflict_and_restores_worktree() {
    let fx = fixture();
    let gateway = GitCli::new();
    gateway.clone_bare(&fx.project, &fx.origin).await.unwrap();

    let worktree = fx.project.parent().unwrap().join("wt");
    VcsGateway::clone(&gateway, &fx.origin, &worktree, "sandbox/alice")
        .await
        .unwrap();
    gateway
        .configure_identity(&worktree, "Sandbox", "sandbox@example.com")
        .await
        .unwrap();

    // Both sides edit the same line.
    commit_file(&worktree, "README.md", "sandbox version\n", "sandbox edit");
    gateway
        .push(&worktree, "origin", "sandbox/alice")
        .await
        .unwrap();
    commit_file(&fx.project, "README.md", "host version\n", "host edit");

    let origin_str = fx.origin.display().to_string();
    gateway
        .fetch(&fx.project, &origin_str, "sandbox/alice")
        .await
        .unwrap();
    let outcome = gateway.merge(&fx.project, "FETCH_HEAD").await.unwrap();

    assert_eq!(outcome, MergeOutcome::Conflict);
    // Aborted merge restores the host's version and leaves no MERGE_HEAD.
    let content = std::fs::read_to_string(fx.project.join("README.md")).unwrap();
    assert_eq!(content, "host version\n");
    assert!(!fx.project.join(".git/MERGE_HEAD").exists());
    assert!(!gateway.is_dirty(&fx.project).unwrap());
}

#[tokio::test]
async fn dirty_detection_ignores_untracked_but_sees_modifications() {
    let fx = fixture();
    let gateway = GitCli::new();

    assert!(!gateway.is_dirty(&fx.project).unwrap());

    // Untracked files are not "dirty" for merge purposes.
    std::fs::write(fx.project.join("scratch.txt"), "wip\n").unwrap();
    assert!(!gateway.is_dirty(&fx.project).unwrap());

    // Modifying a tracked file is.
    std::fs::write(fx.project.join("README.md"), "changed\n").unwrap();
    assert!(gateway.is_dirty(&fx.project).unwrap());
}

#[tokio::test]
async fn checkout_switches_branch() {
    let fx = fixture();
    let gateway = GitCli::new();
    git(&fx.project, &["branch", "release"]);

    gateway.checkout(&fx.project, "release").await.unwrap();
    assert_eq!(gateway.current_branch(&fx.project).unwrap(), "release");
}

#[tokio::test]
async fn remove_worktree_is_tolerant_of_absence() {
    let gateway = GitCli::new();
    let tmp = tempfile::tempdir().unwrap();

    let dir = tmp.path().join("wt");
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested/file"), "x").unwrap();

    gateway.remove_worktree(&dir).unwrap();
    assert!(!dir.exists());

    // Second removal of a now-absent path is not an error.
    gateway.remove_worktree(&dir).unwrap();
}

#[tokio::test]
async fn failed_command_carries_stderr() {
    let gateway = GitCli::new();
    let tmp = tempfile::tempdir().unwrap();

    let err = gateway
        .push(tmp.path(), "origin", "nope")
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("push"), "unexpected error: {message}");
}
