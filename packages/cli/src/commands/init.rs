// ABOUTME: Devcontainer scaffolding for new projects
// ABOUTME: Writes the default Dockerfile, devcontainer.json and agent guidance into .devcontainer/

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context};
use colored::*;
use inquire::Confirm;

use warren_core::utils::find_project_root;

const DEFAULT_DOCKERFILE: &str = include_str!("../../templates/Dockerfile");
const DEFAULT_DEVCONTAINER: &str = include_str!("../../templates/devcontainer.json");
const AGENT_GUIDANCE: &str = include_str!("../../templates/AGENTS.md");

pub fn run(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let start = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let git_root = find_git_root(&start)
        .ok_or_else(|| anyhow!("not inside a git repository; initialize git first"))?;

    if find_project_root(&start).is_some() && !force {
        println!("{}", "A devcontainer configuration already exists.".yellow());
        let overwrite = Confirm::new("Overwrite?").with_default(false).prompt()?;
        if !overwrite {
            return Ok(());
        }
    }

    scaffold(&git_root)?;

    println!();
    println!(
        "{}",
        format!(
            "Created .devcontainer/devcontainer.json in {}",
            git_root.display()
        )
        .green()
    );
    println!();
    println!("You can now start a sandbox with:");
    println!("  {}", "warren connect <name>".cyan());
    Ok(())
}

/// Write the devcontainer scaffold for a project.
pub fn scaffold(project_root: &Path) -> anyhow::Result<()> {
    let project_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let devcontainer_dir = project_root.join(".devcontainer");
    std::fs::create_dir_all(&devcontainer_dir).with_context(|| {
        format!("could not create {}", devcontainer_dir.display())
    })?;

    std::fs::write(devcontainer_dir.join("Dockerfile"), DEFAULT_DOCKERFILE)?;
    std::fs::write(
        devcontainer_dir.join("devcontainer.json"),
        DEFAULT_DEVCONTAINER.replace("${PROJECT_NAME}", &project_name),
    )?;
    std::fs::write(devcontainer_dir.join("AGENTS.md"), AGENT_GUIDANCE)?;

    ensure_gitignored(project_root)?;

    Ok(())
}

/// Keep sandbox working copies and the registry out of git status.
fn ensure_gitignored(project_root: &Path) -> anyhow::Result<()> {
    let gitignore = project_root.join(".gitignore");
    let entry = format!("{}/", warren_core::constants::SANDBOXES_DIR);

    let existing = std::fs::read_to_string(&gitignore).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&entry);
    content.push('\n');
    std::fs::write(&gitignore, content)?;
    Ok(())
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .current_dir(start)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        return None;
    }
    Some(PathBuf::from(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_writes_all_three_files() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("demo");
        std::fs::create_dir_all(&project).unwrap();

        scaffold(&project).unwrap();

        let devcontainer = project.join(".devcontainer");
        assert!(devcontainer.join("Dockerfile").exists());
        assert!(devcontainer.join("AGENTS.md").exists());

        let descriptor =
            std::fs::read_to_string(devcontainer.join("devcontainer.json")).unwrap();
        assert!(descriptor.contains("/workspaces/demo"));
        assert!(!descriptor.contains("${PROJECT_NAME}"));

        let gitignore = std::fs::read_to_string(project.join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l == ".sandboxes/"));
    }

    #[test]
    fn gitignore_entry_is_not_duplicated() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("demo");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(".gitignore"), "target\n.sandboxes/\n").unwrap();

        scaffold(&project).unwrap();

        let gitignore = std::fs::read_to_string(project.join(".gitignore")).unwrap();
        assert_eq!(
            gitignore.lines().filter(|l| *l == ".sandboxes/").count(),
            1
        );
    }

    #[test]
    fn find_git_root_outside_repo_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        // A bare temp dir is not a git repository (unless a parent is,
        // which tempdirs under /tmp are not).
        assert!(find_git_root(tmp.path()).is_none());
    }
}
