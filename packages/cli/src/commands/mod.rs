// ABOUTME: CLI command handlers
// ABOUTME: Shared manager construction plus the per-subcommand modules

pub mod completion;
pub mod init;
pub mod sandbox;

use std::sync::Arc;

use anyhow::{anyhow, Context};

use warren_config::Config;
use warren_container::DockerGateway;
use warren_core::utils::find_project_root;
use warren_sandbox::SandboxManager;
use warren_vcs::GitCli;

/// Build a manager for the project containing the current directory.
pub fn build_manager() -> anyhow::Result<SandboxManager> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let project_root = find_project_root(&cwd).ok_or_else(|| {
        anyhow!(
            "no devcontainer descriptor found in {} or any parent directory; \
             run 'warren init' first",
            cwd.display()
        )
    })?;

    let config = Config::load(&project_root)?;
    let vcs = Arc::new(GitCli::new());
    let containers = Arc::new(
        DockerGateway::connect().context("could not connect to the Docker daemon")?,
    );

    Ok(SandboxManager::new(project_root, config, vcs, containers)?)
}
