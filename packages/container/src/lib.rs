// ABOUTME: Container runtime gateway used by the Warren orchestrator
// ABOUTME: Defines the ContainerGateway trait and its Docker-backed implementation

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

mod build;
mod docker;

pub use docker::DockerGateway;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("image build failed: {detail}")]
    BuildFailed { detail: String },

    #[error("image {0} not found locally; pull it first with: docker pull {0}")]
    ImageMissing(String),

    #[error("docker {command} failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Live state of a container as the runtime reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    /// The runtime has no container by that name; the registry has drifted.
    Absent,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Absent => "absent",
        };
        f.write_str(label)
    }
}

/// A bind mount for a sandbox container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: String,
    pub target: String,
    pub readonly: bool,
}

/// Everything needed to run one sandbox container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub mounts: Vec<BindMount>,
    /// container port -> host port
    pub ports: BTreeMap<u16, u16>,
    pub workdir: Option<String>,
    /// Defaults to `sleep infinity` so the container idles until exec'd into.
    pub command: Option<Vec<String>>,
}

/// Summary row for listing managed containers.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
}

/// Container runtime operations the orchestrator needs.
#[async_trait]
pub trait ContainerGateway: Send + Sync {
    /// Whether the runtime daemon is reachable.
    async fn is_available(&self) -> bool;

    /// Build an image from a Dockerfile, streaming build output lines into
    /// `progress`.
    async fn build_image(
        &self,
        context: &Path,
        dockerfile: &str,
        tag: &str,
        labels: &HashMap<String, String>,
        progress: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<()>;

    /// Whether `image` exists locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Create and start a container; returns the runtime's container id.
    async fn run(&self, spec: &RunSpec) -> Result<String>;

    /// Start a stopped container.
    async fn start(&self, container: &str) -> Result<()>;

    /// Stop a container. Stopping an already-stopped container is Ok.
    async fn stop(&self, container: &str) -> Result<()>;

    /// Remove a container. Removing an already-absent container is Ok.
    async fn remove(&self, container: &str, force: bool) -> Result<()>;

    /// Live state of a container, `Absent` when the runtime does not know it.
    async fn status(&self, container: &str) -> Result<ContainerState>;

    /// Published ports of a container (container port -> host port).
    async fn port_map(&self, container: &str) -> Result<BTreeMap<u16, u16>>;

    /// List containers carrying `label` (key=value).
    async fn list(&self, label: &str) -> Result<Vec<ContainerSummary>>;

    /// Stream container logs to the caller's terminal.
    async fn logs(&self, container: &str, follow: bool) -> Result<()>;

    /// Run an interactive command in the container with the caller's
    /// terminal attached; returns the command's exit code. The container
    /// keeps running after the session ends, and the caller's interrupt
    /// reaches the in-container process, not the sandbox itself.
    async fn exec_interactive(&self, container: &str, command: &[String]) -> Result<i32>;
}
