// ABOUTME: Docker implementation of the ContainerGateway
// ABOUTME: Uses bollard for daemon operations and the docker CLI for terminal passthrough

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::Docker;
use tracing::{debug, info, warn};

use crate::{
    build, ContainerError, ContainerGateway, ContainerState, ContainerSummary, Result, RunSpec,
};

/// Grace period before a stop escalates to SIGKILL.
const STOP_TIMEOUT_SECS: i64 = 10;

/// Gateway backed by the local Docker daemon.
pub struct DockerGateway {
    client: Docker,
}

impl DockerGateway {
    /// Connect with the default socket (or named pipe on Windows).
    pub fn connect() -> Result<Self> {
        let client = Docker::connect_with_defaults()?;
        Ok(Self { client })
    }

    /// Use an existing bollard client.
    pub fn with_client(client: Docker) -> Self {
        Self { client }
    }

    fn to_bollard_config(spec: &RunSpec) -> Config<String> {
        let mut exposed_ports = HashMap::new();
        let mut port_bindings = HashMap::new();
        for (container_port, host_port) in &spec.ports {
            let key = format!("{}/tcp", container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![bollard::models::PortBinding {
                    // Sandboxes are a local tool; keep published ports off
                    // the network.
                    host_ip: Some("127.0.0.1".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
        }

        let binds: Vec<String> = spec
            .mounts
            .iter()
            .map(|m| {
                format!(
                    "{}:{}:{}",
                    m.source,
                    m.target,
                    if m.readonly { "ro" } else { "rw" }
                )
            })
            .collect();

        let host_config = bollard::models::HostConfig {
            binds: if binds.is_empty() { None } else { Some(binds) },
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            ..Default::default()
        };

        let command = spec
            .command
            .clone()
            .unwrap_or_else(|| vec!["sleep".to_string(), "infinity".to_string()]);

        Config {
            image: Some(spec.image.clone()),
            cmd: Some(command),
            working_dir: spec.workdir.clone(),
            labels: Some(spec.labels.clone()),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    /// Run a docker CLI command with the caller's terminal attached.
    fn passthrough(&self, args: &[String]) -> Result<i32> {
        let status = std::process::Command::new("docker")
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| ContainerError::CommandFailed {
                command: args.first().cloned().unwrap_or_default(),
                detail: e.to_string(),
            })?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[async_trait]
impl ContainerGateway for DockerGateway {
    async fn is_available(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    async fn build_image(
        &self,
        context: &Path,
        dockerfile: &str,
        tag: &str,
        labels: &HashMap<String, String>,
        progress: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<()> {
        build::build_image(context, dockerfile, tag, labels, progress).await
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn run(&self, spec: &RunSpec) -> Result<String> {
        info!("Creating container: {}", spec.name);

        let config = Self::to_bollard_config(spec);
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self.client.create_container(Some(options), config).await?;

        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        debug!("Started container {} ({})", spec.name, created.id);
        Ok(created.id)
    }

    async fn start(&self, container: &str) -> Result<()> {
        info!("Starting container: {}", container);

        match self
            .client
            .start_container(container, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            // Already running is not an error.
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already running", container);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stop(&self, container: &str) -> Result<()> {
        info!("Stopping container: {}", container);

        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };

        match self.client.stop_container(container, Some(options)).await {
            Ok(()) => Ok(()),
            // Already stopped is not an error.
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already stopped", container);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, container: &str, force: bool) -> Result<()> {
        info!("Removing container: {} (force={})", container, force);

        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        match self.client.remove_container(container, Some(options)).await {
            Ok(()) => Ok(()),
            // Already removed is not an error.
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Container {} already removed", container);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn status(&self, container: &str) -> Result<ContainerState> {
        let inspect = match self.client.inspect_container(container, None).await {
            Ok(inspect) => inspect,
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(ContainerState::Absent),
            Err(e) => return Err(e.into()),
        };

        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);

        Ok(if running {
            ContainerState::Running
        } else {
            ContainerState::Stopped
        })
    }

    async fn port_map(&self, container: &str) -> Result<BTreeMap<u16, u16>> {
        let inspect = self
            .client
            .inspect_container(container, None)
            .await
            .map_err(|e| match e {
                BollardError::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotFound(container.to_string()),
                other => other.into(),
            })?;

        let mut ports = BTreeMap::new();
        if let Some(port_bindings) = inspect.network_settings.and_then(|ns| ns.ports) {
            for (container_port, bindings) in port_bindings {
                let Some(binding) = bindings.and_then(|b| b.into_iter().next()) else {
                    continue;
                };
                // Keys look like "3000/tcp".
                let parsed_container = container_port
                    .split('/')
                    .next()
                    .and_then(|p| p.parse::<u16>().ok());
                let parsed_host = binding.host_port.and_then(|p| p.parse::<u16>().ok());
                if let (Some(c), Some(h)) = (parsed_container, parsed_host) {
                    ports.insert(c, h);
                }
            }
        }
        Ok(ports)
    }

    async fn list(&self, label: &str) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let state = match c.state.as_deref() {
                    Some("running") => ContainerState::Running,
                    Some(_) => ContainerState::Stopped,
                    None => ContainerState::Stopped,
                };
                ContainerSummary {
                    id: c.id.unwrap_or_default(),
                    name: c
                        .names
                        .unwrap_or_default()
                        .first()
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_default(),
                    image: c.image.unwrap_or_default(),
                    state,
                }
            })
            .collect())
    }

    async fn logs(&self, container: &str, follow: bool) -> Result<()> {
        let mut args = vec!["logs".to_string()];
        if follow {
            args.push("-f".to_string());
        }
        args.push(container.to_string());

        let code = self.passthrough(&args)?;
        if code != 0 {
            warn!("docker logs exited with code {}", code);
        }
        Ok(())
    }

    async fn exec_interactive(&self, container: &str, command: &[String]) -> Result<i32> {
        let mut args = vec![
            "exec".to_string(),
            "-it".to_string(),
            container.to_string(),
        ];
        args.extend_from_slice(command);

        // The tty ties the session to the caller's terminal: their SIGINT
        // reaches the in-container shell, and the container itself keeps
        // running when the session ends.
        self.passthrough(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BindMount;

    fn spec() -> RunSpec {
        RunSpec {
            image: "alpine:latest".to_string(),
            name: "warren-proj-alice".to_string(),
            labels: HashMap::from([("warren.managed".to_string(), "true".to_string())]),
            mounts: vec![BindMount {
                source: "/tmp/wt".to_string(),
                target: "/workspaces/proj".to_string(),
                readonly: false,
            }],
            ports: BTreeMap::from([(3000, 8000)]),
            workdir: Some("/workspaces/proj".to_string()),
            command: None,
        }
    }

    #[test]
    fn run_spec_converts_to_bollard_config() {
        let config = DockerGateway::to_bollard_config(&spec());

        assert_eq!(config.image.as_deref(), Some("alpine:latest"));
        assert_eq!(
            config.cmd,
            Some(vec!["sleep".to_string(), "infinity".to_string()])
        );
        assert_eq!(config.working_dir.as_deref(), Some("/workspaces/proj"));

        let host_config = config.host_config.unwrap();
        assert_eq!(
            host_config.binds,
            Some(vec!["/tmp/wt:/workspaces/proj:rw".to_string()])
        );
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["3000/tcp"].as_ref().unwrap().first().unwrap();
        assert_eq!(binding.host_port.as_deref(), Some("8000"));
    }

    #[test]
    fn readonly_mounts_are_marked() {
        let mut s = spec();
        s.mounts[0].readonly = true;
        let config = DockerGateway::to_bollard_config(&s);
        let binds = config.host_config.unwrap().binds.unwrap();
        assert!(binds[0].ends_with(":ro"));
    }

    #[tokio::test]
    #[ignore] // Requires Docker daemon
    async fn connect_and_ping() {
        let gateway = DockerGateway::connect().expect("Docker not available");
        assert!(gateway.is_available().await);
    }

    #[tokio::test]
    #[ignore] // Requires Docker daemon
    async fn lifecycle_roundtrip() {
        let gateway = DockerGateway::connect().expect("Docker not available");

        let mut s = spec();
        s.name = "warren-test-lifecycle".to_string();
        s.mounts.clear();
        s.ports.clear();

        let id = gateway.run(&s).await.expect("run failed");
        assert_eq!(
            gateway.status(&s.name).await.unwrap(),
            ContainerState::Running
        );

        gateway.stop(&s.name).await.unwrap();
        assert_eq!(
            gateway.status(&s.name).await.unwrap(),
            ContainerState::Stopped
        );

        gateway.remove(&id, true).await.unwrap();
        assert_eq!(
            gateway.status(&s.name).await.unwrap(),
            ContainerState::Absent
        );
    }
}
