// ABOUTME: Devcontainer descriptor reader for Warren sandboxes
// ABOUTME: Parses devcontainer.json (with comments) into a validated, typed structure

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use warren_core::constants::DEVCONTAINER_PATHS;

mod jsonc;

pub use jsonc::strip_comments;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("no devcontainer descriptor found under {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read descriptor {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("descriptor {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("descriptor declares neither a build section, a Dockerfile, nor an image")]
    MissingImageSource,

    #[error("forwarded port '{0}' is not a valid TCP port")]
    InvalidPort(String),

    #[error("mount entry '{0}' is missing source= or target=")]
    InvalidMount(String),
}

pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Raw on-disk shape of a devcontainer.json. Kept private; callers see the
/// validated [`Descriptor`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    name: Option<String>,
    build: Option<RawBuild>,
    /// Legacy top-level Dockerfile reference (`"dockerFile": "Dockerfile"`).
    docker_file: Option<String>,
    image: Option<String>,
    #[serde(default)]
    forward_ports: Vec<PortValue>,
    workspace_folder: Option<String>,
    #[serde(default)]
    mounts: Vec<String>,
    remote_user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBuild {
    dockerfile: Option<String>,
    context: Option<String>,
}

/// Ports appear as numbers or numeric strings in the wild.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

/// How the sandbox image is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Build from a Dockerfile. `context` is absolute; `dockerfile` is
    /// relative to it.
    Build { context: PathBuf, dockerfile: String },
    /// Use a prebuilt image as-is.
    Image(String),
}

/// A bind mount requested by the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub target: String,
}

/// Validated devcontainer descriptor.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: Option<String>,
    pub image_source: ImageSource,
    pub forward_ports: Vec<u16>,
    pub mounts: Vec<Mount>,
    pub remote_user: Option<String>,
    workspace_folder: Option<String>,
}

impl Descriptor {
    /// Locate the descriptor file under a project root.
    pub fn discover(project_root: &Path) -> Result<PathBuf> {
        for candidate in DEVCONTAINER_PATHS {
            let path = project_root.join(candidate);
            if path.exists() {
                return Ok(path);
            }
        }
        Err(DescriptorError::NotFound(project_root.to_path_buf()))
    }

    /// Read and validate the descriptor at `path`.
    pub fn read(path: &Path) -> Result<Descriptor> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let stripped = strip_comments(&content);
        let raw: RawDescriptor =
            serde_json::from_str(&stripped).map_err(|source| DescriptorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let descriptor_dir = path.parent().unwrap_or(Path::new("."));
        let image_source = resolve_image_source(&raw, descriptor_dir)?;
        let forward_ports = resolve_ports(&raw.forward_ports)?;
        let mounts = resolve_mounts(&raw.mounts)?;

        debug!(
            path = %path.display(),
            ports = forward_ports.len(),
            mounts = mounts.len(),
            "parsed devcontainer descriptor"
        );

        Ok(Descriptor {
            name: raw.name,
            image_source,
            forward_ports,
            mounts,
            remote_user: raw.remote_user,
            workspace_folder: raw.workspace_folder,
        })
    }

    /// Convenience: discover then read under a project root.
    pub fn load(project_root: &Path) -> Result<Descriptor> {
        let path = Self::discover(project_root)?;
        Self::read(&path)
    }

    /// Working directory inside the container. Falls back to the
    /// devcontainer convention `/workspaces/<project-name>`.
    pub fn workspace_folder(&self, project_name: &str) -> String {
        self.workspace_folder
            .clone()
            .unwrap_or_else(|| format!("/workspaces/{}", project_name))
    }
}

fn resolve_image_source(raw: &RawDescriptor, descriptor_dir: &Path) -> Result<ImageSource> {
    if let Some(build) = &raw.build {
        let context = descriptor_dir.join(build.context.as_deref().unwrap_or("."));
        let dockerfile = build
            .dockerfile
            .clone()
            .unwrap_or_else(|| "Dockerfile".to_string());
        return Ok(ImageSource::Build {
            context,
            dockerfile,
        });
    }

    // Legacy top-level dockerFile, relative to the descriptor.
    if let Some(dockerfile) = &raw.docker_file {
        return Ok(ImageSource::Build {
            context: descriptor_dir.to_path_buf(),
            dockerfile: dockerfile.clone(),
        });
    }

    if let Some(image) = &raw.image {
        return Ok(ImageSource::Image(image.clone()));
    }

    // A bare Dockerfile next to the descriptor still counts.
    if descriptor_dir.join("Dockerfile").exists() {
        return Ok(ImageSource::Build {
            context: descriptor_dir.to_path_buf(),
            dockerfile: "Dockerfile".to_string(),
        });
    }

    Err(DescriptorError::MissingImageSource)
}

fn resolve_ports(raw: &[PortValue]) -> Result<Vec<u16>> {
    let mut ports = Vec::with_capacity(raw.len());
    for value in raw {
        let port = match value {
            PortValue::Number(n) => u16::try_from(*n)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| DescriptorError::InvalidPort(n.to_string()))?,
            PortValue::Text(s) => s
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| DescriptorError::InvalidPort(s.clone()))?,
        };
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    Ok(ports)
}

/// Parse devcontainer mount strings (`source=/a,target=/b,type=bind`).
fn resolve_mounts(raw: &[String]) -> Result<Vec<Mount>> {
    let mut mounts = Vec::with_capacity(raw.len());
    for entry in raw {
        let mut source = None;
        let mut target = None;
        for part in entry.split(',') {
            match part.trim().split_once('=') {
                Some(("source", v)) | Some(("src", v)) => source = Some(v.to_string()),
                Some(("target", v)) | Some(("dst", v)) => target = Some(v.to_string()),
                _ => {}
            }
        }
        match (source, target) {
            (Some(source), Some(target)) => mounts.push(Mount { source, target }),
            _ => return Err(DescriptorError::InvalidMount(entry.clone())),
        }
    }
    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_descriptor(dir: &Path, content: &str) -> PathBuf {
        let devcontainer = dir.join(".devcontainer");
        std::fs::create_dir_all(&devcontainer).unwrap();
        let path = devcontainer.join("devcontainer.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_build_descriptor_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(
            dir.path(),
            r#"{
                // which image to build
                "name": "Demo",
                "build": { "dockerfile": "Dockerfile", "context": ".." },
                /* dev server and debugger */
                "forwardPorts": [3000, "9229"],
                "workspaceFolder": "/workspaces/demo",
                "remoteUser": "dev"
            }"#,
        );

        let descriptor = Descriptor::read(&path).unwrap();
        assert_eq!(descriptor.name.as_deref(), Some("Demo"));
        assert_eq!(descriptor.forward_ports, vec![3000, 9229]);
        assert_eq!(descriptor.workspace_folder("demo"), "/workspaces/demo");
        assert_eq!(descriptor.remote_user.as_deref(), Some("dev"));

        match descriptor.image_source {
            ImageSource::Build { context, dockerfile } => {
                assert_eq!(context, dir.path().join(".devcontainer").join(".."));
                assert_eq!(dockerfile, "Dockerfile");
            }
            other => panic!("expected build source, got {:?}", other),
        }
    }

    #[test]
    fn parses_image_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), r#"{ "image": "ubuntu:24.04" }"#);

        let descriptor = Descriptor::read(&path).unwrap();
        assert_eq!(
            descriptor.image_source,
            ImageSource::Image("ubuntu:24.04".to_string())
        );
        assert!(descriptor.forward_ports.is_empty());
        assert_eq!(descriptor.workspace_folder("demo"), "/workspaces/demo");
    }

    #[test]
    fn legacy_docker_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), r#"{ "dockerFile": "custom.Dockerfile" }"#);

        let descriptor = Descriptor::read(&path).unwrap();
        match descriptor.image_source {
            ImageSource::Build { dockerfile, .. } => assert_eq!(dockerfile, "custom.Dockerfile"),
            other => panic!("expected build source, got {:?}", other),
        }
    }

    #[test]
    fn bare_dockerfile_next_to_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), r#"{ "forwardPorts": [8080] }"#);
        std::fs::write(dir.path().join(".devcontainer/Dockerfile"), "FROM alpine").unwrap();

        let descriptor = Descriptor::read(&path).unwrap();
        assert!(matches!(descriptor.image_source, ImageSource::Build { .. }));
    }

    #[test]
    fn missing_build_and_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), r#"{ "forwardPorts": [8080] }"#);

        let err = Descriptor::read(&path).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingImageSource));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(
            dir.path(),
            r#"{ "image": "alpine", "forwardPorts": [70000] }"#,
        );
        assert!(matches!(
            Descriptor::read(&path).unwrap_err(),
            DescriptorError::InvalidPort(_)
        ));

        let path = write_descriptor(
            dir.path(),
            r#"{ "image": "alpine", "forwardPorts": ["not-a-port"] }"#,
        );
        assert!(matches!(
            Descriptor::read(&path).unwrap_err(),
            DescriptorError::InvalidPort(_)
        ));
    }

    #[test]
    fn duplicate_ports_are_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(
            dir.path(),
            r#"{ "image": "alpine", "forwardPorts": [3000, "3000", 3001] }"#,
        );
        let descriptor = Descriptor::read(&path).unwrap();
        assert_eq!(descriptor.forward_ports, vec![3000, 3001]);
    }

    #[test]
    fn parses_mounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(
            dir.path(),
            r#"{
                "image": "alpine",
                "mounts": ["source=/var/cache,target=/cache,type=bind"]
            }"#,
        );
        let descriptor = Descriptor::read(&path).unwrap();
        assert_eq!(
            descriptor.mounts,
            vec![Mount {
                source: "/var/cache".to_string(),
                target: "/cache".to_string()
            }]
        );
    }

    #[test]
    fn malformed_mount_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(
            dir.path(),
            r#"{ "image": "alpine", "mounts": ["type=volume,target=/cache"] }"#,
        );
        assert!(matches!(
            Descriptor::read(&path).unwrap_err(),
            DescriptorError::InvalidMount(_)
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), "{ not json");
        assert!(matches!(
            Descriptor::read(&path).unwrap_err(),
            DescriptorError::Parse { .. }
        ));
    }

    #[test]
    fn discover_prefers_devcontainer_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "{}");
        std::fs::write(dir.path().join(".devcontainer.json"), "{}").unwrap();

        let found = Descriptor::discover(dir.path()).unwrap();
        assert_eq!(found, dir.path().join(".devcontainer/devcontainer.json"));
    }

    #[test]
    fn discover_missing_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Descriptor::discover(dir.path()).unwrap_err(),
            DescriptorError::NotFound(_)
        ));
    }
}
