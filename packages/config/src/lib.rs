// ABOUTME: Layered TOML configuration for Warren
// ABOUTME: User-level config overridden by a project-level file found by walking up from cwd

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Project-level config file names, in order of priority.
const PROJECT_CONFIG_NAMES: &[&str] = &["warren.toml", ".warren.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path:?} is not valid TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sandbox: SandboxSection,
    #[serde(default)]
    git: GitSection,
    #[serde(default)]
    mounts: MountsSection,
    #[serde(default)]
    ports: PortsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SandboxSection {
    default_shell: Option<String>,
    #[serde(default)]
    init_commands: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GitSection {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MountsSection {
    /// Extra bind mounts as "source:dest" strings. Sources may be relative
    /// to the project root and may use `~`.
    #[serde(default)]
    extra: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PortsSection {
    base_offset: Option<u16>,
    block_size: Option<u16>,
}

/// Merged Warren configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub default_shell: Option<String>,
    pub init_commands: Vec<String>,
    pub git_name: Option<String>,
    pub git_email: Option<String>,
    raw_mounts: Vec<String>,
    pub port_base_offset: Option<u16>,
    pub port_block_size: Option<u16>,
}

impl Config {
    /// Load configuration for a project: the user file first, then the
    /// project file overriding it field by field. Missing files are fine;
    /// malformed ones are not.
    pub fn load(project_root: &Path) -> Result<Config> {
        let mut merged = Config::default();

        if let Some(user_path) = user_config_path() {
            if user_path.exists() {
                merged.apply(load_file(&user_path)?);
            }
        }

        if let Some(project_path) = find_project_config(project_root) {
            merged.apply(load_file(&project_path)?);
        }

        Ok(merged)
    }

    /// Shell used by `connect` when the caller names none.
    pub fn shell(&self) -> String {
        self.default_shell
            .clone()
            .unwrap_or_else(|| "/bin/bash".to_string())
    }

    /// Extra bind mounts with `~` expanded and relative sources resolved
    /// against the project root. Entries without a `:` separator are
    /// skipped with a log line rather than failing the whole operation.
    pub fn extra_mounts(&self, project_root: &Path) -> Vec<(String, String)> {
        let mut mounts = Vec::new();
        for entry in &self.raw_mounts {
            let Some((source, dest)) = entry.split_once(':') else {
                debug!("Ignoring malformed mount entry '{}'", entry);
                continue;
            };
            let expanded = shellexpand::tilde(source).into_owned();
            let source_path = PathBuf::from(&expanded);
            let absolute = if source_path.is_absolute() {
                source_path
            } else {
                project_root.join(source_path)
            };
            mounts.push((absolute.display().to_string(), dest.to_string()));
        }
        mounts
    }

    fn apply(&mut self, raw: RawConfig) {
        if raw.sandbox.default_shell.is_some() {
            self.default_shell = raw.sandbox.default_shell;
        }
        if !raw.sandbox.init_commands.is_empty() {
            self.init_commands = raw.sandbox.init_commands;
        }
        if raw.git.name.is_some() {
            self.git_name = raw.git.name;
        }
        if raw.git.email.is_some() {
            self.git_email = raw.git.email;
        }
        if !raw.mounts.extra.is_empty() {
            self.raw_mounts = raw.mounts.extra;
        }
        if raw.ports.base_offset.is_some() {
            self.port_base_offset = raw.ports.base_offset;
        }
        if raw.ports.block_size.is_some() {
            self.port_block_size = raw.ports.block_size;
        }
    }
}

fn load_file(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded config from {}", path.display());
    Ok(raw)
}

/// `~/.config/warren/warren.toml` (platform-appropriate).
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("warren").join("warren.toml"))
}

/// Search for a project config from `start` upward.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in PROJECT_CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}
