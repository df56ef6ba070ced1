// ABOUTME: Durable sandbox registry for Warren projects
// ABOUTME: JSON-file store of sandbox records plus the project-scoped advisory lock

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod lock;
mod store;

pub use lock::ProjectLock;
pub use store::SandboxRegistry;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sandbox '{0}' already exists")]
    AlreadyExists(String),

    #[error("registry entry '{name}' is corrupt: {detail}")]
    Corrupt { name: String, detail: String },

    #[error("another warren operation holds the project lock")]
    LockHeld,
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Stored lifecycle state of a sandbox. `Running` and `Stopped` are the only
/// states the registry ever records; drift is observed at read time, never
/// written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Running,
    Stopped,
}

impl RecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// One sandbox as the registry remembers it. The name is the primary key;
/// branch, ports and paths are fixed at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxRecord {
    pub name: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    /// container port -> host port, stable for the sandbox's lifetime
    pub ports: BTreeMap<u16, u16>,
    pub container_name: String,
    /// Runtime id; may lag reality when the container was removed
    /// externally.
    pub container_id: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

/// A registry entry that exists but no longer deserializes. Reported, never
/// silently dropped.
#[derive(Debug, Clone)]
pub struct CorruptEntry {
    pub name: String,
    pub detail: String,
}

/// Everything the registry holds, valid and corrupt entries separated.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    pub records: Vec<SandboxRecord>,
    pub corrupt: Vec<CorruptEntry>,
}

impl RegistrySnapshot {
    /// Total number of registered names, including corrupt ones.
    pub fn len(&self) -> usize {
        self.records.len() + self.corrupt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.corrupt.is_empty()
    }
}
