// ABOUTME: Error taxonomy for sandbox lifecycle operations
// ABOUTME: Typed failures surfaced to callers; gateway errors carry their diagnostics

use std::path::PathBuf;

use thiserror::Error;

use warren_container::ContainerError;
use warren_core::utils::NameError;
use warren_devcontainer::DescriptorError;
use warren_registry::RegistryError;
use warren_vcs::VcsError;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("sandbox '{0}' already exists")]
    AlreadyExists(String),

    #[error("sandbox '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("invalid devcontainer descriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),

    #[error("no free port block after probing {attempted} candidates")]
    PortAllocationExhausted { attempted: usize },

    #[error("version control failure: {0}")]
    Vcs(#[from] VcsError),

    #[error("container runtime failure: {0}")]
    Container(#[from] ContainerError),

    #[error("merging '{branch}' into '{target}' hit conflicts; resolve manually and retry")]
    MergeConflict { branch: String, target: String },

    #[error("working copy at {0:?} has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree(PathBuf),

    #[error("registry failure: {0}")]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
