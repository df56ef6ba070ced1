// ABOUTME: Sandbox lifecycle orchestration for Warren
// ABOUTME: Coordinates git working copies, containers and the registry into one state machine

pub mod error;
pub mod manager;
pub mod paths;
pub mod ports;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SandboxError};
pub use manager::SandboxManager;
pub use paths::ProjectLayout;
pub use ports::PortAllocator;
pub use types::{
    ListReport, MergeReport, ObservedStatus, RemoveReport, RemoveStep, SandboxView, StepReport,
};

// Callers mostly need the record type and statuses alongside the manager.
pub use warren_registry::{RecordStatus, SandboxRecord};
