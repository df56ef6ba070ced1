// ABOUTME: Core constants and utilities for Warren
// ABOUTME: Foundational package providing shared functionality across all Warren packages

pub mod constants;
pub mod utils;

// Re-export constants
pub use constants::{
    BRANCH_PREFIX, DEVCONTAINER_PATHS, LABEL_MANAGED, LABEL_PROJECT, LABEL_SANDBOX, LOCK_FILE,
    ORIGIN_DIR, REGISTRY_FILE, SANDBOXES_DIR,
};

// Re-export utilities
pub use utils::{
    container_name, default_branch, find_project_root, generate_sandbox_name, project_slug,
    validate_sandbox_name, NameError,
};
