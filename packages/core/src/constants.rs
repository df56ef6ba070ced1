// ABOUTME: Shared path and naming constants used across Warren packages
// ABOUTME: Single source of truth for on-disk layout and container label keys

/// Directory under the project root holding everything Warren manages.
pub const SANDBOXES_DIR: &str = ".sandboxes";

/// Bare repository acting as the shared local remote for all sandboxes,
/// relative to [`SANDBOXES_DIR`].
pub const ORIGIN_DIR: &str = "origin.git";

/// Registry file mapping sandbox names to their records, relative to
/// [`SANDBOXES_DIR`].
pub const REGISTRY_FILE: &str = "registry.json";

/// Advisory lock file serializing lifecycle operations against one project,
/// relative to [`SANDBOXES_DIR`].
pub const LOCK_FILE: &str = "registry.lock";

/// Devcontainer descriptor locations searched in order of preference,
/// relative to the project root.
pub const DEVCONTAINER_PATHS: &[&str] = &[".devcontainer/devcontainer.json", ".devcontainer.json"];

/// Prefix for branches created when the caller does not name one.
pub const BRANCH_PREFIX: &str = "sandbox/";

/// Label marking containers as Warren-managed.
pub const LABEL_MANAGED: &str = "warren.managed";

/// Label carrying the owning project's slug.
pub const LABEL_PROJECT: &str = "warren.project";

/// Label carrying the sandbox name.
pub const LABEL_SANDBOX: &str = "warren.sandbox";
