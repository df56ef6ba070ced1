// ABOUTME: Shared utility functions for Warren
// ABOUTME: Sandbox name validation and generation, project discovery, container naming

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::DEVCONTAINER_PATHS;

/// Maximum length of a sandbox name. Keeps derived container names within
/// Docker's 128-character limit with room for the project slug.
const MAX_NAME_LEN: usize = 63;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("sandbox name must not be empty")]
    Empty,

    #[error("sandbox name '{0}' is longer than {MAX_NAME_LEN} characters")]
    TooLong(String),

    #[error(
        "sandbox name '{0}' is invalid: use lowercase letters, digits, '-' or '_', \
         starting with a letter or digit"
    )]
    InvalidCharacters(String),
}

/// Validate a user-chosen sandbox name.
///
/// The name doubles as a path component, a container name fragment and a
/// branch name fragment, so the accepted alphabet is the intersection of
/// what all three allow.
pub fn validate_sandbox_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(name.to_string()));
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap_or('-');
    let first_ok = first.is_ascii_lowercase() || first.is_ascii_digit();
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(NameError::InvalidCharacters(name.to_string()))
    }
}

/// Generate a sandbox name not already present in `taken`.
pub fn generate_sandbox_name(taken: &[String]) -> String {
    use rand::seq::SliceRandom;

    const ADJECTIVES: &[&str] = &[
        "brisk", "calm", "clever", "eager", "keen", "lively", "mellow", "nimble", "quiet", "swift",
    ];
    const ANIMALS: &[&str] = &[
        "badger", "fox", "heron", "lynx", "marmot", "otter", "rabbit", "stoat", "vole", "wren",
    ];

    let mut rng = rand::thread_rng();
    loop {
        let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"swift");
        let animal = ANIMALS.choose(&mut rng).unwrap_or(&"fox");
        let candidate = format!("{}-{}", adjective, animal);
        if !taken.iter().any(|t| t == &candidate) {
            return candidate;
        }
    }
}

/// Default branch name for a sandbox.
pub fn default_branch(name: &str) -> String {
    format!("{}{}", crate::constants::BRANCH_PREFIX, name)
}

/// Slug identifying a project, derived from its root directory name.
pub fn project_slug(project_root: &Path) -> String {
    let raw = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "project".to_string());

    let slug: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_string();

    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

/// Container name for a sandbox, namespaced by project so two projects can
/// both own a sandbox called `alice`.
pub fn container_name(project_root: &Path, sandbox: &str) -> String {
    format!("warren-{}-{}", project_slug(project_root), sandbox)
}

/// Find the project root by walking up from `start` until a devcontainer
/// descriptor is found.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for candidate in DEVCONTAINER_PATHS {
            if current.join(candidate).exists() {
                return Some(current);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}
