// ABOUTME: Deterministic on-disk and runtime naming for one project's sandboxes
// ABOUTME: Derives working copy paths, origin location, container names, image tags and labels

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use warren_core::constants::{
    LABEL_MANAGED, LABEL_PROJECT, LABEL_SANDBOX, ORIGIN_DIR, SANDBOXES_DIR,
};
use warren_core::utils::{container_name, project_slug};

/// Everything name- and path-shaped about a project, derived once from its
/// root so every operation agrees on where things live.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    project_root: PathBuf,
    slug: String,
}

impl ProjectLayout {
    pub fn new(project_root: PathBuf) -> Self {
        let slug = project_slug(&project_root);
        Self { project_root, slug }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn sandboxes_dir(&self) -> PathBuf {
        self.project_root.join(SANDBOXES_DIR)
    }

    /// The project's shared bare repository (the Local Origin).
    pub fn origin_path(&self) -> PathBuf {
        self.sandboxes_dir().join(ORIGIN_DIR)
    }

    /// Working copy location for a sandbox.
    pub fn worktree_path(&self, name: &str) -> PathBuf {
        self.sandboxes_dir().join(name)
    }

    pub fn container_name(&self, name: &str) -> String {
        container_name(&self.project_root, name)
    }

    /// Image tag for sandboxes built from a Dockerfile.
    pub fn image_tag(&self, name: &str) -> String {
        format!("warren-{}-{}:latest", self.slug, name)
    }

    /// Labels applied to every container of this project.
    pub fn labels(&self, name: &str) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_PROJECT.to_string(), self.slug.clone()),
            (LABEL_SANDBOX.to_string(), name.to_string()),
        ])
    }

    /// Filter matching every container of this project.
    pub fn label_filter(&self) -> String {
        format!("{}={}", LABEL_PROJECT, self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_deterministic() {
        let layout = ProjectLayout::new(PathBuf::from("/home/dev/webapp"));

        assert_eq!(layout.slug(), "webapp");
        assert_eq!(
            layout.origin_path(),
            PathBuf::from("/home/dev/webapp/.sandboxes/origin.git")
        );
        assert_eq!(
            layout.worktree_path("alice"),
            PathBuf::from("/home/dev/webapp/.sandboxes/alice")
        );
        assert_eq!(layout.container_name("alice"), "warren-webapp-alice");
        assert_eq!(layout.image_tag("alice"), "warren-webapp-alice:latest");
    }

    #[test]
    fn labels_identify_project_and_sandbox() {
        let layout = ProjectLayout::new(PathBuf::from("/home/dev/webapp"));
        let labels = layout.labels("alice");

        assert_eq!(labels.get("warren.managed").map(String::as_str), Some("true"));
        assert_eq!(
            labels.get("warren.project").map(String::as_str),
            Some("webapp")
        );
        assert_eq!(
            labels.get("warren.sandbox").map(String::as_str),
            Some("alice")
        );
        assert_eq!(layout.label_filter(), "warren.project=webapp");
    }
}
