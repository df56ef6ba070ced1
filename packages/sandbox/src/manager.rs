// ABOUTME: Sandbox lifecycle manager orchestrating the VCS gateway, container gateway and registry
// ABOUTME: Implements create, list, connect, stop, remove and merge-back with rollback on failure

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use warren_config::Config;
use warren_container::{BindMount, ContainerError, ContainerGateway, ContainerState, RunSpec};
use warren_core::utils::{default_branch, validate_sandbox_name};
use warren_devcontainer::{Descriptor, ImageSource};
use warren_registry::{ProjectLock, RecordStatus, SandboxRecord, SandboxRegistry};
use warren_vcs::{MergeOutcome, VcsGateway};

use crate::error::{Result, SandboxError};
use crate::paths::ProjectLayout;
use crate::ports::{taken_ports, PortAllocator};
use crate::types::{
    ListReport, MergeReport, ObservedStatus, RemoveReport, RemoveStep, SandboxView,
};

/// Progress sink for long-running operations (step descriptions and build
/// output lines).
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Orchestrates the full sandbox lifecycle for one project.
///
/// Every operation acquires the project lock before its first registry read
/// and holds it through its last registry write, so concurrent invocations
/// from separate processes serialize instead of corrupting shared state.
pub struct SandboxManager {
    layout: ProjectLayout,
    config: Config,
    registry: SandboxRegistry,
    allocator: PortAllocator,
    vcs: Arc<dyn VcsGateway>,
    containers: Arc<dyn ContainerGateway>,
}

impl SandboxManager {
    pub fn new(
        project_root: PathBuf,
        config: Config,
        vcs: Arc<dyn VcsGateway>,
        containers: Arc<dyn ContainerGateway>,
    ) -> Result<Self> {
        let registry = SandboxRegistry::open(&project_root)?;
        let allocator = PortAllocator::from_config(&config);
        Ok(Self {
            layout: ProjectLayout::new(project_root),
            config,
            registry,
            allocator,
            vcs,
            containers,
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Fetch one sandbox record, if registered.
    pub fn get(&self, name: &str) -> Result<Option<SandboxRecord>> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        Ok(self.registry.get(name)?)
    }

    /// Create a sandbox: working copy cloned from the local origin, image,
    /// container, registry record. Partial artifacts are rolled back when a
    /// later step fails; the record is only written once the container is
    /// confirmed running.
    pub async fn create(
        &self,
        name: &str,
        branch: Option<&str>,
        progress: Progress<'_>,
    ) -> Result<SandboxRecord> {
        validate_sandbox_name(name)?;

        let _lock = ProjectLock::acquire(self.layout.project_root())?;

        if self.registry.get(name)?.is_some() {
            return Err(SandboxError::AlreadyExists(name.to_string()));
        }

        progress("Preparing local origin...");
        self.ensure_origin().await?;

        let branch = branch
            .map(str::to_string)
            .unwrap_or_else(|| default_branch(name));
        let worktree = self.layout.worktree_path(name);

        progress("Creating working copy...");
        if let Err(e) = VcsGateway::clone(
            &*self.vcs,
            &self.layout.origin_path(),
            &worktree,
            &branch,
        )
        .await
        {
            self.rollback_create(name, &worktree, false).await;
            return Err(e.into());
        }

        // Everything after this point must clean up the working copy (and
        // any container) before surfacing its error.
        match self.provision(name, &branch, &worktree, progress).await {
            Ok(record) => {
                progress("Sandbox ready");
                info!("Created sandbox '{}' on branch '{}'", name, branch);
                Ok(record)
            }
            Err((e, container_created)) => {
                self.rollback_create(name, &worktree, container_created).await;
                Err(e)
            }
        }
    }

    /// Steps (3)..(7) of creation. Returns the error paired with whether a
    /// container exists and needs rollback.
    async fn provision(
        &self,
        name: &str,
        branch: &str,
        worktree: &Path,
        progress: Progress<'_>,
    ) -> std::result::Result<SandboxRecord, (SandboxError, bool)> {
        if let (Some(git_name), Some(git_email)) =
            (self.config.git_name.as_deref(), self.config.git_email.as_deref())
        {
            self.vcs
                .configure_identity(worktree, git_name, git_email)
                .await
                .map_err(|e| (e.into(), false))?;
        }

        progress("Reading devcontainer descriptor...");
        let descriptor = Descriptor::load(worktree).map_err(|e| (e.into(), false))?;

        progress("Allocating ports...");
        let snapshot = self.registry.all().map_err(|e| (e.into(), false))?;
        let taken = taken_ports(snapshot.records.iter().map(|r| &r.ports));
        let ports = self
            .allocator
            .allocate(&descriptor.forward_ports, &taken, snapshot.len())
            .map_err(|e| (e, false))?;

        let image = match &descriptor.image_source {
            ImageSource::Build {
                context,
                dockerfile,
            } => {
                let tag = self.layout.image_tag(name);
                progress("Building container image...");
                self.containers
                    .build_image(context, dockerfile, &tag, &self.layout.labels(name), progress)
                    .await
                    .map_err(|e| (e.into(), false))?;
                tag
            }
            ImageSource::Image(image) => {
                let exists = self
                    .containers
                    .image_exists(image)
                    .await
                    .map_err(|e| (e.into(), false))?;
                if !exists {
                    return Err((
                        SandboxError::Container(ContainerError::ImageMissing(image.clone())),
                        false,
                    ));
                }
                image.clone()
            }
        };

        progress("Starting container...");
        let workspace_folder = descriptor.workspace_folder(self.layout.slug());
        let mut mounts = vec![BindMount {
            source: worktree.display().to_string(),
            target: workspace_folder.clone(),
            readonly: false,
        }];
        for mount in &descriptor.mounts {
            mounts.push(BindMount {
                source: mount.source.clone(),
                target: mount.target.clone(),
                readonly: false,
            });
        }
        for (source, target) in self.config.extra_mounts(self.layout.project_root()) {
            mounts.push(BindMount {
                source,
                target,
                readonly: false,
            });
        }

        let container_name = self.layout.container_name(name);
        let spec = RunSpec {
            image,
            name: container_name.clone(),
            labels: self.layout.labels(name),
            mounts,
            ports: ports.clone(),
            workdir: Some(workspace_folder),
            command: None,
        };

        let container_id = self
            .containers
            .run(&spec)
            .await
            .map_err(|e| (e.into(), true))?;

        // The record is only persisted once the runtime confirms the
        // container is up, so a crash here leaves artifacts but never a
        // registry entry pointing at nothing.
        let state = self
            .containers
            .status(&container_name)
            .await
            .map_err(|e| (e.into(), true))?;
        if state != ContainerState::Running {
            return Err((
                SandboxError::Container(ContainerError::CommandFailed {
                    command: "run".to_string(),
                    detail: format!("container {} is {} after start", container_name, state),
                }),
                true,
            ));
        }

        let record = SandboxRecord {
            name: name.to_string(),
            branch: branch.to_string(),
            worktree_path: worktree.to_path_buf(),
            ports,
            container_name,
            container_id: Some(container_id),
            status: RecordStatus::Running,
            created_at: Utc::now(),
        };
        self.registry.put(&record).map_err(|e| (e.into(), true))?;

        Ok(record)
    }

    /// Read-only reconciliation: every record cross-checked against the
    /// live container runtime. Never mutates the registry.
    pub async fn list(&self) -> Result<ListReport> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        let snapshot = self.registry.all()?;

        let mut report = ListReport {
            sandboxes: Vec::with_capacity(snapshot.records.len()),
            corrupt: snapshot.corrupt,
            orphans: Vec::new(),
        };

        for record in snapshot.records {
            let state = self.containers.status(&record.container_name).await?;
            let observed = ObservedStatus::from_state(state);
            if observed == ObservedStatus::Drifted {
                debug!(
                    "Sandbox '{}' has drifted: container {} is gone",
                    record.name, record.container_name
                );
            }
            report.sandboxes.push(SandboxView { record, observed });
        }

        // Drift in the other direction: containers wearing this project's
        // labels that no record claims.
        let labeled = self.containers.list(&self.layout.label_filter()).await?;
        for summary in labeled {
            let claimed = report
                .sandboxes
                .iter()
                .any(|v| v.record.container_name == summary.name)
                || report
                    .corrupt
                    .iter()
                    .any(|c| self.layout.container_name(&c.name) == summary.name);
            if !claimed {
                debug!("Container {} is orphaned (no registry entry)", summary.name);
                report.orphans.push(summary);
            }
        }

        Ok(report)
    }

    /// Attach an interactive shell to a sandbox, starting its container
    /// first if it is stopped. Returns the shell's exit code.
    pub async fn connect(&self, name: &str, shell: Option<&str>) -> Result<i32> {
        let record = {
            let _lock = ProjectLock::acquire(self.layout.project_root())?;
            let record = self
                .registry
                .get(name)?
                .ok_or_else(|| SandboxError::NotFound(name.to_string()))?;

            match self.containers.status(&record.container_name).await? {
                ContainerState::Running => {}
                ContainerState::Stopped => {
                    self.containers.start(&record.container_name).await?;
                    self.registry.update_status(name, RecordStatus::Running)?;
                }
                ContainerState::Absent => {
                    return Err(SandboxError::Container(ContainerError::NotFound(
                        record.container_name.clone(),
                    )));
                }
            }
            record
            // Lock released here: the interactive session is unbounded and
            // must not serialize against other operations.
        };

        let shell = shell
            .map(str::to_string)
            .unwrap_or_else(|| self.config.shell());
        let command: Vec<String> = if self.config.init_commands.is_empty() {
            vec![shell]
        } else {
            // Run init commands in a preliminary shell that execs the real
            // one, so the environment they set up survives.
            let script = format!("{} && exec {}", self.config.init_commands.join(" && "), shell);
            vec!["sh".to_string(), "-c".to_string(), script]
        };

        let code = self
            .containers
            .exec_interactive(&record.container_name, &command)
            .await?;
        Ok(code)
    }

    /// Stop a sandbox's container. Already-stopped sandboxes are a no-op,
    /// not an error. The working copy, ports and record stay untouched.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        let record = self
            .registry
            .get(name)?
            .ok_or_else(|| SandboxError::NotFound(name.to_string()))?;

        if record.status == RecordStatus::Stopped {
            debug!("Sandbox '{}' already stopped", name);
            return Ok(());
        }

        self.containers.stop(&record.container_name).await?;
        self.registry.update_status(name, RecordStatus::Stopped)?;
        info!("Stopped sandbox '{}'", name);
        Ok(())
    }

    /// Stop every running sandbox of this project, best effort. Returns the
    /// names actually stopped.
    pub async fn stop_all(&self) -> Result<Vec<String>> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        let snapshot = self.registry.all()?;

        let mut stopped = Vec::new();
        for record in snapshot.records {
            if record.status != RecordStatus::Running {
                continue;
            }
            match self.containers.stop(&record.container_name).await {
                Ok(()) => {
                    self.registry
                        .update_status(&record.name, RecordStatus::Stopped)?;
                    stopped.push(record.name);
                }
                Err(e) => warn!("Could not stop sandbox '{}': {}", record.name, e),
            }
        }
        Ok(stopped)
    }

    /// Tear a sandbox down: container, working copy, registry record.
    /// Without `force` the first failing step aborts and the record is
    /// kept; with `force` every step runs and the report carries the
    /// individual failures.
    pub async fn remove(&self, name: &str, force: bool) -> Result<RemoveReport> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;

        let record = match self.registry.get(name) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(SandboxError::NotFound(name.to_string())),
            // A corrupt record can still be force-removed by derived paths.
            Err(e) if force => {
                warn!("Force-removing sandbox '{}' with corrupt record: {}", name, e);
                SandboxRecord {
                    name: name.to_string(),
                    branch: default_branch(name),
                    worktree_path: self.layout.worktree_path(name),
                    ports: BTreeMap::new(),
                    container_name: self.layout.container_name(name),
                    container_id: None,
                    status: RecordStatus::Stopped,
                    created_at: Utc::now(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = RemoveReport::default();

        match self.containers.stop(&record.container_name).await {
            Ok(()) => report.ok(RemoveStep::StopContainer),
            Err(e) if force => report.failed(RemoveStep::StopContainer, e.to_string()),
            Err(e) => return Err(e.into()),
        }

        match self.containers.remove(&record.container_name, force).await {
            Ok(()) => report.ok(RemoveStep::RemoveContainer),
            Err(e) if force => report.failed(RemoveStep::RemoveContainer, e.to_string()),
            Err(e) => return Err(e.into()),
        }

        match self.vcs.remove_worktree(&record.worktree_path) {
            Ok(()) => report.ok(RemoveStep::DeleteWorktree),
            Err(e) if force => report.failed(RemoveStep::DeleteWorktree, e.to_string()),
            Err(e) => return Err(e.into()),
        }

        self.registry.delete(name)?;
        report.ok(RemoveStep::DeleteRecord);

        info!("Removed sandbox '{}'", name);
        Ok(report)
    }

    /// Merge a sandbox's branch back into the caller's working copy via the
    /// local origin. The sandbox itself is never touched; a conflicted
    /// merge is aborted and surfaced for manual resolution.
    pub async fn merge(&self, name: &str, target: Option<&str>) -> Result<MergeReport> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        let record = self
            .registry
            .get(name)?
            .ok_or_else(|| SandboxError::NotFound(name.to_string()))?;

        let project_root = self.layout.project_root();

        // Refuse before anything touches the origin, so a dirty tree
        // leaves all shared state exactly as it was.
        if self.vcs.is_dirty(project_root)? {
            return Err(SandboxError::DirtyWorkingTree(project_root.to_path_buf()));
        }

        self.vcs
            .push(&record.worktree_path, "origin", &record.branch)
            .await?;

        let current = self.vcs.current_branch(project_root)?;
        let target = target.map(str::to_string).unwrap_or(current.clone());
        if target != current {
            self.vcs.checkout(project_root, &target).await?;
        }

        let origin = self.layout.origin_path().display().to_string();
        self.vcs.fetch(project_root, &origin, &record.branch).await?;

        match self.vcs.merge(project_root, "FETCH_HEAD").await? {
            MergeOutcome::Merged => {
                info!(
                    "Merged sandbox '{}' ({}) into '{}'",
                    name, record.branch, target
                );
                Ok(MergeReport {
                    branch: record.branch,
                    target,
                })
            }
            MergeOutcome::Conflict => Err(SandboxError::MergeConflict {
                branch: record.branch,
                target,
            }),
        }
    }

    /// Stored port mapping of a sandbox.
    pub fn ports(&self, name: &str) -> Result<BTreeMap<u16, u16>> {
        let _lock = ProjectLock::acquire(self.layout.project_root())?;
        let record = self
            .registry
            .get(name)?
            .ok_or_else(|| SandboxError::NotFound(name.to_string()))?;
        Ok(record.ports)
    }

    /// Stream a sandbox container's logs to the terminal.
    pub async fn logs(&self, name: &str, follow: bool) -> Result<()> {
        let record = {
            let _lock = ProjectLock::acquire(self.layout.project_root())?;
            self.registry
                .get(name)?
                .ok_or_else(|| SandboxError::NotFound(name.to_string()))?
        };
        self.containers.logs(&record.container_name, follow).await?;
        Ok(())
    }

    /// Make sure the local origin exists and reflects the caller's current
    /// branch. Bare-clones the project on first use; later creates re-push
    /// the current branch so new sandboxes start from fresh history.
    async fn ensure_origin(&self) -> Result<()> {
        let origin = self.layout.origin_path();
        let project_root = self.layout.project_root();

        if !origin.exists() {
            info!("Creating local origin at {}", origin.display());
            self.vcs.clone_bare(project_root, &origin).await?;
            return Ok(());
        }

        match self.vcs.current_branch(project_root) {
            Ok(branch) if branch != "detached" => {
                let origin_str = origin.display().to_string();
                if let Err(e) = self.vcs.push(project_root, &origin_str, &branch).await {
                    // A stale origin is survivable; a missing one is not.
                    warn!("Could not refresh local origin: {}", e);
                }
            }
            Ok(_) => debug!("Detached HEAD; skipping origin refresh"),
            Err(e) => warn!("Could not determine current branch: {}", e),
        }
        Ok(())
    }

    /// Best-effort cleanup of partial creation artifacts. Failures are
    /// logged, never allowed to mask the original error.
    async fn rollback_create(&self, name: &str, worktree: &Path, container_created: bool) {
        if container_created {
            let container = self.layout.container_name(name);
            if let Err(e) = self.containers.remove(&container, true).await {
                warn!("Rollback: could not remove container {}: {}", container, e);
            }
        }
        if let Err(e) = self.vcs.remove_worktree(worktree) {
            warn!(
                "Rollback: could not delete working copy {}: {}",
                worktree.display(),
                e
            );
        }
    }
}
