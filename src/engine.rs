//! The engine façade: everything the outward API layer calls.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use viewsync_git::GitOid;

use crate::binder::Binder;
use crate::config::Config;
use crate::error::{Error, GitContext as _, Result};
use crate::events::{self, Event, EventKind, EventSink, LogSink};
use crate::executor::{Executor, RepoKey, ScheduleOptions};
use crate::locator::Locator;
use crate::model::{
    Change, ChangeId, Codebase, CodebaseId, Snapshot, SnapshotId, UserId, View, ViewId, Workspace,
    WorkspaceId,
};
use crate::snapshot::SnapshotEngine;
use crate::store::Stores;

/// Optional metadata for a new view.
#[derive(Clone, Debug, Default)]
pub struct NewView {
    pub name: Option<String>,
    pub mount_path: Option<PathBuf>,
    pub mount_hostname: Option<String>,
}

/// Optional metadata for a new workspace.
#[derive(Clone, Debug, Default)]
pub struct NewWorkspace {
    pub name: Option<String>,
    /// Start the branch at this change's commit instead of the trunk tip.
    pub from_change: Option<ChangeId>,
}

pub struct Engine {
    executor: Arc<Executor>,
    stores: Stores,
    events: Arc<dyn EventSink>,
    snapshots: Arc<SnapshotEngine>,
    binder: Binder,
    trunk_branch: String,
}

impl Engine {
    #[must_use]
    pub fn new(config: &Config, stores: Stores, events: Arc<dyn EventSink>) -> Self {
        let executor = Arc::new(Executor::new(
            Locator::new(config.repos.base_path.clone()),
            (&config.identity).into(),
            &config.executor,
        ));
        let snapshots = Arc::new(SnapshotEngine::new(
            Arc::clone(&executor),
            stores.clone(),
            Arc::clone(&events),
            config.snapshots.publish_to_trunk,
        ));
        let binder = Binder::new(
            Arc::clone(&executor),
            Arc::clone(&snapshots),
            stores.clone(),
            Arc::clone(&events),
        );
        Self {
            executor,
            stores,
            events,
            snapshots,
            binder,
            trunk_branch: config.repos.trunk_branch.clone(),
        }
    }

    /// Engine with JSON-file records under `config.store.path` and events
    /// logged through `tracing`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Stores::json_dir(&config.store.path), Arc::new(LogSink))
    }

    #[must_use]
    pub const fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    #[must_use]
    pub const fn stores(&self) -> &Stores {
        &self.stores
    }

    #[must_use]
    pub fn locator(&self) -> &Locator {
        self.executor.locator()
    }

    // -----------------------------------------------------------------------
    // Codebases and workspaces
    // -----------------------------------------------------------------------

    /// Create a codebase and its bare trunk, seeded with an empty root commit.
    ///
    /// # Errors
    /// Lock, git and store failures.
    #[instrument(skip(self))]
    pub fn create_codebase(&self, short_id: Option<&str>) -> Result<Codebase> {
        let id = CodebaseId::generate();
        let key = RepoKey::Trunk(id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::rebasing(), "create trunk", |handle| {
                handle.rebasing("init trunk")?.init_trunk(&self.trunk_branch)
            })?;

        let codebase = Codebase {
            short_id: short_id.map_or_else(|| short(id.as_str()), str::to_owned),
            id,
            created_at: Utc::now(),
        };
        self.stores.codebases.insert(&codebase)?;
        info!(codebase = %codebase.id, "codebase created");
        Ok(codebase)
    }

    /// Create a workspace branch on the trunk, at the trunk tip or at
    /// `from_change`'s commit.
    ///
    /// # Errors
    /// `NotFound` for an unknown codebase or change, `CodebaseMismatch`,
    /// lock, git and store failures.
    #[instrument(skip(self, new), fields(codebase = %codebase_id, user = %user_id))]
    pub fn create_workspace(
        &self,
        codebase_id: &CodebaseId,
        user_id: &UserId,
        new: NewWorkspace,
    ) -> Result<Workspace> {
        let codebase = self.stores.codebases.get(codebase_id)?;
        let start = match &new.from_change {
            Some(change_id) => {
                let change = self.stores.changes.get(change_id)?;
                if change.codebase_id != codebase.id {
                    return Err(Error::CodebaseMismatch {
                        what: format!("change {change_id}"),
                        expected: codebase.id.to_string(),
                        actual: change.codebase_id.to_string(),
                    });
                }
                let oid: GitOid = change
                    .commit_id
                    .parse()
                    .map_err(viewsync_git::GitError::from)
                    .vcs(|| format!("reading commit of change {change_id}"))?;
                Some(oid)
            }
            None => None,
        };

        let id = WorkspaceId::generate();
        let key = RepoKey::Trunk(codebase.id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::new(), "create workspace", |handle| {
                let git = handle.git()?;
                let start = match start {
                    Some(oid) => oid,
                    None => git
                        .rev_parse(&format!("refs/heads/{}", self.trunk_branch))
                        .vcs(|| format!("resolving tip of {}", handle.key()))?,
                };
                git.create_branch(id.as_str(), start)
                    .vcs(|| format!("creating branch {id} on {}", handle.key()))
            })?;

        let workspace = Workspace {
            id,
            codebase_id: codebase.id,
            user_id: user_id.clone(),
            name: new.name,
            from_change: new.from_change,
            view_id: None,
            created_at: Utc::now(),
            archived_at: None,
        };
        self.stores.workspaces.insert(&workspace)?;
        info!(workspace = %workspace.id, "workspace created");
        Ok(workspace)
    }

    /// Record an existing trunk commit as a change, so workspaces can start
    /// from it.
    ///
    /// # Errors
    /// `NotFound` if the codebase or the commit does not exist, lock, git and
    /// store failures.
    #[instrument(skip(self, workspace_id, title), fields(codebase = %codebase_id, commit = %commit.short()))]
    pub fn record_change(
        &self,
        codebase_id: &CodebaseId,
        commit: GitOid,
        workspace_id: Option<&WorkspaceId>,
        title: &str,
    ) -> Result<Change> {
        let codebase = self.stores.codebases.get(codebase_id)?;
        let key = RepoKey::Trunk(codebase.id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::new(), "record change", |handle| {
                match handle.git()?.read_commit(commit) {
                    Ok(_) => Ok(()),
                    Err(viewsync_git::GitError::NotFound { .. }) => {
                        Err(Error::not_found("commit", commit))
                    }
                    Err(e) => Err(Error::git(format!("reading {commit} on {}", handle.key()), e)),
                }
            })?;

        let change = Change {
            id: ChangeId::generate(),
            codebase_id: codebase.id,
            commit_id: commit.to_string(),
            workspace_id: workspace_id.cloned(),
            title: title.to_owned(),
            created_at: Utc::now(),
        };
        self.stores.changes.insert(&change)?;
        Ok(change)
    }

    pub fn get_codebase(&self, id: &CodebaseId) -> Result<Codebase> {
        Ok(self.stores.codebases.get(id)?)
    }

    pub fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        Ok(self.stores.workspaces.get(id)?)
    }

    pub fn get_view(&self, id: &ViewId) -> Result<View> {
        Ok(self.stores.views.get(id)?)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Create a view for `workspace_id`: clone the trunk into a fresh working
    /// copy, persist the view unbound, then open the workspace on it.
    ///
    /// # Errors
    /// `NotFound`, `CodebaseMismatch`, lock, git and store failures. If the
    /// final open fails the view exists unbound and the open can be retried.
    #[instrument(skip(self, new), fields(codebase = %codebase_id, workspace = %workspace_id))]
    pub fn create_view(
        &self,
        codebase_id: &CodebaseId,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
        new: NewView,
    ) -> Result<View> {
        let codebase = self.stores.codebases.get(codebase_id)?;
        let workspace = self.stores.workspaces.get(workspace_id)?;
        if workspace.codebase_id != codebase.id {
            return Err(Error::CodebaseMismatch {
                what: format!("workspace {workspace_id}"),
                expected: codebase.id.to_string(),
                actual: workspace.codebase_id.to_string(),
            });
        }

        let view_id = ViewId::generate();
        let key = RepoKey::View(codebase.id.clone(), view_id.clone());
        let trunk = self.locator().trunk_path(&codebase.id);
        self.executor
            .schedule(&key, &ScheduleOptions::rebasing(), "create view", |handle| {
                handle.rebasing("clone trunk")?.clone_trunk(&trunk)
            })?;

        let view = View {
            id: view_id,
            user_id: user_id.clone(),
            codebase_id: codebase.id,
            workspace_id: None,
            name: new.name,
            mount_path: new.mount_path,
            mount_hostname: new.mount_hostname,
            created_at: Utc::now(),
        };
        self.stores.views.insert(&view)?;
        debug!(view = %view.id, "view created unbound");

        self.open_workspace_on_view(&view.id, workspace_id)
    }

    /// See [`Binder::open_workspace_on_view`].
    ///
    /// # Errors
    /// As for the binder.
    pub fn open_workspace_on_view(&self, view: &ViewId, workspace: &WorkspaceId) -> Result<View> {
        self.binder
            .open_workspace_on_view(view, workspace, &ScheduleOptions::new())
    }

    /// Like [`open_workspace_on_view`](Self::open_workspace_on_view) with an
    /// explicit deadline or cancel token.
    ///
    /// # Errors
    /// As for the binder.
    pub fn open_workspace_on_view_with(
        &self,
        view: &ViewId,
        workspace: &WorkspaceId,
        options: &ScheduleOptions,
    ) -> Result<View> {
        self.binder.open_workspace_on_view(view, workspace, options)
    }

    /// Capture the bound workspace, then delete the working copy and the
    /// view record.
    ///
    /// # Errors
    /// `NotFound`, `ViewOutOfSync` if a failed switch left the working tree
    /// unmatched to the record (re-open the bound workspace first), lock, git
    /// and store failures.
    #[instrument(skip(self))]
    pub fn remove_view(&self, view_id: &ViewId) -> Result<()> {
        let view = self.stores.views.get(view_id)?;
        let key = RepoKey::View(view.codebase_id.clone(), view.id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::rebasing(), "remove view", |handle| {
                if handle.exists() {
                    // Deleting an out-of-sync tree would lose whatever it holds.
                    self.binder.ensure_in_sync(handle, &view)?;
                    self.binder.capture_outgoing_in(handle, &view)?;
                }
                handle.rebasing("remove view")?.remove_instance()?;
                self.stores.views.remove(&view.id)?;
                self.binder
                    .repoint_workspaces(&view.id, view.workspace_id.as_ref(), None)
            })?;

        info!("view removed");
        events::emit(
            self.events.as_ref(),
            &Event::new(view.user_id.clone(), EventKind::ViewRemoved, &view.id),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Snapshot the view's working tree as its bound workspace's state.
    ///
    /// Returns `None` for an unbound view or a clean tree with no history.
    ///
    /// # Errors
    /// `NotFound`, `ViewOutOfSync`, lock, git and store failures.
    pub fn capture_snapshot(&self, view_id: &ViewId) -> Result<Option<Snapshot>> {
        let view = self.stores.views.get(view_id)?;
        let Some(workspace) = view.workspace_id.clone() else {
            debug!(view = %view.id, "unbound view, nothing to capture");
            return Ok(None);
        };
        let key = RepoKey::View(view.codebase_id.clone(), view.id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::new(), "capture snapshot", |handle| {
                self.binder.ensure_in_sync(handle, &view)?;
                self.snapshots.capture_in(handle, &view, &workspace)
            })
    }

    /// Reset the view's working tree to a snapshot of its bound workspace.
    ///
    /// # Errors
    /// `NotFound` if the snapshot does not exist or belongs to another
    /// workspace, `ViewOutOfSync`, lock, git and store failures.
    pub fn restore_snapshot(&self, view_id: &ViewId, snapshot_id: &SnapshotId) -> Result<()> {
        let view = self.stores.views.get(view_id)?;
        let snapshot = self.stores.snapshots.get(snapshot_id)?;
        if !view.is_bound_to(&snapshot.workspace_id) {
            return Err(Error::not_found(
                "snapshot of the bound workspace",
                snapshot_id,
            ));
        }
        let key = RepoKey::View(view.codebase_id.clone(), view.id.clone());
        self.executor
            .schedule(&key, &ScheduleOptions::rebasing(), "restore snapshot", |handle| {
                self.binder.ensure_in_sync(handle, &view)?;
                self.snapshots.restore_in(handle, &snapshot)
            })
    }

    /// # Errors
    /// Store failures.
    pub fn latest_snapshot(&self, workspace: &WorkspaceId) -> Result<Option<Snapshot>> {
        self.snapshots.latest_for(workspace)
    }

    /// # Errors
    /// Store failures.
    pub fn list_snapshots(&self, workspace: &WorkspaceId) -> Result<Vec<Snapshot>> {
        self.snapshots.list_for(workspace)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("executor", &self.executor)
            .field("trunk_branch", &self.trunk_branch)
            .finish_non_exhaustive()
    }
}

fn short(id: &str) -> String {
    id.chars().filter(char::is_ascii_alphanumeric).take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_skips_separators() {
        assert_eq!(short("ab-cd-ef-12-34"), "abcdef12");
        assert_eq!(short("x"), "x");
    }
}
