//! Switching a view from one workspace to another.
//!
//! The whole switch runs inside one executor scheduling on the view, so no
//! other operation on that view can observe a half-migrated working tree:
//!
//! 1. capture the outgoing workspace's working tree as a snapshot;
//! 2. fetch from the trunk and resolve the incoming workspace's branch;
//! 3. discard the working tree (hard reset plus removing untracked files);
//! 4. check out the incoming branch and restore its latest snapshot, if any;
//! 5. persist the new binding.
//!
//! Steps 1 and 2 leave the working tree alone, so a missing branch or an
//! unreachable trunk fails before anything is discarded. A failure in step 3
//! or 4 puts the outgoing workspace back from the snapshot taken in step 1.
//!
//! # Switch journal
//!
//! A marker file in the view's git directory is written before step 3 and
//! removed once the binding is persisted or rolled back. While it exists the
//! working tree is not trustworthy as the bound workspace's state: capture,
//! restore and removal refuse with [`Error::ViewOutOfSync`], and the next open
//! skips capturing the outgoing workspace, whose state is already in its
//! latest snapshot. Re-opening the bound workspace repairs the view.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use viewsync_git::RefName;

use crate::error::{Error, GitContext as _, Result};
use crate::events::{self, Event, EventKind, EventSink};
use crate::executor::{Executor, RepoHandle, RepoKey, ScheduleOptions};
use crate::model::{View, ViewId, Workspace, WorkspaceId};
use crate::snapshot::SnapshotEngine;
use crate::store::Stores;

const ORIGIN: &str = "origin";

/// Name of the switch journal inside a view's `.git` directory.
pub const SWITCH_JOURNAL: &str = "viewsync-switch";

/// How a view's working tree relates to its record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SyncState {
    /// On the bound workspace's branch with no switch pending.
    InSync,
    /// A switch discarded the tree and neither finished nor rolled back.
    Interrupted,
    /// Checked out on a branch other than the bound workspace's.
    WrongBranch { actual: Option<String> },
}

impl SyncState {
    fn reason(&self) -> String {
        match self {
            Self::InSync => "in sync".to_owned(),
            Self::Interrupted => "a switch was interrupted".to_owned(),
            Self::WrongBranch { actual } => format!(
                "working tree is on {}",
                actual.as_deref().unwrap_or("a detached HEAD")
            ),
        }
    }
}

pub struct Binder {
    executor: Arc<Executor>,
    snapshots: Arc<SnapshotEngine>,
    stores: Stores,
    events: Arc<dyn EventSink>,
}

impl Binder {
    pub fn new(
        executor: Arc<Executor>,
        snapshots: Arc<SnapshotEngine>,
        stores: Stores,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            executor,
            snapshots,
            stores,
            events,
        }
    }

    /// Make `view_id` show `workspace_id`, preserving whatever the view
    /// showed before.
    ///
    /// Re-opening the workspace a view is already bound to leaves the working
    /// tree untouched, unless an earlier failed switch left the tree out of
    /// sync with the record; then the bound workspace is restored.
    ///
    /// # Errors
    /// `NotFound` for unknown records or a missing branch, `CodebaseMismatch`,
    /// lock failures and git failures. On error the view record is unchanged
    /// and the working tree still shows the outgoing workspace.
    #[instrument(skip(self, options), fields(view = %view_id, workspace = %workspace_id))]
    pub fn open_workspace_on_view(
        &self,
        view_id: &ViewId,
        workspace_id: &WorkspaceId,
        options: &ScheduleOptions,
    ) -> Result<View> {
        let view = self.stores.views.get(view_id)?;
        let workspace = self.stores.workspaces.get(workspace_id)?;
        if view.codebase_id != workspace.codebase_id {
            return Err(Error::CodebaseMismatch {
                what: format!("workspace {workspace_id}"),
                expected: view.codebase_id.to_string(),
                actual: workspace.codebase_id.to_string(),
            });
        }

        let key = RepoKey::View(view.codebase_id.clone(), view.id.clone());
        let options = options.clone().allow_rebasing(true);
        let (view, switched) = self
            .executor
            .schedule(&key, &options, "open workspace", |handle| {
                // Another open may have finished while we were queued.
                let current = self.stores.views.get(view_id)?;
                if current.is_bound_to(workspace_id) {
                    match self.sync_state(handle, &current)? {
                        SyncState::InSync => {
                            debug!("already bound");
                            return Ok((current, false));
                        }
                        state => warn!(reason = %state.reason(), "repairing view"),
                    }
                }
                self.switch_in(handle, current, &workspace)
                    .map(|view| (view, true))
            })?;

        if switched {
            events::emit(
                self.events.as_ref(),
                &Event::new(view.user_id.clone(), EventKind::ViewUpdated, &view.id),
            );
        }
        Ok(view)
    }

    fn switch_in(&self, handle: &RepoHandle, mut view: View, incoming: &Workspace) -> Result<View> {
        let journal = journal_path(handle);
        self.capture_outgoing_in(handle, &view)?;

        let rebasing = handle.rebasing("open workspace")?;
        let git = rebasing.git()?;
        let ctx = || format!("switching {} to {}", handle.key(), incoming.id);

        git.fetch(ORIGIN, &[]).vcs(|| format!("fetching trunk into {}", handle.key()))?;
        let branch = incoming.branch();
        let local = RefName::branch(branch).vcs(ctx)?;
        let remote = RefName::remote_branch(ORIGIN, branch).vcs(ctx)?;
        let use_remote = match (git.read_ref(&local).vcs(ctx)?, git.read_ref(&remote).vcs(ctx)?) {
            (None, None) => return Err(Error::not_found("workspace branch", branch)),
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (Some(l), Some(r)) => git.is_ancestor(l, r).vcs(ctx)?,
        };

        begin_switch(&journal, view.workspace_id.as_ref())?;
        let migrated = (|| -> Result<()> {
            git.reset_hard("HEAD").vcs(ctx)?;
            git.clean_untracked().vcs(ctx)?;
            if use_remote {
                git.checkout_branch_at(branch, &remote).vcs(ctx)?;
            } else {
                git.checkout_branch(branch).vcs(ctx)?;
            }
            debug!(branch, from_trunk = use_remote, "checked out");
            if let Some(snapshot) = self.snapshots.latest_for(&incoming.id)? {
                self.snapshots.restore_in(handle, &snapshot)?;
            }
            Ok(())
        })();
        if let Err(e) = migrated {
            self.roll_back(handle, &view, &journal);
            return Err(e);
        }

        let outgoing = view.workspace_id.replace(incoming.id.clone());
        self.stores.views.update(&view)?;
        self.repoint_workspaces(&view.id, outgoing.as_ref(), Some(&incoming.id))?;
        finish_switch(&journal)?;
        info!(outgoing = ?outgoing.as_ref().map(WorkspaceId::as_str), "view switched");
        Ok(view)
    }

    /// Put the outgoing workspace back after a failed migration. Failures are
    /// logged and leave the journal in place.
    fn roll_back(&self, handle: &RepoHandle, view: &View, journal: &Path) {
        let restored = (|| -> Result<()> {
            let rebasing = handle.rebasing("roll back switch")?;
            let git = rebasing.git()?;
            let ctx = || format!("rolling back switch of {}", handle.key());
            git.reset_hard("HEAD").vcs(ctx)?;
            git.clean_untracked().vcs(ctx)?;
            if let Some(outgoing) = &view.workspace_id {
                git.checkout_branch(outgoing.as_str()).vcs(ctx)?;
                if let Some(snapshot) = self.snapshots.latest_for(outgoing)? {
                    self.snapshots.restore_in(handle, &snapshot)?;
                }
            }
            finish_switch(journal)
        })();
        match restored {
            Ok(()) => info!("switch rolled back"),
            Err(e) => warn!(error = %e, "rollback failed; view stays out of sync until reopened"),
        }
    }

    /// How the working tree relates to `view`'s record.
    ///
    /// # Errors
    /// Git failures reading the current branch.
    pub(crate) fn sync_state(&self, handle: &RepoHandle, view: &View) -> Result<SyncState> {
        if journal_path(handle).exists() {
            return Ok(SyncState::Interrupted);
        }
        let Some(bound) = &view.workspace_id else {
            return Ok(SyncState::InSync);
        };
        let actual = handle
            .git()?
            .current_branch()
            .vcs(|| format!("reading branch of {}", handle.key()))?;
        if actual.as_deref() == Some(bound.as_str()) {
            Ok(SyncState::InSync)
        } else {
            Ok(SyncState::WrongBranch { actual })
        }
    }

    /// Fail with [`Error::ViewOutOfSync`] unless the tree matches `view`.
    ///
    /// # Errors
    /// `ViewOutOfSync` and git failures.
    pub(crate) fn ensure_in_sync(&self, handle: &RepoHandle, view: &View) -> Result<()> {
        match self.sync_state(handle, view)? {
            SyncState::InSync => Ok(()),
            state => Err(Error::ViewOutOfSync {
                view: view.id.clone(),
                reason: state.reason(),
            }),
        }
    }

    /// Snapshot the workspace `view` is bound to, if the working tree is
    /// really on that workspace's branch.
    ///
    /// A tree on some other branch, or one left behind by an interrupted
    /// switch, must not be captured as the bound workspace's state: that
    /// state is already in the workspace's latest snapshot.
    pub(crate) fn capture_outgoing_in(&self, handle: &RepoHandle, view: &View) -> Result<()> {
        let Some(outgoing) = &view.workspace_id else {
            return Ok(());
        };
        match self.sync_state(handle, view)? {
            SyncState::InSync => {
                self.snapshots.capture_in(handle, view, outgoing)?;
            }
            state => warn!(expected = %outgoing, reason = %state.reason(), "not capturing"),
        }
        Ok(())
    }

    /// Point `incoming` at `view` and detach `outgoing` from it.
    pub(crate) fn repoint_workspaces(
        &self,
        view: &ViewId,
        outgoing: Option<&WorkspaceId>,
        incoming: Option<&WorkspaceId>,
    ) -> Result<()> {
        if let Some(id) = outgoing {
            // The outgoing workspace may have been archived or removed meanwhile.
            if let Some(mut ws) = self.stores.workspaces.find(id)?
                && ws.view_id.as_ref() == Some(view)
            {
                ws.view_id = None;
                self.stores.workspaces.update(&ws)?;
            }
        }
        if let Some(id) = incoming {
            let mut ws = self.stores.workspaces.get(id)?;
            ws.view_id = Some(view.clone());
            self.stores.workspaces.update(&ws)?;
        }
        Ok(())
    }
}

/// Journal location for the view behind `handle`.
fn journal_path(handle: &RepoHandle) -> PathBuf {
    handle.path().join(".git").join(SWITCH_JOURNAL)
}

fn begin_switch(journal: &Path, outgoing: Option<&WorkspaceId>) -> Result<()> {
    let contents = outgoing.map_or_else(String::new, |ws| format!("{ws}\n"));
    std::fs::write(journal, contents).vcs(|| format!("writing {}", journal.display()))
}

fn finish_switch(journal: &Path) -> Result<()> {
    match std::fs::remove_file(journal) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).vcs(|| format!("removing {}", journal.display()))
        }
        _ => Ok(()),
    }
}
