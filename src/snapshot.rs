//! Snapshot capture and restore.
//!
//! A snapshot is an ordinary commit whose tree is the view's full working
//! tree (tracked and untracked files, ignored files excluded) and whose only
//! parent is the branch tip at capture time. It is pinned under
//! `refs/viewsync/snapshots/<workspace>/<snapshot>` and never reachable from
//! the workspace branch, so capturing leaves branch history untouched.
//!
//! # Clean trees
//!
//! - clean tree and no earlier snapshot: nothing is recorded, `None`;
//! - same tree and base as the latest snapshot: that snapshot is returned;
//! - anything else is recorded, including a clean tree that supersedes an
//!   older dirty snapshot, so restoring always reproduces the captured state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use viewsync_git::{GitError, GitOid, GitRepo, OidParseError, RefName};

use crate::error::{Error, GitContext as _, Result};
use crate::events::{self, Event, EventKind, EventSink};
use crate::executor::{Executor, RepoHandle, RepoKey, ScheduleOptions};
use crate::model::{Snapshot, SnapshotId, View, WorkspaceId};
use crate::store::Stores;

const ORIGIN: &str = "origin";

/// Captures and restores workspace working trees.
pub struct SnapshotEngine {
    executor: Arc<Executor>,
    stores: Stores,
    events: Arc<dyn EventSink>,
    publish_to_trunk: bool,
}

impl SnapshotEngine {
    pub fn new(
        executor: Arc<Executor>,
        stores: Stores,
        events: Arc<dyn EventSink>,
        publish_to_trunk: bool,
    ) -> Self {
        Self {
            executor,
            stores,
            events,
            publish_to_trunk,
        }
    }

    /// Capture `view`'s working tree, locked through `handle`, as the state
    /// of `workspace`.
    ///
    /// # Errors
    /// Git and store failures.
    #[instrument(skip_all, fields(view = %view.id, workspace = %workspace))]
    pub fn capture_in(
        &self,
        handle: &RepoHandle,
        view: &View,
        workspace: &WorkspaceId,
    ) -> Result<Option<Snapshot>> {
        let git = handle.git()?;
        let head = git.rev_parse("HEAD").vcs(|| format!("resolving HEAD of {}", handle.key()))?;
        let head_tree = git
            .read_commit(head)
            .vcs(|| format!("reading HEAD of {}", handle.key()))?
            .tree_oid;
        let tree = git
            .write_worktree_tree()
            .vcs(|| format!("writing working tree of {}", handle.key()))?;

        let latest = self.latest_for(workspace)?;
        match &latest {
            None if tree == head_tree => {
                debug!("clean tree and no prior snapshot, nothing to capture");
                return Ok(None);
            }
            Some(prev) if parsed(prev.tree())? == tree && parsed(prev.base())? == head => {
                debug!(snapshot = %prev.id, "unchanged since latest snapshot");
                return Ok(Some(prev.clone()));
            }
            _ => {}
        }

        let id = SnapshotId::generate();
        let ref_name = RefName::new(&Snapshot::ref_name_for(workspace, &id))
            .vcs(|| format!("naming snapshot {id}"))?;
        let message = format!("viewsync snapshot {id}\n\nworkspace: {workspace}\nview: {}\n", view.id);
        let commit = git
            .create_commit(tree, &[head], &message, Some(&ref_name))
            .vcs(|| format!("committing snapshot of {workspace}"))?;

        if self.publish_to_trunk {
            self.publish(view, git, &ref_name)?;
        }

        let snapshot = Snapshot {
            id,
            codebase_id: view.codebase_id.clone(),
            workspace_id: workspace.clone(),
            view_id: view.id.clone(),
            commit_id: commit.to_string(),
            tree_id: tree.to_string(),
            base_commit: head.to_string(),
            ref_name: ref_name.to_string(),
            sequence: latest.map_or(1, |prev| prev.sequence + 1),
            created_at: Utc::now(),
        };
        self.stores.snapshots.insert(&snapshot)?;
        info!(snapshot = %snapshot.id, commit = %commit.short(), sequence = snapshot.sequence, "captured");

        events::emit(
            self.events.as_ref(),
            &Event::new(view.user_id.clone(), EventKind::WorkspaceSnapshotted, workspace),
        );
        Ok(Some(snapshot))
    }

    /// Push a snapshot ref to the trunk under the trunk lock.
    fn publish(&self, view: &View, git: &dyn GitRepo, ref_name: &RefName) -> Result<()> {
        let trunk = RepoKey::Trunk(view.codebase_id.clone());
        let refspec = ref_name.mirror_refspec();
        self.executor
            .schedule(&trunk, &ScheduleOptions::new(), "publish snapshot", |_| {
                git.push(ORIGIN, &[refspec.as_str()])
                    .vcs(|| format!("publishing {ref_name} to {trunk}"))
            })
    }

    /// Make the working tree behind `handle` exactly `snapshot`'s tree. The
    /// handle must allow rebasing.
    ///
    /// `HEAD` and the branch are left alone and the index is reset to `HEAD`,
    /// so the restored content shows up as uncommitted changes.
    ///
    /// # Errors
    /// [`Error::DestructiveOperationDenied`] on a safe handle,
    /// [`Error::NotFound`] if the snapshot commit is neither local nor on
    /// the trunk, plus git failures.
    #[instrument(skip_all, fields(view = %handle.key(), snapshot = %snapshot.id))]
    pub fn restore_in(&self, handle: &RepoHandle, snapshot: &Snapshot) -> Result<()> {
        let rebasing = handle.rebasing("restore snapshot")?;
        let git = rebasing.git()?;
        let commit = parsed(snapshot.commit())?;

        if !has_commit(git, commit)? {
            debug!(commit = %commit.short(), "snapshot object missing locally, fetching from trunk");
            let ref_name = RefName::new(&snapshot.ref_name)
                .vcs(|| format!("parsing ref of snapshot {}", snapshot.id))?;
            let refspec = ref_name.mirror_refspec();
            // A failed fetch is reported as the snapshot being missing below.
            if let Err(e) = git.fetch(ORIGIN, &[refspec.as_str()]) {
                warn!(error = %e, "fetching snapshot ref failed");
            }
            if !has_commit(git, commit)? {
                return Err(Error::not_found("snapshot object", &snapshot.commit_id));
            }
        }

        let head = git.rev_parse("HEAD").vcs(|| format!("resolving HEAD of {}", handle.key()))?;
        if head.to_string() != snapshot.base_commit {
            warn!(
                base = %snapshot.base_commit,
                head = %head.short(),
                "branch moved since snapshot; restoring the captured tree as-is"
            );
        }

        let ctx = || format!("restoring snapshot {} into {}", snapshot.id, handle.key());
        git.reset_hard("HEAD").vcs(ctx)?;
        git.clean_untracked().vcs(ctx)?;
        git.read_tree_reset(commit).vcs(ctx)?;
        git.reset_index("HEAD").vcs(ctx)?;
        info!("restored");
        Ok(())
    }

    /// The most recent snapshot of `workspace`.
    ///
    /// # Errors
    /// Store failures.
    pub fn latest_for(&self, workspace: &WorkspaceId) -> Result<Option<Snapshot>> {
        Ok(self.list_for(workspace)?.pop())
    }

    /// All snapshots of `workspace`, oldest first.
    ///
    /// # Errors
    /// Store failures.
    pub fn list_for(&self, workspace: &WorkspaceId) -> Result<Vec<Snapshot>> {
        let mut all: Vec<Snapshot> = self
            .stores
            .snapshots
            .list()?
            .into_iter()
            .filter(|s| &s.workspace_id == workspace)
            .collect();
        all.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(all)
    }
}

fn parsed(oid: std::result::Result<GitOid, OidParseError>) -> Result<GitOid> {
    oid.map_err(GitError::from)
        .vcs(|| "reading stored snapshot ids".to_owned())
}

fn has_commit<G: GitRepo + ?Sized>(git: &G, commit: GitOid) -> Result<bool> {
    match git.read_commit(commit) {
        Ok(_) => Ok(true),
        Err(GitError::NotFound { .. }) => Ok(false),
        Err(e) => Err(Error::git(format!("reading commit {commit}"), e)),
    }
}
