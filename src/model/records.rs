//! Persisted records: codebases, views, workspaces, snapshots and changes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use viewsync_git::{GitOid, OidParseError};

use super::ids::{ChangeId, CodebaseId, SnapshotId, UserId, ViewId, WorkspaceId};

/// Ref namespace holding snapshot commits, one sub-directory per workspace.
pub const SNAPSHOT_REF_PREFIX: &str = "refs/viewsync/snapshots/";

/// A project with exactly one trunk repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codebase {
    pub id: CodebaseId,
    /// Human-friendly short identifier, for display only.
    pub short_id: String,
    pub created_at: DateTime<Utc>,
}

/// A physical working directory, bound to at most one workspace at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    pub user_id: UserId,
    pub codebase_id: CodebaseId,
    /// `None` while the view is unbound.
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_hostname: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl View {
    /// `true` when the view currently shows `workspace`.
    #[must_use]
    pub fn is_bound_to(&self, workspace: &WorkspaceId) -> bool {
        self.workspace_id.as_ref() == Some(workspace)
    }
}

/// A draft line of work, backed by the branch `refs/heads/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub codebase_id: CodebaseId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The change this workspace was started from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_change: Option<ChangeId>,
    /// The view this workspace is currently open on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<ViewId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Workspace {
    /// The workspace's branch name.
    #[must_use]
    pub fn branch(&self) -> &str {
        self.id.as_str()
    }
}

/// Immutable capture of a workspace's working tree.
///
/// `commit_id` is a commit whose tree is the captured working tree and whose
/// only parent is `base_commit`, the branch tip at capture time. It is kept
/// reachable by `ref_name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub codebase_id: CodebaseId,
    pub workspace_id: WorkspaceId,
    /// The view whose working tree was captured.
    pub view_id: ViewId,
    pub commit_id: String,
    pub tree_id: String,
    pub base_commit: String,
    pub ref_name: String,
    /// Per-workspace, strictly increasing.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// The hidden ref a snapshot of `workspace` is pinned under.
    #[must_use]
    pub fn ref_name_for(workspace: &WorkspaceId, snapshot: &SnapshotId) -> String {
        format!("{SNAPSHOT_REF_PREFIX}{workspace}/{snapshot}")
    }

    /// Parsed [`commit_id`](Self::commit_id).
    ///
    /// # Errors
    /// Returns an error if the stored id is not a full hex OID.
    pub fn commit(&self) -> Result<GitOid, OidParseError> {
        self.commit_id.parse()
    }

    /// Parsed [`tree_id`](Self::tree_id).
    ///
    /// # Errors
    /// Returns an error if the stored id is not a full hex OID.
    pub fn tree(&self) -> Result<GitOid, OidParseError> {
        self.tree_id.parse()
    }

    /// Parsed [`base_commit`](Self::base_commit).
    ///
    /// # Errors
    /// Returns an error if the stored id is not a full hex OID.
    pub fn base(&self) -> Result<GitOid, OidParseError> {
        self.base_commit.parse()
    }
}

/// A finalized commit integrating a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub codebase_id: CodebaseId,
    pub commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}
