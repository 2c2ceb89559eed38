//! The [`GitRepo`] and [`DestructiveGitRepo`] traits.
//!
//! The split is a capability boundary. [`GitRepo`] holds every primitive that
//! leaves uncommitted working-tree content intact: reading objects and refs,
//! writing objects and refs, non-forced checkouts (git refuses them when they
//! would clobber local edits), fetch and push. [`DestructiveGitRepo`] adds the
//! primitives that overwrite the working tree or index unconditionally.
//!
//! Both traits are object-safe. Callers that must not destroy work are given
//! `&dyn GitRepo`; there is no way to reach a destructive method from it.
//!
//! | Group        | Methods                                              |
//! |--------------|------------------------------------------------------|
//! | Refs         | `read_ref`, `write_ref`, `delete_ref`, `list_refs`   |
//! | Rev-parse    | `rev_parse`, `rev_parse_opt`                         |
//! | Objects      | `read_commit`, `create_commit`, `write_worktree_tree`|
//! | History      | `log`, `is_ancestor`                                 |
//! | Branches     | `create_branch`, `current_branch`, `checkout_*`      |
//! | Status       | `status`, `is_dirty`                                 |
//! | Remotes      | `fetch`, `push`                                      |
//! | Destructive  | `reset_hard`, `clean_untracked`, `read_tree_reset`, `reset_index` |

use crate::error::GitError;
use crate::types::{CommitInfo, GitOid, RefName, StatusEntry};

/// Non-destructive git primitives.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Create or overwrite a ref unconditionally.
    ///
    /// Replaces: `git update-ref -m <log_message> <name> <oid>`.
    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError>;

    /// Delete a ref. No-op if the ref does not exist.
    fn delete_ref(&self, name: &RefName) -> Result<(), GitError>;

    /// List refs whose full name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError>;

    // -----------------------------------------------------------------------
    // Rev-parse
    // -----------------------------------------------------------------------

    /// Resolve a revision specification to an OID.
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    /// Like [`rev_parse`](Self::rev_parse) but returns `None` when the spec
    /// cannot be resolved.
    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Read a commit object's metadata.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    /// Write a commit object and optionally point `update_ref` at it.
    ///
    /// The commit is authored by the repository's configured
    /// [`Identity`](crate::Identity). Writing an object never touches the
    /// working tree or index.
    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        update_ref: Option<&RefName>,
    ) -> Result<GitOid, GitError>;

    /// Write the full working-tree content, tracked and untracked files
    /// alike (`.gitignore` respected), as a tree object.
    ///
    /// Uses a scratch index: the repository's real index and the working
    /// tree are left exactly as they were.
    fn write_worktree_tree(&self) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Up to `limit` commits reachable from `tip`, newest first.
    fn log(&self, tip: GitOid, limit: usize) -> Result<Vec<GitOid>, GitError>;

    /// `true` if `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError>;

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create `refs/heads/<name>` at `start`. Fails if the branch exists.
    fn create_branch(&self, name: &str, start: GitOid) -> Result<(), GitError>;

    /// Short name of the branch `HEAD` points to, or `None` when detached.
    fn current_branch(&self) -> Result<Option<String>, GitError>;

    /// Switch to an existing local branch.
    ///
    /// Replaces: `git checkout <name>`. Git refuses the switch if it would
    /// overwrite local modifications.
    fn checkout_branch(&self, name: &str) -> Result<(), GitError>;

    /// Point local branch `name` at `start` and switch to it.
    ///
    /// Replaces: `git checkout -B <name> <start>`. Like
    /// [`checkout_branch`](Self::checkout_branch), local modifications are
    /// never overwritten.
    fn checkout_branch_at(&self, name: &str, start: &RefName) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Changed, staged and untracked paths relative to `HEAD`.
    fn status(&self) -> Result<Vec<StatusEntry>, GitError>;

    /// `true` if [`status`](Self::status) would report anything.
    fn is_dirty(&self) -> Result<bool, GitError> {
        Ok(!self.status()?.is_empty())
    }

    // -----------------------------------------------------------------------
    // Remotes
    // -----------------------------------------------------------------------

    /// Fetch from `remote`. An empty `refspecs` uses the remote's
    /// configured fetch refspecs.
    fn fetch(&self, remote: &str, refspecs: &[&str]) -> Result<(), GitError>;

    /// Push `refspecs` to `remote`.
    fn push(&self, remote: &str, refspecs: &[&str]) -> Result<(), GitError>;
}

/// Primitives that discard uncommitted working-tree or index content.
pub trait DestructiveGitRepo: GitRepo {
    /// Replaces: `git reset --hard <target>`.
    fn reset_hard(&self, target: &str) -> Result<(), GitError>;

    /// Remove untracked files and directories. Ignored files are kept.
    ///
    /// Replaces: `git clean -fd`.
    fn clean_untracked(&self) -> Result<(), GitError>;

    /// Make the index and working tree match `tree_ish` exactly, removing
    /// tracked files it does not contain.
    ///
    /// Replaces: `git read-tree --reset -u <tree_ish>`.
    fn read_tree_reset(&self, tree_ish: GitOid) -> Result<(), GitError>;

    /// Reset the index to `target` without touching the working tree.
    ///
    /// Replaces: `git reset --mixed <target>`.
    fn reset_index(&self, target: &str) -> Result<(), GitError>;
}
