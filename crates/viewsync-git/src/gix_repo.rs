//! The gix-backed implementation of [`GitRepo`] and [`DestructiveGitRepo`].

use std::path::{Path, PathBuf};

use crate::cli::Git;
use crate::error::GitError;
use crate::repo::{DestructiveGitRepo, GitRepo};
use crate::types::{CommitInfo, GitOid, Identity, RefName, StatusEntry};

/// A repository handle backed by [gix](https://github.com/GitoxideLabs/gitoxide)
/// for reads and by the `git` CLI for mutations gix does not cover.
///
/// Construct via [`GixRepo::open`], [`GixRepo::init_bare`] or
/// [`GixRepo::clone_from`].
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    pub(crate) git_dir: PathBuf,
    pub(crate) workdir: Option<PathBuf>,
    pub(crate) identity: Identity,
}

impl GixRepo {
    /// Open the repository at exactly `path` (no parent discovery).
    ///
    /// `path` may be a working-tree root or a bare repository directory.
    pub fn open(path: &Path, identity: Identity) -> Result<Self, GitError> {
        let path = std::fs::canonicalize(path).map_err(|e| GitError::NotFound {
            message: format!("repository {}: {e}", path.display()),
        })?;
        let repo = gix::open_opts(&path, gix::open::Options::isolated())
            .map_err(|e| GitError::NotFound {
                message: format!("repository {}: {e}", path.display()),
            })?;
        let git_dir = repo.git_dir().to_path_buf();
        let workdir = repo.workdir().map(Path::to_path_buf);
        Ok(Self {
            repo,
            git_dir,
            workdir,
            identity,
        })
    }

    /// Initialize a bare repository at `path` whose `HEAD` is
    /// `refs/heads/<initial_branch>`, seeded with one empty root commit.
    pub fn init_bare(path: &Path, initial_branch: &str, identity: Identity) -> Result<Self, GitError> {
        let branch = RefName::branch(initial_branch)?;
        std::fs::create_dir_all(path)?;
        let git = Git::new(path, &identity);
        git.run(&["init", "--bare", "--quiet", "."])?;
        git.run(&["symbolic-ref", "HEAD", branch.as_str()])?;
        let empty_tree = git.run_oid(&["hash-object", "-t", "tree", "-w", "--stdin"])?;
        let root = git.run_oid(&["commit-tree", &empty_tree.to_string(), "-m", "Root commit"])?;
        git.run(&["update-ref", branch.as_str(), &root.to_string(), ""])?;
        tracing::debug!(path = %path.display(), branch = initial_branch, root = %root.short(), "initialized bare repository");
        Self::open(path, identity)
    }

    /// Clone `source` into `dest`, which must not exist or be empty.
    pub fn clone_from(source: &Path, dest: &Path, identity: Identity) -> Result<Self, GitError> {
        let source = std::path::absolute(source)?;
        let dest = std::path::absolute(dest)?;
        let parent = dest.parent().unwrap_or(&dest);
        std::fs::create_dir_all(parent)?;
        let source_arg = source.to_string_lossy();
        let dest_arg = dest.to_string_lossy();
        Git::new(parent, &identity).run(&["clone", "--quiet", &source_arg, &dest_arg])?;
        tracing::debug!(source = %source.display(), dest = %dest.display(), "cloned repository");
        Self::open(&dest, identity)
    }

    /// The `.git` directory (or the repository itself when bare).
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The working-tree root, `None` for bare repositories.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// A CLI invocation rooted at the working tree (or git dir when bare).
    pub(crate) fn git(&self) -> Git<'_> {
        Git::new(self.workdir.as_deref().unwrap_or(&self.git_dir), &self.identity)
    }

    pub(crate) fn require_workdir(&self) -> Result<&Path, GitError> {
        self.workdir.as_deref().ok_or_else(|| GitError::BackendError {
            message: format!("repository {} has no working tree", self.git_dir.display()),
        })
    }
}

/// Convert our `GitOid` to a `gix::ObjectId`.
pub(crate) const fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::Sha1(*oid.as_bytes())
}

/// Convert a gix object id to our `GitOid`. SHA-256 repositories are rejected.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> Result<GitOid, GitError> {
    let bytes: [u8; 20] = oid.as_bytes().try_into().map_err(|_| GitError::InvalidOid {
        value: oid.to_string(),
        reason: "only SHA-1 object ids are supported".to_owned(),
    })?;
    Ok(GitOid::from_bytes(bytes))
}

impl GitRepo for GixRepo {
    // === Refs ===
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::read_ref(self, name)
    }

    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError> {
        crate::refs_impl::write_ref(self, name, oid, log_message)
    }

    fn delete_ref(&self, name: &RefName) -> Result<(), GitError> {
        crate::refs_impl::delete_ref(self, name)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
        crate::refs_impl::list_refs(self, prefix)
    }

    // === Rev-parse ===
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        crate::refs_impl::rev_parse(self, spec)
    }

    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::rev_parse_opt(self, spec)
    }

    // === Objects ===
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }

    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        update_ref: Option<&RefName>,
    ) -> Result<GitOid, GitError> {
        crate::objects_impl::create_commit(self, tree, parents, message, update_ref)
    }

    fn write_worktree_tree(&self) -> Result<GitOid, GitError> {
        crate::snapshot_impl::write_worktree_tree(self)
    }

    // === History ===
    fn log(&self, tip: GitOid, limit: usize) -> Result<Vec<GitOid>, GitError> {
        crate::objects_impl::log(self, tip, limit)
    }

    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
        crate::refs_impl::is_ancestor(self, ancestor, descendant)
    }

    // === Branches ===
    fn create_branch(&self, name: &str, start: GitOid) -> Result<(), GitError> {
        crate::refs_impl::create_branch(self, name, start)
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        crate::refs_impl::current_branch(self)
    }

    fn checkout_branch(&self, name: &str) -> Result<(), GitError> {
        crate::checkout_impl::checkout_branch(self, name)
    }

    fn checkout_branch_at(&self, name: &str, start: &RefName) -> Result<(), GitError> {
        crate::checkout_impl::checkout_branch_at(self, name, start)
    }

    // === Status ===
    fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
        crate::status_impl::status(self)
    }

    // === Remotes ===
    fn fetch(&self, remote: &str, refspecs: &[&str]) -> Result<(), GitError> {
        crate::remote_impl::fetch(self, remote, refspecs)
    }

    fn push(&self, remote: &str, refspecs: &[&str]) -> Result<(), GitError> {
        crate::remote_impl::push(self, remote, refspecs)
    }
}

impl DestructiveGitRepo for GixRepo {
    fn reset_hard(&self, target: &str) -> Result<(), GitError> {
        crate::checkout_impl::reset_hard(self, target)
    }

    fn clean_untracked(&self) -> Result<(), GitError> {
        crate::checkout_impl::clean_untracked(self)
    }

    fn read_tree_reset(&self, tree_ish: GitOid) -> Result<(), GitError> {
        crate::checkout_impl::read_tree_reset(self, tree_ish)
    }

    fn reset_index(&self, target: &str) -> Result<(), GitError> {
        crate::checkout_impl::reset_index(self, target)
    }
}
