//! Working-tree to tree-object capture through a scratch index.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::GitOid;

pub fn write_worktree_tree(repo: &GixRepo) -> Result<GitOid, GitError> {
    repo.require_workdir()?;

    // Lives inside the git dir so it is on the same filesystem and never
    // shows up as an untracked file.
    let scratch = tempfile::Builder::new()
        .prefix("viewsync-index-")
        .tempdir_in(&repo.git_dir)?;
    let index = scratch.path().join("index");

    // Seeding from the live index lets git reuse cached stat data instead
    // of rehashing every tracked file.
    let live = repo.git_dir.join("index");
    if live.exists() {
        std::fs::copy(&live, &index)?;
    }

    let git = repo.git().env("GIT_INDEX_FILE", index.as_os_str());
    git.run(&["add", "--all"])?;
    let tree = git.run_oid(&["write-tree"])?;

    tracing::trace!(tree = %tree.short(), "wrote working tree");
    Ok(tree)
}
