//! Commit reading, commit creation and history walks.

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{CommitInfo, GitOid, RefName};

pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("commit {oid}: {e}"),
        })?;

    let decoded = commit.decode().map_err(|e| GitError::BackendError {
        message: format!("failed to decode commit {oid}: {e}"),
    })?;

    let tree_oid = from_gix_oid(&decoded.tree())?;
    let parents = decoded
        .parents()
        .map(|p| from_gix_oid(&p))
        .collect::<Result<Vec<_>, _>>()?;
    let message = decoded.message.to_string();
    let author_sig = decoded.author();
    let author = format!("{} <{}>", author_sig.name, author_sig.email);

    Ok(CommitInfo {
        tree_oid,
        parents,
        message,
        author,
    })
}

/// Written with `git commit-tree` so the configured identity applies
/// regardless of the repository's own config.
pub fn create_commit(
    repo: &GixRepo,
    tree: GitOid,
    parents: &[GitOid],
    message: &str,
    update_ref: Option<&RefName>,
) -> Result<GitOid, GitError> {
    let tree = tree.to_string();
    let parents: Vec<String> = parents.iter().map(ToString::to_string).collect();

    let mut args = vec!["commit-tree", tree.as_str()];
    for parent in &parents {
        args.push("-p");
        args.push(parent);
    }
    args.extend(["-F", "-"]);

    let out = repo.git().run_with_input(&args, message.as_bytes())?;
    let oid: GitOid = out.lines().next().unwrap_or_default().parse()?;

    if let Some(name) = update_ref {
        crate::refs_impl::write_ref(repo, name, oid, "viewsync: commit")?;
    }
    Ok(oid)
}

pub fn log(repo: &GixRepo, tip: GitOid, limit: usize) -> Result<Vec<GitOid>, GitError> {
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(tip)])
        .all()
        .map_err(GitError::backend)?;

    let mut commits = Vec::new();
    for info in walk.take(limit) {
        let info = info.map_err(GitError::backend)?;
        commits.push(from_gix_oid(&info.id)?);
    }
    Ok(commits)
}
