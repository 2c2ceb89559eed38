//! Branch switching and the destructive working-tree primitives.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{GitOid, RefName};

pub fn checkout_branch(repo: &GixRepo, name: &str) -> Result<(), GitError> {
    repo.require_workdir()?;
    // Validates the name before handing it to the CLI.
    RefName::branch(name)?;
    repo.git().run(&["checkout", "--quiet", name, "--"])?;
    Ok(())
}

pub fn checkout_branch_at(repo: &GixRepo, name: &str, start: &RefName) -> Result<(), GitError> {
    repo.require_workdir()?;
    RefName::branch(name)?;
    repo.git()
        .run(&["checkout", "--quiet", "-B", name, start.as_str(), "--"])?;
    Ok(())
}

pub fn reset_hard(repo: &GixRepo, target: &str) -> Result<(), GitError> {
    repo.require_workdir()?;
    repo.git().run(&["reset", "--hard", "--quiet", target, "--"])?;
    Ok(())
}

pub fn clean_untracked(repo: &GixRepo) -> Result<(), GitError> {
    repo.require_workdir()?;
    repo.git().run(&["clean", "-f", "-d", "--quiet"])?;
    Ok(())
}

pub fn read_tree_reset(repo: &GixRepo, tree_ish: GitOid) -> Result<(), GitError> {
    repo.require_workdir()?;
    repo.git()
        .run(&["read-tree", "--reset", "-u", &tree_ish.to_string()])?;
    Ok(())
}

pub fn reset_index(repo: &GixRepo, target: &str) -> Result<(), GitError> {
    repo.require_workdir()?;
    repo.git().run(&["reset", "--mixed", "--quiet", target, "--"])?;
    Ok(())
}
