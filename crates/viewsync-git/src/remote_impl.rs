//! Fetch and push.

use crate::error::GitError;
use crate::gix_repo::GixRepo;

pub fn fetch(repo: &GixRepo, remote: &str, refspecs: &[&str]) -> Result<(), GitError> {
    let mut args = vec!["fetch", "--quiet", "--no-tags", remote];
    args.extend_from_slice(refspecs);
    repo.git().run(&args)?;
    tracing::debug!(remote, refspecs = ?refspecs, "fetched");
    Ok(())
}

pub fn push(repo: &GixRepo, remote: &str, refspecs: &[&str]) -> Result<(), GitError> {
    if refspecs.is_empty() {
        return Ok(());
    }
    let mut args = vec!["push", "--quiet", "--no-verify", remote];
    args.extend_from_slice(refspecs);
    repo.git().run(&args)?;
    tracing::debug!(remote, refspecs = ?refspecs, "pushed");
    Ok(())
}
