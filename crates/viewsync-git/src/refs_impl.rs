//! Ref, rev-parse, branch and ancestry operations.
//!
//! Reads go through gix. Writes use `git update-ref`, which takes git's own
//! ref lock and honours compare-and-swap old values.

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{GitOid, RefName};

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut r)) => {
            let id = r.peel_to_id_in_place().map_err(GitError::backend)?;
            Ok(Some(from_gix_oid(&id.detach())?))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::backend(e)),
    }
}

pub fn write_ref(
    repo: &GixRepo,
    name: &RefName,
    oid: GitOid,
    log_message: &str,
) -> Result<(), GitError> {
    let oid = oid.to_string();
    if log_message.is_empty() {
        repo.git().run(&["update-ref", name.as_str(), &oid])?;
    } else {
        repo.git()
            .run(&["update-ref", "-m", log_message, name.as_str(), &oid])?;
    }
    Ok(())
}

pub fn delete_ref(repo: &GixRepo, name: &RefName) -> Result<(), GitError> {
    // No-op if the ref does not exist.
    if read_ref(repo, name)?.is_some() {
        repo.git().run(&["update-ref", "-d", name.as_str()])?;
    }
    Ok(())
}

pub fn list_refs(repo: &GixRepo, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
    let platform = repo.repo.references().map_err(GitError::backend)?;
    let refs_iter = platform.prefixed(prefix).map_err(GitError::backend)?;

    let mut result = Vec::new();
    for r in refs_iter {
        let mut r = r.map_err(GitError::backend)?;
        let name = r.name().as_bstr().to_string();
        let id = r.peel_to_id_in_place().map_err(GitError::backend)?;
        if let Ok(ref_name) = RefName::new(&name) {
            result.push((ref_name, from_gix_oid(&id.detach())?));
        }
    }
    result.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(result)
}

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .rev_parse_single(spec)
        .map_err(|e| GitError::NotFound {
            message: format!("rev-parse '{spec}': {e}"),
        })?;
    from_gix_oid(&id.detach())
}

pub fn rev_parse_opt(repo: &GixRepo, spec: &str) -> Result<Option<GitOid>, GitError> {
    // Every gix rev-parse failure is a resolution failure (malformed spec,
    // missing ref, unborn HEAD), so they all collapse to `None`.
    match repo.repo.rev_parse_single(spec) {
        Ok(id) => Ok(Some(from_gix_oid(&id.detach())?)),
        Err(_) => Ok(None),
    }
}

pub fn is_ancestor(repo: &GixRepo, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
    if ancestor == descendant {
        return Ok(true);
    }

    let ancestor_gix = to_gix_oid(ancestor);
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(descendant)])
        .all()
        .map_err(GitError::backend)?;

    for info in walk {
        let info = info.map_err(GitError::backend)?;
        if info.id == ancestor_gix {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn create_branch(repo: &GixRepo, name: &str, start: GitOid) -> Result<(), GitError> {
    let branch = RefName::branch(name)?;
    // Empty old value: the update fails if the branch already exists.
    repo.git().run(&[
        "update-ref",
        "-m",
        "viewsync: create branch",
        branch.as_str(),
        &start.to_string(),
        "",
    ])?;
    Ok(())
}

pub fn current_branch(repo: &GixRepo) -> Result<Option<String>, GitError> {
    let head = repo.repo.head_name().map_err(GitError::backend)?;
    Ok(head.map(|name| name.shorten().to_string()))
}
