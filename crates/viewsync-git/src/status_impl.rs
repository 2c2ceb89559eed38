//! `git status` parsing.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{FileStatus, StatusEntry};

pub fn status(repo: &GixRepo) -> Result<Vec<StatusEntry>, GitError> {
    repo.require_workdir()?;
    let out = repo
        .git()
        .run(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])?;
    Ok(parse_porcelain_z(&out))
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Rename and copy records carry the original path as an extra
/// NUL-terminated token, which is skipped.
fn parse_porcelain_z(out: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut tokens = out.split('\0').filter(|t| !t.is_empty());

    while let Some(token) = tokens.next() {
        if token.len() < 4 {
            continue;
        }
        let (code, path) = token.split_at(3);
        let mut chars = code.chars();
        let x = chars.next().unwrap_or(' ');
        let y = chars.next().unwrap_or(' ');

        let status = classify(x, y);
        if matches!(x, 'R' | 'C') {
            tokens.next();
        }
        entries.push(StatusEntry {
            path: path.to_owned(),
            status,
        });
    }
    entries
}

fn classify(x: char, y: char) -> FileStatus {
    match (x, y) {
        ('?', '?') => FileStatus::Untracked,
        ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => FileStatus::Conflicted,
        ('R' | 'C', _) => FileStatus::Renamed,
        ('D', _) | (_, 'D') => FileStatus::Deleted,
        ('A', _) => FileStatus::Added,
        _ => FileStatus::Modified,
    }
}
