//! Value types shared by the git traits and their callers.
//!
//! None of these types mention gix; the backend stays an implementation
//! detail of [`GixRepo`](crate::GixRepo).

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Abbreviated form used in log lines and commit messages.
    #[must_use]
    pub fn short(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GitOid").field(&format_args!("{self}")).finish()
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    /// Accepts exactly 40 hex digits of either case, ignoring surrounding
    /// whitespace (so raw `git` output parses directly).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let hex = raw.trim();
        let fail = |reason: String| OidParseError {
            value: hex.to_owned(),
            reason,
        };
        if hex.len() != 40 {
            return Err(fail(format!("{} characters, want 40", hex.len())));
        }
        let mut out = [0u8; 20];
        let digits = hex.as_bytes();
        for (i, byte) in out.iter_mut().enumerate() {
            match (nibble(digits[2 * i]), nibble(digits[2 * i + 1])) {
                (Some(hi), Some(lo)) => *byte = hi * 16 + lo,
                _ => return Err(fail(format!("non-hex digit near offset {}", 2 * i))),
            }
        }
        Ok(Self(out))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("not an object id {value:?}: {reason}")]
pub struct OidParseError {
    pub value: String,
    pub reason: String,
}

impl From<OidParseError> for crate::GitError {
    fn from(e: OidParseError) -> Self {
        Self::InvalidOid {
            value: e.value,
            reason: e.reason,
        }
    }
}

fn nibble(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated, fully-qualified git ref name (`refs/...` or `HEAD`).
///
/// Validation is a conservative subset of `git check-ref-format`: it rejects
/// the inputs that would let an identifier escape its namespace or confuse
/// a refspec, which is all viewsync needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns an error if the name is not `HEAD`, does not start with
    /// `refs/`, or contains a component git would refuse.
    pub fn new(name: &str) -> Result<Self, RefNameError> {
        Self::validate(name)?;
        Ok(Self(name.to_owned()))
    }

    /// `refs/heads/<branch>`.
    ///
    /// # Errors
    /// Returns an error if `branch` is not a valid ref component path.
    pub fn branch(branch: &str) -> Result<Self, RefNameError> {
        Self::new(&format!("refs/heads/{branch}"))
    }

    /// `refs/remotes/<remote>/<branch>`.
    ///
    /// # Errors
    /// Returns an error if the result is not a valid ref name.
    pub fn remote_branch(remote: &str, branch: &str) -> Result<Self, RefNameError> {
        Self::new(&format!("refs/remotes/{remote}/{branch}"))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The refspec that copies this ref to the same name on a remote.
    #[must_use]
    pub fn mirror_refspec(&self) -> String {
        format!("+{0}:{0}", self.0)
    }

    fn validate(name: &str) -> Result<(), RefNameError> {
        let reject = |reason: &str| {
            Err(RefNameError {
                value: name.to_owned(),
                reason: reason.to_owned(),
            })
        };
        if name == "HEAD" {
            return Ok(());
        }
        let Some(rest) = name.strip_prefix("refs/") else {
            return reject("ref name must start with 'refs/' or be HEAD");
        };
        if rest.is_empty() {
            return reject("ref name must have a component after 'refs/'");
        }
        if name.contains("..") || name.contains("@{") || name.ends_with('/') {
            return reject("ref name contains '..', '@{' or a trailing slash");
        }
        if name
            .chars()
            .any(|c| c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
        {
            return reject("ref name contains a character git does not allow");
        }
        for component in rest.split('/') {
            if component.is_empty() {
                return reject("ref name contains an empty component");
            }
            if component.starts_with('.') || component.ends_with(".lock") {
                return reject("ref component starts with '.' or ends with '.lock'");
            }
        }
        Ok(())
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = RefNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Why a string was refused as a [`RefName`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("bad ref name {value:?}: {reason}")]
pub struct RefNameError {
    pub value: String,
    pub reason: String,
}

impl From<RefNameError> for crate::GitError {
    fn from(e: RefNameError) -> Self {
        Self::InvalidRefName {
            value: e.value,
            reason: e.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// CommitInfo
// ---------------------------------------------------------------------------

/// Metadata read from a commit object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// Root tree of the commit.
    pub tree_oid: GitOid,
    /// Parent commits, in order.
    pub parents: Vec<GitOid>,
    /// Full commit message.
    pub message: String,
    /// `Name <email>` of the author.
    pub author: String,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// How a path differs from `HEAD` in the working tree or index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileStatus {
    /// Present in the working tree, unknown to the index.
    Untracked,
    /// Newly staged.
    Added,
    /// Content or type changed.
    Modified,
    /// Removed from the working tree or index.
    Deleted,
    /// Renamed or copied.
    Renamed,
    /// Unmerged (conflict markers pending).
    Conflicted,
}

/// One line of `git status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the working-tree root, `/`-separated.
    pub path: String,
    /// Kind of change.
    pub status: FileStatus,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Author and committer identity for commits created by viewsync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new("viewsync", "viewsync@localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn oid_display_roundtrips_through_parse() {
        let hex = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
        let oid: GitOid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
        assert_eq!(oid.short(), "4b825dc642cb");
    }

    #[test]
    fn oid_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<GitOid>().is_err());
        assert!("zz825dc642cb6eb9a060e54bf8d69288fbee4904".parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_parse_tolerates_trailing_newline() {
        let oid: GitOid = "4b825dc642cb6eb9a060e54bf8d69288fbee4904\n".parse().unwrap();
        assert_eq!(oid.short(), "4b825dc642cb");
    }

    #[test]
    fn status_entries_sort_by_path_then_status() {
        let mut entries = vec![
            ("b.txt".to_owned(), FileStatus::Modified),
            ("a.txt".to_owned(), FileStatus::Deleted),
            ("a.txt".to_owned(), FileStatus::Untracked),
        ];
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_owned(), FileStatus::Untracked),
                ("a.txt".to_owned(), FileStatus::Deleted),
                ("b.txt".to_owned(), FileStatus::Modified),
            ]
        );
    }

    #[test]
    fn ref_name_accepts_namespaced_refs() {
        assert!(RefName::new("HEAD").is_ok());
        assert!(RefName::new("refs/heads/main").is_ok());
        assert!(RefName::new("refs/viewsync/snapshots/ws-1/snap-2").is_ok());
        assert_eq!(
            RefName::remote_branch("origin", "ws-1").unwrap().as_str(),
            "refs/remotes/origin/ws-1"
        );
    }

    #[test]
    fn ref_name_rejects_escapes() {
        for bad in [
            "",
            "main",
            "refs/",
            "refs/heads/../x",
            "refs/heads/a b",
            "refs/heads/x.lock",
            "refs/heads//x",
            "refs/heads/.hidden",
            "refs/heads/a:b",
            "refs/heads/x/",
        ] {
            assert!(RefName::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn mirror_refspec_is_forced() {
        let r = RefName::new("refs/viewsync/snapshots/a/b").unwrap();
        assert_eq!(
            r.mirror_refspec(),
            "+refs/viewsync/snapshots/a/b:refs/viewsync/snapshots/a/b"
        );
    }

    proptest! {
        #[test]
        fn branch_refs_from_simple_names_always_validate(name in "[A-Za-z0-9_][A-Za-z0-9_-]{0,40}") {
            let r = RefName::branch(&name).unwrap();
            prop_assert_eq!(r.as_str().strip_prefix("refs/heads/"), Some(name.as_str()));
        }
    }
}
