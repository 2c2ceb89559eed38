//! Validated identifiers.
//!
//! Every identifier ends up as a path component (`<base>/<codebase>/<view>`)
//! or a ref-name component (`refs/heads/<workspace>`), so all of them share
//! one conservative alphabet: ASCII alphanumerics, `-` and `_`, at most
//! [`MAX_ID_LEN`] characters, never starting with `-`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper bound on identifier length.
pub const MAX_ID_LEN: usize = 128;

/// View id reserved for the trunk directory under a codebase.
pub const RESERVED_VIEW_ID: &str = "trunk";

// ---------------------------------------------------------------------------
// IdKind / ValidationError
// ---------------------------------------------------------------------------

/// Which identifier failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdKind {
    Codebase,
    View,
    Workspace,
    Snapshot,
    Change,
    User,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Codebase => "codebase id",
            Self::View => "view id",
            Self::Workspace => "workspace id",
            Self::Snapshot => "snapshot id",
            Self::Change => "change id",
            Self::User => "user id",
        };
        f.write_str(s)
    }
}

/// A malformed identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: IdKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}: {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

fn validate(kind: IdKind, s: &str) -> Result<(), ValidationError> {
    let fail = |reason: String| ValidationError {
        kind,
        value: s.to_owned(),
        reason,
    };
    if s.is_empty() {
        return Err(fail("must not be empty".to_owned()));
    }
    if s.len() > MAX_ID_LEN {
        return Err(fail(format!(
            "must be at most {MAX_ID_LEN} characters, got {}",
            s.len()
        )));
    }
    if s.starts_with('-') {
        return Err(fail("must not start with a hyphen".to_owned()));
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(fail(format!(
            "invalid character {c:?} (allowed: A-Z, a-z, 0-9, '-', '_')"
        )));
    }
    if kind == IdKind::View && s == RESERVED_VIEW_ID {
        return Err(fail(format!("{RESERVED_VIEW_ID:?} is reserved")));
    }
    Ok(())
}

/// Common surface of every identifier newtype.
pub trait RecordId:
    Clone + Eq + std::hash::Hash + fmt::Display + fmt::Debug + Send + Sync + 'static
{
    /// The identifier as a string slice.
    fn as_str(&self) -> &str;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap `s`.
            ///
            /// # Errors
            /// Returns [`ValidationError`] if `s` is not a well-formed identifier.
            pub fn new(s: &str) -> Result<Self, ValidationError> {
                validate($kind, s)?;
                Ok(Self(s.to_owned()))
            }

            /// A fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl RecordId for $name {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                validate($kind, &s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifies a codebase and names its directory under the repository root.
    CodebaseId,
    IdKind::Codebase
);
define_id!(
    /// Identifies a view; never equal to `"trunk"`.
    ViewId,
    IdKind::View
);
define_id!(
    /// Identifies a workspace and doubles as its branch name.
    WorkspaceId,
    IdKind::Workspace
);
define_id!(SnapshotId, IdKind::Snapshot);
define_id!(ChangeId, IdKind::Change);
define_id!(UserId, IdKind::User);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_typical_ids() {
        for s in ["a", "ws-1", "My_View", "0", "deadbeef-1234"] {
            assert!(WorkspaceId::new(s).is_ok(), "{s}");
        }
    }

    #[test]
    fn rejects_empty() {
        let err = CodebaseId::new("").unwrap_err();
        assert_eq!(err.kind, IdKind::Codebase);
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert!(ViewId::new("-x").is_err());
        assert!(ViewId::new("x-").is_ok());
    }

    #[test]
    fn rejects_path_and_ref_metacharacters() {
        for s in ["a/b", "..", "a.b", "a b", "a~1", "a:b", "a\\b", "ä"] {
            assert!(WorkspaceId::new(s).is_err(), "{s}");
        }
    }

    #[test]
    fn rejects_too_long() {
        let ok = "a".repeat(MAX_ID_LEN);
        assert!(SnapshotId::new(&ok).is_ok());
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(SnapshotId::new(&long).is_err());
    }

    #[test]
    fn trunk_is_reserved_only_for_views() {
        assert!(ViewId::new("trunk").is_err());
        assert!(WorkspaceId::new("trunk").is_ok());
        assert!(ViewId::new("trunk2").is_ok());
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = ViewId::generate();
        let b = ViewId::generate();
        assert_ne!(a, b);
        assert!(ViewId::new(a.as_str()).is_ok());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let id: WorkspaceId = serde_json::from_str("\"ws-1\"").unwrap();
        assert_eq!(id.as_str(), "ws-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ws-1\"");
        assert!(serde_json::from_str::<WorkspaceId>("\"a/b\"").is_err());
    }

    #[test]
    fn error_display_names_kind() {
        let err = ViewId::new("trunk").unwrap_err();
        assert!(err.to_string().starts_with("invalid view id"));
    }

    proptest! {
        #[test]
        fn valid_ids_round_trip_through_display(s in "[A-Za-z0-9_][A-Za-z0-9_-]{0,60}") {
            prop_assume!(s != RESERVED_VIEW_ID);
            let id = ViewId::new(&s).unwrap();
            prop_assert_eq!(id.to_string(), s);
        }

        #[test]
        fn anything_with_a_slash_is_rejected(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let joined = format!("{a}/{b}");
            prop_assert!(CodebaseId::new(&joined).is_err());
        }
    }
}
