//! Data model: validated identifiers and the records the engine persists.

pub mod ids;
pub mod records;

pub use ids::{
    ChangeId, CodebaseId, IdKind, RecordId, SnapshotId, UserId, ValidationError, ViewId,
    WorkspaceId,
};
pub use records::{Change, Codebase, Snapshot, View, Workspace};
