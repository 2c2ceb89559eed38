//! Record persistence.
//!
//! The engine treats persistence as a plain keyed store: no transaction ever
//! spans a filesystem operation. Consistency comes from ordering instead; a
//! record is written only after the repository change it describes has
//! succeeded.
//!
//! Two backends implement [`Table`]: [`MemoryTable`] for tests and embedding,
//! and [`JsonTable`], one pretty-printed JSON file per record, used by the
//! CLI so state survives between invocations.

mod json;
mod memory;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use json::JsonTable;
pub use memory::MemoryTable;

use crate::model::{Change, Codebase, RecordId, Snapshot, View, Workspace};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A persisted record addressed by a typed identifier.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: RecordId;

    /// Table name, also used in not-found errors.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;
}

macro_rules! impl_record {
    ($ty:ty, $id:ty, $kind:literal) => {
        impl Record for $ty {
            type Id = $id;
            const KIND: &'static str = $kind;
            fn id(&self) -> &Self::Id {
                &self.id
            }
        }
    };
}

impl_record!(Codebase, crate::model::CodebaseId, "codebase");
impl_record!(View, crate::model::ViewId, "view");
impl_record!(Workspace, crate::model::WorkspaceId, "workspace");
impl_record!(Snapshot, crate::model::SnapshotId, "snapshot");
impl_record!(Change, crate::model::ChangeId, "change");

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id:?} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id:?} already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn not_found<R: Record>(id: &R::Id) -> Self {
        Self::NotFound {
            kind: R::KIND,
            id: id.as_str().to_owned(),
        }
    }

    pub(crate) fn already_exists<R: Record>(id: &R::Id) -> Self {
        Self::AlreadyExists {
            kind: R::KIND,
            id: id.as_str().to_owned(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Keyed create/get/update/remove over one record type.
pub trait Table<R: Record>: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, record: &R) -> Result<(), StoreError>;

    /// Look a record up, `None` if absent.
    fn find(&self, id: &R::Id) -> Result<Option<R>, StoreError>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    fn update(&self, record: &R) -> Result<(), StoreError>;

    /// Delete a record. No-op if absent.
    fn remove(&self, id: &R::Id) -> Result<(), StoreError>;

    /// Every record, ordered by id.
    fn list(&self) -> Result<Vec<R>, StoreError>;

    /// Like [`find`](Self::find) but absence is `NotFound`.
    fn get(&self, id: &R::Id) -> Result<R, StoreError> {
        self.find(id)?.ok_or_else(|| StoreError::not_found::<R>(id))
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// One table per record type.
#[derive(Clone)]
pub struct Stores {
    pub codebases: Arc<dyn Table<Codebase>>,
    pub views: Arc<dyn Table<View>>,
    pub workspaces: Arc<dyn Table<Workspace>>,
    pub snapshots: Arc<dyn Table<Snapshot>>,
    pub changes: Arc<dyn Table<Change>>,
}

impl Stores {
    /// Volatile tables.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            codebases: Arc::new(MemoryTable::new()),
            views: Arc::new(MemoryTable::new()),
            workspaces: Arc::new(MemoryTable::new()),
            snapshots: Arc::new(MemoryTable::new()),
            changes: Arc::new(MemoryTable::new()),
        }
    }

    /// JSON tables under `dir/<kind>/`.
    #[must_use]
    pub fn json_dir(dir: &Path) -> Self {
        Self {
            codebases: Arc::new(JsonTable::new(dir)),
            views: Arc::new(JsonTable::new(dir)),
            workspaces: Arc::new(JsonTable::new(dir)),
            snapshots: Arc::new(JsonTable::new(dir)),
            changes: Arc::new(JsonTable::new(dir)),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Behaviour every backend must share.
#[cfg(test)]
pub(crate) mod conformance {
    use chrono::Utc;

    use super::*;
    use crate::model::{CodebaseId, UserId, ViewId, WorkspaceId};

    fn view(id: &str, workspace: Option<&str>) -> View {
        View {
            id: ViewId::new(id).unwrap(),
            user_id: UserId::new("u").unwrap(),
            codebase_id: CodebaseId::new("cb").unwrap(),
            workspace_id: workspace.map(|w| WorkspaceId::new(w).unwrap()),
            name: None,
            mount_path: None,
            mount_hostname: None,
            created_at: Utc::now(),
        }
    }

    pub fn check(table: &dyn Table<View>) {
        let v1 = view("v1", None);
        table.insert(&v1).unwrap();
        assert!(matches!(
            table.insert(&v1),
            Err(StoreError::AlreadyExists { kind: "view", .. })
        ));
        assert_eq!(table.get(&v1.id).unwrap(), v1);

        let mut bound = v1.clone();
        bound.workspace_id = Some(WorkspaceId::new("ws").unwrap());
        table.update(&bound).unwrap();
        assert_eq!(table.get(&v1.id).unwrap(), bound);

        let missing = view("v0", None);
        assert!(matches!(
            table.update(&missing),
            Err(StoreError::NotFound { kind: "view", .. })
        ));
        assert!(table.find(&missing.id).unwrap().is_none());

        table.insert(&view("v2", Some("ws2"))).unwrap();
        let ids: Vec<_> = table
            .list()
            .unwrap()
            .into_iter()
            .map(|v| v.id.to_string())
            .collect();
        assert_eq!(ids, vec!["v1", "v2"]);

        table.remove(&v1.id).unwrap();
        table.remove(&v1.id).unwrap();
        assert!(matches!(
            table.get(&v1.id),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(table.list().unwrap().len(), 1);
    }
}
