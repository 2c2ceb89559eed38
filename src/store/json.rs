use std::io::Write as _;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{Record, StoreError, Table};
use crate::model::RecordId;

/// One JSON file per record at `<root>/<kind>/<id>.json`.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a half-written record. A process-local
/// mutex makes the exists-check and the write of `insert`/`update` atomic
/// with respect to other callers sharing this table.
pub struct JsonTable<R: Record> {
    dir: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> JsonTable<R> {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(R::KIND),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    fn path(&self, id: &R::Id) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    fn read(&self, path: &Path) -> Result<Option<R>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                path: path.to_owned(),
                source,
            })
    }

    fn write(&self, record: &R) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let path = self.path(record.id());
        let mut body = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Serde {
            path: path.clone(),
            source,
        })?;
        body.push(b'\n');

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(&body)
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;
        Ok(())
    }
}

impl<R: Record> Table<R> for JsonTable<R> {
    fn insert(&self, record: &R) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if self.path(record.id()).exists() {
            return Err(StoreError::already_exists::<R>(record.id()));
        }
        self.write(record)
    }

    fn find(&self, id: &R::Id) -> Result<Option<R>, StoreError> {
        self.read(&self.path(id))
    }

    fn update(&self, record: &R) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if !self.path(record.id()).exists() {
            return Err(StoreError::not_found::<R>(record.id()));
        }
        self.write(record)
    }

    fn remove(&self, id: &R::Id) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let path = self.path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn list(&self) -> Result<Vec<R>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut all = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(record) = self.read(&path)? {
                all.push(record);
            }
        }
        all.sort_by(|a: &R, b: &R| a.id().as_str().cmp(b.id().as_str()));
        Ok(all)
    }
}
