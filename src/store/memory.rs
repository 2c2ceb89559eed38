use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Record, StoreError, Table};
use crate::model::RecordId;

/// In-process table.
pub struct MemoryTable<R: Record> {
    rows: RwLock<HashMap<R::Id, R>>,
}

impl<R: Record> MemoryTable<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: Record> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Table<R> for MemoryTable<R> {
    fn insert(&self, record: &R) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if rows.contains_key(record.id()) {
            return Err(StoreError::already_exists::<R>(record.id()));
        }
        rows.insert(record.id().clone(), record.clone());
        Ok(())
    }

    fn find(&self, id: &R::Id) -> Result<Option<R>, StoreError> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn update(&self, record: &R) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        match rows.get_mut(record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::not_found::<R>(record.id())),
        }
    }

    fn remove(&self, id: &R::Id) -> Result<(), StoreError> {
        self.rows.write().remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<R>, StoreError> {
        let mut all: Vec<R> = self.rows.read().values().cloned().collect();
        all.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::View;

    #[test]
    fn conforms() {
        super::super::conformance::check(&MemoryTable::<View>::new());
    }
}
