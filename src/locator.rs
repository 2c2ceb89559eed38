//! Maps codebase and view identifiers to repository directories.
//!
//! ```text
//! <base>/<codebase>/trunk     shared bare repository
//! <base>/<codebase>/<view>    one private working copy per view
//! ```
//!
//! Identifiers are validated when constructed, so these lookups cannot fail
//! and can never escape `<base>`.

use std::path::{Path, PathBuf};

use crate::model::ids::RESERVED_VIEW_ID;
use crate::model::{CodebaseId, ViewId};

#[derive(Clone, Debug)]
pub struct Locator {
    base: PathBuf,
}

impl Locator {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn codebase_dir(&self, codebase: &CodebaseId) -> PathBuf {
        self.base.join(codebase.as_str())
    }

    #[must_use]
    pub fn trunk_path(&self, codebase: &CodebaseId) -> PathBuf {
        self.codebase_dir(codebase).join(RESERVED_VIEW_ID)
    }

    #[must_use]
    pub fn view_path(&self, codebase: &CodebaseId, view: &ViewId) -> PathBuf {
        self.codebase_dir(codebase).join(view.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let loc = Locator::new("/srv/repos");
        let cb = CodebaseId::new("cb1").unwrap();
        let view = ViewId::new("v1").unwrap();
        assert_eq!(loc.trunk_path(&cb), PathBuf::from("/srv/repos/cb1/trunk"));
        assert_eq!(loc.view_path(&cb, &view), PathBuf::from("/srv/repos/cb1/v1"));
    }

    #[test]
    fn views_never_collide_with_trunk() {
        let loc = Locator::new("/r");
        let cb = CodebaseId::new("cb").unwrap();
        let view = ViewId::generate();
        assert_ne!(loc.view_path(&cb, &view), loc.trunk_path(&cb));
    }

    #[test]
    fn deterministic() {
        let loc = Locator::new("base");
        let cb = CodebaseId::new("cb").unwrap();
        let view = ViewId::new("v").unwrap();
        assert_eq!(loc.view_path(&cb, &view), loc.view_path(&cb, &view));
    }
}
