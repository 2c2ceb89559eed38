//! Shared helpers for viewsync integration tests.
//!
//! Every test gets its own temp directory holding both the repositories and
//! the record store, so tests never touch each other or the real machine.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use viewsync::Engine;
use viewsync::config::Config;
use viewsync::events::{EventSink, RecordingSink};
use viewsync::model::{Codebase, CodebaseId, UserId, View};
use viewsync::store::Stores;
use viewsync_git::{GitOid, GitRepo, GixRepo, Identity};

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub engine: Engine,
    pub events: Arc<RecordingSink>,
}

impl Harness {
    /// Engine with in-memory records.
    pub fn new() -> Self {
        Self::build(|_| {}, false)
    }

    /// Engine with JSON-file records, after `tweak` adjusted the config.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, true)
    }

    fn build(tweak: impl FnOnce(&mut Config), json: bool) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let mut config = Config::rooted_at(dir.path());
        tweak(&mut config);
        let stores = if json {
            Stores::json_dir(&config.store.path)
        } else {
            Stores::in_memory()
        };
        let events = Arc::new(RecordingSink::new());
        let sink: Arc<dyn EventSink> = Arc::clone(&events) as Arc<dyn EventSink>;
        let engine = Engine::new(&config, stores, sink);
        Self {
            dir,
            config,
            engine,
            events,
        }
    }

    pub fn view_dir(&self, view: &View) -> PathBuf {
        self.engine.locator().view_path(&view.codebase_id, &view.id)
    }

    pub fn trunk_dir(&self, codebase: &CodebaseId) -> PathBuf {
        self.engine.locator().trunk_path(codebase)
    }

    pub fn write(&self, view: &View, rel: &str, contents: &str) {
        let path = self.view_dir(view).join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    pub fn read(&self, view: &View, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.view_dir(view).join(rel)).ok()
    }

    pub fn remove(&self, view: &View, rel: &str) {
        std::fs::remove_file(self.view_dir(view).join(rel)).unwrap();
    }

    pub fn trunk(&self, codebase: &CodebaseId) -> GixRepo {
        GixRepo::open(&self.trunk_dir(codebase), Identity::default()).unwrap()
    }

    pub fn view_repo(&self, view: &View) -> GixRepo {
        GixRepo::open(&self.view_dir(view), Identity::default()).unwrap()
    }

    /// Tip of `branch` on the codebase's trunk.
    pub fn trunk_tip(&self, codebase: &CodebaseId, branch: &str) -> GitOid {
        self.trunk(codebase)
            .rev_parse(&format!("refs/heads/{branch}"))
            .unwrap()
    }

    /// Commit `files` on top of the trunk's main branch through a throwaway
    /// clone, returning the new tip.
    pub fn seed_trunk(&self, codebase: &Codebase, files: &[(&str, &str)]) -> GitOid {
        let scratch = TempDir::new().unwrap();
        let work = scratch.path().join("seed");
        git(scratch.path(), &["clone", "--quiet", path_str(&self.trunk_dir(&codebase.id)), "seed"]);
        for (rel, contents) in files {
            let path = work.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, contents).unwrap();
        }
        git(&work, &["add", "--all"]);
        git(&work, &["commit", "--quiet", "-m", "seed"]);
        let branch = &self.config.repos.trunk_branch;
        git(&work, &["push", "--quiet", "origin", &format!("HEAD:refs/heads/{branch}")]);
        self.trunk_tip(&codebase.id, branch)
    }
}

pub fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

/// Run git with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_owned()
}
