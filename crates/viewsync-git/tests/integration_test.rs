use std::fs;
use std::path::Path;

use tempfile::TempDir;

use viewsync_git::{
    DestructiveGitRepo, FileStatus, GitError, GitOid, GitRepo, GixRepo, Identity, RefName,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn identity() -> Identity {
    Identity::new("Test User", "test@test.com")
}

/// A bare trunk on `main` plus one clone of it.
fn setup() -> (TempDir, GixRepo, GixRepo) {
    let dir = TempDir::new().unwrap();
    let trunk = GixRepo::init_bare(&dir.path().join("trunk"), "main", identity()).unwrap();
    let view = GixRepo::clone_from(&dir.path().join("trunk"), &dir.path().join("view"), identity())
        .unwrap();
    (dir, trunk, view)
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn workdir(repo: &GixRepo) -> &Path {
    repo.workdir().unwrap()
}

/// Commit the full working tree onto HEAD and advance the current branch.
fn commit_all(repo: &GixRepo, message: &str) -> GitOid {
    let tree = repo.write_worktree_tree().unwrap();
    let head = repo.rev_parse("HEAD").unwrap();
    let branch = RefName::branch(&repo.current_branch().unwrap().unwrap()).unwrap();
    let commit = repo
        .create_commit(tree, &[head], message, Some(&branch))
        .unwrap();
    repo.reset_index("HEAD").unwrap();
    commit
}

// ===========================================================================
// 1. Init and clone
// ===========================================================================

#[test]
fn init_bare_seeds_root_commit_on_initial_branch() {
    let (_dir, trunk, _view) = setup();
    assert!(trunk.workdir().is_none());
    let root = trunk.rev_parse("refs/heads/main").unwrap();
    let info = trunk.read_commit(root).unwrap();
    assert!(info.parents.is_empty());
    assert_eq!(info.message.trim(), "Root commit");
    assert_eq!(info.author, "Test User <test@test.com>");
}

#[test]
fn clone_checks_out_trunk_branch() {
    let (_dir, trunk, view) = setup();
    assert_eq!(view.current_branch().unwrap().as_deref(), Some("main"));
    assert_eq!(
        view.rev_parse("HEAD").unwrap(),
        trunk.rev_parse("refs/heads/main").unwrap()
    );
    assert!(!view.is_dirty().unwrap());
}

#[test]
fn open_missing_path_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = GixRepo::open(&dir.path().join("nope"), identity())
        .err()
        .unwrap();
    assert!(matches!(err, GitError::NotFound { .. }));
}

// ===========================================================================
// 2. Refs
// ===========================================================================

#[test]
fn write_read_list_delete_ref() {
    let (_dir, _trunk, view) = setup();
    let head = view.rev_parse("HEAD").unwrap();
    let name = RefName::new("refs/viewsync/snapshots/ws/one").unwrap();

    assert_eq!(view.read_ref(&name).unwrap(), None);
    view.write_ref(&name, head, "test").unwrap();
    assert_eq!(view.read_ref(&name).unwrap(), Some(head));

    let listed = view.list_refs("refs/viewsync/").unwrap();
    assert_eq!(listed, vec![(name.clone(), head)]);

    view.delete_ref(&name).unwrap();
    assert_eq!(view.read_ref(&name).unwrap(), None);
    // Deleting again is a no-op.
    view.delete_ref(&name).unwrap();
}

#[test]
fn create_branch_refuses_existing() {
    let (_dir, _trunk, view) = setup();
    let head = view.rev_parse("HEAD").unwrap();
    view.create_branch("feature", head).unwrap();
    assert_eq!(
        view.read_ref(&RefName::branch("feature").unwrap()).unwrap(),
        Some(head)
    );
    assert!(view.create_branch("feature", head).is_err());
}

#[test]
fn rev_parse_opt_unknown_is_none() {
    let (_dir, _trunk, view) = setup();
    assert!(view.rev_parse_opt("refs/heads/missing").unwrap().is_none());
    assert!(matches!(
        view.rev_parse("refs/heads/missing"),
        Err(GitError::NotFound { .. })
    ));
}

// ===========================================================================
// 3. Tree capture and commits
// ===========================================================================

#[test]
fn worktree_tree_includes_untracked_and_leaves_index_alone() {
    let (_dir, _trunk, view) = setup();
    let root = view.rev_parse("HEAD").unwrap();
    let root_tree = view.read_commit(root).unwrap().tree_oid;

    write(workdir(&view), "a.txt", "a\n");
    let tree = view.write_worktree_tree().unwrap();
    assert_ne!(tree, root_tree);

    // The live index never saw a.txt.
    let status = view.status().unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].path, "a.txt");
    assert_eq!(status[0].status, FileStatus::Untracked);
}

#[test]
fn worktree_tree_respects_gitignore() {
    let (_dir, _trunk, view) = setup();
    write(workdir(&view), ".gitignore", "target/\n");
    let before = view.write_worktree_tree().unwrap();
    write(workdir(&view), "target/out.bin", "junk");
    let after = view.write_worktree_tree().unwrap();
    assert_eq!(before, after);
}

#[test]
fn clean_worktree_tree_matches_head_tree() {
    let (_dir, _trunk, view) = setup();
    let head = view.rev_parse("HEAD").unwrap();
    let tree = view.write_worktree_tree().unwrap();
    assert_eq!(tree, view.read_commit(head).unwrap().tree_oid);
}

#[test]
fn create_commit_without_ref_moves_nothing() {
    let (_dir, _trunk, view) = setup();
    let head = view.rev_parse("HEAD").unwrap();
    write(workdir(&view), "x.txt", "x");
    let tree = view.write_worktree_tree().unwrap();

    let commit = view.create_commit(tree, &[head], "detached", None).unwrap();
    assert_eq!(view.rev_parse("HEAD").unwrap(), head);
    let info = view.read_commit(commit).unwrap();
    assert_eq!(info.parents, vec![head]);
    assert_eq!(info.tree_oid, tree);
    assert_eq!(info.message.trim(), "detached");
}

#[test]
fn log_and_ancestry() {
    let (_dir, _trunk, view) = setup();
    let root = view.rev_parse("HEAD").unwrap();
    write(workdir(&view), "one.txt", "1");
    let c1 = commit_all(&view, "one");
    write(workdir(&view), "two.txt", "2");
    let c2 = commit_all(&view, "two");

    assert_eq!(view.log(c2, 10).unwrap(), vec![c2, c1, root]);
    assert_eq!(view.log(c2, 1).unwrap(), vec![c2]);
    assert!(view.is_ancestor(root, c2).unwrap());
    assert!(view.is_ancestor(c2, c2).unwrap());
    assert!(!view.is_ancestor(c2, c1).unwrap());
}

// ===========================================================================
// 4. Destructive primitives
// ===========================================================================

#[test]
fn reset_and_clean_discard_everything_but_ignored() {
    let (_dir, _trunk, view) = setup();
    write(workdir(&view), ".gitignore", "*.log\n");
    commit_all(&view, "ignore logs");

    write(workdir(&view), "scratch.txt", "tmp");
    write(workdir(&view), "nested/deep.txt", "tmp");
    write(workdir(&view), "build.log", "keep");
    write(workdir(&view), ".gitignore", "changed\n");

    view.reset_hard("HEAD").unwrap();
    view.clean_untracked().unwrap();

    assert!(!view.is_dirty().unwrap());
    assert!(!workdir(&view).join("scratch.txt").exists());
    assert!(!workdir(&view).join("nested").exists());
    assert!(workdir(&view).join("build.log").exists());
    assert_eq!(
        fs::read_to_string(workdir(&view).join(".gitignore")).unwrap(),
        "*.log\n"
    );
}

#[test]
fn read_tree_reset_then_reset_index_restores_worktree_only() {
    let (_dir, _trunk, view) = setup();
    write(workdir(&view), "tracked.txt", "base\n");
    let base = commit_all(&view, "base");

    write(workdir(&view), "tracked.txt", "edited\n");
    write(workdir(&view), "new.txt", "new\n");
    let tree = view.write_worktree_tree().unwrap();
    let saved = view.create_commit(tree, &[base], "saved", None).unwrap();

    view.reset_hard("HEAD").unwrap();
    view.clean_untracked().unwrap();
    assert_eq!(
        fs::read_to_string(workdir(&view).join("tracked.txt")).unwrap(),
        "base\n"
    );

    view.read_tree_reset(saved).unwrap();
    view.reset_index("HEAD").unwrap();

    assert_eq!(
        fs::read_to_string(workdir(&view).join("tracked.txt")).unwrap(),
        "edited\n"
    );
    assert_eq!(
        fs::read_to_string(workdir(&view).join("new.txt")).unwrap(),
        "new\n"
    );
    assert_eq!(view.rev_parse("HEAD").unwrap(), base);
    // Index back at HEAD: the restored tree shows up as uncommitted work.
    let mut status: Vec<_> = view
        .status()
        .unwrap()
        .into_iter()
        .map(|e| (e.path, e.status))
        .collect();
    status.sort();
    assert_eq!(
        status,
        vec![
            ("new.txt".to_owned(), FileStatus::Untracked),
            ("tracked.txt".to_owned(), FileStatus::Modified),
        ]
    );
}

#[test]
fn checkout_refuses_to_clobber_local_edits() {
    let (_dir, _trunk, view) = setup();
    write(workdir(&view), "f.txt", "main\n");
    let base = commit_all(&view, "base");
    view.create_branch("other", base).unwrap();
    view.checkout_branch("other").unwrap();
    write(workdir(&view), "f.txt", "other\n");
    commit_all(&view, "other edit");
    view.checkout_branch("main").unwrap();

    write(workdir(&view), "f.txt", "uncommitted\n");
    assert!(view.checkout_branch("other").is_err());
    assert_eq!(
        fs::read_to_string(workdir(&view).join("f.txt")).unwrap(),
        "uncommitted\n"
    );
}

// ===========================================================================
// 5. Remotes
// ===========================================================================

#[test]
fn push_and_fetch_between_clones() {
    let (dir, trunk, view) = setup();
    let other =
        GixRepo::clone_from(&dir.path().join("trunk"), &dir.path().join("other"), identity())
            .unwrap();

    // A branch created on trunk is visible to a clone after fetch.
    let root = trunk.rev_parse("refs/heads/main").unwrap();
    trunk.create_branch("ws", root).unwrap();
    view.fetch("origin", &[]).unwrap();
    let remote = RefName::remote_branch("origin", "ws").unwrap();
    assert_eq!(view.read_ref(&remote).unwrap(), Some(root));
    view.checkout_branch_at("ws", &remote).unwrap();
    assert_eq!(view.current_branch().unwrap().as_deref(), Some("ws"));

    // A custom ref pushed from one clone can be fetched by another.
    write(workdir(&view), "w.txt", "work");
    let tree = view.write_worktree_tree().unwrap();
    let snap = RefName::new("refs/viewsync/snapshots/ws/s1").unwrap();
    let commit = view.create_commit(tree, &[root], "snap", Some(&snap)).unwrap();
    let spec = snap.mirror_refspec();
    view.push("origin", &[spec.as_str()]).unwrap();
    assert_eq!(trunk.read_ref(&snap).unwrap(), Some(commit));

    assert!(other.read_ref(&snap).unwrap().is_none());
    other.fetch("origin", &[spec.as_str()]).unwrap();
    assert_eq!(other.read_ref(&snap).unwrap(), Some(commit));
    assert_eq!(other.read_commit(commit).unwrap().tree_oid, tree);
}

#[test]
fn push_with_no_refspecs_is_noop() {
    let (_dir, _trunk, view) = setup();
    view.push("origin", &[]).unwrap();
}
