//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that the Git interface works correctly with actual git operations.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use review_follow::core::types::Oid;
use review_follow::git::{FileMode, Git, GitError, TreeEntry};

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "-b", "master"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Create a file and commit it, returning the new commit OID.
    fn commit_file(&self, path: &str, content: &str, message: &str) -> Oid {
        std::fs::write(self.dir.path().join(path), content).unwrap();
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
        Oid::new(self.head_oid_raw()).unwrap()
    }

    /// Get HEAD OID using git directly.
    fn head_oid_raw(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("git rev-parse failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

// =============================================================================
// Repository Opening Tests
// =============================================================================

#[test]
fn open_valid_repository() {
    let repo = TestRepo::new();
    let git = Git::open(repo.path());
    assert!(git.is_ok());
}

#[test]
fn open_missing_repository() {
    let dir = TempDir::new().unwrap();
    let result = Git::open(dir.path());
    assert!(matches!(result, Err(GitError::NotARepo { .. })));
}

// =============================================================================
// Ref Resolution Tests
// =============================================================================

#[test]
fn resolve_full_ref_name() {
    let repo = TestRepo::new();
    let git = repo.git();

    let oid = git.resolve_ref("refs/heads/master").unwrap();
    assert_eq!(oid.as_str(), repo.head_oid_raw());
}

#[test]
fn resolve_missing_ref_is_error() {
    let repo = TestRepo::new();
    let git = repo.git();

    let result = git.resolve_ref("refs/heads/nope");
    assert!(matches!(result, Err(GitError::RefNotFound { .. })));
    assert_eq!(git.try_resolve_ref("refs/heads/nope").unwrap(), None);
}

#[test]
fn resolve_short_names() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["tag", "v1.0"]);
    let git = repo.git();

    let by_branch = git.try_resolve_name("master").unwrap();
    let by_tag = git.try_resolve_name("v1.0").unwrap();
    let by_full = git.try_resolve_name("refs/heads/master").unwrap();

    assert!(by_branch.is_some());
    assert_eq!(by_branch, by_tag);
    assert_eq!(by_branch, by_full);
}

#[test]
fn resolve_full_object_id() {
    let repo = TestRepo::new();
    let git = repo.git();

    let head = repo.head_oid_raw();
    assert_eq!(
        git.try_resolve_name(&head).unwrap(),
        Some(Oid::new(head).unwrap())
    );
}

#[test]
fn resolve_garbage_name_is_none() {
    let repo = TestRepo::new();
    let git = repo.git();

    assert_eq!(git.try_resolve_name("not a ref..name").unwrap(), None);
}

#[test]
fn annotated_tag_peels_to_commit() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["tag", "-a", "v2.0", "-m", "release"]);
    let git = repo.git();

    let oid = git.resolve_ref("refs/tags/v2.0").unwrap();
    assert_eq!(oid.as_str(), repo.head_oid_raw());
}

#[test]
fn refs_pointing_at_finds_tags_and_branches() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["tag", "v1.0"]);
    run_git(repo.path(), &["branch", "copy"]);
    let git = repo.git();

    let head = Oid::new(repo.head_oid_raw()).unwrap();
    let names: Vec<String> = git
        .refs_pointing_at(&head)
        .unwrap()
        .into_iter()
        .map(|n| n.to_string())
        .collect();

    assert!(names.contains(&"refs/tags/v1.0".to_string()));
    assert!(names.contains(&"refs/heads/copy".to_string()));
    assert!(names.contains(&"refs/heads/master".to_string()));
}

// =============================================================================
// Commit Reading Tests
// =============================================================================

#[test]
fn commit_info_fields() {
    let repo = TestRepo::new();
    let second = repo.commit_file("file.txt", "content\n", "Second commit");
    let git = repo.git();

    let info = git.commit_info(&second).unwrap();
    assert_eq!(info.oid, second);
    assert_eq!(info.summary, "Second commit");
    assert_eq!(info.parents.len(), 1);
    assert_eq!(info.author_name, "Test User");
    assert_eq!(info.author_email, "test@example.com");
    assert!(info.message.starts_with("Second commit"));
}

#[test]
fn commit_info_root_has_no_parents() {
    let repo = TestRepo::new();
    let git = repo.git();

    let head = git.resolve_ref("refs/heads/master").unwrap();
    let info = git.commit_info(&head).unwrap();
    assert!(info.parents.is_empty());
}

// =============================================================================
// Tree Reading and Writing Tests
// =============================================================================

#[test]
fn blob_tree_roundtrip() {
    let repo = TestRepo::new();
    let git = repo.git();

    let blob = git.write_blob(b"hello\n").unwrap();
    let tree = git
        .write_tree(&[TreeEntry {
            name: "hello.txt".to_string(),
            mode: FileMode::Blob,
            oid: blob.clone(),
        }])
        .unwrap();

    let entries = git.tree_entries(&tree).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "hello.txt");
    assert_eq!(entries[0].mode, FileMode::Blob);
    assert_eq!(entries[0].oid, blob);
}

#[test]
fn identical_entries_give_identical_tree() {
    let repo = TestRepo::new();
    let git = repo.git();

    let blob = git.write_blob(b"same\n").unwrap();
    let entry = |name: &str| TreeEntry {
        name: name.to_string(),
        mode: FileMode::Blob,
        oid: blob.clone(),
    };

    // Order of supplied entries must not matter for the resulting id.
    let a = git.write_tree(&[entry("a"), entry("b")]).unwrap();
    let b = git.write_tree(&[entry("b"), entry("a")]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn nested_tree_entries() {
    let repo = TestRepo::new();
    std::fs::create_dir(repo.path().join("src")).unwrap();
    let head = repo.commit_file("src/lib.rs", "fn main() {}\n", "Add source");
    let git = repo.git();

    let info = git.commit_info(&head).unwrap();
    let entries = git.tree_entries(&info.tree).unwrap();
    let src = entries.iter().find(|e| e.name == "src").unwrap();
    assert_eq!(src.mode, FileMode::Tree);

    let inner = git.tree_entries(&src.oid).unwrap();
    assert_eq!(inner[0].name, "lib.rs");
}

// =============================================================================
// Commit Writing Tests
// =============================================================================

#[test]
fn write_commit_carries_author() {
    let repo = TestRepo::new();
    let git = repo.git();

    let head = git.resolve_ref("refs/heads/master").unwrap();
    let info = git.commit_info(&head).unwrap();

    let blob = git.write_blob(b"new\n").unwrap();
    let tree = git
        .write_tree(&[TreeEntry {
            name: "new.txt".to_string(),
            mode: FileMode::Blob,
            oid: blob,
        }])
        .unwrap();

    let commit = git
        .write_commit(&head, "Rewritten\n\nBody\n", &tree, &[head.clone()])
        .unwrap();

    let written = git.commit_info(&commit).unwrap();
    assert_eq!(written.author_name, info.author_name);
    assert_eq!(written.author_email, info.author_email);
    assert_eq!(written.tree, tree);
    assert_eq!(written.parents, vec![head]);
    assert_eq!(written.summary, "Rewritten");
}

// =============================================================================
// CAS Ref Update Tests
// =============================================================================

#[test]
fn cas_create_and_advance() {
    let repo = TestRepo::new();
    let first = Oid::new(repo.head_oid_raw()).unwrap();
    let second = repo.commit_file("f.txt", "x\n", "Second");
    let git = repo.git();

    // create: ref must not exist
    git.update_ref_cas("refs/changes/1/1", &first, None, "create")
        .unwrap();
    assert_eq!(
        git.resolve_ref("refs/changes/1/1").unwrap(),
        first
    );

    // attempting to create again fails
    let result = git.update_ref_cas("refs/changes/1/1", &second, None, "create again");
    assert!(matches!(result, Err(GitError::CasFailed { .. })));

    // advancing with the right expected value succeeds
    git.update_ref_cas("refs/changes/1/1", &second, Some(&first), "advance")
        .unwrap();
    assert_eq!(git.resolve_ref("refs/changes/1/1").unwrap(), second);
}

#[test]
fn cas_wrong_expected_fails() {
    let repo = TestRepo::new();
    let first = Oid::new(repo.head_oid_raw()).unwrap();
    let second = repo.commit_file("f.txt", "x\n", "Second");
    let git = repo.git();

    git.update_ref_cas("refs/changes/2/1", &first, None, "create")
        .unwrap();

    let result = git.update_ref_cas("refs/changes/2/1", &first, Some(&second), "stale");
    assert!(matches!(result, Err(GitError::CasFailed { .. })));
    // the ref is untouched
    assert_eq!(git.resolve_ref("refs/changes/2/1").unwrap(), first);
}
