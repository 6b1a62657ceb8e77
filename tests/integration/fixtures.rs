//! Shared git fixtures built with the git library.

use std::path::Path;
use std::sync::Arc;

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;
use treestatusd::{Limits, Repo, ThreadPool};

pub fn sig() -> Signature<'static> {
    Signature::now("tester", "tester@example.com").unwrap()
}

/// Fresh repository with no commits.
pub fn init_repo() -> (TempDir, Repository) {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::init(tmp.path()).unwrap();
    (tmp, repo)
}

/// Writes `files` into the worktree, stages them, and commits.
pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (rel, content) in files {
        let abs = workdir.join(rel);
        std::fs::create_dir_all(abs.parent().unwrap()).unwrap();
        std::fs::write(&abs, content).unwrap();
        index.add_path(Path::new(rel)).unwrap();
    }
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let parent = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig(), &sig(), message, &tree, &parents)
        .unwrap()
}

pub fn pool(threads: usize) -> Arc<ThreadPool> {
    Arc::new(ThreadPool::new(threads))
}

/// Engine wrapper around an existing repository path.
pub fn engine(path: &Path, threads: usize) -> Repo {
    let opened = treestatusd::git::open_repo(path, false).unwrap().unwrap();
    Repo::new(opened, pool(threads)).unwrap()
}

/// Caps high enough that nothing short-circuits.
pub fn roomy_limits() -> Limits {
    Limits {
        max_staged: 1000,
        max_unstaged: 1000,
        max_conflicted: 1000,
        max_untracked: 1000,
        ..Limits::default()
    }
}

/// HEAD commit id, if any.
pub fn head_oid(repo: &Repository) -> Option<Oid> {
    repo.head().ok().and_then(|h| h.target())
}
