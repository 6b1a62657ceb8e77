//! End-to-end scan scenarios against real repositories.

use crate::fixtures::{commit_files, engine, head_oid, init_repo, roomy_limits, sig};
use treestatusd::Limits;

#[test]
fn clean_repo_reports_nothing_dirty() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "hello")], "init");
    let mut eng = engine(tmp.path(), 2);

    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.index_size, 1);
    assert_eq!(stats.num_staged, 0);
    assert_eq!(stats.num_unstaged, 0);
    assert_eq!(stats.num_conflicted, 0);
    assert_eq!(stats.num_untracked, 0);
    assert_eq!(stats.num_unstaged_deleted, 0);
}

#[test]
fn modified_file_is_unstaged() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "hello")], "init");
    std::fs::write(tmp.path().join("a.txt"), "hello, changed length").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_unstaged, 1);
    assert_eq!(stats.num_unstaged_deleted, 0);
    assert_eq!(stats.num_staged, 0);
}

#[test]
fn touched_but_identical_file_is_clean() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "hello")], "init");
    // Same bytes, fresh mtime: the stat mismatch must be settled by a
    // content compare, not reported blindly.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_unstaged, 0);
}

#[test]
fn deleted_file_counts_as_unstaged_deletion() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "hello"), ("b.txt", "world")], "init");
    std::fs::remove_file(tmp.path().join("a.txt")).unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_unstaged, 1);
    assert_eq!(stats.num_unstaged_deleted, 1);
}

#[test]
fn untracked_file_and_staged_change() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");

    // Stage a modification without committing.
    std::fs::write(tmp.path().join("a.txt"), "two with different size").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    index.write().unwrap();
    // And drop a new file next to it.
    std::fs::write(tmp.path().join("new.txt"), "fresh").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_staged, 1);
    assert_eq!(stats.num_unstaged, 0);
    assert_eq!(stats.num_untracked, 1);
}

#[test]
fn caps_clamp_reported_counts() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "x")], "init");
    for i in 0..5 {
        std::fs::write(tmp.path().join(format!("u{i}.txt")), "u").unwrap();
    }

    let limits = Limits {
        max_untracked: 2,
        max_unstaged: 1000,
        ..roomy_limits()
    };
    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &limits).unwrap();
    assert_eq!(stats.num_untracked, 2);
}

#[test]
fn unborn_head_counts_index_as_staged() {
    let (tmp, repo) = init_repo();
    std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
    std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
    std::fs::write(tmp.path().join("loose.txt"), "untracked").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    index.add_path(std::path::Path::new("b.txt")).unwrap();
    index.write().unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(None, &roomy_limits()).unwrap();
    assert_eq!(stats.num_staged, 2);
    // Without a commit there is nothing to diff the worktree against.
    assert_eq!(stats.num_unstaged, 0);
    assert_eq!(stats.num_untracked, 0);

    let capped = eng
        .index_stats(None, &Limits { max_staged: 1, ..roomy_limits() })
        .unwrap();
    assert_eq!(capped.num_staged, 1);
}

#[test]
fn dirty_state_config_toggle_zeroes_caps() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    repo.config()
        .unwrap()
        .set_bool("bash.showDirtyState", false)
        .unwrap();
    std::fs::write(tmp.path().join("a.txt"), "a longer replacement").unwrap();
    std::fs::write(tmp.path().join("new.txt"), "n").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_staged, 0);
    assert_eq!(stats.num_unstaged, 0);
    assert_eq!(stats.num_conflicted, 0);
    // Untracked reporting is a separate toggle.
    assert_eq!(stats.num_untracked, 1);

    // The command-line override wins over repo config.
    let limits = Limits {
        respect_bash_show_dirty: false,
        ..roomy_limits()
    };
    let stats = eng.index_stats(head_oid(&repo), &limits).unwrap();
    assert_eq!(stats.num_unstaged, 1);
}

#[test]
fn untracked_config_toggle_zeroes_cap() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    repo.config()
        .unwrap()
        .set_bool("status.showUntrackedFiles", false)
        .unwrap();
    std::fs::write(tmp.path().join("new.txt"), "n").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_untracked, 0);
}

#[test]
fn oversized_index_skips_workdir_scan() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    std::fs::write(tmp.path().join("a.txt"), "modified beyond doubt").unwrap();
    std::fs::write(tmp.path().join("new.txt"), "n").unwrap();

    let limits = Limits {
        dirty_max_index_size: 0,
        ..roomy_limits()
    };
    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &limits).unwrap();
    assert_eq!(stats.num_unstaged, 0);
    assert_eq!(stats.num_untracked, 0);
    assert_eq!(stats.index_size, 1);
}

#[test]
fn merge_conflict_is_counted_and_not_untracked() {
    let (tmp, repo) = init_repo();
    let base = commit_files(&repo, &[("shared.txt", "base\n")], "base");

    // A divergent commit on a side branch.
    let base_commit = repo.find_commit(base).unwrap();
    repo.branch("other", &base_commit, false).unwrap();
    {
        let mut index = repo.index().unwrap();
        std::fs::write(tmp.path().join("shared.txt"), "theirs\n").unwrap();
        index.add_path(std::path::Path::new("shared.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        repo.commit(
            Some("refs/heads/other"),
            &sig(),
            &sig(),
            "theirs",
            &tree,
            &[&base_commit],
        )
        .unwrap();
        // Restore the index and worktree to base for the ours commit.
        std::fs::write(tmp.path().join("shared.txt"), "ours\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("shared.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        repo.commit(Some("HEAD"), &sig(), &sig(), "ours", &tree, &[&base_commit])
            .unwrap();
    }

    let their_oid = repo
        .find_branch("other", git2::BranchType::Local)
        .unwrap()
        .get()
        .target()
        .unwrap();
    let their = repo.find_annotated_commit(their_oid).unwrap();
    repo.merge(&[&their], None, None).unwrap();
    assert!(repo.index().unwrap().has_conflicts());
    assert_eq!(treestatusd::git::action_name(repo.state()), "merge");

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_conflicted, 1);
    // The conflicted working file must not surface as untracked.
    assert_eq!(stats.num_untracked, 0);
}

#[test]
fn recurse_untracked_dirs_counts_files() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    std::fs::create_dir_all(tmp.path().join("pile/deep")).unwrap();
    std::fs::write(tmp.path().join("pile/x"), "1").unwrap();
    std::fs::write(tmp.path().join("pile/deep/y"), "2").unwrap();
    std::fs::write(tmp.path().join("pile/deep/z"), "3").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let flat = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(flat.num_untracked, 1);

    let limits = Limits {
        recurse_untracked_dirs: true,
        ..roomy_limits()
    };
    let deep = eng.index_stats(head_oid(&repo), &limits).unwrap();
    assert_eq!(deep.num_untracked, 3);
}

#[test]
fn gitignore_suppresses_untracked() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[(".gitignore", "*.log\ntarget/\n")], "init");
    std::fs::write(tmp.path().join("build.log"), "x").unwrap();
    std::fs::create_dir(tmp.path().join("target")).unwrap();
    std::fs::write(tmp.path().join("target/bin"), "x").unwrap();
    std::fs::write(tmp.path().join("note.txt"), "keep me").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let stats = eng.index_stats(head_oid(&repo), &roomy_limits()).unwrap();
    assert_eq!(stats.num_untracked, 1);
}

#[test]
fn repeated_scans_are_stable_across_thread_counts() {
    let (tmp, repo) = init_repo();
    let files: Vec<(String, String)> = (0..120)
        .map(|i| (format!("d{:02}/f{i}.txt", i % 12), format!("content {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    commit_files(&repo, &refs, "init");

    // Mixed dirt: two modifications, one deletion, two untracked files.
    std::fs::write(tmp.path().join("d00/f0.txt"), "rewritten longer").unwrap();
    std::fs::write(tmp.path().join("d01/f1.txt"), "also rewritten longer").unwrap();
    std::fs::remove_file(tmp.path().join("d02/f2.txt")).unwrap();
    std::fs::write(tmp.path().join("d00/loose1"), "u").unwrap();
    std::fs::write(tmp.path().join("loose2"), "u").unwrap();

    let head = head_oid(&repo);
    for threads in [2, 4, 8] {
        let mut eng = engine(tmp.path(), threads);
        for _ in 0..4 {
            let stats = eng.index_stats(head, &roomy_limits()).unwrap();
            assert_eq!(stats.num_unstaged, 3, "threads={threads}");
            assert_eq!(stats.num_unstaged_deleted, 1, "threads={threads}");
            assert_eq!(stats.num_untracked, 2, "threads={threads}");
            assert_eq!(stats.num_staged, 0, "threads={threads}");
        }
    }
}

#[test]
fn capped_scans_are_stable_under_short_circuit() {
    let (tmp, repo) = init_repo();
    let files: Vec<(String, String)> = (0..60)
        .map(|i| (format!("d{}/f{i}.txt", i % 6), format!("content {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    commit_files(&repo, &refs, "init");

    for i in 0..4 {
        std::fs::write(tmp.path().join(format!("d0/f{i}.txt")), "changed size!").unwrap();
        std::fs::write(tmp.path().join(format!("u{i}.txt")), "u").unwrap();
    }

    let head = head_oid(&repo);
    let limits = Limits::default(); // every cap is 1
    for threads in [2, 4, 8] {
        let mut eng = engine(tmp.path(), threads);
        for _ in 0..4 {
            let stats = eng.index_stats(head, &limits).unwrap();
            assert_eq!(stats.num_unstaged, 1, "threads={threads}");
            assert_eq!(stats.num_untracked, 1, "threads={threads}");
        }
    }
}

#[test]
fn second_scan_after_probe_settles_matches_first() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one"), ("d/b.txt", "two")], "init");
    std::fs::write(tmp.path().join("d/loose"), "u").unwrap();

    let mut eng = engine(tmp.path(), 2);
    let head = head_oid(&repo);
    let first = eng.index_stats(head, &roomy_limits()).unwrap();

    // Let the mtime probe finish so the second scan can use the untracked
    // cache fast path, then verify it reports the same picture.
    std::thread::sleep(std::time::Duration::from_millis(1500));
    let warm = eng.index_stats(head, &roomy_limits()).unwrap();
    assert_eq!(first, warm);

    // A change after the cache warmed must still be seen.
    std::fs::write(tmp.path().join("d/loose2"), "u").unwrap();
    let stats = eng.index_stats(head, &roomy_limits()).unwrap();
    assert_eq!(stats.num_untracked, 2);
}

#[test]
fn staged_results_follow_index_generations() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    let mut eng = engine(tmp.path(), 2);
    let head = head_oid(&repo);

    let clean = eng.index_stats(head, &roomy_limits()).unwrap();
    assert_eq!(clean.num_staged, 0);

    // Stage a change; the index file changed, so the cached staged result
    // must be dropped and recomputed.
    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(tmp.path().join("a.txt"), "two, longer than before").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    index.write().unwrap();

    let staged = eng.index_stats(head, &roomy_limits()).unwrap();
    assert_eq!(staged.num_staged, 1);
    // And again from the warm cache.
    let again = eng.index_stats(head, &roomy_limits()).unwrap();
    assert_eq!(again.num_staged, 1);
}

#[test]
fn upstream_ahead_behind_and_stashes() {
    let (tmp, mut repo) = init_repo();
    let first = commit_files(&repo, &[("a.txt", "one")], "init");

    // Local "upstream" branch pinned at the first commit.
    let first_commit = repo.find_commit(first).unwrap();
    repo.branch("up", &first_commit, false).unwrap();
    drop(first_commit);
    let branch = repo.head().unwrap().shorthand().unwrap().to_owned();
    let mut config = repo.config().unwrap();
    config
        .set_str(&format!("branch.{branch}.remote"), ".")
        .unwrap();
    config
        .set_str(&format!("branch.{branch}.merge"), "refs/heads/up")
        .unwrap();

    commit_files(&repo, &[("a.txt", "two")], "second");

    let info = treestatusd::git::head_info(&repo).unwrap();
    assert_eq!(info.branch, branch);
    let upstream =
        treestatusd::git::upstream_info(&repo, info.ref_name.as_deref().unwrap()).unwrap();
    assert_eq!(upstream.remote_branch, "up");
    let (ahead, behind) =
        treestatusd::git::ahead_behind(&repo, info.oid, upstream.oid).unwrap();
    assert_eq!((ahead, behind), (1, 0));

    // One stash entry.
    std::fs::write(tmp.path().join("a.txt"), "stash me, different size").unwrap();
    repo.stash_save(&sig(), "wip", None).unwrap();
    assert_eq!(treestatusd::git::stash_count(&mut repo).unwrap(), 1);
}
