//! Tag database behavior against real refs and hand-written packed-refs.

use std::sync::Arc;

use crate::fixtures::{commit_files, init_repo, pool, roomy_limits};
use git2::Oid;
use treestatusd::request::FIELD_SEP;
use treestatusd::serve::handle_record;
use treestatusd::{RepoCache, TagDb, ThreadPool};

fn tag_db(repo: &git2::Repository) -> Arc<TagDb> {
    Arc::new(TagDb::new(repo.path().to_path_buf()))
}

fn lookup(db: &Arc<TagDb>, repo: &git2::Repository, pool: &ThreadPool, oid: Oid) -> String {
    db.tag_for_commit(repo, pool, oid).unwrap()
}

#[test]
fn lightweight_loose_tags_prefer_lexicographic_max() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("v1", &object, false).unwrap();
    repo.tag_lightweight("v2", &object, false).unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "v2");
}

#[test]
fn annotated_loose_tag_peels_to_commit() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let object = repo.find_object(oid, None).unwrap();
    repo.tag("release", &object, &crate::fixtures::sig(), "msg", false)
        .unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "release");
}

#[test]
fn nested_tag_names_are_found() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("release/1.0", &object, false).unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "release/1.0");
}

#[test]
fn unrelated_commit_has_no_tag() {
    let (_tmp, repo) = init_repo();
    let first = commit_files(&repo, &[("a.txt", "one")], "init");
    let object = repo.find_object(first, None).unwrap();
    repo.tag_lightweight("v1", &object, false).unwrap();
    let second = commit_files(&repo, &[("a.txt", "two")], "more");

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, second), "");
    assert_eq!(lookup(&db, &repo, &pool, first), "v1");
}

#[test]
fn fully_peeled_pack_answers_without_loose_refs() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let tag_obj = "ab".repeat(20);

    let pack = format!(
        "# pack-refs with: peeled fully-peeled sorted\n\
{tag_obj} refs/tags/v1\n\
^{oid}\n\
{tag_obj} refs/tags/v2\n\
^{oid}\n"
    );
    std::fs::write(repo.path().join("packed-refs"), pack).unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "v2");
    // Idempotent with no filesystem change.
    assert_eq!(lookup(&db, &repo, &pool, oid), "v2");
}

#[test]
fn pack_rewrite_is_picked_up() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let tag_obj = "cd".repeat(20);
    let pack_path = repo.path().join("packed-refs");

    std::fs::write(
        &pack_path,
        format!("# pack-refs with: peeled fully-peeled sorted\n{tag_obj} refs/tags/v1\n^{oid}\n"),
    )
    .unwrap();
    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "v1");

    std::fs::write(
        &pack_path,
        format!(
            "# pack-refs with: peeled fully-peeled sorted\n\
{tag_obj} refs/tags/v1-renamed\n^{oid}\n"
        ),
    )
    .unwrap();
    assert_eq!(lookup(&db, &repo, &pool, oid), "v1-renamed");
}

#[test]
fn unpeeled_pack_resolves_through_the_library() {
    let (_tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");

    // Lightweight tags packed without peel metadata.
    std::fs::write(
        repo.path().join("packed-refs"),
        format!("# pack-refs with: peeled\n{oid} refs/tags/old\n{oid} refs/tags/young\n"),
    )
    .unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, oid), "young");
}

#[test]
fn loose_tag_shadows_packed_tag() {
    let (_tmp, repo) = init_repo();
    let first = commit_files(&repo, &[("a.txt", "one")], "init");
    let second = commit_files(&repo, &[("a.txt", "two")], "more");

    // Packed: v9 points at the first commit. Loose: v9 moved to the second.
    std::fs::write(
        repo.path().join("packed-refs"),
        format!("# pack-refs with: peeled fully-peeled sorted\n{first} refs/tags/v9\n"),
    )
    .unwrap();
    let object = repo.find_object(second, None).unwrap();
    repo.tag_lightweight("v9", &object, false).unwrap();

    let pool = pool(2);
    let db = tag_db(&repo);
    assert_eq!(lookup(&db, &repo, &pool, second), "v9");
    // The stale packed entry must not re-report v9 for the old commit.
    assert_eq!(lookup(&db, &repo, &pool, first), "");
}

#[test]
fn tag_appears_in_wire_response() {
    let (tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("v1", &object, false).unwrap();
    repo.tag_lightweight("v2", &object, false).unwrap();

    let mut cache = RepoCache::new(pool(2));
    let mut record = b"t".to_vec();
    record.push(FIELD_SEP);
    record.extend_from_slice(tmp.path().as_os_str().as_encoded_bytes());
    let response = handle_record(&mut cache, &roomy_limits(), &record).unwrap();
    let fields: Vec<&[u8]> = response[..response.len() - 1]
        .split(|&b| b == FIELD_SEP)
        .collect();
    assert_eq!(fields[17], b"v2");
}
