//! Full request/response flow over the wire format.

use std::sync::Arc;

use crate::fixtures::{commit_files, init_repo};
use treestatusd::request::{FIELD_SEP, RECORD_SEP};
use treestatusd::serve::handle_record;
use treestatusd::{Limits, RepoCache, ThreadPool};

fn cache() -> RepoCache {
    RepoCache::new(Arc::new(ThreadPool::new(2)))
}

fn request(id: &str, dir: &std::path::Path) -> Vec<u8> {
    let mut record = id.as_bytes().to_vec();
    record.push(FIELD_SEP);
    record.extend_from_slice(dir.as_os_str().as_encoded_bytes());
    record
}

fn fields(response: &[u8]) -> Vec<Vec<u8>> {
    assert_eq!(*response.last().unwrap(), RECORD_SEP);
    response[..response.len() - 1]
        .split(|&b| b == FIELD_SEP)
        .map(|f| f.to_vec())
        .collect()
}

#[test]
fn empty_repo_full_record() {
    let (tmp, repo) = init_repo();
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut cache = cache();

    let response = handle_record(&mut cache, &Limits::default(), &request("r", tmp.path())).unwrap();
    let f = fields(&response);
    assert_eq!(f.len(), 20, "id + marker + 18 fields");
    assert_eq!(f[0], b"r");
    assert_eq!(f[1], b"1");
    // Workdir without trailing slash.
    let mut expected = workdir.as_os_str().as_encoded_bytes().to_vec();
    while expected.last() == Some(&b'/') {
        expected.pop();
    }
    assert_eq!(f[2], expected);
    // HEAD, branch, upstream, action: all empty for a fresh init.
    for field in &f[3..9] {
        assert!(field.is_empty(), "expected empty field, got {field:?}");
    }
    // All counters zero.
    for field in &f[9..17] {
        assert_eq!(field, b"0");
    }
    assert_eq!(f[17], b""); // tag
    assert_eq!(f[18], b"0"); // unstaged deletions
    assert_eq!(f[19], b""); // reserved
}

#[test]
fn committed_repo_reports_branch_and_head() {
    let (tmp, repo) = init_repo();
    let oid = commit_files(&repo, &[("a.txt", "one")], "init");
    let branch = repo.head().unwrap().shorthand().unwrap().to_owned();

    let mut cache = cache();
    let response = handle_record(&mut cache, &Limits::default(), &request("q", tmp.path())).unwrap();
    let f = fields(&response);
    assert_eq!(f[1], b"1");
    assert_eq!(f[3], oid.to_string().as_bytes());
    assert_eq!(f[4], branch.as_bytes());
    assert_eq!(f[9], b"1"); // index size
    assert_eq!(f[10], b"0"); // staged
}

#[test]
fn requests_are_served_from_subdirectories() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("src/lib.rs", "pub fn f() {}")], "init");
    let sub = tmp.path().join("src");

    let mut cache = cache();
    let response = handle_record(&mut cache, &Limits::default(), &request("s", &sub)).unwrap();
    let f = fields(&response);
    assert_eq!(f[1], b"1");
    assert_eq!(cache.len(), 1);

    // Another request for the root hits the same cache entry.
    handle_record(&mut cache, &Limits::default(), &request("s2", tmp.path())).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn from_dotgit_request_targets_git_dir() {
    let (tmp, repo) = init_repo();
    commit_files(&repo, &[("a.txt", "one")], "init");
    let gitdir = repo.path().to_path_buf();

    let mut record = b"g".to_vec();
    record.push(FIELD_SEP);
    record.extend_from_slice(gitdir.as_os_str().as_encoded_bytes());
    record.push(FIELD_SEP);
    record.push(b'1');

    let mut cache = cache();
    let response = handle_record(&mut cache, &Limits::default(), &record).unwrap();
    let f = fields(&response);
    assert_eq!(f[1], b"1");
}

#[test]
fn non_repo_gets_zero_record() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = cache();
    let response =
        handle_record(&mut cache, &Limits::default(), &request("nr", tmp.path())).unwrap();
    assert_eq!(fields(&response), vec![b"nr".to_vec(), b"0".to_vec()]);
}
