//! Response formatting.
//!
//! A response echoes the request id, then either `0` (not a repository)
//! or `1` followed by exactly eighteen fields. String fields are clamped
//! to printable ASCII so the separators can never appear inside a field.

use std::path::Path;

use crate::request::{FIELD_SEP, RECORD_SEP};

/// Everything the daemon reports for one repository.
#[derive(Clone, Debug, Default)]
pub struct ResponseFields {
    /// Absolute workdir, no trailing `/`.
    pub workdir: Vec<u8>,
    /// HEAD commit hex, empty for unborn.
    pub head_hex: String,
    pub branch: String,
    pub remote_branch: String,
    pub remote_name: String,
    pub remote_url: String,
    /// In-progress repository action, empty when clean.
    pub action: &'static str,
    pub index_size: usize,
    pub num_staged: usize,
    pub num_unstaged: usize,
    pub num_conflicted: usize,
    pub num_untracked: usize,
    pub commits_ahead: usize,
    pub commits_behind: usize,
    pub num_stashes: usize,
    pub tag: String,
    pub num_unstaged_deleted: usize,
}

/// Replaces non-printable bytes so separators cannot leak into fields.
fn push_sanitized(out: &mut Vec<u8>, field: &[u8]) {
    out.extend(
        field
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { b } else { b'?' }),
    );
}

fn push_number(out: &mut Vec<u8>, n: usize) {
    out.extend_from_slice(n.to_string().as_bytes());
}

/// Formats a success record.
#[must_use]
pub fn format_ok(id: &[u8], f: &ResponseFields) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    push_sanitized(&mut out, id);
    out.push(FIELD_SEP);
    out.push(b'1');

    let strings: [&[u8]; 7] = [
        &f.workdir,
        f.head_hex.as_bytes(),
        f.branch.as_bytes(),
        f.remote_branch.as_bytes(),
        f.remote_name.as_bytes(),
        f.remote_url.as_bytes(),
        f.action.as_bytes(),
    ];
    for s in strings {
        out.push(FIELD_SEP);
        push_sanitized(&mut out, s);
    }
    for n in [
        f.index_size,
        f.num_staged,
        f.num_unstaged,
        f.num_conflicted,
        f.num_untracked,
        f.commits_ahead,
        f.commits_behind,
        f.num_stashes,
    ] {
        out.push(FIELD_SEP);
        push_number(&mut out, n);
    }
    out.push(FIELD_SEP);
    push_sanitized(&mut out, f.tag.as_bytes());
    out.push(FIELD_SEP);
    push_number(&mut out, f.num_unstaged_deleted);
    // Reserved extension field.
    out.push(FIELD_SEP);
    out.push(RECORD_SEP);
    out
}

/// Formats a "not a repository" record.
#[must_use]
pub fn format_not_repo(id: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(id.len() + 4);
    push_sanitized(&mut out, id);
    out.push(FIELD_SEP);
    out.push(b'0');
    out.push(RECORD_SEP);
    out
}

/// Workdir path as response bytes: absolute, no trailing slash.
#[must_use]
pub fn workdir_bytes(workdir: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    let mut bytes = workdir.as_os_str().as_bytes().to_vec();
    while bytes.len() > 1 && bytes.last() == Some(&b'/') {
        bytes.pop();
    }
    bytes
}
