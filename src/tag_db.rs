//! Tag database: answers "which tag points at this commit?".
//!
//! Two sources are merged on every lookup:
//!
//! - **loose tags**: regular files under `.git/refs/tags/`, resolved through
//!   the git library (bounded symbolic-ref and annotated-tag peeling);
//! - **packed tags**: `packed-refs`, memory-mapped and cached against the
//!   file's `(mtime, size, ino)` identity. Fully-peeled packs carry the
//!   final commit id on `^` continuation lines and support O(log n) lookup
//!   by commit; unpeeled packs fall back to per-ref resolution in reverse
//!   name order.
//!
//! After a reparse, the peeled table is sorted by commit id on a pool
//! worker; queries wait on the condition variable until the sort settles,
//! which hides the sort behind the diff scan running concurrently.
//!
//! Parsed records hold `(offset, len)` ranges into the mapped buffer, so a
//! cache generation owns exactly one allocation plus the map itself.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use git2::{Oid, Repository};
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::arena::PathArena;
use crate::dir_list::{self, EntryKind};
use crate::errors::ScanError;
use crate::fstat::{self, FileId};
use crate::git::ref_points_at;
use crate::thread_pool::ThreadPool;

const TAG_PREFIX: &[u8] = b"refs/tags/";
const OID_HEX_LEN: usize = 40;
const OID_RAW_LEN: usize = 20;

/// Retries when `packed-refs` keeps changing under us.
const MAX_READ_RETRIES: usize = 16;

/// One fully-peeled packed tag: short name range plus target commit.
#[derive(Clone, Copy, Debug)]
struct PeeledTag {
    name_off: u32,
    name_len: u32,
    oid: [u8; OID_RAW_LEN],
}

/// Short name range of a packed tag that still needs resolution.
#[derive(Clone, Copy, Debug)]
struct UnpeeledTag {
    name_off: u32,
    name_len: u32,
}

#[derive(Default)]
struct TagState {
    /// Mapped `packed-refs` contents; `None` when absent or empty.
    pack: Option<Mmap>,
    pack_id: Option<FileId>,
    fully_peeled: bool,
    /// Sorted by `oid` once `sorting` clears.
    peeled: Vec<PeeledTag>,
    /// Sorted by name (byte order).
    unpeeled: Vec<UnpeeledTag>,
    sorting: bool,
}

impl TagState {
    fn reset(&mut self) {
        self.pack = None;
        self.pack_id = None;
        self.fully_peeled = false;
        self.peeled.clear();
        self.unpeeled.clear();
    }

    fn name<'a>(&'a self, off: u32, len: u32) -> &'a [u8] {
        let buf: &[u8] = self.pack.as_ref().expect("pack buffer present");
        &buf[off as usize..(off + len) as usize]
    }
}

/// Packed and loose tag lookup with a statted cache.
pub struct TagDb {
    gitdir: PathBuf,
    state: Mutex<TagState>,
    cv: Condvar,
}

impl TagDb {
    #[must_use]
    pub fn new(gitdir: PathBuf) -> Self {
        Self {
            gitdir,
            state: Mutex::new(TagState::default()),
            cv: Condvar::new(),
        }
    }

    /// Returns the lexicographically largest tag pointing at `target`, or
    /// an empty string.
    pub fn tag_for_commit(
        self: &Arc<Self>,
        repo: &Repository,
        pool: &ThreadPool,
        target: Oid,
    ) -> Result<String, ScanError> {
        let mut loose = self.loose_tags();
        loose.sort_unstable();

        let mut best: Vec<u8> = Vec::new();
        for name in &loose {
            let full = full_ref_name(name);
            if ref_points_at(repo, &full, target) && name.as_slice() > best.as_slice() {
                best = name.clone();
            }
        }

        let packed = self.packed_matches(repo, pool, target, &loose)?;
        if let Some(name) = packed {
            if name > best {
                best = name;
            }
        }

        Ok(String::from_utf8_lossy(&best).into_owned())
    }

    /// Best packed-tag match not shadowed by a loose tag.
    fn packed_matches(
        self: &Arc<Self>,
        repo: &Repository,
        pool: &ThreadPool,
        target: Oid,
        loose: &[Vec<u8>],
    ) -> Result<Option<Vec<u8>>, ScanError> {
        let mut guard = self.wait_sorted();

        let pack_path = self.gitdir.join("packed-refs");
        let Some(current_id) = fstat::file_id(&pack_path)? else {
            guard.reset();
            return Ok(None);
        };

        if guard.pack_id != Some(current_id) {
            drop(guard);
            let (mmap, id) = read_pack(&pack_path)?;
            let mut fresh = TagState::default();
            let direct = match mmap {
                Some(mmap) => {
                    let matches = parse_pack(&mmap, target, &mut fresh).map_err(|e| {
                        // Leave the cache empty; the next request retries.
                        self.state.lock().expect("tag state poisoned").reset();
                        e
                    })?;
                    fresh.pack = Some(mmap);
                    matches
                }
                None => Vec::new(),
            };
            fresh.pack_id = Some(id);
            fresh.sorting = !fresh.peeled.is_empty();

            let mut guard = self.state.lock().expect("tag state poisoned");
            *guard = fresh;
            if guard.sorting {
                let db = Arc::clone(self);
                pool.schedule(move || db.sort_peeled());
            }
            debug!(
                peeled = guard.peeled.len(),
                unpeeled = guard.unpeeled.len(),
                "packed-refs reparsed"
            );
            drop(guard);

            return Ok(best_unshadowed(direct, loose));
        }

        if guard.fully_peeled {
            let raw = oid_raw(target);
            let lo = guard.peeled.partition_point(|t| t.oid < raw);
            let hi = guard.peeled.partition_point(|t| t.oid <= raw);
            let names: Vec<Vec<u8>> = guard.peeled[lo..hi]
                .iter()
                .map(|t| guard.name(t.name_off, t.name_len).to_vec())
                .collect();
            return Ok(best_unshadowed(names, loose));
        }

        // Unpeeled pack: resolve in reverse name order, first hit wins.
        for tag in guard.unpeeled.iter().rev() {
            let name = guard.name(tag.name_off, tag.name_len).to_vec();
            if loose.binary_search(&name).is_ok() {
                continue;
            }
            let full = full_ref_name(&name);
            if ref_points_at(repo, &full, target) {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn wait_sorted(&self) -> MutexGuard<'_, TagState> {
        let mut guard = self.state.lock().expect("tag state poisoned");
        while guard.sorting {
            guard = self.cv.wait(guard).expect("tag state poisoned");
        }
        guard
    }

    fn sort_peeled(&self) {
        let mut guard = self.state.lock().expect("tag state poisoned");
        assert!(guard.sorting, "sort task without sorting flag");
        let mut peeled = std::mem::take(&mut guard.peeled);
        drop(guard);

        peeled.sort_unstable_by(|a, b| a.oid.cmp(&b.oid));

        let mut guard = self.state.lock().expect("tag state poisoned");
        guard.peeled = peeled;
        guard.sorting = false;
        self.cv.notify_all();
    }

    /// Names of all loose tags, unsorted. Missing directories are fine.
    fn loose_tags(&self) -> Vec<Vec<u8>> {
        use std::os::unix::ffi::OsStrExt;
        let tags_dir = self.gitdir.join("refs/tags");
        let Ok(fd) = dir_list::open_dir(tags_dir.as_os_str().as_bytes()) else {
            return Vec::new();
        };
        let mut arena = PathArena::new();
        let mut out = Vec::new();
        collect_loose(fd, &mut Vec::new(), &mut arena, &mut out);
        out
    }
}

fn full_ref_name(short: &[u8]) -> String {
    let mut full = String::with_capacity(TAG_PREFIX.len() + short.len());
    full.push_str("refs/tags/");
    full.push_str(&String::from_utf8_lossy(short));
    full
}

fn best_unshadowed(mut names: Vec<Vec<u8>>, loose: &[Vec<u8>]) -> Option<Vec<u8>> {
    names.retain(|n| loose.binary_search(n).is_err());
    names.into_iter().max()
}

fn collect_loose(
    fd: std::os::fd::OwnedFd,
    prefix: &mut Vec<u8>,
    arena: &mut PathArena,
    out: &mut Vec<Vec<u8>>,
) {
    use std::os::fd::AsFd;
    let mut entries = Vec::new();
    if dir_list::list_dir(fd.as_fd(), crate::strcmp::PathOrder::Sensitive, arena, &mut entries)
        .is_err()
    {
        return;
    }
    for entry in entries {
        let name = arena.get(entry.name).to_vec();
        match entry.kind {
            EntryKind::Dir => {
                if let Ok(sub) = dir_list::open_dir_at(fd.as_fd(), &name) {
                    let base = prefix.len();
                    prefix.extend_from_slice(&name);
                    prefix.push(b'/');
                    collect_loose(sub, prefix, arena, out);
                    prefix.truncate(base);
                }
            }
            _ => {
                let mut full = Vec::with_capacity(prefix.len() + name.len());
                full.extend_from_slice(prefix);
                full.extend_from_slice(&name);
                out.push(full);
            }
        }
    }
}

/// Maps `packed-refs`, retrying while the file changes underneath.
fn read_pack(path: &std::path::Path) -> Result<(Option<Mmap>, FileId), ScanError> {
    for _ in 0..MAX_READ_RETRIES {
        let Some(before) = fstat::file_id(path)? else {
            return Err(ScanError::Io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )));
        };
        if before.size == 0 {
            return Ok((None, before));
        }
        let file = File::open(path)?;
        // SAFETY: the map is read-only; packed-refs is replaced by rename,
        // so a concurrent update leaves this inode's bytes intact. A change
        // in flight is caught by the re-stat below.
        let mmap = unsafe { Mmap::map(&file)? };
        let after = {
            use std::os::fd::AsFd;
            fstat::stat_fd(file.as_fd())?.id()
        };
        drop(file);
        if after == before {
            return Ok((Some(mmap), after));
        }
        warn!("packed-refs changed during read, retrying");
    }
    Err(ScanError::Io(std::io::Error::from(
        std::io::ErrorKind::Interrupted,
    )))
}

#[inline]
fn oid_raw(oid: Oid) -> [u8; OID_RAW_LEN] {
    let mut raw = [0u8; OID_RAW_LEN];
    raw.copy_from_slice(oid.as_bytes());
    raw
}

#[inline]
fn unhex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn parse_oid(hex: &[u8]) -> Option<[u8; OID_RAW_LEN]> {
    if hex.len() < OID_HEX_LEN {
        return None;
    }
    let mut oid = [0u8; OID_RAW_LEN];
    for (i, chunk) in hex[..OID_HEX_LEN].chunks_exact(2).enumerate() {
        oid[i] = unhex(chunk[0])? << 4 | unhex(chunk[1])?;
    }
    Some(oid)
}

/// Parses the mapped buffer into `state`, returning the short names of
/// fully-peeled tags that already match `target`.
fn parse_pack(
    buf: &[u8],
    target: Oid,
    state: &mut TagState,
) -> Result<Vec<Vec<u8>>, ScanError> {
    let target_raw = oid_raw(target);
    let mut matches = Vec::new();
    let mut line_no = 0usize;
    let mut pos = 0usize;

    // Header: "# pack-refs with: peeled fully-peeled sorted".
    if buf.first() == Some(&b'#') {
        line_no += 1;
        let eol = memchr::memchr(b'\n', buf).ok_or(ScanError::MalformedPackedRefs { line: 1 })?;
        state.fully_peeled = memchr::memmem::find(&buf[..eol], b" fully-peeled").is_some();
        pos = eol + 1;
    }

    while pos < buf.len() {
        line_no += 1;
        let eol = memchr::memchr(b'\n', &buf[pos..]).map_or(buf.len(), |i| pos + i);
        let line = trim_cr(&buf[pos..eol]);
        let next = eol + 1;

        if line.is_empty() {
            pos = next;
            continue;
        }
        let mut oid = parse_oid(line).ok_or(ScanError::MalformedPackedRefs { line: line_no })?;
        if line.get(OID_HEX_LEN) != Some(&b' ') {
            return Err(ScanError::MalformedPackedRefs { line: line_no });
        }
        let ref_start = pos + OID_HEX_LEN + 1;
        let ref_name = &line[OID_HEX_LEN + 1..];
        if ref_name.is_empty() {
            return Err(ScanError::MalformedPackedRefs { line: line_no });
        }

        pos = next;

        // Optional peel line for annotated tags.
        if pos < buf.len() && buf[pos] == b'^' {
            line_no += 1;
            let eol = memchr::memchr(b'\n', &buf[pos..]).map_or(buf.len(), |i| pos + i);
            let peel = trim_cr(&buf[pos + 1..eol]);
            oid = parse_oid(peel).ok_or(ScanError::MalformedPackedRefs { line: line_no })?;
            pos = eol + 1;
        }

        let Some(short) = ref_name.strip_prefix(TAG_PREFIX) else {
            continue;
        };
        let name_off = (ref_start + TAG_PREFIX.len()) as u32;
        let name_len = short.len() as u32;

        if state.fully_peeled {
            state.peeled.push(PeeledTag {
                name_off,
                name_len,
                oid,
            });
            if oid == target_raw {
                matches.push(short.to_vec());
            }
        } else {
            state.unpeeled.push(UnpeeledTag { name_off, name_len });
        }
    }

    // packed-refs is written in name order; keep the unpeeled table sorted
    // for the reverse-iteration fallback even if the writer did not.
    state
        .unpeeled
        .sort_unstable_by(|a, b| buf[a.name_off as usize..(a.name_off + a.name_len) as usize].cmp(
            &buf[b.name_off as usize..(b.name_off + b.name_len) as usize],
        ));

    Ok(matches)
}

#[inline]
fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
