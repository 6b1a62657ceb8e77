//! Indexed directory model over the parsed git index.
//!
//! The index is a flat, sorted list of tracked paths. This module folds it
//! into a forest of [`IndexDir`] nodes (one per directory containing at
//! least one tracked file) so that working-tree scans can propose a bounded
//! set of dirty *candidates* without walking the whole tree.
//!
//! Construction is a single linear pass with a directory stack; the forest
//! is stored as one vector in depth-first, root-first order plus integer
//! depths, so splits are contiguous vector ranges. Split boundaries are
//! weight-balanced so each pool task gets comparable work.
//!
//! Candidate generation never decides "dirty" on its own authority for
//! anything requiring content inspection: a stat mismatch that could be a
//! bare mtime bump is emitted as a content-check candidate and settled by
//! the diff driver. The only hard classifications made here are "file
//! missing" and "entry not in the index at all".

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::PathBuf;
use std::sync::Mutex;

use git2::Oid;
use tracing::debug;

use crate::arena::{PathArena, PathRef};
use crate::dir_list::{self, EntryKind};
use crate::errors::ScanError;
use crate::fstat::{self, FileId, FileKind, StatInfo};
use crate::strcmp::PathOrder;

/// Bytes reserved for internal use; never valid in an index path.
const SENTINEL_LO: u8 = 0x01;
const SENTINEL_HI: u8 = 0xFF;

/// Target weight per split for candidate-scan balancing.
const WEIGHT_PER_SPLIT: usize = 512;

/// Entries-per-split and splits-per-thread bounds, matching shard sizing.
const ENTRIES_PER_SPLIT: usize = 512;
const SPLITS_PER_THREAD: usize = 16;

const MODE_GITLINK: u32 = 0o160000;
const MODE_SYMLINK: u32 = 0o120000;

/// Immutable copy of one stage-0 index entry.
#[derive(Clone, Copy, Debug)]
pub struct EntrySnapshot {
    pub path: PathRef,
    pub oid: Oid,
    pub mode: u32,
    pub mtime_s: i32,
    pub mtime_ns: u32,
    pub ino: u32,
    pub gid: u32,
    pub size: u32,
    pub intent_to_add: bool,
}

impl EntrySnapshot {
    #[inline]
    #[must_use]
    pub fn is_gitlink(&self) -> bool {
        self.mode & 0o170000 == MODE_GITLINK
    }

    #[inline]
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.mode & 0o170000 == MODE_SYMLINK
    }

    #[inline]
    #[must_use]
    pub fn is_exec(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;
const EXTENDED_INTENT_TO_ADD: u16 = 0x2000;

/// Owned snapshot of the index taken once per on-disk index generation.
pub struct Snapshot {
    pub arena: PathArena,
    /// Stage-0 entries in index order.
    pub entries: Vec<EntrySnapshot>,
    /// Unique conflicted paths (any entry with stage > 0), index order.
    pub conflicted: Vec<PathRef>,
    /// Stage-0 entries carrying the intent-to-add flag.
    pub ita_count: usize,
    /// Raw entry count across all stages, as reported on the wire.
    pub total_entries: usize,
    pub order: PathOrder,
    /// mtime of the index file itself, for racy-entry detection.
    pub index_mtime_s: i64,
    /// Whether the executable bit participates in stat comparison.
    pub filemode: bool,
}

impl Snapshot {
    /// Copies the entry list out of the git library's index object.
    ///
    /// # Panics
    ///
    /// Panics if an entry path is absolute, contains a reserved byte, or
    /// the stage-0 list is not sorted under `order` (a corrupt index).
    pub fn capture(
        index: &git2::Index,
        order: PathOrder,
        index_mtime_s: i64,
        filemode: bool,
    ) -> Result<Self, ScanError> {
        let total_entries = index.len();
        let mut arena = PathArena::with_capacity(total_entries * 32);
        let mut entries = Vec::with_capacity(total_entries);
        let mut conflicted: Vec<PathRef> = Vec::new();
        let mut ita_count = 0usize;

        for entry in index.iter() {
            assert!(
                !entry.path.is_empty() && entry.path[0] != b'/',
                "index entry path must be relative"
            );
            assert!(
                !entry
                    .path
                    .iter()
                    .any(|&b| b == 0 || b == SENTINEL_LO || b == SENTINEL_HI),
                "index entry path contains a reserved byte"
            );
            let path = arena.intern(&entry.path)?;
            let stage = (entry.flags & STAGE_MASK) >> STAGE_SHIFT;
            if stage != 0 {
                let dup = conflicted
                    .last()
                    .is_some_and(|&last| arena.get(last) == arena.get(path));
                if !dup {
                    conflicted.push(path);
                }
                continue;
            }
            let intent_to_add = entry.flags_extended & EXTENDED_INTENT_TO_ADD != 0;
            if intent_to_add {
                ita_count += 1;
            }
            entries.push(EntrySnapshot {
                path,
                oid: entry.id,
                mode: entry.mode,
                mtime_s: entry.mtime.seconds(),
                mtime_ns: entry.mtime.nanoseconds(),
                ino: entry.ino,
                gid: entry.gid,
                size: entry.file_size,
                intent_to_add,
            });
        }

        assert!(
            order.is_sorted_by_key(&entries, |e| arena.get(e.path)),
            "index entries out of order"
        );
        let snapshot = Self {
            arena,
            entries,
            conflicted,
            ita_count,
            total_entries,
            order,
            index_mtime_s,
            filemode,
        };
        Ok(snapshot)
    }

    #[inline]
    #[must_use]
    pub fn path(&self, entry: &EntrySnapshot) -> &[u8] {
        self.arena.get(entry.path)
    }

    #[inline]
    #[must_use]
    pub fn path_at(&self, i: usize) -> &[u8] {
        self.arena.get(self.entries[i].path)
    }
}

/// Per-directory scratch, written only by the split worker that owns the
/// directory's range.
#[derive(Debug, Default)]
struct DirScratch {
    /// Directory identity at the last successful full listing.
    st: Option<FileId>,
    /// New-entry paths found by the last listing (trailing `/` for dirs).
    unmatched: Vec<Box<[u8]>>,
}

/// One directory that contains at least one tracked file.
pub struct IndexDir {
    /// Path up to and including the trailing `/`; empty for the root.
    pub path: PathRef,
    /// Final path segment without the trailing `/`.
    pub basename: PathRef,
    /// 0 for the root.
    pub depth: usize,
    /// Indices into `Snapshot::entries` for files directly in this dir.
    pub files: Vec<u32>,
    /// Basenames of immediate subdirectories, sorted under the active order.
    pub subdirs: Vec<PathRef>,
    scratch: Mutex<DirScratch>,
}

impl IndexDir {
    fn new(path: PathRef, basename: PathRef, depth: usize) -> Self {
        Self {
            path,
            basename,
            depth,
            files: Vec::new(),
            subdirs: Vec::new(),
            scratch: Mutex::new(DirScratch::default()),
        }
    }
}

/// What the diff driver must do to settle a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandKind {
    /// Tracked file absent from disk.
    Deleted,
    /// Tracked file present but suspicious; `definite` skips the content
    /// check (size/type/exec mismatch cannot be a bare mtime bump).
    Modified { entry: u32, definite: bool },
    /// On-disk entry with no index counterpart.
    New { dir: bool },
}

/// A path that might be unstaged or untracked.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub path: Box<[u8]>,
    pub kind: CandKind,
}

impl AsRef<[u8]> for Candidate {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

/// The directory forest plus split boundaries.
pub struct Index {
    snapshot: std::sync::Arc<Snapshot>,
    dirs: Vec<IndexDir>,
    /// Split boundaries into `dirs`; first is 0, last is `dirs.len()`.
    splits: Vec<usize>,
    root: PathBuf,
}

impl Index {
    /// Builds the forest and split table.
    pub fn new(
        root: PathBuf,
        snapshot: std::sync::Arc<Snapshot>,
        num_threads: usize,
    ) -> Result<Self, ScanError> {
        let dirs = build_dirs(&snapshot);
        let splits = compute_splits(&dirs, snapshot.entries.len(), num_threads);
        debug!(
            dirs = dirs.len(),
            splits = splits.len() - 1,
            "index model built"
        );
        Ok(Self {
            snapshot,
            dirs,
            splits,
            root,
        })
    }

    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[inline]
    #[must_use]
    pub fn num_splits(&self) -> usize {
        self.splits.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn dirs(&self) -> &[IndexDir] {
        &self.dirs
    }

    /// Scans one split's directories for dirty candidates.
    ///
    /// Runs on a pool worker; splits partition `dirs`, so per-directory
    /// scratch is written without contention. Listing and stat failures
    /// degrade to "everything here is a candidate" rather than erroring.
    pub fn scan_split(
        &self,
        split: usize,
        use_untracked_cache: bool,
    ) -> Result<Vec<Candidate>, ScanError> {
        let range = self.splits[split]..self.splits[split + 1];
        let mut out = Vec::new();
        let mut fds = FdStack::new(&self.root);
        let mut scratch_arena = PathArena::new();
        for dir in &self.dirs[range] {
            match fds.resolve(&self.snapshot, dir) {
                Some(fd) => scan_dir(
                    &self.snapshot,
                    dir,
                    fd,
                    use_untracked_cache,
                    &mut scratch_arena,
                    &mut out,
                )?,
                None => scan_unlisted(&self.snapshot, dir, &mut out),
            }
        }
        Ok(out)
    }
}

/// Builds the directory forest with a single stack pass.
fn build_dirs(snapshot: &Snapshot) -> Vec<IndexDir> {
    let order = snapshot.order;
    let mut dirs: Vec<IndexDir> = Vec::with_capacity(snapshot.entries.len() / 8 + 1);
    let mut stack: Vec<IndexDir> = Vec::with_capacity(16);
    stack.push(IndexDir::new(PathRef::EMPTY, PathRef::EMPTY, 0));

    for (i, entry) in snapshot.entries.iter().enumerate() {
        let path = snapshot.arena.get(entry.path);
        let (common_len, common_depth) = {
            let top = &stack[stack.len() - 1];
            common_dir(order, snapshot.arena.get(top.path), path)
        };
        debug_assert!(common_depth < stack.len());

        while stack.len() > common_depth + 1 {
            let done = stack.pop().expect("stack underflow");
            debug_assert!(order.is_sorted_by_key(&done.subdirs, |s| snapshot.arena.get(*s)));
            dirs.push(done);
        }

        // One new IndexDir per path component below the common prefix.
        let mut seg_start = common_len;
        for pos in common_len..path.len() {
            if path[pos] != b'/' {
                continue;
            }
            let dir_path = entry.path.prefix(pos + 1);
            let basename = entry.path.prefix(pos).suffix(seg_start);
            let depth = stack.len();
            let parent = stack.last_mut().expect("stack never empty");
            parent.subdirs.push(basename);
            stack.push(IndexDir::new(dir_path, basename, depth));
            seg_start = pos + 1;
        }

        let top = stack.last_mut().expect("stack never empty");
        debug_assert!(order.starts_with(path, snapshot.arena.get(top.path)));
        top.files.push(i as u32);
    }

    while let Some(done) = stack.pop() {
        dirs.push(done);
    }
    dirs.reverse();
    debug_assert_eq!(dirs[0].depth, 0);
    dirs
}

/// Longest common directory prefix of `a` and `b` under `order`.
///
/// Returns `(byte length including the trailing '/', directory depth)`.
fn common_dir(order: PathOrder, a: &[u8], b: &[u8]) -> (usize, usize) {
    let fold = matches!(order, PathOrder::Insensitive);
    let mut len = 0;
    let mut depth = 0;
    for i in 0..a.len().min(b.len()) {
        let (x, y) = (a[i], b[i]);
        let eq = if fold {
            x.eq_ignore_ascii_case(&y)
        } else {
            x == y
        };
        if !eq {
            break;
        }
        if x == b'/' {
            len = i + 1;
            depth += 1;
        }
    }
    (len, depth)
}

/// Weight-balanced split boundaries over the directory vector.
fn compute_splits(dirs: &[IndexDir], index_size: usize, num_threads: usize) -> Vec<usize> {
    let total_weight: usize = dirs
        .iter()
        .map(|d| 1 + d.files.len() + d.subdirs.len())
        .sum();
    let num_splits = (index_size / ENTRIES_PER_SPLIT + 1)
        .min(SPLITS_PER_THREAD * num_threads)
        .max(1);
    let split_weight = (total_weight / num_splits).max(WEIGHT_PER_SPLIT);

    let mut splits = Vec::with_capacity(num_splits + 1);
    splits.push(0);
    let mut acc = 0usize;
    for (i, dir) in dirs.iter().enumerate() {
        acc += 1 + dir.files.len() + dir.subdirs.len();
        if acc >= split_weight && i + 1 < dirs.len() {
            splits.push(i + 1);
            acc = 0;
        }
    }
    splits.push(dirs.len());
    splits
}

/// Ancestor descriptor stack; amortizes `openat` chains across siblings.
struct FdStack {
    root: PathBuf,
    root_fd: Option<Option<OwnedFd>>,
    stack: Vec<(PathRef, OwnedFd)>,
}

impl FdStack {
    fn new(root: &std::path::Path) -> Self {
        Self {
            root: root.to_path_buf(),
            root_fd: None,
            stack: Vec::new(),
        }
    }

    /// Finds or opens the descriptor for `dir`. `None` means unreachable.
    fn resolve(&mut self, snap: &Snapshot, dir: &IndexDir) -> Option<BorrowedFd<'_>> {
        let order = snap.order;
        let dir_path = snap.arena.get(dir.path);

        while let Some((top, _)) = self.stack.last() {
            if order.starts_with(dir_path, snap.arena.get(*top)) {
                break;
            }
            self.stack.pop();
        }

        if self.root_fd.is_none() {
            use std::os::unix::ffi::OsStrExt;
            self.root_fd = Some(dir_list::open_dir(self.root.as_os_str().as_bytes()).ok());
        }
        self.root_fd.as_ref().expect("just filled").as_ref()?;

        let mut covered = self.stack.last().map_or(0, |(p, _)| p.len());
        while covered < dir_path.len() {
            let next_slash = covered + dir_path[covered..].iter().position(|&b| b == b'/')?;
            let component = &dir_path[covered..next_slash];
            let parent = match self.stack.last() {
                Some((_, fd)) => fd.as_fd(),
                None => self
                    .root_fd
                    .as_ref()
                    .and_then(|o| o.as_ref())
                    .expect("root fd present")
                    .as_fd(),
            };
            let opened = dir_list::open_dir_at(parent, component).ok()?;
            self.stack.push((dir.path.prefix(next_slash + 1), opened));
            covered = next_slash + 1;
        }

        Some(match self.stack.last() {
            Some((_, fd)) => fd.as_fd(),
            None => self
                .root_fd
                .as_ref()
                .and_then(|o| o.as_ref())
                .expect("root fd present")
                .as_fd(),
        })
    }
}

fn scan_dir(
    snap: &Snapshot,
    dir: &IndexDir,
    fd: BorrowedFd<'_>,
    use_untracked_cache: bool,
    arena: &mut PathArena,
    out: &mut Vec<Candidate>,
) -> Result<(), ScanError> {
    let st = match fstat::stat_fd(fd) {
        Ok(st) => st,
        Err(_) => {
            scan_unlisted(snap, dir, out);
            return Ok(());
        }
    };

    let mut scratch = dir.scratch.lock().expect("dir scratch poisoned");
    if use_untracked_cache && scratch.st == Some(st.id()) {
        stat_sweep(snap, dir, fd, out);
        for prior in &scratch.unmatched {
            out.push(Candidate {
                path: prior.clone(),
                kind: CandKind::New {
                    dir: prior.ends_with(b"/"),
                },
            });
        }
        return Ok(());
    }

    arena.clear();
    let mut listing = Vec::new();
    if dir_list::list_dir(fd, snap.order, arena, &mut listing).is_err() {
        drop(scratch);
        scan_unlisted(snap, dir, out);
        return Ok(());
    }

    let mut unmatched = Vec::new();
    merge_listing(snap, dir, fd, arena, &listing, out, &mut unmatched);
    scratch.st = Some(st.id());
    scratch.unmatched = unmatched;
    Ok(())
}

/// Directory cannot be examined: every tracked file and every prior
/// unmatched path is a candidate.
fn scan_unlisted(snap: &Snapshot, dir: &IndexDir, out: &mut Vec<Candidate>) {
    for &fi in &dir.files {
        let entry = &snap.entries[fi as usize];
        if entry.is_gitlink() {
            continue;
        }
        out.push(Candidate {
            path: snap.path(entry).into(),
            kind: CandKind::Modified {
                entry: fi,
                definite: false,
            },
        });
    }
    let scratch = dir.scratch.lock().expect("dir scratch poisoned");
    for prior in &scratch.unmatched {
        out.push(Candidate {
            path: prior.clone(),
            kind: CandKind::New {
                dir: prior.ends_with(b"/"),
            },
        });
    }
}

/// Fast path: directory identity unchanged, so its entry set is intact and
/// only file metadata can have moved. Stat each tracked file in place.
fn stat_sweep(snap: &Snapshot, dir: &IndexDir, fd: BorrowedFd<'_>, out: &mut Vec<Candidate>) {
    let dir_path_len = dir.path.len();
    for &fi in &dir.files {
        let entry = &snap.entries[fi as usize];
        if entry.is_gitlink() {
            continue;
        }
        let basename = &snap.path(entry)[dir_path_len..];
        let kind = match fstat::stat_at(fd, basename) {
            Ok(st) => match compare_entry(snap, entry, &st) {
                StatVerdict::Clean => continue,
                StatVerdict::Definite => CandKind::Modified {
                    entry: fi,
                    definite: true,
                },
                StatVerdict::Content => CandKind::Modified {
                    entry: fi,
                    definite: false,
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CandKind::Deleted,
            Err(_) => CandKind::Modified {
                entry: fi,
                definite: false,
            },
        };
        out.push(Candidate {
            path: snap.path(entry).into(),
            kind,
        });
    }
}

/// Slow path: lockstep merge of tracked files, tracked subdirs, and the
/// sorted directory listing.
fn merge_listing(
    snap: &Snapshot,
    dir: &IndexDir,
    fd: BorrowedFd<'_>,
    arena: &PathArena,
    listing: &[dir_list::DirEntry],
    out: &mut Vec<Candidate>,
    unmatched: &mut Vec<Box<[u8]>>,
) {
    use std::cmp::Ordering;

    let order = snap.order;
    let dir_path = snap.arena.get(dir.path);

    let mut fi = 0usize;
    let mut si = 0usize;

    for disk in listing {
        let name = arena.get(disk.name);

        // Tracked files sorting before this name are gone from disk.
        while fi < dir.files.len() {
            let entry = &snap.entries[dir.files[fi] as usize];
            let base = &snap.path(entry)[dir_path.len()..];
            if order.cmp(base, name) != Ordering::Less {
                break;
            }
            if !entry.is_gitlink() {
                out.push(Candidate {
                    path: snap.path(entry).into(),
                    kind: CandKind::Deleted,
                });
            }
            fi += 1;
        }
        // A tracked subdir sorting before this name is missing from disk;
        // its own IndexDir fails to open and degrades to all-candidates.
        while si < dir.subdirs.len()
            && order.cmp(snap.arena.get(dir.subdirs[si]), name) == Ordering::Less
        {
            si += 1;
        }

        let file_match = fi < dir.files.len() && {
            let entry = &snap.entries[dir.files[fi] as usize];
            order.eq(&snap.path(entry)[dir_path.len()..], name)
        };
        if file_match {
            let idx = dir.files[fi];
            fi += 1;
            let entry = &snap.entries[idx as usize];
            if let Some(kind) = match_file(snap, entry, idx, fd, name, disk.kind) {
                out.push(Candidate {
                    path: snap.path(entry).into(),
                    kind,
                });
            }
            continue;
        }

        let subdir_match =
            si < dir.subdirs.len() && order.eq(snap.arena.get(dir.subdirs[si]), name);
        if subdir_match && entry_is_dir(fd, name, disk.kind) {
            // Recursed by that subdirectory's own IndexDir.
            si += 1;
            continue;
        }

        if name.eq_ignore_ascii_case(b".git") {
            continue;
        }

        // Unknown to the index: new entry.
        let is_dir = entry_is_dir(fd, name, disk.kind);
        let mut path = Vec::with_capacity(dir_path.len() + name.len() + 1);
        path.extend_from_slice(dir_path);
        path.extend_from_slice(name);
        if is_dir {
            path.push(b'/');
        }
        let path: Box<[u8]> = path.into();
        unmatched.push(path.clone());
        out.push(Candidate {
            path,
            kind: CandKind::New { dir: is_dir },
        });
    }

    // Tracked files past the end of the listing are gone.
    while fi < dir.files.len() {
        let entry = &snap.entries[dir.files[fi] as usize];
        if !entry.is_gitlink() {
            out.push(Candidate {
                path: snap.path(entry).into(),
                kind: CandKind::Deleted,
            });
        }
        fi += 1;
    }
}

/// Classifies a tracked file found on disk. `None` means clean.
fn match_file(
    snap: &Snapshot,
    entry: &EntrySnapshot,
    entry_idx: u32,
    fd: BorrowedFd<'_>,
    name: &[u8],
    disk_kind: EntryKind,
) -> Option<CandKind> {
    if entry.is_gitlink() {
        return None;
    }
    if disk_kind == EntryKind::Dir {
        return Some(CandKind::Modified {
            entry: entry_idx,
            definite: true,
        });
    }
    match fstat::stat_at(fd, name) {
        Ok(st) => match compare_entry(snap, entry, &st) {
            StatVerdict::Clean => None,
            StatVerdict::Definite => Some(CandKind::Modified {
                entry: entry_idx,
                definite: true,
            }),
            StatVerdict::Content => Some(CandKind::Modified {
                entry: entry_idx,
                definite: false,
            }),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(CandKind::Deleted),
        Err(_) => Some(CandKind::Modified {
            entry: entry_idx,
            definite: false,
        }),
    }
}

fn entry_is_dir(fd: BorrowedFd<'_>, name: &[u8], kind: EntryKind) -> bool {
    match kind {
        EntryKind::Dir => true,
        EntryKind::Unknown => fstat::stat_at(fd, name)
            .map(|st| st.kind == FileKind::Directory)
            .unwrap_or(false),
        _ => false,
    }
}

/// Outcome of comparing one index entry against its on-disk stat.
enum StatVerdict {
    Clean,
    /// Mismatch that cannot be explained by a bare mtime bump.
    Definite,
    /// Needs a content compare (mtime/ino/gid drift or racy entry).
    Content,
}

/// Compares an index entry against its on-disk stat.
fn compare_entry(snap: &Snapshot, entry: &EntrySnapshot, st: &StatInfo) -> StatVerdict {
    if entry.intent_to_add {
        // Not really tracked yet; the working file is unstaged by definition.
        return StatVerdict::Definite;
    }
    let kind_ok = match st.kind {
        FileKind::Regular => !entry.is_symlink(),
        FileKind::Symlink => entry.is_symlink(),
        FileKind::Directory | FileKind::Other => false,
    };
    if !kind_ok {
        return StatVerdict::Definite;
    }
    if entry.size != st.size as u32 {
        return StatVerdict::Definite;
    }
    if snap.filemode && st.kind == FileKind::Regular && entry.is_exec() != st.is_exec() {
        return StatVerdict::Definite;
    }

    let mut drift = false;
    if entry.mtime_s as u32 != st.mtime_s as u32 {
        drift = true;
    }
    if entry.mtime_ns != 0 && st.mtime_ns != 0 && entry.mtime_ns != st.mtime_ns as u32 {
        drift = true;
    }
    if entry.ino != 0 && entry.ino != st.ino as u32 {
        drift = true;
    }
    if entry.gid != 0 && entry.gid != st.gid {
        drift = true;
    }
    // Racy write: entry stamped in the same second the index was written.
    if !drift && i64::from(entry.mtime_s) >= snap.index_mtime_s {
        drift = true;
    }
    if drift {
        StatVerdict::Content
    } else {
        StatVerdict::Clean
    }
}
