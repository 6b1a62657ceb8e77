//! Sharded diff scans feeding a short-circuiting delta sink.
//!
//! Two scans populate the per-request scoreboard:
//!
//! - the **staged scan** merge-walks the HEAD tree against the index
//!   snapshot inside one shard's string range, in git tree order;
//! - the **workdir scan** settles dirty candidates proposed by the index
//!   model: content-hashing suspicious files, classifying deletions, and
//!   running ignore checks plus optional recursion for new entries.
//!
//! Every delta is reported to a [`DeltaSink`] whose return value directs
//! the scan: keep going, stop producing this delta kind, or abort because
//! no further delta can change the response. That three-valued contract is
//! what lets a capped scan exit the moment its answer is fully determined.

use std::cmp::Ordering;
use std::path::Path;

use git2::{ObjectType, Oid, Repository};

use crate::errors::ScanError;
use crate::index_model::{CandKind, Candidate, Snapshot};
use crate::shard::Shard;
use crate::strcmp::PathOrder;

/// Classified change reported to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    /// Index differs from HEAD tree.
    Staged,
    /// Path has conflict stages in the index.
    Conflicted,
    /// Working tree differs from the index.
    Modified,
    /// Tracked file missing from the working tree.
    Deleted,
    /// On-disk entry unknown to the index and not ignored.
    Untracked,
}

/// Scan directive returned for every delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaAction {
    /// Keep scanning.
    Keep,
    /// This delta kind is saturated; stop producing it but finish the scan.
    SkipKind,
    /// Nothing further can change the response; stop the scan.
    Abort,
}

/// Consumer of classified deltas.
///
/// Implementations bump atomic counters, so a sink is shared by every
/// worker of one request. The sink must be monotone: once it returns
/// `SkipKind` or `Abort` for a kind, later calls for that kind must not
/// return `Keep`.
pub trait DeltaSink: Sync {
    fn on_delta(&self, kind: DeltaKind) -> DeltaAction;
}

/// Control flow threaded through the tree walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

// ---------------------------------------------------------------------------
// Staged scan
// ---------------------------------------------------------------------------

/// Cursor over the index entries inside one shard, in byte order.
struct EntryCursor<'a> {
    snap: &'a Snapshot,
    /// Entry indices, sorted by raw path bytes (git tree order for files).
    idxs: Vec<u32>,
    pos: usize,
}

impl<'a> EntryCursor<'a> {
    fn new(snap: &'a Snapshot, shard: &Shard) -> Self {
        let order = snap.order;
        let lo = snap
            .entries
            .partition_point(|e| order.cmp(snap.path(e), &shard.start) == Ordering::Less);
        let hi = if shard.end.is_empty() {
            snap.entries.len()
        } else {
            snap.entries.partition_point(|e| {
                order.prefix_cmp(snap.path(e), &shard.end) != Ordering::Greater
            })
        };
        let mut idxs: Vec<u32> = (lo..hi)
            .filter(|&i| !snap.entries[i].intent_to_add)
            .map(|i| i as u32)
            .collect();
        if order == PathOrder::Insensitive {
            idxs.sort_unstable_by(|&a, &b| snap.path_at(a as usize).cmp(snap.path_at(b as usize)));
        }
        Self { snap, idxs, pos: 0 }
    }

    fn peek(&self) -> Option<&[u8]> {
        self.idxs
            .get(self.pos)
            .map(|&i| self.snap.path_at(i as usize))
    }

    fn advance(&mut self) -> u32 {
        let i = self.idxs[self.pos];
        self.pos += 1;
        i
    }
}

/// Runs the index-vs-HEAD-tree scan for one shard.
///
/// Reports one `Staged` delta per added, removed, or modified path and one
/// `Conflicted` delta per conflicted path in range. The walk descends only
/// into subtrees whose path range intersects the shard.
pub fn staged_scan_shard(
    repo: &Repository,
    snap: &Snapshot,
    tree_oid: Oid,
    shard: &Shard,
    sink: &dyn DeltaSink,
) -> Result<(), ScanError> {
    let order = snap.order;

    // Conflicted paths are enumerated from the index directly; the tree
    // walk below suppresses their tree-side echo.
    let conf_lo = snap
        .conflicted
        .partition_point(|&p| order.cmp(snap.arena.get(p), &shard.start) == Ordering::Less);
    let conf_hi = if shard.end.is_empty() {
        snap.conflicted.len()
    } else {
        snap.conflicted.partition_point(|&p| {
            order.prefix_cmp(snap.arena.get(p), &shard.end) != Ordering::Greater
        })
    };
    for _ in conf_lo..conf_hi {
        match sink.on_delta(DeltaKind::Conflicted) {
            DeltaAction::Keep => {}
            DeltaAction::SkipKind => break,
            DeltaAction::Abort => return Ok(()),
        }
    }

    let mut suppressed: Vec<&[u8]> = snap.conflicted[conf_lo..conf_hi]
        .iter()
        .map(|&p| snap.arena.get(p))
        .collect();
    suppressed.sort_unstable();

    let mut cursor = EntryCursor::new(snap, shard);
    let mut walk = TreeWalk {
        repo,
        snap,
        shard,
        order,
        sink,
        suppressed,
    };
    let mut prefix = Vec::with_capacity(256);
    if walk.walk_tree(tree_oid, &mut prefix, &mut cursor)? == Flow::Stop {
        return Ok(());
    }

    // Entries past the last tree path are additions.
    while cursor.peek().is_some() {
        cursor.advance();
        match sink.on_delta(DeltaKind::Staged) {
            DeltaAction::Keep => {}
            DeltaAction::SkipKind | DeltaAction::Abort => return Ok(()),
        }
    }
    Ok(())
}

struct TreeWalk<'a> {
    repo: &'a Repository,
    snap: &'a Snapshot,
    shard: &'a Shard,
    order: PathOrder,
    sink: &'a dyn DeltaSink,
    /// Conflicted paths in range, byte-sorted; their tree entries are not
    /// deletions.
    suppressed: Vec<&'a [u8]>,
}

impl<'a> TreeWalk<'a> {
    fn subtree_intersects(&self, prefix: &[u8]) -> bool {
        if self.order.prefix_cmp(prefix, &self.shard.start) == Ordering::Less {
            return false;
        }
        self.shard.end.is_empty()
            || self.order.prefix_cmp(prefix, &self.shard.end) != Ordering::Greater
    }

    fn emit_staged(&self) -> Flow {
        match self.sink.on_delta(DeltaKind::Staged) {
            DeltaAction::Keep => Flow::Continue,
            DeltaAction::SkipKind | DeltaAction::Abort => Flow::Stop,
        }
    }

    /// Merge-walks one tree level. `prefix` is the tree's path with a
    /// trailing `/` (empty at the root).
    fn walk_tree(
        &mut self,
        tree_oid: Oid,
        prefix: &mut Vec<u8>,
        cursor: &mut EntryCursor<'_>,
    ) -> Result<Flow, ScanError> {
        let tree = self.repo.find_tree(tree_oid)?;
        for entry in tree.iter() {
            let name = entry.name_bytes();
            if entry.kind() == Some(ObjectType::Tree) {
                let base_len = prefix.len();
                prefix.extend_from_slice(name);
                prefix.push(b'/');
                let descend = self.subtree_intersects(prefix);
                let flow = if descend {
                    self.walk_tree(entry.id(), prefix, cursor)?
                } else {
                    Flow::Continue
                };
                prefix.truncate(base_len);
                if flow == Flow::Stop {
                    return Ok(Flow::Stop);
                }
                continue;
            }

            let base_len = prefix.len();
            prefix.extend_from_slice(name);
            let flow = self.match_blob(prefix, entry.id(), entry.filemode() as u32, cursor);
            prefix.truncate(base_len);
            if flow == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Merges one tree blob against the entry cursor.
    fn match_blob(
        &self,
        path: &[u8],
        oid: Oid,
        mode: u32,
        cursor: &mut EntryCursor<'_>,
    ) -> Flow {
        if !self.shard.contains(self.order, path) {
            return Flow::Continue;
        }

        // Index entries sorting before this tree path exist only in the
        // index: staged additions.
        while let Some(entry_path) = cursor.peek() {
            match entry_path.cmp(path) {
                Ordering::Less => {
                    cursor.advance();
                    if self.emit_staged() == Flow::Stop {
                        return Flow::Stop;
                    }
                }
                Ordering::Equal => {
                    let idx = cursor.advance();
                    let entry = &self.snap.entries[idx as usize];
                    if entry.oid != oid || entry.mode != mode {
                        return self.emit_staged();
                    }
                    return Flow::Continue;
                }
                Ordering::Greater => break,
            }
        }

        // Tree-only path: staged deletion, unless it is the base of a
        // conflict.
        if self.suppressed.binary_search(&path).is_ok() {
            return Flow::Continue;
        }
        self.emit_staged()
    }
}

// ---------------------------------------------------------------------------
// Workdir scan
// ---------------------------------------------------------------------------

/// Settings for candidate confirmation.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmOpts {
    /// Whether unstaged deltas still matter (cap > 0).
    pub want_unstaged: bool,
    /// Whether untracked deltas still matter (cap > 0).
    pub want_untracked: bool,
    /// Count files inside untracked directories instead of the directory.
    pub recurse_untracked: bool,
}

enum ContentVerdict {
    Clean,
    Modified,
    Deleted,
}

/// Confirms one chunk of sorted dirty candidates against disk.
///
/// `repo` is a worker-exclusive handle used for ignore checks only; stat
/// and content comparison go straight to the filesystem.
pub fn confirm_candidates(
    repo: &Repository,
    snap: &Snapshot,
    workdir: &Path,
    candidates: &[Candidate],
    opts: ConfirmOpts,
    sink: &dyn DeltaSink,
) -> Result<(), ScanError> {
    let mut want_unstaged = opts.want_unstaged;
    let mut want_untracked = opts.want_untracked;

    for cand in candidates {
        if !want_unstaged && !want_untracked {
            return Ok(());
        }
        match cand.kind {
            CandKind::Deleted => {
                if !want_unstaged {
                    continue;
                }
                match sink.on_delta(DeltaKind::Deleted) {
                    DeltaAction::Keep => {}
                    DeltaAction::SkipKind => want_unstaged = false,
                    DeltaAction::Abort => return Ok(()),
                }
            }
            CandKind::Modified { entry, definite } => {
                if !want_unstaged {
                    continue;
                }
                let entry = &snap.entries[entry as usize];
                let kind = if definite {
                    DeltaKind::Modified
                } else {
                    match content_check(snap, entry, workdir) {
                        ContentVerdict::Clean => continue,
                        ContentVerdict::Modified => DeltaKind::Modified,
                        ContentVerdict::Deleted => DeltaKind::Deleted,
                    }
                };
                match sink.on_delta(kind) {
                    DeltaAction::Keep => {}
                    DeltaAction::SkipKind => want_unstaged = false,
                    DeltaAction::Abort => return Ok(()),
                }
            }
            CandKind::New { dir } => {
                if !want_untracked {
                    continue;
                }
                if is_conflicted_path(snap, &cand.path) {
                    continue;
                }
                if path_ignored(repo, &cand.path) {
                    continue;
                }
                let flow = if dir {
                    confirm_new_dir(repo, workdir, &cand.path, opts.recurse_untracked, sink)
                } else {
                    match sink.on_delta(DeltaKind::Untracked) {
                        DeltaAction::Keep => Flow::Continue,
                        DeltaAction::SkipKind => {
                            want_untracked = false;
                            Flow::Continue
                        }
                        DeltaAction::Abort => Flow::Stop,
                    }
                };
                match flow {
                    Flow::Continue => {}
                    Flow::Stop => return Ok(()),
                }
            }
        }
    }
    Ok(())
}

fn is_conflicted_path(snap: &Snapshot, path: &[u8]) -> bool {
    let trimmed = path.strip_suffix(b"/").unwrap_or(path);
    snap.conflicted
        .binary_search_by(|&p| snap.order.cmp(snap.arena.get(p), trimmed))
        .is_ok()
}

fn bytes_as_path(bytes: &[u8]) -> &Path {
    use std::os::unix::ffi::OsStrExt;
    Path::new(std::ffi::OsStr::from_bytes(bytes))
}

fn path_ignored(repo: &Repository, rel: &[u8]) -> bool {
    repo.is_path_ignored(bytes_as_path(rel)).unwrap_or(false)
}

/// Hashes the working file and compares against the index entry's blob id.
fn content_check(snap: &Snapshot, entry: &crate::index_model::EntrySnapshot, workdir: &Path) -> ContentVerdict {
    let abs = workdir.join(bytes_as_path(snap.path(entry)));
    if entry.is_symlink() {
        match std::fs::read_link(&abs) {
            Ok(target) => {
                use std::os::unix::ffi::OsStrExt;
                match Oid::hash_object(ObjectType::Blob, target.as_os_str().as_bytes()) {
                    Ok(oid) if oid == entry.oid => ContentVerdict::Clean,
                    _ => ContentVerdict::Modified,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ContentVerdict::Deleted,
            Err(_) => ContentVerdict::Modified,
        }
    } else {
        match Oid::hash_file(ObjectType::Blob, &abs) {
            Ok(oid) if oid == entry.oid => ContentVerdict::Clean,
            Ok(_) => ContentVerdict::Modified,
            Err(e) if e.code() == git2::ErrorCode::NotFound => ContentVerdict::Deleted,
            Err(_) => ContentVerdict::Modified,
        }
    }
}

/// Settles a new-directory candidate.
///
/// Without recursion, a directory is one untracked delta iff it transitively
/// contains at least one non-ignored file; with recursion every such file is
/// its own delta. Either way the walk stops as soon as the sink saturates.
fn confirm_new_dir(
    repo: &Repository,
    workdir: &Path,
    rel_dir: &[u8],
    recurse: bool,
    sink: &dyn DeltaSink,
) -> Flow {
    let rel = rel_dir.strip_suffix(b"/").unwrap_or(rel_dir);
    if recurse {
        walk_untracked_dir(repo, workdir, rel, sink)
    } else if dir_has_untracked_file(repo, workdir, rel) {
        match sink.on_delta(DeltaKind::Untracked) {
            DeltaAction::Keep | DeltaAction::SkipKind => Flow::Continue,
            DeltaAction::Abort => Flow::Stop,
        }
    } else {
        Flow::Continue
    }
}

fn read_dir_entries(workdir: &Path, rel: &[u8]) -> Vec<(Vec<u8>, bool)> {
    use std::os::unix::ffi::OsStrExt;
    let abs = workdir.join(bytes_as_path(rel));
    let Ok(iter) = std::fs::read_dir(&abs) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in iter.flatten() {
        let name = entry.file_name();
        let name = name.as_os_str().as_bytes();
        if name == b".git" {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let mut child = Vec::with_capacity(rel.len() + name.len() + 1);
        child.extend_from_slice(rel);
        child.push(b'/');
        child.extend_from_slice(name);
        out.push((child, is_dir));
    }
    out
}

/// True if `rel` transitively contains a non-ignored file.
fn dir_has_untracked_file(repo: &Repository, workdir: &Path, rel: &[u8]) -> bool {
    for (child, is_dir) in read_dir_entries(workdir, rel) {
        if is_dir {
            let mut with_slash = child.clone();
            with_slash.push(b'/');
            if !path_ignored(repo, &with_slash) && dir_has_untracked_file(repo, workdir, &child) {
                return true;
            }
        } else if !path_ignored(repo, &child) {
            return true;
        }
    }
    false
}

/// Reports every non-ignored file under `rel` as untracked.
fn walk_untracked_dir(
    repo: &Repository,
    workdir: &Path,
    rel: &[u8],
    sink: &dyn DeltaSink,
) -> Flow {
    for (child, is_dir) in read_dir_entries(workdir, rel) {
        if is_dir {
            let mut with_slash = child.clone();
            with_slash.push(b'/');
            if path_ignored(repo, &with_slash) {
                continue;
            }
            if walk_untracked_dir(repo, workdir, &child, sink) == Flow::Stop {
                return Flow::Stop;
            }
        } else {
            if path_ignored(repo, &child) {
                continue;
            }
            match sink.on_delta(DeltaKind::Untracked) {
                DeltaAction::Keep => {}
                DeltaAction::SkipKind | DeltaAction::Abort => return Flow::Stop,
            }
        }
    }
    Flow::Continue
}
