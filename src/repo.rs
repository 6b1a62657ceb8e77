//! Per-repository scan orchestration.
//!
//! A [`Repo`] lives across many requests in the repo cache. Each
//! `index_stats` call re-reads the index (rebuilding the snapshot, the
//! directory model, and the shard table only when the on-disk index
//! actually changed), fans staged and workdir scans out across the shared
//! pool, and gathers counts on the scoreboard.
//!
//! Concurrency shape: the dispatcher thread owns the primary `git2`
//! repository handle; pool workers check auxiliary handles out of
//! [`HandlePool`]. Scoreboard counters are relaxed atomics; the
//! mutex/condvar pair around the in-flight count provides the
//! happens-before edge the dispatcher needs before reading results.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::Receiver;
use git2::{Oid, Repository};
use tracing::{debug, error, info};

use crate::diff::{self, ConfirmOpts, DeltaAction, DeltaKind, DeltaSink};
use crate::errors::ScanError;
use crate::fstat::{self, FileId};
use crate::git::{self, HandlePool};
use crate::index_model::{Candidate, Index as DirIndex, Snapshot};
use crate::probe::{check_dir_mtime, Tribool};
use crate::shard::{self, Shard};
use crate::strcmp::PathOrder;
use crate::tag_db::TagDb;
use crate::thread_pool::ThreadPool;

/// Scan limits for one request.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Skip the workdir scan entirely above this index size.
    pub dirty_max_index_size: u64,
    pub max_staged: usize,
    pub max_unstaged: usize,
    pub max_conflicted: usize,
    pub max_untracked: usize,
    /// Count files inside untracked directories instead of the directory.
    pub recurse_untracked_dirs: bool,
    /// Honor `status.showUntrackedFiles=false` from repo config.
    pub respect_status_show_untracked: bool,
    /// Honor `bash.showUntrackedFiles=false` from repo config.
    pub respect_bash_show_untracked: bool,
    /// Honor `bash.showDirtyState=false` from repo config.
    pub respect_bash_show_dirty: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            dirty_max_index_size: u64::MAX,
            max_staged: 1,
            max_unstaged: 1,
            max_conflicted: 1,
            max_untracked: 1,
            recurse_untracked_dirs: false,
            respect_status_show_untracked: true,
            respect_bash_show_untracked: true,
            respect_bash_show_dirty: true,
        }
    }
}

/// Result of one `index_stats` call. All counts are cap-clamped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub index_size: usize,
    pub num_staged: usize,
    pub num_unstaged: usize,
    pub num_conflicted: usize,
    pub num_untracked: usize,
    pub num_unstaged_deleted: usize,
}

/// Effective per-request caps after config toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Caps {
    staged: usize,
    unstaged: usize,
    conflicted: usize,
    untracked: usize,
}

/// Per-request counters, reset at `index_stats` entry.
#[derive(Default)]
struct Scoreboard {
    staged: AtomicUsize,
    unstaged: AtomicUsize,
    conflicted: AtomicUsize,
    untracked: AtomicUsize,
    unstaged_deleted: AtomicUsize,
    error: AtomicBool,
    inflight: AtomicUsize,
}

impl Scoreboard {
    fn reset(&self) {
        self.staged.store(0, Ordering::Relaxed);
        self.unstaged.store(0, Ordering::Relaxed);
        self.conflicted.store(0, Ordering::Relaxed);
        self.untracked.store(0, Ordering::Relaxed);
        self.unstaged_deleted.store(0, Ordering::Relaxed);
        self.error.store(false, Ordering::Relaxed);
    }
}

struct SyncState {
    untracked_cache: Tribool,
}

/// State shared with pool tasks; outlives the `Repo` if tasks straggle.
struct RepoShared {
    workdir: PathBuf,
    pool: Arc<ThreadPool>,
    handles: HandlePool,
    tag_db: Arc<TagDb>,
    board: Scoreboard,
    sync: Mutex<SyncState>,
    cv: Condvar,
}

impl RepoShared {
    fn dec_inflight(&self) {
        let _sync = self.sync.lock().expect("repo sync poisoned");
        let prev = self.board.inflight.fetch_sub(1, Ordering::Relaxed);
        assert!(prev > 0, "in-flight underflow");
        if prev == 1 {
            self.cv.notify_all();
        }
    }

    fn flag_error(&self, err: &ScanError) {
        error!(error = %err, "scan worker failed");
        let _sync = self.sync.lock().expect("repo sync poisoned");
        self.board.error.store(true, Ordering::Relaxed);
        self.cv.notify_all();
    }

    fn untracked_cache(&self) -> Tribool {
        self.sync.lock().expect("repo sync poisoned").untracked_cache
    }
}

/// Scoreboard-backed delta sink implementing the short-circuit contract.
///
/// For every delta the sink bumps its counter and answers: keep scanning
/// while the counter is below its cap; once saturated, skip this kind if
/// the sibling counter of the same scan can still grow; abort outright
/// when nothing this scan produces can change the response.
struct ScanSink {
    shared: Arc<RepoShared>,
    caps: Caps,
}

impl DeltaSink for ScanSink {
    fn on_delta(&self, kind: DeltaKind) -> DeltaAction {
        let b = &self.shared.board;
        if b.error.load(Ordering::Relaxed) {
            return DeltaAction::Abort;
        }
        let (own, own_cap, other, other_cap) = match kind {
            DeltaKind::Staged => (
                b.staged.fetch_add(1, Ordering::Relaxed) + 1,
                self.caps.staged,
                b.conflicted.load(Ordering::Relaxed),
                self.caps.conflicted,
            ),
            DeltaKind::Conflicted => (
                b.conflicted.fetch_add(1, Ordering::Relaxed) + 1,
                self.caps.conflicted,
                b.staged.load(Ordering::Relaxed),
                self.caps.staged,
            ),
            DeltaKind::Modified => (
                b.unstaged.fetch_add(1, Ordering::Relaxed) + 1,
                self.caps.unstaged,
                b.untracked.load(Ordering::Relaxed),
                self.caps.untracked,
            ),
            DeltaKind::Deleted => {
                b.unstaged_deleted.fetch_add(1, Ordering::Relaxed);
                (
                    b.unstaged.fetch_add(1, Ordering::Relaxed) + 1,
                    self.caps.unstaged,
                    b.untracked.load(Ordering::Relaxed),
                    self.caps.untracked,
                )
            }
            DeltaKind::Untracked => (
                b.untracked.fetch_add(1, Ordering::Relaxed) + 1,
                self.caps.untracked,
                b.unstaged.load(Ordering::Relaxed),
                self.caps.unstaged,
            ),
        };
        if own < own_cap {
            DeltaAction::Keep
        } else if other < other_cap {
            DeltaAction::SkipKind
        } else {
            DeltaAction::Abort
        }
    }
}

/// Staged/conflicted counts carried across requests while HEAD and the
/// index stay put.
#[derive(Clone, Copy, Debug)]
struct StagedCache {
    head: Oid,
    caps: (usize, usize),
    staged: usize,
    conflicted: usize,
}

/// One repository's scan state, owned by the repo cache.
pub struct Repo {
    repo: Repository,
    index: Option<git2::Index>,
    shared: Arc<RepoShared>,
    snapshot: Option<Arc<Snapshot>>,
    model: Option<Arc<DirIndex>>,
    index_file_id: Option<FileId>,
    shards: Vec<Shard>,
    staged_cache: Option<StagedCache>,
    attr_primed: bool,
    order: PathOrder,
    filemode: bool,
}

impl Repo {
    /// Wraps an opened repository and launches the mtime probe.
    pub fn new(repo: Repository, pool: Arc<ThreadPool>) -> Result<Self, ScanError> {
        let workdir = repo.workdir().ok_or(ScanError::NoWorkdir)?.to_path_buf();
        let gitdir = repo.path().to_path_buf();
        let order = PathOrder::from_ignore_case(
            git::config_bool(&repo, "core.ignorecase").unwrap_or(false),
        );
        let filemode = git::config_bool(&repo, "core.filemode").unwrap_or(true);

        let shared = Arc::new(RepoShared {
            workdir: workdir.clone(),
            pool: Arc::clone(&pool),
            handles: HandlePool::new(gitdir.clone()),
            tag_db: Arc::new(TagDb::new(gitdir)),
            board: Scoreboard::default(),
            sync: Mutex::new(SyncState {
                untracked_cache: Tribool::Unknown,
            }),
            cv: Condvar::new(),
        });

        {
            let shared = Arc::clone(&shared);
            pool.schedule(move || {
                let ok = check_dir_mtime(&shared.workdir);
                let mut sync = shared.sync.lock().expect("repo sync poisoned");
                sync.untracked_cache = if ok { Tribool::True } else { Tribool::False };
                shared.cv.notify_all();
            });
        }

        Ok(Self {
            repo,
            index: None,
            shared,
            snapshot: None,
            model: None,
            index_file_id: None,
            shards: vec![Shard::open()],
            staged_cache: None,
            attr_primed: false,
            order,
            filemode,
        })
    }

    #[inline]
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.shared.workdir
    }

    #[inline]
    #[must_use]
    pub fn git(&self) -> &Repository {
        &self.repo
    }

    #[inline]
    pub fn git_mut(&mut self) -> &mut Repository {
        &mut self.repo
    }

    /// Launches a tag lookup for `target` on the pool.
    ///
    /// The lookup overlaps the diff scans; receive the answer after
    /// `index_stats` returns.
    pub fn tag_request(&self, target: Option<Oid>) -> Receiver<Result<String, ScanError>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        self.shared.pool.schedule(move || {
            let result = match target {
                None => Ok(String::new()),
                Some(oid) => shared
                    .handles
                    .with(|g| shared.tag_db.tag_for_commit(g, &shared.pool, oid)),
            };
            let _ = tx.send(result);
        });
        rx
    }

    /// Computes staged/unstaged/conflicted/untracked counts for this
    /// request. `head` is HEAD's commit id, absent for an unborn branch.
    pub fn index_stats(&mut self, head: Option<Oid>, limits: &Limits) -> Result<IndexStats, ScanError> {
        self.wait();

        let new_index = self.read_index()?;
        if !self.attr_primed {
            git::prime_attr_cache(&self.repo)?;
            self.attr_primed = true;
        }
        if new_index {
            self.rebuild_snapshot()?;
        }
        let snap = Arc::clone(self.snapshot.as_ref().expect("snapshot built"));
        let caps = self.effective_caps(limits);

        self.shared.board.reset();
        let sink = Arc::new(ScanSink {
            shared: Arc::clone(&self.shared),
            caps,
        });

        let mut staged_scan_ran = false;
        match head {
            Some(head_oid) => {
                let cache_hit = self.staged_cache.is_some_and(|c| {
                    c.head == head_oid && c.caps == (caps.staged, caps.conflicted)
                });
                if cache_hit {
                    let c = self.staged_cache.expect("cache checked");
                    self.shared.board.staged.store(c.staged, Ordering::Relaxed);
                    self.shared
                        .board
                        .conflicted
                        .store(c.conflicted, Ordering::Relaxed);
                } else if caps.staged > 0 || caps.conflicted > 0 {
                    self.start_staged_scan(head_oid, &snap, &sink)?;
                    staged_scan_ran = true;
                }
            }
            None => {
                // Unborn HEAD: everything in the index is staged and the
                // working tree cannot differ from it yet.
                let staged = snap.entries.len() - snap.ita_count;
                self.shared.board.staged.store(staged, Ordering::Relaxed);
            }
        }

        let scan_dirty = head.is_some()
            && snap.total_entries as u64 <= limits.dirty_max_index_size
            && (caps.unstaged > 0 || caps.untracked > 0);
        if scan_dirty {
            self.start_dirty_scan(&snap, &sink, limits, caps)?;
        }

        self.wait();
        if self.shared.board.error.load(Ordering::Relaxed) {
            return Err(ScanError::Aborted);
        }

        let shared = Arc::clone(&self.shared);
        let b = &shared.board;
        if staged_scan_ran {
            self.staged_cache = Some(StagedCache {
                head: head.expect("staged scan implies head"),
                caps: (caps.staged, caps.conflicted),
                staged: b.staged.load(Ordering::Relaxed),
                conflicted: b.conflicted.load(Ordering::Relaxed),
            });
        }

        let num_unstaged = b.unstaged.load(Ordering::Relaxed).min(caps.unstaged);
        let stats = IndexStats {
            index_size: snap.total_entries,
            num_staged: b.staged.load(Ordering::Relaxed).min(caps.staged),
            num_unstaged,
            num_conflicted: b.conflicted.load(Ordering::Relaxed).min(caps.conflicted),
            num_untracked: b.untracked.load(Ordering::Relaxed).min(caps.untracked),
            num_unstaged_deleted: b
                .unstaged_deleted
                .load(Ordering::Relaxed)
                .min(num_unstaged),
        };
        debug!(?stats, "scan complete");
        Ok(stats)
    }

    /// Re-reads the index, reporting whether the on-disk file changed.
    fn read_index(&mut self) -> Result<bool, ScanError> {
        let index_path = self.repo.path().join("index");
        let current = fstat::file_id(&index_path)?;
        let mut changed = self.snapshot.is_none() || current != self.index_file_id;

        if self.index.is_none() {
            self.index = Some(self.repo.index()?);
            changed = true;
        }
        if changed {
            self.index
                .as_mut()
                .expect("index opened above")
                .read(false)?;
            self.index_file_id = current;
        }
        Ok(changed)
    }

    fn rebuild_snapshot(&mut self) -> Result<(), ScanError> {
        let index = self.index.as_ref().expect("index open");
        let index_mtime_s = self.index_file_id.map_or(i64::MAX, |id| id.mtime_s);
        let snap = Arc::new(Snapshot::capture(
            index,
            self.order,
            index_mtime_s,
            self.filemode,
        )?);

        self.shards = shard::derive_shards(
            self.order,
            self.shared.pool.num_threads(),
            snap.entries.len(),
            |i| snap.path_at(i),
        );
        info!(
            entries = snap.total_entries,
            shards = self.shards.len(),
            "index reloaded"
        );

        self.model = None;
        self.staged_cache = None;
        self.snapshot = Some(snap);
        Ok(())
    }

    fn effective_caps(&self, limits: &Limits) -> Caps {
        let mut caps = Caps {
            staged: limits.max_staged,
            unstaged: limits.max_unstaged,
            conflicted: limits.max_conflicted,
            untracked: limits.max_untracked,
        };
        let off = |name: &str| git::config_bool(&self.repo, name) == Some(false);
        if (limits.respect_status_show_untracked && off("status.showUntrackedFiles"))
            || (limits.respect_bash_show_untracked && off("bash.showUntrackedFiles"))
        {
            caps.untracked = 0;
        }
        if limits.respect_bash_show_dirty && off("bash.showDirtyState") {
            caps.staged = 0;
            caps.unstaged = 0;
            caps.conflicted = 0;
        }
        caps
    }

    /// One pool task per shard walking HEAD's tree against the index.
    fn start_staged_scan(
        &self,
        head: Oid,
        snap: &Arc<Snapshot>,
        sink: &Arc<ScanSink>,
    ) -> Result<(), ScanError> {
        let tree_oid = self.repo.find_commit(head)?.tree_id();
        for shard in self.shards.iter().cloned() {
            let snap = Arc::clone(snap);
            let sink = Arc::clone(sink);
            let shared = Arc::clone(&self.shared);
            self.run_async(move || {
                shared
                    .handles
                    .with(|g| diff::staged_scan_shard(g, &snap, tree_oid, &shard, &*sink))
            });
        }
        Ok(())
    }

    /// Candidate proposal across splits, then chunked confirmation.
    fn start_dirty_scan(
        &mut self,
        snap: &Arc<Snapshot>,
        sink: &Arc<ScanSink>,
        limits: &Limits,
        caps: Caps,
    ) -> Result<(), ScanError> {
        if self.model.is_none() {
            self.model = Some(Arc::new(DirIndex::new(
                self.shared.workdir.clone(),
                Arc::clone(snap),
                self.shared.pool.num_threads(),
            )?));
        }
        let model = Arc::clone(self.model.as_ref().expect("model built"));
        let use_cache = self.shared.untracked_cache() == Tribool::True;

        // Phase 1: propose candidates, one pool task per split.
        let num_splits = model.num_splits();
        let (tx, rx) = crossbeam_channel::bounded(num_splits);
        for split in 0..num_splits {
            let model = Arc::clone(&model);
            let tx = tx.clone();
            self.shared.pool.schedule(move || {
                let _ = tx.send(model.scan_split(split, use_cache));
            });
        }
        drop(tx);

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut first_err = None;
        for result in rx.iter() {
            match result {
                Ok(batch) => candidates.extend(batch),
                Err(e) => first_err = Some(e),
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        info!(candidates = candidates.len(), "dirty candidates proposed");
        if candidates.is_empty() {
            return Ok(());
        }

        let order = snap.order;
        order.sort_by_key(&mut candidates, |c| &*c.path);

        // Phase 2: confirm, one pool task per shard-aligned chunk.
        let chunks = shard::chunk_by_shard(&self.shards, order, &candidates);
        let candidates = Arc::new(candidates);
        let opts = ConfirmOpts {
            want_unstaged: caps.unstaged > 0,
            want_untracked: caps.untracked > 0,
            recurse_untracked: limits.recurse_untracked_dirs,
        };
        for (_, range) in chunks {
            let candidates = Arc::clone(&candidates);
            let snap = Arc::clone(snap);
            let sink = Arc::clone(sink);
            let shared = Arc::clone(&self.shared);
            self.run_async(move || {
                shared.handles.with(|g| {
                    diff::confirm_candidates(
                        g,
                        &snap,
                        &shared.workdir,
                        &candidates[range.clone()],
                        opts,
                        &*sink,
                    )
                })
            });
        }
        Ok(())
    }

    fn run_async<F>(&self, f: F)
    where
        F: FnOnce() -> Result<(), ScanError> + Send + 'static,
    {
        self.shared.board.inflight.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        self.shared.pool.schedule(move || {
            if let Err(e) = f() {
                shared.flag_error(&e);
            }
            shared.dec_inflight();
        });
    }

    /// Blocks until every scan task of this repo has finished.
    fn wait(&self) {
        let mut sync = self.shared.sync.lock().expect("repo sync poisoned");
        while self.shared.board.inflight.load(Ordering::Relaxed) != 0 {
            sync = self.shared.cv.wait(sync).expect("repo sync poisoned");
        }
    }
}

impl Drop for Repo {
    fn drop(&mut self) {
        self.wait();
        // The probe worker publishes into shared state; hold teardown until
        // it has settled.
        let mut sync = self.shared.sync.lock().expect("repo sync poisoned");
        while sync.untracked_cache == Tribool::Unknown {
            sync = self.shared.cv.wait(sync).expect("repo sync poisoned");
        }
    }
}
