//! Thin layer over the external git library.
//!
//! Everything the engine needs from libgit2 goes through here: repository
//! discovery, HEAD and upstream resolution, config toggles, bounded ref and
//! tag peeling, and a checkout pool of auxiliary repository handles.
//!
//! `git2::Repository` is `Send` but not `Sync`, so a single handle cannot
//! back concurrent shard workers. The [`HandlePool`] keeps spare handles
//! onto the same `.git` directory; a worker checks one out for the duration
//! of its task and returns it. Handles are opened lazily and reused across
//! requests, so steady-state scans never reopen the repository.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use git2::{
    AttrCheckFlags, Branch, ErrorCode, ObjectType, Oid, ReferenceType, Repository,
    RepositoryOpenFlags, RepositoryState,
};
use tracing::debug;

use crate::errors::ScanError;

/// Bounded hops when chasing symbolic refs or nested annotated tags.
const MAX_DEREF_HOPS: usize = 10;

/// Opens the repository containing `dir`.
///
/// With `from_dotgit` the path is taken to be the `.git` directory itself
/// and upward discovery is skipped. Returns `None` for "not a repository",
/// which includes bare repositories (nothing to report for a prompt).
pub fn open_repo(dir: &Path, from_dotgit: bool) -> Result<Option<Repository>, git2::Error> {
    let flags = if from_dotgit {
        RepositoryOpenFlags::NO_SEARCH
    } else {
        RepositoryOpenFlags::empty()
    };
    let repo = match Repository::open_ext(dir, flags, std::iter::empty::<&std::ffi::OsStr>()) {
        Ok(repo) => repo,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if repo.is_bare() || repo.workdir().is_none() {
        debug!(dir = %dir.display(), "bare repository, nothing to report");
        return Ok(None);
    }
    Ok(Some(repo))
}

/// Spare repository handles for pool workers.
pub struct HandlePool {
    gitdir: PathBuf,
    handles: Mutex<Vec<Repository>>,
}

impl HandlePool {
    #[must_use]
    pub fn new(gitdir: PathBuf) -> Self {
        Self {
            gitdir,
            handles: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> Result<Repository, git2::Error> {
        if let Some(repo) = self.handles.lock().expect("handle pool poisoned").pop() {
            return Ok(repo);
        }
        Repository::open_ext(
            &self.gitdir,
            RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
    }

    fn checkin(&self, repo: Repository) {
        self.handles.lock().expect("handle pool poisoned").push(repo);
    }

    /// Runs `f` with an exclusive repository handle.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&Repository) -> Result<T, ScanError>,
    ) -> Result<T, ScanError> {
        let repo = self.checkout()?;
        let result = f(&repo);
        if result.is_ok() {
            self.checkin(repo);
        }
        result
    }
}

/// Reads a boolean from repository config, `None` if unset or unreadable.
#[must_use]
pub fn config_bool(repo: &Repository, name: &str) -> Option<bool> {
    repo.config().ok()?.get_bool(name).ok()
}

/// HEAD summary for one request.
#[derive(Clone, Debug, Default)]
pub struct HeadInfo {
    /// Commit id, `None` for an unborn branch.
    pub oid: Option<Oid>,
    /// Local branch short name, empty when detached or unborn.
    pub branch: String,
    /// Full ref name when HEAD is on a branch.
    pub ref_name: Option<String>,
}

/// Resolves HEAD. Unborn branches yield an empty summary.
pub fn head_info(repo: &Repository) -> Result<HeadInfo, ScanError> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(HeadInfo::default());
        }
        Err(e) => return Err(e.into()),
    };
    let oid = head.target();
    let (branch, ref_name) = if head.is_branch() {
        (
            head.shorthand().unwrap_or_default().to_owned(),
            head.name().map(str::to_owned),
        )
    } else {
        (String::new(), None)
    };
    Ok(HeadInfo {
        oid,
        branch,
        ref_name,
    })
}

/// Upstream summary for the current branch.
#[derive(Clone, Debug, Default)]
pub struct UpstreamInfo {
    /// Upstream branch name without the remote prefix.
    pub remote_branch: String,
    /// Remote name, e.g. `origin`.
    pub remote_name: String,
    /// Remote URL, empty if unset.
    pub remote_url: String,
    /// Upstream tip.
    pub oid: Option<Oid>,
}

/// Resolves the upstream of the branch HEAD is on, if any.
pub fn upstream_info(repo: &Repository, head_ref_name: &str) -> Result<UpstreamInfo, ScanError> {
    let local = match repo.find_reference(head_ref_name) {
        Ok(r) => Branch::wrap(r),
        Err(_) => return Ok(UpstreamInfo::default()),
    };
    let upstream = match local.upstream() {
        Ok(b) => b,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(UpstreamInfo::default()),
        Err(e) => return Err(e.into()),
    };

    let remote_name = repo
        .branch_upstream_remote(head_ref_name)
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_owned))
        .unwrap_or_default();

    let shorthand = upstream
        .get()
        .shorthand()
        .unwrap_or_default()
        .to_owned();
    let remote_branch = if !remote_name.is_empty() {
        shorthand
            .strip_prefix(&format!("{remote_name}/"))
            .unwrap_or(&shorthand)
            .to_owned()
    } else {
        shorthand
            .split_once('/')
            .map(|(_, b)| b.to_owned())
            .unwrap_or(shorthand)
    };

    let remote_url = if remote_name.is_empty() {
        String::new()
    } else {
        repo.find_remote(&remote_name)
            .ok()
            .and_then(|r| r.url().map(str::to_owned))
            .unwrap_or_default()
    };

    Ok(UpstreamInfo {
        remote_branch,
        remote_name,
        remote_url,
        oid: upstream.get().target(),
    })
}

/// Maps repository state to the wire-protocol action string.
#[must_use]
pub fn action_name(state: RepositoryState) -> &'static str {
    match state {
        RepositoryState::Clean => "",
        RepositoryState::Merge => "merge",
        RepositoryState::Revert => "revert",
        RepositoryState::RevertSequence => "revert-seq",
        RepositoryState::CherryPick => "cherry",
        RepositoryState::CherryPickSequence => "cherry-seq",
        RepositoryState::Bisect => "bisect",
        RepositoryState::Rebase => "rebase",
        RepositoryState::RebaseInteractive => "rebase-i",
        RepositoryState::RebaseMerge => "rebase-m",
        RepositoryState::ApplyMailbox => "am",
        RepositoryState::ApplyMailboxOrRebase => "am/rebase",
    }
}

/// Commits ahead of and behind the upstream tip.
pub fn ahead_behind(
    repo: &Repository,
    local: Option<Oid>,
    upstream: Option<Oid>,
) -> Result<(usize, usize), ScanError> {
    match (local, upstream) {
        (Some(l), Some(u)) => Ok(repo.graph_ahead_behind(l, u)?),
        _ => Ok((0, 0)),
    }
}

/// Number of stash entries.
pub fn stash_count(repo: &mut Repository) -> Result<usize, ScanError> {
    let mut count = 0usize;
    repo.stash_foreach(|_, _, _| {
        count += 1;
        true
    })?;
    Ok(count)
}

/// Forces initialization of the attribute cache.
///
/// libgit2 populates this cache lazily with no synchronization; touching it
/// before any pool worker does keeps the lazy path on one thread.
pub fn prime_attr_cache(repo: &Repository) -> Result<(), ScanError> {
    let _ = repo.get_attr(Path::new("x"), "x", AttrCheckFlags::empty())?;
    Ok(())
}

/// True if the ref `name` ultimately points at commit `target`.
///
/// Symbolic refs are chased and annotated tags peeled, each bounded to
/// [`MAX_DEREF_HOPS`]; anything deeper is treated as "no".
#[must_use]
pub fn ref_points_at(repo: &Repository, name: &str, target: Oid) -> bool {
    let Ok(mut reference) = repo.find_reference(name) else {
        return false;
    };
    for _ in 0..MAX_DEREF_HOPS {
        if reference.kind() != Some(ReferenceType::Symbolic) {
            break;
        }
        let Some(dst) = reference.symbolic_target() else {
            return false;
        };
        let Ok(next) = repo.find_reference(dst) else {
            return false;
        };
        reference = next;
    }
    if reference.kind() == Some(ReferenceType::Symbolic) {
        return false;
    }
    let Some(mut oid) = reference.target_peel().or_else(|| reference.target()) else {
        return false;
    };
    if oid == target {
        return true;
    }
    for _ in 0..MAX_DEREF_HOPS {
        let Ok(tag) = repo.find_tag(oid) else {
            return false;
        };
        if tag.target_type() == Some(ObjectType::Commit) {
            return tag.target_id() == target;
        }
        oid = tag.target_id();
    }
    false
}
