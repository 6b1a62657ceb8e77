//! Repository handle cache keyed by `.git` directory.
//!
//! A prompt fires one request per redraw, usually against the same handful
//! of repositories, so `Repo` state (index snapshot, directory model, tag
//! cache, probe result) is kept alive between requests and evicted only
//! after a TTL of disuse. Eviction drops the `Repo`, which waits out its
//! mtime probe.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::errors::ScanError;
use crate::git;
use crate::repo::Repo;
use crate::thread_pool::ThreadPool;

struct Entry {
    repo: Repo,
    last_used: Instant,
}

/// TTL'd map from `.git` directory to scan state.
pub struct RepoCache {
    pool: Arc<ThreadPool>,
    entries: AHashMap<PathBuf, Entry>,
}

impl RepoCache {
    #[must_use]
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            entries: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discovers the repository containing `dir` and returns its cached
    /// state, creating it on first sight. `None` means "not a repository"
    /// (including bare ones).
    pub fn open(
        &mut self,
        dir: &Path,
        from_dotgit: bool,
    ) -> Result<Option<&mut Repo>, ScanError> {
        let Some(opened) = git::open_repo(dir, from_dotgit)? else {
            return Ok(None);
        };
        let key = opened.path().to_path_buf();

        if !self.entries.contains_key(&key) {
            // Touch the object and reference databases on this thread;
            // their lazy initialization is not safe to race from the pool.
            opened.odb()?;
            info!(gitdir = %key.display(), "caching repository");
            let repo = Repo::new(opened, Arc::clone(&self.pool))?;
            self.entries.insert(
                key.clone(),
                Entry {
                    repo,
                    last_used: Instant::now(),
                },
            );
        }

        let entry = self.entries.get_mut(&key).expect("inserted above");
        entry.last_used = Instant::now();
        Ok(Some(&mut entry.repo))
    }

    /// Drops every entry last used before `cutoff`.
    pub fn evict_older_than(&mut self, cutoff: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.last_used >= cutoff);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "repo cache eviction");
        }
    }
}
