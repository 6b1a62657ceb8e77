//! Request dispatch loop.
//!
//! One request at a time: parse, open through the repo cache, read HEAD
//! and its upstream, launch the tag lookup on the pool, run the index
//! scans, then assemble the eighteen-field response. Failures of a single
//! request degrade to a zero-record; the loop keeps serving.

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::cli::Options;
use crate::errors::ScanError;
use crate::git;
use crate::repo::{Limits, Repo};
use crate::repo_cache::RepoCache;
use crate::request::{parse_request, Request, RequestReader, Sentinel};
use crate::response::{self, ResponseFields};
use crate::thread_pool::ThreadPool;

/// How often the loop wakes to test the sentinel.
const SENTINEL_PERIOD: Duration = Duration::from_secs(1);

/// Runs the daemon until stdin closes or the sentinel is lost.
///
/// Returns the process exit code.
pub fn serve(options: &Options) -> i32 {
    let pool = std::sync::Arc::new(ThreadPool::new(options.num_threads));
    let mut cache = RepoCache::new(pool);
    let reader = RequestReader::spawn_stdin();
    let sentinel = Sentinel {
        lock_fd: options.lock_fd,
        parent_pid: options.parent_pid,
    };
    let stdout = std::io::stdout();

    info!(threads = options.num_threads, "serving requests");
    loop {
        match reader.recv_timeout(SENTINEL_PERIOD) {
            Ok(record) => {
                if let Some(response) = handle_record(&mut cache, &options.limits, &record) {
                    let mut out = stdout.lock();
                    if out.write_all(&response).and_then(|()| out.flush()).is_err() {
                        error!("stdout closed, shutting down");
                        return 0;
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                info!("request stream closed, shutting down");
                return 0;
            }
        }
        if sentinel.lost() {
            info!("sentinel lost, shutting down");
            return 0;
        }
        if let Some(cutoff) = Instant::now().checked_sub(options.repo_ttl) {
            cache.evict_older_than(cutoff);
        }
    }
}

/// Processes one raw record into a response record, if one is owed.
///
/// A record that cannot even yield an id gets no response (there is
/// nothing to address it with); anything else gets a success record or a
/// zero-record.
pub fn handle_record(cache: &mut RepoCache, limits: &Limits, record: &[u8]) -> Option<Vec<u8>> {
    let request = match parse_request(record) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed request");
            let id = record.split(|&b| b == crate::request::FIELD_SEP).next()?;
            if id.is_empty() {
                return None;
            }
            return Some(response::format_not_repo(id));
        }
    };

    let started = Instant::now();
    let response = match run_request(cache, limits, &request) {
        Ok(Some(fields)) => response::format_ok(&request.id, &fields),
        Ok(None) => response::format_not_repo(&request.id),
        Err(e) => {
            error!(dir = %request.dir.display(), error = %e, "request failed");
            response::format_not_repo(&request.id)
        }
    };
    info!(
        dir = %request.dir.display(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "request served"
    );
    Some(response)
}

fn run_request(
    cache: &mut RepoCache,
    limits: &Limits,
    request: &Request,
) -> Result<Option<ResponseFields>, ScanError> {
    let Some(repo) = cache.open(&request.dir, request.from_dotgit)? else {
        return Ok(None);
    };
    build_response(repo, limits).map(Some)
}

/// Gathers every response field for an open repository.
fn build_response(repo: &mut Repo, limits: &Limits) -> Result<ResponseFields, ScanError> {
    let head = git::head_info(repo.git())?;
    let upstream = match &head.ref_name {
        Some(ref_name) => git::upstream_info(repo.git(), ref_name)?,
        None => Default::default(),
    };
    let action = git::action_name(repo.git().state());

    // Overlaps the diff scans below.
    let tag_rx = repo.tag_request(head.oid);

    let stats = repo.index_stats(head.oid, limits)?;

    let (ahead, behind) = git::ahead_behind(repo.git(), head.oid, upstream.oid)?;
    let stashes = git::stash_count(repo.git_mut())?;
    let tag = tag_rx.recv().map_err(|_| ScanError::Aborted)??;

    Ok(ResponseFields {
        workdir: response::workdir_bytes(repo.workdir()),
        head_hex: head.oid.map(|o| o.to_string()).unwrap_or_default(),
        branch: head.branch,
        remote_branch: upstream.remote_branch,
        remote_name: upstream.remote_name,
        remote_url: upstream.remote_url,
        action,
        index_size: stats.index_size,
        num_staged: stats.num_staged,
        num_unstaged: stats.num_unstaged,
        num_conflicted: stats.num_conflicted,
        num_untracked: stats.num_untracked,
        commits_ahead: ahead,
        commits_behind: behind,
        num_stashes: stashes,
        tag,
        num_unstaged_deleted: stats.num_unstaged_deleted,
    })
}
