//! One-shot filesystem capability probe for the untracked cache.
//!
//! The untracked cache assumes that creating or removing entries in a
//! directory bumps the directory's mtime. That holds on common local
//! filesystems but not on some network mounts, so it is verified once per
//! repository by mutating throwaway directories under the repository root
//! and watching their stat identity.
//!
//! The probe sleeps one full second between the baseline stat and the
//! mutation because mtime granularity can be as coarse as one second.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::fstat::file_id;

/// Tristate probe result.
///
/// `Unknown` means the probe has not finished yet; scans must treat it as
/// `False` until it settles, and `Repo` teardown must wait it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tribool {
    False,
    True,
    Unknown,
}

struct TempTree {
    root: PathBuf,
}

impl TempTree {
    fn create(parent: &Path) -> io::Result<Self> {
        // Not mkdtemp: collisions are harmless here because the name only
        // needs to be unique among concurrent probes of the same repo.
        for attempt in 0..16u32 {
            let name = format!(".treestatusd-probe.{}.{attempt}", std::process::id());
            let root = parent.join(name);
            match fs::create_dir(&root) {
                Ok(()) => return Ok(Self { root }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::from(io::ErrorKind::AlreadyExists))
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn stat_changed(path: &Path, before: crate::fstat::FileId) -> io::Result<bool> {
    Ok(file_id(path)?.map_or(true, |now| now != before))
}

fn run(root_dir: &Path) -> io::Result<bool> {
    let tmp = TempTree::create(root_dir)?;

    let a_dir = tmp.root.join("a");
    let b_dir = tmp.root.join("b");
    fs::create_dir(&a_dir)?;
    fs::create_dir(&b_dir)?;
    let a_before = file_id(&a_dir)?.ok_or(io::ErrorKind::NotFound)?;
    let b_before = file_id(&b_dir)?.ok_or(io::ErrorKind::NotFound)?;

    // Kernel mtime granularity.
    thread::sleep(Duration::from_secs(1));

    fs::create_dir(a_dir.join("1"))?;
    if !stat_changed(&a_dir, a_before)? {
        warn!(dir = %root_dir.display(), "mkdir does not bump parent mtime");
        return Ok(false);
    }

    fs::write(b_dir.join("1"), b"")?;
    if !stat_changed(&b_dir, b_before)? {
        warn!(dir = %root_dir.display(), "file creation does not bump parent mtime");
        return Ok(false);
    }

    debug!(dir = %root_dir.display(), "directory mtime is reliable");
    Ok(true)
}

/// Verifies that directory mtime tracks content mutation under `root_dir`.
///
/// Any I/O failure is reported as `false`: the untracked cache is an
/// optimization and must never be enabled on shaky evidence.
#[must_use]
pub fn check_dir_mtime(root_dir: &Path) -> bool {
    match run(root_dir) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(dir = %root_dir.display(), error = %e, "mtime probe failed");
            false
        }
    }
}
