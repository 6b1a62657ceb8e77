//! Request framing and the sentinel watch.
//!
//! Requests arrive on stdin as records separated by `0x1E` with fields
//! separated by `0x1F`: an opaque id, an absolute directory, and an
//! optional `1` meaning the directory is the `.git` dir itself.
//!
//! A reader thread owns stdin; the main loop receives complete records
//! through a channel so it can wake every second and test the liveness
//! sentinel (a parent-held file lock or a parent pid) even when no
//! requests arrive.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, warn};

/// Field separator byte.
pub const FIELD_SEP: u8 = 0x1F;
/// Record separator byte.
pub const RECORD_SEP: u8 = 0x1E;

/// One parsed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Opaque id, echoed verbatim (after sanitization) in the response.
    pub id: Vec<u8>,
    /// Directory to report on.
    pub dir: PathBuf,
    /// `dir` is the `.git` directory; skip upward discovery.
    pub from_dotgit: bool,
}

/// Request parse failure.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    /// Record contained no fields at all.
    Empty,
    /// Directory field missing or empty.
    MissingDir,
    /// More than three fields.
    TooManyFields { count: usize },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty request record"),
            Self::MissingDir => write!(f, "request has no directory field"),
            Self::TooManyFields { count } => {
                write!(f, "request has {count} fields (expected 2 or 3)")
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Parses one record (without its trailing record separator).
pub fn parse_request(record: &[u8]) -> Result<Request, RequestError> {
    if record.is_empty() {
        return Err(RequestError::Empty);
    }
    let fields: Vec<&[u8]> = record.split(|&b| b == FIELD_SEP).collect();
    if fields.len() > 3 {
        return Err(RequestError::TooManyFields {
            count: fields.len(),
        });
    }
    let dir = fields.get(1).copied().unwrap_or(b"");
    if dir.is_empty() {
        return Err(RequestError::MissingDir);
    }
    let from_dotgit = fields.get(2).is_some_and(|f| *f == b"1");

    use std::os::unix::ffi::OsStrExt;
    Ok(Request {
        id: fields[0].to_vec(),
        dir: PathBuf::from(std::ffi::OsStr::from_bytes(dir)),
        from_dotgit,
    })
}

/// Stdin reader delivering complete records over a channel.
///
/// The channel closes on EOF; the thread is detached because a blocking
/// `read` cannot be interrupted portably and the process exits with it.
pub struct RequestReader {
    rx: Receiver<Vec<u8>>,
}

impl RequestReader {
    /// Spawns the reader over an arbitrary byte stream.
    pub fn spawn<R: Read + Send + 'static>(mut input: R) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("request-reader".into())
            .spawn(move || {
                let mut pending: Vec<u8> = Vec::new();
                let mut buf = [0u8; 16 << 10];
                loop {
                    let n = match input.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!(error = %e, "stdin read failed");
                            break;
                        }
                    };
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(pos) = memchr::memchr(RECORD_SEP, &pending) {
                        let record: Vec<u8> = pending.drain(..=pos).take(pos).collect();
                        if tx.send(record).is_err() {
                            return;
                        }
                    }
                }
                debug!("request stream closed");
            })
            .expect("failed to spawn request reader");
        Self { rx }
    }

    /// Spawns the reader over the process stdin.
    #[must_use]
    pub fn spawn_stdin() -> Self {
        Self::spawn(std::io::stdin())
    }

    /// Waits up to `timeout` for the next record.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Liveness sentinel: the daemon exits when its parent goes away.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sentinel {
    /// Descriptor the parent holds an exclusive `flock` on.
    pub lock_fd: Option<i32>,
    /// Parent process id probed with signal 0.
    pub parent_pid: Option<i32>,
}

impl Sentinel {
    /// True once any configured sentinel reports the parent gone.
    #[must_use]
    pub fn lost(&self) -> bool {
        if let Some(fd) = self.lock_fd {
            // SAFETY: flock on an arbitrary fd is safe; failure modes are
            // reported via errno.
            let rc = unsafe { libc::flock(fd, libc::LOCK_SH | libc::LOCK_NB) };
            if rc == 0 {
                // Lock acquired: the parent released it (or died).
                return true;
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EWOULDBLOCK) {
                // EBADF and friends: treat a broken sentinel as lost.
                return true;
            }
        }
        if let Some(pid) = self.parent_pid {
            // SAFETY: signal 0 performs permission/existence checks only.
            if unsafe { libc::kill(pid, 0) } != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EPERM) {
                    return true;
                }
            }
        }
        false
    }
}
