//! Error types for the status engine.
//!
//! One enum per failure domain rather than a monolith. A [`ScanError`]
//! fails the current request (the daemon answers with a zero-record and
//! keeps serving); broken internal invariants are panics, not errors.

use std::fmt;
use std::io;

use crate::arena::ArenaError;

/// Errors from a single status scan.
#[derive(Debug)]
#[non_exhaustive]
pub enum ScanError {
    /// The git library rejected an operation.
    Git(git2::Error),
    /// Filesystem access failed outside the degradable listing paths.
    Io(io::Error),
    /// A path could not be interned.
    Arena(ArenaError),
    /// The repository has no working directory (bare).
    NoWorkdir,
    /// `packed-refs` could not be parsed.
    MalformedPackedRefs { line: usize },
    /// A cooperating worker already failed; this task gave up.
    Aborted,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(e) => write!(f, "git: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Arena(e) => write!(f, "{e}"),
            Self::NoWorkdir => write!(f, "repository has no working directory"),
            Self::MalformedPackedRefs { line } => {
                write!(f, "malformed packed-refs at line {line}")
            }
            Self::Aborted => write!(f, "scan aborted by a failed worker"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<git2::Error> for ScanError {
    fn from(e: git2::Error) -> Self {
        Self::Git(e)
    }
}

impl From<io::Error> for ScanError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArenaError> for ScanError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
