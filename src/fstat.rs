//! Stat snapshots used for change detection.
//!
//! Two granularities: [`FileId`] is the `(mtime, size, ino)` triple used to
//! decide "has this file been rewritten since we last looked" (index file,
//! `packed-refs`, directory snapshots for the untracked cache), and
//! [`StatInfo`] carries the full field set compared against index entries.
//!
//! All lookups use `AT_SYMLINK_NOFOLLOW`: an index entry for a symlink must
//! be compared against the link itself, never its target.

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::Path;

/// File kind as reported by `lstat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

impl FileKind {
    #[inline]
    fn from_mode(mode: libc::mode_t) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFREG => Self::Regular,
            libc::S_IFDIR => Self::Directory,
            libc::S_IFLNK => Self::Symlink,
            _ => Self::Other,
        }
    }
}

/// Identity triple for cheap change detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileId {
    pub mtime_s: i64,
    pub mtime_ns: i64,
    pub size: u64,
    pub ino: u64,
}

/// Full stat fields compared against index entries.
#[derive(Clone, Copy, Debug)]
pub struct StatInfo {
    pub kind: FileKind,
    pub mtime_s: i64,
    pub mtime_ns: i64,
    pub size: u64,
    pub ino: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl StatInfo {
    #[inline]
    fn from_raw(st: &libc::stat) -> Self {
        Self {
            kind: FileKind::from_mode(st.st_mode),
            mtime_s: st.st_mtime as i64,
            mtime_ns: st.st_mtime_nsec as i64,
            size: st.st_size as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            uid: st.st_uid,
            gid: st.st_gid,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> FileId {
        FileId {
            mtime_s: self.mtime_s,
            mtime_ns: self.mtime_ns,
            size: self.size,
            ino: self.ino,
        }
    }

    /// True if the executable bit is set for anyone.
    #[inline]
    #[must_use]
    pub fn is_exec(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

fn cstring(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
}

/// `lstat` of `name` relative to an open directory.
pub fn stat_at(dir: BorrowedFd<'_>, name: &[u8]) -> io::Result<StatInfo> {
    let name = cstring(name)?;
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: name is NUL-terminated and st is a valid out-pointer.
    let rc = unsafe {
        libc::fstatat(
            dir.as_raw_fd(),
            name.as_ptr(),
            st.as_mut_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstatat succeeded and initialized st.
    Ok(StatInfo::from_raw(unsafe { &st.assume_init() }))
}

/// `fstat` of an already open descriptor.
pub fn stat_fd(fd: BorrowedFd<'_>) -> io::Result<StatInfo> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: fd is a valid open descriptor and st is a valid out-pointer.
    let rc = unsafe { libc::fstat(fd.as_raw_fd(), st.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstat succeeded and initialized st.
    Ok(StatInfo::from_raw(unsafe { &st.assume_init() }))
}

/// `lstat` of an absolute or cwd-relative path.
pub fn stat_path(path: &Path) -> io::Result<StatInfo> {
    use std::os::unix::ffi::OsStrExt;
    let cpath = cstring(path.as_os_str().as_bytes())?;
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: cpath is NUL-terminated and st is a valid out-pointer.
    let rc = unsafe { libc::lstat(cpath.as_ptr(), st.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: lstat succeeded and initialized st.
    Ok(StatInfo::from_raw(unsafe { &st.assume_init() }))
}

/// [`FileId`] of a path, or `None` if it does not exist.
pub fn file_id(path: &Path) -> io::Result<Option<FileId>> {
    match stat_path(path) {
        Ok(st) => Ok(Some(st.id())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
