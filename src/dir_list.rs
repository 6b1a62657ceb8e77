//! Directory enumeration for working-tree scans.
//!
//! Lists an open directory as `(kind, basename)` pairs sorted under the
//! repository's [`PathOrder`]. On Linux the listing reads raw `dirent64`
//! records straight from the kernel; elsewhere it falls back to a portable
//! `readdir` loop. Names are interned into the caller's [`PathArena`].
//!
//! `.` and `..` are always skipped. Callers treat a listing failure as
//! "cannot scan": every tracked file in that directory becomes a dirty
//! candidate.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use crate::arena::{PathArena, PathRef};
use crate::strcmp::PathOrder;

/// Entry kind derived from `d_type`.
///
/// `Unknown` means the filesystem did not report a type; callers must fall
/// back to `stat` before relying on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
    Unknown,
}

impl EntryKind {
    #[inline]
    fn from_d_type(d_type: u8) -> Self {
        match d_type {
            libc::DT_REG => Self::File,
            libc::DT_DIR => Self::Dir,
            libc::DT_LNK => Self::Symlink,
            libc::DT_UNKNOWN => Self::Unknown,
            _ => Self::Other,
        }
    }
}

/// One directory entry: kind plus an interned basename.
#[derive(Clone, Copy, Debug)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: PathRef,
}

#[inline]
fn is_dots(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

fn open_flags() -> libc::c_int {
    #[cfg(target_os = "linux")]
    {
        libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOATIME
    }
    #[cfg(not(target_os = "linux"))]
    {
        libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC
    }
}

fn retry_without_noatime(dir: Option<BorrowedFd<'_>>, name: &CString) -> libc::c_int {
    // O_NOATIME fails with EPERM on files owned by other users.
    let flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
    match dir {
        // SAFETY: name is NUL-terminated.
        Some(d) => unsafe { libc::openat(d.as_raw_fd(), name.as_ptr(), flags) },
        // SAFETY: name is NUL-terminated.
        None => unsafe { libc::open(name.as_ptr(), flags) },
    }
}

/// Opens a directory by absolute path.
pub fn open_dir(path: &[u8]) -> io::Result<OwnedFd> {
    let cpath =
        CString::new(path).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: cpath is NUL-terminated.
    let mut fd = unsafe { libc::open(cpath.as_ptr(), open_flags()) };
    if fd < 0 && io::Error::last_os_error().raw_os_error() == Some(libc::EPERM) {
        fd = retry_without_noatime(None, &cpath);
    }
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly opened, owned descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Opens the subdirectory `name` of an already open directory.
pub fn open_dir_at(dir: BorrowedFd<'_>, name: &[u8]) -> io::Result<OwnedFd> {
    let cname =
        CString::new(name).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: cname is NUL-terminated.
    let mut fd = unsafe { libc::openat(dir.as_raw_fd(), cname.as_ptr(), open_flags()) };
    if fd < 0 && io::Error::last_os_error().raw_os_error() == Some(libc::EPERM) {
        fd = retry_without_noatime(Some(dir), &cname);
    }
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly opened, owned descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Lists `dir` into `out`, sorted by basename under `order`.
///
/// Existing arena contents are preserved; `out` is cleared first.
pub fn list_dir(
    dir: BorrowedFd<'_>,
    order: PathOrder,
    arena: &mut PathArena,
    out: &mut Vec<DirEntry>,
) -> io::Result<()> {
    out.clear();
    read_entries(dir, arena, out)?;
    out.sort_unstable_by(|a, b| order.cmp(arena.get(a.name), arena.get(b.name)));
    Ok(())
}

#[cfg(target_os = "linux")]
fn read_entries(
    dir: BorrowedFd<'_>,
    arena: &mut PathArena,
    out: &mut Vec<DirEntry>,
) -> io::Result<()> {
    // struct linux_dirent64: u64 d_ino, i64 d_off, u16 d_reclen, u8 d_type,
    // then the NUL-terminated name.
    const HDR: usize = 8 + 8 + 2 + 1;
    let mut buf = vec![0u8; 16 << 10];

    loop {
        // SAFETY: buf is a valid writable buffer of the given length.
        let n = unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                dir.as_raw_fd(),
                buf.as_mut_ptr(),
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if n == 0 {
            return Ok(());
        }
        let filled = &buf[..n as usize];
        let mut pos = 0usize;
        while pos < filled.len() {
            let rec = &filled[pos..];
            if rec.len() < HDR {
                return Err(io::Error::from(io::ErrorKind::InvalidData));
            }
            let reclen = u16::from_ne_bytes([rec[16], rec[17]]) as usize;
            if reclen < HDR || reclen > rec.len() {
                return Err(io::Error::from(io::ErrorKind::InvalidData));
            }
            let d_type = rec[18];
            let name_area = &rec[HDR..reclen];
            let name_len = memchr::memchr(0, name_area).unwrap_or(name_area.len());
            let name = &name_area[..name_len];
            if !is_dots(name) {
                let r = arena
                    .intern(name)
                    .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
                out.push(DirEntry {
                    kind: EntryKind::from_d_type(d_type),
                    name: r,
                });
            }
            pos += reclen;
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn read_entries(
    dir: BorrowedFd<'_>,
    arena: &mut PathArena,
    out: &mut Vec<DirEntry>,
) -> io::Result<()> {
    use std::ffi::CStr;

    // fdopendir takes ownership of the descriptor, so operate on a dup.
    // SAFETY: dir is a valid open descriptor.
    let dup = unsafe { libc::fcntl(dir.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };
    if dup < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: dup is a valid owned directory descriptor.
    let handle = unsafe { libc::fdopendir(dup) };
    if handle.is_null() {
        let err = io::Error::last_os_error();
        // SAFETY: dup was not consumed by the failed fdopendir.
        unsafe { libc::close(dup) };
        return Err(err);
    }

    let result = (|| {
        loop {
            // SAFETY: handle is a valid DIR stream.
            let ent = unsafe { libc::readdir(handle) };
            if ent.is_null() {
                return Ok(());
            }
            // SAFETY: readdir returned a valid dirent with a NUL-terminated name.
            let (d_type, name) = unsafe {
                (
                    (*ent).d_type,
                    CStr::from_ptr((*ent).d_name.as_ptr()).to_bytes(),
                )
            };
            if is_dots(name) {
                continue;
            }
            let r = arena
                .intern(name)
                .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
            out.push(DirEntry {
                kind: EntryKind::from_d_type(d_type),
                name: r,
            });
        }
    })();
    // SAFETY: handle came from fdopendir and has not been closed.
    unsafe { libc::closedir(handle) };
    result
}
