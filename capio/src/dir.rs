//! Directory iteration: [`Dir`] streams and the packed record format the
//! transport's `readdir` fills buffers with.
//!
//! Each record is `[u32 size][u32 type]` followed by the NUL-terminated
//! name, where `size` is the total record length. A stream refills its
//! scratch buffer from the transport whenever the cursor runs dry,
//! sending [`ReadDirCmd::Reset`] when the cursor was explicitly rewound
//! (or on first use) and [`ReadDirCmd::Next`] otherwise.

use alloc::string::String;

use spin::Mutex;

use crate::errno::Errno;
use crate::io::{Mode, OFlags, ReadDirCmd};
use crate::state::IoState;

/// Scratch-buffer size of a [`Dir`] stream.
pub const DIR_BUFSIZE: usize = 2048;

const DIRENT_HEADER: usize = 8;

/// Write one packed record into `buf`, returning its length, or `None`
/// when it does not fit. Transports use this to fill `readdir` buffers.
pub fn encode_dirent(buf: &mut [u8], entry_type: u8, name: &str) -> Option<usize> {
    let total = DIRENT_HEADER + name.len() + 1;
    if total > buf.len() {
        return None;
    }
    buf[..4].copy_from_slice(&(total as u32).to_le_bytes());
    buf[4..8].copy_from_slice(&u32::from(entry_type).to_le_bytes());
    buf[DIRENT_HEADER..DIRENT_HEADER + name.len()].copy_from_slice(name.as_bytes());
    buf[DIRENT_HEADER + name.len()] = 0;
    Some(total)
}

fn parse_dirent(buf: &[u8]) -> Option<(usize, u8, &str)> {
    if buf.len() < DIRENT_HEADER {
        return None;
    }
    let size = u32::from_le_bytes(buf[..4].try_into().ok()?) as usize;
    let entry_type = u32::from_le_bytes(buf[4..8].try_into().ok()?) as u8;
    if size <= DIRENT_HEADER || size > buf.len() || buf[size - 1] != 0 {
        return None;
    }
    let name = core::str::from_utf8(&buf[DIRENT_HEADER..size - 1]).ok()?;
    Some((size, entry_type, name))
}

/// One directory entry, as returned by [`Dir::read`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DirEntry {
    pub name: String,
    pub entry_type: u8,
}

struct DirBuf {
    data: [u8; DIR_BUFSIZE],
    /// Bytes of `data` currently filled with records.
    end: usize,
    /// Cursor into `data`; `None` means the next refill must reset the
    /// directory.
    pos: Option<usize>,
}

/// An open directory stream over a descriptor.
///
/// The stream owns its fd: dropping the stream closes it, as does the
/// explicit [`Dir::close`]. The internal mutex serializes iteration, one
/// entry at a time per stream.
pub struct Dir<'s> {
    state: &'s IoState,
    fd: i32,
    inner: Mutex<DirBuf>,
}

impl IoState {
    /// `opendir(3)`.
    pub fn opendir(&self, name: &str) -> Result<Dir<'_>, Errno> {
        let fd = self.open(name, OFlags::RDONLY | OFlags::DIRECTORY, Mode::empty())?;
        Ok(Dir::new(self, fd))
    }

    /// `fdopendir(3)`. The fd is checked for validity but not for
    /// actually being a directory; iteration on a non-directory fails
    /// at the first refill instead.
    pub fn fdopendir(&self, fd: i32) -> Result<Dir<'_>, Errno> {
        let _io = self.get(fd).ok_or(Errno::EBADF)?;
        Ok(Dir::new(self, fd))
    }
}

impl<'s> Dir<'s> {
    fn new(state: &'s IoState, fd: i32) -> Self {
        Dir {
            state,
            fd,
            inner: Mutex::new(DirBuf {
                data: [0; DIR_BUFSIZE],
                end: 0,
                pos: None,
            }),
        }
    }

    /// `dirfd(3)`.
    #[must_use]
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// `readdir(3)`: the next entry, or `None` at end of directory.
    pub fn read(&self) -> Result<Option<DirEntry>, Errno> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(pos) = inner.pos {
                if inner.end - pos >= DIRENT_HEADER {
                    let parsed = parse_dirent(&inner.data[pos..inner.end])
                        .map(|(size, ty, name)| (size, ty, String::from(name)));
                    match parsed {
                        Some((size, entry_type, name)) => {
                            inner.pos = Some(pos + size);
                            return Ok(Some(DirEntry { name, entry_type }));
                        }
                        // Truncated record at the tail; discard and
                        // refill.
                        None => inner.pos = Some(inner.end),
                    }
                }
            }

            let cmd = match inner.pos {
                None => ReadDirCmd::Reset,
                Some(_) => ReadDirCmd::Next,
            };
            let io = self.state.get(self.fd).ok_or(Errno::EBADF)?;
            let n = io.ops().readdir(cmd, &mut inner.data).map_err(Errno::from)?;
            if n == 0 {
                return Ok(None);
            }
            if n > DIR_BUFSIZE {
                return Err(Errno::EIO);
            }
            inner.pos = Some(0);
            inner.end = n;
        }
    }

    /// `rewinddir(3)`: mark the cursor for reset; no I/O is issued
    /// until the next [`Dir::read`].
    pub fn rewind(&self) {
        let mut inner = self.inner.lock();
        inner.end = 0;
        inner.pos = None;
    }

    /// `closedir(3)`.
    pub fn close(self) -> Result<(), Errno> {
        let (state, fd) = (self.state, self.fd);
        core::mem::forget(self);
        state.close(fd)
    }
}

impl Drop for Dir<'_> {
    fn drop(&mut self) {
        let _ = self.state.close(self.fd);
    }
}
