//! The POSIX call surface, lowered onto the fd table and the transport
//! contract.
//!
//! Every call follows the same shape: look up `fd → transport` under the
//! table lock (acquiring a reference), release the lock, invoke the
//! transport, drop the reference. Path-taking calls resolve through the
//! root or cwd transport first. Blocking reads and writes are an
//! explicit retry loop over the non-blocking transport ops: a
//! [`Status::ShouldWait`] result suspends in [`IoState::wait_fd`] unless
//! the descriptor is `O_NONBLOCK`, in which case it surfaces as
//! `EAGAIN`.

use alloc::vec::Vec;

use capio_kernel::{Clock, Handle, HandleInfo, HandleType, Signals, Status, SEC};

use crate::errno::Errno;
use crate::events::Events;
use crate::io::{
    AttrFlags, Io, IoFlags, IoRef, Mode, NodeAttr, OFlags, SetAttr, VmoRegion, Whence,
};
use crate::state::{close_quietly, IoState};
use crate::transports::WaitableTransport;
use crate::PATH_MAX;

/// The dirfd value meaning "resolve against the current working
/// directory".
pub const AT_FDCWD: i32 = -100;

bitflags::bitflags! {
    /// Flags accepted by the `...at` calls.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AtFlags: u32 {
        const SYMLINK_NOFOLLOW = 0x100;
        const EACCESS = 0x200;
    }
}

bitflags::bitflags! {
    /// `faccessat` mode: a subset of R/W/X, with the empty set standing
    /// for `F_OK`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Access: u32 {
        const X = 1;
        const W = 2;
        const R = 4;
    }
}

/// A `struct timespec` moment, as handed to the utimens family.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimeSpec {
    pub sec: i64,
    pub nsec: i64,
}

/// In `TimeSpec::nsec`: use the current time.
pub const UTIME_NOW: i64 = 0x3fff_ffff;
/// In `TimeSpec::nsec`: leave the timestamp untouched.
pub const UTIME_OMIT: i64 = 0x3fff_fffe;

/// `fcntl(2)` command, with its argument where the command takes one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FcntlCmd {
    DupFd { lowest: i32 },
    DupFdCloexec { lowest: i32 },
    GetFd,
    SetFd(IoFlags),
    GetFl,
    SetFl(OFlags),
    GetOwn,
    SetOwn(i32),
    GetLk,
    SetLk,
    SetLkw,
}

impl IoState {
    fn blocking_loop(
        &self,
        fd: i32,
        io: &IoRef,
        events: Events,
        mut op: impl FnMut(&dyn crate::io::Transport) -> Result<usize, Status>,
    ) -> Result<usize, Errno> {
        loop {
            match op(io.ops()) {
                Err(Status::ShouldWait) if !io.is_nonblock() => {
                    self.wait_fd(fd, events, None)?;
                }
                result => return result.map_err(Errno::from),
            }
        }
    }

    /// `read(2)`.
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        self.blocking_loop(fd, &io, Events::IN, |t| t.read(buf))
    }

    /// `write(2)`.
    pub fn write(&self, fd: i32, buf: &[u8]) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        self.blocking_loop(fd, &io, Events::OUT, |t| t.write(buf))
    }

    /// `pread(2)`.
    pub fn pread(&self, fd: i32, buf: &mut [u8], offset: u64) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        self.blocking_loop(fd, &io, Events::IN, |t| t.read_at(buf, offset))
    }

    /// `pwrite(2)`.
    pub fn pwrite(&self, fd: i32, buf: &[u8], offset: u64) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        self.blocking_loop(fd, &io, Events::OUT, |t| t.write_at(buf, offset))
    }

    /// `readv(2)`: scalar reads per segment, stopping at the first short
    /// or failed one. A failure after data has already been transferred
    /// reports the partial count.
    pub fn readv(&self, fd: i32, bufs: &mut [&mut [u8]]) -> Result<usize, Errno> {
        let mut count = 0usize;
        for buf in bufs.iter_mut() {
            if buf.is_empty() {
                continue;
            }
            match self.read(fd, buf) {
                Ok(n) => {
                    count += n;
                    if n < buf.len() {
                        return Ok(count);
                    }
                }
                Err(err) => return if count > 0 { Ok(count) } else { Err(err) },
            }
        }
        Ok(count)
    }

    /// `writev(2)`.
    pub fn writev(&self, fd: i32, bufs: &[&[u8]]) -> Result<usize, Errno> {
        let mut count = 0usize;
        for buf in bufs {
            if buf.is_empty() {
                continue;
            }
            match self.write(fd, buf) {
                Ok(n) => {
                    count += n;
                    if n < buf.len() {
                        return Ok(count);
                    }
                }
                Err(err) => return if count > 0 { Ok(count) } else { Err(err) },
            }
        }
        Ok(count)
    }

    /// `preadv(2)`.
    pub fn preadv(&self, fd: i32, bufs: &mut [&mut [u8]], offset: u64) -> Result<usize, Errno> {
        let mut count = 0usize;
        let mut offset = offset;
        for buf in bufs.iter_mut() {
            if buf.is_empty() {
                continue;
            }
            match self.pread(fd, buf, offset) {
                Ok(n) => {
                    count += n;
                    offset += n as u64;
                    if n < buf.len() {
                        return Ok(count);
                    }
                }
                Err(err) => return if count > 0 { Ok(count) } else { Err(err) },
            }
        }
        Ok(count)
    }

    /// `pwritev(2)`.
    pub fn pwritev(&self, fd: i32, bufs: &[&[u8]], offset: u64) -> Result<usize, Errno> {
        let mut count = 0usize;
        let mut offset = offset;
        for buf in bufs {
            if buf.is_empty() {
                continue;
            }
            match self.pwrite(fd, buf, offset) {
                Ok(n) => {
                    count += n;
                    offset += n as u64;
                    if n < buf.len() {
                        return Ok(count);
                    }
                }
                Err(err) => return if count > 0 { Ok(count) } else { Err(err) },
            }
        }
        Ok(count)
    }

    /// `lseek(2)`.
    pub fn lseek(&self, fd: i32, offset: i64, whence: Whence) -> Result<u64, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().seek(offset, whence).map_err(Errno::from)
    }

    /// `open(2)`.
    pub fn open(&self, path: &str, flags: OFlags, mode: Mode) -> Result<i32, Errno> {
        self.openat(AT_FDCWD, path, flags, mode)
    }

    /// `openat(2)`.
    pub fn openat(&self, dirfd: i32, path: &str, flags: OFlags, mode: Mode) -> Result<i32, Errno> {
        let mode = if flags.contains(OFlags::CREAT) {
            if flags.contains(OFlags::DIRECTORY) {
                // O_CREAT|O_DIRECTORY is underspecified in POSIX; to
                // help avoid programmer error the combination is
                // rejected outright.
                return Err(Errno::EINVAL);
            }
            mode & Mode::PERM_MASK
        } else {
            Mode::empty()
        };
        let io = self.open_at_io(dirfd, path, flags, mode).map_err(Errno::from)?;
        if flags.contains(OFlags::NONBLOCK) {
            io.set_nonblock(true);
        }
        match self.bind(io.clone(), -1, 0) {
            Ok(fd) => Ok(fd),
            Err(_) => {
                close_quietly(&io);
                Err(Errno::EMFILE)
            }
        }
    }

    /// `creat(2)`.
    pub fn creat(&self, path: &str, mode: Mode) -> Result<i32, Errno> {
        self.open(path, OFlags::CREAT | OFlags::WRONLY | OFlags::TRUNC, mode)
    }

    fn dup_common(&self, oldfd: i32, newfd: i32, starting_fd: i32) -> Result<i32, Errno> {
        let io = self.get(oldfd).ok_or(Errno::EBADF)?;
        self.bind(io, newfd, starting_fd)
    }

    /// `dup(2)`.
    pub fn dup(&self, oldfd: i32) -> Result<i32, Errno> {
        self.dup_common(oldfd, -1, 0)
    }

    /// `dup2(2)`. Same old and new fd is a no-op returning the fd.
    pub fn dup2(&self, oldfd: i32, newfd: i32) -> Result<i32, Errno> {
        if oldfd == newfd {
            return self.get(oldfd).map(|_| oldfd).ok_or(Errno::EBADF);
        }
        self.dup_common(oldfd, newfd, 0)
    }

    /// `dup3(2)`. Unlike `dup2`, equal fds fail `EINVAL`, and the only
    /// accepted flag is `O_CLOEXEC`.
    pub fn dup3(&self, oldfd: i32, newfd: i32, flags: OFlags) -> Result<i32, Errno> {
        if oldfd == newfd {
            return Err(Errno::EINVAL);
        }
        if !flags.is_empty() && flags != OFlags::CLOEXEC {
            return Err(Errno::EINVAL);
        }
        self.dup_common(oldfd, newfd, 0)
    }

    /// `fcntl(2)`.
    pub fn fcntl(&self, fd: i32, cmd: FcntlCmd) -> Result<i32, Errno> {
        match cmd {
            FcntlCmd::DupFd { lowest } | FcntlCmd::DupFdCloexec { lowest } => {
                self.dup_common(fd, -1, lowest)
            }
            FcntlCmd::GetFd => {
                let io = self.get(fd).ok_or(Errno::EBADF)?;
                Ok(io.fd_flags().bits() as i32)
            }
            FcntlCmd::SetFd(flags) => {
                let io = self.get(fd).ok_or(Errno::EBADF)?;
                io.set_fd_flags(flags);
                Ok(0)
            }
            FcntlCmd::GetFl => {
                let io = self.get(fd).ok_or(Errno::EBADF)?;
                let mut status = OFlags::empty();
                if io.is_nonblock() {
                    status |= OFlags::NONBLOCK;
                }
                Ok(status.bits() as i32)
            }
            FcntlCmd::SetFl(flags) => {
                let io = self.get(fd).ok_or(Errno::EBADF)?;
                io.set_nonblock(flags.contains(OFlags::NONBLOCK));
                Ok(0)
            }
            // Socket ownership and advisory locking are not modeled.
            FcntlCmd::GetOwn
            | FcntlCmd::SetOwn(_)
            | FcntlCmd::GetLk
            | FcntlCmd::SetLk
            | FcntlCmd::SetLkw => Err(Errno::ENOSYS),
        }
    }

    /// `truncate(2)`.
    pub fn truncate(&self, path: &str, len: u64) -> Result<(), Errno> {
        let io = self
            .open_at_io(AT_FDCWD, path, OFlags::WRONLY, Mode::empty())
            .map_err(Errno::from)?;
        let r = io.ops().truncate(len);
        close_quietly(&io);
        r.map_err(Errno::from)
    }

    /// `ftruncate(2)`.
    pub fn ftruncate(&self, fd: i32, len: u64) -> Result<(), Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().truncate(len).map_err(Errno::from)
    }

    /// `stat(2)`.
    pub fn stat(&self, path: &str) -> Result<NodeAttr, Errno> {
        self.fstatat(AT_FDCWD, path)
    }

    /// `fstat(2)`.
    pub fn fstat(&self, fd: i32) -> Result<NodeAttr, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().stat().map_err(Errno::from)
    }

    /// `fstatat(2)`.
    pub fn fstatat(&self, dirfd: i32, path: &str) -> Result<NodeAttr, Errno> {
        let io = self
            .open_at_io(dirfd, path, OFlags::empty(), Mode::empty())
            .map_err(Errno::from)?;
        let r = io.ops().stat();
        close_quietly(&io);
        r.map_err(Errno::from)
    }

    /// `mkdir(2)`.
    pub fn mkdir(&self, path: &str, mode: Mode) -> Result<(), Errno> {
        self.mkdirat(AT_FDCWD, path, mode)
    }

    /// `mkdirat(2)`: a create-exclusive open with the directory type
    /// bit, immediately closed.
    pub fn mkdirat(&self, dirfd: i32, path: &str, mode: Mode) -> Result<(), Errno> {
        let mode = (mode & Mode::PERM_MASK) | Mode::DIR;
        let io = self
            .open_at_io(dirfd, path, OFlags::CREAT | OFlags::EXCL | OFlags::RDWR, mode)
            .map_err(Errno::from)?;
        close_quietly(&io);
        Ok(())
    }

    /// `unlink(2)`.
    pub fn unlink(&self, path: &str) -> Result<(), Errno> {
        self.unlinkat(AT_FDCWD, path)
    }

    /// `unlinkat(2)`: resolve the containing directory, then remove the
    /// leaf within it.
    pub fn unlinkat(&self, dirfd: i32, path: &str) -> Result<(), Errno> {
        let (parent, name) = self.open_containing(dirfd, path).map_err(Errno::from)?;
        let r = parent.ops().unlink(name);
        close_quietly(&parent);
        r.map_err(Errno::from)
    }

    /// Submit a two-path operation to the directory both paths share:
    /// the root when both are absolute, the cwd when both are relative.
    /// A mixed pair is unsupported.
    fn two_path_op(
        &self,
        old: &str,
        new: &str,
        op: impl FnOnce(&dyn crate::io::Transport) -> Result<(), Status>,
    ) -> Result<(), Errno> {
        if old.len() >= PATH_MAX || new.len() >= PATH_MAX {
            return Err(Errno::EINVAL);
        }
        let io = match (old.starts_with('/'), new.starts_with('/')) {
            (true, true) => self.root().ok_or(Errno::EBADF)?,
            (false, false) => self.cwd_handle().ok_or(Errno::EBADF)?,
            _ => return Err(Errno::ENOTSUP),
        };
        op(io.ops()).map_err(Errno::from)
    }

    /// `rename(2)`.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), Errno> {
        self.two_path_op(old, new, |t| t.rename(old, new))
    }

    /// `link(2)`.
    pub fn link(&self, old: &str, new: &str) -> Result<(), Errno> {
        self.two_path_op(old, new, |t| t.link(old, new))
    }

    /// `fsync(2)`.
    pub fn fsync(&self, fd: i32) -> Result<(), Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().sync().map_err(Errno::from)
    }

    /// `fdatasync(2)`. Data-only sync could skip metadata in some
    /// cases; for now it is functionally `fsync`, just a little slower
    /// than it needs to be.
    pub fn fdatasync(&self, fd: i32) -> Result<(), Errno> {
        self.fsync(fd)
    }

    fn utimens_io(&self, io: &IoRef, times: Option<[TimeSpec; 2]>) -> Result<(), Status> {
        let modify_time = match times {
            None => self.kernel.time_get(Clock::Utc),
            Some(t) if t[1].nsec == UTIME_NOW => self.kernel.time_get(Clock::Utc),
            Some(t) => (t[1].sec as u64)
                .wrapping_mul(SEC)
                .wrapping_add(t[1].nsec as u64),
        };
        let mut valid = AttrFlags::empty();
        if times.map_or(true, |t| t[1].nsec != UTIME_OMIT) {
            valid |= AttrFlags::MTIME;
        }
        // Access time is not updated.
        io.ops().setattr(&SetAttr { valid, modify_time })
    }

    /// `utimensat(2)`. `AT_SYMLINK_NOFOLLOW` is not honored and is
    /// rejected.
    pub fn utimensat(
        &self,
        dirfd: i32,
        path: &str,
        times: Option<[TimeSpec; 2]>,
        flags: AtFlags,
    ) -> Result<(), Errno> {
        if flags.contains(AtFlags::SYMLINK_NOFOLLOW) {
            return Err(Errno::EINVAL);
        }
        let io = self
            .open_at_io(dirfd, path, OFlags::empty(), Mode::empty())
            .map_err(Errno::from)?;
        let r = self.utimens_io(&io, times);
        close_quietly(&io);
        r.map_err(Errno::from)
    }

    /// `utimens`: the cwd-relative spelling of [`IoState::utimensat`].
    pub fn utimens(&self, path: &str, times: Option<[TimeSpec; 2]>) -> Result<(), Errno> {
        self.utimensat(AT_FDCWD, path, times, AtFlags::empty())
    }

    /// `futimens(2)`.
    pub fn futimens(&self, fd: i32, times: Option<[TimeSpec; 2]>) -> Result<(), Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        self.utimens_io(&io, times).map_err(Errno::from)
    }

    /// `pipe2(2)`. Only `O_NONBLOCK` and `O_CLOEXEC` are accepted.
    pub fn pipe2(&self, flags: OFlags) -> Result<[i32; 2], Errno> {
        if !(flags - (OFlags::NONBLOCK | OFlags::CLOEXEC)).is_empty() {
            return Err(Errno::EINVAL);
        }
        let (read, write) = self.factory.pipe_pair().map_err(Errno::from)?;
        if flags.contains(OFlags::NONBLOCK) {
            read.set_nonblock(true);
            write.set_nonblock(true);
        }
        let fd0 = match self.bind(read.clone(), -1, 0) {
            Ok(fd) => fd,
            Err(err) => {
                close_quietly(&read);
                close_quietly(&write);
                return Err(err);
            }
        };
        let fd1 = match self.bind(write.clone(), -1, 0) {
            Ok(fd) => fd,
            Err(err) => {
                let _ = self.close(fd0);
                close_quietly(&write);
                return Err(err);
            }
        };
        Ok([fd0, fd1])
    }

    /// `pipe(2)`.
    pub fn pipe(&self) -> Result<[i32; 2], Errno> {
        self.pipe2(OFlags::empty())
    }

    /// `faccessat(2)`. Permissions are not modeled yet, so existence
    /// stands in for every mode including `F_OK` (the empty `amode`).
    pub fn faccessat(
        &self,
        dirfd: i32,
        path: &str,
        _amode: Access,
        flags: AtFlags,
    ) -> Result<(), Errno> {
        if !(flags - AtFlags::EACCESS).is_empty() {
            return Err(Errno::EINVAL);
        }
        let io = self
            .open_at_io(dirfd, path, OFlags::empty(), Mode::empty())
            .map_err(Errno::from)?;
        let r = io.ops().stat();
        close_quietly(&io);
        r.map(|_| ()).map_err(Errno::from)
    }

    /// `getcwd(3)`: copy the normalized cwd path (plus terminator) into
    /// `buf`. An empty buffer is invalid; a buffer too small for the
    /// path fails `ERANGE`.
    pub fn getcwd<'a>(&self, buf: &'a mut [u8]) -> Result<&'a str, Errno> {
        if buf.is_empty() {
            return Err(Errno::EINVAL);
        }
        let cwd = self.cwd.lock();
        let path = cwd.path.as_bytes();
        if path.len() + 1 > buf.len() {
            return Err(Errno::ERANGE);
        }
        buf[..path.len()].copy_from_slice(path);
        buf[path.len()] = 0;
        core::str::from_utf8(&buf[..path.len()]).map_err(|_| Errno::EINVAL)
    }

    /// `chdir(2)`: open the new directory, then swap it in together
    /// with the textual path update. The displaced cwd transport is
    /// closed only after both locks are released.
    pub fn chdir(&self, path: &str) -> Result<(), Errno> {
        let io = self
            .open_at_io(AT_FDCWD, path, OFlags::DIRECTORY, Mode::empty())
            .map_err(Errno::from)?;
        let old = {
            let mut cwd = self.cwd.lock();
            crate::cwd::update_cwd_path(&mut cwd.path, path);
            cwd.handle.replace(io)
        };
        if let Some(old) = old {
            close_quietly(&old);
        }
        Ok(())
    }

    /// `isatty(3)`. Stdio needs to be a tty for line buffering to work,
    /// so fds 0/1/2 claim to be ttys and nothing else does.
    pub fn isatty(&self, fd: i32) -> Result<bool, Errno> {
        let _io = self.get(fd).ok_or(Errno::EBADF)?;
        if (0..=2).contains(&fd) {
            Ok(true)
        } else {
            Err(Errno::ENOTTY)
        }
    }

    /// `umask(2)`: store the new mask, return the previous one. The
    /// mask is tracked but not yet applied (permission checks are a
    /// non-goal).
    pub fn umask(&self, mask: Mode) -> Mode {
        let mut tab = self.fdtab.lock();
        let old = tab.umask;
        tab.umask = mask & Mode::PERM_MASK;
        old
    }

    /// Device-level control operation on a descriptor.
    pub fn ioctl(
        &self,
        fd: i32,
        op: u32,
        in_buf: &[u8],
        out_buf: &mut [u8],
    ) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().ioctl(op, in_buf, out_buf).map_err(Errno::from)
    }

    /// `ioctl(2)`, with the caller's argument marshalled into `arg`.
    pub fn posix_ioctl(&self, fd: i32, req: u32, arg: &mut [u8]) -> Result<usize, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().posix_ioctl(req, arg).map_err(Errno::from)
    }

    /// Wrap a bare kernel handle in a waitable descriptor, with
    /// `readable`/`writable` naming the signals that stand for
    /// `POLLIN`/`POLLOUT`. A `shared` handle is left open on close.
    pub fn handle_fd(
        &self,
        handle: Handle,
        readable: Signals,
        writable: Signals,
        shared: bool,
    ) -> Result<i32, Errno> {
        let io = Io::new(WaitableTransport::new(
            self.kernel,
            handle,
            readable,
            writable,
            shared,
        ));
        match self.bind(io.clone(), -1, 0) {
            Ok(fd) => Ok(fd),
            Err(err) => {
                close_quietly(&io);
                Err(err)
            }
        }
    }

    /// Clone the handles behind `fd` for transfer to another process,
    /// tagging each info word with the fd it should land on over there.
    /// The descriptor stays usable here.
    pub fn clone_fd(&self, fd: i32, newfd: i32) -> Result<Vec<(Handle, HandleInfo)>, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        let mut handles = io.ops().clone_handles().map_err(Errno::from)?;
        for (_, info) in &mut handles {
            *info = info.with_arg(newfd as u16);
        }
        Ok(handles)
    }

    /// Move the handles behind `fd` out for transfer, destroying the
    /// local descriptor. Fails `EBUSY` while the descriptor is dup'd or
    /// in use.
    pub fn transfer_fd(&self, fd: i32, newfd: i32) -> Result<Vec<(Handle, HandleInfo)>, Errno> {
        let io = self.unbind(fd)?;
        let mut handles = io.ops().unwrap_handles().map_err(Errno::from)?;
        for (_, info) in &mut handles {
            *info = info.with_arg(newfd as u16);
        }
        Ok(handles)
    }

    /// Clone the root transport's handles, tagged for a child's startup
    /// table.
    pub fn clone_root(&self) -> Result<Vec<(Handle, HandleInfo)>, Errno> {
        let root = self.root().ok_or(Errno::EBADF)?;
        let mut handles = root.ops().clone_handles().map_err(Errno::from)?;
        for (_, info) in &mut handles {
            *info = info.with_type(HandleType::Root);
        }
        Ok(handles)
    }

    /// Clone the cwd transport's handles, tagged for a child's startup
    /// table.
    pub fn clone_cwd(&self) -> Result<Vec<(Handle, HandleInfo)>, Errno> {
        let cwd = self.cwd_handle().ok_or(Errno::EBADF)?;
        let mut handles = cwd.ops().clone_handles().map_err(Errno::from)?;
        for (_, info) in &mut handles {
            *info = info.with_type(HandleType::Cwd);
        }
        Ok(handles)
    }

    /// The memory object backing `fd`, if its transport has one.
    pub fn get_vmo(&self, fd: i32) -> Result<VmoRegion, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        io.ops().get_vmo().map_err(Errno::from)
    }
}
