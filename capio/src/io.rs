//! The transport contract: the polymorphic operation set every I/O object
//! implements, and the refcounted [`Io`] header the fd table stores.
//!
//! A *transport* is an I/O endpoint — a remote filesystem object, a pipe
//! end, a logger sink, a null sink, a wrapped waitable handle. The core
//! never knows which: every POSIX call is lowered onto the [`Transport`]
//! trait, whose default methods report [`Status::NotSupported`] so each
//! concrete transport implements only what it can honor.
//!
//! [`Status::ShouldWait`] is the sole "retry later" signal a transport may
//! return from `read`/`write`; every other error is terminal for the call.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering::Relaxed};

use capio_kernel::{Handle, HandleInfo, Signals, Status, Time};

use crate::events::Events;

bitflags::bitflags! {
    /// Open flags recognized by the layer.
    ///
    /// The access mode is encoded so that `RDWR == RDONLY | WRONLY`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct OFlags: u32 {
        const RDONLY    = 1 << 0;
        const WRONLY    = 1 << 1;
        const RDWR      = (1 << 0) | (1 << 1);
        const CREAT     = 1 << 4;
        const EXCL      = 1 << 5;
        const TRUNC     = 1 << 6;
        const DIRECTORY = 1 << 7;
        const NONBLOCK  = 1 << 8;
        const CLOEXEC   = 1 << 9;

        const ACCMODE = Self::RDWR.bits();
    }
}

bitflags::bitflags! {
    /// File mode bits: the classic permission triplets plus the directory
    /// type bit used by `mkdirat`'s create-exclusive open.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Mode: u32 {
        const XOTH = 0o001;
        const WOTH = 0o002;
        const ROTH = 0o004;
        const XGRP = 0o010;
        const WGRP = 0o020;
        const RGRP = 0o040;
        const XUSR = 0o100;
        const WUSR = 0o200;
        const RUSR = 0o400;

        const RWXO = 0o007;
        const RWXG = 0o070;
        const RWXU = 0o700;

        const DIR = 0o040000;

        /// The permission bits a caller may actually set.
        const PERM_MASK = 0o777;
    }
}

/// Seek origin for [`Transport::seek`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Whence {
    Set,
    Current,
    End,
}

/// Node attributes reported by [`Transport::stat`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct NodeAttr {
    pub mode: u32,
    pub inode: u64,
    pub size: u64,
    pub nlink: u64,
    /// Creation time, nanoseconds since the epoch.
    pub create_time: Time,
    /// Modification time, nanoseconds since the epoch.
    pub modify_time: Time,
}

bitflags::bitflags! {
    /// Which [`SetAttr`] fields carry a value.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AttrFlags: u32 {
        const MTIME = 1 << 0;
    }
}

/// Attribute update submitted by [`Transport::setattr`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SetAttr {
    pub valid: AttrFlags,
    pub modify_time: Time,
}

/// Cursor directive for [`Transport::readdir`].
///
/// `Reset` asks the directory to restart iteration from the first entry
/// before filling the buffer; `Next` continues from the previous call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReadDirCmd {
    Next,
    Reset,
}

/// A memory object backing a transport, for mapping.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VmoRegion {
    pub handle: Handle,
    pub offset: u64,
    pub len: u64,
}

/// The operation set of an I/O endpoint.
///
/// `read`/`write` are the non-blocking stream operations; the blocking
/// POSIX semantics on top of them are synthesized by the caller (retry
/// after a handle wait whenever [`Status::ShouldWait`] comes back and the
/// descriptor is not `O_NONBLOCK`).
///
/// `wait_begin`/`wait_end` form a two-phase handshake: `wait_begin`
/// translates requested POSIX events into a kernel handle plus the signal
/// mask equivalent to them, and `wait_end` maps observed signals back to
/// events once the wait completes. `wait_end` must be called iff
/// `wait_begin` returned a target, exactly once, with the same transport
/// reference alive across the pair.
#[allow(unused_variables)]
pub trait Transport: Send + Sync {
    /// Non-blocking stream read.
    fn read(&self, buf: &mut [u8]) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Non-blocking stream write.
    fn write(&self, buf: &[u8]) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Positional read; does not move the stream cursor.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Positional write; does not move the stream cursor.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Reposition the stream cursor, returning the new position.
    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, Status> {
        Err(Status::NotSupported)
    }

    /// Open `path` relative to this transport. Directory-like transports
    /// only.
    fn open(&self, path: &str, flags: OFlags, mode: Mode) -> Result<IoRef, Status> {
        Err(Status::NotSupported)
    }

    /// Produce handles representing this transport for transfer to
    /// another process. The transport remains usable.
    fn clone_handles(&self) -> Result<Vec<(Handle, HandleInfo)>, Status> {
        Err(Status::NotSupported)
    }

    /// Like [`Transport::clone_handles`], but hands out the transport's
    /// own handles; the transport must not be used afterwards.
    fn unwrap_handles(&self) -> Result<Vec<(Handle, HandleInfo)>, Status> {
        Err(Status::NotSupported)
    }

    /// Release the backing resource. Idempotent.
    fn close(&self) -> Result<(), Status> {
        Ok(())
    }

    /// Node attributes.
    fn stat(&self) -> Result<NodeAttr, Status> {
        Err(Status::NotSupported)
    }

    /// Update node attributes.
    fn setattr(&self, attr: &SetAttr) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Fill `buf` with packed directory records (see [`crate::dir`]),
    /// returning the number of bytes written; zero means end of
    /// directory.
    fn readdir(&self, cmd: ReadDirCmd, buf: &mut [u8]) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Truncate to `len` bytes.
    fn truncate(&self, len: u64) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Remove the entry `name` within this directory transport.
    fn unlink(&self, name: &str) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Rename `old` to `new`, both interpreted relative to this
    /// transport.
    fn rename(&self, old: &str, new: &str) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Link `old` to `new`, both interpreted relative to this transport.
    fn link(&self, old: &str, new: &str) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Flush pending writes to durable storage.
    fn sync(&self) -> Result<(), Status> {
        Err(Status::NotSupported)
    }

    /// Device-level control operation.
    fn ioctl(&self, op: u32, in_buf: &[u8], out_buf: &mut [u8]) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// POSIX `ioctl(2)` request, with the caller's argument marshalled
    /// into `arg`.
    fn posix_ioctl(&self, req: u32, arg: &mut [u8]) -> Result<usize, Status> {
        Err(Status::NotSupported)
    }

    /// Translate requested events into a waitable kernel handle and the
    /// equivalent signal mask. `None` means the transport cannot be
    /// waited on.
    fn wait_begin(&self, events: Events) -> Option<(Handle, Signals)> {
        None
    }

    /// Translate observed signals back into POSIX events.
    fn wait_end(&self, pending: Signals) -> Events {
        Events::empty()
    }

    /// The memory object backing this transport, if it has one.
    fn get_vmo(&self) -> Result<VmoRegion, Status> {
        Err(Status::NotSupported)
    }
}

bitflags::bitflags! {
    /// Per-descriptor flag word carried in the [`Io`] header.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct IoFlags: u32 {
        /// The descriptor-flag field visible to `F_GETFD`/`F_SETFD`.
        const CLOEXEC = 1 << 0;
        /// Reads and writes surface `EAGAIN` instead of blocking.
        const NONBLOCK = 1 << 4;

        const FD_FLAGS = Self::CLOEXEC.bits();
    }
}

/// The refcounted header in front of every transport.
///
/// The *refcount* is the [`Arc`] strong count: one share per fd-table
/// slot plus one per in-flight caller. The *dupcount* counts fd-table
/// slots only, is mutated exclusively under the fd-table lock, and never
/// exceeds the refcount — which is what lets the release path stay
/// lock-free while `unbind` can still detect both aliasing and in-flight
/// use.
pub struct Io {
    ops: Box<dyn Transport>,
    flags: AtomicU32,
    dupcount: AtomicU32,
}

/// A shared reference to an [`Io`]; holding one keeps the transport
/// alive.
pub type IoRef = Arc<Io>;

impl Io {
    pub fn new(ops: impl Transport + 'static) -> IoRef {
        Arc::new(Io {
            ops: Box::new(ops),
            flags: AtomicU32::new(0),
            dupcount: AtomicU32::new(0),
        })
    }

    /// The transport operation set.
    #[must_use]
    pub fn ops(&self) -> &dyn Transport {
        &*self.ops
    }

    #[must_use]
    pub fn flags(&self) -> IoFlags {
        IoFlags::from_bits_retain(self.flags.load(Relaxed))
    }

    #[must_use]
    pub fn is_nonblock(&self) -> bool {
        self.flags().contains(IoFlags::NONBLOCK)
    }

    pub fn set_nonblock(&self, on: bool) {
        if on {
            self.flags.fetch_or(IoFlags::NONBLOCK.bits(), Relaxed);
        } else {
            self.flags.fetch_and(!IoFlags::NONBLOCK.bits(), Relaxed);
        }
    }

    /// The descriptor-flag field (`F_GETFD`).
    #[must_use]
    pub fn fd_flags(&self) -> IoFlags {
        self.flags() & IoFlags::FD_FLAGS
    }

    /// Replace the descriptor-flag field (`F_SETFD`); other bits are
    /// untouched.
    pub fn set_fd_flags(&self, flags: IoFlags) {
        let new = (flags & IoFlags::FD_FLAGS).bits();
        let mut cur = self.flags.load(Relaxed);
        loop {
            let next = (cur & !IoFlags::FD_FLAGS.bits()) | new;
            match self.flags.compare_exchange_weak(cur, next, Relaxed, Relaxed) {
                Ok(_) => return,
                Err(observed) => cur = observed,
            }
        }
    }

    /// Two-phase wait handshake, re-exported for message-loop
    /// integration.
    #[must_use]
    pub fn wait_begin(&self, events: Events) -> Option<(Handle, Signals)> {
        self.ops.wait_begin(events)
    }

    /// The other half of [`Io::wait_begin`].
    #[must_use]
    pub fn wait_end(&self, pending: Signals) -> Events {
        self.ops.wait_end(pending)
    }

    /// Fd-table slots referring to this transport. Meaningful only under
    /// the fd-table lock; elsewhere it is advisory.
    #[must_use]
    pub fn dupcount(&self) -> u32 {
        self.dupcount.load(Relaxed)
    }

    // The dupcount is logically guarded by the fd-table lock; these are
    // called only while it is held.
    pub(crate) fn dup_inc(&self) {
        self.dupcount.fetch_add(1, Relaxed);
    }

    pub(crate) fn dup_dec(&self) -> u32 {
        let prev = self.dupcount.fetch_sub(1, Relaxed);
        debug_assert!(prev > 0);
        prev - 1
    }

    pub(crate) fn dup_clear(&self) {
        self.dupcount.store(0, Relaxed);
    }
}

impl core::fmt::Debug for Io {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Io")
            .field("flags", &self.flags())
            .field("dupcount", &self.dupcount())
            .finish_non_exhaustive()
    }
}
