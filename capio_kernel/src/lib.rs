//! # capio kernel ABI
//!
//! The downward interface of the capio I/O layer: kernel-object handles,
//! signal bitsets, the kernel status taxonomy, and the [`Kernel`] trait
//! through which the core invokes the handle-wait syscalls.
//!
//! capio itself never issues a syscall directly; everything it needs from
//! the kernel is reachable through a `&'static dyn Kernel`. This keeps the
//! core testable against the in-process [`mock`] kernel and portable across
//! kernel bindings.

#![no_std]

use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

/// An opaque kernel-object identifier.
///
/// Handles are owned by whoever received them (for capio, usually a
/// transport); ownership is released with [`Kernel::handle_close`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The reserved never-valid handle value.
    pub const INVALID: Handle = Handle(0);

    /// Wrap a raw handle value received from the process loader.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

bitflags::bitflags! {
    /// Kernel-level readiness conditions observable on a handle.
    ///
    /// Transports translate POSIX poll events to and from these in their
    /// `wait_begin`/`wait_end` pair; the kernel wait syscalls speak only
    /// signals.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Signals: u32 {
        const READABLE    = 1 << 0;
        const WRITABLE    = 1 << 1;
        const PEER_CLOSED = 1 << 2;
        const SIGNALED    = 1 << 3;

        /// User signals, free for per-object protocols.
        const USER0 = 1 << 24;
        const USER1 = 1 << 25;
        const USER2 = 1 << 26;
        const USER3 = 1 << 27;

        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

/// The kernel error taxonomy.
///
/// Every kernel-facing operation in capio reports one of these; the core
/// translates them to POSIX errno values at its API boundary.
/// [`Status::ShouldWait`] is special: it is the sole "retry later" signal,
/// handled locally by the blocking-emulation loops rather than surfaced.
#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum Status {
    #[error("object not found")]
    NotFound,
    #[error("out of memory")]
    NoMemory,
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("operation timed out")]
    TimedOut,
    #[error("object already exists")]
    AlreadyExists,
    #[error("remote side closed")]
    RemoteClosed,
    #[error("malformed path")]
    BadPath,
    #[error("i/o failure")]
    Io,
    #[error("not a directory")]
    NotDir,
    #[error("operation not supported")]
    NotSupported,
    #[error("value out of range")]
    OutOfRange,
    #[error("no resources")]
    NoResources,
    #[error("bad handle")]
    BadHandle,
    #[error("access denied")]
    AccessDenied,
    #[error("object unavailable")]
    Unavailable,
    #[error("operation should be retried once the object is ready")]
    ShouldWait,
    #[error("file too big")]
    FileBig,
    #[error("no space on device")]
    NoSpace,
}

/// Kernel time, in nanoseconds.
pub type Time = u64;

/// A relative timeout meaning "wait forever".
pub const TIME_INFINITE: Time = Time::MAX;

/// Nanoseconds per millisecond, for the POSIX-facing timeout conversions.
pub const MSEC: Time = 1_000_000;

/// Nanoseconds per second.
pub const SEC: Time = 1_000_000_000;

/// Clock selector for [`Kernel::time_get`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Clock {
    Monotonic,
    Utc,
}

/// One element of an [`Kernel::object_wait_many`] call.
///
/// `waitfor` is filled by the caller; `pending` is written by the kernel
/// with the observed signal state, on success *and* on timeout.
#[derive(Clone, Copy, Debug)]
pub struct WaitItem {
    pub handle: Handle,
    pub waitfor: Signals,
    pub pending: Signals,
}

impl WaitItem {
    #[must_use]
    pub const fn new(handle: Handle, waitfor: Signals) -> Self {
        WaitItem {
            handle,
            waitfor,
            pending: Signals::empty(),
        }
    }
}

/// The kernel-object syscalls consumed by the I/O layer.
///
/// Implementations must be callable from any thread. The trait is
/// object-safe on purpose: the process-wide I/O state stores a
/// `&'static dyn Kernel`.
pub trait Kernel: Send + Sync {
    /// Block until any signal in `signals` is asserted on `handle`, or
    /// `timeout` (relative, nanoseconds) elapses.
    ///
    /// Returns the observed signal state. Timeout is reported as
    /// [`Status::TimedOut`].
    fn object_wait_one(
        &self,
        handle: Handle,
        signals: Signals,
        timeout: Time,
    ) -> Result<Signals, Status>;

    /// Block until any item's `waitfor` signals are asserted, or `timeout`
    /// elapses.
    ///
    /// Each item's `pending` field is written with the observed state even
    /// when the call times out; callers are expected to inspect pending
    /// signals in the [`Status::TimedOut`] case as well.
    fn object_wait_many(&self, items: &mut [WaitItem], timeout: Time) -> Result<(), Status>;

    /// Release a handle.
    fn handle_close(&self, handle: Handle) -> Result<(), Status>;

    /// Read the given clock, in nanoseconds.
    fn time_get(&self, clock: Clock) -> Time;
}

/// Startup handle-info word: a type tag plus a 16-bit argument.
///
/// The process loader hands every new process a table of
/// `(handle, info-word)` pairs; the arg carries an fd number for
/// pre-opened descriptors, with [`HandleInfo::USE_FOR_STDIO`] marking the
/// descriptor that should also be cloned onto stdin/stdout/stderr.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct HandleInfo(u32);

/// Transport kind named by a startup info word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandleType {
    Root,
    Cwd,
    Remote,
    Pipe,
    Logger,
}

impl HandleInfo {
    /// Flag within the arg field: also dup this fd into fds 0/1/2.
    pub const USE_FOR_STDIO: u16 = 0x8000;

    #[must_use]
    pub const fn new(ty: HandleType, arg: u16) -> Self {
        let tag = match ty {
            HandleType::Root => 1,
            HandleType::Cwd => 2,
            HandleType::Remote => 3,
            HandleType::Pipe => 4,
            HandleType::Logger => 5,
        };
        HandleInfo(tag << 16 | arg as u32)
    }

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        HandleInfo(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The type tag, or `None` for an unrecognized word (which startup
    /// leaves alone).
    #[must_use]
    pub const fn handle_type(self) -> Option<HandleType> {
        match self.0 >> 16 {
            1 => Some(HandleType::Root),
            2 => Some(HandleType::Cwd),
            3 => Some(HandleType::Remote),
            4 => Some(HandleType::Pipe),
            5 => Some(HandleType::Logger),
            _ => None,
        }
    }

    /// The 16-bit argument, including the stdio flag.
    #[must_use]
    pub const fn arg(self) -> u16 {
        self.0 as u16
    }

    /// The same word with the arg field replaced; used when tagging
    /// cloned handles with the fd they should land on in the receiving
    /// process.
    #[must_use]
    pub const fn with_arg(self, arg: u16) -> Self {
        HandleInfo(self.0 & 0xffff_0000 | arg as u32)
    }

    /// The same word with the type tag replaced.
    #[must_use]
    pub const fn with_type(self, ty: HandleType) -> Self {
        HandleInfo::new(ty, self.arg())
    }
}
