//! The process-wide I/O state: the fd table, the cwd, and the kernel and
//! transport-factory references everything else is reached through.

use spin::Mutex;

use capio_kernel::Kernel;

use crate::cwd::CwdState;
use crate::errno::Errno;
use crate::fdtab::FdTable;
use crate::io::IoRef;
use crate::transports::TransportFactory;

/// All process-wide state of the I/O layer.
///
/// One instance exists per process, installed by [`crate::startup`]; it
/// is a plain struct (rather than free functions over hidden statics) so
/// tests can run many independent instances against mock kernels.
///
/// Lock order: the cwd mutex may be taken outside the fd-table mutex,
/// never the reverse. Neither lock is ever held across a transport
/// operation; displaced transports are closed only after unlocking.
pub struct IoState {
    pub(crate) kernel: &'static dyn Kernel,
    pub(crate) factory: &'static dyn TransportFactory,
    pub(crate) fdtab: Mutex<FdTable>,
    pub(crate) cwd: Mutex<CwdState>,
}

impl IoState {
    /// An empty state: no descriptors, no root, cwd path `/` with no
    /// transport. [`crate::startup`] populates it from the loader handle
    /// table.
    #[must_use]
    pub fn new(kernel: &'static dyn Kernel, factory: &'static dyn TransportFactory) -> Self {
        IoState {
            kernel,
            factory,
            fdtab: Mutex::new(FdTable::new()),
            cwd: Mutex::new(CwdState::new()),
        }
    }

    /// The kernel this state talks to.
    #[must_use]
    pub fn kernel(&self) -> &'static dyn Kernel {
        self.kernel
    }

    /// Acquire a reference to the transport at `fd`, for message-loop
    /// integration around [`crate::Io::wait_begin`]/[`crate::Io::wait_end`].
    /// Dropping the reference releases it.
    #[must_use]
    pub fn fd_to_io(&self, fd: i32) -> Option<IoRef> {
        self.fdtab.lock().get(fd)
    }

    pub(crate) fn get(&self, fd: i32) -> Option<IoRef> {
        self.fd_to_io(fd)
    }

    /// Attach `io` to an fd slot (the first free one at or above
    /// `starting_fd` when `fd` is negative). A displaced previous
    /// occupant is closed here, after the table lock is gone.
    pub fn bind(&self, io: IoRef, fd: i32, starting_fd: i32) -> Result<i32, Errno> {
        let (fd, displaced) = self.fdtab.lock().bind(io, fd, starting_fd)?;
        if let Some(old) = displaced {
            close_quietly(&old);
        }
        Ok(fd)
    }

    /// Detach the transport at `fd` without closing it, returning it
    /// with a single reference. Fails `EBUSY` while the transport is
    /// dup'd into another slot or an operation is in flight on it.
    pub fn unbind(&self, fd: i32) -> Result<IoRef, Errno> {
        self.fdtab.lock().unbind(fd).map_err(Errno::from)
    }

    /// `close(2)`.
    pub fn close(&self, fd: i32) -> Result<(), Errno> {
        let to_close = {
            let mut tab = self.fdtab.lock();
            let Some(io) = tab.take(fd) else {
                return Err(Errno::EBADF);
            };
            if io.dup_dec() > 0 {
                // Still alive in another fdtab slot.
                None
            } else {
                Some(io)
            }
        };
        match to_close {
            None => Ok(()),
            Some(io) => io.ops().close().map_err(Errno::from),
        }
    }

    /// Process-exit drain: every slot is detached, and each transport
    /// whose last slot went away is closed.
    pub fn exit(&self) {
        let to_close = self.fdtab.lock().drain();
        log::debug!("exit drain: closing {} transport(s)", to_close.len());
        for io in to_close {
            close_quietly(&io);
        }
    }

    /// Install (or replace) the root transport all absolute paths
    /// resolve against. A displaced root is closed after the lock is
    /// released.
    pub fn install_root(&self, io: IoRef) {
        let old = {
            let mut tab = self.fdtab.lock();
            tab.root.replace(io)
        };
        if let Some(old) = old {
            close_quietly(&old);
        }
    }

    pub(crate) fn root(&self) -> Option<IoRef> {
        self.fdtab.lock().root.clone()
    }

    pub(crate) fn cwd_handle(&self) -> Option<IoRef> {
        self.cwd.lock().handle.clone()
    }
}

/// Close a transport whose result nobody can act on (teardown paths,
/// displaced entries, temporaries opened for a single operation).
pub(crate) fn close_quietly(io: &IoRef) {
    if let Err(err) = io.ops().close() {
        log::debug!("transport close failed: {err}");
    }
}
