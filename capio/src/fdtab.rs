//! The process-wide fd table: a fixed array of optional transport
//! references plus the dup-count discipline that governs shared
//! ownership.
//!
//! Everything here runs under the table mutex held by [`crate::IoState`].
//! The one rule that shapes every signature: a transport's `close` is
//! never invoked while the lock is held, so any operation that displaces
//! an entry hands the displaced reference back to the caller to close
//! after unlocking.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use capio_kernel::Status;

use crate::errno::Errno;
use crate::io::{IoRef, Mode};

/// Size of the fd table; fds at or above this fail with `EINVAL`.
pub const MAX_FD: usize = 1024;

pub(crate) struct FdTable {
    entries: Vec<Option<IoRef>>,
    /// The root transport, against which absolute paths resolve.
    pub(crate) root: Option<IoRef>,
    /// Process file-creation mask; stored, not yet applied (permission
    /// checks are a non-goal).
    pub(crate) umask: Mode,
}

impl FdTable {
    pub(crate) fn new() -> Self {
        FdTable {
            entries: vec![None; MAX_FD],
            root: None,
            umask: Mode::empty(),
        }
    }

    /// Attach `io` to a slot, incrementing its dupcount.
    ///
    /// A negative `fd` means "first free slot at or above `starting_fd`"
    /// (`EMFILE` when none). An explicit `fd` silently displaces any
    /// previous occupant: its dupcount is decremented, and if that was
    /// its last slot the displaced reference is returned so the caller
    /// can close it once the table lock is released.
    pub(crate) fn bind(
        &mut self,
        io: IoRef,
        fd: i32,
        starting_fd: i32,
    ) -> Result<(i32, Option<IoRef>), Errno> {
        let mut displaced = None;
        let slot = if fd < 0 {
            let start = starting_fd.max(0) as usize;
            match (start..MAX_FD).find(|&i| self.entries[i].is_none()) {
                Some(slot) => slot,
                None => return Err(Errno::EMFILE),
            }
        } else {
            let slot = fd as usize;
            if slot >= MAX_FD {
                return Err(Errno::EINVAL);
            }
            if let Some(old) = self.entries[slot].take() {
                if old.dup_dec() == 0 {
                    displaced = Some(old);
                }
                // else: still alive in another slot; we only dropped our
                // share.
            }
            slot
        };
        io.dup_inc();
        self.entries[slot] = Some(io);
        Ok((slot as i32, displaced))
    }

    /// Detach the transport at `fd` and return it holding a single
    /// reference.
    ///
    /// Fails `Unavailable` if the transport is aliased by another slot
    /// (`dupcount > 1`) or an operation is in flight on it
    /// (`refcount > 1`).
    pub(crate) fn unbind(&mut self, fd: i32) -> Result<IoRef, Status> {
        let slot = usize::try_from(fd).map_err(|_| Status::InvalidArgs)?;
        if slot >= MAX_FD {
            return Err(Status::InvalidArgs);
        }
        let Some(io) = self.entries[slot].take() else {
            return Err(Status::InvalidArgs);
        };
        // The share we just took out of the slot is the 1; anything above
        // it is an in-flight caller.
        if io.dupcount() > 1 || Arc::strong_count(&io) > 1 {
            self.entries[slot] = Some(io);
            return Err(Status::Unavailable);
        }
        io.dup_clear();
        Ok(io)
    }

    /// Remove and return the entry at `fd` with no dupcount adjustment;
    /// `close(2)` does its own accounting.
    pub(crate) fn take(&mut self, fd: i32) -> Option<IoRef> {
        let slot = usize::try_from(fd).ok()?;
        self.entries.get_mut(slot)?.take()
    }

    /// Acquire a reference to the transport at `fd`.
    pub(crate) fn get(&self, fd: i32) -> Option<IoRef> {
        let slot = usize::try_from(fd).ok()?;
        self.entries.get(slot)?.clone()
    }

    /// Detach every slot for process exit, returning the transports
    /// whose dupcount fell to zero so the caller can close them outside
    /// the lock.
    pub(crate) fn drain(&mut self) -> Vec<IoRef> {
        let mut to_close = Vec::new();
        for entry in &mut self.entries {
            if let Some(io) = entry.take() {
                if io.dup_dec() == 0 {
                    to_close.push(io);
                }
            }
        }
        to_close
    }
}
