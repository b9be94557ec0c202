//! The multiplexed wait primitives: per-fd [`IoState::wait_fd`],
//! [`IoState::poll`], and [`IoState::select`].
//!
//! All three are built the same way: each transport's `wait_begin`
//! translates the requested POSIX events into a kernel handle plus
//! signal mask, one kernel wait observes them all, and `wait_end` maps
//! the observed signals back per transport. A timed-out wait still
//! reports pending signals, so poll and select treat `TimedOut` as
//! "ready set may be non-empty", exactly like a successful wait.
//!
//! For external message-loop integration the two-phase handshake is
//! available directly as [`crate::Io::wait_begin`]/[`crate::Io::wait_end`].

use alloc::vec::Vec;
use core::time::Duration;

use capio_kernel::{Status, Time, WaitItem, TIME_INFINITE};

use crate::errno::Errno;
use crate::events::Events;
use crate::io::IoRef;
use crate::state::IoState;

/// Bound on the number of `poll` entries, pending getrlimit support.
pub const MAX_POLL_NFDS: usize = 1024;

/// Highest fd representable in an [`FdSet`].
pub const FD_SETSIZE: usize = 1024;

const FDSET_WORDS: usize = FD_SETSIZE / usize::BITS as usize;

/// One `poll(2)` entry. A negative `fd` marks the entry ignored.
#[derive(Clone, Copy, Debug)]
pub struct PollFd {
    pub fd: i32,
    pub events: Events,
    pub revents: Events,
}

impl PollFd {
    #[must_use]
    pub fn new(fd: i32, events: Events) -> Self {
        PollFd {
            fd,
            events,
            revents: Events::empty(),
        }
    }
}

/// The `fd_set` bitset for [`IoState::select`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FdSet {
    bits: [usize; FDSET_WORDS],
}

impl FdSet {
    #[must_use]
    pub const fn new() -> Self {
        FdSet {
            bits: [0; FDSET_WORDS],
        }
    }

    fn index(fd: i32) -> Option<(usize, usize)> {
        let fd = usize::try_from(fd).ok()?;
        if fd >= FD_SETSIZE {
            return None;
        }
        Some((fd / usize::BITS as usize, fd % usize::BITS as usize))
    }

    pub fn insert(&mut self, fd: i32) {
        if let Some((word, bit)) = Self::index(fd) {
            self.bits[word] |= 1 << bit;
        }
    }

    pub fn remove(&mut self, fd: i32) {
        if let Some((word, bit)) = Self::index(fd) {
            self.bits[word] &= !(1 << bit);
        }
    }

    #[must_use]
    pub fn contains(&self, fd: i32) -> bool {
        match Self::index(fd) {
            Some((word, bit)) => self.bits[word] & (1 << bit) != 0,
            None => false,
        }
    }
}

impl Default for FdSet {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_to_time(timeout: Option<Duration>) -> Time {
    match timeout {
        None => TIME_INFINITE,
        Some(d) => {
            let nanos = d.as_nanos();
            if nanos >= u128::from(TIME_INFINITE) {
                TIME_INFINITE
            } else {
                nanos as Time
            }
        }
    }
}

impl IoState {
    /// Block until any of `events` is ready on `fd`, returning the
    /// observed events.
    ///
    /// `EINVAL` when the transport does not support waiting (its
    /// `wait_begin` produced no handle); `ETIMEDOUT` when the timeout
    /// elapses first.
    pub fn wait_fd(
        &self,
        fd: i32,
        events: Events,
        timeout: Option<Duration>,
    ) -> Result<Events, Errno> {
        let io = self.get(fd).ok_or(Errno::EBADF)?;
        let Some((handle, signals)) = io.wait_begin(events) else {
            return Err(Errno::EINVAL);
        };
        let pending = self
            .kernel
            .object_wait_one(handle, signals, timeout_to_time(timeout))
            .map_err(Errno::from)?;
        Ok(io.wait_end(pending))
    }

    /// `poll(2)`.
    ///
    /// Entries with a negative fd are left alone; an fd that is not open
    /// reports `POLLNVAL` in its `revents`. Returns the number of
    /// entries with non-empty `revents`; a timeout with nothing ready
    /// returns zero.
    pub fn poll(&self, fds: &mut [PollFd], timeout: Option<Duration>) -> Result<usize, Errno> {
        if fds.len() > MAX_POLL_NFDS {
            return Err(Errno::EINVAL);
        }

        let mut ios: Vec<Option<IoRef>> = Vec::with_capacity(fds.len());
        let mut items: Vec<WaitItem> = Vec::new();
        for pfd in fds.iter_mut() {
            pfd.revents = Events::empty();
            ios.push(None);
            if pfd.fd < 0 {
                continue;
            }
            let Some(io) = self.get(pfd.fd) else {
                pfd.revents = Events::NVAL;
                continue;
            };
            let Some((handle, signals)) = io.wait_begin(pfd.events) else {
                // wait is not applicable to this transport; every
                // acquired reference unwinds with `ios`
                return Err(Errno::EINVAL);
            };
            if let Some(slot) = ios.last_mut() {
                *slot = Some(io);
            }
            items.push(WaitItem::new(handle, signals));
        }

        let mut nfds = 0;
        if !items.is_empty() {
            match self
                .kernel
                .object_wait_many(&mut items, timeout_to_time(timeout))
            {
                // pending signals are reported on the timed-out case as
                // well
                Ok(()) | Err(Status::TimedOut) => {}
                Err(err) => return Err(err.into()),
            }
            let mut pending = items.iter();
            for (pfd, io) in fds.iter_mut().zip(&ios) {
                let Some(io) = io else { continue };
                let Some(item) = pending.next() else { break };
                let events = io.wait_end(item.pending);
                // mask unrequested events except HUP/ERR
                pfd.revents = events & (pfd.events | Events::HUP | Events::ERR);
                if !pfd.revents.is_empty() {
                    nfds += 1;
                }
            }
        }
        Ok(nfds)
    }

    /// `select(2)`: the fd_set projection of [`IoState::poll`].
    ///
    /// After the wait, each present set keeps only the bits whose events
    /// arrived; the return value counts set bits across all three.
    pub fn select(
        &self,
        nfds: usize,
        mut rfds: Option<&mut FdSet>,
        mut wfds: Option<&mut FdSet>,
        mut efds: Option<&mut FdSet>,
        timeout: Option<Duration>,
    ) -> Result<usize, Errno> {
        if nfds > FD_SETSIZE || nfds < 1 {
            return Err(Errno::EINVAL);
        }

        let mut ios: Vec<Option<IoRef>> = Vec::with_capacity(nfds);
        let mut items: Vec<WaitItem> = Vec::new();
        for fd in 0..nfds as i32 {
            ios.push(None);
            let mut events = Events::empty();
            if rfds.as_ref().is_some_and(|s| s.contains(fd)) {
                events |= Events::IN;
            }
            if wfds.as_ref().is_some_and(|s| s.contains(fd)) {
                events |= Events::OUT;
            }
            if efds.as_ref().is_some_and(|s| s.contains(fd)) {
                events |= Events::ERR;
            }
            if events.is_empty() {
                continue;
            }

            let Some(io) = self.get(fd) else {
                return Err(Errno::EBADF);
            };
            let Some((handle, signals)) = io.wait_begin(events) else {
                return Err(Errno::EINVAL);
            };
            if let Some(slot) = ios.last_mut() {
                *slot = Some(io);
            }
            items.push(WaitItem::new(handle, signals));
        }

        let mut count = 0;
        if !items.is_empty() {
            match self
                .kernel
                .object_wait_many(&mut items, timeout_to_time(timeout))
            {
                Ok(()) | Err(Status::TimedOut) => {}
                Err(err) => return Err(err.into()),
            }
            let mut pending = items.iter();
            for (fd, io) in ios.iter().enumerate() {
                let Some(io) = io else { continue };
                let Some(item) = pending.next() else { break };
                let fd = fd as i32;
                let events = io.wait_end(item.pending);
                if let Some(set) = rfds.as_deref_mut() {
                    if set.contains(fd) {
                        if events.contains(Events::IN) {
                            count += 1;
                        } else {
                            set.remove(fd);
                        }
                    }
                }
                if let Some(set) = wfds.as_deref_mut() {
                    if set.contains(fd) {
                        if events.contains(Events::OUT) {
                            count += 1;
                        } else {
                            set.remove(fd);
                        }
                    }
                }
                if let Some(set) = efds.as_deref_mut() {
                    if set.contains(fd) {
                        if events.contains(Events::ERR) {
                            count += 1;
                        } else {
                            set.remove(fd);
                        }
                    }
                }
            }
        }
        Ok(count)
    }
}
