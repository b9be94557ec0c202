//! A transport wrapping a bare kernel handle so that `poll`/`select` can
//! observe it; see [`crate::IoState::handle_fd`].

use core::sync::atomic::{AtomicBool, Ordering};

use capio_kernel::{Handle, Kernel, Signals, Status};

use crate::events::Events;
use crate::io::Transport;

/// A bare handle with caller-chosen signal mappings.
///
/// `readable` and `writable` are the signal masks that stand for
/// `POLLIN` and `POLLOUT` on this handle. A `shared` wrapper does not own
/// its handle and leaves it open on close.
pub struct WaitableTransport {
    kernel: &'static dyn Kernel,
    handle: Handle,
    readable: Signals,
    writable: Signals,
    shared: bool,
    closed: AtomicBool,
}

impl WaitableTransport {
    #[must_use]
    pub fn new(
        kernel: &'static dyn Kernel,
        handle: Handle,
        readable: Signals,
        writable: Signals,
        shared: bool,
    ) -> Self {
        WaitableTransport {
            kernel,
            handle,
            readable,
            writable,
            shared,
            closed: AtomicBool::new(false),
        }
    }
}

impl Transport for WaitableTransport {
    fn close(&self) -> Result<(), Status> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.shared {
            Ok(())
        } else {
            self.kernel.handle_close(self.handle)
        }
    }

    fn wait_begin(&self, events: Events) -> Option<(Handle, Signals)> {
        let mut signals = Signals::empty();
        if events.contains(Events::IN) {
            signals |= self.readable;
        }
        if events.contains(Events::OUT) {
            signals |= self.writable;
        }
        Some((self.handle, signals))
    }

    fn wait_end(&self, pending: Signals) -> Events {
        let mut events = Events::empty();
        if pending.intersects(self.readable) {
            events |= Events::IN;
        }
        if pending.intersects(self.writable) {
            events |= Events::OUT;
        }
        events
    }
}
