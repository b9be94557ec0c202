//! An in-process mock kernel for tests.
//!
//! Provides event objects whose signal state tests (and mock transports)
//! drive directly, with real blocking `wait_one`/`wait_many` built on std
//! sync so the core's blocking emulation and multiplexed waiters are
//! exercised for real.

extern crate std;

use std::boxed::Box;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use hashbrown::HashMap;

use crate::{Clock, Handle, Kernel, Signals, Status, Time, WaitItem, MSEC, TIME_INFINITE};

struct Objects {
    table: HashMap<u32, Signals>,
    next_raw: u32,
}

/// A deterministic in-process [`Kernel`].
///
/// Time moves one millisecond per `time_get` call, starting from a fixed
/// epoch, so timestamp-dependent tests are reproducible.
pub struct MockKernel {
    objects: Mutex<Objects>,
    changed: Condvar,
    utc: Mutex<Time>,
}

/// Fixed UTC epoch for the mock clock (2017-01-01T00:00:00Z, in ns).
const MOCK_UTC_EPOCH: Time = 1_483_228_800 * crate::SEC;

impl MockKernel {
    #[must_use]
    pub fn new() -> Self {
        MockKernel {
            objects: Mutex::new(Objects {
                table: HashMap::new(),
                next_raw: 1,
            }),
            changed: Condvar::new(),
            utc: Mutex::new(MOCK_UTC_EPOCH),
        }
    }

    /// Leak a fresh instance into a `&'static` reference, the form the
    /// process-wide I/O state wants.
    #[must_use]
    pub fn install() -> &'static Self {
        Box::leak(Box::new(Self::new()))
    }

    /// Create a new event object with the given initial signal state.
    pub fn new_event(&self, initial: Signals) -> Handle {
        let mut objects = self.objects.lock().unwrap();
        let raw = objects.next_raw;
        objects.next_raw += 1;
        objects.table.insert(raw, initial);
        Handle::from_raw(raw)
    }

    /// Clear then set signals on an event object, waking any waiters.
    /// Signaling a closed handle is a no-op, so peers may race teardown.
    pub fn signal(&self, handle: Handle, clear: Signals, set: Signals) {
        let mut objects = self.objects.lock().unwrap();
        if let Some(state) = objects.table.get_mut(&handle.raw()) {
            *state = (*state - clear) | set;
            self.changed.notify_all();
        }
    }

    /// The current signal state, or `None` once the handle is closed.
    pub fn signal_state(&self, handle: Handle) -> Option<Signals> {
        self.objects.lock().unwrap().table.get(&handle.raw()).copied()
    }

    /// Whether `handle` has been released via `handle_close`.
    pub fn is_closed(&self, handle: Handle) -> bool {
        !self
            .objects
            .lock()
            .unwrap()
            .table
            .contains_key(&handle.raw())
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn absolute_deadline(timeout: Time) -> Option<Instant> {
    if timeout == TIME_INFINITE {
        None
    } else {
        Instant::now().checked_add(Duration::from_nanos(timeout))
    }
}

impl Kernel for MockKernel {
    fn object_wait_one(
        &self,
        handle: Handle,
        signals: Signals,
        timeout: Time,
    ) -> Result<Signals, Status> {
        let deadline = absolute_deadline(timeout);
        let mut objects = self.objects.lock().unwrap();
        loop {
            let Some(state) = objects.table.get(&handle.raw()).copied() else {
                return Err(Status::BadHandle);
            };
            if state.intersects(signals) {
                return Ok(state);
            }
            match deadline {
                None => objects = self.changed.wait(objects).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Status::TimedOut);
                    }
                    objects = self
                        .changed
                        .wait_timeout(objects, deadline - now)
                        .unwrap()
                        .0;
                }
            }
        }
    }

    fn object_wait_many(&self, items: &mut [WaitItem], timeout: Time) -> Result<(), Status> {
        let deadline = absolute_deadline(timeout);
        let mut objects = self.objects.lock().unwrap();
        loop {
            let mut ready = false;
            for item in items.iter_mut() {
                let Some(state) = objects.table.get(&item.handle.raw()).copied() else {
                    return Err(Status::BadHandle);
                };
                item.pending = state;
                if state.intersects(item.waitfor) {
                    ready = true;
                }
            }
            if ready {
                return Ok(());
            }
            match deadline {
                None => objects = self.changed.wait(objects).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        // pending has already been refreshed this pass
                        return Err(Status::TimedOut);
                    }
                    objects = self
                        .changed
                        .wait_timeout(objects, deadline - now)
                        .unwrap()
                        .0;
                }
            }
        }
    }

    fn handle_close(&self, handle: Handle) -> Result<(), Status> {
        let mut objects = self.objects.lock().unwrap();
        if objects.table.remove(&handle.raw()).is_none() {
            return Err(Status::BadHandle);
        }
        // Anyone blocked on this handle re-checks and observes BadHandle.
        self.changed.notify_all();
        Ok(())
    }

    fn time_get(&self, clock: Clock) -> Time {
        let mut utc = self.utc.lock().unwrap();
        *utc += MSEC;
        match clock {
            Clock::Utc => *utc,
            Clock::Monotonic => *utc - MOCK_UTC_EPOCH,
        }
    }
}
