//! Startup handoff and process teardown.
//!
//! The process loader hands every new process a table of
//! `(handle, info-word)` pairs. [`build`] decodes it into a fully
//! populated [`IoState`]: the root and cwd transports, any pre-opened
//! descriptors, and stdin/stdout/stderr. Consumed entries are zeroed in
//! place so the caller can pass the remainder on to whatever else scans
//! the table.
//!
//! [`init`] additionally installs the state as the process-wide
//! singleton; the runtime's exit path calls [`exit`] to drain the fd
//! table.

use alloc::boxed::Box;
use alloc::string::String;

use once_cell::race::OnceBox;

use capio_kernel::{Handle, HandleInfo, HandleType, Kernel};

use crate::cwd::update_cwd_path;
use crate::fdtab::MAX_FD;
use crate::io::{Io, IoRef, Mode, OFlags};
use crate::state::{close_quietly, IoState};
use crate::transports::{NullTransport, TransportFactory};
use crate::unistd::AT_FDCWD;

fn install_fd(state: &IoState, io: IoRef, fd: u16) -> Result<(), capio_kernel::Status> {
    match state.bind(io.clone(), i32::from(fd), 0) {
        Ok(_) => Ok(()),
        Err(_) => {
            close_quietly(&io);
            Err(capio_kernel::Status::OutOfRange)
        }
    }
}

/// Build an [`IoState`] from the loader's handle table.
///
/// Entry decode rules:
/// * `Root`/`Cwd` entries populate the root and cwd transports.
/// * A `Remote` entry immediately followed by an entry with the
///   identical info word carries a companion event-signaling handle;
///   both go to the same transport.
/// * `Remote`/`Pipe`/`Logger` entries land in the fd named by the low
///   bits of their arg.
/// * An arg carrying [`HandleInfo::USE_FOR_STDIO`] marks the fd to clone
///   onto any of fds 0/1/2 still empty once the table is decoded;
///   without a donor those get null transports.
/// * Unrecognized entries are left untouched; consumed ones are zeroed.
///
/// `pwd` (the `PWD` environment value, if any) seeds the textual cwd
/// path; it is not authoritative for the cwd handle. If a root arrived
/// but no cwd handle, the cwd path is opened from the root; failing
/// that, the cwd degrades to a null transport, as does a missing root.
pub fn build(
    kernel: &'static dyn Kernel,
    factory: &'static dyn TransportFactory,
    entries: &mut [(Handle, HandleInfo)],
    pwd: Option<&str>,
) -> IoState {
    let state = IoState::new(kernel, factory);
    let mut stdio_fd: Option<i32> = None;

    let mut i = 0;
    while i < entries.len() {
        let (handle, info) = entries[i];
        let consumed_at = i;
        let mut arg = info.arg();
        if arg & HandleInfo::USE_FOR_STDIO != 0 {
            arg &= !HandleInfo::USE_FOR_STDIO;
            if usize::from(arg) < MAX_FD {
                stdio_fd = Some(i32::from(arg));
            }
        }

        let Some(ty) = info.handle_type() else {
            // unknown handle, leave it alone
            i += 1;
            continue;
        };

        let result = match ty {
            HandleType::Root => factory.remote(handle, Handle::INVALID).map(|io| {
                state.fdtab.lock().root = Some(io);
            }),
            HandleType::Cwd => factory.remote(handle, Handle::INVALID).map(|io| {
                state.cwd.lock().handle = Some(io);
            }),
            HandleType::Remote => {
                // remote objects may have a second handle which is for
                // signaling events
                let event = if i + 1 < entries.len() && entries[i + 1].1 == info {
                    i += 1;
                    let event = entries[i].0;
                    entries[i] = (Handle::INVALID, HandleInfo::from_raw(0));
                    event
                } else {
                    Handle::INVALID
                };
                factory
                    .remote(handle, event)
                    .and_then(|io| install_fd(&state, io, arg))
            }
            HandleType::Pipe => factory
                .pipe(handle)
                .and_then(|io| install_fd(&state, io, arg)),
            HandleType::Logger => factory
                .logger(handle)
                .and_then(|io| install_fd(&state, io, arg)),
        };

        match result {
            Ok(()) => entries[consumed_at] = (Handle::INVALID, HandleInfo::from_raw(0)),
            Err(err) => log::warn!("startup: dropping {ty:?} handle: {err}"),
        }
        i += 1;
    }

    if let Some(pwd) = pwd {
        let mut cwd = state.cwd.lock();
        update_cwd_path(&mut cwd.path, pwd);
    }

    // configure stdin/out/err if not init'd
    let donor = stdio_fd.and_then(|fd| state.get(fd));
    for fd in 0..3 {
        if state.get(fd).is_none() {
            let io = donor.clone().unwrap_or_else(|| Io::new(NullTransport));
            let _ = state.bind(io, fd, 0);
        }
    }

    if state.root().is_some() {
        if state.cwd_handle().is_none() {
            let cwd_path: String = state.cwd.lock().path.clone();
            if let Ok(io) =
                state.open_at_io(AT_FDCWD, &cwd_path, OFlags::DIRECTORY, Mode::empty())
            {
                state.cwd.lock().handle = Some(io);
            }
        }
    } else {
        // placeholder null handle
        state.fdtab.lock().root = Some(Io::new(NullTransport));
    }
    if state.cwd_handle().is_none() {
        state.cwd.lock().handle = Some(Io::new(NullTransport));
    }

    state
}

static STATE: OnceBox<IoState> = OnceBox::new();

/// [`build`] the process-wide state and install it as the singleton.
///
/// # Panics
///
/// Panics if startup runs twice.
pub fn init(
    kernel: &'static dyn Kernel,
    factory: &'static dyn TransportFactory,
    entries: &mut [(Handle, HandleInfo)],
    pwd: Option<&str>,
) -> &'static IoState {
    let state = Box::new(build(kernel, factory, entries, pwd));
    STATE
        .set(state)
        .map_err(|_| {})
        .expect("capio startup ran twice");
    state_installed().expect("state was just installed")
}

/// The installed process-wide state, if startup has run.
#[must_use]
pub fn state_installed() -> Option<&'static IoState> {
    STATE.get()
}

/// Process-exit hook: drain the fd table, closing every transport whose
/// last descriptor goes away.
pub fn exit() {
    if let Some(state) = STATE.get() {
        state.exit();
    }
}
