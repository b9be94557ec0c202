//! # capio
//!
//! A user-space POSIX file-descriptor layer for a capability/handle-based
//! microkernel.
//!
//! Programs written against the familiar `open`/`read`/`write`/`close`/
//! `poll` surface run unmodified: every descriptor in the process-wide fd
//! table names a refcounted *transport* object, and each POSIX call is
//! lowered onto the transport's operation set ([`io::Transport`]).
//! Blocking semantics are synthesized from non-blocking transport calls
//! plus the kernel's handle-wait syscalls, which the core reaches through
//! [`capio_kernel::Kernel`].
//!
//! The entry points are [`startup`] (consume the process-loader handle
//! table, install root/cwd/stdio) and [`IoState`], which carries all
//! process-wide state and exposes the call surface.

#![no_std]

extern crate alloc;

pub mod dir;
pub mod errno;
pub mod events;
pub mod io;
pub mod poll;
pub mod startup;
pub mod transports;
pub mod unistd;

mod cwd;
mod fdtab;
mod resolve;
mod state;

pub use errno::Errno;
pub use events::Events;
pub use io::{Io, IoFlags, IoRef, Mode, NodeAttr, OFlags, Transport, Whence};
pub use poll::{FdSet, PollFd};
pub use state::IoState;
pub use transports::TransportFactory;
pub use unistd::AT_FDCWD;

/// Upper bound on a single path, matching the cwd buffer bound.
pub const PATH_MAX: usize = 4096;
