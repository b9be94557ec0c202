//! The transports the core itself owns, plus the constructor hooks for
//! the ones it only consumes.
//!
//! The remote-filesystem, kernel-pipe, and logger transports live with
//! their services; the core reaches their constructors through
//! [`TransportFactory`], supplied once at startup. What the core does own
//! is the [`NullTransport`] fallback and the [`WaitableTransport`] bare-
//! handle wrapper.

mod null;
mod waitable;

pub use null::NullTransport;
pub use waitable::WaitableTransport;

use capio_kernel::{Handle, Status};

use crate::io::IoRef;

/// Constructors for the externally implemented transports.
///
/// Startup uses the first three to decode the process-loader handle
/// table; `pipe2` uses [`TransportFactory::pipe_pair`].
pub trait TransportFactory: Send + Sync {
    /// A remote filesystem object. `event` is the companion signaling
    /// handle, or [`Handle::INVALID`] when the object has none.
    fn remote(&self, object: Handle, event: Handle) -> Result<IoRef, Status>;

    /// A pipe end over an existing kernel handle.
    fn pipe(&self, handle: Handle) -> Result<IoRef, Status>;

    /// A log sink over an existing kernel handle.
    fn logger(&self, handle: Handle) -> Result<IoRef, Status>;

    /// A freshly connected pipe pair, in `(read, write)` order.
    fn pipe_pair(&self) -> Result<(IoRef, IoRef), Status>;
}
