//! POSIX readiness events, as seen by `poll`/`select` and the transport
//! wait handshake.

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Events: u32 {
        /// `POLLIN`: there is data to be read.
        const IN    = 0x0001;
        /// `POLLPRI`: exceptional condition on the descriptor.
        const PRI   = 0x0002;
        /// `POLLOUT`: writing is now possible.
        const OUT   = 0x0004;
        /// `POLLERR`: error condition (always returnable).
        const ERR   = 0x0008;
        /// `POLLHUP`: hang up (always returnable).
        const HUP   = 0x0010;
        /// `POLLNVAL`: invalid request, fd not open (always returnable).
        const NVAL  = 0x0020;
        /// `POLLRDHUP`: peer closed its writing half.
        const RDHUP = 0x2000;

        /// Events reported even when not requested.
        const ALWAYS_POLLED = Self::ERR.bits() | Self::HUP.bits() | Self::NVAL.bits();

        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}
