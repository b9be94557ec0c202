//! The null transport: the do-nothing endpoint installed wherever
//! startup found no real one (missing root, missing cwd, empty stdio
//! slots).

use capio_kernel::Status;

use crate::io::{IoRef, Mode, OFlags, Transport};

/// Reads report EOF, writes are swallowed whole, everything else is
/// unsupported. Not waitable: `poll` on a null descriptor fails `EINVAL`
/// rather than pretending readiness. Opens through a null root report a
/// bad handle, which is how a process that never received a root sees
/// the world.
pub struct NullTransport;

impl Transport for NullTransport {
    fn read(&self, _buf: &mut [u8]) -> Result<usize, Status> {
        Ok(0)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Status> {
        Ok(buf.len())
    }

    fn open(&self, _path: &str, _flags: OFlags, _mode: Mode) -> Result<IoRef, Status> {
        Err(Status::BadHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_eof_writes_swallowed() {
        let null = NullTransport;
        let mut buf = [0u8; 8];
        assert_eq!(null.read(&mut buf), Ok(0));
        assert_eq!(null.write(b"discarded"), Ok(9));
        assert_eq!(null.seek(3, crate::io::Whence::Set), Err(Status::NotSupported));
        assert!(null.wait_begin(crate::events::Events::IN).is_none());
    }
}
