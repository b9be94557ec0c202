//! POSIX error numbers and the kernel-status translation. See [`Errno`].

use capio_kernel::Status;
use thiserror::Error;

/// A POSIX error number.
///
/// A transparent wrapper around the classic small positive integers,
/// intended to provide some type safety by requiring explicit conversions
/// to and from raw values. capio's entire call surface reports failure as
/// `Result<_, Errno>`; a C binding layer would return `-1` and store this
/// value in `errno`.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
pub struct Errno {
    value: core::num::NonZeroU8,
}

impl From<Errno> for i32 {
    fn from(e: Errno) -> Self {
        e.value.get().into()
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Errno({})", self.value.get())
    }
}

impl Errno {
    /// The negative integer representation of the error, as a C-style
    /// return value.
    #[must_use]
    pub fn as_neg(self) -> i32 {
        -i32::from(self)
    }

    const fn from_const(v: u8) -> Self {
        Self {
            value: match core::num::NonZeroU8::new(v) {
                Some(value) => value,
                None => panic!("errno values are nonzero"),
            },
        }
    }

    /// Operation not permitted
    pub const EPERM: Self = Self::from_const(1);
    /// No such file or directory
    pub const ENOENT: Self = Self::from_const(2);
    /// Interrupted system call
    pub const EINTR: Self = Self::from_const(4);
    /// Input/output error
    pub const EIO: Self = Self::from_const(5);
    /// Bad file descriptor
    pub const EBADF: Self = Self::from_const(9);
    /// Resource temporarily unavailable
    pub const EAGAIN: Self = Self::from_const(11);
    /// Cannot allocate memory
    pub const ENOMEM: Self = Self::from_const(12);
    /// Permission denied
    pub const EACCES: Self = Self::from_const(13);
    /// Bad address
    pub const EFAULT: Self = Self::from_const(14);
    /// Device or resource busy
    pub const EBUSY: Self = Self::from_const(16);
    /// File exists
    pub const EEXIST: Self = Self::from_const(17);
    /// Not a directory
    pub const ENOTDIR: Self = Self::from_const(20);
    /// Is a directory
    pub const EISDIR: Self = Self::from_const(21);
    /// Invalid argument
    pub const EINVAL: Self = Self::from_const(22);
    /// Too many open files
    pub const EMFILE: Self = Self::from_const(24);
    /// Inappropriate ioctl for device
    pub const ENOTTY: Self = Self::from_const(25);
    /// File too large
    pub const EFBIG: Self = Self::from_const(27);
    /// No space left on device
    pub const ENOSPC: Self = Self::from_const(28);
    /// Illegal seek
    pub const ESPIPE: Self = Self::from_const(29);
    /// Numerical result out of range
    pub const ERANGE: Self = Self::from_const(34);
    /// File name too long
    pub const ENAMETOOLONG: Self = Self::from_const(36);
    /// Function not implemented
    pub const ENOSYS: Self = Self::from_const(38);
    /// Directory not empty
    pub const ENOTEMPTY: Self = Self::from_const(39);
    /// Operation not supported
    pub const ENOTSUP: Self = Self::from_const(95);
    /// Transport endpoint is not connected
    pub const ENOTCONN: Self = Self::from_const(107);
    /// Connection timed out
    pub const ETIMEDOUT: Self = Self::from_const(110);
}

impl From<Status> for Errno {
    /// The kernel-status to errno mapping applied at the API boundary.
    ///
    /// [`Status::ShouldWait`] is deliberately included (as `EAGAIN`) even
    /// though the blocking-emulation loops normally consume it before it
    /// can reach a caller: a non-blocking descriptor surfaces it directly.
    fn from(status: Status) -> Self {
        match status {
            Status::NotFound => Errno::ENOENT,
            Status::NoMemory => Errno::ENOMEM,
            Status::InvalidArgs => Errno::EINVAL,
            Status::BufferTooSmall => Errno::EINVAL,
            Status::TimedOut => Errno::ETIMEDOUT,
            Status::AlreadyExists => Errno::EEXIST,
            Status::RemoteClosed => Errno::ENOTCONN,
            Status::BadPath => Errno::ENAMETOOLONG,
            Status::Io => Errno::EIO,
            Status::NotDir => Errno::ENOTDIR,
            Status::NotSupported => Errno::ENOTSUP,
            Status::OutOfRange => Errno::EINVAL,
            Status::NoResources => Errno::ENOMEM,
            Status::BadHandle => Errno::EBADF,
            Status::AccessDenied => Errno::EACCES,
            Status::Unavailable => Errno::EBUSY,
            Status::ShouldWait => Errno::EAGAIN,
            Status::FileBig => Errno::EFBIG,
            Status::NoSpace => Errno::ENOSPC,
            // No specific translation; report a generic I/O failure.
            _ => Errno::EIO,
        }
    }
}
