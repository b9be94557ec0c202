//! Path resolution against the root handle, the cwd handle, and the
//! `...at`-family dirfd convention.

use capio_kernel::Status;

use crate::io::{IoRef, Mode, OFlags};
use crate::state::IoState;
use crate::unistd::AT_FDCWD;
use crate::PATH_MAX;

impl IoState {
    /// Resolve `(dirfd, path)` to a base transport and the residual
    /// path to hand it.
    ///
    /// Absolute paths resolve against the root transport with the
    /// leading `/` stripped (an empty remainder becomes `.`);
    /// [`AT_FDCWD`] selects the cwd transport; any other dirfd must name
    /// a live descriptor.
    pub(crate) fn resolve<'p>(&self, dirfd: i32, path: &'p str) -> Result<(IoRef, &'p str), Status> {
        if let Some(stripped) = path.strip_prefix('/') {
            let root = self.root().ok_or(Status::BadHandle)?;
            let residual = if stripped.is_empty() { "." } else { stripped };
            Ok((root, residual))
        } else if dirfd == AT_FDCWD {
            let cwd = self.cwd_handle().ok_or(Status::BadHandle)?;
            Ok((cwd, path))
        } else {
            let io = self.get(dirfd).ok_or(Status::BadHandle)?;
            Ok((io, path))
        }
    }

    /// Resolve and open in one step; the workhorse behind every
    /// path-taking call.
    pub(crate) fn open_at_io(
        &self,
        dirfd: i32,
        path: &str,
        flags: OFlags,
        mode: Mode,
    ) -> Result<IoRef, Status> {
        if path.is_empty() {
            return Err(Status::InvalidArgs);
        }
        let (iodir, residual) = self.resolve(dirfd, path)?;
        iodir.ops().open(residual, flags, mode)
    }

    /// Open the directory containing `path`, returning it together with
    /// the leaf name, for container-level operations such as unlink.
    ///
    /// Trailing slashes are stripped (a path of all slashes keeps one),
    /// the split happens at the last remaining `/`, and a bare name gets
    /// parent `"."`. An empty leaf is invalid.
    pub(crate) fn open_containing<'p>(
        &self,
        dirfd: i32,
        path: &'p str,
    ) -> Result<(IoRef, &'p str), Status> {
        let (iodir, residual) = self.resolve(dirfd, path)?;
        if residual.is_empty() || residual.len() >= PATH_MAX {
            return Err(Status::InvalidArgs);
        }

        let end = residual.trim_end_matches('/');
        let trimmed = if end.is_empty() { &residual[..1] } else { end };
        let (dirpath, name) = match trimmed.rfind('/') {
            None => (".", trimmed),
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        };
        if name.is_empty() {
            return Err(Status::InvalidArgs);
        }

        let parent = iodir.ops().open(dirpath, OFlags::DIRECTORY, Mode::empty())?;
        Ok((parent, name))
    }
}
