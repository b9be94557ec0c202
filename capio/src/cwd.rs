//! Current-working-directory state.
//!
//! The textual path is maintained alongside the cwd transport so that
//! `getcwd` never round-trips through the filesystem and `chdir` can
//! track names purely textually. Locking order is cwd mutex before the
//! fd-table mutex, never the reverse.

use alloc::string::String;

use crate::io::IoRef;
use crate::PATH_MAX;

/// Sentinel installed when normalization would push the path past
/// [`PATH_MAX`]; the cwd transport stays intact.
pub const UNKNOWN_CWD: &str = "(unknown)";

pub(crate) struct CwdState {
    /// Normalized absolute path, bounded by [`PATH_MAX`].
    pub(crate) path: String,
    /// The directory transport all relative paths resolve against.
    pub(crate) handle: Option<IoRef>,
}

impl CwdState {
    pub(crate) fn new() -> Self {
        CwdState {
            path: String::from("/"),
            handle: None,
        }
    }
}

/// Apply `path` to the normalized cwd string.
///
/// Absolute paths reset to `/` first (and are then parsed as relative so
/// they normalize too). `.` segments and repeated separators are
/// skipped; `..` pops the last segment but never the leading `/`.
pub(crate) fn update_cwd_path(cwd: &mut String, path: &str) {
    let path = match path.strip_prefix('/') {
        Some(rest) => {
            cwd.clear();
            cwd.push('/');
            rest
        }
        None => path,
    };

    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match cwd.rfind('/') {
                // No separator left; shouldn't ever happen.
                None => {
                    *cwd = String::from(UNKNOWN_CWD);
                    return;
                }
                Some(0) => cwd.truncate(1),
                Some(idx) => cwd.truncate(idx),
            },
            seg => {
                if cwd.len() + seg.len() + 2 >= PATH_MAX {
                    // Doesn't fit; shouldn't happen, but...
                    *cwd = String::from(UNKNOWN_CWD);
                    return;
                }
                if cwd.len() != 1 {
                    cwd.push('/');
                }
                cwd.push_str(seg);
            }
        }
    }
}
