// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Symbolic link resolution via `readlink(2)`.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Copy the stored target of the link at `path` into `buf` without following it.
///
/// Returns the number of bytes copied. No terminator is written. A target
/// longer than `buf` is silently cut to `buf.len()` by the kernel; see
/// [`possibly_truncated`]. On failure `buf` is left untouched.
pub fn resolve_link_target(path: &Path, buf: &mut [u8]) -> Result<usize> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        Error::NotASymlinkOrAccess {
            path: path.to_path_buf(),
            source: Errno::EINVAL.into(),
        }
    })?;

    // SAFETY: `c_path` is NUL-terminated and `buf` is valid for `buf.len()` bytes.
    let res = unsafe {
        libc::readlink(
            c_path.as_ptr(),
            buf.as_mut_ptr().cast::<libc::c_char>(),
            buf.len(),
        )
    };
    let len = Errno::result(res).map_err(|e| Error::NotASymlinkOrAccess {
        path: path.to_path_buf(),
        source: e.into(),
    })? as usize;

    debug!(path = %path.display(), len, capacity = buf.len(), "readlink");
    Ok(len)
}

/// A filled buffer cannot be told apart from a cut-off target.
pub fn possibly_truncated(len: usize, capacity: usize) -> bool {
    capacity > 0 && len == capacity
}

/// Resolved target with its truncation flag, as shown by the tour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub target: String,
    pub possibly_truncated: bool,
}

/// Resolve into a `capacity`-byte buffer and decode the result.
///
/// With `strict` set, a full buffer is reported as
/// [`Error::LinkTargetTruncated`] instead of a warning.
pub fn read_link_target(path: &Path, capacity: usize, strict: bool) -> Result<LinkTarget> {
    let mut buf = vec![0u8; capacity];
    let len = resolve_link_target(path, &mut buf)?;
    let truncated = possibly_truncated(len, capacity);

    if truncated {
        if strict {
            return Err(Error::LinkTargetTruncated {
                path: path.to_path_buf(),
                capacity,
            });
        }
        warn!(
            path = %path.display(),
            capacity,
            "link target fills the whole buffer and may be truncated"
        );
    }

    Ok(LinkTarget {
        target: String::from_utf8_lossy(&buf[..len]).into_owned(),
        possibly_truncated: truncated,
    })
}
