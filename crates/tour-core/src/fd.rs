// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::os::fd::{AsRawFd, IntoRawFd};

use nix::unistd::close;
use tracing::debug;

use crate::error::{Error, Result};

/// Close `fd` with a single `close(2)`, reporting failure as [`Error::Release`].
///
/// Dropping a `File` or `OwnedFd` would swallow the error.
pub(crate) fn close_descriptor<Fd: AsRawFd + IntoRawFd>(fd: Fd, what: &str) -> Result<()> {
    let raw = fd.as_raw_fd();
    close(fd).map_err(|e| Error::Release {
        what: format!("{} (fd {})", what, raw),
        source: e.into(),
    })?;
    debug!(fd = raw, "closed");
    Ok(())
}
