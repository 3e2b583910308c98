// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the system call tour.

use std::path::PathBuf;

use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::ChildExit;

/// Result type alias for tour operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a tour step
#[derive(Error, Debug)]
pub enum Error {
    #[error("{op} failed: {source}")]
    ResourceUnavailable {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("short write: {written} of {expected} bytes transferred")]
    ShortWrite { written: usize, expected: usize },

    #[error("readlink {path:?} failed: {source}")]
    NotASymlinkOrAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("readlink {path:?}: target fills the {capacity}-byte buffer and may be truncated")]
    LinkTargetTruncated { path: PathBuf, capacity: usize },

    #[error("exec {program} failed: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("waitpid {pid} failed: {source}")]
    ChildWait {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },

    #[error("child {pid} did not succeed: {exit}")]
    ChildFailed { pid: Pid, exit: ChildExit },

    #[error("close {what} failed: {source}")]
    Release {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Coarse failure category, used for reporting and exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ResourceUnavailable,
    IoFailure,
    NotASymlinkOrAccess,
    ExecFailure,
    ChildWaitFailure,
    ReleaseFailure,
    Config,
}

/// How failures are translated into process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitCodePolicy {
    /// Every failure exits with 1
    #[default]
    Uniform,
    /// Each [`ErrorKind`] gets its own exit code
    PerKind,
}

impl Error {
    pub(crate) fn resource(op: &'static str, source: impl Into<std::io::Error>) -> Self {
        Error::ResourceUnavailable {
            op,
            source: source.into(),
        }
    }

    pub(crate) fn io(op: &'static str, source: impl Into<std::io::Error>) -> Self {
        Error::Io {
            op,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            Error::Io { .. } | Error::ShortWrite { .. } => ErrorKind::IoFailure,
            Error::NotASymlinkOrAccess { .. } | Error::LinkTargetTruncated { .. } => {
                ErrorKind::NotASymlinkOrAccess
            }
            Error::Exec { .. } => ErrorKind::ExecFailure,
            Error::ChildWait { .. } | Error::ChildFailed { .. } => ErrorKind::ChildWaitFailure,
            Error::Release { .. } => ErrorKind::ReleaseFailure,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Process exit code for this error under the given policy.
    ///
    /// Under [`ExitCodePolicy::PerKind`] a failed child passes its own
    /// non-zero status through, so the kind it failed with stays visible.
    pub fn exit_code(&self, policy: ExitCodePolicy) -> i32 {
        match policy {
            ExitCodePolicy::Uniform => 1,
            ExitCodePolicy::PerKind => match self {
                Error::ChildFailed { exit, .. } if exit.code() != 0 => exit.code(),
                _ => self.kind_exit_code(),
            },
        }
    }

    fn kind_exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::ResourceUnavailable => 2,
            ErrorKind::IoFailure => 3,
            ErrorKind::NotASymlinkOrAccess => 4,
            ErrorKind::ExecFailure => 5,
            ErrorKind::ChildWaitFailure => 6,
            ErrorKind::ReleaseFailure => 7,
            ErrorKind::Config => 8,
        }
    }
}
