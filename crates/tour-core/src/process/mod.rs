// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Process duplication, image replacement and reaping.
//!
//! # Fork as a tagged variant
//!
//! [`duplicate_process`] returns [`Fork::Parent`] carrying the child's PID in
//! the original process and [`Fork::Child`] in the copy. Everything opened
//! before the call exists in both processes afterwards; each branch is
//! expected to close the descriptors it does not use before doing anything
//! else (see [`crate::ipc::ConnectedPair::keep`]).
//!
//! # Exec never returns on success
//!
//! [`replace_image`] returns `Result<Infallible>`, so the only value a caller
//! can ever observe is the error. Code after the call is the failure path.

use std::convert::Infallible;
use std::ffi::CString;
use std::fmt;
use std::io::Write;

use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execv, fork};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Outcome of [`duplicate_process`], seen from each side of the fork
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    Parent { child: Pid },
    Child,
}

/// How a reaped child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Exited(i32),
    Signaled(Signal),
}

impl ChildExit {
    pub fn success(&self) -> bool {
        matches!(self, ChildExit::Exited(0))
    }

    /// Shell-style status: the exit code, or 128 + signal number
    pub fn code(&self) -> i32 {
        match self {
            ChildExit::Exited(code) => *code,
            ChildExit::Signaled(signal) => 128 + *signal as i32,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with code {}", code),
            ChildExit::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// Create a copy of the calling process.
///
/// Standard output is flushed first so text buffered before the fork is not
/// written twice.
pub fn duplicate_process() -> Result<Fork> {
    let _ = std::io::stdout().flush();

    // SAFETY: the child only performs descriptor operations, writes to
    // stdout and then calls exec or exits.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!("Forked child process with PID: {}", child);
            Ok(Fork::Parent { child })
        }
        Ok(ForkResult::Child) => Ok(Fork::Child),
        Err(e) => {
            error!("fork failed: {}", e);
            Err(Error::resource("fork", e))
        }
    }
}

/// Replace the current process image with `program`, passing `args` as argv.
///
/// `args[0]` is the name the new program sees for itself.
pub fn replace_image(program: &str, args: &[String]) -> Result<Infallible> {
    let exec_err = |source: std::io::Error| Error::Exec {
        program: program.to_string(),
        source,
    };
    let invalid = || {
        exec_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "argument contains an interior NUL byte",
        ))
    };

    let c_program = CString::new(program).map_err(|_| invalid())?;
    let c_args = args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    info!("Replacing process {} with {} {:?}", std::process::id(), program, args);
    let _ = std::io::stdout().flush();

    match execv(&c_program, &c_args) {
        Ok(never) => match never {},
        Err(e) => {
            error!("Failed to exec {}: {}", program, e);
            Err(exec_err(e.into()))
        }
    }
}

/// Block until `child` terminates and report how it ended.
pub fn wait_for_child(child: Pid) -> Result<ChildExit> {
    info!("Waiting for child process {} to complete", child);

    match waitpid(child, None) {
        Ok(WaitStatus::Exited(pid, code)) => {
            info!("Child process {} exited with code {}", pid, code);
            Ok(ChildExit::Exited(code))
        }
        Ok(WaitStatus::Signaled(pid, signal, _)) => {
            warn!("Child process {} terminated by signal {:?}", pid, signal);
            Ok(ChildExit::Signaled(signal))
        }
        Ok(other) => {
            warn!("Unexpected wait status for child {}: {:?}", child, other);
            Err(Error::ChildWait {
                pid: child,
                source: std::io::Error::other(format!("unexpected wait status {:?}", other)),
            })
        }
        Err(e) => {
            error!("Failed to wait for child process {}: {}", child, e);
            Err(Error::ChildWait {
                pid: child,
                source: e.into(),
            })
        }
    }
}

/// Terminate the child branch after flushing standard output.
///
/// Uses `_exit` so exit handlers inherited from the parent do not run twice.
pub fn exit_child(code: i32) -> ! {
    let _ = std::io::stdout().flush();
    // SAFETY: _exit only terminates the calling process.
    unsafe { libc::_exit(code) }
}
