// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The composite tour: one linear pass over every facility in the crate.
//!
//! # Sequence
//!
//! 1. create/truncate the file and write the payload
//! 2. rewind and read it back
//! 3. release the file (a failing close is reported but does not stop the tour)
//! 4. resolve the symbolic link
//! 5. create the connected socket pair
//! 6. fork
//! 7. child: keep the second endpoint, receive, print, exec the configured program
//! 8. parent: keep the first endpoint, send, close, wait for the child
//!
//! Each step checks its own result and aborts the tour with the first error.
//! Nothing opened earlier is unwound on failure.

use std::convert::Infallible;
use std::io::Write;

use nix::unistd::Pid;
use tracing::{error, info, warn};

use crate::config::TourConfig;
use crate::error::{Error, Result};
use crate::ipc::{ConnectedPair, Side};
use crate::process::{ChildExit, Fork};
use crate::{file, ipc, link, process};

/// What the parent observed over a complete tour
#[derive(Debug, Clone)]
pub struct TourReport {
    pub file_content: Vec<u8>,
    pub link_target: String,
    pub link_possibly_truncated: bool,
    pub bytes_sent: usize,
    pub child_pid: Pid,
    pub child_exit: ChildExit,
    /// Close failures that were reported and skipped
    pub release_failures: Vec<String>,
}

pub(crate) fn emit<W: Write + ?Sized>(out: &mut W, line: std::fmt::Arguments<'_>) -> Result<()> {
    out.write_fmt(line)
        .and_then(|_| out.write_all(b"\n"))
        .map_err(|e| Error::io("write output", e))
}

/// Run the full tour, writing human-readable lines to `out`.
///
/// Returns only in the parent. The child either becomes the configured
/// program or exits with the code of its failure.
pub fn run_tour<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<TourReport> {
    let mut release_failures = Vec::new();

    info!(path = %config.file.path.display(), "file round trip");
    let mut handle = file::create_or_truncate_and_write(
        &config.file.path,
        config.file.payload.as_bytes(),
        config.file.mode,
    )?;
    let mut buf = vec![0u8; config.file.read_capacity];
    let count = file::reset_and_read(&mut handle, &mut buf, config.file.read_capacity)?;
    let file_content = buf[..count].to_vec();
    emit(
        out,
        format_args!("File content: {}", String::from_utf8_lossy(&file_content)),
    )?;

    if let Err(e) = file::release(handle) {
        warn!("{}", e);
        release_failures.push(e.to_string());
    }

    info!(path = %config.link.path.display(), "resolving link");
    let target = link::read_link_target(
        &config.link.path,
        config.link.capacity,
        config.link.strict_length,
    )?;
    emit(
        out,
        format_args!(
            "{} -> {}{}",
            config.link.path.display(),
            target.target,
            if target.possibly_truncated {
                " (possibly truncated)"
            } else {
                ""
            }
        ),
    )?;

    info!("creating socket pair");
    let pair = ipc::create_connected_pair()?;

    out.flush().map_err(|e| Error::io("flush output", e))?;
    match process::duplicate_process()? {
        Fork::Child => run_child(config, pair, out),
        Fork::Parent { child } => {
            let bytes_sent = parent_branch(config, pair, child, &mut release_failures)?;
            let child_exit = process::wait_for_child(child)?;
            if !child_exit.success() {
                return Err(Error::ChildFailed {
                    pid: child,
                    exit: child_exit,
                });
            }

            Ok(TourReport {
                file_content,
                link_target: target.target,
                link_possibly_truncated: target.possibly_truncated,
                bytes_sent,
                child_pid: child,
                child_exit,
                release_failures,
            })
        }
    }
}

fn parent_branch(
    config: &TourConfig,
    pair: ConnectedPair,
    child: Pid,
    release_failures: &mut Vec<String>,
) -> Result<usize> {
    let endpoint = pair.keep(Side::First)?;
    let message = config.ipc.message.as_bytes();

    info!(child = %child, "sending message to child");
    let sent = endpoint.send(message)?;
    if sent != message.len() {
        return Err(Error::ShortWrite {
            written: sent,
            expected: message.len(),
        });
    }

    if let Err(e) = endpoint.close() {
        warn!("{}", e);
        release_failures.push(e.to_string());
    }
    Ok(sent)
}

fn run_child<W: Write + ?Sized>(config: &TourConfig, pair: ConnectedPair, out: &mut W) -> ! {
    let code = match child_branch(config, pair, out) {
        Ok(never) => match never {},
        Err(e) => {
            error!("child {} failed: {}", std::process::id(), e);
            let _ = writeln!(std::io::stderr(), "error: {}", e);
            e.exit_code(config.exit_codes)
        }
    };
    process::exit_child(code)
}

fn child_branch<W: Write + ?Sized>(
    config: &TourConfig,
    pair: ConnectedPair,
    out: &mut W,
) -> Result<Infallible> {
    let endpoint = pair.keep(Side::Second)?;

    let mut buf = vec![0u8; config.ipc.recv_capacity];
    let count = endpoint.recv(&mut buf)?;
    if count == 0 {
        return Err(Error::Io {
            op: "recv",
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed the connection before sending",
            ),
        });
    }
    emit(
        out,
        format_args!("Child received: {}", String::from_utf8_lossy(&buf[..count])),
    )?;
    out.flush().map_err(|e| Error::io("flush output", e))?;

    endpoint.close()?;
    process::replace_image(&config.exec.program, &config.exec.args)
}
