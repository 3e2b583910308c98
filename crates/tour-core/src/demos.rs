// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Single-call demonstrations, one per facility.

use std::io::Write;
use std::os::fd::AsRawFd;

use nix::unistd::{getpid, getppid};
use tracing::info;

use crate::config::TourConfig;
use crate::error::Result;
use crate::fd::close_descriptor;
use crate::{file, ipc, link};
use crate::process::{self, Fork};
use crate::tour::{emit, run_tour};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    Open,
    Write,
    Read,
    Close,
    Readlink,
    Socket,
    Socketpair,
    Send,
    Recv,
    Fork,
    Exec,
    All,
}

impl Demo {
    pub const EVERY: [Demo; 12] = [
        Demo::Open,
        Demo::Write,
        Demo::Read,
        Demo::Close,
        Demo::Readlink,
        Demo::Socket,
        Demo::Socketpair,
        Demo::Send,
        Demo::Recv,
        Demo::Fork,
        Demo::Exec,
        Demo::All,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Demo::Open => "open",
            Demo::Write => "write",
            Demo::Read => "read",
            Demo::Close => "close",
            Demo::Readlink => "readlink",
            Demo::Socket => "socket",
            Demo::Socketpair => "socketpair",
            Demo::Send => "send",
            Demo::Recv => "recv",
            Demo::Fork => "fork",
            Demo::Exec => "exec",
            Demo::All => "all",
        }
    }

    /// Run this demo. [`Demo::Exec`] only returns if the exec fails.
    pub fn run<W: Write + ?Sized>(self, config: &TourConfig, out: &mut W) -> Result<()> {
        info!(demo = self.name(), "running demo");
        match self {
            Demo::Open => open(config, out),
            Demo::Write => write(config, out),
            Demo::Read => read(config, out),
            Demo::Close => close(config, out),
            Demo::Readlink => readlink(config, out),
            Demo::Socket => socket(out),
            Demo::Socketpair => socketpair(config, out),
            Demo::Send => send(config, out),
            Demo::Recv => recv(config, out),
            Demo::Fork => fork(out),
            Demo::Exec => exec(config, out),
            Demo::All => run_tour(config, out).map(|_| ()),
        }
    }
}

impl std::fmt::Display for Demo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Demo {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Demo::EVERY
            .into_iter()
            .find(|demo| demo.name() == s)
            .ok_or_else(|| format!("unknown demo: {}", s))
    }
}

fn open<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let handle = file::open_or_create(&config.file.path, config.file.mode)?;
    emit(
        out,
        format_args!(
            "{} created/opened successfully, fd = {}",
            config.file.path.display(),
            handle.raw_fd()
        ),
    )?;
    file::release(handle)
}

fn write<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let payload = config.file.payload.as_bytes();
    let handle = file::create_or_truncate_and_write(&config.file.path, payload, config.file.mode)?;
    emit(out, format_args!("Number of bytes written: {}", payload.len()))?;
    file::release(handle)
}

fn read<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let mut handle = file::open_existing(&config.file.path)?;
    let mut buf = vec![0u8; config.file.read_capacity];
    let count = file::read_up_to(&mut handle, &mut buf, config.file.read_capacity)?;
    emit(
        out,
        format_args!("Data read from file: {}", String::from_utf8_lossy(&buf[..count])),
    )?;
    file::release(handle)
}

fn close<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let mut handle = file::open_or_create(&config.file.path, config.file.mode)?;
    handle.write_all_once(config.file.payload.as_bytes())?;
    file::release(handle)?;
    emit(out, format_args!("File closed successfully"))
}

fn readlink<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let target = link::read_link_target(
        &config.link.path,
        config.link.capacity,
        config.link.strict_length,
    )?;
    emit(
        out,
        format_args!(
            "{} points to: {}",
            config.link.path.display(),
            target.target
        ),
    )
}

fn socket<W: Write + ?Sized>(out: &mut W) -> Result<()> {
    let fd = ipc::create_stream_socket()?;
    emit(
        out,
        format_args!("Socket created successfully, fd = {}", fd.as_raw_fd()),
    )?;
    close_descriptor(fd, "socket")
}

fn socketpair<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let pair = ipc::create_connected_pair()?;
    emit(
        out,
        format_args!(
            "Socket pair created: sv[0]={}, sv[1]={}",
            pair.first.raw_fd(),
            pair.second.raw_fd()
        ),
    )?;
    let received = round_trip(&pair, config)?;
    emit(out, format_args!("Received data: {}", received))?;
    pair.close()
}

fn send<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let pair = ipc::create_connected_pair()?;
    let sent = pair.first.send(config.ipc.message.as_bytes())?;
    emit(out, format_args!("Data sent through socket ({} bytes)", sent))?;
    pair.close()
}

fn recv<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    let pair = ipc::create_connected_pair()?;
    let received = round_trip(&pair, config)?;
    emit(out, format_args!("Data received: {}", received))?;
    pair.close()
}

fn round_trip(pair: &ipc::ConnectedPair, config: &TourConfig) -> Result<String> {
    pair.first.send(config.ipc.message.as_bytes())?;
    let mut buf = vec![0u8; config.ipc.recv_capacity];
    let count = pair.second.recv(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..count]).into_owned())
}

fn fork<W: Write + ?Sized>(out: &mut W) -> Result<()> {
    out.flush().map_err(|e| crate::Error::io("flush output", e))?;
    match process::duplicate_process()? {
        Fork::Child => {
            let printed = emit(
                out,
                format_args!(
                    "Child Process\nChild PID  : {}\nParent PID : {}",
                    getpid(),
                    getppid()
                ),
            );
            let _ = out.flush();
            process::exit_child(if printed.is_ok() { 0 } else { 1 })
        }
        Fork::Parent { child } => {
            emit(
                out,
                format_args!(
                    "Parent Process\nParent PID : {}\nChild PID  : {}",
                    getpid(),
                    child
                ),
            )?;
            process::wait_for_child(child)?;
            Ok(())
        }
    }
}

fn exec<W: Write + ?Sized>(config: &TourConfig, out: &mut W) -> Result<()> {
    emit(out, format_args!("Before exec()"))?;
    out.flush().map_err(|e| crate::Error::io("flush output", e))?;
    match process::replace_image(&config.exec.program, &config.exec.args) {
        Ok(never) => match never {},
        Err(e) => Err(e),
    }
}
