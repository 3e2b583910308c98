// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Local stream sockets: `socketpair(2)`, `socket(2)`, `send(2)` and `recv(2)`.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::sys::socket::{
    AddressFamily, MsgFlags, SockFlag, SockType, recv, send, socket, socketpair,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fd::close_descriptor;

/// Which end of a [`ConnectedPair`] to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// One end of a connected stream socket
#[derive(Debug)]
pub struct Endpoint {
    fd: OwnedFd,
}

impl Endpoint {
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Issue one `send(2)`; the count may be smaller than `bytes.len()`.
    pub fn send(&self, bytes: &[u8]) -> Result<usize> {
        let sent = send(self.raw_fd(), bytes, MsgFlags::empty()).map_err(|e| Error::io("send", e))?;
        debug!(fd = self.raw_fd(), sent, requested = bytes.len(), "send");
        Ok(sent)
    }

    /// Issue one blocking `recv(2)`. Zero means the peer closed its end.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let count = recv(self.raw_fd(), buf, MsgFlags::empty()).map_err(|e| Error::io("recv", e))?;
        debug!(fd = self.raw_fd(), count, capacity = buf.len(), "recv");
        Ok(count)
    }

    /// Close this endpoint, reporting a failing `close(2)`.
    pub fn close(self) -> Result<()> {
        close_descriptor(self.fd, "socket")
    }
}

/// Two endpoints created connected to each other
#[derive(Debug)]
pub struct ConnectedPair {
    pub first: Endpoint,
    pub second: Endpoint,
}

impl ConnectedPair {
    /// Keep one end and close the other.
    ///
    /// After a fork each process calls this so that it holds exactly one
    /// endpoint of the pair.
    pub fn keep(self, side: Side) -> Result<Endpoint> {
        let (kept, other) = match side {
            Side::First => (self.first, self.second),
            Side::Second => (self.second, self.first),
        };
        debug!(kept = kept.raw_fd(), closed = other.raw_fd(), "narrowing socket pair");
        other.close()?;
        Ok(kept)
    }

    pub fn close(self) -> Result<()> {
        self.first.close()?;
        self.second.close()
    }
}

/// Create a connected, full-duplex, local stream socket pair.
pub fn create_connected_pair() -> Result<ConnectedPair> {
    let (first, second) =
        socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::empty())
            .map_err(|e| Error::resource("socketpair", e))?;
    let pair = ConnectedPair {
        first: Endpoint { fd: first },
        second: Endpoint { fd: second },
    };
    debug!(
        first = pair.first.raw_fd(),
        second = pair.second.raw_fd(),
        "socketpair"
    );
    Ok(pair)
}

/// Create an unconnected IPv4 stream socket.
pub fn create_stream_socket() -> Result<OwnedFd> {
    let fd = socket(AddressFamily::Inet, SockType::Stream, SockFlag::empty(), None)
        .map_err(|e| Error::resource("socket", e))?;
    debug!(fd = fd.as_raw_fd(), "socket");
    Ok(fd)
}
