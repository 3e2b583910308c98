// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! A guided tour of POSIX file, link, socket and process system calls.
//!
//! Each module wraps one family of calls and issues exactly one call per
//! operation; [`tour::run_tour`] chains them the way a shell-less program
//! would: write a file, read it back, resolve a link, fork, talk over a
//! socket pair and exec.

pub mod config;
pub mod demos;
pub mod error;
mod fd;
pub mod file;
pub mod ipc;
pub mod link;
pub mod process;
pub mod tour;

pub use config::TourConfig;
pub use demos::Demo;
pub use error::{Error, ErrorKind, ExitCodePolicy, Result};
pub use tour::{TourReport, run_tour};
