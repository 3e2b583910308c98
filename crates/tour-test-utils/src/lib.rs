// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test helpers for the syscall-tour workspace.
//!
//! Every test that runs the binary gets its own log file; on success only a
//! one-line marker is printed, and a failing logged assertion panics with the
//! log path.

pub mod logging;
pub mod macros;

pub use logging::{TestLogError, TestLogger, create_unique_test_log};
