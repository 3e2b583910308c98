// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tour configuration.
//!
//! Values are layered, lowest precedence first:
//!
//! 1. built-in defaults (the reference run: `x.txt`, `"Hi"`, `/bin/sh`, ...)
//! 2. an optional TOML file
//! 3. `SYSCALL_TOUR_<SECTION>__<KEY>` environment variables
//! 4. command-line overrides applied by the caller
//!
//! Keys are kebab-case in TOML (`read-capacity`) and snake_case in the
//! environment (`SYSCALL_TOUR_FILE__READ_CAPACITY`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ExitCodePolicy, Result};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SYSCALL_TOUR";

/// Largest accepted `file.read-capacity` and `ipc.recv-capacity`
pub const MAX_BUFFER_CAPACITY: usize = 64 * 1024;

/// Largest accepted `link.capacity`; no link target is longer than `PATH_MAX`
pub const MAX_LINK_CAPACITY: usize = libc::PATH_MAX as usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub path: PathBuf,
    pub payload: String,
    /// Permission bits used when the file is created
    pub mode: u32,
    pub read_capacity: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("x.txt"),
            payload: "Hi".to_string(),
            mode: 0o644,
            read_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LinkConfig {
    pub path: PathBuf,
    pub capacity: usize,
    /// Fail instead of warning when the target fills the whole buffer
    pub strict_length: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/bin/sh"),
            capacity: 100,
            strict_length: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IpcConfig {
    pub message: String,
    pub recv_capacity: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            message: "Hello".to_string(),
            recv_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecConfig {
    pub program: String,
    /// Full argv, including the program's own name
    pub args: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            program: "/bin/echo".to_string(),
            args: vec!["echo".to_string(), "Child executed exec()".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TourConfig {
    pub file: FileConfig,
    pub link: LinkConfig,
    pub ipc: IpcConfig,
    pub exec: ExecConfig,
    pub exit_codes: ExitCodePolicy,
}

impl TourConfig {
    /// Load from defaults, an optional TOML file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, None)
    }

    /// Like [`TourConfig::load`], with an explicit environment map in place
    /// of the process environment.
    pub fn load_with_env(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }

        let vars: Vec<(String, String)> = match env {
            Some(vars) => vars.into_iter().collect(),
            None => std::env::vars().collect(),
        };
        for (name, value) in vars {
            let Some(key) = env_key(&name) else {
                continue;
            };
            builder = if key == "exec.args" {
                let list: Vec<String> = value.split(',').map(str::to_string).collect();
                builder.set_override(key, list)?
            } else {
                builder.set_override(key, value)?
            };
        }

        let raw = builder.build()?;
        let config: TourConfig = raw.try_deserialize()?;
        config.validate()
    }

    /// Reject values no tour step can work with.
    pub fn validate(self) -> Result<Self> {
        let fail = |msg: &str| Err(Error::Config(msg.to_string()));

        if self.file.path.as_os_str().is_empty() {
            return fail("file.path must not be empty");
        }
        if self.file.payload.is_empty() {
            return fail("file.payload must not be empty");
        }
        if self.file.mode > 0o7777 {
            return fail("file.mode must be a permission mask (at most 0o7777)");
        }
        if self.file.read_capacity == 0 {
            return fail("file.read-capacity must be at least 1");
        }
        if self.file.read_capacity > MAX_BUFFER_CAPACITY {
            return Err(Error::Config(format!(
                "file.read-capacity must be at most {}",
                MAX_BUFFER_CAPACITY
            )));
        }
        if self.link.capacity == 0 {
            return fail("link.capacity must be at least 1");
        }
        if self.link.capacity > MAX_LINK_CAPACITY {
            return Err(Error::Config(format!(
                "link.capacity must be at most {}",
                MAX_LINK_CAPACITY
            )));
        }
        if self.ipc.message.is_empty() {
            return fail("ipc.message must not be empty");
        }
        if self.ipc.recv_capacity > MAX_BUFFER_CAPACITY {
            return Err(Error::Config(format!(
                "ipc.recv-capacity must be at most {}",
                MAX_BUFFER_CAPACITY
            )));
        }
        if self.ipc.recv_capacity < self.ipc.message.len() {
            return Err(Error::Config(format!(
                "ipc.recv-capacity ({}) is smaller than the {}-byte message",
                self.ipc.recv_capacity,
                self.ipc.message.len()
            )));
        }
        if self.exec.program.is_empty() || self.exec.args.is_empty() {
            return fail("exec.program and exec.args must not be empty");
        }
        Ok(self)
    }
}

/// Map `SYSCALL_TOUR_IPC__RECV_CAPACITY` to `ipc.recv-capacity`.
fn env_key(name: &str) -> Option<String> {
    let rest = name.strip_prefix(ENV_PREFIX)?.strip_prefix('_')?;
    if rest.is_empty() {
        return None;
    }
    let key = rest
        .to_lowercase()
        .split("__")
        .map(|segment| segment.replace('_', "-"))
        .collect::<Vec<_>>()
        .join(".");
    Some(key)
}
