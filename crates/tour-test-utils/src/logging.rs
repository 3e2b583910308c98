// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-test log files.
//!
//! Tests that drive the `syscall-tour` binary produce stdout from two
//! processes plus whatever the exec'd program prints. Dumping that inline
//! makes failures hard to read, so each test writes it to its own file under
//! `target/test-logs/<date>/` and only the path is printed on failure.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Output;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TestLogError {
    #[error("Failed to create test log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write to test log file: {path}")]
    WriteError { path: PathBuf },

    #[error("Invalid test name: {name}")]
    InvalidTestName { name: String },
}

/// Log file for a single test
pub struct TestLogger {
    log_path: PathBuf,
    writer: BufWriter<File>,
    test_name: String,
    start_time: DateTime<Utc>,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        validate_test_name(test_name)?;

        let log_path = create_unique_test_log(test_name)?;
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&log_path)?;

        let mut logger = Self {
            log_path,
            writer: BufWriter::new(file),
            test_name: test_name.to_string(),
            start_time: Utc::now(),
        };
        logger.write_header()?;
        Ok(logger)
    }

    /// Append a timestamped line
    pub fn log(&mut self, message: &str) -> Result<(), TestLogError> {
        let timestamp = Utc::now().format("%H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, message)
            .and_then(|_| self.writer.flush())
            .map_err(|_| TestLogError::WriteError {
                path: self.log_path.clone(),
            })
    }

    /// Record the status and both output streams of a finished command
    pub fn log_output(&mut self, label: &str, output: &Output) -> Result<(), TestLogError> {
        self.log(&format!("{}: status {}", label, output.status))?;
        self.log(&format!(
            "{} stdout:\n{}",
            label,
            String::from_utf8_lossy(&output.stdout)
        ))?;
        self.log(&format!(
            "{} stderr:\n{}",
            label,
            String::from_utf8_lossy(&output.stderr)
        ))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Close the log and print a one-line pass marker
    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        let elapsed = Utc::now().signed_duration_since(self.start_time);
        self.log(&format!(
            "Test completed successfully in {:.3}s",
            elapsed.num_milliseconds() as f64 / 1000.0
        ))?;
        drop(self.writer);

        println!("✅ {} passed", self.test_name);
        Ok(self.log_path)
    }

    fn write_header(&mut self) -> Result<(), TestLogError> {
        writeln!(self.writer, "=== syscall-tour test log ===")?;
        writeln!(self.writer, "Test: {}", self.test_name)?;
        writeln!(
            self.writer,
            "Started: {}",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(self.writer, "Process: {}", std::process::id())?;
        writeln!(self.writer, "=== Log Output ===")?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Unique path `target/test-logs/YYYY-MM-DD/<name>-HH-MM-SS-<uuid>.log`,
/// with its directory created.
pub fn create_unique_test_log(test_name: &str) -> Result<PathBuf, TestLogError> {
    let now = Utc::now();
    let log_dir = find_workspace_root()?
        .join("target")
        .join("test-logs")
        .join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&log_dir)?;

    let filename = format!(
        "{}-{}-{}.log",
        sanitize_filename(test_name),
        now.format("%H-%M-%S"),
        Uuid::new_v4()
    );
    Ok(log_dir.join(filename))
}

/// Nearest ancestor whose Cargo.toml declares a `[workspace]`, or the current directory.
fn find_workspace_root() -> Result<PathBuf, TestLogError> {
    let current_dir = env::current_dir()?;

    for dir in current_dir.ancestors() {
        let cargo_toml = dir.join("Cargo.toml");
        if let Ok(content) = fs::read_to_string(&cargo_toml) {
            if content.contains("[workspace]") {
                return Ok(dir.to_path_buf());
            }
        }
    }
    Ok(current_dir)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

fn validate_test_name(name: &str) -> Result<(), TestLogError> {
    if name.is_empty() || name.len() > 200 {
        return Err(TestLogError::InvalidTestName {
            name: name.chars().take(200).collect(),
        });
    }
    Ok(())
}
