// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Drive the `syscall-tour` binary end to end.
//!
//! Every test runs in its own temporary directory so the `x.txt` artifact
//! never collides, and resolves a symlink created there instead of relying
//! on what `/bin/sh` happens to be on the host.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_cmd::assert::OutputAssertExt;
use tour_test_utils::{TestLogger, logged_assert, logged_assert_eq};

struct Scratch {
    dir: tempfile::TempDir,
    link: PathBuf,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("sh");
        symlink("/usr/bin/dash", &link).unwrap();
        Self { dir, link }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The binary in the scratch directory with `SYSCALL_TOUR_*` cleared
    fn base(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_syscall-tour"));
        cmd.current_dir(self.path());
        for (key, _) in std::env::vars() {
            if key.starts_with("SYSCALL_TOUR_") {
                cmd.env_remove(key);
            }
        }
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// [`Scratch::base`] pointed at the scratch symlink
    fn command(&self) -> Command {
        let mut cmd = self.base();
        cmd.arg("--link").arg(&self.link);
        cmd
    }

    fn run(&self, logger: &mut TestLogger, label: &str, cmd: &mut Command) -> Output {
        let output = cmd.output().unwrap();
        logger.log_output(label, &output).unwrap();
        output
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_full_tour_output() {
    let mut logger = TestLogger::new("test_full_tour_output").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(&mut logger, "all", scratch.command().arg("all"));

    logged_assert!(logger, output.status.success(), "tour exits cleanly");
    logged_assert_eq!(
        logger,
        stdout(&output),
        format!(
            "File content: Hi\n{} -> /usr/bin/dash\nChild received: Hello\nChild executed exec()\n",
            scratch.link.display()
        )
    );
    logged_assert_eq!(logger, fs::read(scratch.path().join("x.txt")).unwrap(), b"Hi");
    logger.finish_success().unwrap();
}

#[test]
fn test_no_subcommand_runs_full_tour() {
    let mut logger = TestLogger::new("test_no_subcommand_runs_full_tour").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(&mut logger, "default", &mut scratch.command());

    logged_assert!(logger, output.status.success(), "tour exits cleanly");
    let text = stdout(&output);
    logged_assert!(logger, text.starts_with("File content: Hi\n"));
    logged_assert!(logger, text.ends_with("Child executed exec()\n"));
    logger.finish_success().unwrap();
}

#[test]
fn test_default_link_when_host_has_one() {
    let target = match fs::read_link("/bin/sh") {
        Ok(target) => target,
        Err(_) => return,
    };
    let mut logger = TestLogger::new("test_default_link_when_host_has_one").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_syscall-tour"))
        .current_dir(dir.path())
        .arg("readlink")
        .output()
        .unwrap();
    logger.log_output("readlink", &output).unwrap();

    logged_assert!(logger, output.status.success());
    logged_assert_eq!(
        logger,
        stdout(&output),
        format!("/bin/sh points to: {}\n", target.display())
    );
    logger.finish_success().unwrap();
}

#[test]
fn test_non_link_fails_before_fork() {
    let mut logger = TestLogger::new("test_non_link_fails_before_fork").unwrap();
    let scratch = Scratch::new();
    let plain = scratch.path().join("plain");
    fs::write(&plain, b"regular file").unwrap();

    let output = scratch.run(
        &mut logger,
        "non-link",
        scratch.base().arg("--link").arg(&plain),
    );

    logged_assert_eq!(logger, output.status.code(), Some(1));
    logged_assert_eq!(logger, stdout(&output), "File content: Hi\n");
    logged_assert!(logger, stderr(&output).contains("error: readlink"));
    logger.finish_success().unwrap();
}

#[test]
fn test_per_kind_exit_code_for_non_link() {
    let mut logger = TestLogger::new("test_per_kind_exit_code_for_non_link").unwrap();
    let scratch = Scratch::new();
    let plain = scratch.path().join("plain");
    fs::write(&plain, b"regular file").unwrap();

    let output = scratch.run(
        &mut logger,
        "non-link per-kind",
        scratch
            .base()
            .args(["--exit-codes", "per-kind", "--link"])
            .arg(&plain),
    );

    logged_assert_eq!(logger, output.status.code(), Some(4));
    logger.finish_success().unwrap();
}

#[test]
fn test_exec_failure_from_config_file() {
    let mut logger = TestLogger::new("test_exec_failure_from_config_file").unwrap();
    let scratch = Scratch::new();
    let config = scratch.path().join("tour.toml");
    fs::write(
        &config,
        "[exec]\nprogram = \"/nonexistent/echo\"\nargs = [\"echo\", \"unreachable\"]\n",
    )
    .unwrap();

    let output = scratch.run(
        &mut logger,
        "uniform",
        scratch.command().arg("--config").arg(&config),
    );
    logged_assert_eq!(logger, output.status.code(), Some(1));
    let text = stdout(&output);
    logged_assert!(logger, text.contains("Child received: Hello\n"));
    logged_assert!(logger, !text.contains("unreachable"));
    logged_assert!(logger, stderr(&output).contains("/nonexistent/echo"));

    let output = scratch.run(
        &mut logger,
        "per-kind",
        scratch
            .command()
            .arg("--config")
            .arg(&config)
            .args(["--exit-codes", "per-kind"]),
    );
    logged_assert_eq!(logger, output.status.code(), Some(5));
    logger.finish_success().unwrap();
}

#[test]
fn test_exit_code_policy_from_config_file() {
    let mut logger = TestLogger::new("test_exit_code_policy_from_config_file").unwrap();
    let scratch = Scratch::new();
    let config = scratch.path().join("tour.toml");
    fs::write(&config, "exit-codes = \"per-kind\"\n\n[link]\npath = \"plain\"\n").unwrap();
    fs::write(scratch.path().join("plain"), b"regular file").unwrap();

    // No --link flag, so the path comes from the file
    let output = scratch.run(
        &mut logger,
        "readlink",
        scratch.base().arg("--config").arg(&config).arg("readlink"),
    );

    logged_assert_eq!(logger, output.status.code(), Some(4));
    logger.finish_success().unwrap();
}

#[test]
fn test_env_overrides_message() {
    let mut logger = TestLogger::new("test_env_overrides_message").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(
        &mut logger,
        "env",
        scratch.command().env("SYSCALL_TOUR_IPC__MESSAGE", "Howdy").arg("recv"),
    );

    logged_assert!(logger, output.status.success());
    logged_assert_eq!(logger, stdout(&output), "Data received: Howdy\n");
    logger.finish_success().unwrap();
}

#[test]
fn test_flag_beats_env() {
    let mut logger = TestLogger::new("test_flag_beats_env").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(
        &mut logger,
        "flag",
        scratch
            .command()
            .env("SYSCALL_TOUR_IPC__MESSAGE", "Howdy")
            .args(["--message", "Ahoy", "recv"]),
    );

    logged_assert_eq!(logger, stdout(&output), "Data received: Ahoy\n");
    logger.finish_success().unwrap();
}

#[test]
fn test_invalid_config_exits_before_any_step() {
    let mut logger = TestLogger::new("test_invalid_config_exits_before_any_step").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(
        &mut logger,
        "invalid",
        scratch
            .command()
            .env("SYSCALL_TOUR_LINK__CAPACITY", "0")
            .args(["--exit-codes", "per-kind"]),
    );

    logged_assert_eq!(logger, output.status.code(), Some(8));
    logged_assert!(logger, output.stdout.is_empty());
    logged_assert!(logger, !scratch.path().join("x.txt").exists());
    logger.finish_success().unwrap();
}

#[test]
fn test_oversized_capacity_is_config_error() {
    let mut logger = TestLogger::new("test_oversized_capacity_is_config_error").unwrap();
    let scratch = Scratch::new();

    for (var, demo) in [
        ("SYSCALL_TOUR_LINK__CAPACITY", "readlink"),
        ("SYSCALL_TOUR_IPC__RECV_CAPACITY", "recv"),
        ("SYSCALL_TOUR_FILE__READ_CAPACITY", "all"),
    ] {
        let output = scratch.run(
            &mut logger,
            var,
            scratch
                .command()
                .env(var, "4611686018427387904")
                .args(["--exit-codes", "per-kind", demo]),
        );
        logged_assert_eq!(logger, output.status.code(), Some(8));
        logged_assert!(logger, stderr(&output).contains("must be at most"));
        logged_assert!(logger, output.stdout.is_empty());
    }
    logger.finish_success().unwrap();
}

#[test]
fn test_missing_config_file_is_reported() {
    let mut logger = TestLogger::new("test_missing_config_file_is_reported").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(
        &mut logger,
        "missing",
        scratch.command().args(["--config", "nope.toml"]),
    );

    logged_assert_eq!(logger, output.status.code(), Some(1));
    logged_assert!(logger, stderr(&output).contains("nope.toml"));
    logger.finish_success().unwrap();
}

#[test]
fn test_write_then_read_demos() {
    let mut logger = TestLogger::new("test_write_then_read_demos").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(&mut logger, "write", scratch.command().arg("write"));
    logged_assert_eq!(logger, stdout(&output), "Number of bytes written: 2\n");

    let output = scratch.run(&mut logger, "read", scratch.command().arg("read"));
    logged_assert_eq!(logger, stdout(&output), "Data read from file: Hi\n");
    logger.finish_success().unwrap();
}

#[test]
fn test_fork_demo_prints_both_sides() {
    let mut logger = TestLogger::new("test_fork_demo_prints_both_sides").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(&mut logger, "fork", scratch.command().arg("fork"));

    logged_assert!(logger, output.status.success());
    let text = stdout(&output);
    logged_assert!(logger, text.contains("Parent Process\n"));
    logged_assert!(logger, text.contains("Child Process\n"));
    logged_assert_eq!(logger, text.matches("Parent PID : ").count(), 2);
    logger.finish_success().unwrap();
}

#[test]
fn test_exec_demo_replaces_process() {
    let mut logger = TestLogger::new("test_exec_demo_replaces_process").unwrap();
    let scratch = Scratch::new();

    let output = scratch.run(&mut logger, "exec", scratch.command().arg("exec"));

    logged_assert!(logger, output.status.success());
    logged_assert_eq!(logger, stdout(&output), "Before exec()\nChild executed exec()\n");
    logger.finish_success().unwrap();
}

#[test]
fn test_log_file_receives_debug_output() {
    let mut logger = TestLogger::new("test_log_file_receives_debug_output").unwrap();
    let scratch = Scratch::new();
    let log = scratch.path().join("tour.log");

    let output = scratch.run(
        &mut logger,
        "logged",
        scratch
            .command()
            .args(["--log-level", "debug", "--log-file"])
            .arg(&log)
            .arg("socket"),
    );

    logged_assert!(logger, output.status.success());
    let content = fs::read_to_string(&log).unwrap();
    logger.log(&content).unwrap();
    logged_assert!(logger, content.contains("running demo"));
    // Logging never touches stdout
    logged_assert!(logger, stdout(&output).starts_with("Socket created successfully"));
    logger.finish_success().unwrap();
}

#[test]
fn test_help_lists_every_demo() {
    let bin = env!("CARGO_BIN_EXE_syscall-tour");
    let output = Command::new(bin).arg("--help").assert().success().get_output().stdout.clone();
    let help = String::from_utf8_lossy(&output);
    for needle in [
        "all", "open", "write", "read", "close", "readlink", "socket", "socketpair", "send",
        "recv", "fork", "exec", "--exit-codes", "--log-level",
    ] {
        assert!(help.contains(needle), "help output should include {needle}");
    }
}
