// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tour_core::{Demo, ExitCodePolicy, TourConfig};
use tour_logging::CliLoggingArgs;
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(
    name = "syscall-tour",
    author,
    version,
    about = "Walk through open/read/write/close, readlink, socketpair, fork and exec"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// File written and read back (default: x.txt)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Symbolic link to resolve (default: /bin/sh)
    #[arg(long, global = true)]
    link: Option<PathBuf>,

    /// Message sent from parent to child (default: Hello)
    #[arg(long, global = true)]
    message: Option<String>,

    /// How failures map to exit codes
    #[arg(long, value_enum, global = true)]
    exit_codes: Option<ExitCodes>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExitCodes {
    /// Every failure exits with 1
    Uniform,
    /// Distinct exit code per failure kind
    PerKind,
}

impl From<ExitCodes> for ExitCodePolicy {
    fn from(value: ExitCodes) -> Self {
        match value {
            ExitCodes::Uniform => ExitCodePolicy::Uniform,
            ExitCodes::PerKind => ExitCodePolicy::PerKind,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the whole tour (the default)
    All,
    /// Create or open the file and print its descriptor
    Open,
    /// Truncate the file and write the payload
    Write,
    /// Read the file back
    Read,
    /// Write the payload and close the descriptor
    Close,
    /// Print the target of the symbolic link
    Readlink,
    /// Create and close an IPv4 stream socket
    Socket,
    /// Create a socket pair and pass the message across it
    Socketpair,
    /// Send the message on a socket pair
    Send,
    /// Send and receive the message on a socket pair
    Recv,
    /// Fork and print process IDs from both sides
    Fork,
    /// Replace this process with the configured program
    Exec,
}

impl From<Command> for Demo {
    fn from(command: Command) -> Self {
        match command {
            Command::All => Demo::All,
            Command::Open => Demo::Open,
            Command::Write => Demo::Write,
            Command::Read => Demo::Read,
            Command::Close => Demo::Close,
            Command::Readlink => Demo::Readlink,
            Command::Socket => Demo::Socket,
            Command::Socketpair => Demo::Socketpair,
            Command::Send => Demo::Send,
            Command::Recv => Demo::Recv,
            Command::Fork => Demo::Fork,
            Command::Exec => Demo::Exec,
        }
    }
}

impl Cli {
    fn load_config(&self) -> tour_core::Result<TourConfig> {
        let mut config = TourConfig::load(self.config.as_deref())?;
        if let Some(file) = &self.file {
            config.file.path = file.clone();
        }
        if let Some(link) = &self.link {
            config.link.path = link.clone();
        }
        if let Some(message) = &self.message {
            config.ipc.message = message.clone();
        }
        if let Some(exit_codes) = self.exit_codes {
            config.exit_codes = exit_codes.into();
        }
        config.validate()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli.logging.clone().init("syscall-tour") {
        eprintln!("error: failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    // Flags are known before the config is; fall back to the flag or the default.
    let fallback_policy = cli.exit_codes.map(Into::into).unwrap_or_default();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => return report(&e, fallback_policy),
    };
    debug!(?config, "configuration loaded");

    let demo: Demo = cli.command.unwrap_or(Command::All).into();
    match demo.run(&config, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e, config.exit_codes),
    }
}

fn report(err: &tour_core::Error, policy: ExitCodePolicy) -> ExitCode {
    error!(kind = ?err.kind(), "{}", err);
    eprintln!("error: {}", err);
    let code = err.exit_code(policy).clamp(1, 255) as u8;
    ExitCode::from(code)
}
