// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod caps;
mod error;
mod run;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// codecshim CLI - Virtual codec device session and diagnostics tool
#[derive(Parser)]
#[command(name = "codecshim")]
#[command(version)]
#[command(about = "codecshim CLI - Virtual codec device session and diagnostics tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output metrics in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pump a synthetic session through the loopback codec and report throughput
    Run(run::Args),

    /// Display the virtual device capabilities
    Caps(caps::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.json),
        Commands::Caps(args) => caps::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
