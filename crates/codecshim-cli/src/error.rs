// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Session failed to set up or run on the virtual device
    Device(String),
    /// Session interrupted before completion (SIGINT)
    Interrupted(String),
    /// General error
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Device(msg) => write!(f, "Device error: {}", msg),
            CliError::Interrupted(msg) => write!(f, "Interrupted: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidArgs(_) => ExitCode::from(2),
            CliError::Device(_) => ExitCode::from(3),
            CliError::Interrupted(_) => ExitCode::from(130),
            CliError::General(_) => ExitCode::from(1),
        }
    }
}

impl From<codecshim::Error> for CliError {
    fn from(err: codecshim::Error) -> Self {
        CliError::Device(err.to_string())
    }
}

/// Convert a command result into the process exit code, logging the error.
pub fn result_to_exit_code(result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            err.exit_code()
        }
    }
}
