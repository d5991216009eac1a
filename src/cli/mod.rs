//! CLI module for the scenario test runner
//!
//! This module turns command-line arguments into a [`RunConfiguration`] and hands it to the runner.
//!
//! ## Usage
//!
//! - `sdk-scenarios --dotnet-root <DIR>` - run every registered scenario
//! - `sdk-scenarios --dotnet-root <DIR> --list --offline-only` - list the scenarios that would run offline
//! - `sdk-scenarios --dotnet-root <DIR> --no-traits resources=online --xml results.xml` - filter and record results
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::runner::{self, RegistryDiscovery, RunConfiguration, RunnerError};
use crate::version::{ARTIFACT_NAME, VERSION};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<RunnerError> for CliError {
    fn from(err: RunnerError) -> Self {
        CliError::failure(format!("{:?}", miette::Report::new(err)))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Runs the SDK scenario tests registered in this binary
#[derive(Parser, Debug)]
#[command(name = "sdk-scenarios")]
#[command(version = VERSION)]
#[command(about = "Scenario tests for the SDK command-line surface", long_about = None)]
pub struct Cli {
    /// SDK installation directory (must contain the `dotnet` host)
    #[arg(long = "dotnet-root", value_name = "DIR")]
    pub dotnet_root: PathBuf,

    /// Scratch directory for scenario projects (default: a new temporary directory)
    #[arg(long = "test-root", value_name = "DIR")]
    pub test_root: Option<PathBuf>,

    /// SDK version to pin in generated projects
    #[arg(long = "sdk-version", value_name = "VERSION")]
    pub sdk_version: Option<String>,

    /// List the selected tests instead of running them
    #[arg(long)]
    pub list: bool,

    /// Only run tests tagged Category=Offline
    #[arg(long = "offline-only")]
    pub offline_only: bool,

    /// Run tests tagged with any of these traits
    #[arg(long, value_name = "KEY=VALUE", num_args = 1..)]
    pub traits: Vec<String>,

    /// Skip tests tagged with any of these traits
    #[arg(long = "no-traits", value_name = "KEY=VALUE", num_args = 1..)]
    pub no_traits: Vec<String>,

    /// Write xUnit-style results to this file
    #[arg(long, value_name = "PATH")]
    pub xml: Option<PathBuf>,

    /// Keep the test root after the run
    #[arg(long = "no-cleanup")]
    pub no_cleanup: bool,

    /// Runtime identifier to target (default: that of this process, e.g. linux-x64)
    #[arg(long = "target-rid", value_name = "RID")]
    pub target_rid: Option<String>,
}

impl Cli {
    pub fn into_configuration(self) -> RunConfiguration {
        let mut config = RunConfiguration::new(self.dotnet_root)
            .list_only(self.list)
            .offline_only(self.offline_only)
            .no_cleanup(self.no_cleanup);
        config.test_root = self.test_root;
        config.sdk_version = self.sdk_version;
        config.xml_path = self.xml;
        config.traits = self.traits;
        config.no_traits = self.no_traits;
        if let Some(rid) = self.target_rid {
            config.target_rid = rid;
        }
        config
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. Usage errors found
/// by clap itself exit with clap's own status code.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the run described by `cli` and return the process exit code.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.into_configuration();
    tracing::debug!(?config, "run configuration");

    let discovery = RegistryDiscovery::new(ARTIFACT_NAME);
    let outcome = runner::run_tests(&config, &discovery, &mut io::stdout())?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ============================================================================
// Tests
// ============================================================================
