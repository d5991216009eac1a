#![forbid(unsafe_code)]
//! SDK Scenario Tests
//!
//! Scenario tests that drive an SDK command-line surface (project creation, build, run, test, publish) against a
//! real installation, and the standalone runner that discovers, filters, executes and reports on them.
//!
//! ## Layout
//!
//! - [`runner`]: discovery, trait filtering, environment bootstrap, execution and reporting
//! - [`sdk`]: child process execution and the SDK commands scenarios use
//! - [`scenarios`]: the built-in scenarios, registered with `#[scenario]`
//! - [`cli`]: argument parsing and the process entry point
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli`, `runner` and `sdk`
//!   modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Scenario bodies**: A panic inside a scenario is reported as a failure of that scenario, never as a crash of
//!   the run. Prefer returning `ScenarioResult` errors all the same.

pub mod cli;
pub mod runner;
pub mod scenarios;
pub mod sdk;
pub mod version;

pub use runner::{RunConfiguration, RunOutcome, RunnerError, run_tests};
pub use scenario_core::{ScenarioEnvironment, ScenarioError, ScenarioResult, TestCase};
pub use scenario_derive::scenario;
