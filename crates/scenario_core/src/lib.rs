//! Shared vocabulary for SDK scenario tests and the runner that executes them.
//!
//! This crate is the contract between scenario bodies and the runner:
//! - [`TestCase`] / [`ScenarioDescriptor`]: what a scenario is and how it is registered at build time
//! - [`ScenarioError`] / [`Failure`]: how a body reports that it skipped or failed
//! - [`env`]: the run parameters published once by the runner and read by every body
//!
//! ## Notes
//!
//! - Registration happens through the `#[scenario]` attribute from `scenario_derive`, which expands to an
//!   [`inventory::submit!`] of a [`ScenarioDescriptor`]. The runner enumerates them with [`registered`].
//! - The published [`env::ScenarioEnvironment`] is the only global state in the system.

pub mod case;
pub mod env;
pub mod outcome;

pub use case::{ScenarioDescriptor, ScenarioFn, SourceLocation, TestCase, TraitMap, registered};
pub use env::{EnvironmentError, ScenarioEnvironment};
pub use outcome::{Failure, ScenarioError, ScenarioResult, ensure, ensure_contains, ensure_eq};

// Re-exported so `#[scenario]` expansions only need a path to this crate.
#[doc(hidden)]
pub use inventory;
