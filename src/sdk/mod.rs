//! Driving the SDK from scenario bodies
//!
//! - `process` - generic child process execution (streaming, timeout, exit-code validation)
//! - `cli` - the `dotnet` commands scenarios use, with the scrubbed environment applied

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cli;
pub mod process;

pub use cli::{PublishOptions, SdkCli};
pub use process::{CommandSpec, OutputStream, ProcessError, ProcessOutput, ProcessRunner};
