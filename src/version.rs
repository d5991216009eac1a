//! Runner version information.
//!
//! Exposes the version and the identity reported in results documents as constants so the CLI and the XML
//! writer agree on the same values.
//!
//! ## Notes
//!
//! - The version is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer these constants over repeating `env!(..)` in multiple places.

/// The runner version string (for example, `0.1.0`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the artifact whose scenarios are discovered, reported as the assembly name.
pub const ARTIFACT_NAME: &str = "sdk-scenarios";

/// The `test-framework` attribute of results documents.
pub const FRAMEWORK_NAME: &str = concat!("sdk-scenarios ", env!("CARGO_PKG_VERSION"));
