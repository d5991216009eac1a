//! Standalone scenario test runner
//!
//! One run flows strictly through these phases:
//!
//! ```text
//! validate → (list? print names) → bootstrap → discover → filter → execute → write XML → teardown
//! ```
//!
//! ## Modules
//!
//! - `config` - [`RunConfiguration`], built once from the command line
//! - `filter` - `--traits` / `--no-traits` / `--offline-only` predicate
//! - `discovery` - enumerates registered scenarios; blocks until discovery signals completion
//! - `bootstrap` - test root creation and the published scenario environment
//! - `executor` - sequential execution with panic capture; blocks until the run signals completion
//! - `sinks` / `xml` - console, summary, diagnostics and the results document
//! - `capture` - panic hook that turns a panicking body into a failure

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod bootstrap;
pub mod capture;
pub mod config;
pub mod discovery;
pub mod events;
pub mod executor;
pub mod filter;
pub mod sinks;
pub mod xml;

use std::io::{self, Write};
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub use config::RunConfiguration;
pub use discovery::{DiscoveryError, RegistryDiscovery, StaticDiscovery, TestDiscovery};
pub use events::{ExecutionEvent, ExecutionSummary, TestCaseResult, TestOutcome};
pub use executor::TestExecutor;
pub use filter::{FilterError, TraitArg, TraitFilter};
pub use sinks::{ConsoleSink, DiagnosticSink, Dispatcher, ExecutionSink, SummarySink, XmlSink, summary_line};
pub use xml::{ResultDocument, ResultsError};

use bootstrap::PreparedEnvironment;

// ============================================================================
// Errors
// ============================================================================

/// Errors that stop a run. Test failures are never reported through this type.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("invalid trait filter")]
    #[diagnostic(code(runner::usage), help("trait arguments take the form KEY=VALUE, for example Category=Offline"))]
    Filter(#[from] FilterError),

    #[error("`{}` does not contain `{host}`", .path.display())]
    #[diagnostic(code(runner::usage), help("point --dotnet-root at an SDK installation directory"))]
    InvalidDotnetRoot { path: PathBuf, host: &'static str },

    #[error("failed to create test root `{}`", .path.display())]
    #[diagnostic(code(runner::environment))]
    EnvironmentSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create a temporary test root")]
    #[diagnostic(code(runner::environment), help("pass --test-root to choose the directory explicitly"))]
    TempRoot(#[source] io::Error),

    #[error("test discovery failed")]
    #[diagnostic(code(runner::discovery))]
    Discovery(#[from] DiscoveryError),

    #[error("failed to start the executor")]
    #[diagnostic(code(runner::execution))]
    ExecutorSpawn(#[source] io::Error),

    #[error("execution stopped before signalling completion")]
    #[diagnostic(code(runner::execution))]
    ExecutionInterrupted,

    #[error("failed to write results to `{}`", .path.display())]
    #[diagnostic(code(runner::results))]
    Results {
        path: PathBuf,
        #[source]
        source: ResultsError,
    },

    #[error("failed to write test listing")]
    #[diagnostic(code(runner::output))]
    Output(#[source] io::Error),
}

// ============================================================================
// Entry point
// ============================================================================

/// How a run ended, when it ended without a runner error.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// `--list`: names were printed, nothing ran
    Listed { count: usize },
    Executed { summary: ExecutionSummary },
}

impl RunOutcome {
    /// Whether the process should exit with status 0.
    pub fn is_success(&self) -> bool {
        match self {
            RunOutcome::Listed { .. } => true,
            RunOutcome::Executed { summary } => !summary.has_failures(),
        }
    }
}

/// Run (or list) the cases produced by `discovery`, writing console output to `out`.
///
/// Usage errors are reported before anything touches the file system. Once the environment is prepared it is
/// always torn down, even when a later phase fails.
pub fn run_tests<W: Write>(
    config: &RunConfiguration,
    discovery: &dyn TestDiscovery,
    out: &mut W,
) -> Result<RunOutcome, RunnerError> {
    config.validate()?;
    let filter = config.trait_filter()?;

    if config.list_only {
        return list_tests(discovery, &filter, out);
    }

    let prepared = bootstrap::prepare(config)?;
    let result = execute(config, discovery, &filter, &prepared, out);
    bootstrap::teardown(&prepared, config.no_cleanup);
    result
}

/// Print one filtered case name per line. Never publishes the environment or runs a body.
fn list_tests<W: Write>(
    discovery: &dyn TestDiscovery,
    filter: &TraitFilter,
    out: &mut W,
) -> Result<RunOutcome, RunnerError> {
    let cases = filter.apply(discovery.discover()?);
    for case in &cases {
        writeln!(out, "{}", case.name()).map_err(RunnerError::Output)?;
    }
    out.flush().map_err(RunnerError::Output)?;
    Ok(RunOutcome::Listed { count: cases.len() })
}

fn execute<W: Write>(
    config: &RunConfiguration,
    discovery: &dyn TestDiscovery,
    filter: &TraitFilter,
    prepared: &PreparedEnvironment,
    out: &mut W,
) -> Result<RunOutcome, RunnerError> {
    let discovered = discovery.discover()?;
    let discovered_count = discovered.len();
    let cases = filter.apply(discovered);
    tracing::info!(discovered = discovered_count, selected = cases.len(), "cases filtered");

    let mut xml = XmlSink::new();
    let mut summary_sink = SummarySink::new();
    let mut console = ConsoleSink::new(&mut *out);
    let mut diagnostics = DiagnosticSink::new();

    let executor = TestExecutor::new(discovery.artifact_name(), prepared.environment().target_rid.as_str());
    let summary = {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register(&mut xml)
            .register(&mut summary_sink)
            .register(&mut console)
            .register(&mut diagnostics);
        executor.run(cases, &mut dispatcher)?
    };

    if let Some(path) = &config.xml_path {
        xml.into_document()
            .write_to(path)
            .map_err(|source| RunnerError::Results {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), "results written");
    }

    Ok(RunOutcome::Executed { summary })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use scenario_core::{ScenarioResult, TestCase, env};

    use super::*;

    fn never_runs() -> ScenarioResult {
        panic!("listing must not run bodies")
    }

    fn fake_dotnet_root() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(env::host_executable_name()), b"").unwrap();
        root
    }

    fn discovery() -> StaticDiscovery {
        StaticDiscovery::new(
            "sdk-scenarios",
            vec![
                TestCase::new("scenarios::console", never_runs).with_trait("Category", "Offline"),
                TestCase::new("scenarios::publish", never_runs).with_trait("Category", "Online"),
            ],
        )
    }

    #[test]
    fn test_list_prints_filtered_names_without_side_effects() {
        let dotnet = fake_dotnet_root();
        let scratch = tempfile::tempdir().unwrap();
        let test_root = scratch.path().join("root");
        let config = RunConfiguration::new(dotnet.path())
            .with_test_root(&test_root)
            .list_only(true)
            .offline_only(true);

        let mut out = Vec::new();
        let outcome = run_tests(&config, &discovery(), &mut out).unwrap();

        assert_eq!(outcome, RunOutcome::Listed { count: 1 });
        assert!(outcome.is_success());
        assert_eq!(String::from_utf8(out).unwrap(), "scenarios::console\n");
        assert!(!test_root.exists());
    }

    #[test]
    fn test_usage_errors_precede_every_phase() {
        let scratch = tempfile::tempdir().unwrap();
        let test_root = scratch.path().join("root");

        let config = RunConfiguration::new(scratch.path()).with_test_root(&test_root);
        let err = run_tests(&config, &discovery(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, RunnerError::InvalidDotnetRoot { .. }));

        let dotnet = fake_dotnet_root();
        let config = RunConfiguration::new(dotnet.path())
            .with_test_root(&test_root)
            .without_trait("=Online");
        let err = run_tests(&config, &discovery(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, RunnerError::Filter(FilterError::MalformedTrait { .. })));

        assert!(!test_root.exists());
    }

    #[test]
    fn test_outcome_success() {
        let mut summary = ExecutionSummary::default();
        summary.record(&TestOutcome::Skipped("offline".to_string()));
        assert!(RunOutcome::Executed { summary }.is_success());

        summary.record_error();
        assert!(!RunOutcome::Executed { summary }.is_success());
    }
}
