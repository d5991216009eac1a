//! Run parameters shared between the runner and scenario bodies.
//!
//! The runner publishes one [`ScenarioEnvironment`] before any body starts and never changes it while the run is
//! in progress. Bodies read it through [`ScenarioEnvironment::current`]. When nothing has been published (a body
//! invoked outside the runner) the four `SCENARIO_TESTS_*` process variables are read instead.
//!
//! The variable names are a fixed contract: they are also exported to every SDK child process.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

/// Installation root of the SDK under test.
pub const DOTNET_ROOT_VAR: &str = "SCENARIO_TESTS_DOTNET_ROOT";
/// Scratch directory scenarios create their projects in.
pub const TEST_ROOT_VAR: &str = "SCENARIO_TESTS_TEST_ROOT";
/// Optional SDK version pin; empty or absent means "use the default".
pub const SDK_VERSION_VAR: &str = "SCENARIO_TESTS_SDK_VERSION";
/// Target runtime identifier (for example `linux-x64`).
pub const TARGET_RID_VAR: &str = "SCENARIO_TESTS_TARGET_RID";

static PUBLISHED: RwLock<Option<Arc<ScenarioEnvironment>>> = RwLock::new(None);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("scenario environment is not published and `{0}` is not set")]
    Missing(&'static str),
}

/// The four run parameters every scenario body may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioEnvironment {
    pub dotnet_root: PathBuf,
    pub test_root: PathBuf,
    pub sdk_version: Option<String>,
    pub target_rid: String,
}

impl ScenarioEnvironment {
    /// The published environment, or one read from the process variables.
    pub fn current() -> Result<Arc<ScenarioEnvironment>, EnvironmentError> {
        match published() {
            Some(environment) => Ok(environment),
            None => Self::from_process_env().map(Arc::new),
        }
    }

    /// Read the four `SCENARIO_TESTS_*` variables.
    pub fn from_process_env() -> Result<Self, EnvironmentError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the four variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvironmentError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(EnvironmentError::Missing(name))
        };

        Ok(Self {
            dotnet_root: PathBuf::from(required(DOTNET_ROOT_VAR)?),
            test_root: PathBuf::from(required(TEST_ROOT_VAR)?),
            sdk_version: lookup(SDK_VERSION_VAR).filter(|value| !value.is_empty()),
            target_rid: required(TARGET_RID_VAR)?,
        })
    }

    /// `(name, value)` pairs for exporting to child processes. An absent SDK version exports as empty.
    pub fn variables(&self) -> [(&'static str, String); 4] {
        [
            (DOTNET_ROOT_VAR, self.dotnet_root.display().to_string()),
            (TEST_ROOT_VAR, self.test_root.display().to_string()),
            (SDK_VERSION_VAR, self.sdk_version.clone().unwrap_or_default()),
            (TARGET_RID_VAR, self.target_rid.clone()),
        ]
    }

    /// Full path of the SDK host executable.
    pub fn dotnet_executable(&self) -> PathBuf {
        self.dotnet_root.join(host_executable_name())
    }

    /// A per-scenario working directory under the test root (not created).
    pub fn scenario_dir(&self, name: &str) -> PathBuf {
        self.test_root.join(name)
    }
}

/// File name of the SDK host executable on this platform.
pub fn host_executable_name() -> &'static str {
    if cfg!(windows) { "dotnet.exe" } else { "dotnet" }
}

/// Whether `root` contains the SDK host executable.
pub fn contains_host(root: &Path) -> bool {
    root.join(host_executable_name()).is_file()
}

/// Publish `environment` for the rest of the run, replacing any previous one.
pub fn publish(environment: ScenarioEnvironment) -> Arc<ScenarioEnvironment> {
    let environment = Arc::new(environment);
    *PUBLISHED.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&environment));
    environment
}

/// The currently published environment, if any.
pub fn published() -> Option<Arc<ScenarioEnvironment>> {
    PUBLISHED.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Remove the published environment (end of run).
pub fn withdraw() -> Option<Arc<ScenarioEnvironment>> {
    PUBLISHED.write().unwrap_or_else(PoisonError::into_inner).take()
}
