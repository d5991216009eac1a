//! Run configuration
//!
//! Built once from parsed arguments and read-only afterwards. Its four environment-facing fields become the
//! [`ScenarioEnvironment`] published to scenario bodies.

use std::path::{Path, PathBuf};

use scenario_core::ScenarioEnvironment;
use scenario_core::env::{contains_host, host_executable_name};

use super::RunnerError;
use super::filter::TraitFilter;

/// Everything one invocation of the runner needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub dotnet_root: PathBuf,
    /// Scratch directory; `None` generates a temporary one when the environment is prepared.
    pub test_root: Option<PathBuf>,
    pub sdk_version: Option<String>,
    pub target_rid: String,
    pub list_only: bool,
    pub offline_only: bool,
    /// Raw `KEY=VALUE` inclusions
    pub traits: Vec<String>,
    /// Raw `KEY=VALUE` exclusions
    pub no_traits: Vec<String>,
    pub xml_path: Option<PathBuf>,
    pub no_cleanup: bool,
}

impl RunConfiguration {
    pub fn new(dotnet_root: impl Into<PathBuf>) -> Self {
        Self {
            dotnet_root: dotnet_root.into(),
            test_root: None,
            sdk_version: None,
            target_rid: current_rid(),
            list_only: false,
            offline_only: false,
            traits: Vec::new(),
            no_traits: Vec::new(),
            xml_path: None,
            no_cleanup: false,
        }
    }

    pub fn with_test_root(mut self, test_root: impl Into<PathBuf>) -> Self {
        self.test_root = Some(test_root.into());
        self
    }

    pub fn with_sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    pub fn with_target_rid(mut self, rid: impl Into<String>) -> Self {
        self.target_rid = rid.into();
        self
    }

    pub fn list_only(mut self, list_only: bool) -> Self {
        self.list_only = list_only;
        self
    }

    pub fn offline_only(mut self, offline_only: bool) -> Self {
        self.offline_only = offline_only;
        self
    }

    pub fn with_trait(mut self, raw: impl Into<String>) -> Self {
        self.traits.push(raw.into());
        self
    }

    pub fn without_trait(mut self, raw: impl Into<String>) -> Self {
        self.no_traits.push(raw.into());
        self
    }

    pub fn with_xml(mut self, path: impl Into<PathBuf>) -> Self {
        self.xml_path = Some(path.into());
        self
    }

    pub fn no_cleanup(mut self, no_cleanup: bool) -> Self {
        self.no_cleanup = no_cleanup;
        self
    }

    /// Check the SDK root before any phase runs.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !contains_host(&self.dotnet_root) {
            return Err(RunnerError::InvalidDotnetRoot {
                path: self.dotnet_root.clone(),
                host: host_executable_name(),
            });
        }
        Ok(())
    }

    /// The filter described by `--traits`, `--no-traits` and `--offline-only`.
    pub fn trait_filter(&self) -> Result<TraitFilter, RunnerError> {
        Ok(TraitFilter::from_args(&self.traits, &self.no_traits, self.offline_only)?)
    }

    /// The environment scenario bodies see, once the test root is known.
    pub fn environment(&self, test_root: &Path) -> ScenarioEnvironment {
        ScenarioEnvironment {
            dotnet_root: self.dotnet_root.clone(),
            test_root: test_root.to_path_buf(),
            sdk_version: self.sdk_version.clone().filter(|version| !version.is_empty()),
            target_rid: self.target_rid.clone(),
        }
    }
}

/// Runtime identifier of the running process, for example `linux-x64` or `osx-arm64`.
pub fn current_rid() -> String {
    let os = match std::env::consts::OS {
        "macos" => "osx",
        "windows" => "win",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        "arm" => "arm",
        other => other,
    };
    format!("{}-{}", os, arch)
}
