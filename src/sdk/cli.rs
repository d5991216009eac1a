//! The SDK command-line surface as scenario bodies use it
//!
//! Every command runs the `dotnet` host from the configured SDK root with a scrubbed environment: variables
//! that would redirect resolution to another SDK or MSBuild are removed, telemetry and first-run output are
//! disabled, and the scenario variables are exported so nested tooling sees the same run parameters.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scenario_core::{EnvironmentError, ScenarioEnvironment};

use super::process::{CommandSpec, OutputStream, ProcessError, ProcessOutput, ProcessRunner};

/// Inherited variables that would point the SDK at a different installation or MSBuild.
pub const SCRUBBED_VARIABLES: &[&str] = &[
    "MSBuildSDKsPath",
    "MSBuildExtensionsPath",
    "DOTNET_HOST_PATH",
    "MSBUILD_EXE_PATH",
    "DOTNET_ROOT(x86)",
];

/// Fixed settings applied to every SDK invocation.
pub const FIXED_VARIABLES: &[(&str, &str)] = &[
    ("DOTNET_CLI_TELEMETRY_OPTOUT", "1"),
    ("DOTNET_NOLOGO", "1"),
    ("DOTNET_SKIP_FIRST_TIME_EXPERIENCE", "1"),
    ("MSBUILDDISABLENODEREUSE", "1"),
];

/// Options for `dotnet publish`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub self_contained: bool,
    /// Publish for this runtime identifier instead of the framework-dependent default
    pub runtime: Option<String>,
    pub native_aot: bool,
    pub output: Option<PathBuf>,
}

impl PublishOptions {
    pub fn self_contained(runtime: impl Into<String>) -> Self {
        Self {
            self_contained: true,
            runtime: Some(runtime.into()),
            ..Self::default()
        }
    }

    pub fn native_aot(runtime: impl Into<String>) -> Self {
        Self {
            native_aot: true,
            runtime: Some(runtime.into()),
            ..Self::default()
        }
    }

    fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(runtime) = &self.runtime {
            args.push("-r".to_string());
            args.push(runtime.clone());
        }
        if self.self_contained {
            args.push("--self-contained".to_string());
        }
        if self.native_aot {
            args.push("-p:PublishAot=true".to_string());
        }
        if let Some(output) = &self.output {
            args.push("-o".to_string());
            args.push(output.display().to_string());
        }
        args
    }
}

/// Runs SDK commands against the environment of the current run.
pub struct SdkCli {
    environment: ScenarioEnvironment,
    runner: ProcessRunner,
    timeout: Option<Duration>,
}

impl SdkCli {
    pub fn new(environment: ScenarioEnvironment) -> Self {
        let runner = ProcessRunner::new().with_line_callback(|stream, line| match stream {
            OutputStream::Stdout => tracing::debug!(target: "sdk_scenarios::sdk::output", "{}", line),
            OutputStream::Stderr => tracing::debug!(target: "sdk_scenarios::sdk::output", stderr = true, "{}", line),
        });
        Self {
            environment,
            runner,
            timeout: None,
        }
    }

    /// An SDK driver for the environment published by the runner.
    pub fn from_current() -> Result<Self, EnvironmentError> {
        Ok(Self::new(ScenarioEnvironment::current()?.as_ref().clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn environment(&self) -> &ScenarioEnvironment {
        &self.environment
    }

    /// A `dotnet` invocation in `working_dir` with the scrubbed environment applied.
    pub fn command<I, S>(&self, args: I, working_dir: &Path) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut spec = CommandSpec::new(self.environment.dotnet_executable())
            .args(args)
            .current_dir(working_dir);
        for name in SCRUBBED_VARIABLES {
            spec = spec.env_remove(name);
        }
        spec = spec.env("DOTNET_ROOT", &self.environment.dotnet_root);
        for (name, value) in FIXED_VARIABLES {
            spec = spec.env(name, value);
        }
        for (name, value) in self.environment.variables() {
            spec = spec.env(name, value);
        }
        if let Some(timeout) = self.timeout {
            spec = spec.timeout(timeout);
        }
        spec
    }

    /// Run `spec`, logging its command line first.
    pub fn execute(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        tracing::info!(
            command = %spec,
            working_dir = ?spec.working_dir(),
            "running SDK command"
        );
        self.runner.run(spec)
    }

    /// `dotnet new <template>` into `parent/<name>`; returns the project directory.
    pub fn new_project(&self, template: &str, name: &str, parent: &Path) -> Result<PathBuf, ProcessError> {
        let project_dir = parent.join(name);
        let spec = self.command(["new", template, "--name", name, "--output"], parent).arg(&project_dir);
        self.execute(&spec)?;
        Ok(project_dir)
    }

    pub fn build(&self, project_dir: &Path) -> Result<ProcessOutput, ProcessError> {
        self.execute(&self.command(["build"], project_dir))
    }

    pub fn run(&self, project_dir: &Path) -> Result<ProcessOutput, ProcessError> {
        self.execute(&self.command(["run"], project_dir))
    }

    pub fn test(&self, project_dir: &Path) -> Result<ProcessOutput, ProcessError> {
        self.execute(&self.command(["test"], project_dir))
    }

    pub fn publish(&self, project_dir: &Path, options: &PublishOptions) -> Result<ProcessOutput, ProcessError> {
        let spec = self.command(["publish"], project_dir).args(options.arguments());
        self.execute(&spec)
    }

    /// Pin the SDK version for projects under `dir`. Writes nothing when no version is configured.
    pub fn write_global_json(&self, dir: &Path) -> io::Result<Option<PathBuf>> {
        let Some(version) = &self.environment.sdk_version else {
            return Ok(None);
        };
        let path = dir.join("global.json");
        fs::write(&path, global_json(version))?;
        tracing::debug!(path = %path.display(), %version, "pinned SDK version");
        Ok(Some(path))
    }
}

fn global_json(version: &str) -> String {
    format!(
        r#"{{
  "sdk": {{
    "version": "{version}",
    "rollForward": "disable"
  }}
}}
"#
    )
}
