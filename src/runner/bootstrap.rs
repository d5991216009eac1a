//! Environment bootstrap and teardown
//!
//! [`prepare`] makes sure the test root exists and publishes the run parameters for scenario bodies;
//! [`teardown`] withdraws them and removes the test root unless it should be kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scenario_core::{ScenarioEnvironment, env};

use super::RunnerError;
use super::config::RunConfiguration;

/// Prefix of generated test roots.
pub const TEMP_ROOT_PREFIX: &str = "sdk-scenarios-";

/// The published environment of one run.
#[derive(Debug)]
pub struct PreparedEnvironment {
    environment: Arc<ScenarioEnvironment>,
    generated: bool,
}

impl PreparedEnvironment {
    pub fn environment(&self) -> &ScenarioEnvironment {
        &self.environment
    }

    pub fn test_root(&self) -> &Path {
        &self.environment.test_root
    }

    /// Whether the test root was created for this run rather than given.
    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

/// Create the test root and publish the environment. Must complete before any scenario body runs.
#[tracing::instrument(skip_all, fields(dotnet_root = %config.dotnet_root.display()))]
pub fn prepare(config: &RunConfiguration) -> Result<PreparedEnvironment, RunnerError> {
    let (test_root, generated) = match &config.test_root {
        Some(path) => {
            fs::create_dir_all(path).map_err(|source| RunnerError::EnvironmentSetup {
                path: path.clone(),
                source,
            })?;
            (path.clone(), false)
        }
        None => (generate_test_root()?, true),
    };
    tracing::debug!(test_root = %test_root.display(), generated, "test root ready");

    let environment = env::publish(config.environment(&test_root));
    tracing::info!(
        test_root = %environment.test_root.display(),
        target_rid = %environment.target_rid,
        sdk_version = environment.sdk_version.as_deref().unwrap_or("<default>"),
        "scenario environment published"
    );

    Ok(PreparedEnvironment { environment, generated })
}

fn generate_test_root() -> Result<PathBuf, RunnerError> {
    let dir = tempfile::Builder::new()
        .prefix(TEMP_ROOT_PREFIX)
        .tempdir()
        .map_err(RunnerError::TempRoot)?;
    // Removal is handled by `teardown`, which honours `--no-cleanup`.
    Ok(dir.keep())
}

/// Withdraw the environment and remove the test root unless `no_cleanup` is set.
///
/// A removal failure is only logged: it never changes the outcome of the run.
pub fn teardown(prepared: &PreparedEnvironment, no_cleanup: bool) {
    env::withdraw();

    let test_root = prepared.test_root();
    if no_cleanup {
        tracing::info!(
            test_root = %test_root.display(),
            generated = prepared.is_generated(),
            "keeping test root"
        );
        return;
    }

    match fs::remove_dir_all(test_root) {
        Ok(()) => tracing::debug!(test_root = %test_root.display(), "removed test root"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(test_root = %test_root.display(), error = %e, "failed to remove test root"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // The published environment is process-wide.
    static SERIAL: Mutex<()> = Mutex::new(());

    #[test]
    fn test_given_root_is_created_published_and_removed() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("nested").join("root");
        let config = RunConfiguration::new("/opt/dotnet")
            .with_test_root(&root)
            .with_target_rid("linux-x64");

        let prepared = prepare(&config).unwrap();
        assert!(root.is_dir());
        assert!(!prepared.is_generated());
        assert_eq!(env::published().unwrap().test_root, root);

        teardown(&prepared, false);
        assert!(!root.exists());
        assert!(env::published().is_none());
    }

    #[test]
    fn test_generated_root_honours_no_cleanup() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let config = RunConfiguration::new("/opt/dotnet");

        let prepared = prepare(&config).unwrap();
        let root = prepared.test_root().to_path_buf();
        assert!(prepared.is_generated());
        assert!(root.is_dir());
        assert!(root.file_name().unwrap().to_string_lossy().starts_with(TEMP_ROOT_PREFIX));

        teardown(&prepared, true);
        assert!(root.is_dir());
        assert!(env::published().is_none());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_uncreatable_root_is_a_setup_error() {
        let scratch = tempfile::tempdir().unwrap();
        let blocker = scratch.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let config = RunConfiguration::new("/opt/dotnet").with_test_root(blocker.join("root"));

        let err = prepare(&config).unwrap_err();
        assert!(matches!(err, RunnerError::EnvironmentSetup { .. }));
    }
}
