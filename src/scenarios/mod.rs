//! Built-in scenarios
//!
//! Each scenario works in its own directory under the test root and drives the SDK through [`SdkCli`].
//! `Category=Offline` scenarios only need what ships with the SDK; `Category=Online` ones restore packages.

mod console;
mod publish;

use std::fs;
use std::path::PathBuf;

use scenario_core::{ScenarioError, ScenarioResult};

use crate::sdk::SdkCli;

/// Create the scenario's working directory and pin the SDK version in it, if one is configured.
fn scenario_dir(sdk: &SdkCli, name: &str) -> Result<PathBuf, ScenarioError> {
    let dir = sdk.environment().scenario_dir(name);
    fs::create_dir_all(&dir)?;
    sdk.write_global_json(&dir)?;
    Ok(dir)
}

/// Skip unless the target RID belongs to one of `families` (for example `linux` or `osx`).
fn require_rid_family(sdk: &SdkCli, families: &[&str]) -> ScenarioResult {
    let rid = &sdk.environment().target_rid;
    let family = rid.split('-').next().unwrap_or_default();
    if families.contains(&family) {
        Ok(())
    } else {
        Err(ScenarioError::skipped(format!("not supported for target RID `{}`", rid)))
    }
}
