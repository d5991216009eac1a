//! Project creation, build and run without network access

use scenario_core::{ScenarioResult, ensure, ensure_contains};
use scenario_derive::scenario;

use super::scenario_dir;
use crate::sdk::SdkCli;

#[scenario(traits(Category = "Offline"))]
fn console_app_builds_and_runs() -> ScenarioResult {
    let sdk = SdkCli::from_current()?;
    let dir = scenario_dir(&sdk, "console")?;

    let project = sdk.new_project("console", "HelloConsole", &dir)?;
    sdk.build(&project)?;
    let output = sdk.run(&project)?;
    ensure_contains(&output.stdout, "Hello, World!")
}

#[scenario(traits(Category = "Offline"))]
fn class_library_builds() -> ScenarioResult {
    let sdk = SdkCli::from_current()?;
    let dir = scenario_dir(&sdk, "classlib")?;

    let project = sdk.new_project("classlib", "HelloLibrary", &dir)?;
    sdk.build(&project)?;

    let built = project.join("bin").join("Debug");
    let has_assembly = walk_for(&built, "HelloLibrary.dll")?;
    ensure(has_assembly, format!("HelloLibrary.dll not found under {}", built.display()))
}

/// Whether `file_name` exists anywhere below `dir`.
fn walk_for(dir: &std::path::Path, file_name: &str) -> std::io::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if walk_for(&path, file_name)? {
                return Ok(true);
            }
        } else if path.file_name().is_some_and(|name| name == file_name) {
            return Ok(true);
        }
    }
    Ok(false)
}
