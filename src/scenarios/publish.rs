//! Scenarios that restore packages from a feed

use scenario_core::{ScenarioResult, ensure, ensure_contains};
use scenario_derive::scenario;

use super::{require_rid_family, scenario_dir};
use crate::sdk::{PublishOptions, SdkCli};

#[scenario(traits(Category = "Online"))]
fn xunit_project_tests_pass() -> ScenarioResult {
    let sdk = SdkCli::from_current()?;
    let dir = scenario_dir(&sdk, "xunit")?;

    let project = sdk.new_project("xunit", "HelloTests", &dir)?;
    let output = sdk.test(&project)?;
    ensure_contains(&output.stdout, "Passed!")
}

#[scenario(traits(Category = "Online", resources = "online"))]
fn console_app_publishes_self_contained() -> ScenarioResult {
    let sdk = SdkCli::from_current()?;
    let dir = scenario_dir(&sdk, "publish-self-contained")?;
    let rid = sdk.environment().target_rid.clone();

    let project = sdk.new_project("console", "HelloPublish", &dir)?;
    let published = dir.join("out");
    let options = PublishOptions {
        output: Some(published.clone()),
        ..PublishOptions::self_contained(rid.as_str())
    };
    sdk.publish(&project, &options)?;

    let executable = published.join(executable_name("HelloPublish", &rid));
    ensure(executable.is_file(), format!("{} was not published", executable.display()))
}

#[scenario(traits(Category = "Online", resources = "online"))]
fn console_app_publishes_native_aot() -> ScenarioResult {
    let sdk = SdkCli::from_current()?;
    require_rid_family(&sdk, &["linux", "osx"])?;
    let dir = scenario_dir(&sdk, "publish-aot")?;
    let rid = sdk.environment().target_rid.clone();

    let project = sdk.new_project("console", "HelloNative", &dir)?;
    let published = dir.join("out");
    let options = PublishOptions {
        output: Some(published.clone()),
        ..PublishOptions::native_aot(rid.as_str())
    };
    sdk.publish(&project, &options)?;

    let executable = published.join(executable_name("HelloNative", &rid));
    ensure(executable.is_file(), format!("{} was not published", executable.display()))
}

fn executable_name(project: &str, rid: &str) -> String {
    if rid.starts_with("win") {
        format!("{}.exe", project)
    } else {
        project.to_string()
    }
}
