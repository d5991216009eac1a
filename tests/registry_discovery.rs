//! Discovery of scenarios registered with `#[scenario]`.
//!
//! The scenarios below are registered in this test binary alongside the built-in ones linked in from the
//! library, so each test narrows discovery down to one module.

use std::fs;
use std::io;

use scenario_core::{ScenarioEnvironment, ScenarioResult, TestCase, ensure, env};
use sdk_scenarios::runner::xml::ResultKind;
use sdk_scenarios::runner::{
    DiscoveryError, RegistryDiscovery, ResultDocument, RunConfiguration, RunOutcome, TestDiscovery, run_tests,
};
use sdk_scenarios::scenario;

#[scenario(traits(Category = "Offline"))]
fn reads_published_environment() -> ScenarioResult {
    let environment = ScenarioEnvironment::current()?;
    ensure(environment.test_root.is_dir(), "test root must exist")?;
    ensure(environment.target_rid == "linux-x64", "target RID is published")
}

#[scenario(traits(Category = "Offline", Category = "Smoke"))]
fn reports_error_chain() -> ScenarioResult {
    let inner = io::Error::new(io::ErrorKind::NotFound, "project.assets.json not found");
    Err(Wrapped(inner).into())
}

#[scenario(traits(Category = "Online", resources = "online"), skip = "feed is not mirrored")]
fn declared_skip() -> ScenarioResult {
    panic!("declared skips never run")
}

#[scenario]
fn untagged() -> ScenarioResult {
    Ok(())
}

#[derive(Debug)]
struct Wrapped(io::Error);

impl std::fmt::Display for Wrapped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "restore failed")
    }
}

impl std::error::Error for Wrapped {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Registry discovery restricted to cases whose name starts with `prefix`.
struct ModuleDiscovery {
    inner: RegistryDiscovery,
    prefix: &'static str,
}

impl ModuleDiscovery {
    fn new(prefix: &'static str) -> Self {
        Self {
            inner: RegistryDiscovery::new("registry-discovery"),
            prefix,
        }
    }
}

impl TestDiscovery for ModuleDiscovery {
    fn artifact_name(&self) -> &str {
        self.inner.artifact_name()
    }

    fn discover(&self) -> Result<Vec<TestCase>, DiscoveryError> {
        let cases = self.inner.discover()?;
        Ok(cases.into_iter().filter(|case| case.name().starts_with(self.prefix)).collect())
    }
}

fn local_cases() -> Vec<TestCase> {
    ModuleDiscovery::new("registry_discovery::").discover().unwrap()
}

#[test]
fn discovers_local_scenarios_in_declaration_order() {
    let names: Vec<_> = local_cases().iter().map(|case| case.method_name().to_string()).collect();
    assert_eq!(
        names,
        vec!["reads_published_environment", "reports_error_chain", "declared_skip", "untagged"]
    );
}

#[test]
fn descriptors_carry_traits_skip_and_location() {
    let cases = local_cases();

    let chain = &cases[1];
    assert_eq!(chain.type_name(), "registry_discovery");
    assert!(chain.has_trait("Category", "Offline"));
    assert!(chain.has_trait("Category", "Smoke"));
    assert_eq!(chain.traits()["Category"].len(), 2);
    assert!(chain.location().unwrap().file.ends_with("registry_discovery.rs"));

    let skipped = &cases[2];
    assert_eq!(skipped.skip_reason(), Some("feed is not mirrored"));
    assert!(skipped.has_trait("resources", "online"));

    assert!(cases[3].traits().is_empty());
}

#[test]
fn built_in_scenarios_are_registered() {
    let cases = ModuleDiscovery::new("sdk_scenarios::scenarios::").discover().unwrap();
    let offline = cases.iter().filter(|case| case.has_trait("Category", "Offline")).count();
    let online = cases.iter().filter(|case| case.has_trait("Category", "Online")).count();

    assert_eq!((offline, online), (2, 3));
}

#[test]
fn registered_scenarios_run_end_to_end() {
    let dotnet = tempfile::tempdir().unwrap();
    fs::write(dotnet.path().join(env::host_executable_name()), b"").unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let xml = scratch.path().join("results.xml");
    let config = RunConfiguration::new(dotnet.path())
        .with_test_root(scratch.path().join("root"))
        .with_target_rid("linux-x64")
        .with_xml(&xml);

    let mut out = Vec::new();
    let outcome = run_tests(&config, &ModuleDiscovery::new("registry_discovery::"), &mut out).unwrap();

    let RunOutcome::Executed { summary } = outcome else {
        panic!("expected an executed run");
    };
    assert_eq!((summary.total, summary.failed, summary.skipped, summary.errors), (4, 1, 1, 0));

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains(
        "[FAIL] registry_discovery::reports_error_chain\nrestore failed\n---- project.assets.json not found"
    ));

    let document = ResultDocument::parse(&fs::read_to_string(&xml).unwrap()).unwrap();
    let results: Vec<_> = document.assembly.tests.iter().map(|t| t.result).collect();
    assert_eq!(
        results,
        vec![ResultKind::Pass, ResultKind::Fail, ResultKind::Skip, ResultKind::Pass]
    );
    assert_eq!(document.assembly.name, "registry-discovery");
}
