//! Test discovery
//!
//! Discovery only reads declarative metadata: no scenario body runs. Parameterized scenarios are reported at the
//! granularity they were registered with.

use std::sync::mpsc;
use std::thread;

use scenario_core::{ScenarioDescriptor, TestCase};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to start discovery: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("discovery stopped before signalling completion ({found} case(s) received)")]
    Interrupted { found: usize },
}

/// Enumerate the test cases of an artifact.
///
/// Implementations may work concurrently but must not return before discovery is complete.
pub trait TestDiscovery {
    /// Name of the artifact being discovered (reported as the assembly name).
    fn artifact_name(&self) -> &str;

    fn discover(&self) -> Result<Vec<TestCase>, DiscoveryError>;
}

enum DiscoveryMessage {
    Found(TestCase),
    Complete,
}

/// Discovery over the scenarios registered in the running binary with `#[scenario]`.
///
/// Cases are produced ordered by declaration site (file, then line).
pub struct RegistryDiscovery {
    artifact: String,
}

impl RegistryDiscovery {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
        }
    }
}

impl TestDiscovery for RegistryDiscovery {
    fn artifact_name(&self) -> &str {
        &self.artifact
    }

    #[tracing::instrument(skip_all, fields(artifact = %self.artifact))]
    fn discover(&self) -> Result<Vec<TestCase>, DiscoveryError> {
        let (sender, receiver) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("discovery".to_string())
            .spawn(move || {
                let mut descriptors: Vec<&'static ScenarioDescriptor> = scenario_core::registered().collect();
                descriptors.sort_by(|a, b| (a.file, a.line, a.name).cmp(&(b.file, b.line, b.name)));

                for descriptor in descriptors {
                    if sender.send(DiscoveryMessage::Found(TestCase::from(descriptor))).is_err() {
                        return;
                    }
                }
                let _ = sender.send(DiscoveryMessage::Complete);
            })
            .map_err(DiscoveryError::Spawn)?;

        let cases = collect_until_complete(&receiver)?;
        let _ = worker.join();

        tracing::debug!(count = cases.len(), "discovery complete");
        Ok(cases)
    }
}

/// Block until the discovery-finished message arrives.
fn collect_until_complete(receiver: &mpsc::Receiver<DiscoveryMessage>) -> Result<Vec<TestCase>, DiscoveryError> {
    let mut cases = Vec::new();
    loop {
        match receiver.recv() {
            Ok(DiscoveryMessage::Found(case)) => cases.push(case),
            Ok(DiscoveryMessage::Complete) => return Ok(cases),
            Err(mpsc::RecvError) => return Err(DiscoveryError::Interrupted { found: cases.len() }),
        }
    }
}

/// Discovery over an explicit list of cases, returned in the given order.
pub struct StaticDiscovery {
    artifact: String,
    cases: Vec<TestCase>,
}

impl StaticDiscovery {
    pub fn new(artifact: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            artifact: artifact.into(),
            cases,
        }
    }
}

impl TestDiscovery for StaticDiscovery {
    fn artifact_name(&self) -> &str {
        &self.artifact
    }

    fn discover(&self) -> Result<Vec<TestCase>, DiscoveryError> {
        Ok(self.cases.clone())
    }
}
