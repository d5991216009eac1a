//! Test execution and result aggregation
//!
//! Cases run one at a time, in the order they are given, each on its own named thread so a panicking body
//! cannot take the run down. Events travel over a channel to the calling thread, which dispatches them to the
//! sinks; that thread is the only writer of sink state.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use scenario_core::{Failure, ScenarioError, TestCase};

use super::RunnerError;
use super::capture::capture_panics;
use super::events::{ExecutionEvent, ExecutionSummary, TestCaseResult, TestOutcome};
use super::sinks::Dispatcher;

/// Runs a filtered set of test cases and reports through a [`Dispatcher`].
pub struct TestExecutor {
    assembly: String,
    environment: String,
}

impl TestExecutor {
    pub fn new(assembly: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            environment: environment.into(),
        }
    }

    /// Execute `cases` and block until the run signals completion.
    ///
    /// There is no timeout: a scenario that never returns keeps the run waiting.
    #[tracing::instrument(skip_all, fields(assembly = %self.assembly, cases = cases.len()))]
    pub fn run(&self, cases: Vec<TestCase>, dispatcher: &mut Dispatcher<'_>) -> Result<ExecutionSummary, RunnerError> {
        let (sender, receiver) = mpsc::channel();
        let assembly = self.assembly.clone();
        let environment = self.environment.clone();

        let worker = thread::Builder::new()
            .name("executor".to_string())
            .spawn(move || execute_all(assembly, environment, cases, &sender))
            .map_err(RunnerError::ExecutorSpawn)?;

        let summary = loop {
            match receiver.recv() {
                Ok(event) => {
                    dispatcher.dispatch(&event);
                    if let ExecutionEvent::AssemblyFinished { summary, .. } = event {
                        break summary;
                    }
                }
                Err(mpsc::RecvError) => {
                    let _ = worker.join();
                    return Err(RunnerError::ExecutionInterrupted);
                }
            }
        };

        let _ = worker.join();
        tracing::info!(
            total = summary.total,
            failed = summary.failed,
            errors = summary.errors,
            skipped = summary.skipped,
            "execution finished"
        );
        Ok(summary)
    }
}

fn execute_all(assembly: String, environment: String, cases: Vec<TestCase>, sender: &Sender<ExecutionEvent>) {
    let started = Instant::now();
    let mut summary = ExecutionSummary::default();

    // A closed channel means nobody is listening any more; stop quietly.
    let send = |event: ExecutionEvent| sender.send(event).is_ok();

    if !send(ExecutionEvent::AssemblyStarting {
        assembly: assembly.clone(),
        environment,
        test_count: cases.len(),
    }) {
        return;
    }

    for case in &cases {
        let name = case.name().to_string();
        if !send(ExecutionEvent::TestStarting { name: name.clone() }) {
            return;
        }
        send(ExecutionEvent::Diagnostic {
            message: format!("running {}", name),
        });

        let delivered = match run_case(case) {
            Ok(result) => {
                summary.record(&result.outcome);
                send(ExecutionEvent::TestFinished(result))
            }
            Err(failure) => {
                summary.record_error();
                send(ExecutionEvent::ErrorMessage {
                    name: Some(name),
                    failure,
                })
            }
        };
        if !delivered {
            return;
        }
    }

    summary.elapsed = started.elapsed();
    send(ExecutionEvent::AssemblyFinished { assembly, summary });
}

/// Run one case. `Err` is a harness error: the case could not be run or did not report an outcome.
fn run_case(case: &TestCase) -> Result<TestCaseResult, Failure> {
    if let Some(reason) = case.skip_reason() {
        return Ok(TestCaseResult::new(
            case,
            TestOutcome::Skipped(reason.to_string()),
            Duration::ZERO,
        ));
    }

    let body = case.body();
    let started = Instant::now();
    let handle = thread::Builder::new()
        .name(case.name().to_string())
        .spawn(move || capture_panics(body))
        .map_err(|e| Failure::new(format!("failed to start test thread: {}", e)))?;
    let joined = handle.join();
    let duration = started.elapsed();

    let outcome = match joined {
        Ok(Ok(Ok(()))) => TestOutcome::Passed,
        Ok(Ok(Err(ScenarioError::Skipped(reason)))) => TestOutcome::Skipped(reason),
        Ok(Ok(Err(ScenarioError::Failed(failure)))) => TestOutcome::Failed(failure),
        Ok(Err(panic)) => TestOutcome::Failed(panic),
        Err(_) => return Err(Failure::new("test thread terminated without reporting an outcome")),
    };

    Ok(TestCaseResult::new(case, outcome, duration))
}
