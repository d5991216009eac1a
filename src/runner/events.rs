//! Execution events and the run summary
//!
//! The executor produces a sequential stream of [`ExecutionEvent`]s ending with exactly one
//! [`ExecutionEvent::AssemblyFinished`], the completion signal of a run.

use std::time::Duration;

use scenario_core::{Failure, TestCase};

/// Outcome of one executed test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Skipped(String),
    Failed(Failure),
}

/// Everything reported about a finished test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseResult {
    pub name: String,
    pub type_name: String,
    pub method_name: String,
    pub traits: Vec<(String, String)>,
    pub outcome: TestOutcome,
    pub duration: Duration,
}

impl TestCaseResult {
    pub fn new(case: &TestCase, outcome: TestOutcome, duration: Duration) -> Self {
        Self {
            name: case.name().to_string(),
            type_name: case.type_name().to_string(),
            method_name: case.method_name().to_string(),
            traits: case
                .trait_pairs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            outcome,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    AssemblyStarting {
        assembly: String,
        environment: String,
        test_count: usize,
    },
    TestStarting {
        name: String,
    },
    TestFinished(TestCaseResult),
    /// A harness error outside any test body (the case could not be run or reported)
    ErrorMessage {
        name: Option<String>,
        failure: Failure,
    },
    /// Diagnostic noise; accepted by sinks but never printed
    Diagnostic {
        message: String,
    },
    AssemblyFinished {
        assembly: String,
        summary: ExecutionSummary,
    },
}

/// Aggregate counters of a run, frozen once the completion event is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecutionSummary {
    /// Executed test cases (passed + failed + skipped)
    pub total: usize,
    pub failed: usize,
    /// Harness errors, counted separately from test cases
    pub errors: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl ExecutionSummary {
    pub fn record(&mut self, outcome: &TestOutcome) {
        self.total += 1;
        match outcome {
            TestOutcome::Passed => {}
            TestOutcome::Skipped(_) => self.skipped += 1,
            TestOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn passed(&self) -> usize {
        self.total - self.failed - self.skipped
    }

    /// Whether the run should exit with a failure code. Skips never count.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = ExecutionSummary::default();
        summary.record(&TestOutcome::Passed);
        summary.record(&TestOutcome::Skipped("later".to_string()));
        summary.record(&TestOutcome::Failed(Failure::new("boom")));
        summary.record_error();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn test_skips_never_fail_a_run() {
        let mut summary = ExecutionSummary::default();
        summary.record(&TestOutcome::Skipped(String::new()));
        summary.record(&TestOutcome::Passed);
        assert!(!summary.has_failures());

        summary.record_error();
        assert!(summary.has_failures());
    }
}
