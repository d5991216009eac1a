//! Reporting sinks
//!
//! Every sink observes the same event stream. The [`Dispatcher`] invokes all registered sinks for each event, in
//! registration order, from the single thread that receives events from the executor.
//!
//! To add an output format, implement [`ExecutionSink`] and register it with the dispatcher.

use std::io::{self, Write};

use super::events::{ExecutionEvent, ExecutionSummary, TestOutcome};
use super::xml::{ErrorElement, ResultDocument, TestElement};

/// Observer of execution events.
pub trait ExecutionSink {
    fn on_event(&mut self, event: &ExecutionEvent);
}

/// Ordered fan-out of events to borrowed sinks.
#[derive(Default)]
pub struct Dispatcher<'a> {
    sinks: Vec<&'a mut dyn ExecutionSink>,
}

impl<'a> Dispatcher<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn register(&mut self, sink: &'a mut dyn ExecutionSink) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    pub fn dispatch(&mut self, event: &ExecutionEvent) {
        for sink in self.sinks.iter_mut() {
            sink.on_event(event);
        }
    }
}

// ============================================================================
// Console
// ============================================================================

/// Line-oriented console output.
///
/// Passing tests print nothing; skips and failures print as they happen, followed by one `Finished` line and
/// one aggregate line at the end of the run.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &ExecutionEvent) -> io::Result<()> {
        match event {
            ExecutionEvent::TestFinished(result) => match &result.outcome {
                TestOutcome::Passed => {}
                TestOutcome::Skipped(_) => writeln!(self.out, "[SKIP] {}", result.name)?,
                TestOutcome::Failed(failure) => {
                    writeln!(self.out, "[FAIL] {}", result.name)?;
                    writeln!(self.out, "{}", failure.message)?;
                    if !failure.stack_trace.is_empty() {
                        writeln!(self.out, "{}", failure.stack_trace)?;
                    }
                }
            },
            ExecutionEvent::ErrorMessage { name, failure } => {
                writeln!(self.out, "[ERROR] {}", name.as_deref().unwrap_or("<harness>"))?;
                writeln!(self.out, "{}", failure.message)?;
                if !failure.stack_trace.is_empty() {
                    writeln!(self.out, "{}", failure.stack_trace)?;
                }
            }
            ExecutionEvent::AssemblyFinished { assembly, summary } => {
                writeln!(self.out, "Finished: {}", assembly)?;
                writeln!(self.out, "{}", summary_line(summary))?;
            }
            ExecutionEvent::AssemblyStarting { .. }
            | ExecutionEvent::TestStarting { .. }
            | ExecutionEvent::Diagnostic { .. } => {}
        }
        self.out.flush()
    }
}

impl<W: Write> ExecutionSink for ConsoleSink<W> {
    fn on_event(&mut self, event: &ExecutionEvent) {
        if let Err(e) = self.write_event(event) {
            tracing::warn!(error = %e, "failed to write console output");
        }
    }
}

/// The aggregate line printed at the end of every run.
pub fn summary_line(summary: &ExecutionSummary) -> String {
    format!(
        "Tests run: {}, Errors: {}, Failures: {}, Skipped: {}. Time: {:.3}s",
        summary.total,
        summary.errors,
        summary.failed,
        summary.skipped,
        summary.elapsed.as_secs_f64()
    )
}

// ============================================================================
// Summary
// ============================================================================

/// Records the frozen summary carried by the completion event.
#[derive(Debug, Default)]
pub struct SummarySink {
    summary: Option<ExecutionSummary>,
}

impl SummarySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The summary, once the run has signalled completion.
    pub fn summary(&self) -> Option<&ExecutionSummary> {
        self.summary.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }
}

impl ExecutionSink for SummarySink {
    fn on_event(&mut self, event: &ExecutionEvent) {
        if let ExecutionEvent::AssemblyFinished { summary, .. } = event {
            if self.summary.is_some() {
                tracing::warn!("completion signalled more than once; keeping the first summary");
                return;
            }
            self.summary = Some(*summary);
        }
    }
}

// ============================================================================
// XML
// ============================================================================

/// Builds the [`ResultDocument`] as events arrive. Nothing is written to disk here.
#[derive(Debug, Default)]
pub struct XmlSink {
    document: ResultDocument,
}

impl XmlSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &ResultDocument {
        &self.document
    }

    pub fn into_document(self) -> ResultDocument {
        self.document
    }
}

impl ExecutionSink for XmlSink {
    fn on_event(&mut self, event: &ExecutionEvent) {
        let assembly = &mut self.document.assembly;
        match event {
            ExecutionEvent::AssemblyStarting {
                assembly: name,
                environment,
                ..
            } => {
                assembly.name = name.clone();
                assembly.environment = environment.clone();
            }
            ExecutionEvent::TestFinished(result) => assembly.tests.push(TestElement::from(result)),
            ExecutionEvent::ErrorMessage { name, failure } => assembly.error_list.push(ErrorElement {
                name: name.clone(),
                failure: failure.clone(),
            }),
            ExecutionEvent::AssemblyFinished { summary, .. } => {
                assembly.total = summary.total;
                assembly.passed = summary.passed();
                assembly.failed = summary.failed;
                assembly.skipped = summary.skipped;
                assembly.errors = summary.errors;
                assembly.time = summary.elapsed.as_secs_f64();
            }
            ExecutionEvent::TestStarting { .. } | ExecutionEvent::Diagnostic { .. } => {}
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Accepts diagnostic messages and drops them.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    swallowed: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn swallowed(&self) -> usize {
        self.swallowed
    }
}

impl ExecutionSink for DiagnosticSink {
    fn on_event(&mut self, event: &ExecutionEvent) {
        if let ExecutionEvent::Diagnostic { message } = event {
            self.swallowed += 1;
            tracing::trace!(%message, "diagnostic");
        }
    }
}
