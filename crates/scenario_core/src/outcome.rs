//! How scenario bodies report results.
//!
//! A body returns [`ScenarioResult`]. `Ok(())` passes; [`ScenarioError::Skipped`] skips at runtime;
//! [`ScenarioError::Failed`] fails with a [`Failure`]. Any `std::error::Error` converts into a failure via `?`,
//! keeping its whole source chain.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt::{self, Debug};

/// Result type of a scenario body.
pub type ScenarioResult = Result<(), ScenarioError>;

/// Separator placed between nested failure messages and stack traces.
pub const NESTED_SEPARATOR: &str = "----";

/// A failed scenario: combined message and combined stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Failure {
    /// Messages of every nested failure, outermost first
    pub message: String,
    /// Stack traces of every nested failure, outermost first (may be empty)
    pub stack_trace: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: String::new(),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }

    /// Build a failure from an error and its `source()` chain, in occurrence order.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut messages = vec![error.to_string()];
        let mut source = error.source();
        while let Some(inner) = source {
            messages.push(inner.to_string());
            source = inner.source();
        }
        Self::new(combine(messages.iter().map(String::as_str)))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn combine<'a>(messages: impl IntoIterator<Item = &'a str>) -> String {
    messages
        .into_iter()
        .enumerate()
        .map(|(depth, message)| {
            if depth == 0 {
                message.to_string()
            } else {
                format!("{} {}", NESTED_SEPARATOR, message)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Why a scenario body did not pass.
///
/// Deliberately not a `std::error::Error` so that any error type converts into it with `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// The scenario does not apply to this run (for example, an unsupported target platform)
    Skipped(String),
    Failed(Failure),
}

impl ScenarioError {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ScenarioError::Skipped(reason.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ScenarioError::Failed(Failure::new(message).with_stack_trace(capture_backtrace()))
    }
}

impl<E> From<E> for ScenarioError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        ScenarioError::Failed(Failure::from_error(&error).with_stack_trace(capture_backtrace()))
    }
}

/// Capture a backtrace if `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` enable it.
pub fn capture_backtrace() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::failed(message))
    }
}

/// Fail unless `left == right`.
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T, context: &str) -> ScenarioResult {
    if left == right {
        Ok(())
    } else {
        Err(ScenarioError::failed(format!(
            "{}: left != right\n  left:  {:?}\n  right: {:?}",
            context, left, right
        )))
    }
}

/// Fail unless `haystack` contains `needle`.
pub fn ensure_contains(haystack: &str, needle: &str) -> ScenarioResult {
    if haystack.contains(needle) {
        Ok(())
    } else {
        Err(ScenarioError::failed(format!(
            "expected output to contain {:?}\n  output: {:?}",
            needle, haystack
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "build failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "restore failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    impl StdError for Inner {}

    #[test]
    fn test_error_chain_is_combined_outermost_first() {
        let failure = Failure::from_error(&Outer(Inner));
        assert_eq!(failure.message, "build failed\n---- restore failed");
    }

    #[test]
    fn test_question_mark_converts_io_errors() {
        fn body() -> ScenarioResult {
            std::fs::read_to_string("/definitely/not/here/global.json")?;
            Ok(())
        }

        match body() {
            Err(ScenarioError::Failed(failure)) => assert!(!failure.message.is_empty()),
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure(true, "unused").is_ok());
        assert!(matches!(ensure(false, "nope"), Err(ScenarioError::Failed(f)) if f.message == "nope"));
        assert!(ensure_eq(1, 1, "count").is_ok());
        assert!(ensure_contains("Hello, World!", "World").is_ok());
        assert!(ensure_contains("Hello", "World").is_err());
    }
}
