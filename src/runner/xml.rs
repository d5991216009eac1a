//! Machine-readable results document
//!
//! The document mirrors one executed assembly in the xUnit v2 layout:
//!
//! ```text
//! <assemblies>
//!   <assembly name=".." environment=".." total=".." passed=".." failed=".." skipped=".." errors=".." time="..">
//!     <errors>
//!       <error name=".."><failure><message/><stack-trace/></failure></error>
//!     </errors>
//!     <collection name=".." total=".." passed=".." failed=".." skipped=".." time="..">
//!       <test name=".." type=".." method=".." time=".." result="Pass|Fail|Skip">
//!         <traits><trait name=".." value=".."/></traits>
//!         <reason/>
//!         <failure><message/><stack-trace/></failure>
//!       </test>
//!     </collection>
//!   </assembly>
//! </assemblies>
//! ```
//!
//! It is built in memory while events arrive and written once, after the run has completed.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use scenario_core::Failure;
use thiserror::Error;

use super::events::{TestCaseResult, TestOutcome};

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] AttrError),

    #[error("invalid results document: {0}")]
    Invalid(String),
}

/// Result of one `<test>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Pass,
    Fail,
    Skip,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Pass => "Pass",
            ResultKind::Fail => "Fail",
            ResultKind::Skip => "Skip",
        }
    }

    fn parse(value: &str) -> Result<Self, ResultsError> {
        match value {
            "Pass" => Ok(ResultKind::Pass),
            "Fail" => Ok(ResultKind::Fail),
            "Skip" => Ok(ResultKind::Skip),
            other => Err(ResultsError::Invalid(format!("unknown test result `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestElement {
    pub name: String,
    pub type_name: String,
    pub method: String,
    /// Seconds
    pub time: f64,
    pub result: ResultKind,
    pub traits: Vec<(String, String)>,
    pub reason: Option<String>,
    pub failure: Option<Failure>,
}

impl From<&TestCaseResult> for TestElement {
    fn from(result: &TestCaseResult) -> Self {
        let (kind, reason, failure) = match &result.outcome {
            TestOutcome::Passed => (ResultKind::Pass, None, None),
            TestOutcome::Skipped(reason) => (ResultKind::Skip, Some(reason.clone()), None),
            TestOutcome::Failed(failure) => (ResultKind::Fail, None, Some(failure.clone())),
        };
        Self {
            name: result.name.clone(),
            type_name: result.type_name.clone(),
            method: result.method_name.clone(),
            time: result.duration.as_secs_f64(),
            result: kind,
            traits: result.traits.clone(),
            reason,
            failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorElement {
    pub name: Option<String>,
    pub failure: Failure,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyElement {
    pub name: String,
    pub environment: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Seconds
    pub time: f64,
    pub error_list: Vec<ErrorElement>,
    pub tests: Vec<TestElement>,
}

/// In-memory results tree for one assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDocument {
    pub assembly: AssemblyElement,
}

impl ResultDocument {
    /// Serialize the whole tree.
    pub fn to_xml(&self) -> Result<String, ResultsError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("assemblies")))?;
        self.write_assembly(&mut writer)?;
        writer.write_event(Event::End(BytesEnd::new("assemblies")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| ResultsError::Invalid(e.to_string()))
    }

    /// Write the document to `path` in one step.
    ///
    /// The content goes to a temporary file next to `path` which is then moved into place, so readers never
    /// observe a partially written document.
    pub fn write_to(&self, path: &Path) -> Result<(), ResultsError> {
        let xml = self.to_xml()?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(xml.as_bytes())?;
        file.flush()?;
        file.persist(path).map_err(|e| ResultsError::Io(e.error))?;
        Ok(())
    }

    fn write_assembly<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), ResultsError> {
        let assembly = &self.assembly;

        let mut start = BytesStart::new("assembly");
        push_text_attribute(&mut start, "name", &assembly.name);
        push_text_attribute(&mut start, "environment", &assembly.environment);
        start.push_attribute(("test-framework", crate::version::FRAMEWORK_NAME));
        push_counts(&mut start, assembly.total, assembly.passed, assembly.failed, assembly.skipped);
        start.push_attribute(("errors", assembly.errors.to_string().as_str()));
        start.push_attribute(("time", format_seconds(assembly.time).as_str()));
        writer.write_event(Event::Start(start))?;

        writer.write_event(Event::Start(BytesStart::new("errors")))?;
        for error in &assembly.error_list {
            let mut start = BytesStart::new("error");
            start.push_attribute(("type", "harness"));
            if let Some(name) = &error.name {
                push_text_attribute(&mut start, "name", name);
            }
            writer.write_event(Event::Start(start))?;
            write_failure(writer, &error.failure)?;
            writer.write_event(Event::End(BytesEnd::new("error")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("errors")))?;

        let mut collection = BytesStart::new("collection");
        push_text_attribute(&mut collection, "name", &assembly.name);
        push_counts(&mut collection, assembly.total, assembly.passed, assembly.failed, assembly.skipped);
        let collection_time: f64 = assembly.tests.iter().map(|t| t.time).sum();
        collection.push_attribute(("time", format_seconds(collection_time).as_str()));
        writer.write_event(Event::Start(collection))?;
        for test in &assembly.tests {
            write_test(writer, test)?;
        }
        writer.write_event(Event::End(BytesEnd::new("collection")))?;

        writer.write_event(Event::End(BytesEnd::new("assembly")))?;
        Ok(())
    }

    /// Parse a document previously produced by [`ResultDocument::to_xml`].
    pub fn parse(xml: &str) -> Result<Self, ResultsError> {
        // Text is kept verbatim. Whitespace between elements never has a text target.
        let mut reader = Reader::from_str(xml);

        let mut parser = DocumentParser::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => parser.start(&e, false)?,
                Event::Empty(e) => parser.start(&e, true)?,
                Event::Text(e) => {
                    if parser.text_target.is_some() {
                        parser.text(e.unescape()?.into_owned());
                    }
                }
                Event::End(e) => parser.end(e.name().as_ref()),
                Event::Eof => break,
                _ => {}
            }
        }
        parser.finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum TextTarget {
    Message,
    StackTrace,
    Reason,
}

/// Streaming state while reading a results document.
#[derive(Default)]
struct DocumentParser {
    document: ResultDocument,
    seen_assembly: bool,
    test: Option<TestElement>,
    error: Option<ErrorElement>,
    text_target: Option<TextTarget>,
}

impl DocumentParser {
    fn start(&mut self, e: &BytesStart<'_>, is_empty: bool) -> Result<(), ResultsError> {
        match e.name().as_ref() {
            b"assembly" => {
                self.seen_assembly = true;
                let assembly = &mut self.document.assembly;
                for (key, value) in attributes(e)? {
                    match key.as_str() {
                        "name" => assembly.name = value,
                        "environment" => assembly.environment = value,
                        "total" => assembly.total = parse_number(&key, &value)?,
                        "passed" => assembly.passed = parse_number(&key, &value)?,
                        "failed" => assembly.failed = parse_number(&key, &value)?,
                        "skipped" => assembly.skipped = parse_number(&key, &value)?,
                        "errors" => assembly.errors = parse_number(&key, &value)?,
                        "time" => assembly.time = parse_number(&key, &value)?,
                        _ => {}
                    }
                }
            }
            b"test" => {
                let mut element = TestElement {
                    name: String::new(),
                    type_name: String::new(),
                    method: String::new(),
                    time: 0.0,
                    result: ResultKind::Pass,
                    traits: Vec::new(),
                    reason: None,
                    failure: None,
                };
                for (key, value) in attributes(e)? {
                    match key.as_str() {
                        "name" => element.name = value,
                        "type" => element.type_name = value,
                        "method" => element.method = value,
                        "time" => element.time = parse_number(&key, &value)?,
                        "result" => element.result = ResultKind::parse(&value)?,
                        _ => {}
                    }
                }
                if is_empty {
                    self.document.assembly.tests.push(element);
                } else {
                    self.test = Some(element);
                }
            }
            b"trait" => {
                if let Some(test) = self.test.as_mut() {
                    let mut name = String::new();
                    let mut value = String::new();
                    for (key, attr) in attributes(e)? {
                        match key.as_str() {
                            "name" => name = attr,
                            "value" => value = attr,
                            _ => {}
                        }
                    }
                    test.traits.push((name, value));
                }
            }
            b"error" => {
                let mut element = ErrorElement {
                    name: None,
                    failure: Failure::default(),
                };
                for (key, value) in attributes(e)? {
                    if key == "name" {
                        element.name = Some(value);
                    }
                }
                if is_empty {
                    self.document.assembly.error_list.push(element);
                } else {
                    self.error = Some(element);
                }
            }
            b"failure" => {
                if let Some(test) = self.test.as_mut() {
                    test.failure.get_or_insert_with(Failure::default);
                }
            }
            b"reason" => {
                if let Some(test) = self.test.as_mut() {
                    test.reason.get_or_insert_with(String::new);
                }
                if !is_empty {
                    self.text_target = Some(TextTarget::Reason);
                }
            }
            b"message" if !is_empty => self.text_target = Some(TextTarget::Message),
            b"stack-trace" if !is_empty => self.text_target = Some(TextTarget::StackTrace),
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: String) {
        let Some(target) = self.text_target else {
            return;
        };
        let failure = match (self.test.as_mut(), self.error.as_mut()) {
            (Some(test), _) => {
                if let TextTarget::Reason = target {
                    test.reason.get_or_insert_with(String::new).push_str(&text);
                    return;
                }
                test.failure.get_or_insert_with(Failure::default)
            }
            (None, Some(error)) => &mut error.failure,
            (None, None) => return,
        };
        match target {
            TextTarget::Message => failure.message.push_str(&text),
            TextTarget::StackTrace => failure.stack_trace.push_str(&text),
            TextTarget::Reason => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"test" => {
                if let Some(done) = self.test.take() {
                    self.document.assembly.tests.push(done);
                }
            }
            b"error" => {
                if let Some(done) = self.error.take() {
                    self.document.assembly.error_list.push(done);
                }
            }
            b"message" | b"stack-trace" | b"reason" => self.text_target = None,
            _ => {}
        }
    }

    fn finish(self) -> Result<ResultDocument, ResultsError> {
        if !self.seen_assembly {
            return Err(ResultsError::Invalid("missing <assembly> element".to_string()));
        }
        Ok(self.document)
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, ResultsError> {
    let mut pairs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ResultsError> {
    value
        .parse()
        .map_err(|_| ResultsError::Invalid(format!("attribute `{}` is not a number: `{}`", key, value)))
}

fn push_counts(start: &mut BytesStart<'_>, total: usize, passed: usize, failed: usize, skipped: usize) {
    start.push_attribute(("total", total.to_string().as_str()));
    start.push_attribute(("passed", passed.to_string().as_str()));
    start.push_attribute(("failed", failed.to_string().as_str()));
    start.push_attribute(("skipped", skipped.to_string().as_str()));
}

fn write_test<W: Write>(writer: &mut Writer<W>, test: &TestElement) -> Result<(), ResultsError> {
    let mut start = BytesStart::new("test");
    push_text_attribute(&mut start, "name", &test.name);
    push_text_attribute(&mut start, "type", &test.type_name);
    push_text_attribute(&mut start, "method", &test.method);
    start.push_attribute(("time", format_seconds(test.time).as_str()));
    start.push_attribute(("result", test.result.as_str()));
    writer.write_event(Event::Start(start))?;

    if !test.traits.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("traits")))?;
        for (name, value) in &test.traits {
            let mut element = BytesStart::new("trait");
            push_text_attribute(&mut element, "name", name);
            push_text_attribute(&mut element, "value", value);
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("traits")))?;
    }

    if let Some(reason) = &test.reason {
        write_text_element(writer, "reason", reason)?;
    }
    if let Some(failure) = &test.failure {
        write_failure(writer, failure)?;
    }

    writer.write_event(Event::End(BytesEnd::new("test")))?;
    Ok(())
}

fn write_failure<W: Write>(writer: &mut Writer<W>, failure: &Failure) -> Result<(), ResultsError> {
    writer.write_event(Event::Start(BytesStart::new("failure")))?;
    write_text_element(writer, "message", &failure.message)?;
    if !failure.stack_trace.is_empty() {
        write_text_element(writer, "stack-trace", &failure.stack_trace)?;
    }
    writer.write_event(Event::End(BytesEnd::new("failure")))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), ResultsError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&xml_chars(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn push_text_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    start.push_attribute((key, &*xml_chars(value)));
}

/// Replace characters XML 1.0 cannot carry (C0 controls other than tab and line breaks, U+FFFE, U+FFFF) with
/// U+FFFD. SDK output routinely contains ANSI colour sequences.
fn xml_chars(text: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    }

    if text.chars().all(allowed) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if allowed(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> ResultDocument {
        ResultDocument {
            assembly: AssemblyElement {
                name: "sdk-scenarios".to_string(),
                environment: "linux-x64".to_string(),
                total: 3,
                passed: 1,
                failed: 1,
                skipped: 1,
                errors: 1,
                time: 1.5,
                error_list: vec![ErrorElement {
                    name: Some("scenarios::crashed".to_string()),
                    failure: Failure::new("test thread died"),
                }],
                tests: vec![
                    TestElement {
                        name: "scenarios::console::builds".to_string(),
                        type_name: "scenarios::console".to_string(),
                        method: "builds".to_string(),
                        time: 0.25,
                        result: ResultKind::Pass,
                        traits: vec![("Category".to_string(), "Offline".to_string())],
                        reason: None,
                        failure: None,
                    },
                    TestElement {
                        name: "scenarios::publish::aot".to_string(),
                        type_name: "scenarios::publish".to_string(),
                        method: "aot".to_string(),
                        time: 0.0,
                        result: ResultKind::Skip,
                        traits: Vec::new(),
                        reason: Some("unsupported <rid>".to_string()),
                        failure: None,
                    },
                    TestElement {
                        name: "scenarios::testing::passes".to_string(),
                        type_name: "scenarios::testing".to_string(),
                        method: "passes".to_string(),
                        time: 1.25,
                        result: ResultKind::Fail,
                        traits: vec![
                            ("Category".to_string(), "Online".to_string()),
                            ("resources".to_string(), "online".to_string()),
                        ],
                        reason: None,
                        failure: Some(Failure::new("exit code 1 & \"restore\" failed").with_stack_trace("at src/lib.rs:1:1")),
                    },
                ],
            },
        }
    }

    #[test]
    fn test_serialized_document_parses_back() {
        let document = sample();
        let xml = document.to_xml().unwrap();
        let parsed = ResultDocument::parse(&xml).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_serialization_escapes_text_and_attributes() {
        let xml = sample().to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("unsupported &lt;rid&gt;"));
        assert!(xml.contains("exit code 1 &amp;"));
        assert!(xml.contains("result=\"Skip\""));
        assert!(xml.contains("errors=\"1\""));
    }

    #[test]
    fn test_control_characters_are_replaced() {
        let mut document = sample();
        document.assembly.tests[2].failure = Some(Failure::new("\u{1b}[31merror MSB1009\u{1b}[0m"));
        document.assembly.tests[2].traits = vec![("Category".to_string(), "On\u{7}line".to_string())];

        let xml = document.to_xml().unwrap();
        assert!(
            !xml.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')),
            "{xml}"
        );

        let parsed = ResultDocument::parse(&xml).unwrap();
        let test = &parsed.assembly.tests[2];
        assert_eq!(test.failure.as_ref().unwrap().message, "\u{fffd}[31merror MSB1009\u{fffd}[0m");
        assert_eq!(test.traits[0].1, "On\u{fffd}line");
    }

    #[test]
    fn test_failure_text_keeps_surrounding_whitespace() {
        let mut document = sample();
        document.assembly.tests[2].failure =
            Some(Failure::new("  left:  1\n right: 2\n").with_stack_trace("   0: frame\n   1: frame\n"));

        let parsed = ResultDocument::parse(&document.to_xml().unwrap()).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_parse_rejects_documents_without_assembly() {
        let err = ResultDocument::parse("<assemblies></assemblies>").unwrap_err();
        assert!(matches!(err, ResultsError::Invalid(_)));
    }

    #[test]
    fn test_write_to_creates_file_in_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.xml");

        sample().write_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(ResultDocument::parse(&written).unwrap(), sample());
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
