//! Scenario descriptors and discovered test cases.
//!
//! A [`ScenarioDescriptor`] is the `'static` record the `#[scenario]` attribute submits at build time.
//! A [`TestCase`] is the owned, immutable form the runner works with after discovery.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::outcome::ScenarioResult;

/// Signature of a scenario body.
pub type ScenarioFn = fn() -> ScenarioResult;

/// Trait tags of a test case: key → ordered set of values.
///
/// Insertion order is kept for display only; filtering treats it as a plain map of sets.
pub type TraitMap = IndexMap<String, IndexSet<String>>;

/// Build-time registration record for one scenario.
#[derive(Debug)]
pub struct ScenarioDescriptor {
    /// Fully qualified display name (`module::function`)
    pub name: &'static str,
    /// `(key, value)` trait pairs in declaration order; keys may repeat
    pub traits: &'static [(&'static str, &'static str)],
    /// Static skip reason, if the scenario is declared skipped
    pub skip: Option<&'static str>,
    pub file: &'static str,
    pub line: u32,
    pub body: ScenarioFn,
}

inventory::collect!(ScenarioDescriptor);

/// Iterate every scenario registered in the final binary.
///
/// Iteration order is unspecified; callers that need a stable order must sort.
pub fn registered() -> impl Iterator<Item = &'static ScenarioDescriptor> {
    inventory::iter::<ScenarioDescriptor>.into_iter()
}

/// Where a scenario was declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A discovered test case.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    traits: TraitMap,
    skip: Option<String>,
    location: Option<SourceLocation>,
    body: ScenarioFn,
}

impl TestCase {
    pub fn new(name: impl Into<String>, body: ScenarioFn) -> Self {
        Self {
            name: name.into(),
            traits: TraitMap::new(),
            skip: None,
            location: None,
            body,
        }
    }

    /// Add a trait value; repeated keys accumulate into one set.
    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.entry(key.into()).or_default().insert(value.into());
        self
    }

    pub fn with_skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn traits(&self) -> &TraitMap {
        &self.traits
    }

    /// Whether this case carries `key=value`.
    pub fn has_trait(&self, key: &str, value: &str) -> bool {
        self.traits.get(key).is_some_and(|values| values.contains(value))
    }

    /// Iterate `(key, value)` pairs in display order.
    pub fn trait_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.traits
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip.as_deref()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn body(&self) -> ScenarioFn {
        self.body
    }

    /// Last path segment of the display name (the function name).
    pub fn method_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// Everything before the last path segment (the declaring module).
    pub fn type_name(&self) -> &str {
        self.name.rsplit_once("::").map_or("", |(module, _)| module)
    }
}

impl From<&ScenarioDescriptor> for TestCase {
    fn from(descriptor: &ScenarioDescriptor) -> Self {
        let mut case = TestCase::new(descriptor.name, descriptor.body).with_location(descriptor.file, descriptor.line);
        for (key, value) in descriptor.traits {
            case = case.with_trait(*key, *value);
        }
        if let Some(reason) = descriptor.skip {
            case = case.with_skip(reason);
        }
        case
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ScenarioResult {
        Ok(())
    }

    #[test]
    fn test_repeated_trait_keys_accumulate() {
        let case = TestCase::new("a::b", noop)
            .with_trait("Category", "Offline")
            .with_trait("Category", "Smoke")
            .with_trait("Category", "Offline");

        assert_eq!(case.traits().len(), 1);
        assert_eq!(case.traits()["Category"].len(), 2);
        assert!(case.has_trait("Category", "Smoke"));
        assert!(!case.has_trait("Category", "Online"));
    }

    #[test]
    fn test_trait_pairs_keep_declaration_order() {
        let case = TestCase::new("a::b", noop)
            .with_trait("resources", "online")
            .with_trait("Category", "Online");

        let pairs: Vec<_> = case.trait_pairs().collect();
        assert_eq!(pairs, vec![("resources", "online"), ("Category", "Online")]);
    }

    #[test]
    fn test_name_segments() {
        let case = TestCase::new("scenarios::console::builds", noop);
        assert_eq!(case.method_name(), "builds");
        assert_eq!(case.type_name(), "scenarios::console");

        let bare = TestCase::new("builds", noop);
        assert_eq!(bare.method_name(), "builds");
        assert_eq!(bare.type_name(), "");
    }

    #[test]
    fn test_case_from_descriptor() {
        static DESCRIPTOR: ScenarioDescriptor = ScenarioDescriptor {
            name: "scenarios::skipped",
            traits: &[("Category", "Online"), ("resources", "online")],
            skip: Some("not on this platform"),
            file: "src/scenarios/mod.rs",
            line: 12,
            body: noop,
        };

        let case = TestCase::from(&DESCRIPTOR);
        assert_eq!(case.name(), "scenarios::skipped");
        assert!(case.has_trait("resources", "online"));
        assert_eq!(case.skip_reason(), Some("not on this platform"));
        assert_eq!(case.location().map(ToString::to_string).as_deref(), Some("src/scenarios/mod.rs:12"));
    }
}
