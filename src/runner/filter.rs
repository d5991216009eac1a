//! Trait-based test case filtering
//!
//! A case passes when it matches at least one included `key=value` pair (or nothing is included) and matches no
//! excluded pair. Exclusions always win, including over the `--offline-only` shorthand.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use scenario_core::TestCase;
use thiserror::Error;

/// Trait key/value selected by `--offline-only`.
pub const OFFLINE_TRAIT: (&str, &str) = ("Category", "Offline");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("malformed trait `{input}`: {reason} (expected KEY=VALUE)")]
    MalformedTrait { input: String, reason: &'static str },
}

/// One parsed `KEY=VALUE` trait argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitArg {
    pub key: String,
    pub value: String,
}

impl TraitArg {
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let malformed = |reason| FilterError::MalformedTrait {
            input: input.to_string(),
            reason,
        };

        let (key, value) = input.split_once('=').ok_or_else(|| malformed("missing `=`"))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(malformed("missing key"));
        }
        if value.is_empty() {
            return Err(malformed("missing value"));
        }

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl FromStr for TraitArg {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TraitArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

type TraitSets = BTreeMap<String, BTreeSet<String>>;

/// Inclusion/exclusion predicate over test case traits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitFilter {
    included: TraitSets,
    excluded: TraitSets,
}

impl TraitFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from raw `KEY=VALUE` arguments.
    ///
    /// Every argument is validated before the filter is returned, so a malformed one is a usage error.
    pub fn from_args<I, E>(included: I, excluded: E, offline_only: bool) -> Result<Self, FilterError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut filter = Self::new();
        for raw in included {
            filter.include(TraitArg::parse(raw.as_ref())?);
        }
        for raw in excluded {
            filter.exclude(TraitArg::parse(raw.as_ref())?);
        }
        if offline_only {
            filter = filter.offline_only();
        }
        Ok(filter)
    }

    pub fn include(&mut self, arg: TraitArg) {
        self.included.entry(arg.key).or_default().insert(arg.value);
    }

    pub fn exclude(&mut self, arg: TraitArg) {
        self.excluded.entry(arg.key).or_default().insert(arg.value);
    }

    /// Add the implicit `Category=Offline` inclusion alongside any explicit inclusions.
    pub fn offline_only(mut self) -> Self {
        let (key, value) = OFFLINE_TRAIT;
        self.include(TraitArg {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        let included = self.included.is_empty() || any_pair_matches(&self.included, case);
        included && !any_pair_matches(&self.excluded, case)
    }

    /// Keep matching cases, preserving their order.
    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        cases.into_iter().filter(|case| self.matches(case)).collect()
    }
}

fn any_pair_matches(sets: &TraitSets, case: &TestCase) -> bool {
    sets.iter()
        .any(|(key, values)| values.iter().any(|value| case.has_trait(key, value)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use scenario_core::ScenarioResult;

    use super::*;

    fn noop() -> ScenarioResult {
        Ok(())
    }

    fn case(name: &str, traits: &[(&str, &str)]) -> TestCase {
        traits
            .iter()
            .fold(TestCase::new(name, noop), |case, (k, v)| case.with_trait(*k, *v))
    }

    fn names(cases: &[TestCase]) -> Vec<&str> {
        cases.iter().map(TestCase::name).collect()
    }

    // ========================================
    // Argument parsing
    // ========================================

    #[test]
    fn test_parse_trait_arg() {
        let arg = TraitArg::parse("Category=Offline").unwrap();
        assert_eq!(arg.key, "Category");
        assert_eq!(arg.value, "Offline");
        assert_eq!(arg.to_string(), "Category=Offline");
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let arg: TraitArg = "url=a=b".parse().unwrap();
        assert_eq!(arg.key, "url");
        assert_eq!(arg.value, "a=b");
    }

    #[test]
    fn test_parse_rejects_malformed_args() {
        for (input, reason) in [
            ("CategoryOffline", "missing `=`"),
            ("=Offline", "missing key"),
            ("Category=", "missing value"),
            ("  = ", "missing key"),
        ] {
            assert_eq!(
                TraitArg::parse(input),
                Err(FilterError::MalformedTrait {
                    input: input.to_string(),
                    reason
                })
            );
        }
    }

    #[test]
    fn test_from_args_fails_on_first_malformed_arg() {
        let result = TraitFilter::from_args(["Category=Offline"], ["broken"], false);
        assert!(matches!(result, Err(FilterError::MalformedTrait { input, .. }) if input == "broken"));
    }

    // ========================================
    // Matching
    // ========================================

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TraitFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&case("a", &[])));
        assert!(filter.matches(&case("b", &[("Category", "Online")])));
    }

    #[test]
    fn test_inclusion_needs_one_matching_pair() {
        let filter = TraitFilter::from_args(["Category=Offline", "Category=Smoke"], Vec::<&str>::new(), false).unwrap();

        assert!(filter.matches(&case("a", &[("Category", "Smoke")])));
        assert!(!filter.matches(&case("b", &[("Category", "Online")])));
        assert!(!filter.matches(&case("c", &[])));
    }

    #[test]
    fn test_offline_only_is_or_with_explicit_inclusions() {
        let filter = TraitFilter::from_args(["Area=Web"], Vec::<&str>::new(), true).unwrap();

        assert!(filter.matches(&case("offline", &[("Category", "Offline")])));
        assert!(filter.matches(&case("web", &[("Area", "Web")])));
        assert!(!filter.matches(&case("online", &[("Category", "Online")])));
    }

    #[test]
    fn test_exclusion_wins_over_offline_shorthand() {
        let filter = TraitFilter::from_args(Vec::<&str>::new(), ["resources=online"], true).unwrap();

        let cases = vec![
            case("plain_offline", &[("Category", "Offline")]),
            case("offline_but_online_resources", &[("Category", "Offline"), ("resources", "online")]),
            case("online", &[("Category", "Online"), ("resources", "online")]),
        ];

        assert_eq!(names(&filter.apply(cases)), vec!["plain_offline"]);
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = TraitFilter::from_args(["Category=Offline"], Vec::<&str>::new(), false).unwrap();
        let cases = vec![
            case("z", &[("Category", "Offline")]),
            case("m", &[("Category", "Online")]),
            case("a", &[("Category", "Offline")]),
        ];

        assert_eq!(names(&filter.apply(cases)), vec!["z", "a"]);
    }
}
