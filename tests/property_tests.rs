//! Property-based tests for trait filtering
//!
//! These tests use proptest to verify filter invariants across randomly generated trait sets.

use proptest::prelude::*;
use scenario_core::{ScenarioResult, TestCase};
use sdk_scenarios::runner::filter::{TraitArg, TraitFilter};

fn noop() -> ScenarioResult {
    Ok(())
}

// =============================================================================
// Strategies
// =============================================================================

fn pair_strategy() -> impl Strategy<Value = (String, String)> {
    (
        prop::sample::select(vec!["Category", "resources", "Platform"]),
        prop::sample::select(vec!["Offline", "Online", "online", "linux", "windows"]),
    )
        .prop_map(|(key, value)| (key.to_string(), value.to_string()))
}

fn case_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(pair_strategy(), 0..4)
}

fn cases_strategy() -> impl Strategy<Value = Vec<TestCase>> {
    prop::collection::vec(case_strategy(), 0..8).prop_map(|cases| {
        cases
            .into_iter()
            .enumerate()
            .map(|(index, traits)| {
                traits.into_iter().fold(
                    TestCase::new(format!("scenarios::case_{index}"), noop),
                    |case, (key, value)| case.with_trait(key, value),
                )
            })
            .collect()
    })
}

fn filter_strategy() -> impl Strategy<Value = TraitFilter> {
    (
        prop::collection::vec(pair_strategy(), 0..3),
        prop::collection::vec(pair_strategy(), 0..3),
        any::<bool>(),
    )
        .prop_map(|(included, excluded, offline_only)| {
            let mut filter = TraitFilter::new();
            for (key, value) in included {
                filter.include(TraitArg { key, value });
            }
            for (key, value) in excluded {
                filter.exclude(TraitArg { key, value });
            }
            if offline_only { filter.offline_only() } else { filter }
        })
}

fn names(cases: &[TestCase]) -> Vec<String> {
    cases.iter().map(|case| case.name().to_string()).collect()
}

// =============================================================================
// Filter Properties
// =============================================================================

proptest! {
    /// Property: Filtering is idempotent (apply(apply(x)) == apply(x))
    #[test]
    fn filter_is_idempotent(cases in cases_strategy(), filter in filter_strategy()) {
        let once = filter.apply(cases);
        let twice = filter.apply(once.clone());
        prop_assert_eq!(names(&once), names(&twice));
    }

    /// Property: Filtering keeps a subsequence of the input, in order
    #[test]
    fn filter_preserves_order(cases in cases_strategy(), filter in filter_strategy()) {
        let all = names(&cases);
        let kept = names(&filter.apply(cases));
        let mut remaining = all.iter();
        for name in &kept {
            prop_assert!(remaining.any(|candidate| candidate == name));
        }
    }

    /// Property: A case carrying an excluded pair never passes, whatever else it matches
    #[test]
    fn exclusions_always_win(
        traits in case_strategy(),
        excluded in pair_strategy(),
        filter in filter_strategy(),
    ) {
        let mut filter = filter;
        filter.exclude(TraitArg { key: excluded.0.clone(), value: excluded.1.clone() });
        let case = traits
            .into_iter()
            .fold(TestCase::new("scenarios::case", noop), |case, (key, value)| case.with_trait(key, value))
            .with_trait(excluded.0, excluded.1);

        prop_assert!(!filter.matches(&case));
    }

    /// Property: The offline shorthand only ever widens explicit inclusions
    #[test]
    fn offline_only_never_drops_explicit_inclusions(
        cases in cases_strategy(),
        included in prop::collection::vec(pair_strategy(), 1..3),
    ) {
        let mut filter = TraitFilter::new();
        for (key, value) in included {
            filter.include(TraitArg { key, value });
        }
        let offline = filter.clone().offline_only();

        for case in &cases {
            if filter.matches(case) {
                prop_assert!(offline.matches(case));
            }
        }
    }

    /// Property: Parsing accepts exactly `KEY=VALUE` with non-blank sides
    #[test]
    fn trait_args_parse_when_both_sides_present(key in "[A-Za-z][A-Za-z0-9]{0,8}", value in "[A-Za-z0-9=]{1,8}") {
        let parsed = TraitArg::parse(&format!(" {key} = {value} ")).unwrap();
        prop_assert_eq!(parsed.key, key);
        prop_assert_eq!(parsed.value, value);
    }
}
