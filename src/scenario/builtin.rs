//! Built-in scenarios
//!
//! Scenario files embedded in the binary at compile time, so the common
//! lifecycle paths can be replayed with `roster-animator run --builtin <name>`.

use std::sync::LazyLock;

/// A built-in scenario embedded in the binary.
#[derive(Debug)]
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g. `"failed-delete"`).
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content.
    pub yaml: &'static str,
}

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "new-entrance",
            description: "Designated-new entity plays one full entrance cycle",
            tags: &["entrance"],
            yaml: include_str!("../../scenarios/new-entrance.yaml"),
        },
        BuiltinScenario {
            name: "superseded-create",
            description: "Second create replaces the designation before the first animates",
            tags: &["entrance", "cancellation"],
            yaml: include_str!("../../scenarios/superseded-create.yaml"),
        },
        BuiltinScenario {
            name: "cancel-delete",
            description: "Delete prompt dismissed without side effects",
            tags: &["exit"],
            yaml: include_str!("../../scenarios/cancel-delete.yaml"),
        },
        BuiltinScenario {
            name: "failed-delete",
            description: "Store rejects the delete; entity restored with a notification",
            tags: &["exit", "failure"],
            yaml: include_str!("../../scenarios/failed-delete.yaml"),
        },
        BuiltinScenario {
            name: "delete-roundtrip",
            description: "Slow store accepts the delete; entity hidden until the refresh",
            tags: &["exit", "refresh"],
            yaml: include_str!("../../scenarios/delete-roundtrip.yaml"),
        },
    ]
});

/// Look up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// List all scenarios, optionally filtered by tag.
#[must_use]
pub fn list_scenarios(tag: Option<&str>) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggest a similar scenario name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is at
/// most 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<&'static str> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}

/// Returns all scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::ScenarioLoader;

    #[test]
    fn all_builtin_scenarios_load() {
        let loader = ScenarioLoader::with_defaults();
        for scenario in list_scenarios(None) {
            let result = loader.load_from_str(scenario.yaml);
            assert!(
                result.is_ok(),
                "builtin '{}' failed to load: {:?}",
                scenario.name,
                result.err()
            );
            assert!(
                result.unwrap().warnings.is_empty(),
                "builtin '{}' has warnings",
                scenario.name
            );
        }
    }

    #[test]
    fn no_duplicate_scenario_names() {
        let names = list_scenario_names();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn find_scenario_existing() {
        let scenario = find_scenario("failed-delete").unwrap();
        assert!(scenario.yaml.contains("fail_next_delete"));
        assert!(find_scenario("nonexistent").is_none());
    }

    #[test]
    fn suggest_scenario_close() {
        assert_eq!(suggest_scenario("failed-delet"), Some("failed-delete"));
        assert_eq!(suggest_scenario("cancle-delete"), Some("cancel-delete"));
    }

    #[test]
    fn suggest_scenario_far() {
        assert!(suggest_scenario("xyzabc123").is_none());
    }

    #[test]
    fn list_filter_by_tag() {
        let exit = list_scenarios(Some("exit"));
        assert_eq!(exit.len(), 3);
        assert!(exit.iter().all(|s| s.tags.contains(&"exit")));
        assert!(list_scenarios(Some("nope")).is_empty());
    }
}
