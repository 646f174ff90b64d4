//! Scenario validation
//!
//! Semantic checks run on a fully deserialized `ScenarioConfig`.
//! Validation collects ALL issues (doesn't stop at the first) to give
//! complete feedback.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{LifecycleConfig, RosterEntry, ScenarioConfig, Step};
use crate::error::{Severity, ValidationIssue};
use crate::lifecycle::EntityId;

/// Expire buffers shorter than this are flagged.
const MIN_DISPLAY_BUFFER: Duration = Duration::from_millis(100);

// ============================================================================
// Public API
// ============================================================================

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario and returns every issue found.
    pub fn validate(&mut self, config: &ScenarioConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if config.name.trim().is_empty() {
            self.add_error("name", "Scenario name is required and cannot be empty");
        }

        self.check_lifecycle(&config.lifecycle, "lifecycle");
        let known = self.check_roster(&config.roster);
        self.check_steps(&config.steps, known);
        self.check_limits(config, limits);

        self.finish()
    }

    /// Validates lifecycle timing on its own.
    pub fn validate_lifecycle(&mut self, config: &LifecycleConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();
        self.check_lifecycle(config, "lifecycle");
        self.finish()
    }

    fn finish(&mut self) -> ValidationResult {
        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Lifecycle Timing
    // ========================================================================

    fn check_lifecycle(&mut self, config: &LifecycleConfig, base: &str) {
        if config.entrance_start >= config.entrance_settle {
            self.add_error(
                &format!("{base}.entrance_start"),
                "entrance_start must be shorter than entrance_settle",
            );
        }

        if config.entrance_expire <= config.entrance_settle {
            self.add_error(
                &format!("{base}.entrance_expire"),
                "entrance_expire must be longer than entrance_settle",
            );
        } else if config.entrance_expire - config.entrance_settle < MIN_DISPLAY_BUFFER {
            self.add_warning(
                &format!("{base}.entrance_expire"),
                &format!(
                    "display buffer after entrance_settle is under {}ms",
                    MIN_DISPLAY_BUFFER.as_millis()
                ),
            );
        }

        if config.exit_settle.is_zero() {
            self.add_error(
                &format!("{base}.exit_settle"),
                "exit_settle must be greater than zero",
            );
        }
    }

    // ========================================================================
    // Roster and Steps
    // ========================================================================

    /// Checks the initial roster and returns the set of known IDs.
    fn check_roster(&mut self, roster: &[RosterEntry]) -> HashSet<EntityId> {
        let mut known = HashSet::new();
        for (i, entry) in roster.iter().enumerate() {
            let path = format!("roster[{i}].id");
            if entry.id.as_str().trim().is_empty() {
                self.add_error(&path, "Entity id cannot be empty");
            } else if !known.insert(entry.id.clone()) {
                self.add_error(&path, &format!("duplicate id '{}'", entry.id));
            }
        }
        known
    }

    fn check_steps(&mut self, steps: &[Step], mut known: HashSet<EntityId>) {
        let mut prompted: HashSet<EntityId> = HashSet::new();

        for (i, step) in steps.iter().enumerate() {
            let path = format!("steps[{i}].{}", step.kind());
            match step {
                Step::Create(create) => {
                    if let Some(id) = &create.id {
                        if id.as_str().trim().is_empty() {
                            self.add_error(&path, "Entity id cannot be empty");
                        } else if !known.insert(id.clone()) {
                            self.add_error(&path, &format!("id '{id}' already exists"));
                        }
                    }
                }
                Step::FailNextDelete(message) if message.trim().is_empty() => {
                    self.add_warning(&path, "failure message is empty");
                }
                Step::RequestDelete(id) => {
                    prompted.insert(id.clone());
                }
                Step::ConfirmDelete(id) if !prompted.contains(id) => {
                    self.add_warning(
                        &path,
                        &format!("confirm_delete for '{id}' without a preceding request_delete"),
                    );
                }
                _ => {}
            }

            if let Some(id) = step.target() {
                if !known.contains(id) {
                    self.add_error(&path, &format!("unknown entity '{id}'"));
                }
            }
        }
    }

    fn check_limits(&mut self, config: &ScenarioConfig, limits: &ConfigLimits) {
        if config.roster.len() > limits.max_roster {
            self.add_error(
                "roster",
                &format!(
                    "Too many roster entries: {} (max {})",
                    config.roster.len(),
                    limits.max_roster
                ),
            );
        }
        if config.steps.len() > limits.max_steps {
            self.add_error(
                "steps",
                &format!(
                    "Too many steps: {} (max {})",
                    config.steps.len(),
                    limits.max_steps
                ),
            );
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CreateStep;

    fn limits() -> ConfigLimits {
        ConfigLimits {
            max_roster: 100,
            max_steps: 100,
            max_config_size: 1024 * 1024,
        }
    }

    fn entry(id: &str) -> RosterEntry {
        RosterEntry {
            id: EntityId::new(id),
            name: None,
            data: serde_json::Value::Null,
        }
    }

    fn scenario(roster: Vec<RosterEntry>, steps: Vec<Step>) -> ScenarioConfig {
        ScenarioConfig {
            name: "test".to_string(),
            description: None,
            lifecycle: LifecycleConfig::default(),
            roster,
            steps,
            delete_latency: Duration::ZERO,
            settle_timeout: Duration::from_secs(60),
        }
    }

    fn validate(config: &ScenarioConfig) -> ValidationResult {
        Validator::new().validate(config, &limits())
    }

    #[test]
    fn test_valid_scenario() {
        let config = scenario(
            vec![entry("A"), entry("B")],
            vec![
                Step::Create(CreateStep {
                    id: Some(EntityId::new("C")),
                    name: None,
                    designate: true,
                    refresh: true,
                }),
                Step::RequestDelete(EntityId::new("C")),
                Step::ConfirmDelete(EntityId::new("C")),
                Step::Settle,
            ],
        );
        let result = validate(&config);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_name() {
        let mut config = scenario(vec![], vec![]);
        config.name = "  ".to_string();
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "name"));
    }

    #[test]
    fn test_duplicate_roster_ids() {
        let result = validate(&scenario(vec![entry("A"), entry("A")], vec![]));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "roster[1].id");
    }

    #[test]
    fn test_unknown_step_target() {
        let result = validate(&scenario(
            vec![entry("A")],
            vec![Step::RequestDelete(EntityId::new("Z"))],
        ));
        assert!(result.has_errors());
        assert!(result.errors[0].message.contains("unknown entity 'Z'"));
    }

    #[test]
    fn test_create_introduces_id() {
        let result = validate(&scenario(
            vec![],
            vec![
                Step::Designate(EntityId::new("C")),
                Step::Create(CreateStep {
                    id: Some(EntityId::new("C")),
                    name: None,
                    designate: false,
                    refresh: true,
                }),
                Step::Designate(EntityId::new("C")),
            ],
        ));
        // Only the designation before the create is unknown.
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "steps[0].designate");
    }

    #[test]
    fn test_create_duplicate_id() {
        let result = validate(&scenario(
            vec![entry("A")],
            vec![Step::Create(CreateStep {
                id: Some(EntityId::new("A")),
                name: None,
                designate: true,
                refresh: true,
            })],
        ));
        assert!(result.errors[0].message.contains("already exists"));
    }

    #[test]
    fn test_confirm_without_request_warns() {
        let result = validate(&scenario(
            vec![entry("A")],
            vec![Step::ConfirmDelete(EntityId::new("A"))],
        ));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_timing_order_enforced() {
        let config = LifecycleConfig {
            entrance_start: Duration::from_millis(600),
            entrance_settle: Duration::from_millis(500),
            entrance_expire: Duration::from_millis(500),
            exit_settle: Duration::ZERO,
            refresh_after_delete: true,
        };
        let result = Validator::new().validate_lifecycle(&config);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "lifecycle.entrance_start",
                "lifecycle.entrance_expire",
                "lifecycle.exit_settle"
            ]
        );
    }

    #[test]
    fn test_short_buffer_warns() {
        let config = LifecycleConfig {
            entrance_expire: Duration::from_millis(550),
            ..LifecycleConfig::default()
        };
        let result = Validator::new().validate_lifecycle(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_limits() {
        let config = scenario(vec![entry("A"), entry("B")], vec![Step::Settle; 3]);
        let tight = ConfigLimits {
            max_roster: 1,
            max_steps: 2,
            max_config_size: 1024,
        };
        let result = Validator::new().validate(&config, &tight);
        assert_eq!(result.errors.len(), 2);
    }
}
