//! Configuration schema
//!
//! Serde types for lifecycle timing and scenario files. Durations are
//! written as human-readable strings (`16ms`, `1s 500ms`, `2s`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::EntityId;

// ============================================================================
// Lifecycle Timing
// ============================================================================

/// Timing configuration for the lifecycle controller.
///
/// The entrance delays are all measured from the moment the entrance is
/// triggered and must be strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Delay before the entity joins the Entering set.
    #[serde(with = "duration_str", default = "default_entrance_start")]
    pub entrance_start: Duration,

    /// Nominal entrance animation duration.
    #[serde(with = "duration_str", default = "default_entrance_settle")]
    pub entrance_settle: Duration,

    /// Entrance settle plus the display buffer.
    #[serde(with = "duration_str", default = "default_entrance_expire")]
    pub entrance_expire: Duration,

    /// Exit animation duration.
    #[serde(with = "duration_str", default = "default_exit_settle")]
    pub exit_settle: Duration,

    /// Queue a roster refresh after every successful delete.
    #[serde(default = "default_true")]
    pub refresh_after_delete: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            entrance_start: default_entrance_start(),
            entrance_settle: default_entrance_settle(),
            entrance_expire: default_entrance_expire(),
            exit_settle: default_exit_settle(),
            refresh_after_delete: true,
        }
    }
}

const fn default_entrance_start() -> Duration {
    Duration::from_millis(16)
}

const fn default_entrance_settle() -> Duration {
    Duration::from_millis(500)
}

const fn default_entrance_expire() -> Duration {
    Duration::from_secs(2)
}

const fn default_exit_settle() -> Duration {
    Duration::from_millis(500)
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Scenario
// ============================================================================

/// A scripted sequence of roster and user actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Scenario name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Lifecycle timing overrides.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Entities present before the first step.
    #[serde(default)]
    pub roster: Vec<RosterEntry>,

    /// Actions, played in order.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,

    /// Time the store takes to settle each delete call.
    #[serde(
        with = "duration_str",
        default,
        skip_serializing_if = "Duration::is_zero"
    )]
    pub delete_latency: Duration,

    /// Upper bound on a single `settle` step.
    #[serde(
        with = "duration_str",
        default = "default_settle_timeout",
        skip_serializing_if = "is_default_settle_timeout"
    )]
    pub settle_timeout: Duration,
}

const fn default_settle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn is_default_settle_timeout(d: &Duration) -> bool {
    *d == default_settle_timeout()
}

/// An entity present in the initial roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RosterEntry {
    /// Entity identifier.
    pub id: EntityId,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arbitrary server-side data.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

/// One scenario action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Create an entity in the store, as the creation flow would.
    Create(CreateStep),
    /// Designate an entity as just created.
    Designate(EntityId),
    /// Clear the designated-new identifier.
    ClearDesignation,
    /// Fetch the roster from the store and reconcile.
    Refresh,
    /// User presses delete.
    RequestDelete(EntityId),
    /// User confirms the prompt.
    ConfirmDelete(EntityId),
    /// User dismisses the prompt.
    CancelDelete(EntityId),
    /// The next delete call the store receives is rejected with this message.
    FailNextDelete(String),
    /// Let the controller run for a fixed time.
    Wait(#[serde(with = "duration_str")] Duration),
    /// Let the controller run until nothing is scheduled or in flight.
    Settle,
    /// Dismiss every open notification.
    DismissNotifications,
}

impl Step {
    /// Returns the step kind as a snake-case string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Designate(_) => "designate",
            Self::ClearDesignation => "clear_designation",
            Self::Refresh => "refresh",
            Self::RequestDelete(_) => "request_delete",
            Self::ConfirmDelete(_) => "confirm_delete",
            Self::CancelDelete(_) => "cancel_delete",
            Self::FailNextDelete(_) => "fail_next_delete",
            Self::Wait(_) => "wait",
            Self::Settle => "settle",
            Self::DismissNotifications => "dismiss_notifications",
        }
    }

    /// Returns the entity a user-facing step targets, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&EntityId> {
        match self {
            Self::Designate(id)
            | Self::RequestDelete(id)
            | Self::ConfirmDelete(id)
            | Self::CancelDelete(id) => Some(id),
            _ => None,
        }
    }
}

/// Parameters of a `create` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStep {
    /// Identifier; generated when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Designate the created entity as just created.
    #[serde(default = "default_true")]
    pub designate: bool,

    /// Refresh the roster right after creating.
    #[serde(default = "default_true")]
    pub refresh: bool,
}

// ============================================================================
// Duration strings
// ============================================================================

/// Serde adapter for `humantime` duration strings.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as a `humantime` string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Deserializes a duration from a `humantime` string.
    ///
    /// # Errors
    ///
    /// Fails when the string is not a valid duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_defaults() {
        let config: LifecycleConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, LifecycleConfig::default());
        assert_eq!(config.entrance_settle, Duration::from_millis(500));
        assert_eq!(config.entrance_expire, Duration::from_secs(2));
        assert!(config.refresh_after_delete);
    }

    #[test]
    fn lifecycle_parses_duration_strings() {
        let yaml = "entrance_settle: 1s 200ms\nexit_settle: 250ms\nrefresh_after_delete: false\n";
        let config: LifecycleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.entrance_settle, Duration::from_millis(1200));
        assert_eq!(config.exit_settle, Duration::from_millis(250));
        assert!(!config.refresh_after_delete);
    }

    #[test]
    fn lifecycle_rejects_bad_duration() {
        let err = serde_yaml::from_str::<LifecycleConfig>("exit_settle: soon\n").unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn lifecycle_rejects_unknown_field() {
        assert!(serde_yaml::from_str::<LifecycleConfig>("settle: 1s\n").is_err());
    }

    #[test]
    fn scenario_steps_parse() {
        let yaml = r"
name: two rapid creates
roster:
  - id: A
    name: Aria
steps:
  - create: { id: C }
  - create: { id: D, designate: false, refresh: false }
  - designate: D
  - refresh
  - request_delete: A
  - cancel_delete: A
  - confirm_delete: A
  - fail_next_delete: guild members cannot be deleted
  - wait: 600ms
  - settle
  - clear_designation
  - dismiss_notifications
";
        let scenario: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.roster.len(), 1);
        assert_eq!(scenario.steps.len(), 12);
        assert_eq!(
            scenario.steps[0],
            Step::Create(CreateStep {
                id: Some(EntityId::new("C")),
                name: None,
                designate: true,
                refresh: true,
            })
        );
        assert_eq!(scenario.steps[2], Step::Designate(EntityId::new("D")));
        assert_eq!(scenario.steps[3], Step::Refresh);
        assert_eq!(scenario.steps[8], Step::Wait(Duration::from_millis(600)));
        assert_eq!(scenario.settle_timeout, Duration::from_secs(60));
        assert_eq!(scenario.delete_latency, Duration::ZERO);
    }

    #[test]
    fn step_target() {
        assert_eq!(
            Step::ConfirmDelete(EntityId::new("A")).target(),
            Some(&EntityId::new("A"))
        );
        assert_eq!(Step::Settle.target(), None);
        assert_eq!(Step::Settle.kind(), "settle");
    }

    #[test]
    fn duration_round_trips_through_yaml() {
        let config = LifecycleConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("entrance_settle: 500ms"));
        let back: LifecycleConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
