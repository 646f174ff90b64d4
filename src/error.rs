//! Error types for `roster-animator`
//!
//! The animation paths of the controller never fail; errors only surface
//! at the edges: configuration loading, the roster store boundary, and
//! scenario playback.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::EntityId;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `roster-animator` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Roster store error (fetch or delete rejected)
    pub const STORE_ERROR: i32 = 4;

    /// Scenario playback error
    pub const SCENARIO_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `roster-animator` operations.
///
/// Aggregates all domain-specific errors and maps each onto an exit code.
#[derive(Debug, Error)]
pub enum RosterAnimatorError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Roster store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Scenario playback error
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),
}

impl RosterAnimatorError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Scenario(_) => ExitCode::SCENARIO_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "steps[2].confirm_delete")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Store Errors
// ============================================================================

/// Errors raised by a [`RosterStore`](crate::store::RosterStore).
///
/// The display text of a delete rejection is shown to the user verbatim,
/// so implementations should keep it human-readable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected a delete request
    #[error("{0}")]
    DeleteFailed(String),

    /// The current roster could not be fetched
    #[error("failed to fetch roster: {0}")]
    FetchFailed(String),

    /// The entity is not known to the store
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// An entity with the same id already exists
    #[error("entity already exists: {0}")]
    AlreadyExists(EntityId),
}

// ============================================================================
// Scenario Errors
// ============================================================================

/// Errors raised while playing a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A step failed against the roster store
    #[error("step {index} ({step}) failed: {source}")]
    StepFailed {
        /// Zero-based step index
        index: usize,
        /// Step kind, for display
        step: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// The initial roster could not be fetched
    #[error("initial roster fetch failed: {0}")]
    Bootstrap(#[source] StoreError),

    /// Playback did not settle within the configured limit
    #[error("scenario did not settle within {0:?}")]
    SettleTimeout(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_per_variant() {
        let store = RosterAnimatorError::from(StoreError::DeleteFailed("nope".into()));
        assert_eq!(store.exit_code(), ExitCode::STORE_ERROR);

        let config = RosterAnimatorError::from(ConfigError::MissingFile {
            path: PathBuf::from("missing.yaml"),
        });
        assert_eq!(config.exit_code(), ExitCode::CONFIG_ERROR);

        let io = RosterAnimatorError::from(std::io::Error::other("boom"));
        assert_eq!(io.exit_code(), ExitCode::IO_ERROR);

        let scenario =
            RosterAnimatorError::from(ScenarioError::SettleTimeout(std::time::Duration::ZERO));
        assert_eq!(scenario.exit_code(), ExitCode::SCENARIO_ERROR);

        let usage = RosterAnimatorError::Usage("unknown scenario".into());
        assert_eq!(usage.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn delete_failure_displays_verbatim() {
        let err = StoreError::DeleteFailed("character is in a guild".into());
        assert_eq!(err.to_string(), "character is in a guild");
    }

    #[test]
    fn validation_issue_display() {
        let issue = ValidationIssue {
            path: "lifecycle.entrance_expire".into(),
            message: "must be longer than entrance_settle".into(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: must be longer than entrance_settle at lifecycle.entrance_expire"
        );
    }

    #[test]
    fn validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "scenario.yaml".into(),
            errors: vec![ValidationIssue {
                path: "roster[1].id".into(),
                message: "duplicate id 'A'".into(),
                severity: Severity::Error,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("scenario.yaml"));
        assert!(text.contains("duplicate id 'A'"));
    }
}
