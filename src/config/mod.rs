//! Configuration module
//!
//! Lifecycle timing and scenario files: serde schema, YAML loader, and
//! collect-all validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, LoadResult, LoadWarning, LoaderOptions, ScenarioLoader};
pub use schema::{CreateStep, LifecycleConfig, RosterEntry, ScenarioConfig, Step};
pub use validation::{ValidationResult, Validator};
