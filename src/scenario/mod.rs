//! Scenario playback and the built-in scenario registry.

pub mod builtin;
pub mod runner;

pub use builtin::{BuiltinScenario, find_scenario, list_scenarios, suggest_scenario};
pub use runner::{DeleteRecord, ReportEntity, ReportEvent, RunReport, ScenarioRunner};
