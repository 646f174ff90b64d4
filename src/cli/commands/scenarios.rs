//! Scenarios command handlers
//!
//! Implements `scenarios list` and `scenarios show`.

use std::fmt::Write as _;

use crate::cli::args::{OutputFormat, ScenariosListArgs, ScenariosShowArgs};
use crate::error::RosterAnimatorError;
use crate::scenario::builtin::{self, BuiltinScenario};

/// List available built-in scenarios.
///
/// # Errors
///
/// Returns a JSON error if output serialization fails.
#[allow(clippy::unused_async)]
pub async fn list(args: &ScenariosListArgs) -> Result<(), RosterAnimatorError> {
    let results = builtin::list_scenarios(args.tag.as_deref());

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = results
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "description": s.description,
                        "tags": s.tags,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Human => {
            if results.is_empty() {
                println!("No scenarios match the given filters.");
                return Ok(());
            }

            println!("Built-in Scenarios ({} available)\n", results.len());
            for s in results {
                println!("  {:<20}{:<68}[{}]", s.name, s.description, s.tags.join(", "));
            }
            println!();
            println!("Run a scenario: roster-animator run --builtin <name>");
            println!("View YAML:      roster-animator scenarios show <name>");
        }
    }

    Ok(())
}

/// Print the YAML of a built-in scenario, suitable for piping.
///
/// # Errors
///
/// Returns a usage error if the scenario name is not found.
#[allow(clippy::unused_async)]
pub async fn show(args: &ScenariosShowArgs) -> Result<(), RosterAnimatorError> {
    let scenario = lookup(&args.name)?;
    print!("{}", scenario.yaml);
    Ok(())
}

/// Finds a built-in scenario, or builds a usage error listing the options.
///
/// # Errors
///
/// Returns `RosterAnimatorError::Usage` if no scenario has that name.
pub fn lookup(name: &str) -> Result<&'static BuiltinScenario, RosterAnimatorError> {
    builtin::find_scenario(name).ok_or_else(|| {
        let mut message = format!("unknown scenario '{name}'");

        if let Some(suggestion) = builtin::suggest_scenario(name) {
            let _ = write!(message, "\n\nDid you mean '{suggestion}'?");
        }

        message.push_str("\n\nAvailable scenarios:");
        for s in builtin::list_scenarios(None) {
            let _ = write!(message, "\n  {:<20}{}", s.name, s.description);
        }

        RosterAnimatorError::Usage(message)
    })
}
