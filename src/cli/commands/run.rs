//! Run command handler
//!
//! Loads a scenario from a file or the built-in registry, plays it, and
//! prints the report.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::commands::scenarios;
use crate::config::{LoadResult, ScenarioConfig, ScenarioLoader};
use crate::error::RosterAnimatorError;
use crate::observability::EventEmitter;
use crate::scenario::{RunReport, ScenarioRunner};

/// Play a scenario and print the report.
///
/// # Errors
///
/// Returns a configuration error if the scenario cannot be loaded, an I/O
/// error if the events file or metrics listener cannot be opened, or a
/// scenario error if playback fails.
pub async fn run(args: &RunArgs) -> Result<(), RosterAnimatorError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = load(args)?;

    let mut runner = ScenarioRunner::new(config);
    if let Some(path) = &args.events {
        runner = runner.with_emitter(Arc::new(EventEmitter::from_file(path)?));
    }

    let report = runner.run().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print!("{}", format_report(&report)),
    }
    Ok(())
}

fn load(args: &RunArgs) -> Result<Arc<ScenarioConfig>, RosterAnimatorError> {
    let loader = ScenarioLoader::with_defaults();
    let LoadResult { config, warnings } = if let Some(path) = &args.scenario {
        tracing::info!(scenario = %path.display(), "loading scenario");
        loader.load(path)?
    } else if let Some(name) = &args.builtin {
        tracing::info!(builtin = %name, "loading built-in scenario");
        loader.load_from_str(scenarios::lookup(name)?.yaml)?
    } else {
        return Err(RosterAnimatorError::Usage(
            "either a scenario path or --builtin is required".to_owned(),
        ));
    };

    for warning in &warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(config)
}

/// Renders a report as plain text.
#[must_use]
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scenario: {}", report.scenario);
    let _ = writeln!(
        out,
        "  steps: {}  ignored: {}  events: {}  elapsed: {}ms",
        report.steps,
        report.ignored_steps.len(),
        report.events.len(),
        report.elapsed_ms
    );

    let _ = writeln!(out, "\nEvents");
    for event in &report.events {
        let id = event.id.as_ref().map_or("", |id| id.as_str());
        let _ = write!(out, "  +{:<8}{:<20}{id}", format!("{}ms", event.offset_ms), event.kind);
        if let Some(detail) = &event.detail {
            let _ = write!(out, " {detail}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\nRoster");
    let _ = writeln!(out, "  {:<24}{:<10}{:<11}INTERACTIVE", "ID", "STATE", "COMPLETED");
    for entity in &report.roster {
        let _ = writeln!(
            out,
            "  {:<24}{:<10}{:<11}{}",
            entity.id.as_str(),
            entity.state,
            yes_no(entity.entrance_completed),
            yes_no(entity.interactive)
        );
    }

    if !report.deletes.is_empty() {
        let _ = writeln!(out, "\nDelete calls");
        for call in &report.deletes {
            let outcome = if call.ok { "ok" } else { "rejected" };
            let _ = writeln!(out, "  +{}ms {} {outcome}", call.offset_ms, call.id);
        }
    }

    if !report.notifications.is_empty() {
        let _ = writeln!(out, "\nNotifications");
        for n in &report.notifications {
            let _ = writeln!(out, "  #{} {}: {}", n.seq, n.entity, n.message);
        }
    }
    out
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
