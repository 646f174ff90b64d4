//! Validate command handler.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{LoaderOptions, ScenarioLoader};
use crate::error::{ConfigError, RosterAnimatorError};

/// Validation outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Validate scenario files without playing them.
///
/// Every file is checked before returning, so one run reports every broken
/// file.
///
/// # Errors
///
/// Returns the first file's configuration error if any file is invalid.
#[allow(clippy::unused_async)]
pub async fn run(args: &ValidateArgs) -> Result<(), RosterAnimatorError> {
    let loader = ScenarioLoader::new(LoaderOptions {
        strict: args.strict,
        ..LoaderOptions::default()
    });

    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<ConfigError> = None;

    for path in &args.files {
        let (report, error) = validate_file(&loader, path);
        reports.push(report);
        if first_error.is_none() {
            first_error = error;
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Human => {
            for report in &reports {
                if report.valid {
                    println!("ok    {}", report.file);
                } else {
                    println!("FAIL  {}", report.file);
                }
                for warning in &report.warnings {
                    println!("      warning: {warning}");
                }
                if let Some(error) = &report.error {
                    println!("      {error}");
                }
            }
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn validate_file(loader: &ScenarioLoader, path: &Path) -> (FileReport, Option<ConfigError>) {
    tracing::info!(file = %path.display(), "validating scenario");
    let file = path.display().to_string();

    match loader.load(path) {
        Ok(loaded) => {
            for warning in &loaded.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            tracing::info!(file = %path.display(), "scenario valid");
            let report = FileReport {
                file,
                valid: true,
                warnings: loaded.warnings.iter().map(ToString::to_string).collect(),
                error: None,
            };
            (report, None)
        }
        Err(e) => {
            let report = FileReport {
                file,
                valid: false,
                warnings: Vec::new(),
                error: Some(e.to_string()),
            };
            (report, Some(e))
        }
    }
}
