//! Command-line frontend for the podtriage diagnosis engine.
//!
//! Wires the pieces together: clap argument parsing, JSON snapshot
//! loading, the `triage-core` engine, and text/JSON rendering. The engine
//! itself lives in `triage-core`; this crate only moves bytes in and out.

pub mod cli;
pub mod loader;
pub mod output;

use anyhow::{anyhow, Result};
use triage_core::{Engine, EngineOptions, Explanation, RuleCategory};

/// Parses category names from the command line.
///
/// # Errors
///
/// Returns an error naming the first unrecognized category.
pub fn parse_categories(names: &[String]) -> Result<Vec<RuleCategory>> {
    names
        .iter()
        .map(|name| {
            RuleCategory::parse(name)
                .ok_or_else(|| anyhow!("unknown rule category '{name}'"))
        })
        .collect()
}

/// Runs loader → engine → renderer for a parsed command line and returns
/// the rendered report.
pub fn run(cli: &cli::Cli) -> Result<String> {
    let snapshot = loader::build_snapshot(cli)?;
    let options = EngineOptions::default()
        .with_enabled(parse_categories(&cli.enable_categories)?)
        .with_disabled(parse_categories(&cli.disable_categories)?)
        .with_verbose(cli.verbose);
    let engine = Engine::with_options(options)?;
    let explanation = engine.explain(&snapshot);
    if let Some(error) = &explanation.metadata.error {
        return Err(anyhow!("{error}"));
    }
    render(&explanation, cli.format)
}

/// Renders an explanation in the requested format.
pub fn render(explanation: &Explanation, format: cli::Format) -> Result<String> {
    match format {
        cli::Format::Text => Ok(output::format_text(explanation)),
        cli::Format::Json => Ok(output::format_json(explanation)?),
    }
}
