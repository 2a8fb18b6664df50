//! Loads JSON snapshot files into the engine's input record.
//!
//! The loader is a thin contract: parse each file and hand the values to
//! the engine exactly as provided. Unknown keys inside the objects are the
//! engine's business (it ignores them); unreadable or unparseable files
//! are input errors.

use crate::cli::Cli;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;
use triage_core::Snapshot;

/// Reads and parses one JSON file.
pub fn load_json(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    debug!(path = %path.display(), "loaded input file");
    Ok(value)
}

/// Builds the engine snapshot from the parsed command line.
pub fn build_snapshot(cli: &Cli) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new(load_json(&cli.pod)?, load_json(&cli.events)?);
    if let Some(path) = &cli.pvc {
        snapshot = snapshot.with_pvc(load_json(path)?);
    }
    if let Some(path) = &cli.pv {
        snapshot = snapshot.with_pv(load_json(path)?);
    }
    if let Some(path) = &cli.storageclass {
        snapshot = snapshot.with_storageclass(load_json(path)?);
    }
    if let Some(path) = &cli.node {
        snapshot = snapshot.with_node(load_json(path)?);
    }
    if let Some(path) = &cli.owner {
        snapshot = snapshot.with_owner(load_json(path)?);
    }
    if let Some(path) = &cli.serviceaccount {
        snapshot = snapshot.with_serviceaccount(load_json(path)?);
    }
    if let Some(path) = &cli.secrets {
        snapshot = snapshot.with_secrets(load_json(path)?);
    }
    if let Some(path) = &cli.configmaps {
        snapshot = snapshot.with_configmaps(load_json(path)?);
    }
    Ok(snapshot)
}
