//! Command-line argument parsing with clap.

use clap::{Parser, ValueEnum};

/// Explain why a Kubernetes pod is failing, from JSON snapshots.
#[derive(Parser, Debug, Clone)]
#[command(name = "podtriage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the Pod JSON.
    #[arg(long)]
    pub pod: String,

    /// Path to the Events JSON (array, List object, or single event).
    #[arg(long)]
    pub events: String,

    /// Path to PVC JSON (single object or List).
    #[arg(long)]
    pub pvc: Option<String>,

    /// Path to PV JSON (single object or List).
    #[arg(long)]
    pub pv: Option<String>,

    /// Path to StorageClass JSON (single object or List).
    #[arg(long)]
    pub storageclass: Option<String>,

    /// Path to Node JSON.
    #[arg(long)]
    pub node: Option<String>,

    /// Path to the owning controller JSON (ReplicaSet/Deployment/StatefulSet).
    #[arg(long)]
    pub owner: Option<String>,

    /// Path to ServiceAccount JSON.
    #[arg(long)]
    pub serviceaccount: Option<String>,

    /// Path to Secrets JSON (single object or List).
    #[arg(long)]
    pub secrets: Option<String>,

    /// Path to ConfigMaps JSON (single object or List).
    #[arg(long)]
    pub configmaps: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Restrict rules to these categories.
    #[arg(long = "enable-categories", value_name = "CATEGORY")]
    pub enable_categories: Vec<String>,

    /// Remove rules in these categories after the enable filter.
    #[arg(long = "disable-categories", value_name = "CATEGORY")]
    pub disable_categories: Vec<String>,

    /// Include the per-rule evaluation trace in metadata.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable report.
    #[default]
    Text,
    /// Pretty-printed JSON for scripting.
    Json,
}
