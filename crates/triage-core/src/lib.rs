//! # triage-core
//!
//! A read-only diagnostic reasoning engine for failing Kubernetes
//! workloads. Given a snapshot of a pod plus related cluster objects
//! (events, PVCs, PVs, storage classes, the node, the owning controller),
//! it produces a deterministic, structured explanation of the most likely
//! root cause with supporting evidence, a confidence score, and suggested
//! next checks.
//!
//! ## How it works
//!
//! - **Normalization**: raw JSON objects become a typed [`ObjectGraph`]
//!   and a semantically tagged event [`Timeline`].
//! - **Rules**: a prioritized corpus of atomic and compound rules (both
//!   programmatic and declarative) inspects the graph and timeline.
//! - **Resolution**: matched rules go through suppression and
//!   compositional confidence scoring; a single winner becomes the
//!   [`Explanation`].
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use triage_core::{Engine, Snapshot};
//!
//! let snapshot = Snapshot::new(
//!     json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}}),
//!     json!([{
//!         "reason": "FailedScheduling",
//!         "message": "0/3 nodes are available: 1 node(s) had untolerated taint"
//!     }]),
//! );
//!
//! let engine = Engine::new().expect("built-in rules are valid");
//! let explanation = engine.explain(&snapshot);
//! assert_eq!(
//!     explanation.root_cause.map(|c| c.kind),
//!     Some("UnschedulableTaint".to_string())
//! );
//! ```
//!
//! The engine never mutates its inputs, performs no I/O during
//! evaluation, and yields byte-identical output for identical input.

pub mod checks;
pub mod engine;
pub mod error;
pub mod graph;
pub mod rules;
pub mod timeline;
pub mod types;

// Re-export the core surface for convenience
pub use checks::suggested_checks;
pub use engine::{Engine, EngineOptions};
pub use error::{Result, TriageError};
pub use graph::{normalize, ObjectGraph, ObjectKind, Snapshot};
pub use rules::{Registry, Rule, RuleMeta};
pub use timeline::{classify_reason, EventKind, EventPhase, EventPredicate, NormalizedEvent, Timeline};
pub use types::{
    CausalChain, Cause, Evidence, EvidenceSource, Explanation, ExplanationMetadata, RuleCategory,
    RuleMatch, SuppressedRule,
};
