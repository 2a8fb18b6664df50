//! The rule contract, metadata, and registry.
//!
//! A rule is a pure predicate plus an explainer over `(ObjectGraph,
//! Timeline)`. Rules come in two concrete variants: programmatic (the
//! category modules below) and declarative (definitions interpreted from
//! embedded JSON, see [`declarative`]). The registry discovers all of them
//! at engine construction, validates name uniqueness, and fixes the
//! deterministic evaluation order.

use crate::error::{Result, TriageError};
use crate::graph::{ObjectGraph, ObjectKind};
use crate::timeline::Timeline;
use crate::types::{CausalChain, RuleCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

pub mod admission;
pub mod compound;
pub mod declarative;
pub mod image;
pub mod lifecycle;
pub mod network;
pub mod node;
pub mod owner;
pub mod probe;
pub mod scheduling;
pub mod storage;

/// Static metadata a rule declares about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    /// Unique rule name.
    pub name: String,
    /// Functional category.
    pub category: RuleCategory,
    /// Resolution priority; higher wins ties.
    pub priority: i32,
    /// Baseline confidence in `[0, 1]`.
    pub confidence: f64,
    /// Object kinds that must be present for the rule to be evaluated.
    pub requires: Vec<ObjectKind>,
    /// Object kinds that improve the rule's data completeness when present.
    pub optional: Vec<ObjectKind>,
    /// Pod phases the rule applies to; empty means all phases.
    pub phases: Vec<String>,
    /// When true, some container must be waiting or have terminated.
    pub needs_stuck_container: bool,
    /// Rules this rule suppresses when it matches.
    pub blocks: Vec<String>,
    /// Number of corroborating evidences the rule expects (0..=3).
    pub expected_evidence: u8,
}

impl RuleMeta {
    /// Creates metadata with defaults: priority 50, confidence 0.5, no
    /// requirements beyond pod and events.
    #[must_use]
    pub fn new(name: impl Into<String>, category: RuleCategory) -> Self {
        Self {
            name: name.into(),
            category,
            priority: 50,
            confidence: 0.5,
            requires: vec![ObjectKind::Pod, ObjectKind::Events],
            optional: Vec::new(),
            phases: Vec::new(),
            needs_stuck_container: false,
            blocks: Vec::new(),
            expected_evidence: 1,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the baseline confidence.
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Adds required object kinds.
    #[must_use]
    pub fn requires(mut self, kinds: &[ObjectKind]) -> Self {
        self.requires.extend_from_slice(kinds);
        self
    }

    /// Adds optional object kinds.
    #[must_use]
    pub fn optional(mut self, kinds: &[ObjectKind]) -> Self {
        self.optional.extend_from_slice(kinds);
        self
    }

    /// Restricts the rule to the given pod phases.
    #[must_use]
    pub fn phases(mut self, phases: &[&str]) -> Self {
        self.phases = phases.iter().map(ToString::to_string).collect();
        self
    }

    /// Requires a waiting or terminated container before evaluation.
    #[must_use]
    pub const fn needs_stuck_container(mut self) -> Self {
        self.needs_stuck_container = true;
        self
    }

    /// Declares the rules this rule suppresses.
    #[must_use]
    pub fn blocks(mut self, names: &[&str]) -> Self {
        self.blocks = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Declares the number of corroborating evidences expected.
    #[must_use]
    pub const fn expected_evidence(mut self, count: u8) -> Self {
        self.expected_evidence = count;
        self
    }

    /// Whether the rule is applicable to this graph at all: required
    /// objects present, pod phase in range, container-state gate satisfied.
    /// An inapplicable rule is skipped, not counted as non-matching.
    #[must_use]
    pub fn applies_to(&self, graph: &ObjectGraph) -> bool {
        if !self.requires.iter().all(|kind| graph.has(*kind)) {
            return false;
        }
        if !self.phases.is_empty() && !self.phases.iter().any(|p| *p == graph.pod.phase) {
            return false;
        }
        if self.needs_stuck_container && !graph.pod.has_stuck_container() {
            return false;
        }
        true
    }
}

/// The capability set every rule implements.
///
/// Both operations must be deterministic and side-effect free; `explain` is
/// invoked only after `matches` returned true.
pub trait Rule: Send + Sync {
    /// The rule's static metadata.
    fn meta(&self) -> &RuleMeta;

    /// Pure predicate over the normalized inputs.
    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool;

    /// Builds the causal chain for a matched rule.
    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain;

    /// Baseline confidence for this invocation. Defaults to the declared
    /// metadata value; rules may refine it from observed signal strength.
    fn confidence(&self, _graph: &ObjectGraph, timeline: &Timeline) -> f64 {
        let _ = timeline;
        self.meta().confidence
    }
}

/// The immutable, ordered rule collection the engine evaluates.
pub struct Registry {
    rules: Vec<Box<dyn Rule>>,
}

impl Registry {
    /// Builds the full built-in corpus: every programmatic category module
    /// plus the embedded declarative definitions.
    pub fn builtin() -> Result<Self> {
        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        rules.extend(scheduling::rules());
        rules.extend(storage::rules());
        rules.extend(image::rules());
        rules.extend(probe::rules());
        rules.extend(lifecycle::rules());
        rules.extend(network::rules());
        rules.extend(admission::rules());
        rules.extend(node::rules());
        rules.extend(owner::rules());
        rules.extend(compound::rules());
        rules.extend(declarative::builtin_rules()?);
        Self::from_rules(rules)
    }

    /// Builds a registry from an explicit rule set, validating each
    /// definition and fixing the evaluation order.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::RuleMalformed`] on an empty name, a duplicate
    /// name, an out-of-range confidence, or more than three expected
    /// corroborations.
    pub fn from_rules(mut rules: Vec<Box<dyn Rule>>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            let meta = rule.meta();
            if meta.name.is_empty() {
                return Err(TriageError::RuleMalformed(
                    "rule with empty name".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&meta.confidence) {
                return Err(TriageError::RuleMalformed(format!(
                    "rule '{}' declares confidence {} outside [0, 1]",
                    meta.name, meta.confidence
                )));
            }
            if meta.expected_evidence > 3 {
                return Err(TriageError::RuleMalformed(format!(
                    "rule '{}' expects {} corroborations (max 3)",
                    meta.name, meta.expected_evidence
                )));
            }
            if !seen.insert(meta.name.clone()) {
                return Err(TriageError::RuleMalformed(format!(
                    "duplicate rule name '{}'",
                    meta.name
                )));
            }
        }
        rules.sort_by(|a, b| {
            b.meta()
                .priority
                .cmp(&a.meta().priority)
                .then_with(|| a.meta().name.cmp(&b.meta().name))
        });
        debug!(count = rules.len(), "rule registry constructed");
        Ok(Self { rules })
    }

    /// Rules in evaluation order: priority descending, name ascending.
    #[must_use]
    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the registry holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.meta().name.as_str()).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::graph::{normalize, ObjectGraph, Snapshot};
    use crate::timeline::Timeline;
    use serde_json::Value;

    /// Normalizes a pod + events pair for rule tests.
    pub(crate) fn graph_from(pod: Value, events: Value) -> (ObjectGraph, Timeline) {
        normalize(&Snapshot::new(pod, events)).expect("test pod is valid")
    }

    /// Normalizes a full snapshot for rule tests.
    pub(crate) fn graph_from_snapshot(snapshot: &Snapshot) -> (ObjectGraph, Timeline) {
        normalize(snapshot).expect("test snapshot is valid")
    }
}
