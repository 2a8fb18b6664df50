//! Causality primitives and the explanation output schema.
//!
//! This module defines the value types the engine reasons with: evidence
//! records, causes, causal chains, rule matches, and the final
//! [`Explanation`] consumed by renderers. All entities are immutable after
//! construction; the engine combines and discards them per invocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a piece of evidence was observed.
///
/// The variant order is the precedence order: object state beats derived
/// conditions, which beat timeline inference, which beats raw events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EvidenceSource {
    /// A fact read directly from an object's status or spec.
    ObjectState,
    /// A structured condition (pod, node, or owner conditions).
    Condition,
    /// A conclusion drawn from temporal queries over normalized events.
    Timeline,
    /// A single raw event record.
    Event,
}

impl EvidenceSource {
    /// Returns the quality weight used in confidence composition.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            Self::ObjectState => 1.0,
            Self::Condition => 0.9,
            Self::Timeline => 0.75,
            Self::Event => 0.6,
        }
    }

    /// Returns the precedence rank (lower sorts first).
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::ObjectState => 0,
            Self::Condition => 1,
            Self::Timeline => 2,
            Self::Event => 3,
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectState => write!(f, "ObjectState"),
            Self::Condition => write!(f, "Condition"),
            Self::Timeline => write!(f, "Timeline"),
            Self::Event => write!(f, "Event"),
        }
    }
}

/// A single observed fact supporting a cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Where the fact was observed.
    pub source: EvidenceSource,
    /// Field path or event reason identifying the fact.
    pub locator: String,
    /// Short human-readable excerpt of the observation.
    pub snippet: String,
}

impl Evidence {
    /// Creates a new evidence record.
    #[must_use]
    pub fn new(
        source: EvidenceSource,
        locator: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            source,
            locator: locator.into(),
            snippet: snippet.into(),
        }
    }

    /// Evidence read from an object's live state.
    #[must_use]
    pub fn object_state(locator: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::new(EvidenceSource::ObjectState, locator, snippet)
    }

    /// Evidence read from a structured condition.
    #[must_use]
    pub fn condition(locator: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::new(EvidenceSource::Condition, locator, snippet)
    }

    /// Evidence derived from a timeline query.
    #[must_use]
    pub fn timeline(locator: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::new(EvidenceSource::Timeline, locator, snippet)
    }

    /// Evidence taken from a single raw event.
    #[must_use]
    pub fn event(locator: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::new(EvidenceSource::Event, locator, snippet)
    }

    /// Deduplication key for evidence lists.
    #[must_use]
    pub fn dedup_key(&self) -> (EvidenceSource, &str) {
        (self.source, self.locator.as_str())
    }
}

/// A named, evidenced claim about why the pod is in its current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    /// Deterministic identifier: `<kind>/<involved_object>`.
    pub id: String,
    /// Symbolic cause kind, e.g. `"PVCNotBound"`.
    pub kind: String,
    /// Object the cause is about (pod, PVC, node, ... name).
    pub involved_object: String,
    /// Human-readable statement of the cause.
    pub message: String,
    /// Facts supporting the claim, precedence-ordered.
    pub evidence: Vec<Evidence>,
    /// Cause-local confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Cause {
    /// Creates a new cause for the given kind and involved object.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        involved_object: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        let involved_object = involved_object.into();
        Self {
            id: format!("{kind}/{involved_object}"),
            kind,
            involved_object,
            message: message.into(),
            evidence: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Adds a piece of evidence.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Sets the cause-local confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Identity of a cause: `(kind, involved_object)`.
    #[must_use]
    pub fn identity(&self) -> (&str, &str) {
        (self.kind.as_str(), self.involved_object.as_str())
    }

    /// Quality of the best supporting evidence (0.0 when unevidenced).
    #[must_use]
    pub fn evidence_quality(&self) -> f64 {
        self.evidence
            .iter()
            .map(|e| e.source.weight())
            .fold(0.0, f64::max)
    }

    /// Sorts evidence by source precedence; insertion order is kept within
    /// a source class.
    pub fn order_evidence(&mut self) {
        self.evidence.sort_by_key(|e| e.source.rank());
    }
}

/// A structured bundle of root causes, downstream symptoms, and
/// contributing factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CausalChain {
    /// The claimed root cause(s).
    pub causes: Vec<Cause>,
    /// Observable downstream effects.
    pub symptoms: Vec<Cause>,
    /// Corroborating factors.
    pub contributing: Vec<Cause>,
}

impl CausalChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.causes.push(cause);
        self
    }

    /// Adds a downstream symptom.
    #[must_use]
    pub fn with_symptom(mut self, symptom: Cause) -> Self {
        self.symptoms.push(symptom);
        self
    }

    /// Adds a contributing factor.
    #[must_use]
    pub fn with_contributing(mut self, contributing: Cause) -> Self {
        self.contributing.push(contributing);
        self
    }

    /// Returns true when the chain carries no causes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty() && self.symptoms.is_empty() && self.contributing.is_empty()
    }

    /// All evidence across the chain, in causes → symptoms → contributing
    /// order.
    #[must_use]
    pub fn all_evidence(&self) -> Vec<&Evidence> {
        self.causes
            .iter()
            .chain(self.symptoms.iter())
            .chain(self.contributing.iter())
            .flat_map(|c| c.evidence.iter())
            .collect()
    }

    /// Concatenates another chain into this one, deduplicating causes by
    /// identity. When two causes share an identity the copy with the higher
    /// evidence quality is retained.
    #[must_use]
    pub fn merged_with(mut self, other: CausalChain) -> Self {
        merge_causes(&mut self.causes, other.causes);
        merge_causes(&mut self.symptoms, other.symptoms);
        merge_causes(&mut self.contributing, other.contributing);
        self
    }

    /// Sorts every cause's evidence by source precedence.
    pub fn order_evidence(&mut self) {
        for cause in self
            .causes
            .iter_mut()
            .chain(self.symptoms.iter_mut())
            .chain(self.contributing.iter_mut())
        {
            cause.order_evidence();
        }
    }
}

fn merge_causes(into: &mut Vec<Cause>, from: Vec<Cause>) {
    for candidate in from {
        match into
            .iter_mut()
            .find(|existing| existing.identity() == candidate.identity())
        {
            Some(existing) => {
                if candidate.evidence_quality() > existing.evidence_quality() {
                    *existing = candidate;
                }
            }
            None => into.push(candidate),
        }
    }
}

/// Functional category a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RuleCategory {
    /// Pod placement and scheduling failures.
    Scheduling,
    /// PVC, PV, and StorageClass failures.
    Storage,
    /// Container image resolution and pull failures.
    Image,
    /// Liveness, readiness, and startup probe failures.
    Probe,
    /// Container lifecycle failures (crashes, OOM, hooks).
    Lifecycle,
    /// Pod sandbox and CNI failures.
    Network,
    /// Config, secret, quota, and webhook rejections.
    Admission,
    /// Node readiness and resource-pressure failures.
    NodePressure,
    /// Controller (ReplicaSet/Deployment/StatefulSet) failures.
    Owner,
}

impl RuleCategory {
    /// Parses a category from its case-insensitive name.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "scheduling" => Some(Self::Scheduling),
            "storage" => Some(Self::Storage),
            "image" => Some(Self::Image),
            "probe" => Some(Self::Probe),
            "lifecycle" => Some(Self::Lifecycle),
            "network" => Some(Self::Network),
            "admission" => Some(Self::Admission),
            "nodepressure" | "node-pressure" => Some(Self::NodePressure),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scheduling => "Scheduling",
            Self::Storage => "Storage",
            Self::Image => "Image",
            Self::Probe => "Probe",
            Self::Lifecycle => "Lifecycle",
            Self::Network => "Network",
            Self::Admission => "Admission",
            Self::NodePressure => "NodePressure",
            Self::Owner => "Owner",
        };
        write!(f, "{name}")
    }
}

/// A rule that fired, before resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Name of the rule that matched.
    pub rule_name: String,
    /// Resolution-ordering priority declared by the rule.
    pub priority: i32,
    /// The rule's category.
    pub category: RuleCategory,
    /// The explanation the rule produced.
    pub chain: CausalChain,
    /// Baseline confidence declared by the rule.
    pub rule_confidence: f64,
    /// Rules this match suppresses.
    pub blocks: Vec<String>,
}

/// A rule excluded from the output by a higher-precedence match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedRule {
    /// The suppressed rule's name.
    pub name: String,
    /// Why it was suppressed, e.g. `"suppressed by PVCPendingThenCrashloop"`.
    pub reason: String,
}

/// One entry of the verbose per-rule evaluation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    /// Rule name.
    pub name: String,
    /// Whether the rule's predicate held.
    pub matched: bool,
    /// Whether the match was suppressed during resolution.
    pub suppressed: bool,
    /// Composed confidence (0.0 for rules that did not match).
    pub composed_confidence: f64,
}

/// A rule whose evaluation failed internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleError {
    /// Rule name.
    pub name: String,
    /// Captured failure message.
    pub message: String,
}

/// Metadata stamped onto every explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationMetadata {
    /// SHA-256 over the canonicalized input snapshot.
    pub inputs_hash: String,
    /// Engine version string.
    pub engine_version: String,
    /// Number of rules evaluated after requires/category filtering.
    pub rules_evaluated: usize,
    /// Number of rules whose predicate held.
    pub rules_matched: usize,
    /// Input-level failure, when the invocation short-circuited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rules whose evaluation failed internally (treated as non-matching).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rule_errors: Vec<RuleError>,
    /// Per-rule trace, present only under the verbose option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_trace: Option<Vec<RuleEvaluation>>,
}

/// The final diagnosis record consumed by renderers.
///
/// Field order and key names are part of the output contract; renderers must
/// not reorder arrays or recompute confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Most likely root cause, or `None` when no rule matched.
    pub root_cause: Option<Cause>,
    /// Composed confidence of the winning match, three-decimal precision.
    pub confidence: f64,
    /// The winning causal chain, enriched with contributing causes.
    pub causal_chain: CausalChain,
    /// Matches excluded by suppression.
    pub suppressed_rules: Vec<SuppressedRule>,
    /// Deduplicated union of evidence across winner and contributors.
    pub evidence: Vec<Evidence>,
    /// Ordered operator checks for the diagnosed cause kinds.
    pub suggested_next_checks: Vec<String>,
    /// Invocation metadata.
    pub metadata: ExplanationMetadata,
}

impl Explanation {
    /// An empty explanation carrying only metadata.
    #[must_use]
    pub fn empty(metadata: ExplanationMetadata) -> Self {
        Self {
            root_cause: None,
            confidence: 0.0,
            causal_chain: CausalChain::new(),
            suppressed_rules: Vec::new(),
            evidence: Vec::new(),
            suggested_next_checks: Vec::new(),
            metadata,
        }
    }

    /// Returns true when the engine found no signal.
    #[must_use]
    pub fn is_inconclusive(&self) -> bool {
        self.root_cause.is_none()
    }
}

/// Rounds a confidence to the three decimal places the output contract
/// requires.
#[must_use]
pub fn round_confidence(value: f64) -> f64 {
    (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
