//! Data-driven rules.
//!
//! A declarative rule is a definition deserialized from structured JSON: a
//! set of object-presence requirements, timeline predicates, and a fixed
//! chain template. Definitions execute no code; an interpreter evaluates
//! the tagged predicate variants against the timeline. The built-in corpus
//! is embedded at compile time from `builtin_rules.json`.

use super::{Rule, RuleMeta};
use crate::error::{Result, TriageError};
use crate::graph::{ObjectGraph, ObjectKind};
use crate::timeline::{EventKind, EventPhase, EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BUILTIN_RULES: &str = include_str!("builtin_rules.json");

/// One predicate of a declarative rule; all of a rule's predicates must
/// hold for the rule to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum WhenClause {
    /// An event matching the given fields exists.
    HasEvent {
        /// Exact reason, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Event kind name, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        /// Event phase name, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
        /// Case-insensitive message substring, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        message_contains: Option<String>,
    },
    /// At least `min_count` occurrences of `reason`, optionally windowed.
    Repeated {
        /// Exact reason.
        reason: String,
        /// Minimum occurrences.
        min_count: u32,
        /// Sliding window in seconds, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        within_seconds: Option<i64>,
    },
    /// Events with the given reasons appear in order.
    Pattern {
        /// Reasons that must appear in sequence.
        reasons: Vec<String>,
    },
    /// The pod is in the given phase.
    PodPhase {
        /// Required phase.
        phase: String,
    },
}

impl WhenClause {
    fn to_predicate(&self) -> Result<Option<EventPredicate>> {
        match self {
            Self::HasEvent {
                reason,
                kind,
                phase,
                message_contains,
            } => {
                let mut predicate = EventPredicate::any();
                if let Some(reason) = reason {
                    predicate = predicate.with_reason(reason.clone());
                }
                if let Some(kind) = kind {
                    predicate.kind = Some(parse_event_kind(kind)?);
                }
                if let Some(phase) = phase {
                    predicate = predicate.with_phase(parse_event_phase(phase)?);
                }
                if let Some(needle) = message_contains {
                    predicate = predicate.with_message(needle.clone());
                }
                Ok(Some(predicate))
            }
            _ => Ok(None),
        }
    }

    fn holds(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        match self {
            Self::HasEvent { .. } => self
                .to_predicate()
                .ok()
                .flatten()
                .is_some_and(|p| timeline.has(&p)),
            Self::Repeated {
                reason,
                min_count,
                within_seconds,
            } => timeline.repeated(reason, *min_count, *within_seconds),
            Self::Pattern { reasons } => {
                let sequence: Vec<EventPredicate> = reasons
                    .iter()
                    .map(|r| EventPredicate::reason(r.clone()))
                    .collect();
                timeline.pattern(&sequence)
            }
            Self::PodPhase { phase } => graph.pod.phase == *phase,
        }
    }
}

fn parse_event_kind(name: &str) -> Result<EventKind> {
    match name {
        "Scheduling" => Ok(EventKind::Scheduling),
        "Image" => Ok(EventKind::Image),
        "Volume" => Ok(EventKind::Volume),
        "Probe" => Ok(EventKind::Probe),
        "Network" => Ok(EventKind::Network),
        "Admission" => Ok(EventKind::Admission),
        "Lifecycle" => Ok(EventKind::Lifecycle),
        "NodePressure" => Ok(EventKind::NodePressure),
        "Owner" => Ok(EventKind::Owner),
        "Generic" => Ok(EventKind::Generic),
        other => Err(TriageError::RuleMalformed(format!(
            "unknown event kind '{other}'"
        ))),
    }
}

fn parse_event_phase(name: &str) -> Result<EventPhase> {
    match name {
        "Failure" => Ok(EventPhase::Failure),
        "Warning" => Ok(EventPhase::Warning),
        "Info" => Ok(EventPhase::Info),
        other => Err(TriageError::RuleMalformed(format!(
            "unknown event phase '{other}'"
        ))),
    }
}

/// The fixed cause template of a declarative rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CauseTemplate {
    /// Symbolic cause kind.
    pub kind: String,
    /// Cause message.
    pub message: String,
}

/// The chain template: one root cause, optional symptoms and contributors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTemplate {
    /// Root cause template.
    pub cause: CauseTemplate,
    /// Symptom templates.
    #[serde(default)]
    pub symptoms: Vec<CauseTemplate>,
    /// Contributing-factor templates.
    #[serde(default)]
    pub contributing: Vec<CauseTemplate>,
}

fn default_priority() -> i32 {
    50
}

fn default_expected_evidence() -> u8 {
    1
}

/// A complete declarative rule definition as it appears in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique rule name.
    pub name: String,
    /// Category name, parsed case-insensitively.
    pub category: String,
    /// Resolution priority.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Baseline confidence.
    pub confidence: f64,
    /// Required object slots beyond pod and events.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Optional object slots.
    #[serde(default)]
    pub optional: Vec<String>,
    /// Applicable pod phases.
    #[serde(default)]
    pub phases: Vec<String>,
    /// Suppressed rule names.
    #[serde(default)]
    pub blocks: Vec<String>,
    /// Expected corroborating evidences.
    #[serde(default = "default_expected_evidence")]
    pub expected_evidence: u8,
    /// Predicates, all of which must hold.
    pub when: Vec<WhenClause>,
    /// The chain produced on a match.
    pub chain: ChainTemplate,
}

/// A declarative rule definition bound to interpretable metadata.
pub struct DeclarativeRule {
    meta: RuleMeta,
    definition: RuleDefinition,
}

impl DeclarativeRule {
    /// Validates a definition and binds it into a rule.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::RuleMalformed`] on an unknown category,
    /// object kind, event kind/phase, or an empty `when` list.
    pub fn new(definition: RuleDefinition) -> Result<Self> {
        let category = RuleCategory::parse(&definition.category).ok_or_else(|| {
            TriageError::RuleMalformed(format!(
                "rule '{}' has unknown category '{}'",
                definition.name, definition.category
            ))
        })?;
        if definition.when.is_empty() {
            return Err(TriageError::RuleMalformed(format!(
                "rule '{}' has no predicates",
                definition.name
            )));
        }
        // surface bad kind/phase names at construction, not match time
        for clause in &definition.when {
            clause.to_predicate()?;
        }
        let mut meta = RuleMeta::new(&definition.name, category)
            .priority(definition.priority)
            .confidence(definition.confidence)
            .expected_evidence(definition.expected_evidence);
        meta.requires.extend(parse_kinds(&definition.name, &definition.requires)?);
        meta.optional = parse_kinds(&definition.name, &definition.optional)?;
        meta.phases.clone_from(&definition.phases);
        meta.blocks.clone_from(&definition.blocks);
        Ok(Self { meta, definition })
    }

    fn involved_object(&self, graph: &ObjectGraph, timeline: &Timeline) -> String {
        self.definition
            .when
            .iter()
            .filter_map(|clause| clause.to_predicate().ok().flatten())
            .filter_map(|p| timeline.first(&p).map(|e| e.involved_object.clone()))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| graph.pod.name.clone())
    }
}

fn parse_kinds(rule: &str, names: &[String]) -> Result<Vec<ObjectKind>> {
    names
        .iter()
        .map(|name| {
            ObjectKind::parse(name).ok_or_else(|| {
                TriageError::RuleMalformed(format!(
                    "rule '{rule}' references unknown object kind '{name}'"
                ))
            })
        })
        .collect()
}

impl Rule for DeclarativeRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        self.definition
            .when
            .iter()
            .all(|clause| clause.holds(graph, timeline))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let object = self.involved_object(graph, timeline);
        let mut cause = Cause::new(
            &self.definition.chain.cause.kind,
            &object,
            &self.definition.chain.cause.message,
        );
        // every event predicate that held contributes its matched event
        for clause in &self.definition.when {
            if let Ok(Some(predicate)) = clause.to_predicate() {
                if let Some(event) = timeline.first(&predicate) {
                    cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
                }
            }
            if let WhenClause::Repeated { reason, .. } = clause {
                let occurrences = timeline.occurrences(&EventPredicate::reason(reason.clone()));
                cause = cause.with_evidence(Evidence::timeline(
                    reason.clone(),
                    format!("{occurrences} occurrences of {reason}"),
                ));
            }
            if let WhenClause::PodPhase { phase } = clause {
                cause = cause.with_evidence(Evidence::object_state(
                    "status.phase",
                    phase.clone(),
                ));
            }
        }
        let mut chain = CausalChain::new().with_cause(cause);
        for template in &self.definition.chain.symptoms {
            chain = chain.with_symptom(Cause::new(&template.kind, &object, &template.message));
        }
        for template in &self.definition.chain.contributing {
            chain = chain.with_contributing(Cause::new(&template.kind, &object, &template.message));
        }
        chain
    }
}

/// Loads the embedded declarative corpus.
///
/// # Errors
///
/// Returns [`TriageError::RuleMalformed`] when the embedded JSON does not
/// parse or any definition is invalid; this fails engine construction.
pub fn builtin_rules() -> Result<Vec<Box<dyn Rule>>> {
    parse_rules(BUILTIN_RULES)
}

/// Parses declarative rules from a JSON document (an array of
/// definitions).
pub fn parse_rules(source: &str) -> Result<Vec<Box<dyn Rule>>> {
    let definitions: Vec<RuleDefinition> = serde_json::from_str(source)
        .map_err(|e| TriageError::RuleMalformed(format!("declarative corpus: {e}")))?;
    debug!(count = definitions.len(), "loaded declarative rule definitions");
    definitions
        .into_iter()
        .map(|definition| DeclarativeRule::new(definition).map(|r| Box::new(r) as Box<dyn Rule>))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testutil::graph_from;
    use serde_json::json;

    fn definition(source: serde_json::Value) -> RuleDefinition {
        serde_json::from_value(source).expect("definition parses")
    }

    #[test]
    fn builtin_corpus_parses() {
        let rules = builtin_rules().expect("embedded corpus is valid");
        assert!(rules.len() >= 10);
    }

    #[test]
    fn unknown_category_is_rule_malformed() {
        let result = DeclarativeRule::new(definition(json!({
            "name": "X",
            "category": "Bogus",
            "confidence": 0.5,
            "when": [{"predicate": "has_event", "reason": "Foo"}],
            "chain": {"cause": {"kind": "X", "message": "m"}}
        })));
        assert!(matches!(result, Err(TriageError::RuleMalformed(_))));
    }

    #[test]
    fn empty_when_list_is_rule_malformed() {
        let result = DeclarativeRule::new(definition(json!({
            "name": "X",
            "category": "Lifecycle",
            "confidence": 0.5,
            "when": [],
            "chain": {"cause": {"kind": "X", "message": "m"}}
        })));
        assert!(matches!(result, Err(TriageError::RuleMalformed(_))));
    }

    #[test]
    fn unknown_object_kind_is_rule_malformed() {
        let result = DeclarativeRule::new(definition(json!({
            "name": "X",
            "category": "Lifecycle",
            "confidence": 0.5,
            "requires": ["gadget"],
            "when": [{"predicate": "has_event", "reason": "Foo"}],
            "chain": {"cause": {"kind": "X", "message": "m"}}
        })));
        assert!(matches!(result, Err(TriageError::RuleMalformed(_))));
    }

    #[test]
    fn interpreter_matches_and_explains() {
        let rule = DeclarativeRule::new(definition(json!({
            "name": "PodPreempted",
            "category": "Scheduling",
            "priority": 71,
            "confidence": 0.88,
            "phases": ["Pending", "Failed"],
            "when": [
                {"predicate": "has_event", "reason": "Preempted"}
            ],
            "chain": {"cause": {
                "kind": "PodPreempted",
                "message": "The pod was preempted by a higher-priority workload"
            }}
        })))
        .expect("valid definition");

        let (graph, timeline) = graph_from(
            json!({"metadata": {"name": "low-prio"}, "status": {"phase": "Failed"}}),
            json!([{"reason": "Preempted", "message": "Preempted by high-prio pod"}]),
        );
        assert!(rule.meta().applies_to(&graph));
        assert!(rule.matches(&graph, &timeline));

        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].kind, "PodPreempted");
        assert!(chain.causes[0].evidence[0].snippet.contains("high-prio"));
    }

    #[test]
    fn repeated_clause_contributes_timeline_evidence() {
        let rule = DeclarativeRule::new(definition(json!({
            "name": "SandboxChurn",
            "category": "Network",
            "confidence": 0.6,
            "when": [
                {"predicate": "repeated", "reason": "SandboxChanged", "min_count": 3}
            ],
            "chain": {"cause": {"kind": "SandboxChurn", "message": "sandbox churn"}}
        })))
        .expect("valid definition");

        let (graph, timeline) = graph_from(
            json!({"metadata": {"name": "p"}, "status": {"phase": "Running"}}),
            json!([{"reason": "SandboxChanged", "count": 4}]),
        );
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert!(chain.causes[0].evidence[0].snippet.contains("4 occurrences"));
    }

    #[test]
    fn pattern_clause_respects_order() {
        let rule = DeclarativeRule::new(definition(json!({
            "name": "KillThenBackOff",
            "category": "Lifecycle",
            "confidence": 0.6,
            "when": [
                {"predicate": "pattern", "reasons": ["Killing", "BackOff"]}
            ],
            "chain": {"cause": {"kind": "KillThenBackOff", "message": "m"}}
        })))
        .expect("valid definition");

        let (graph, timeline) = graph_from(
            json!({"metadata": {"name": "p"}, "status": {"phase": "Running"}}),
            json!([
                {"reason": "BackOff", "lastTimestamp": "2024-05-01T10:00:00Z"},
                {"reason": "Killing", "lastTimestamp": "2024-05-01T10:01:00Z"}
            ]),
        );
        assert!(!rule.matches(&graph, &timeline));
    }
}
