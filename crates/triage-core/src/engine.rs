//! The resolution engine.
//!
//! Evaluates the rule registry against a normalized snapshot, resolves
//! conflicts through suppression, composes confidence, and emits a single
//! [`Explanation`]. The computation is pure: no I/O, no shared mutable
//! state, and identical inputs produce byte-identical output.

use crate::checks::suggested_checks;
use crate::error::Result;
use crate::graph::{normalize, ObjectGraph, Snapshot};
use crate::rules::Registry;
use crate::timeline::Timeline;
use crate::types::{
    round_confidence, CausalChain, Cause, Evidence, Explanation, ExplanationMetadata,
    RuleCategory, RuleError, RuleEvaluation, RuleMatch, SuppressedRule,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Quality weight assumed for a match that recorded no evidence at all.
const BARE_INFERENCE_WEIGHT: f64 = 0.6;
/// Penalty per declared-but-absent corroborating evidence.
const CORROBORATION_STEP: f64 = 0.1;
/// Floor for the optional-object completeness fraction.
const COMPLETENESS_FLOOR: f64 = 0.5;
/// Penalty per unsuppressed rival match in the same category.
const CONFLICT_STEP: f64 = 0.1;
/// Floor for the conflict penalty.
const CONFLICT_FLOOR: f64 = 0.5;
/// Damping applied to a Pending pod with no events at all.
const PENDING_NO_EVENTS_DAMPING: f64 = 0.5;

/// Operator-facing engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Restrict evaluation to these categories; empty means all.
    pub enable_categories: Vec<RuleCategory>,
    /// Remove these categories after the enable filter.
    pub disable_categories: Vec<RuleCategory>,
    /// Include the per-rule evaluation trace in metadata.
    pub verbose: bool,
    /// Version string stamped into metadata.
    pub engine_version: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            enable_categories: Vec::new(),
            disable_categories: Vec::new(),
            verbose: false,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl EngineOptions {
    /// Restricts evaluation to the given categories.
    #[must_use]
    pub fn with_enabled(mut self, categories: Vec<RuleCategory>) -> Self {
        self.enable_categories = categories;
        self
    }

    /// Removes the given categories after the enable filter.
    #[must_use]
    pub fn with_disabled(mut self, categories: Vec<RuleCategory>) -> Self {
        self.disable_categories = categories;
        self
    }

    /// Enables the verbose per-rule trace.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn category_allowed(&self, category: RuleCategory) -> bool {
        if !self.enable_categories.is_empty() && !self.enable_categories.contains(&category) {
            return false;
        }
        !self.disable_categories.contains(&category)
    }
}

/// A [`RuleMatch`] plus the scoring inputs the resolution steps need.
struct EvaluatedMatch {
    rule_match: RuleMatch,
    completeness: f64,
    expected_evidence: u8,
}

impl EvaluatedMatch {
    fn name(&self) -> &str {
        &self.rule_match.rule_name
    }
}

/// The diagnostic reasoning engine.
///
/// Construction builds the immutable registry; [`Engine::explain`] is
/// reentrant and safe to call concurrently as long as each call owns its
/// snapshot.
pub struct Engine {
    registry: Registry,
    options: EngineOptions,
}

impl Engine {
    /// Builds an engine over the built-in rule corpus with default options.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::RuleMalformed`] when the corpus fails
    /// validation.
    pub fn new() -> Result<Self> {
        Ok(Self {
            registry: Registry::builtin()?,
            options: EngineOptions::default(),
        })
    }

    /// Builds an engine over the built-in corpus with the given options.
    pub fn with_options(options: EngineOptions) -> Result<Self> {
        Ok(Self {
            registry: Registry::builtin()?,
            options,
        })
    }

    /// Builds an engine over an explicit registry.
    #[must_use]
    pub fn from_registry(registry: Registry, options: EngineOptions) -> Self {
        Self { registry, options }
    }

    /// The rule registry backing this engine.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Explains a raw snapshot.
    ///
    /// Never fails: an invalid input yields an explanation with a null root
    /// cause, zero confidence, and `metadata.error` set.
    #[must_use]
    pub fn explain(&self, snapshot: &Snapshot) -> Explanation {
        match normalize(snapshot) {
            Ok((graph, timeline)) => self.explain_graph(&graph, &timeline),
            Err(error) => {
                warn!(%error, "input rejected");
                Explanation::empty(ExplanationMetadata {
                    inputs_hash: snapshot.inputs_hash(),
                    engine_version: self.options.engine_version.clone(),
                    error: Some(error.to_string()),
                    ..ExplanationMetadata::default()
                })
            }
        }
    }

    /// Explains an already-normalized graph and timeline.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn explain_graph(&self, graph: &ObjectGraph, timeline: &Timeline) -> Explanation {
        let mut rule_errors: Vec<RuleError> = Vec::new();
        let mut matches: Vec<EvaluatedMatch> = Vec::new();
        let mut evaluated_names: Vec<(String, bool)> = Vec::new();

        for rule in self.registry.rules() {
            let meta = rule.meta();
            if !self.options.category_allowed(meta.category) || !meta.applies_to(graph) {
                continue;
            }

            let matched = match catch_unwind(AssertUnwindSafe(|| rule.matches(graph, timeline))) {
                Ok(matched) => matched,
                Err(panic) => {
                    rule_errors.push(RuleError {
                        name: meta.name.clone(),
                        message: panic_message(&*panic),
                    });
                    evaluated_names.push((meta.name.clone(), false));
                    continue;
                }
            };
            evaluated_names.push((meta.name.clone(), matched));
            if !matched {
                continue;
            }

            let explained = catch_unwind(AssertUnwindSafe(|| {
                let mut chain = rule.explain(graph, timeline);
                chain.order_evidence();
                (chain, rule.confidence(graph, timeline))
            }));
            match explained {
                Ok((chain, rule_confidence)) => {
                    debug!(rule = %meta.name, "rule matched");
                    matches.push(EvaluatedMatch {
                        rule_match: RuleMatch {
                            rule_name: meta.name.clone(),
                            priority: meta.priority,
                            category: meta.category,
                            chain,
                            rule_confidence,
                            blocks: meta.blocks.clone(),
                        },
                        completeness: completeness(meta.optional.iter().map(|k| graph.has(*k))),
                        expected_evidence: meta.expected_evidence,
                    });
                }
                Err(panic) => {
                    // matched but failed to explain: treat as not matching
                    rule_errors.push(RuleError {
                        name: meta.name.clone(),
                        message: panic_message(&*panic),
                    });
                    if let Some(entry) = evaluated_names.last_mut() {
                        entry.1 = false;
                    }
                }
            }
        }

        let rules_evaluated = evaluated_names.len();
        let rules_matched = matches.len();
        let suppression = resolve_suppression(&matches);
        let composed = compose_confidences(&matches, &suppression);

        let metadata_base = ExplanationMetadata {
            inputs_hash: graph.inputs_hash.clone(),
            engine_version: self.options.engine_version.clone(),
            rules_evaluated,
            rules_matched,
            rule_errors,
            ..ExplanationMetadata::default()
        };

        let Some(winner_index) = select_winner(&matches, &suppression, &composed) else {
            // NoMatch: not an error, a default advisory
            let mut explanation = Explanation::empty(metadata_base);
            explanation.suggested_next_checks =
                suggested_checks("InsufficientSignal", &graph.pod.name);
            if self.options.verbose {
                explanation.metadata.rule_trace =
                    Some(build_trace(&evaluated_names, &matches, &suppression, &composed));
            }
            return explanation;
        };

        let winner = &matches[winner_index];
        let mut chain = winner.rule_match.chain.clone();

        // fold other unsuppressed matches into contributing causes
        for (index, candidate) in matches.iter().enumerate() {
            if index == winner_index || suppression.contains_key(candidate.name()) {
                continue;
            }
            for cause in &candidate.rule_match.chain.causes {
                add_contributing(&mut chain, cause.clone());
            }
        }

        let mut confidence = composed[winner_index];
        if graph.pod.phase == "Pending" && timeline.is_empty() {
            confidence *= PENDING_NO_EVENTS_DAMPING;
        }
        let confidence = round_confidence(confidence);

        let root_cause = chain
            .causes
            .first()
            .cloned()
            .map(|mut cause| {
                cause.confidence = confidence;
                cause
            });

        let suppressed_rules: Vec<SuppressedRule> = matches
            .iter()
            .filter_map(|m| {
                suppression.get(m.name()).map(|reason| SuppressedRule {
                    name: m.name().to_string(),
                    reason: reason.clone(),
                })
            })
            .collect();

        let evidence = dedup_evidence(&chain);
        let suggested_next_checks = collect_checks(&chain);

        let mut metadata = metadata_base;
        if self.options.verbose {
            metadata.rule_trace =
                Some(build_trace(&evaluated_names, &matches, &suppression, &composed));
        }

        Explanation {
            root_cause,
            confidence,
            causal_chain: chain,
            suppressed_rules,
            evidence,
            suggested_next_checks,
            metadata,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "rule panicked".to_string())
}

fn completeness(present: impl Iterator<Item = bool>) -> f64 {
    let (mut total, mut found) = (0u32, 0u32);
    for is_present in present {
        total += 1;
        if is_present {
            found += 1;
        }
    }
    if total == 0 {
        return 1.0;
    }
    (f64::from(found) / f64::from(total)).max(COMPLETENESS_FLOOR)
}

/// Builds the suppression map by additive fixed-point iteration.
///
/// Matches are visited in registry order (priority descending); a match
/// that is itself suppressed at visit time cannot suppress others, and
/// suppression is never retracted.
fn resolve_suppression(matches: &[EvaluatedMatch]) -> BTreeMap<String, String> {
    let matched_names: Vec<&str> = matches.iter().map(EvaluatedMatch::name).collect();
    let mut suppressed: BTreeMap<String, String> = BTreeMap::new();
    loop {
        let mut changed = false;
        for candidate in matches {
            if suppressed.contains_key(candidate.name()) {
                continue;
            }
            for blocked in &candidate.rule_match.blocks {
                if matched_names.contains(&blocked.as_str())
                    && !suppressed.contains_key(blocked)
                {
                    suppressed.insert(
                        blocked.clone(),
                        format!("suppressed by {}", candidate.name()),
                    );
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    suppressed
}

fn compose_confidences(
    matches: &[EvaluatedMatch],
    suppression: &BTreeMap<String, String>,
) -> Vec<f64> {
    matches
        .iter()
        .map(|m| {
            let evidence: Vec<&Evidence> = m.rule_match.chain.all_evidence();
            let max_weight = if evidence.is_empty() {
                BARE_INFERENCE_WEIGHT
            } else {
                evidence
                    .iter()
                    .map(|e| e.source.weight())
                    .fold(0.0, f64::max)
            };
            let missing = u32::from(m.expected_evidence)
                .saturating_sub(u32::try_from(evidence.len()).unwrap_or(u32::MAX))
                .min(3);
            let quality = max_weight * f64::from(missing).mul_add(-CORROBORATION_STEP, 1.0);

            let rivals = matches
                .iter()
                .filter(|other| {
                    other.name() != m.name()
                        && other.rule_match.category == m.rule_match.category
                        && !suppression.contains_key(other.name())
                })
                .count();
            #[allow(clippy::cast_precision_loss)]
            let conflict = (rivals as f64)
                .mul_add(-CONFLICT_STEP, 1.0)
                .max(CONFLICT_FLOOR);

            round_confidence(m.rule_match.rule_confidence * quality * m.completeness * conflict)
        })
        .collect()
}

fn select_winner(
    matches: &[EvaluatedMatch],
    suppression: &BTreeMap<String, String>,
    composed: &[f64],
) -> Option<usize> {
    let mut winner: Option<usize> = None;
    for (index, m) in matches.iter().enumerate() {
        if suppression.contains_key(m.name()) {
            continue;
        }
        // registry order already ranks priority, so first-seen wins ties
        let better = match winner {
            None => true,
            Some(best) => composed[index] > composed[best],
        };
        if better {
            winner = Some(index);
        }
    }
    winner
}

fn add_contributing(chain: &mut CausalChain, cause: Cause) {
    let identity = (cause.kind.clone(), cause.involved_object.clone());
    let subsumed = chain
        .causes
        .iter()
        .chain(chain.symptoms.iter())
        .any(|c| c.identity() == (identity.0.as_str(), identity.1.as_str()));
    if subsumed {
        return;
    }
    if let Some(existing) = chain
        .contributing
        .iter_mut()
        .find(|c| c.identity() == (identity.0.as_str(), identity.1.as_str()))
    {
        if cause.evidence_quality() > existing.evidence_quality() {
            *existing = cause;
        }
        return;
    }
    chain.contributing.push(cause);
}

fn dedup_evidence(chain: &CausalChain) -> Vec<Evidence> {
    let mut seen: Vec<(crate::types::EvidenceSource, String)> = Vec::new();
    let mut out = Vec::new();
    for evidence in chain.all_evidence() {
        let key = (evidence.source, evidence.locator.clone());
        if !seen.contains(&key) {
            seen.push(key);
            out.push(evidence.clone());
        }
    }
    out
}

fn collect_checks(chain: &CausalChain) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cause in chain.causes.iter().chain(chain.contributing.iter()) {
        for check in suggested_checks(&cause.kind, &cause.involved_object) {
            if !out.contains(&check) {
                out.push(check);
            }
        }
    }
    out
}

fn build_trace(
    evaluated: &[(String, bool)],
    matches: &[EvaluatedMatch],
    suppression: &BTreeMap<String, String>,
    composed: &[f64],
) -> Vec<RuleEvaluation> {
    evaluated
        .iter()
        .map(|(name, matched)| {
            let index = matches.iter().position(|m| m.name() == name);
            RuleEvaluation {
                name: name.clone(),
                matched: *matched,
                suppressed: suppression.contains_key(name),
                composed_confidence: index.map_or(0.0, |i| composed[i]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, RuleMeta};
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new().expect("builtin corpus is valid")
    }

    fn explain(snapshot: &Snapshot) -> Explanation {
        engine().explain(snapshot)
    }

    mod input_invalid_tests {
        use super::*;

        #[test]
        fn malformed_pod_short_circuits() {
            let snapshot = Snapshot::new(json!(42), json!([]));
            let explanation = explain(&snapshot);
            assert!(explanation.root_cause.is_none());
            assert!(explanation.confidence.abs() < f64::EPSILON);
            assert!(explanation
                .metadata
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("InputInvalid")));
        }
    }

    mod no_match_tests {
        use super::*;

        #[test]
        fn healthy_pod_yields_advisory() {
            let snapshot = Snapshot::new(
                json!({
                    "metadata": {"name": "healthy-0"},
                    "status": {
                        "phase": "Running",
                        "conditions": [{"type": "Ready", "status": "True"}]
                    }
                }),
                json!([]),
            );
            let explanation = explain(&snapshot);
            assert!(explanation.is_inconclusive());
            assert!(explanation.causal_chain.is_empty());
            assert!(explanation
                .suggested_next_checks
                .iter()
                .any(|c| c.contains("kubectl describe pod healthy-0")));
        }
    }

    mod composition_tests {
        use super::*;

        #[test]
        fn completeness_floors_at_half() {
            assert!((completeness([false, false].into_iter()) - 0.5).abs() < f64::EPSILON);
            assert!((completeness([true, false].into_iter()) - 0.5).abs() < f64::EPSILON);
            assert!((completeness([true, true, false].into_iter()) - (2.0 / 3.0)).abs() < 1e-9);
            assert!((completeness(std::iter::empty()) - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn confidence_is_always_bounded() {
            let snapshot = Snapshot::new(
                json!({
                    "metadata": {"name": "p"},
                    "status": {"phase": "Pending"}
                }),
                json!([{
                    "reason": "FailedScheduling",
                    "message": "1 node(s) had untolerated taint {node-role:NoSchedule}"
                }]),
            );
            let explanation = explain(&snapshot);
            assert!((0.0..=1.0).contains(&explanation.confidence));
        }

        #[test]
        fn pending_pod_with_no_events_is_damped() {
            // PVCNotBound matches on object state alone
            let pod = json!({
                "metadata": {"name": "db-0"},
                "status": {"phase": "Pending"},
                "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data"}}]}
            });
            let with_events = Snapshot::new(pod.clone(), json!([{"reason": "Scheduled"}]))
                .with_pvc(json!({"metadata": {"name": "data"}, "status": {"phase": "Pending"}}));
            let without_events = Snapshot::new(pod, json!([]))
                .with_pvc(json!({"metadata": {"name": "data"}, "status": {"phase": "Pending"}}));

            let damped = explain(&without_events);
            let undamped = explain(&with_events);
            assert_eq!(
                damped.root_cause.as_ref().map(|c| c.kind.clone()),
                Some("PVCNotBound".to_string())
            );
            assert!(damped.confidence < undamped.confidence);
        }
    }

    mod suppression_tests {
        use super::*;

        struct FixedRule {
            meta: RuleMeta,
        }

        impl FixedRule {
            fn new(name: &str, priority: i32, blocks: &[&str]) -> Self {
                Self {
                    meta: RuleMeta::new(name, RuleCategory::Lifecycle)
                        .priority(priority)
                        .confidence(0.8)
                        .blocks(blocks),
                }
            }
        }

        impl Rule for FixedRule {
            fn meta(&self) -> &RuleMeta {
                &self.meta
            }

            fn matches(&self, _graph: &ObjectGraph, _timeline: &Timeline) -> bool {
                true
            }

            fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
                CausalChain::new().with_cause(
                    Cause::new(self.meta.name.clone(), &graph.pod.name, "test cause")
                        .with_evidence(Evidence::object_state("status.phase", "x")),
                )
            }
        }

        fn run(rules: Vec<Box<dyn Rule>>) -> Explanation {
            let registry = Registry::from_rules(rules).expect("valid rules");
            let engine = Engine::from_registry(registry, EngineOptions::default());
            let snapshot = Snapshot::new(
                json!({"metadata": {"name": "p"}, "status": {"phase": "Running"}}),
                json!([]),
            );
            engine.explain(&snapshot)
        }

        #[test]
        fn blocked_rule_is_suppressed_with_reason() {
            let explanation = run(vec![
                Box::new(FixedRule::new("compound", 90, &["atomic"])),
                Box::new(FixedRule::new("atomic", 50, &[])),
            ]);
            assert_eq!(
                explanation.root_cause.as_ref().map(|c| c.kind.as_str()),
                Some("compound")
            );
            assert_eq!(
                explanation.suppressed_rules,
                vec![SuppressedRule {
                    name: "atomic".to_string(),
                    reason: "suppressed by compound".to_string(),
                }]
            );
        }

        #[test]
        fn suppressed_suppressor_cannot_block() {
            // top blocks mid, mid blocks low; low must survive because its
            // suppressor is itself suppressed by the time it is visited
            let explanation = run(vec![
                Box::new(FixedRule::new("top", 90, &["mid"])),
                Box::new(FixedRule::new("mid", 70, &["low"])),
                Box::new(FixedRule::new("low", 50, &[])),
            ]);
            let suppressed: Vec<&str> = explanation
                .suppressed_rules
                .iter()
                .map(|s| s.name.as_str())
                .collect();
            assert_eq!(suppressed, vec!["mid"]);
            // low survives and contributes
            assert!(explanation
                .causal_chain
                .contributing
                .iter()
                .any(|c| c.kind == "low"));
        }

        #[test]
        fn suppressed_rules_never_contribute_causes() {
            let explanation = run(vec![
                Box::new(FixedRule::new("compound", 90, &["atomic"])),
                Box::new(FixedRule::new("atomic", 50, &[])),
            ]);
            assert!(!explanation
                .causal_chain
                .causes
                .iter()
                .chain(explanation.causal_chain.contributing.iter())
                .any(|c| c.kind == "atomic"));
        }
    }

    mod rule_internal_tests {
        use super::*;

        struct PanickingRule {
            meta: RuleMeta,
        }

        impl Rule for PanickingRule {
            fn meta(&self) -> &RuleMeta {
                &self.meta
            }

            fn matches(&self, _graph: &ObjectGraph, _timeline: &Timeline) -> bool {
                panic!("rule exploded");
            }

            fn explain(&self, _graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
                CausalChain::new()
            }
        }

        #[test]
        fn panicking_rule_is_recorded_and_skipped() {
            let registry = Registry::from_rules(vec![Box::new(PanickingRule {
                meta: RuleMeta::new("boom", RuleCategory::Lifecycle),
            })])
            .expect("valid rules");
            let engine = Engine::from_registry(registry, EngineOptions::default());
            let snapshot = Snapshot::new(
                json!({"metadata": {"name": "p"}, "status": {"phase": "Running"}}),
                json!([]),
            );
            let explanation = engine.explain(&snapshot);
            assert!(explanation.is_inconclusive());
            assert_eq!(explanation.metadata.rule_errors.len(), 1);
            assert_eq!(explanation.metadata.rule_errors[0].name, "boom");
            assert!(explanation.metadata.rule_errors[0].message.contains("exploded"));
        }
    }

    mod option_tests {
        use super::*;

        #[test]
        fn category_filters_restrict_evaluation() {
            let snapshot = Snapshot::new(
                json!({"metadata": {"name": "p"}, "status": {"phase": "Pending"}}),
                json!([{
                    "reason": "FailedScheduling",
                    "message": "1 node(s) had untolerated taint"
                }]),
            );
            let options = EngineOptions::default()
                .with_disabled(vec![RuleCategory::Scheduling]);
            let engine = Engine::with_options(options).expect("valid corpus");
            let explanation = engine.explain(&snapshot);
            assert!(explanation.is_inconclusive());

            let options = EngineOptions::default()
                .with_enabled(vec![RuleCategory::Scheduling]);
            let engine = Engine::with_options(options).expect("valid corpus");
            let explanation = engine.explain(&snapshot);
            assert_eq!(
                explanation.root_cause.as_ref().map(|c| c.kind.as_str()),
                Some("UnschedulableTaint")
            );
        }

        #[test]
        fn verbose_emits_rule_trace() {
            let snapshot = Snapshot::new(
                json!({"metadata": {"name": "p"}, "status": {"phase": "Pending"}}),
                json!([{
                    "reason": "FailedScheduling",
                    "message": "1 node(s) had untolerated taint"
                }]),
            );
            let engine = Engine::with_options(EngineOptions::default().with_verbose(true))
                .expect("valid corpus");
            let explanation = engine.explain(&snapshot);
            let trace = explanation.metadata.rule_trace.expect("trace present");
            let taint = trace
                .iter()
                .find(|t| t.name == "UnschedulableTaint")
                .expect("taint rule evaluated");
            assert!(taint.matched);
            assert!(!taint.suppressed);
            assert!(taint.composed_confidence > 0.0);
        }

        #[test]
        fn non_verbose_omits_rule_trace() {
            let snapshot = Snapshot::new(
                json!({"metadata": {"name": "p"}, "status": {"phase": "Running"}}),
                json!([]),
            );
            assert!(explain(&snapshot).metadata.rule_trace.is_none());
        }
    }

    mod determinism_tests {
        use super::*;

        #[test]
        fn identical_inputs_yield_identical_serialized_output() {
            let snapshot = Snapshot::new(
                json!({
                    "metadata": {"name": "db-0"},
                    "status": {"phase": "Running", "containerStatuses": [{
                        "name": "main",
                        "restartCount": 6,
                        "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                    }]},
                    "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data"}}]}
                }),
                json!([
                    {"reason": "ProvisioningFailed", "firstTimestamp": "2024-05-01T10:00:00Z",
                     "lastTimestamp": "2024-05-01T10:02:00Z"},
                    {"reason": "BackOff", "lastTimestamp": "2024-05-01T10:05:00Z"}
                ]),
            )
            .with_pvc(json!({"metadata": {"name": "data"}, "status": {"phase": "Pending"}}));

            let a = serde_json::to_string(&explain(&snapshot)).expect("serializes");
            let b = serde_json::to_string(&explain(&snapshot)).expect("serializes");
            assert_eq!(a, b);
        }
    }
}
