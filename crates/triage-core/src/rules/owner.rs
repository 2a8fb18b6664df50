//! Rules over the owning controller.

use super::{Rule, RuleMeta};
use crate::graph::{ObjectGraph, ObjectKind};
use crate::timeline::{EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn owner_meta(name: &str, priority: i32, confidence: f64) -> RuleMeta {
    RuleMeta::new(name, RuleCategory::Owner)
        .priority(priority)
        .confidence(confidence)
        .requires(&[ObjectKind::Owner])
        .expected_evidence(1)
}

/// The controller cannot create replacement pods.
pub struct OwnerFailedCreate {
    meta: RuleMeta,
}

impl OwnerFailedCreate {
    pub(crate) fn new() -> Self {
        Self {
            meta: owner_meta("OwnerFailedCreate", 60, 0.85),
        }
    }
}

impl Rule for OwnerFailedCreate {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("FailedCreate")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let owner = graph.owner.as_ref();
        let owner_name = owner.map_or_else(String::new, |o| o.name.clone());
        let mut cause = Cause::new(
            "OwnerFailedCreate",
            &owner_name,
            format!(
                "{} {owner_name} is failing to create pods",
                owner.map_or("Controller", |o| o.kind.as_str())
            ),
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("FailedCreate")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        if let Some(o) = owner {
            if let (Some(replicas), Some(ready)) = (o.replicas, o.ready_replicas) {
                if ready < replicas {
                    cause = cause.with_evidence(Evidence::object_state(
                        "owner.status.readyReplicas",
                        format!("{ready}/{replicas} replicas ready"),
                    ));
                }
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The controller is quota-blocked.
pub struct OwnerQuotaExceeded {
    meta: RuleMeta,
}

impl OwnerQuotaExceeded {
    pub(crate) fn new() -> Self {
        Self {
            meta: owner_meta("OwnerQuotaExceeded", 61, 0.9)
                .blocks(&["OwnerFailedCreate"]),
        }
    }
}

impl Rule for OwnerQuotaExceeded {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&EventPredicate::reason("FailedCreate").with_message("exceeded quota"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let owner_name = graph
            .owner
            .as_ref()
            .map_or_else(String::new, |o| o.name.clone());
        let mut cause = Cause::new(
            "OwnerQuotaExceeded",
            &owner_name,
            "The controller cannot create pods because the namespace quota is exhausted",
        );
        if let Some(event) =
            timeline.first(&EventPredicate::reason("FailedCreate").with_message("exceeded quota"))
        {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The Deployment gave up progressing.
pub struct DeploymentProgressDeadline {
    meta: RuleMeta,
}

impl DeploymentProgressDeadline {
    pub(crate) fn new() -> Self {
        Self {
            meta: owner_meta("DeploymentProgressDeadline", 62, 0.88).expected_evidence(1),
        }
    }
}

impl Rule for DeploymentProgressDeadline {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph.owner.as_ref().is_some_and(|o| {
            o.condition("Progressing").is_some_and(|c| {
                c.status == "False" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
            })
        })
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let owner = graph.owner.as_ref();
        let owner_name = owner.map_or_else(String::new, |o| o.name.clone());
        let mut cause = Cause::new(
            "DeploymentProgressDeadline",
            &owner_name,
            format!("Deployment {owner_name} exceeded its progress deadline"),
        );
        if let Some(condition) = owner.and_then(|o| o.condition("Progressing")) {
            cause = cause.with_evidence(Evidence::condition(
                "owner.status.conditions[Progressing]",
                condition
                    .message
                    .clone()
                    .unwrap_or_else(|| "ProgressDeadlineExceeded".to_string()),
            ));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// A StatefulSet pod is fighting over volume claims.
pub struct StatefulSetVolumeConflict {
    meta: RuleMeta,
}

impl StatefulSetVolumeConflict {
    pub(crate) fn new() -> Self {
        Self {
            meta: owner_meta("StatefulSetVolumeConflict", 63, 0.87)
                .optional(&[ObjectKind::Pvc])
                .expected_evidence(1),
        }
    }
}

impl Rule for StatefulSetVolumeConflict {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        graph
            .owner
            .as_ref()
            .is_some_and(|o| o.kind == "StatefulSet")
            && (timeline.has(&EventPredicate::reason("FailedCreate").with_message("pvc"))
                || timeline
                    .has(&EventPredicate::reason("FailedCreate").with_message("persistentvolumeclaim")))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let owner_name = graph
            .owner
            .as_ref()
            .map_or_else(String::new, |o| o.name.clone());
        let mut cause = Cause::new(
            "StatefulSetVolumeConflict",
            &owner_name,
            format!("StatefulSet {owner_name} cannot reconcile its volume claims"),
        );
        for needle in ["pvc", "persistentvolumeclaim"] {
            if let Some(event) =
                timeline.first(&EventPredicate::reason("FailedCreate").with_message(needle))
            {
                cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(OwnerFailedCreate::new()),
        Box::new(OwnerQuotaExceeded::new()),
        Box::new(DeploymentProgressDeadline::new()),
        Box::new(StatefulSetVolumeConflict::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Snapshot;
    use crate::rules::testutil::graph_from_snapshot;
    use serde_json::json;

    fn pod() -> serde_json::Value {
        json!({
            "metadata": {
                "name": "web-abc12",
                "ownerReferences": [{"kind": "ReplicaSet", "name": "web-abc"}]
            },
            "status": {"phase": "Pending"}
        })
    }

    #[test]
    fn owner_rules_skipped_without_owner_slot() {
        let snapshot = Snapshot::new(pod(), json!([]));
        let (graph, _) = graph_from_snapshot(&snapshot);
        assert!(!OwnerFailedCreate::new().meta().applies_to(&graph));
    }

    #[test]
    fn failed_create_reports_replica_shortfall() {
        let snapshot = Snapshot::new(
            pod(),
            json!([{"reason": "FailedCreate", "message": "pods is forbidden"}]),
        )
        .with_owner(json!({
            "kind": "ReplicaSet",
            "metadata": {"name": "web-abc"},
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 1}
        }));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = OwnerFailedCreate::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].involved_object, "web-abc");
        assert!(chain.causes[0]
            .evidence
            .iter()
            .any(|e| e.snippet == "1/3 replicas ready"));
    }

    #[test]
    fn progress_deadline_reads_owner_condition() {
        let snapshot = Snapshot::new(pod(), json!([])).with_owner(json!({
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "status": {"conditions": [{
                "type": "Progressing",
                "status": "False",
                "reason": "ProgressDeadlineExceeded",
                "message": "ReplicaSet \"web-abc\" has timed out progressing."
            }]}
        }));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = DeploymentProgressDeadline::new();
        assert!(rule.matches(&graph, &timeline));
        assert!(rule.explain(&graph, &timeline).causes[0]
            .evidence[0]
            .snippet
            .contains("timed out progressing"));
    }

    #[test]
    fn statefulset_conflict_requires_statefulset_kind() {
        let events = json!([{
            "reason": "FailedCreate",
            "message": "create Claim data-db-0 ... pvc already exists"
        }]);
        let as_deployment = Snapshot::new(pod(), events.clone()).with_owner(json!({
            "kind": "Deployment", "metadata": {"name": "db"}
        }));
        let (graph, timeline) = graph_from_snapshot(&as_deployment);
        assert!(!StatefulSetVolumeConflict::new().matches(&graph, &timeline));

        let as_sts = Snapshot::new(pod(), events).with_owner(json!({
            "kind": "StatefulSet", "metadata": {"name": "db"}
        }));
        let (graph, timeline) = graph_from_snapshot(&as_sts);
        assert!(StatefulSetVolumeConflict::new().matches(&graph, &timeline));
    }
}
