//! Node readiness and resource-pressure rules.

use super::{Rule, RuleMeta};
use crate::graph::{ObjectGraph, ObjectKind};
use crate::timeline::{EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn pressure_meta(name: &str, priority: i32) -> RuleMeta {
    RuleMeta::new(name, RuleCategory::NodePressure)
        .priority(priority)
        .confidence(0.93)
        .requires(&[ObjectKind::Node])
        .expected_evidence(1)
}

fn pressure_cause(kind: &str, condition_type: &str, graph: &ObjectGraph) -> CausalChain {
    let node_name = graph
        .node
        .as_ref()
        .map_or_else(String::new, |n| n.name.clone());
    let mut cause = Cause::new(
        kind,
        &node_name,
        format!("Node {node_name} is under {condition_type}"),
    );
    if let Some(condition) = graph
        .node
        .as_ref()
        .and_then(|n| n.condition(condition_type))
    {
        let detail = condition
            .reason
            .clone()
            .map_or_else(|| condition.status.clone(), |r| format!("{}: {r}", condition.status));
        cause = cause.with_evidence(Evidence::condition(
            format!("node.status.conditions[{condition_type}]"),
            detail,
        ));
    }
    CausalChain::new().with_cause(cause).with_symptom(
        Cause::new(
            "PodOnPressuredNode",
            &graph.pod.name,
            "The pod runs on a node under resource pressure",
        )
        .with_evidence(Evidence::object_state(
            "spec.nodeName",
            graph.pod.node_name.clone().unwrap_or_default(),
        )),
    )
}

/// The node's disk is under pressure.
pub struct NodeDiskPressure {
    meta: RuleMeta,
}

impl NodeDiskPressure {
    pub(crate) fn new() -> Self {
        Self {
            meta: pressure_meta("NodeDiskPressure", 81),
        }
    }
}

impl Rule for NodeDiskPressure {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph
            .node
            .as_ref()
            .is_some_and(|n| n.has_condition("DiskPressure"))
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        pressure_cause("NodeDiskPressure", "DiskPressure", graph)
    }
}

/// The node's memory is under pressure.
pub struct NodeMemoryPressure {
    meta: RuleMeta,
}

impl NodeMemoryPressure {
    pub(crate) fn new() -> Self {
        Self {
            meta: pressure_meta("NodeMemoryPressure", 80),
        }
    }
}

impl Rule for NodeMemoryPressure {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph
            .node
            .as_ref()
            .is_some_and(|n| n.has_condition("MemoryPressure"))
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        pressure_cause("NodeMemoryPressure", "MemoryPressure", graph)
    }
}

/// The node is running out of process IDs.
pub struct NodePidPressure {
    meta: RuleMeta,
}

impl NodePidPressure {
    pub(crate) fn new() -> Self {
        Self {
            meta: pressure_meta("NodePidPressure", 79),
        }
    }
}

impl Rule for NodePidPressure {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph
            .node
            .as_ref()
            .is_some_and(|n| n.has_condition("PIDPressure"))
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        pressure_cause("NodePidPressure", "PIDPressure", graph)
    }
}

/// The node is not Ready.
pub struct NodeNotReady {
    meta: RuleMeta,
}

impl NodeNotReady {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("NodeNotReady", RuleCategory::NodePressure)
                .priority(72)
                .confidence(0.9)
                .optional(&[ObjectKind::Node])
                .expected_evidence(1),
        }
    }
}

impl Rule for NodeNotReady {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        graph.node.as_ref().is_some_and(crate::graph::Node::is_not_ready)
            || timeline.has_reason("NodeNotReady")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let node_name = graph
            .node
            .as_ref()
            .map(|n| n.name.clone())
            .or_else(|| graph.pod.node_name.clone())
            .unwrap_or_default();
        let mut cause = Cause::new(
            "NodeNotReady",
            &node_name,
            format!("Node {node_name} is not Ready"),
        );
        if let Some(condition) = graph.node.as_ref().and_then(|n| n.condition("Ready")) {
            cause = cause.with_evidence(Evidence::condition(
                "node.status.conditions[Ready]",
                condition
                    .reason
                    .clone()
                    .map_or_else(|| condition.status.clone(), |r| format!("{}: {r}", condition.status)),
            ));
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("NodeNotReady")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The pod was evicted.
pub struct PodEvicted {
    meta: RuleMeta,
}

impl PodEvicted {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PodEvicted", RuleCategory::NodePressure)
                .priority(70)
                .confidence(0.9)
                .optional(&[ObjectKind::Node])
                .expected_evidence(2),
        }
    }
}

impl Rule for PodEvicted {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        graph.pod.reason.as_deref() == Some("Evicted") || timeline.has_reason("Evicted")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new("PodEvicted", &graph.pod.name, "The pod was evicted");
        if graph.pod.reason.as_deref() == Some("Evicted") {
            cause = cause.with_evidence(Evidence::object_state(
                "status.reason",
                graph.pod.message.clone().unwrap_or_else(|| "Evicted".to_string()),
            ));
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("Evicted")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(NodeDiskPressure::new()),
        Box::new(NodeMemoryPressure::new()),
        Box::new(NodePidPressure::new()),
        Box::new(NodeNotReady::new()),
        Box::new(PodEvicted::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Snapshot;
    use crate::rules::testutil::{graph_from, graph_from_snapshot};
    use crate::types::EvidenceSource;
    use serde_json::json;

    fn pod_on_node() -> serde_json::Value {
        json!({
            "metadata": {"name": "app-0"},
            "spec": {"nodeName": "worker-1"},
            "status": {"phase": "Running"}
        })
    }

    fn node_with(condition: &str) -> serde_json::Value {
        json!({
            "metadata": {"name": "worker-1"},
            "status": {"conditions": [
                {"type": condition, "status": "True", "reason": "KubeletHasPressure"}
            ]}
        })
    }

    #[test]
    fn disk_pressure_requires_node_slot() {
        let (graph, _) = graph_from(pod_on_node(), json!([]));
        assert!(!NodeDiskPressure::new().meta().applies_to(&graph));
    }

    #[test]
    fn disk_pressure_reads_node_condition() {
        let snapshot =
            Snapshot::new(pod_on_node(), json!([])).with_node(node_with("DiskPressure"));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = NodeDiskPressure::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].involved_object, "worker-1");
        assert_eq!(chain.causes[0].evidence[0].source, EvidenceSource::Condition);
        assert_eq!(chain.symptoms[0].kind, "PodOnPressuredNode");
    }

    #[test]
    fn not_ready_matches_condition_or_event() {
        let snapshot = Snapshot::new(pod_on_node(), json!([])).with_node(json!({
            "metadata": {"name": "worker-1"},
            "status": {"conditions": [{"type": "Ready", "status": "False"}]}
        }));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        assert!(NodeNotReady::new().matches(&graph, &timeline));

        let (graph, timeline) = graph_from(
            pod_on_node(),
            json!([{"reason": "NodeNotReady", "message": "node is not ready"}]),
        );
        assert!(NodeNotReady::new().matches(&graph, &timeline));
    }

    #[test]
    fn evicted_prefers_status_reason_evidence() {
        let evicted = json!({
            "metadata": {"name": "app-0"},
            "status": {
                "phase": "Failed",
                "reason": "Evicted",
                "message": "The node had condition: [DiskPressure]"
            }
        });
        let (graph, timeline) = graph_from(evicted, json!([]));
        let rule = PodEvicted::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].evidence[0].source, EvidenceSource::ObjectState);
        assert!(chain.causes[0].evidence[0].snippet.contains("DiskPressure"));
    }
}
