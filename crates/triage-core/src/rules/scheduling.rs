//! Scheduling failure rules.
//!
//! All of these read the `FailedScheduling`/`Unschedulable` event family;
//! the specific rules key on the scheduler's message text and block the
//! generic fallback.

use super::{Rule, RuleMeta};
use crate::graph::ObjectGraph;
use crate::timeline::{scheduling_flapping, EventKind, EventPhase, EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn scheduling_failure(message: &str) -> EventPredicate {
    EventPredicate::kind(EventKind::Scheduling)
        .with_phase(EventPhase::Failure)
        .with_message(message)
}

/// Root cause for a scheduler message match: pod phase as object state,
/// the scheduler's own words as event evidence.
fn scheduler_cause(
    kind: &str,
    message: &str,
    graph: &ObjectGraph,
    timeline: &Timeline,
    needle: &str,
) -> Cause {
    let mut cause = Cause::new(kind, &graph.pod.name, message).with_evidence(
        Evidence::object_state("status.phase", format!("pod phase is {}", graph.pod.phase)),
    );
    if let Some(event) = timeline.first(&scheduling_failure(needle)) {
        cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
    }
    cause
}

/// The scheduler reported an untolerated taint.
pub struct UnschedulableTaint {
    meta: RuleMeta,
}

impl UnschedulableTaint {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("UnschedulableTaint", RuleCategory::Scheduling)
                .priority(78)
                .confidence(0.9)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for UnschedulableTaint {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("taint"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = scheduler_cause(
            "UnschedulableTaint",
            "No schedulable node tolerates the pod: a node taint is not tolerated",
            graph,
            timeline,
            "taint",
        );
        if let Some(node) = &graph.node {
            for taint in &node.taints {
                cause = cause.with_evidence(Evidence::object_state(
                    "node.spec.taints",
                    format!("{}:{}", taint.key, taint.effect),
                ));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The scheduler found no node with enough CPU.
pub struct InsufficientCpu {
    meta: RuleMeta,
}

impl InsufficientCpu {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("InsufficientCpu", RuleCategory::Scheduling)
                .priority(76)
                .confidence(0.88)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for InsufficientCpu {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("insufficient cpu"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(scheduler_cause(
            "InsufficientCpu",
            "No node has enough allocatable CPU for the pod's requests",
            graph,
            timeline,
            "insufficient cpu",
        ))
    }
}

/// The scheduler found no node with enough memory.
pub struct InsufficientMemory {
    meta: RuleMeta,
}

impl InsufficientMemory {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("InsufficientMemory", RuleCategory::Scheduling)
                .priority(76)
                .confidence(0.88)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for InsufficientMemory {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("insufficient memory"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(scheduler_cause(
            "InsufficientMemory",
            "No node has enough allocatable memory for the pod's requests",
            graph,
            timeline,
            "insufficient memory",
        ))
    }
}

/// Node selector or affinity terms match no node.
pub struct NodeAffinityMismatch {
    meta: RuleMeta,
}

impl NodeAffinityMismatch {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("NodeAffinityMismatch", RuleCategory::Scheduling)
                .priority(75)
                .confidence(0.87)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for NodeAffinityMismatch {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("node affinity"))
            || timeline.has(&scheduling_failure("node selector"))
            || timeline.has(&scheduling_failure("didn't match pod's node affinity/selector"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = scheduler_cause(
            "NodeAffinityMismatch",
            "The pod's node selector or affinity terms match no schedulable node",
            graph,
            timeline,
            "affinity",
        );
        if !graph.pod.node_selector.is_empty() {
            let selector = graph
                .pod
                .node_selector
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            cause = cause.with_evidence(Evidence::object_state("spec.nodeSelector", selector));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The cluster has no schedulable nodes at all.
pub struct NoNodesAvailable {
    meta: RuleMeta,
}

impl NoNodesAvailable {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("NoNodesAvailable", RuleCategory::Scheduling)
                .priority(72)
                .confidence(0.85)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for NoNodesAvailable {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("no nodes available"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(scheduler_cause(
            "NoNodesAvailable",
            "No nodes are available to schedule the pod",
            graph,
            timeline,
            "no nodes available",
        ))
    }
}

/// A persistent volume's node affinity conflicts with placement.
pub struct VolumeNodeAffinityConflict {
    meta: RuleMeta,
}

impl VolumeNodeAffinityConflict {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("VolumeNodeAffinityConflict", RuleCategory::Scheduling)
                .priority(74)
                .confidence(0.88)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for VolumeNodeAffinityConflict {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("volume node affinity conflict"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(scheduler_cause(
            "VolumeNodeAffinityConflict",
            "A bound volume's node affinity conflicts with schedulable nodes",
            graph,
            timeline,
            "volume node affinity conflict",
        ))
    }
}

/// Scheduling is blocked on unbound persistent volume claims.
pub struct PvcBlockingScheduling {
    meta: RuleMeta,
}

impl PvcBlockingScheduling {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PvcBlockingScheduling", RuleCategory::Scheduling)
                .priority(73)
                .confidence(0.86)
                .phases(&["Pending"])
                .optional(&[crate::graph::ObjectKind::Pvc])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for PvcBlockingScheduling {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&scheduling_failure("persistentvolumeclaim"))
            || timeline.has(&scheduling_failure("unbound immediate persistentvolumeclaims"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new().with_cause(scheduler_cause(
            "PvcBlockingScheduling",
            "Scheduling is blocked on unbound PersistentVolumeClaims",
            graph,
            timeline,
            "persistentvolumeclaim",
        ));
        for pvc in graph.claimed_pvcs() {
            if pvc.phase != "Bound" {
                chain = chain.with_contributing(
                    Cause::new(
                        "PVCNotBound",
                        &pvc.name,
                        format!("claim {} is {}", pvc.name, pvc.phase),
                    )
                    .with_evidence(Evidence::object_state(
                        "pvc.status.phase",
                        pvc.phase.clone(),
                    )),
                );
            }
        }
        chain
    }
}

/// The scheduler keeps retrying and failing.
pub struct SchedulingFlapping {
    meta: RuleMeta,
}

impl SchedulingFlapping {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("SchedulingFlapping", RuleCategory::Scheduling)
                .priority(87)
                .confidence(0.8)
                .phases(&["Pending"])
                .blocks(&["SchedulingFailed"])
                .expected_evidence(1),
        }
    }
}

impl Rule for SchedulingFlapping {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        scheduling_flapping(timeline)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let occurrences = timeline.occurrences(&EventPredicate::reason("FailedScheduling"));
        CausalChain::new().with_cause(
            Cause::new(
                "SchedulingFlapping",
                &graph.pod.name,
                "The scheduler is repeatedly failing to place the pod",
            )
            .with_evidence(Evidence::timeline(
                "FailedScheduling",
                format!("{occurrences} scheduling failures in a 15 minute window"),
            )),
        )
    }
}

/// Fallback for scheduling failures no specific rule recognizes.
pub struct SchedulingFailed {
    meta: RuleMeta,
}

impl SchedulingFailed {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("SchedulingFailed", RuleCategory::Scheduling)
                .priority(30)
                .confidence(0.6)
                .phases(&["Pending"])
                .expected_evidence(1),
        }
    }
}

impl Rule for SchedulingFailed {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&EventPredicate::kind(EventKind::Scheduling).with_phase(EventPhase::Failure))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "SchedulingFailed",
            &graph.pod.name,
            "The scheduler could not place the pod",
        );
        if let Some(event) = timeline
            .first(&EventPredicate::kind(EventKind::Scheduling).with_phase(EventPhase::Failure))
        {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(UnschedulableTaint::new()),
        Box::new(InsufficientCpu::new()),
        Box::new(InsufficientMemory::new()),
        Box::new(NodeAffinityMismatch::new()),
        Box::new(NoNodesAvailable::new()),
        Box::new(VolumeNodeAffinityConflict::new()),
        Box::new(PvcBlockingScheduling::new()),
        Box::new(SchedulingFlapping::new()),
        Box::new(SchedulingFailed::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testutil::graph_from;
    use crate::types::EvidenceSource;
    use serde_json::json;

    fn pending_pod() -> serde_json::Value {
        json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}})
    }

    #[test]
    fn taint_rule_matches_scheduler_taint_message() {
        let (graph, timeline) = graph_from(
            pending_pod(),
            json!([{
                "reason": "FailedScheduling",
                "message": "0/3 nodes are available: 1 node(s) had untolerated taint"
            }]),
        );
        let rule = UnschedulableTaint::new();
        assert!(rule.matches(&graph, &timeline));

        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].kind, "UnschedulableTaint");
        assert_eq!(chain.causes[0].evidence[0].source, EvidenceSource::ObjectState);
        assert!(chain.causes[0].evidence[1].snippet.contains("untolerated taint"));
    }

    #[test]
    fn taint_rule_ignores_other_scheduling_messages() {
        let (graph, timeline) = graph_from(
            pending_pod(),
            json!([{"reason": "FailedScheduling", "message": "Insufficient cpu"}]),
        );
        assert!(!UnschedulableTaint::new().matches(&graph, &timeline));
        assert!(InsufficientCpu::new().matches(&graph, &timeline));
    }

    #[test]
    fn affinity_rule_includes_node_selector_evidence() {
        let pod = json!({
            "metadata": {"name": "web-0"},
            "status": {"phase": "Pending"},
            "spec": {"nodeSelector": {"disk": "ssd"}}
        });
        let (graph, timeline) = graph_from(
            pod,
            json!([{
                "reason": "FailedScheduling",
                "message": "0/3 nodes are available: 3 node(s) didn't match Pod's node affinity/selector"
            }]),
        );
        let rule = NodeAffinityMismatch::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert!(chain.causes[0]
            .evidence
            .iter()
            .any(|e| e.locator == "spec.nodeSelector" && e.snippet == "disk=ssd"));
    }

    #[test]
    fn flapping_needs_three_failures() {
        let (graph, timeline) = graph_from(
            pending_pod(),
            json!([
                {"reason": "FailedScheduling", "lastTimestamp": "2024-05-01T10:00:00Z"},
                {"reason": "FailedScheduling", "lastTimestamp": "2024-05-01T10:03:00Z"},
            ]),
        );
        assert!(!SchedulingFlapping::new().matches(&graph, &timeline));

        let (graph, timeline) = graph_from(
            pending_pod(),
            json!([
                {"reason": "FailedScheduling", "lastTimestamp": "2024-05-01T10:00:00Z"},
                {"reason": "FailedScheduling", "lastTimestamp": "2024-05-01T10:03:00Z"},
                {"reason": "FailedScheduling", "lastTimestamp": "2024-05-01T10:06:00Z"},
            ]),
        );
        assert!(SchedulingFlapping::new().matches(&graph, &timeline));
    }

    #[test]
    fn fallback_matches_any_scheduling_failure() {
        let (graph, timeline) = graph_from(
            pending_pod(),
            json!([{"reason": "FailedScheduling", "message": "something unusual"}]),
        );
        assert!(SchedulingFailed::new().matches(&graph, &timeline));
        assert!(!UnschedulableTaint::new().matches(&graph, &timeline));
    }

    #[test]
    fn phase_gate_excludes_running_pods() {
        let running = json!({"metadata": {"name": "web-0"}, "status": {"phase": "Running"}});
        let (graph, _) = graph_from(running, json!([]));
        assert!(!UnschedulableTaint::new().meta().applies_to(&graph));
    }
}
