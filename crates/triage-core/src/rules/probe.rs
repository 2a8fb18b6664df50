//! Probe failure rules.
//!
//! Kubelet reports every probe failure under the single `Unhealthy` reason;
//! the message text tells liveness, readiness, and startup apart.

use super::{Rule, RuleMeta};
use crate::graph::ObjectGraph;
use crate::timeline::{repeated_probe_failure, EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn unhealthy(needle: &str) -> EventPredicate {
    EventPredicate::reason("Unhealthy").with_message(needle)
}

fn probe_cause(
    kind: &str,
    probe: &str,
    message: &str,
    graph: &ObjectGraph,
    timeline: &Timeline,
) -> Cause {
    let mut cause = Cause::new(kind, &graph.pod.name, message);
    if let Some(event) = timeline.first(&unhealthy(probe)) {
        cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
    }
    if graph
        .pod
        .containers
        .iter()
        .any(|c| match probe {
            "Liveness" => c.has_liveness_probe,
            "Readiness" => c.has_readiness_probe,
            _ => c.has_startup_probe,
        })
    {
        cause = cause.with_evidence(Evidence::object_state(
            "spec.containers[].probes",
            format!("{} probe is configured", probe.to_ascii_lowercase()),
        ));
    }
    cause
}

/// The liveness probe keeps failing; the kubelet will restart the container.
pub struct LivenessProbeFailing {
    meta: RuleMeta,
}

impl LivenessProbeFailing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("LivenessProbeFailing", RuleCategory::Probe)
                .priority(62)
                .confidence(0.8)
                .expected_evidence(2),
        }
    }
}

impl Rule for LivenessProbeFailing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&unhealthy("Liveness"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(probe_cause(
            "LivenessProbeFailing",
            "Liveness",
            "The liveness probe is failing, forcing container restarts",
            graph,
            timeline,
        ))
    }
}

/// The readiness probe keeps failing; the pod is cut from service traffic.
pub struct ReadinessProbeFailing {
    meta: RuleMeta,
}

impl ReadinessProbeFailing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ReadinessProbeFailing", RuleCategory::Probe)
                .priority(61)
                .confidence(0.75)
                .expected_evidence(2),
        }
    }
}

impl Rule for ReadinessProbeFailing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&unhealthy("Readiness"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new().with_cause(probe_cause(
            "ReadinessProbeFailing",
            "Readiness",
            "The readiness probe is failing; the pod receives no service traffic",
            graph,
            timeline,
        ));
        if let Some(ready) = graph.pod.condition("Ready") {
            if ready.status != "True" {
                chain = chain.with_symptom(
                    Cause::new("PodNotReady", &graph.pod.name, "The pod is not Ready")
                        .with_evidence(Evidence::condition(
                            "status.conditions[Ready]",
                            ready.status.clone(),
                        )),
                );
            }
        }
        chain
    }
}

/// The startup probe never succeeded.
pub struct StartupProbeFailing {
    meta: RuleMeta,
}

impl StartupProbeFailing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("StartupProbeFailing", RuleCategory::Probe)
                .priority(63)
                .confidence(0.8)
                .expected_evidence(2),
        }
    }
}

impl Rule for StartupProbeFailing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&unhealthy("Startup"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(probe_cause(
            "StartupProbeFailing",
            "Startup",
            "The startup probe never succeeded; the container cannot finish starting",
            graph,
            timeline,
        ))
    }
}

/// Probe failures repeating fast enough to matter on their own.
pub struct RepeatedProbeFailure {
    meta: RuleMeta,
}

impl RepeatedProbeFailure {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("RepeatedProbeFailure", RuleCategory::Probe)
                .priority(85)
                .confidence(0.85)
                .blocks(&["LivenessProbeFailing", "ReadinessProbeFailing"])
                .expected_evidence(1),
        }
    }
}

impl Rule for RepeatedProbeFailure {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        repeated_probe_failure(timeline)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let occurrences = timeline.occurrences(&EventPredicate::reason("Unhealthy"));
        let mut cause = Cause::new(
            "RepeatedProbeFailure",
            &graph.pod.name,
            "Probes are failing repeatedly within a short window",
        )
        .with_evidence(Evidence::timeline(
            "Unhealthy",
            format!("{occurrences} probe failures within 5 minutes"),
        ));
        if let Some(event) = timeline.first(&EventPredicate::reason("Unhealthy")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(LivenessProbeFailing::new()),
        Box::new(ReadinessProbeFailing::new()),
        Box::new(StartupProbeFailing::new()),
        Box::new(RepeatedProbeFailure::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testutil::graph_from;
    use serde_json::json;

    fn probed_pod() -> serde_json::Value {
        json!({
            "metadata": {"name": "api-0"},
            "status": {
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False"}]
            },
            "spec": {"containers": [{
                "name": "main",
                "image": "api:v1",
                "livenessProbe": {"httpGet": {"path": "/healthz"}},
                "readinessProbe": {"httpGet": {"path": "/ready"}}
            }]}
        })
    }

    #[test]
    fn liveness_and_readiness_distinguished_by_message() {
        let (graph, timeline) = graph_from(
            probed_pod(),
            json!([{
                "reason": "Unhealthy",
                "message": "Liveness probe failed: HTTP probe failed with statuscode: 500"
            }]),
        );
        assert!(LivenessProbeFailing::new().matches(&graph, &timeline));
        assert!(!ReadinessProbeFailing::new().matches(&graph, &timeline));
    }

    #[test]
    fn probe_cause_carries_spec_corroboration() {
        let (graph, timeline) = graph_from(
            probed_pod(),
            json!([{"reason": "Unhealthy", "message": "Liveness probe failed"}]),
        );
        let chain = LivenessProbeFailing::new().explain(&graph, &timeline);
        assert!(chain.causes[0]
            .evidence
            .iter()
            .any(|e| e.locator == "spec.containers[].probes"));
    }

    #[test]
    fn readiness_failure_records_not_ready_symptom() {
        let (graph, timeline) = graph_from(
            probed_pod(),
            json!([{"reason": "Unhealthy", "message": "Readiness probe failed"}]),
        );
        let chain = ReadinessProbeFailing::new().explain(&graph, &timeline);
        assert_eq!(chain.symptoms[0].kind, "PodNotReady");
    }

    #[test]
    fn repeated_failure_needs_three_in_window() {
        let (graph, timeline) = graph_from(
            probed_pod(),
            json!([
                {"reason": "Unhealthy", "message": "Liveness probe failed",
                 "lastTimestamp": "2024-05-01T10:00:00Z"},
                {"reason": "Unhealthy", "message": "Liveness probe failed",
                 "lastTimestamp": "2024-05-01T10:01:00Z"},
                {"reason": "Unhealthy", "message": "Liveness probe failed",
                 "lastTimestamp": "2024-05-01T10:02:00Z"},
            ]),
        );
        assert!(RepeatedProbeFailure::new().matches(&graph, &timeline));
    }
}
