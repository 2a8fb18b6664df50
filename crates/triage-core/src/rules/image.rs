//! Image resolution and pull rules.

use super::{Rule, RuleMeta};
use crate::graph::ObjectGraph;
use crate::timeline::{EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

/// Container statuses plus events give two independent reads on a pull
/// failure; prefer the status, keep the event as corroboration.
fn pull_failure_cause(kind: &str, message: &str, graph: &ObjectGraph, timeline: &Timeline) -> Cause {
    let mut cause = Cause::new(kind, &graph.pod.name, message);
    for cs in &graph.pod.container_statuses {
        if let Some(reason) = cs.waiting_reason.as_deref() {
            if reason == "ImagePullBackOff" || reason == "ErrImagePull" {
                let image = graph
                    .pod
                    .container_spec(&cs.name)
                    .map_or_else(String::new, |c| c.image.clone());
                cause = cause.with_evidence(Evidence::object_state(
                    "status.containerStatuses[].state.waiting.reason",
                    format!("{} waiting on {reason} for image {image}", cs.name),
                ));
            }
        }
    }
    for reason in ["Failed", "ErrImagePull", "ImagePullBackOff"] {
        if let Some(event) = timeline.first(&EventPredicate::reason(reason)) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
    }
    cause
}

fn pull_signal(graph: &ObjectGraph, timeline: &Timeline, reason: &str) -> bool {
    timeline.has_reason(reason)
        || graph
            .pod
            .container_statuses
            .iter()
            .any(|cs| cs.waiting_reason.as_deref() == Some(reason))
}

/// The kubelet is backing off pulling an image.
pub struct ImagePullBackOff {
    meta: RuleMeta,
}

impl ImagePullBackOff {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ImagePullBackOff", RuleCategory::Image)
                .priority(70)
                .confidence(0.75)
                .expected_evidence(2),
        }
    }
}

impl Rule for ImagePullBackOff {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        pull_signal(graph, timeline, "ImagePullBackOff")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(pull_failure_cause(
            "ImagePullBackOff",
            "The container image could not be pulled and the kubelet is backing off",
            graph,
            timeline,
        ))
    }

    /// Confidence grows with observed retries: 0.6 + 0.05 per back-off
    /// occurrence, capped at 0.9.
    fn confidence(&self, _graph: &ObjectGraph, timeline: &Timeline) -> f64 {
        let retries = timeline.occurrences(&EventPredicate::reason("ImagePullBackOff"));
        (f64::from(retries).mul_add(0.05, 0.6)).min(0.9)
    }
}

/// A pull attempt failed outright.
pub struct ErrImagePull {
    meta: RuleMeta,
}

impl ErrImagePull {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ErrImagePull", RuleCategory::Image)
                .priority(69)
                .confidence(0.8)
                .expected_evidence(2),
        }
    }
}

impl Rule for ErrImagePull {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        pull_signal(graph, timeline, "ErrImagePull")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(pull_failure_cause(
            "ErrImagePull",
            "Pulling the container image failed",
            graph,
            timeline,
        ))
    }
}

/// The image reference itself is malformed.
pub struct InvalidImageName {
    meta: RuleMeta,
}

impl InvalidImageName {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("InvalidImageName", RuleCategory::Image)
                .priority(77)
                .confidence(0.95)
                .blocks(&["ImagePullBackOff", "ErrImagePull"])
                .expected_evidence(1),
        }
    }
}

impl Rule for InvalidImageName {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        pull_signal(graph, timeline, "InvalidImageName")
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "InvalidImageName",
            &graph.pod.name,
            "A container image reference is not a valid image name",
        );
        for cs in &graph.pod.container_statuses {
            if cs.waiting_reason.as_deref() == Some("InvalidImageName") {
                let image = graph
                    .pod
                    .container_spec(&cs.name)
                    .map_or_else(String::new, |c| c.image.clone());
                cause = cause.with_evidence(Evidence::object_state(
                    "spec.containers[].image",
                    format!("{}: {image}", cs.name),
                ));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// `imagePullPolicy: Never` with no image preloaded on the node.
pub struct ImageNeverPulled {
    meta: RuleMeta,
}

impl ImageNeverPulled {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ImageNeverPulled", RuleCategory::Image)
                .priority(68)
                .confidence(0.9)
                .blocks(&["ImagePullBackOff", "ErrImagePull"])
                .expected_evidence(1),
        }
    }
}

impl Rule for ImageNeverPulled {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        pull_signal(graph, timeline, "ErrImageNeverPull")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "ImageNeverPulled",
            &graph.pod.name,
            "The image is absent from the node and the pull policy forbids pulling it",
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("ErrImageNeverPull")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// Pulls failing on connectivity rather than the image itself.
pub struct RegistryUnreachable {
    meta: RuleMeta,
}

impl RegistryUnreachable {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("RegistryUnreachable", RuleCategory::Image)
                .priority(71)
                .confidence(0.85)
                .blocks(&["ImagePullBackOff", "ErrImagePull"])
                .expected_evidence(1),
        }
    }
}

impl Rule for RegistryUnreachable {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        ["connection refused", "i/o timeout", "no such host"]
            .into_iter()
            .any(|needle| {
                timeline.has(&EventPredicate::reason("Failed").with_message(needle))
                    || timeline.has(&EventPredicate::reason("ErrImagePull").with_message(needle))
            })
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "RegistryUnreachable",
            &graph.pod.name,
            "The image registry is unreachable from the node",
        );
        for needle in ["connection refused", "i/o timeout", "no such host"] {
            for reason in ["Failed", "ErrImagePull"] {
                if let Some(event) =
                    timeline.first(&EventPredicate::reason(reason).with_message(needle))
                {
                    cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
                }
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ImagePullBackOff::new()),
        Box::new(ErrImagePull::new()),
        Box::new(InvalidImageName::new()),
        Box::new(ImageNeverPulled::new()),
        Box::new(RegistryUnreachable::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testutil::graph_from;
    use crate::types::EvidenceSource;
    use serde_json::json;

    fn pod_waiting_on(reason: &str) -> serde_json::Value {
        json!({
            "metadata": {"name": "web-0"},
            "status": {
                "phase": "Pending",
                "containerStatuses": [{
                    "name": "main",
                    "state": {"waiting": {"reason": reason, "message": "pull failed"}}
                }]
            },
            "spec": {"containers": [{"name": "main", "image": "registry.local/app:v9"}]}
        })
    }

    #[test]
    fn matches_waiting_state_without_events() {
        let (graph, timeline) = graph_from(pod_waiting_on("ImagePullBackOff"), json!([]));
        assert!(ImagePullBackOff::new().matches(&graph, &timeline));
    }

    #[test]
    fn matches_events_without_waiting_state() {
        let pod = json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}});
        let (graph, timeline) = graph_from(
            pod,
            json!([{"reason": "ImagePullBackOff", "message": "Back-off pulling image"}]),
        );
        assert!(ImagePullBackOff::new().matches(&graph, &timeline));
    }

    #[test]
    fn object_state_evidence_precedes_event_evidence() {
        let (graph, timeline) = graph_from(
            pod_waiting_on("ImagePullBackOff"),
            json!([{"reason": "ImagePullBackOff", "message": "Back-off pulling image"}]),
        );
        let chain = ImagePullBackOff::new().explain(&graph, &timeline);
        let evidence = &chain.causes[0].evidence;
        assert_eq!(evidence[0].source, EvidenceSource::ObjectState);
        assert!(evidence[0].snippet.contains("registry.local/app:v9"));
        assert!(evidence.iter().any(|e| e.source == EvidenceSource::Event));
    }

    #[test]
    fn confidence_scales_with_retries() {
        let pod = json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}});
        let rule = ImagePullBackOff::new();

        let (graph, timeline) = graph_from(
            pod.clone(),
            json!([{"reason": "ImagePullBackOff", "count": 2}]),
        );
        assert!((rule.confidence(&graph, &timeline) - 0.7).abs() < 1e-9);

        let (graph, timeline) = graph_from(
            pod,
            json!([{"reason": "ImagePullBackOff", "count": 50}]),
        );
        assert!((rule.confidence(&graph, &timeline) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn invalid_image_name_reads_spec_image() {
        let (graph, timeline) = graph_from(pod_waiting_on("InvalidImageName"), json!([]));
        let rule = InvalidImageName::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert!(chain.causes[0].evidence[0].snippet.contains("registry.local/app:v9"));
    }

    #[test]
    fn registry_unreachable_keys_on_connectivity_text() {
        let pod = json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}});
        let (graph, timeline) = graph_from(
            pod,
            json!([{
                "reason": "Failed",
                "message": "Failed to pull image: dial tcp: i/o timeout"
            }]),
        );
        assert!(RegistryUnreachable::new().matches(&graph, &timeline));
        assert!(!ImagePullBackOff::new().matches(&graph, &timeline));
    }
}
