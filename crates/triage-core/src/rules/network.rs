//! Pod sandbox and CNI rules.

use super::{Rule, RuleMeta};
use crate::graph::ObjectGraph;
use crate::timeline::{EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

/// Sandbox creation is failing outright.
pub struct FailedCreatePodSandBox {
    meta: RuleMeta,
}

impl FailedCreatePodSandBox {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("FailedCreatePodSandBox", RuleCategory::Network)
                .priority(69)
                .confidence(0.88)
                .expected_evidence(1),
        }
    }
}

impl Rule for FailedCreatePodSandBox {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("FailedCreatePodSandBox")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "FailedCreatePodSandBox",
            &graph.pod.name,
            "The pod sandbox could not be created",
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("FailedCreatePodSandBox")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// Sandbox failures whose message points at the CNI plugin.
pub struct CniNotReady {
    meta: RuleMeta,
}

impl CniNotReady {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("CniNotReady", RuleCategory::Network)
                .priority(71)
                .confidence(0.9)
                .blocks(&["FailedCreatePodSandBox"])
                .expected_evidence(1),
        }
    }
}

impl Rule for CniNotReady {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        ["cni", "network plugin"].into_iter().any(|needle| {
            timeline.has(&EventPredicate::reason("FailedCreatePodSandBox").with_message(needle))
                || timeline.has(&EventPredicate::reason("NetworkNotReady").with_message(needle))
        })
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "CniNotReady",
            &graph.pod.name,
            "The CNI network plugin is not ready on the node",
        );
        for needle in ["cni", "network plugin"] {
            for reason in ["FailedCreatePodSandBox", "NetworkNotReady"] {
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

/// The kubelet reports the node network as not ready.
pub struct NetworkNotReady {
    meta: RuleMeta,
}

impl NetworkNotReady {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("NetworkNotReady", RuleCategory::Network)
                .priority(67)
                .confidence(0.85)
                .optional(&[crate::graph::ObjectKind::Node])
                .expected_evidence(1),
        }
    }
}

impl Rule for NetworkNotReady {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("NetworkNotReady")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "NetworkNotReady",
            &graph.pod.name,
            "Pod networking is unavailable on the node",
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("NetworkNotReady")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        if let Some(node) = &graph.node {
            if let Some(condition) = node.condition("NetworkUnavailable") {
                if condition.status == "True" {
                    cause = cause.with_evidence(Evidence::condition(
                        "node.status.conditions[NetworkUnavailable]",
                        condition.status.clone(),
                    ));
                }
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The sandbox keeps getting torn down and recreated.
pub struct PodSandboxChanged {
    meta: RuleMeta,
}

impl PodSandboxChanged {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PodSandboxChanged", RuleCategory::Network)
                .priority(45)
                .confidence(0.65)
                .expected_evidence(1),
        }
    }
}

impl Rule for PodSandboxChanged {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.repeated("SandboxChanged", 2, None)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let occurrences = timeline.occurrences(&EventPredicate::reason("SandboxChanged"));
        CausalChain::new().with_cause(
            Cause::new(
                "PodSandboxChanged",
                &graph.pod.name,
                "The pod sandbox is being recreated repeatedly",
            )
            .with_evidence(Evidence::timeline(
                "SandboxChanged",
                format!("sandbox changed {occurrences} times"),
            )),
        )
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(FailedCreatePodSandBox::new()),
        Box::new(CniNotReady::new()),
        Box::new(NetworkNotReady::new()),
        Box::new(PodSandboxChanged::new()),
    ]
}
