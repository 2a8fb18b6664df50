//! Compound rules: predicates spanning multiple objects or stretches of the
//! timeline. Each one declares `blocks` for the atomic rules whose signals
//! it subsumes, so the richer explanation surfaces when both would fire.

use super::{Rule, RuleMeta};
use crate::graph::{ObjectGraph, ObjectKind, Pvc};
use crate::timeline::{
    crashloop_after_config_change, image_updated_then_crashloop, volume_trouble_then_crashloop,
    EventPredicate, Timeline,
};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn crashloop_signal(graph: &ObjectGraph, timeline: &Timeline) -> bool {
    timeline.has_reason("BackOff")
        || !graph.pod.containers_waiting_with("CrashLoopBackOff").is_empty()
}

fn crashloop_symptom(graph: &ObjectGraph, timeline: &Timeline) -> Cause {
    let mut symptom = Cause::new(
        "CrashLoopBackoff",
        &graph.pod.name,
        "Containers are crash-looping",
    );
    for cs in graph.pod.containers_waiting_with("CrashLoopBackOff") {
        symptom = symptom.with_evidence(Evidence::object_state(
            "status.containerStatuses[].state.waiting.reason",
            format!("{} in CrashLoopBackOff", cs.name),
        ));
    }
    if let Some(event) = timeline.first(&EventPredicate::reason("BackOff")) {
        symptom = symptom.with_evidence(Evidence::event(&event.reason, &event.message));
    }
    symptom
}

fn pending_claims(graph: &ObjectGraph) -> Vec<&Pvc> {
    let claimed = graph.claimed_pvcs();
    let pool: Vec<&Pvc> = if claimed.is_empty() {
        graph
            .pvcs
            .as_ref()
            .map(|m| m.values().collect())
            .unwrap_or_default()
    } else {
        claimed
    };
    pool.into_iter().filter(|p| p.phase == "Pending").collect()
}

/// A pull failure on a pod with no pull credentials anywhere in sight.
pub struct ImagePullSecretMissingCompound {
    meta: RuleMeta,
}

impl ImagePullSecretMissingCompound {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ImagePullSecretMissingCompound", RuleCategory::Image)
                .priority(94)
                .confidence(0.92)
                .optional(&[ObjectKind::ServiceAccount, ObjectKind::Secrets])
                .blocks(&["ImagePullBackOff", "ErrImagePull"])
                .expected_evidence(3),
        }
    }

    fn account_has_pull_secrets(graph: &ObjectGraph) -> bool {
        graph
            .service_account
            .as_ref()
            .is_some_and(|sa| !sa.image_pull_secrets.is_empty())
    }
}

impl Rule for ImagePullSecretMissingCompound {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        let pull_failure = timeline.has_reason("ImagePullBackOff")
            || timeline.has_reason("ErrImagePull")
            || graph
                .pod
                .container_statuses
                .iter()
                .any(|cs| matches!(cs.waiting_reason.as_deref(), Some("ImagePullBackOff" | "ErrImagePull")));
        let no_credentials =
            graph.pod.image_pull_secrets.is_empty() && !Self::account_has_pull_secrets(graph);
        pull_failure && no_credentials
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "ImagePullSecretMissing",
            &graph.pod.name,
            "The image pull fails and the pod has no image pull secret configured",
        )
        .with_evidence(Evidence::object_state(
            "spec.imagePullSecrets",
            "no imagePullSecrets on the pod spec",
        ));
        if let Some(sa) = &graph.service_account {
            cause = cause.with_evidence(Evidence::object_state(
                "serviceaccount.imagePullSecrets",
                format!("service account {} has no pull secrets", sa.name),
            ));
        }
        for reason in ["Failed", "ImagePullBackOff", "ErrImagePull"] {
            if let Some(event) = timeline.first(&EventPredicate::reason(reason)) {
                cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
            }
        }
        let mut symptom = Cause::new(
            "ImagePullBackOff",
            &graph.pod.name,
            "The kubelet is backing off pulling the image",
        );
        for cs in &graph.pod.container_statuses {
            if let Some(reason) = cs.waiting_reason.as_deref() {
                if reason == "ImagePullBackOff" || reason == "ErrImagePull" {
                    symptom = symptom.with_evidence(Evidence::object_state(
                        "status.containerStatuses[].state.waiting.reason",
                        format!("{} waiting on {reason}", cs.name),
                    ));
                }
            }
        }
        CausalChain::new().with_cause(cause).with_symptom(symptom)
    }
}

/// A pending claim kept the workload from its storage until it started
/// crash-looping.
pub struct PvcPendingThenCrashloop {
    meta: RuleMeta,
}

impl PvcPendingThenCrashloop {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PVCPendingThenCrashloop", RuleCategory::Storage)
                .priority(95)
                .confidence(0.93)
                .requires(&[ObjectKind::Pvc])
                .optional(&[ObjectKind::Pv, ObjectKind::StorageClass])
                .blocks(&["CrashLoopBackoff", "PVCNotBound", "PVCPendingDuration"])
                .expected_evidence(3),
        }
    }
}

impl Rule for PvcPendingThenCrashloop {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        if pending_claims(graph).is_empty() || !crashloop_signal(graph, timeline) {
            return false;
        }
        // when volume events carry timestamps, insist the trouble lasted;
        // object state alone is accepted otherwise
        let volume_failure =
            EventPredicate::kind(crate::timeline::EventKind::Volume).with_phase(crate::timeline::EventPhase::Failure);
        if timeline.has(&volume_failure) {
            volume_trouble_then_crashloop(timeline)
        } else {
            true
        }
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let claims = pending_claims(graph);
        let lead_name = claims
            .first()
            .map_or_else(|| graph.pod.name.clone(), |p| p.name.clone());
        let mut lead = Cause::new(
            "PVCPendingThenCrashloop",
            &lead_name,
            format!(
                "PersistentVolumeClaim {lead_name} stayed Pending until the workload began crash-looping"
            ),
        );
        for pvc in &claims {
            lead = lead.with_evidence(Evidence::object_state(
                "pvc.status.phase",
                format!("{} is {}", pvc.name, pvc.phase),
            ));
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("BackOff")) {
            lead = lead.with_evidence(Evidence::event(&event.reason, &event.message));
        }

        let mut chain = CausalChain::new()
            .with_cause(lead)
            .with_symptom(crashloop_symptom(graph, timeline));
        for pvc in claims {
            chain = chain.with_contributing(
                Cause::new(
                    "PVCNotBound",
                    &pvc.name,
                    format!("Claim {} is not bound", pvc.name),
                )
                .with_evidence(Evidence::object_state("pvc.status.phase", pvc.phase.clone())),
            );
        }
        chain = chain.with_contributing(
            Cause::new(
                "CrashLoopBackoff",
                &graph.pod.name,
                "Containers crash-loop while storage is unavailable",
            )
            .with_evidence(Evidence::timeline(
                "BackOff",
                "crash-looping follows the volume trouble",
            )),
        );
        chain
    }
}

/// An unready node shed the pod.
pub struct NodeNotReadyEvicted {
    meta: RuleMeta,
}

impl NodeNotReadyEvicted {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("NodeNotReadyEvictedCompound", RuleCategory::NodePressure)
                .priority(93)
                .confidence(0.92)
                .requires(&[ObjectKind::Node])
                .blocks(&[
                    "NodeNotReady",
                    "PodEvicted",
                    "NodeDiskPressure",
                    "NodeMemoryPressure",
                    "NodePidPressure",
                ])
                .expected_evidence(2),
        }
    }
}

impl Rule for NodeNotReadyEvicted {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        let node_unhappy = graph.node.as_ref().is_some_and(|n| {
            n.is_not_ready()
                || n.has_condition("DiskPressure")
                || n.has_condition("MemoryPressure")
                || n.has_condition("PIDPressure")
        });
        let evicted =
            graph.pod.reason.as_deref() == Some("Evicted") || timeline.has_reason("Evicted");
        node_unhappy && evicted
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let node = graph.node.as_ref();
        let node_name = node.map_or_else(String::new, |n| n.name.clone());
        let mut lead = Cause::new(
            "NodeNotReadyEvicted",
            &node_name,
            format!("Node {node_name} degraded and the pod was evicted from it"),
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("Evicted")) {
            lead = lead.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        if graph.pod.reason.as_deref() == Some("Evicted") {
            lead = lead.with_evidence(Evidence::object_state(
                "status.reason",
                "pod status reason is Evicted",
            ));
        }

        let mut chain = CausalChain::new().with_cause(lead).with_symptom(
            Cause::new("PodEvicted", &graph.pod.name, "The pod was evicted")
                .with_evidence(Evidence::object_state(
                    "status.phase",
                    graph.pod.phase.clone(),
                )),
        );
        if let Some(node) = node {
            for condition in &node.conditions {
                let concerning = (condition.condition_type == "Ready"
                    && condition.status != "True")
                    || (condition.condition_type != "Ready" && condition.status == "True");
                if concerning {
                    chain = chain.with_contributing(
                        Cause::new(
                            "NodeConditionDegraded",
                            &node.name,
                            format!(
                                "Node condition {} is {}",
                                condition.condition_type, condition.status
                            ),
                        )
                        .with_evidence(Evidence::condition(
                            format!("node.status.conditions[{}]", condition.condition_type),
                            condition.status.clone(),
                        )),
                    );
                }
            }
        }
        chain
    }
}

/// Probe failures that escalated into restarts.
pub struct ProbeFailureRestartCompound {
    meta: RuleMeta,
}

impl ProbeFailureRestartCompound {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ProbeFailureRestartCompound", RuleCategory::Probe)
                .priority(92)
                .confidence(0.9)
                .blocks(&["LivenessProbeFailing", "RepeatedProbeFailure", "CrashLoopBackoff"])
                .expected_evidence(2),
        }
    }
}

impl Rule for ProbeFailureRestartCompound {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        let liveness_failing =
            timeline.has(&EventPredicate::reason("Unhealthy").with_message("Liveness"));
        let restarted = graph.pod.max_restart_count() >= 1
            && timeline.pattern(&[
                EventPredicate::reason("Unhealthy"),
                EventPredicate::reason("Killing"),
            ]);
        liveness_failing && (restarted || crashloop_signal(graph, timeline))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let restarts = graph.pod.max_restart_count();
        let mut lead = Cause::new(
            "ProbeFailureRestart",
            &graph.pod.name,
            "Failing liveness probes are killing the container and forcing restarts",
        )
        .with_evidence(Evidence::object_state(
            "status.containerStatuses[].restartCount",
            format!("{restarts} restarts recorded"),
        ));
        if let Some(event) =
            timeline.first(&EventPredicate::reason("Unhealthy").with_message("Liveness"))
        {
            lead = lead.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        let mut chain = CausalChain::new().with_cause(lead);
        if crashloop_signal(graph, timeline) {
            chain = chain.with_symptom(crashloop_symptom(graph, timeline));
        }
        chain
    }
}

/// A fresh image pull directly preceding the crash loop.
pub struct ImageUpdatedThenCrashloop {
    meta: RuleMeta,
}

impl ImageUpdatedThenCrashloop {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ImageUpdatedThenCrashloop", RuleCategory::Lifecycle)
                .priority(91)
                .confidence(0.85)
                .blocks(&["CrashLoopBackoff"])
                .expected_evidence(2),
        }
    }
}

impl Rule for ImageUpdatedThenCrashloop {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        image_updated_then_crashloop(timeline)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut lead = Cause::new(
            "ImageUpdatedThenCrashloop",
            &graph.pod.name,
            "The container began crash-looping right after a new image was pulled",
        )
        .with_evidence(Evidence::timeline(
            "Pulled->BackOff",
            "crash-looping follows an image pull",
        ));
        if let Some(event) = timeline.first(&EventPredicate::reason("Pulled")) {
            lead = lead.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new()
            .with_cause(lead)
            .with_symptom(crashloop_symptom(graph, timeline))
    }
}

/// The restart-then-crashloop footprint of a bad configuration rollout.
pub struct CrashloopAfterConfigChange {
    meta: RuleMeta,
}

impl CrashloopAfterConfigChange {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("CrashloopAfterConfigChange", RuleCategory::Lifecycle)
                .priority(90)
                .confidence(0.82)
                .requires(&[ObjectKind::ConfigMaps])
                .blocks(&["CrashLoopBackoff"])
                .expected_evidence(2),
        }
    }
}

impl Rule for CrashloopAfterConfigChange {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        crashloop_after_config_change(timeline)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut lead = Cause::new(
            "CrashloopAfterConfigChange",
            &graph.pod.name,
            "The container was restarted and began crash-looping, pointing at a configuration change",
        )
        .with_evidence(Evidence::timeline(
            "Killing->Started->BackOff",
            "restart cycle ends in crash-looping",
        ));
        if let Some(config_maps) = graph.config_maps.as_ref() {
            for name in config_maps.keys() {
                lead = lead.with_evidence(Evidence::object_state(
                    "configmaps",
                    format!("pod consumes ConfigMap {name}"),
                ));
            }
        }
        CausalChain::new()
            .with_cause(lead)
            .with_symptom(crashloop_symptom(graph, timeline))
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ImagePullSecretMissingCompound::new()),
        Box::new(PvcPendingThenCrashloop::new()),
        Box::new(NodeNotReadyEvicted::new()),
        Box::new(ProbeFailureRestartCompound::new()),
        Box::new(ImageUpdatedThenCrashloop::new()),
        Box::new(CrashloopAfterConfigChange::new()),
    ]
}
