//! Storage rules: claims, volumes, and storage classes.

use super::{Rule, RuleMeta};
use crate::graph::{ObjectGraph, ObjectKind, Pvc};
use crate::timeline::{volume_pending_duration, EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn unbound_claims(graph: &ObjectGraph) -> Vec<&Pvc> {
    let claimed = graph.claimed_pvcs();
    let pool: Vec<&Pvc> = if claimed.is_empty() {
        // claims provided but not referenced from the pod spec still count
        graph
            .pvcs
            .as_ref()
            .map(|m| m.values().collect())
            .unwrap_or_default()
    } else {
        claimed
    };
    pool.into_iter().filter(|p| p.phase != "Bound").collect()
}

fn pvc_not_bound_cause(pvc: &Pvc) -> Cause {
    Cause::new(
        "PVCNotBound",
        &pvc.name,
        format!(
            "The pod is blocked by PersistentVolumeClaim {} in phase {}",
            pvc.name, pvc.phase
        ),
    )
    .with_evidence(Evidence::object_state(
        "pvc.status.phase",
        pvc.phase.clone(),
    ))
}

/// A referenced claim is not bound.
pub struct PvcNotBound {
    meta: RuleMeta,
}

impl PvcNotBound {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PVCNotBound", RuleCategory::Storage)
                .priority(80)
                .confidence(0.95)
                .requires(&[ObjectKind::Pvc])
                .optional(&[ObjectKind::Pv, ObjectKind::StorageClass])
                .expected_evidence(1),
        }
    }
}

impl Rule for PvcNotBound {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        !unbound_claims(graph).is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new();
        for pvc in unbound_claims(graph) {
            let mut cause = pvc_not_bound_cause(pvc);
            if let Some(event) = timeline.first(&EventPredicate::reason("FailedScheduling")) {
                if event.message.to_ascii_lowercase().contains("persistentvolumeclaim") {
                    cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
                }
            }
            chain = chain.with_cause(cause);
        }
        chain
    }
}

/// The pod claims a volume whose PVC is absent from the cluster.
pub struct PvcMissing {
    meta: RuleMeta,
}

impl PvcMissing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PVCMissing", RuleCategory::Storage)
                .priority(72)
                .confidence(0.9)
                .requires(&[ObjectKind::Pvc])
                .expected_evidence(1),
        }
    }
}

impl Rule for PvcMissing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph
            .claimed_pvc_names()
            .iter()
            .any(|name| graph.pvc(name).is_none())
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new();
        for name in graph.claimed_pvc_names() {
            if graph.pvc(name).is_none() {
                chain = chain.with_cause(
                    Cause::new(
                        "PVCMissing",
                        name,
                        format!("The pod references PersistentVolumeClaim {name}, which does not exist"),
                    )
                    .with_evidence(Evidence::object_state(
                        "spec.volumes[].persistentVolumeClaim.claimName",
                        name,
                    )),
                );
            }
        }
        chain
    }
}

/// A claim is bound to a volume that is missing or not in a usable phase.
pub struct PvUnavailable {
    meta: RuleMeta,
}

impl PvUnavailable {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PVUnavailable", RuleCategory::Storage)
                .priority(74)
                .confidence(0.88)
                .requires(&[ObjectKind::Pvc, ObjectKind::Pv])
                .expected_evidence(2),
        }
    }
}

impl Rule for PvUnavailable {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        let Some(pvcs) = graph.pvcs.as_ref() else {
            return false;
        };
        pvcs.values().any(|pvc| {
            pvc.volume_name.is_some()
                && graph
                    .pv_for_pvc(pvc)
                    .is_none_or(|pv| pv.phase == "Failed" || pv.phase == "Released")
        })
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new();
        let Some(pvcs) = graph.pvcs.as_ref() else {
            return chain;
        };
        for pvc in pvcs.values() {
            let Some(volume_name) = pvc.volume_name.as_deref() else {
                continue;
            };
            match graph.pv_for_pvc(pvc) {
                None => {
                    chain = chain.with_cause(
                        Cause::new(
                            "PVUnavailable",
                            volume_name,
                            format!(
                                "Claim {} references PersistentVolume {volume_name}, which is absent",
                                pvc.name
                            ),
                        )
                        .with_evidence(Evidence::object_state(
                            "pvc.spec.volumeName",
                            volume_name,
                        )),
                    );
                }
                Some(pv) if pv.phase == "Failed" || pv.phase == "Released" => {
                    chain = chain.with_cause(
                        Cause::new(
                            "PVUnavailable",
                            &pv.name,
                            format!("PersistentVolume {} is in phase {}", pv.name, pv.phase),
                        )
                        .with_evidence(Evidence::object_state("pv.status.phase", pv.phase.clone()))
                        .with_evidence(Evidence::object_state(
                            "pvc.spec.volumeName",
                            volume_name,
                        )),
                    );
                }
                Some(_) => {}
            }
        }
        chain
    }
}

/// A claim requests a storage class that does not exist.
pub struct StorageClassMissing {
    meta: RuleMeta,
}

impl StorageClassMissing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("StorageClassMissing", RuleCategory::Storage)
                .priority(73)
                .confidence(0.92)
                .requires(&[ObjectKind::Pvc, ObjectKind::StorageClass])
                .expected_evidence(1),
        }
    }
}

impl Rule for StorageClassMissing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        let Some(pvcs) = graph.pvcs.as_ref() else {
            return false;
        };
        pvcs.values().any(|pvc| {
            pvc.phase != "Bound"
                && pvc.storage_class.is_some()
                && graph.storage_class_for_pvc(pvc).is_none()
        })
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut chain = CausalChain::new();
        let Some(pvcs) = graph.pvcs.as_ref() else {
            return chain;
        };
        for pvc in pvcs.values() {
            let Some(class) = pvc.storage_class.as_deref() else {
                continue;
            };
            if pvc.phase != "Bound" && graph.storage_class_for_pvc(pvc).is_none() {
                chain = chain.with_cause(
                    Cause::new(
                        "StorageClassMissing",
                        class,
                        format!("Claim {} requests StorageClass {class}, which does not exist", pvc.name),
                    )
                    .with_evidence(Evidence::object_state(
                        "pvc.spec.storageClassName",
                        class,
                    )),
                );
            }
        }
        chain
    }
}

/// Dynamic provisioning failed.
pub struct ProvisioningFailed {
    meta: RuleMeta,
}

impl ProvisioningFailed {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ProvisioningFailed", RuleCategory::Storage)
                .priority(70)
                .confidence(0.9)
                .optional(&[ObjectKind::Pvc, ObjectKind::StorageClass])
                .expected_evidence(1),
        }
    }
}

impl Rule for ProvisioningFailed {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("ProvisioningFailed")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let event = timeline.first(&EventPredicate::reason("ProvisioningFailed"));
        let object = event
            .map(|e| e.involved_object.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| graph.pod.name.clone());
        let mut cause = Cause::new(
            "ProvisioningFailed",
            &object,
            "Dynamic volume provisioning failed",
        );
        if let Some(event) = event {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        if let Some(pvcs) = graph.pvcs.as_ref() {
            for pvc in pvcs.values().filter(|p| p.phase == "Pending") {
                cause = cause.with_evidence(Evidence::object_state(
                    "pvc.status.phase",
                    format!("{} is Pending", pvc.name),
                ));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

fn mount_rule(name: &str, priority: i32) -> RuleMeta {
    RuleMeta::new(name, RuleCategory::Storage)
        .priority(priority)
        .confidence(0.85)
        .optional(&[ObjectKind::Pvc, ObjectKind::Pv])
        .expected_evidence(1)
}

/// The kubelet failed to mount a volume.
pub struct FailedMount {
    meta: RuleMeta,
}

impl FailedMount {
    pub(crate) fn new() -> Self {
        Self {
            meta: mount_rule("FailedMount", 68),
        }
    }
}

impl Rule for FailedMount {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("FailedMount")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "FailedMount",
            &graph.pod.name,
            "A volume could not be mounted into the pod",
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("FailedMount")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The attach controller failed to attach a volume to the node.
pub struct FailedAttachVolume {
    meta: RuleMeta,
}

impl FailedAttachVolume {
    pub(crate) fn new() -> Self {
        Self {
            meta: mount_rule("FailedAttachVolume", 67),
        }
    }
}

impl Rule for FailedAttachVolume {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("FailedAttachVolume")
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "FailedAttachVolume",
            &graph.pod.name,
            "A volume could not be attached to the pod's node",
        );
        if let Some(event) = timeline.first(&EventPredicate::reason("FailedAttachVolume")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// Volume trouble has persisted for over a minute.
pub struct PvcPendingDuration {
    meta: RuleMeta,
}

impl PvcPendingDuration {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("PVCPendingDuration", RuleCategory::Storage)
                .priority(86)
                .confidence(0.88)
                .requires(&[ObjectKind::Pvc])
                .blocks(&["ProvisioningFailed"])
                .expected_evidence(2),
        }
    }
}

impl Rule for PvcPendingDuration {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        !unbound_claims(graph).is_empty()
            && volume_pending_duration(timeline)
                .is_some_and(|d| d >= chrono::Duration::seconds(60))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let span = volume_pending_duration(timeline).map_or(0, |d| d.num_seconds());
        let claims = unbound_claims(graph);
        let lead_name = claims
            .first()
            .map_or_else(|| graph.pod.name.clone(), |p| p.name.clone());
        let lead = Cause::new(
            "PVCPendingDuration",
            &lead_name,
            format!("PersistentVolumeClaim {lead_name} has been unbound for {span}s"),
        )
        .with_evidence(Evidence::object_state("pvc.status.phase", "Pending"))
        .with_evidence(Evidence::timeline(
            "Volume/Failure",
            format!("volume trouble has persisted for {span}s"),
        ));
        let mut chain = CausalChain::new().with_cause(lead);
        for pvc in claims {
            chain = chain.with_contributing(pvc_not_bound_cause(pvc));
        }
        chain
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(PvcNotBound::new()),
        Box::new(PvcMissing::new()),
        Box::new(PvUnavailable::new()),
        Box::new(StorageClassMissing::new()),
        Box::new(ProvisioningFailed::new()),
        Box::new(FailedMount::new()),
        Box::new(FailedAttachVolume::new()),
        Box::new(PvcPendingDuration::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Snapshot;
    use crate::rules::testutil::graph_from_snapshot;
    use serde_json::json;

    fn pod_with_claim() -> serde_json::Value {
        json!({
            "metadata": {"name": "db-0"},
            "status": {"phase": "Pending"},
            "spec": {"volumes": [
                {"name": "data", "persistentVolumeClaim": {"claimName": "data-pvc"}}
            ]}
        })
    }

    fn pending_pvc() -> serde_json::Value {
        json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}})
    }

    #[test]
    fn pvc_not_bound_matches_pending_claim() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([])).with_pvc(pending_pvc());
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = PvcNotBound::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].kind, "PVCNotBound");
        assert_eq!(chain.causes[0].involved_object, "data-pvc");
    }

    #[test]
    fn pvc_not_bound_skipped_without_pvc_slot() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([]));
        let (graph, _) = graph_from_snapshot(&snapshot);
        assert!(!PvcNotBound::new().meta().applies_to(&graph));
    }

    #[test]
    fn pvc_not_bound_ignores_bound_claims() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([])).with_pvc(json!({
            "metadata": {"name": "data-pvc"},
            "status": {"phase": "Bound"}
        }));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        assert!(!PvcNotBound::new().matches(&graph, &timeline));
    }

    #[test]
    fn pvc_missing_flags_unresolvable_claim() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([]))
            .with_pvc(json!({"kind": "List", "items": []}));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = PvcMissing::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].involved_object, "data-pvc");
    }

    #[test]
    fn pv_unavailable_flags_dangling_volume_name() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([]))
            .with_pvc(json!({
                "metadata": {"name": "data-pvc"},
                "spec": {"volumeName": "pv-9"},
                "status": {"phase": "Lost"}
            }))
            .with_pv(json!({"kind": "List", "items": []}));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = PvUnavailable::new();
        assert!(rule.matches(&graph, &timeline));
        assert_eq!(rule.explain(&graph, &timeline).causes[0].involved_object, "pv-9");
    }

    #[test]
    fn storage_class_missing_requires_unbound_claim() {
        let snapshot = Snapshot::new(pod_with_claim(), json!([]))
            .with_pvc(json!({
                "metadata": {"name": "data-pvc"},
                "spec": {"storageClassName": "fast"},
                "status": {"phase": "Pending"}
            }))
            .with_storageclass(json!({"kind": "List", "items": []}));
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = StorageClassMissing::new();
        assert!(rule.matches(&graph, &timeline));
        assert_eq!(rule.explain(&graph, &timeline).causes[0].involved_object, "fast");
    }

    #[test]
    fn provisioning_failed_reads_event_message() {
        let snapshot = Snapshot::new(
            pod_with_claim(),
            json!([{
                "reason": "ProvisioningFailed",
                "message": "failed to provision volume: quota exceeded",
                "involvedObject": {"name": "data-pvc"}
            }]),
        );
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = ProvisioningFailed::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].involved_object, "data-pvc");
        assert!(chain.causes[0].evidence[0].snippet.contains("quota exceeded"));
    }

    #[test]
    fn pending_duration_needs_a_minute_of_trouble() {
        let snapshot = Snapshot::new(
            pod_with_claim(),
            json!([
                {"reason": "ProvisioningFailed", "firstTimestamp": "2024-05-01T10:00:00Z",
                 "lastTimestamp": "2024-05-01T10:00:00Z"},
                {"reason": "FailedMount", "firstTimestamp": "2024-05-01T10:02:00Z",
                 "lastTimestamp": "2024-05-01T10:02:00Z"},
            ]),
        )
        .with_pvc(pending_pvc());
        let (graph, timeline) = graph_from_snapshot(&snapshot);
        let rule = PvcPendingDuration::new();
        assert!(rule.matches(&graph, &timeline));
        let chain = rule.explain(&graph, &timeline);
        assert_eq!(chain.causes[0].kind, "PVCPendingDuration");

        let quick = Snapshot::new(
            pod_with_claim(),
            json!([
                {"reason": "FailedMount", "firstTimestamp": "2024-05-01T10:00:00Z",
                 "lastTimestamp": "2024-05-01T10:00:10Z"},
            ]),
        )
        .with_pvc(pending_pvc());
        let (graph, timeline) = graph_from_snapshot(&quick);
        assert!(!rule.matches(&graph, &timeline));
    }
}
