//! End-to-end diagnosis scenarios and engine-level invariants.

use serde_json::json;
use triage_core::{Engine, EvidenceSource, Explanation, Snapshot};

fn explain(snapshot: &Snapshot) -> Explanation {
    Engine::new().expect("built-in corpus is valid").explain(snapshot)
}

fn root_kind(explanation: &Explanation) -> Option<&str> {
    explanation.root_cause.as_ref().map(|c| c.kind.as_str())
}

fn suppressed_names(explanation: &Explanation) -> Vec<&str> {
    explanation
        .suppressed_rules
        .iter()
        .map(|s| s.name.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Seed scenarios
// ---------------------------------------------------------------------------

#[test]
fn pending_pod_with_untolerated_taint() {
    let snapshot = Snapshot::new(
        json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}}),
        json!([{
            "reason": "FailedScheduling",
            "message": "0/3 nodes are available: 1 node(s) had untolerated taint {dedicated: gpu}",
            "lastTimestamp": "2024-05-01T10:00:00Z"
        }]),
    );
    let explanation = explain(&snapshot);

    assert_eq!(root_kind(&explanation), Some("UnschedulableTaint"));
    assert!(
        explanation.confidence >= 0.7,
        "confidence {} below 0.7",
        explanation.confidence
    );
    let checks = explanation.suggested_next_checks.join("\n");
    assert!(checks.contains("Taints"));
    assert!(checks.contains("tolerations"));
}

#[test]
fn image_pull_backoff_with_missing_secret() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "web-0"},
            "status": {
                "phase": "Pending",
                "containerStatuses": [{
                    "name": "main",
                    "state": {"waiting": {"reason": "ImagePullBackOff", "message": "Back-off pulling image"}}
                }]
            },
            "spec": {"containers": [{"name": "main", "image": "registry.local/app:v9"}]}
        }),
        json!([
            {"reason": "Failed", "message": "Failed to pull image: pull access denied for registry.local/app",
             "lastTimestamp": "2024-05-01T10:00:00Z"},
            {"reason": "ImagePullBackOff", "message": "Back-off pulling image \"registry.local/app:v9\"",
             "lastTimestamp": "2024-05-01T10:01:00Z"}
        ]),
    );
    let explanation = explain(&snapshot);

    assert_eq!(root_kind(&explanation), Some("ImagePullSecretMissing"));
    assert!(suppressed_names(&explanation).contains(&"ImagePullBackOff"));
}

#[test]
fn pvc_pending_then_crashloop() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "db-0"},
            "status": {
                "phase": "Running",
                "containerStatuses": [{
                    "name": "main",
                    "restartCount": 6,
                    "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                }]
            },
            "spec": {"volumes": [{"name": "data", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
        }),
        json!([
            {"reason": "ProvisioningFailed", "message": "waiting for a volume to be created",
             "firstTimestamp": "2024-05-01T10:00:00Z", "lastTimestamp": "2024-05-01T10:02:00Z"},
            {"reason": "BackOff", "message": "Back-off restarting failed container",
             "lastTimestamp": "2024-05-01T10:05:00Z"}
        ]),
    )
    .with_pvc(json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}}));
    let explanation = explain(&snapshot);

    assert_eq!(root_kind(&explanation), Some("PVCPendingThenCrashloop"));
    let suppressed = suppressed_names(&explanation);
    assert!(suppressed.contains(&"CrashLoopBackoff"));
    assert!(suppressed.contains(&"PVCNotBound"));

    let contributing: Vec<&str> = explanation
        .causal_chain
        .contributing
        .iter()
        .map(|c| c.kind.as_str())
        .collect();
    assert!(contributing.contains(&"PVCNotBound"));
    assert!(contributing.contains(&"CrashLoopBackoff"));
}

#[test]
fn oomkilled_with_memory_limit() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "worker-0"},
            "status": {
                "phase": "Running",
                "containerStatuses": [{
                    "name": "main",
                    "restartCount": 3,
                    "lastState": {"terminated": {"reason": "OOMKilled", "exitCode": 137}}
                }]
            },
            "spec": {"containers": [{
                "name": "main",
                "image": "worker:v3",
                "resources": {"limits": {"memory": "512Mi"}}
            }]}
        }),
        json!([]),
    );
    let explanation = explain(&snapshot);

    assert_eq!(root_kind(&explanation), Some("OOMKilled"));
    assert!(
        explanation.confidence >= 0.85,
        "confidence {} below 0.85",
        explanation.confidence
    );
    let root = explanation.root_cause.as_ref().expect("root cause");
    assert_eq!(root.evidence[0].source, EvidenceSource::ObjectState);
}

#[test]
fn node_disk_pressure_with_eviction() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "app-0"},
            "spec": {"nodeName": "worker-1"},
            "status": {"phase": "Failed"}
        }),
        json!([{
            "reason": "Evicted",
            "message": "The node was low on resource: ephemeral-storage.",
            "lastTimestamp": "2024-05-01T10:00:00Z"
        }]),
    )
    .with_node(json!({
        "metadata": {"name": "worker-1"},
        "status": {"conditions": [
            {"type": "Ready", "status": "True"},
            {"type": "DiskPressure", "status": "True", "reason": "KubeletHasDiskPressure"}
        ]}
    }));
    let explanation = explain(&snapshot);

    assert_eq!(root_kind(&explanation), Some("NodeNotReadyEvicted"));
    let mentions_node_condition = explanation
        .causal_chain
        .contributing
        .iter()
        .any(|c| c.message.contains("DiskPressure"));
    assert!(mentions_node_condition, "no contributing node condition");
}

#[test]
fn healthy_pod_yields_no_signal() {
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

    assert!(explanation.root_cause.is_none());
    assert!(explanation.confidence.abs() < f64::EPSILON);
    assert!(explanation.causal_chain.is_empty());
    assert!(!explanation.suggested_next_checks.is_empty());
}

// ---------------------------------------------------------------------------
// Universal invariants
// ---------------------------------------------------------------------------

#[test]
fn determinism_across_engine_instances() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "db-0"},
            "status": {"phase": "Running", "containerStatuses": [{
                "name": "main", "restartCount": 6,
                "state": {"waiting": {"reason": "CrashLoopBackOff"}}
            }]},
            "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
        }),
        json!([
            {"reason": "ProvisioningFailed", "firstTimestamp": "2024-05-01T10:00:00Z",
             "lastTimestamp": "2024-05-01T10:02:00Z"},
            {"reason": "BackOff", "lastTimestamp": "2024-05-01T10:05:00Z"}
        ]),
    )
    .with_pvc(json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}}));

    let first = serde_json::to_string(&explain(&snapshot)).expect("serializes");
    let second = serde_json::to_string(&explain(&snapshot)).expect("serializes");
    assert_eq!(first, second);
}

#[test]
fn confidence_stays_in_bounds_across_scenarios() {
    let snapshots = vec![
        Snapshot::new(json!({"metadata": {"name": "a"}}), json!([])),
        Snapshot::new(
            json!({"metadata": {"name": "b"}, "status": {"phase": "Pending"}}),
            json!([{"reason": "FailedScheduling", "message": "1 node(s) had untolerated taint"}]),
        ),
        Snapshot::new(
            json!({"metadata": {"name": "c"}, "status": {"phase": "Running"}}),
            json!([
                {"reason": "BackOff", "count": 30},
                {"reason": "Unhealthy", "message": "Liveness probe failed", "count": 12},
                {"reason": "Evicted"}
            ]),
        ),
    ];
    for snapshot in &snapshots {
        let explanation = explain(snapshot);
        assert!(
            (0.0..=1.0).contains(&explanation.confidence),
            "confidence {} out of bounds",
            explanation.confidence
        );
    }
}

#[test]
fn object_state_evidence_precedes_event_evidence() {
    // both the container status and events report the pull failure
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "web-0"},
            "status": {"phase": "Pending", "containerStatuses": [{
                "name": "main",
                "state": {"waiting": {"reason": "ImagePullBackOff"}}
            }]},
            "spec": {
                "imagePullSecrets": [{"name": "regcred"}],
                "containers": [{"name": "main", "image": "app:v1"}]
            }
        }),
        json!([{"reason": "ImagePullBackOff", "message": "Back-off pulling image"}]),
    );
    let explanation = explain(&snapshot);

    let root = explanation.root_cause.as_ref().expect("root cause");
    let first_object_state = root
        .evidence
        .iter()
        .position(|e| e.source == EvidenceSource::ObjectState);
    let first_event = root
        .evidence
        .iter()
        .position(|e| e.source == EvidenceSource::Event);
    if let (Some(object_state), Some(event)) = (first_object_state, first_event) {
        assert!(object_state < event, "ObjectState must precede Event");
    } else {
        panic!("expected both ObjectState and Event evidence on the root cause");
    }
}

#[test]
fn suppressed_rules_do_not_surface_as_causes() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "db-0"},
            "status": {"phase": "Running", "containerStatuses": [{
                "name": "main", "restartCount": 6,
                "state": {"waiting": {"reason": "CrashLoopBackOff"}}
            }]},
            "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
        }),
        json!([{"reason": "BackOff", "lastTimestamp": "2024-05-01T10:05:00Z"}]),
    )
    .with_pvc(json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}}));
    let explanation = explain(&snapshot);

    let root = root_kind(&explanation).expect("a root cause");
    for suppressed in &explanation.suppressed_rules {
        assert_ne!(suppressed.name, root);
        assert!(
            !explanation
                .causal_chain
                .causes
                .iter()
                .any(|c| c.kind == suppressed.name),
            "suppressed rule {} appears among causes",
            suppressed.name
        );
    }
}

#[test]
fn adding_declared_optional_objects_never_lowers_confidence() {
    let pod = json!({
        "metadata": {"name": "db-0"},
        "status": {"phase": "Pending"},
        "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
    });
    let events = json!([{"reason": "Scheduled", "lastTimestamp": "2024-05-01T10:00:00Z"}]);
    let pvc = json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}});

    // PVCNotBound declares pv and storageclass optional
    let base = Snapshot::new(pod.clone(), events.clone()).with_pvc(pvc.clone());
    let enriched = Snapshot::new(pod, events)
        .with_pvc(pvc)
        .with_pv(json!({"kind": "List", "items": []}))
        .with_storageclass(json!({"kind": "List", "items": []}));

    let before = explain(&base);
    let after = explain(&enriched);
    assert_eq!(root_kind(&before), Some("PVCNotBound"));
    assert_eq!(root_kind(&after), Some("PVCNotBound"));
    assert!(
        after.confidence >= before.confidence,
        "confidence dropped from {} to {}",
        before.confidence,
        after.confidence
    );
}

#[test]
fn compound_rules_shadow_their_atomics() {
    // the pull-secret compound blocks both atomic image rules
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "web-0"},
            "status": {"phase": "Pending", "containerStatuses": [{
                "name": "main",
                "state": {"waiting": {"reason": "ImagePullBackOff"}}
            }]}
        }),
        json!([
            {"reason": "Failed", "message": "pull access denied"},
            {"reason": "ImagePullBackOff", "message": "Back-off pulling image"}
        ]),
    );
    let explanation = explain(&snapshot);

    let root = root_kind(&explanation).expect("a root cause");
    assert_eq!(root, "ImagePullSecretMissing");
    for blocked in ["ImagePullBackOff", "ErrImagePull"] {
        assert_ne!(root, blocked);
        assert!(!explanation
            .causal_chain
            .causes
            .iter()
            .any(|c| c.kind == blocked));
    }
}

// ---------------------------------------------------------------------------
// Boundary behaviors
// ---------------------------------------------------------------------------

#[test]
fn pod_with_no_containers_is_handled() {
    let snapshot = Snapshot::new(
        json!({"metadata": {"name": "bare"}, "status": {"phase": "Pending"}}),
        json!([{"reason": "FailedScheduling", "message": "no nodes available to schedule pods"}]),
    );
    let explanation = explain(&snapshot);
    assert_eq!(root_kind(&explanation), Some("NoNodesAvailable"));
}

#[test]
fn duplicate_events_accumulate_via_count() {
    let snapshot = Snapshot::new(
        json!({"metadata": {"name": "web-0"}, "status": {"phase": "Pending"}}),
        json!([{"reason": "FailedScheduling", "count": 4,
                "message": "1 node(s) had untolerated taint",
                "lastTimestamp": "2024-05-01T10:00:00Z"}]),
    );
    let explanation = explain(&snapshot);
    // four occurrences in one record also satisfy the flapping rule
    let trace_has_flapping = explanation
        .suppressed_rules
        .iter()
        .any(|s| s.name == "SchedulingFlapping")
        || root_kind(&explanation) == Some("SchedulingFlapping")
        || explanation
            .causal_chain
            .contributing
            .iter()
            .any(|c| c.kind == "SchedulingFlapping");
    assert!(trace_has_flapping || root_kind(&explanation) == Some("UnschedulableTaint"));
}

#[test]
fn events_without_timestamps_keep_input_order() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "db-0"},
            "status": {"phase": "Running", "containerStatuses": [{
                "name": "main", "restartCount": 6,
                "state": {"waiting": {"reason": "CrashLoopBackOff"}}
            }]},
            "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
        }),
        json!([
            {"reason": "FailedMount", "message": "unable to attach or mount volumes"},
            {"reason": "BackOff", "message": "Back-off restarting failed container"}
        ]),
    )
    .with_pvc(json!({"metadata": {"name": "data-pvc"}, "status": {"phase": "Pending"}}));
    let explanation = explain(&snapshot);
    // order is preserved, so the volume-then-crashloop story still reads
    assert_eq!(root_kind(&explanation), Some("PVCPendingThenCrashloop"));
}

#[test]
fn pvc_present_but_pv_absent_is_diagnosable() {
    let snapshot = Snapshot::new(
        json!({
            "metadata": {"name": "db-0"},
            "status": {"phase": "Pending"},
            "spec": {"volumes": [{"name": "d", "persistentVolumeClaim": {"claimName": "data-pvc"}}]}
        }),
        json!([{"reason": "FailedScheduling",
                "message": "pod has unbound immediate PersistentVolumeClaims"}]),
    )
    .with_pvc(json!({
        "metadata": {"name": "data-pvc"},
        "spec": {"volumeName": "pv-9"},
        "status": {"phase": "Lost"}
    }))
    .with_pv(json!({"kind": "List", "items": []}));
    let explanation = explain(&snapshot);
    let kinds: Vec<&str> = explanation
        .causal_chain
        .causes
        .iter()
        .chain(explanation.causal_chain.contributing.iter())
        .map(|c| c.kind.as_str())
        .collect();
    assert!(kinds.contains(&"PVUnavailable") || kinds.contains(&"PVCNotBound"));
}
