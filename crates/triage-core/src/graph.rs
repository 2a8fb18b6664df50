//! The object graph and context normalizer.
//!
//! Raw JSON-shaped cluster objects come in as a [`Snapshot`]; the normalizer
//! converts them into a typed [`ObjectGraph`] plus a
//! [`Timeline`](crate::timeline::Timeline). The graph is acyclic at the
//! reference level (pod → owner, pod → node, pod volumes → PVC → PV →
//! StorageClass); cross-object references are resolved by name lookup, never
//! shared mutable references.

use crate::error::{Result, TriageError};
use crate::timeline::Timeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// The raw input snapshot: one required pod, required events, and optional
/// related objects, all as undecoded JSON values.
///
/// Field semantics mirror the Kubernetes API object shapes; unknown extra
/// keys are ignored during normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// The subject workload (required).
    pub pod: Value,
    /// Raw event records: a bare array, a `List` object, or a single event.
    pub events: Value,
    /// PersistentVolumeClaim(s): single object or keyed collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc: Option<Value>,
    /// PersistentVolume(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<Value>,
    /// StorageClass(es).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storageclass: Option<Value>,
    /// The node the pod is (or should be) scheduled on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Value>,
    /// Owning controller (ReplicaSet, Deployment, or StatefulSet).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Value>,
    /// The pod's service account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serviceaccount: Option<Value>,
    /// Referenced secrets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Value>,
    /// Referenced config maps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configmaps: Option<Value>,
}

impl Snapshot {
    /// Creates a snapshot from the two required inputs.
    #[must_use]
    pub fn new(pod: Value, events: Value) -> Self {
        Self {
            pod,
            events,
            ..Self::default()
        }
    }

    /// Builds a snapshot from a single combined JSON document with the
    /// named slots of §external-interface, ignoring unknown keys.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(TriageError::InputInvalid(
                "snapshot must be a JSON object".to_string(),
            ));
        };
        let pod = map
            .remove("pod")
            .ok_or_else(|| TriageError::InputInvalid("snapshot has no 'pod' slot".to_string()))?;
        let events = map.remove("events").unwrap_or(Value::Array(Vec::new()));
        Ok(Self {
            pod,
            events,
            pvc: map.remove("pvc"),
            pv: map.remove("pv"),
            storageclass: map.remove("storageclass"),
            node: map.remove("node"),
            owner: map.remove("owner"),
            serviceaccount: map.remove("serviceaccount"),
            secrets: map.remove("secrets"),
            configmaps: map.remove("configmaps"),
        })
    }

    /// Sets the PVC slot.
    #[must_use]
    pub fn with_pvc(mut self, pvc: Value) -> Self {
        self.pvc = Some(pvc);
        self
    }

    /// Sets the PV slot.
    #[must_use]
    pub fn with_pv(mut self, pv: Value) -> Self {
        self.pv = Some(pv);
        self
    }

    /// Sets the StorageClass slot.
    #[must_use]
    pub fn with_storageclass(mut self, storageclass: Value) -> Self {
        self.storageclass = Some(storageclass);
        self
    }

    /// Sets the node slot.
    #[must_use]
    pub fn with_node(mut self, node: Value) -> Self {
        self.node = Some(node);
        self
    }

    /// Sets the owner slot.
    #[must_use]
    pub fn with_owner(mut self, owner: Value) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the service account slot.
    #[must_use]
    pub fn with_serviceaccount(mut self, serviceaccount: Value) -> Self {
        self.serviceaccount = Some(serviceaccount);
        self
    }

    /// Sets the secrets slot.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Value) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Sets the config maps slot.
    #[must_use]
    pub fn with_configmaps(mut self, configmaps: Value) -> Self {
        self.configmaps = Some(configmaps);
        self
    }

    /// Deterministic SHA-256 over the canonical serialization of the
    /// snapshot. `serde_json` maps are key-ordered, so identical inputs
    /// always hash identically.
    #[must_use]
    pub fn inputs_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Kinds of objects the graph can hold; rules declare requirements against
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// The subject pod (always present in a valid graph).
    Pod,
    /// The normalized event timeline (always present, possibly empty).
    Events,
    /// PersistentVolumeClaims.
    Pvc,
    /// PersistentVolumes.
    Pv,
    /// StorageClasses.
    StorageClass,
    /// The node.
    Node,
    /// The owning controller.
    Owner,
    /// The pod's service account.
    ServiceAccount,
    /// Referenced secrets.
    Secrets,
    /// Referenced config maps.
    ConfigMaps,
}

impl ObjectKind {
    /// Parses an object kind from its case-insensitive slot name.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "pod" => Some(Self::Pod),
            "events" => Some(Self::Events),
            "pvc" => Some(Self::Pvc),
            "pv" => Some(Self::Pv),
            "storageclass" => Some(Self::StorageClass),
            "node" => Some(Self::Node),
            "owner" => Some(Self::Owner),
            "serviceaccount" => Some(Self::ServiceAccount),
            "secrets" => Some(Self::Secrets),
            "configmaps" => Some(Self::ConfigMaps),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pod => "pod",
            Self::Events => "events",
            Self::Pvc => "pvc",
            Self::Pv => "pv",
            Self::StorageClass => "storageclass",
            Self::Node => "node",
            Self::Owner => "owner",
            Self::ServiceAccount => "serviceaccount",
            Self::Secrets => "secrets",
            Self::ConfigMaps => "configmaps",
        };
        write!(f, "{name}")
    }
}

/// A pod condition entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    /// Condition type, e.g. `Ready` or `PodScheduled`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status: `True`, `False`, or `Unknown`.
    pub status: String,
    /// Machine-readable reason, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Free-form message, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The slice of a container spec the engine consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Memory limit string, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    /// Whether a liveness probe is configured.
    pub has_liveness_probe: bool,
    /// Whether a readiness probe is configured.
    pub has_readiness_probe: bool,
    /// Whether a startup probe is configured.
    pub has_startup_probe: bool,
}

/// A pod volume and what it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    /// Volume name within the pod spec.
    pub name: String,
    /// PVC claim name, for `persistentVolumeClaim` volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,
    /// ConfigMap name, for `configMap` volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
    /// Secret name, for `secret` volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A container status entry with the restart and termination facts rules
/// look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Container name.
    pub name: String,
    /// Readiness flag.
    pub ready: bool,
    /// Observed restart count.
    pub restart_count: i64,
    /// Reason of the current waiting state, when waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_reason: Option<String>,
    /// Message of the current waiting state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_message: Option<String>,
    /// Reason of the current terminated state, when terminated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_reason: Option<String>,
    /// Exit code of the current terminated state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_exit_code: Option<i64>,
    /// Reason of the last termination, when one occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_terminated_reason: Option<String>,
    /// Exit code of the last termination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exit_code: Option<i64>,
}

/// An owner reference as recorded on the pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner kind, e.g. `ReplicaSet`.
    pub kind: String,
    /// Owner name.
    pub name: String,
}

/// The normalized subject pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    /// Pod name.
    pub name: String,
    /// Namespace, defaulting to `default`.
    pub namespace: String,
    /// Lifecycle phase (`Pending`, `Running`, ... or `Unknown`).
    pub phase: String,
    /// Status-level reason, e.g. `Evicted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Status-level message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Pod conditions.
    pub conditions: Vec<PodCondition>,
    /// Container statuses.
    pub container_statuses: Vec<ContainerStatus>,
    /// Owner references.
    pub owner_references: Vec<OwnerRef>,
    /// Node the pod is bound to, when scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Containers declared in the spec.
    pub containers: Vec<ContainerSpec>,
    /// Volumes declared in the spec.
    pub volumes: Vec<VolumeRef>,
    /// Names listed under `spec.imagePullSecrets`.
    pub image_pull_secrets: Vec<String>,
    /// Node selector labels.
    pub node_selector: BTreeMap<String, String>,
    /// Whether the spec declares affinity rules.
    pub has_affinity: bool,
    /// Number of tolerations on the spec.
    pub tolerations: usize,
    /// Pod priority, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Service account name, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

impl Pod {
    /// Looks up a pod condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&PodCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// True when the `Ready` condition is `True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.condition("Ready").is_some_and(|c| c.status == "True")
    }

    /// Container statuses currently waiting with the given reason.
    #[must_use]
    pub fn containers_waiting_with(&self, reason: &str) -> Vec<&ContainerStatus> {
        self.container_statuses
            .iter()
            .filter(|cs| cs.waiting_reason.as_deref() == Some(reason))
            .collect()
    }

    /// Container statuses whose last termination had the given reason.
    #[must_use]
    pub fn containers_last_terminated_with(&self, reason: &str) -> Vec<&ContainerStatus> {
        self.container_statuses
            .iter()
            .filter(|cs| cs.last_terminated_reason.as_deref() == Some(reason))
            .collect()
    }

    /// True when any container is waiting or has a recorded termination.
    #[must_use]
    pub fn has_stuck_container(&self) -> bool {
        self.container_statuses.iter().any(|cs| {
            cs.waiting_reason.is_some()
                || cs.terminated_reason.is_some()
                || cs.last_terminated_reason.is_some()
        })
    }

    /// Highest restart count across containers.
    #[must_use]
    pub fn max_restart_count(&self) -> i64 {
        self.container_statuses
            .iter()
            .map(|cs| cs.restart_count)
            .max()
            .unwrap_or(0)
    }

    /// The container spec entry for the given container name.
    #[must_use]
    pub fn container_spec(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// A normalized PersistentVolumeClaim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pvc {
    /// Claim name.
    pub name: String,
    /// Claim phase (`Pending`, `Bound`, `Lost`, or `Unknown`).
    pub phase: String,
    /// Bound volume name, when bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    /// Requested storage class, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// A normalized PersistentVolume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pv {
    /// Volume name.
    pub name: String,
    /// Volume phase (`Available`, `Bound`, `Released`, `Failed`).
    pub phase: String,
    /// Storage class, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// A normalized StorageClass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClass {
    /// Class name.
    pub name: String,
    /// Provisioner, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<String>,
}

/// A node taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint effect, e.g. `NoSchedule`.
    pub effect: String,
}

/// A structured node condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    /// Condition type, e.g. `DiskPressure`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status.
    pub status: String,
    /// Machine-readable reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Last transition time, when parseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// The normalized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node name.
    pub name: String,
    /// Whether the node is cordoned.
    pub unschedulable: bool,
    /// Node taints.
    pub taints: Vec<Taint>,
    /// Node conditions.
    pub conditions: Vec<NodeCondition>,
}

impl Node {
    /// Looks up a node condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&NodeCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// True when the named condition has status `True`.
    #[must_use]
    pub fn has_condition(&self, condition_type: &str) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == "True")
    }

    /// True when the `Ready` condition is anything other than `True`.
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        self.condition("Ready").is_some_and(|c| c.status != "True")
    }
}

/// A condition on the owning controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCondition {
    /// Condition type, e.g. `Progressing`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status.
    pub status: String,
    /// Machine-readable reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Free-form message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The normalized owning controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// Controller kind: `ReplicaSet`, `Deployment`, or `StatefulSet`.
    pub kind: String,
    /// Controller name.
    pub name: String,
    /// Desired replica count, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
    /// Ready replica count, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i64>,
    /// Controller conditions.
    pub conditions: Vec<OwnerCondition>,
}

impl Owner {
    /// Looks up an owner condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&OwnerCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// The normalized service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    /// Service account name.
    pub name: String,
    /// Pull secrets attached to the account.
    pub image_pull_secrets: Vec<String>,
}

/// A referenced secret, by name and type only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Secret name.
    pub name: String,
    /// Secret type, e.g. `kubernetes.io/dockerconfigjson`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
}

/// A referenced config map, by name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMapRef {
    /// Config map name.
    pub name: String,
}

/// The normalized in-memory representation of the pod and its related
/// objects.
///
/// A missing optional object (`None`) is distinguishable from a
/// present-but-empty collection (`Some` of an empty map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGraph {
    /// The subject pod.
    pub pod: Pod,
    /// PVCs keyed by name, when the slot was provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvcs: Option<BTreeMap<String, Pvc>>,
    /// PVs keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvs: Option<BTreeMap<String, Pv>>,
    /// StorageClasses keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_classes: Option<BTreeMap<String, StorageClass>>,
    /// The node, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    /// The owning controller, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    /// The service account, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccount>,
    /// Secrets keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<BTreeMap<String, SecretRef>>,
    /// Config maps keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_maps: Option<BTreeMap<String, ConfigMapRef>>,
    /// Conditions derived from `node.status.conditions`.
    pub node_conditions: Vec<NodeCondition>,
    /// Canonical hash of the raw inputs.
    pub inputs_hash: String,
}

impl ObjectGraph {
    /// Whether an object kind is present in the graph.
    #[must_use]
    pub fn has(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Pod | ObjectKind::Events => true,
            ObjectKind::Pvc => self.pvcs.is_some(),
            ObjectKind::Pv => self.pvs.is_some(),
            ObjectKind::StorageClass => self.storage_classes.is_some(),
            ObjectKind::Node => self.node.is_some(),
            ObjectKind::Owner => self.owner.is_some(),
            ObjectKind::ServiceAccount => self.service_account.is_some(),
            ObjectKind::Secrets => self.secrets.is_some(),
            ObjectKind::ConfigMaps => self.config_maps.is_some(),
        }
    }

    /// Looks up a PVC by name.
    #[must_use]
    pub fn pvc(&self, name: &str) -> Option<&Pvc> {
        self.pvcs.as_ref().and_then(|m| m.get(name))
    }

    /// Claim names referenced by the pod's volumes, in spec order.
    #[must_use]
    pub fn claimed_pvc_names(&self) -> Vec<&str> {
        self.pod
            .volumes
            .iter()
            .filter_map(|v| v.claim_name.as_deref())
            .collect()
    }

    /// PVCs referenced by the pod's volumes, in spec order.
    #[must_use]
    pub fn claimed_pvcs(&self) -> Vec<&Pvc> {
        self.claimed_pvc_names()
            .into_iter()
            .filter_map(|name| self.pvc(name))
            .collect()
    }

    /// Resolves a PVC's bound volume to its PV.
    #[must_use]
    pub fn pv_for_pvc(&self, pvc: &Pvc) -> Option<&Pv> {
        let volume_name = pvc.volume_name.as_deref()?;
        self.pvs.as_ref().and_then(|m| m.get(volume_name))
    }

    /// Resolves a PV's storage class.
    #[must_use]
    pub fn storage_class_for_pv(&self, pv: &Pv) -> Option<&StorageClass> {
        let class = pv.storage_class.as_deref()?;
        self.storage_classes.as_ref().and_then(|m| m.get(class))
    }

    /// Resolves a PVC's requested storage class.
    #[must_use]
    pub fn storage_class_for_pvc(&self, pvc: &Pvc) -> Option<&StorageClass> {
        let class = pvc.storage_class.as_deref()?;
        self.storage_classes.as_ref().and_then(|m| m.get(class))
    }
}

/// Normalizes a raw snapshot into the object graph and event timeline.
///
/// # Errors
///
/// Returns [`TriageError::InputInvalid`] when the pod is absent or
/// structurally malformed. Optional objects that fail to parse are dropped
/// rather than failing the invocation.
pub fn normalize(snapshot: &Snapshot) -> Result<(ObjectGraph, Timeline)> {
    let pod = parse_pod(&snapshot.pod)?;
    let timeline = Timeline::from_raw(&snapshot.events);

    let node = snapshot.node.as_ref().and_then(parse_node);
    let node_conditions = node.as_ref().map(|n| n.conditions.clone()).unwrap_or_default();

    let graph = ObjectGraph {
        pod,
        pvcs: snapshot
            .pvc
            .as_ref()
            .map(|v| keyed_collection(v, parse_pvc)),
        pvs: snapshot.pv.as_ref().map(|v| keyed_collection(v, parse_pv)),
        storage_classes: snapshot
            .storageclass
            .as_ref()
            .map(|v| keyed_collection(v, parse_storage_class)),
        node,
        owner: snapshot.owner.as_ref().and_then(parse_owner),
        service_account: snapshot
            .serviceaccount
            .as_ref()
            .and_then(parse_service_account),
        secrets: snapshot
            .secrets
            .as_ref()
            .map(|v| keyed_collection(v, parse_secret)),
        config_maps: snapshot
            .configmaps
            .as_ref()
            .map(|v| keyed_collection(v, parse_config_map)),
        node_conditions,
        inputs_hash: snapshot.inputs_hash(),
    };

    Ok((graph, timeline))
}

// ---------------------------------------------------------------------------
// JSON navigation helpers
// ---------------------------------------------------------------------------

fn walk<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    walk(value, path)?.as_str().map(ToString::to_string)
}

fn i64_at(value: &Value, path: &[&str]) -> Option<i64> {
    walk(value, path)?.as_i64()
}

fn bool_at(value: &Value, path: &[&str]) -> bool {
    walk(value, path).and_then(Value::as_bool).unwrap_or(false)
}

fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    walk(value, path)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Accepts a single object, a bare array, or a `List` object and returns the
/// contained items.
pub(crate) fn collection_items(value: &Value) -> Vec<&Value> {
    if let Some(items) = value.as_array() {
        return items.iter().collect();
    }
    if value.get("kind").and_then(Value::as_str) == Some("List") {
        return array_at(value, &["items"]).iter().collect();
    }
    if value.is_object() {
        return vec![value];
    }
    Vec::new()
}

fn keyed_collection<T, F>(value: &Value, parse: F) -> BTreeMap<String, T>
where
    F: Fn(&Value) -> Option<T>,
{
    let mut map = BTreeMap::new();
    for item in collection_items(value) {
        if let (Some(name), Some(parsed)) = (str_at(item, &["metadata", "name"]), parse(item)) {
            map.insert(name, parsed);
        }
    }
    map
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Object parsers
// ---------------------------------------------------------------------------

fn parse_pod(value: &Value) -> Result<Pod> {
    if !value.is_object() {
        return Err(TriageError::InputInvalid(
            "pod must be a JSON object".to_string(),
        ));
    }
    let name = str_at(value, &["metadata", "name"]).ok_or_else(|| {
        TriageError::InputInvalid("pod has no metadata.name".to_string())
    })?;

    let conditions = array_at(value, &["status", "conditions"])
        .iter()
        .filter_map(|c| {
            Some(PodCondition {
                condition_type: str_at(c, &["type"])?,
                status: str_at(c, &["status"]).unwrap_or_else(|| "Unknown".to_string()),
                reason: str_at(c, &["reason"]),
                message: str_at(c, &["message"]),
            })
        })
        .collect();

    let container_statuses = array_at(value, &["status", "containerStatuses"])
        .iter()
        .map(|cs| ContainerStatus {
            name: str_at(cs, &["name"]).unwrap_or_default(),
            ready: bool_at(cs, &["ready"]),
            restart_count: i64_at(cs, &["restartCount"]).unwrap_or(0),
            waiting_reason: str_at(cs, &["state", "waiting", "reason"]),
            waiting_message: str_at(cs, &["state", "waiting", "message"]),
            terminated_reason: str_at(cs, &["state", "terminated", "reason"]),
            terminated_exit_code: i64_at(cs, &["state", "terminated", "exitCode"]),
            last_terminated_reason: str_at(cs, &["lastState", "terminated", "reason"]),
            last_exit_code: i64_at(cs, &["lastState", "terminated", "exitCode"]),
        })
        .collect();

    let owner_references = array_at(value, &["metadata", "ownerReferences"])
        .iter()
        .filter_map(|o| {
            Some(OwnerRef {
                kind: str_at(o, &["kind"])?,
                name: str_at(o, &["name"])?,
            })
        })
        .collect();

    let containers = array_at(value, &["spec", "containers"])
        .iter()
        .map(|c| ContainerSpec {
            name: str_at(c, &["name"]).unwrap_or_default(),
            image: str_at(c, &["image"]).unwrap_or_default(),
            memory_limit: str_at(c, &["resources", "limits", "memory"]),
            has_liveness_probe: walk(c, &["livenessProbe"]).is_some(),
            has_readiness_probe: walk(c, &["readinessProbe"]).is_some(),
            has_startup_probe: walk(c, &["startupProbe"]).is_some(),
        })
        .collect();

    let volumes = array_at(value, &["spec", "volumes"])
        .iter()
        .filter_map(|v| {
            Some(VolumeRef {
                name: str_at(v, &["name"])?,
                claim_name: str_at(v, &["persistentVolumeClaim", "claimName"]),
                config_map: str_at(v, &["configMap", "name"]),
                secret: str_at(v, &["secret", "secretName"]),
            })
        })
        .collect();

    let image_pull_secrets = array_at(value, &["spec", "imagePullSecrets"])
        .iter()
        .filter_map(|s| str_at(s, &["name"]))
        .collect();

    let node_selector = walk(value, &["spec", "nodeSelector"])
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(Pod {
        name,
        namespace: str_at(value, &["metadata", "namespace"])
            .unwrap_or_else(|| "default".to_string()),
        phase: str_at(value, &["status", "phase"]).unwrap_or_else(|| "Unknown".to_string()),
        reason: str_at(value, &["status", "reason"]),
        message: str_at(value, &["status", "message"]),
        conditions,
        container_statuses,
        owner_references,
        node_name: str_at(value, &["spec", "nodeName"]),
        containers,
        volumes,
        image_pull_secrets,
        node_selector,
        has_affinity: walk(value, &["spec", "affinity"]).is_some(),
        tolerations: array_at(value, &["spec", "tolerations"]).len(),
        priority: i64_at(value, &["spec", "priority"]),
        service_account: str_at(value, &["spec", "serviceAccountName"]),
    })
}

fn parse_pvc(value: &Value) -> Option<Pvc> {
    Some(Pvc {
        name: str_at(value, &["metadata", "name"])?,
        phase: str_at(value, &["status", "phase"]).unwrap_or_else(|| "Unknown".to_string()),
        volume_name: str_at(value, &["spec", "volumeName"]),
        storage_class: str_at(value, &["spec", "storageClassName"]),
    })
}

fn parse_pv(value: &Value) -> Option<Pv> {
    Some(Pv {
        name: str_at(value, &["metadata", "name"])?,
        phase: str_at(value, &["status", "phase"]).unwrap_or_else(|| "Unknown".to_string()),
        storage_class: str_at(value, &["spec", "storageClassName"]),
    })
}

fn parse_storage_class(value: &Value) -> Option<StorageClass> {
    Some(StorageClass {
        name: str_at(value, &["metadata", "name"])?,
        provisioner: str_at(value, &["provisioner"]),
    })
}

fn parse_node(value: &Value) -> Option<Node> {
    let name = str_at(value, &["metadata", "name"])?;
    let taints = array_at(value, &["spec", "taints"])
        .iter()
        .filter_map(|t| {
            Some(Taint {
                key: str_at(t, &["key"])?,
                effect: str_at(t, &["effect"]).unwrap_or_default(),
            })
        })
        .collect();
    let conditions = array_at(value, &["status", "conditions"])
        .iter()
        .filter_map(|c| {
            Some(NodeCondition {
                condition_type: str_at(c, &["type"])?,
                status: str_at(c, &["status"]).unwrap_or_else(|| "Unknown".to_string()),
                reason: str_at(c, &["reason"]),
                last_transition_time: parse_timestamp(walk(c, &["lastTransitionTime"])),
            })
        })
        .collect();
    Some(Node {
        name,
        unschedulable: bool_at(value, &["spec", "unschedulable"]),
        taints,
        conditions,
    })
}

fn parse_owner(value: &Value) -> Option<Owner> {
    let name = str_at(value, &["metadata", "name"])?;
    let conditions = array_at(value, &["status", "conditions"])
        .iter()
        .filter_map(|c| {
            Some(OwnerCondition {
                condition_type: str_at(c, &["type"])?,
                status: str_at(c, &["status"]).unwrap_or_else(|| "Unknown".to_string()),
                reason: str_at(c, &["reason"]),
                message: str_at(c, &["message"]),
            })
        })
        .collect();
    Some(Owner {
        kind: str_at(value, &["kind"]).unwrap_or_else(|| "ReplicaSet".to_string()),
        name,
        replicas: i64_at(value, &["spec", "replicas"]),
        ready_replicas: i64_at(value, &["status", "readyReplicas"]),
        conditions,
    })
}

fn parse_service_account(value: &Value) -> Option<ServiceAccount> {
    Some(ServiceAccount {
        name: str_at(value, &["metadata", "name"])?,
        image_pull_secrets: array_at(value, &["imagePullSecrets"])
            .iter()
            .filter_map(|s| str_at(s, &["name"]))
            .collect(),
    })
}

fn parse_secret(value: &Value) -> Option<SecretRef> {
    Some(SecretRef {
        name: str_at(value, &["metadata", "name"])?,
        secret_type: str_at(value, &["type"]),
    })
}

fn parse_config_map(value: &Value) -> Option<ConfigMapRef> {
    Some(ConfigMapRef {
        name: str_at(value, &["metadata", "name"])?,
    })
}
