//! The normalized event timeline and its temporal query surface.
//!
//! Raw Kubernetes events are classified into semantic kinds and phases by a
//! fixed reason table, ordered by `lastSeen` ascending (ties keep input
//! order), and wrapped in a [`Timeline`] exposing composable queries. The
//! higher-order temporal detectors at the bottom of this module are built
//! purely from those queries.

use crate::graph::{collection_items, Pod};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Semantic class of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventKind {
    /// Pod placement events.
    Scheduling,
    /// Image resolution and pull events.
    Image,
    /// Volume attach, mount, and provisioning events.
    Volume,
    /// Probe events.
    Probe,
    /// Sandbox and CNI events.
    Network,
    /// Config, validation, and policy events.
    Admission,
    /// Container lifecycle events.
    Lifecycle,
    /// Node readiness and eviction events.
    NodePressure,
    /// Controller events.
    Owner,
    /// Anything the table does not recognize.
    Generic,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scheduling => "Scheduling",
            Self::Image => "Image",
            Self::Volume => "Volume",
            Self::Probe => "Probe",
            Self::Network => "Network",
            Self::Admission => "Admission",
            Self::Lifecycle => "Lifecycle",
            Self::NodePressure => "NodePressure",
            Self::Owner => "Owner",
            Self::Generic => "Generic",
        };
        write!(f, "{name}")
    }
}

/// Severity phase of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventPhase {
    /// Informational signal.
    Info,
    /// Something degraded but not conclusively failing.
    Warning,
    /// A failure signal.
    Failure,
}

/// Classifies a raw Kubernetes event reason into `(kind, phase)`.
///
/// The table is part of the system contract; unknown reasons map to
/// `Generic/Warning` with the literal reason preserved on the event.
#[must_use]
pub fn classify_reason(reason: &str) -> (EventKind, EventPhase) {
    use EventKind as K;
    use EventPhase as P;
    match reason {
        // scheduling
        "FailedScheduling" | "Unschedulable" | "SchedulerError" | "Preempted" => {
            (K::Scheduling, P::Failure)
        }
        "NotTriggerScaleUp" => (K::Scheduling, P::Warning),
        "Scheduled" | "TriggeredScaleUp" => (K::Scheduling, P::Info),
        // volumes
        "FailedMount" | "FailedAttachVolume" | "FailedMapVolume" | "FailedBinding"
        | "ProvisioningFailed" | "VolumeResizeFailed" => (K::Volume, P::Failure),
        "WaitForFirstConsumer" => (K::Volume, P::Warning),
        "ProvisioningSucceeded" | "SuccessfulAttachVolume" => (K::Volume, P::Info),
        // images
        "Failed" | "ErrImagePull" | "ImagePullBackOff" | "ErrImageNeverPull"
        | "InvalidImageName" | "BackOffPullImage" => (K::Image, P::Failure),
        "Pulling" | "Pulled" => (K::Image, P::Info),
        // probes
        "Unhealthy" => (K::Probe, P::Failure),
        "ProbeWarning" => (K::Probe, P::Warning),
        // lifecycle
        "BackOff" | "CrashLoopBackOff" | "OOMKilled" | "FailedPostStartHook"
        | "FailedPreStopHook" | "ExceededGracePeriod" | "FailedKillPod"
        | "CreateContainerError" | "RunContainerError" | "ContainerCannotRun" => {
            (K::Lifecycle, P::Failure)
        }
        "Killing" => (K::Lifecycle, P::Warning),
        "Created" | "Started" => (K::Lifecycle, P::Info),
        // admission & config
        "CreateContainerConfigError" | "FailedValidation" | "PolicyViolation" | "Forbidden" => {
            (K::Admission, P::Failure)
        }
        // networking
        "FailedCreatePodSandBox" | "NetworkNotReady" => (K::Network, P::Failure),
        "SandboxChanged" | "DNSConfigForming" => (K::Network, P::Warning),
        // node pressure
        "Evicted" | "NodeNotReady" | "NodeShutdown" | "TaintManagerEviction" => {
            (K::NodePressure, P::Failure)
        }
        "NodeNotSchedulable" | "EvictionThresholdMet" | "FreeDiskSpaceFailed"
        | "ImageGCFailed" | "Rebooted" => (K::NodePressure, P::Warning),
        "NodeSchedulable" | "NodeReady" => (K::NodePressure, P::Info),
        // owners
        "FailedCreate" | "FailedDelete" | "ProgressDeadlineExceeded" => (K::Owner, P::Failure),
        "SuccessfulCreate" | "SuccessfulDelete" | "ScalingReplicaSet" => (K::Owner, P::Info),
        _ => (K::Generic, P::Warning),
    }
}

/// A raw event after classification and timestamp normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Semantic kind from the classification table.
    pub kind: EventKind,
    /// Severity phase from the classification table.
    pub phase: EventPhase,
    /// The raw Kubernetes reason string, preserved verbatim.
    pub reason: String,
    /// Event message.
    pub message: String,
    /// Reporting component.
    pub source: String,
    /// First occurrence; the Unix epoch when the record had no timestamp.
    pub first_seen: DateTime<Utc>,
    /// Last occurrence; the Unix epoch when the record had no timestamp.
    pub last_seen: DateTime<Utc>,
    /// Occurrence count (at least 1).
    pub count: u32,
    /// Name of the object the event is about.
    pub involved_object: String,
}

impl NormalizedEvent {
    /// True when the record carried a usable timestamp.
    #[must_use]
    pub fn has_timestamp(&self) -> bool {
        self.last_seen != DateTime::<Utc>::UNIX_EPOCH
    }
}

/// A composable predicate over normalized events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPredicate {
    /// Required kind, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
    /// Required phase, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<EventPhase>,
    /// Required exact reason, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Required message substring (case-insensitive), when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_contains: Option<String>,
}

impl EventPredicate {
    /// A predicate matching any event.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// A predicate over an event kind.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A predicate over an exact reason string.
    #[must_use]
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Restricts the predicate to a phase.
    #[must_use]
    pub fn with_phase(mut self, phase: EventPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Restricts the predicate to an exact reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Restricts the predicate to messages containing the given text,
    /// case-insensitively.
    #[must_use]
    pub fn with_message(mut self, needle: impl Into<String>) -> Self {
        self.message_contains = Some(needle.into());
        self
    }

    /// Evaluates the predicate against one event.
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        if self.kind.is_some_and(|k| k != event.kind) {
            return false;
        }
        if self.phase.is_some_and(|p| p != event.phase) {
            return false;
        }
        if self
            .reason
            .as_deref()
            .is_some_and(|r| r != event.reason)
        {
            return false;
        }
        if let Some(needle) = self.message_contains.as_deref() {
            if !event
                .message
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// The ordered, semantically tagged view over normalized events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<NormalizedEvent>,
}

impl Timeline {
    /// Normalizes a raw events value: a bare array, a Kubernetes `List`
    /// object, or a single event object. Records without a reason are kept
    /// with an empty reason and classify as `Generic`.
    #[must_use]
    pub fn from_raw(events: &Value) -> Self {
        let mut normalized: Vec<NormalizedEvent> = collection_items(events)
            .into_iter()
            .map(normalize_event)
            .collect();
        // stable: ties keep input order, timestamp-less records sort first
        normalized.sort_by_key(|e| e.last_seen);
        Self { events: normalized }
    }

    /// Builds a timeline directly from normalized events (test support and
    /// re-normalization).
    #[must_use]
    pub fn from_events(mut events: Vec<NormalizedEvent>) -> Self {
        events.sort_by_key(|e| e.last_seen);
        Self { events }
    }

    /// All events in timeline order.
    #[must_use]
    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    /// Number of event records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no events were provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events matching a predicate, in order.
    pub fn matching<'a>(
        &'a self,
        predicate: &'a EventPredicate,
    ) -> impl Iterator<Item = &'a NormalizedEvent> {
        self.events.iter().filter(move |e| predicate.matches(e))
    }

    /// True when any event matches.
    #[must_use]
    pub fn has(&self, predicate: &EventPredicate) -> bool {
        self.matching(predicate).next().is_some()
    }

    /// True when any event carries the exact reason.
    #[must_use]
    pub fn has_reason(&self, reason: &str) -> bool {
        self.has(&EventPredicate::reason(reason))
    }

    /// Number of event records matching.
    #[must_use]
    pub fn count(&self, predicate: &EventPredicate) -> usize {
        self.matching(predicate).count()
    }

    /// Total occurrences matching, honoring per-record `count` fields.
    #[must_use]
    pub fn occurrences(&self, predicate: &EventPredicate) -> u32 {
        self.matching(predicate).map(|e| e.count).sum()
    }

    /// First matching event.
    #[must_use]
    pub fn first(&self, predicate: &EventPredicate) -> Option<&NormalizedEvent> {
        self.events.iter().find(|e| predicate.matches(e))
    }

    /// Last matching event.
    #[must_use]
    pub fn last(&self, predicate: &EventPredicate) -> Option<&NormalizedEvent> {
        self.events.iter().rev().find(|e| predicate.matches(e))
    }

    /// Interval from the first event matching `a` to the last event
    /// matching `b`. Returns `None` when either is absent or lacks a
    /// timestamp (no interval is known), or when `b` precedes `a`.
    #[must_use]
    pub fn duration_between(
        &self,
        a: &EventPredicate,
        b: &EventPredicate,
    ) -> Option<Duration> {
        let start = self.first(a)?;
        let end = self.last(b)?;
        if !start.has_timestamp() || !end.has_timestamp() {
            return None;
        }
        let interval = end.last_seen - start.first_seen;
        (interval >= Duration::zero()).then_some(interval)
    }

    /// True when at least `min_count` occurrences of `reason` exist,
    /// optionally within a sliding window of `within` seconds.
    ///
    /// When any matching record lacks a timestamp the window constraint is
    /// ignored and only the count is enforced (conservative fallback).
    #[must_use]
    pub fn repeated(&self, reason: &str, min_count: u32, within: Option<i64>) -> bool {
        let predicate = EventPredicate::reason(reason);
        let total = self.occurrences(&predicate);
        if total < min_count {
            return false;
        }
        let Some(window_secs) = within else {
            return true;
        };
        let records: Vec<&NormalizedEvent> = self.matching(&predicate).collect();
        if records.iter().any(|e| !e.has_timestamp()) {
            return true;
        }
        let window = Duration::seconds(window_secs);
        records.iter().any(|anchor| {
            let window_end = anchor.last_seen + window;
            records
                .iter()
                .filter(|e| e.last_seen >= anchor.last_seen && e.last_seen <= window_end)
                .map(|e| e.count)
                .sum::<u32>()
                >= min_count
        })
    }

    /// True when events matching the predicates appear in the given order,
    /// not necessarily contiguously.
    #[must_use]
    pub fn pattern(&self, sequence: &[EventPredicate]) -> bool {
        let mut cursor = sequence.iter();
        let Some(mut needle) = cursor.next() else {
            return true;
        };
        for event in &self.events {
            if needle.matches(event) {
                match cursor.next() {
                    Some(next) => needle = next,
                    None => return true,
                }
            }
        }
        false
    }
}

fn normalize_event(raw: &Value) -> NormalizedEvent {
    let reason = raw
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let (kind, phase) = classify_reason(&reason);
    let first_seen = timestamp_field(raw, &["firstTimestamp", "eventTime"]);
    let last_seen = timestamp_field(raw, &["lastTimestamp", "eventTime", "firstTimestamp"]);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = raw
        .get("count")
        .and_then(Value::as_i64)
        .filter(|c| *c > 0)
        .map_or(1, |c| c.min(i64::from(u32::MAX)) as u32);

    NormalizedEvent {
        kind,
        phase,
        reason,
        message: raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source: raw
            .get("source")
            .and_then(|s| s.get("component"))
            .or_else(|| raw.get("reportingComponent"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        first_seen,
        last_seen,
        count,
        involved_object: raw
            .get("involvedObject")
            .and_then(|o| o.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn timestamp_field(raw: &Value, keys: &[&str]) -> DateTime<Utc> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(Value::as_str)
        .find_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Temporal compound primitives
// ---------------------------------------------------------------------------

/// Restart escalation: several back-off occurrences in a short window while
/// the pod has accumulated restarts.
#[must_use]
pub fn rapid_restart_escalation(timeline: &Timeline, pod: &Pod) -> bool {
    pod.max_restart_count() >= 3 && timeline.repeated("BackOff", 3, Some(600))
}

/// Probe failures repeating within five minutes.
#[must_use]
pub fn repeated_probe_failure(timeline: &Timeline) -> bool {
    timeline.repeated("Unhealthy", 3, Some(300))
}

/// The scheduler repeatedly failing to place the pod.
#[must_use]
pub fn scheduling_flapping(timeline: &Timeline) -> bool {
    timeline.repeated("FailedScheduling", 3, Some(900))
}

/// How long volume trouble persisted, when the timeline can tell.
#[must_use]
pub fn volume_pending_duration(timeline: &Timeline) -> Option<Duration> {
    let volume_failure = EventPredicate::kind(EventKind::Volume).with_phase(EventPhase::Failure);
    timeline.duration_between(&volume_failure, &volume_failure)
}

/// Volume failure signals followed by container crash-looping, with the
/// volume trouble lasting at least a minute when timestamps allow the check.
#[must_use]
pub fn volume_trouble_then_crashloop(timeline: &Timeline) -> bool {
    let volume_failure = EventPredicate::kind(EventKind::Volume).with_phase(EventPhase::Failure);
    let backoff = EventPredicate::reason("BackOff");
    if !timeline.pattern(&[volume_failure.clone(), backoff.clone()]) {
        return false;
    }
    match timeline.duration_between(&volume_failure, &backoff) {
        Some(interval) => interval >= Duration::seconds(60),
        None => true,
    }
}

/// An image pull followed by crash-looping: the classic bad-rollout shape.
#[must_use]
pub fn image_updated_then_crashloop(timeline: &Timeline) -> bool {
    let pulled = EventPredicate::kind(EventKind::Image).with_phase(EventPhase::Info);
    let backoff = EventPredicate::reason("BackOff");
    timeline.pattern(&[pulled, backoff])
}

/// A container restart cycle (kill, start) ending in crash-looping, the
/// observable footprint of a configuration rollout gone wrong.
#[must_use]
pub fn crashloop_after_config_change(timeline: &Timeline) -> bool {
    timeline.pattern(&[
        EventPredicate::reason("Killing"),
        EventPredicate::reason("Started"),
        EventPredicate::reason("BackOff"),
    ])
}
