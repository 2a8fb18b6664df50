//! Container lifecycle rules: crashes, OOM kills, and runtime errors.

use super::{Rule, RuleMeta};
use crate::graph::ObjectGraph;
use crate::timeline::{rapid_restart_escalation, EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

/// A container is crash-looping.
pub struct CrashLoopBackoff {
    meta: RuleMeta,
}

impl CrashLoopBackoff {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("CrashLoopBackoff", RuleCategory::Lifecycle)
                .priority(66)
                .confidence(0.9)
                .expected_evidence(2),
        }
    }

    fn crashloop_cause(graph: &ObjectGraph, timeline: &Timeline) -> Cause {
        let mut cause = Cause::new(
            "CrashLoopBackoff",
            &graph.pod.name,
            "A container is crashing shortly after start (CrashLoopBackOff)",
        );
        for cs in graph.pod.containers_waiting_with("CrashLoopBackOff") {
            cause = cause.with_evidence(Evidence::object_state(
                "status.containerStatuses[].state.waiting.reason",
                format!("{} in CrashLoopBackOff after {} restarts", cs.name, cs.restart_count),
            ));
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("BackOff")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        cause
    }
}

impl Rule for CrashLoopBackoff {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("BackOff")
            || !graph.pod.containers_waiting_with("CrashLoopBackOff").is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        CausalChain::new().with_cause(Self::crashloop_cause(graph, timeline))
    }
}

/// A container was killed for exceeding its memory limit.
pub struct OomKilled {
    meta: RuleMeta,
}

impl OomKilled {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("OOMKilled", RuleCategory::Lifecycle)
                .priority(82)
                .confidence(0.95)
                .needs_stuck_container()
                .blocks(&["ContainerExitNonZero"])
                .expected_evidence(2),
        }
    }
}

impl Rule for OomKilled {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        !graph.pod.containers_last_terminated_with("OOMKilled").is_empty()
            || graph
                .pod
                .container_statuses
                .iter()
                .any(|cs| cs.terminated_reason.as_deref() == Some("OOMKilled"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "OOMKilled",
            &graph.pod.name,
            "A container was terminated for exceeding its memory limit",
        );
        for cs in &graph.pod.container_statuses {
            let oom_now = cs.terminated_reason.as_deref() == Some("OOMKilled");
            let oom_last = cs.last_terminated_reason.as_deref() == Some("OOMKilled");
            if !(oom_now || oom_last) {
                continue;
            }
            let exit_code = cs
                .terminated_exit_code
                .or(cs.last_exit_code)
                .unwrap_or(137);
            cause = cause.with_evidence(Evidence::object_state(
                "status.containerStatuses[].lastState.terminated",
                format!("{} OOMKilled with exit code {exit_code}", cs.name),
            ));
            if let Some(limit) = graph
                .pod
                .container_spec(&cs.name)
                .and_then(|c| c.memory_limit.clone())
            {
                cause = cause.with_evidence(Evidence::object_state(
                    "spec.containers[].resources.limits.memory",
                    format!("{} memory limit is {limit}", cs.name),
                ));
            }
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("OOMKilled")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// A container exited with a non-zero code for no better-understood reason.
pub struct ContainerExitNonZero {
    meta: RuleMeta,
}

impl ContainerExitNonZero {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ContainerExitNonZero", RuleCategory::Lifecycle)
                .priority(40)
                .confidence(0.6)
                .needs_stuck_container()
                .expected_evidence(1),
        }
    }
}

impl Rule for ContainerExitNonZero {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        graph.pod.container_statuses.iter().any(|cs| {
            cs.terminated_exit_code.is_some_and(|c| c != 0)
                || cs.last_exit_code.is_some_and(|c| c != 0)
        })
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "ContainerExitNonZero",
            &graph.pod.name,
            "A container exited with a non-zero status code",
        );
        for cs in &graph.pod.container_statuses {
            if let Some(code) = cs
                .terminated_exit_code
                .filter(|c| *c != 0)
                .or_else(|| cs.last_exit_code.filter(|c| *c != 0))
            {
                cause = cause.with_evidence(Evidence::object_state(
                    "status.containerStatuses[].lastState.terminated.exitCode",
                    format!("{} exited with code {code}", cs.name),
                ));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

fn runtime_error_meta(name: &str, priority: i32) -> RuleMeta {
    RuleMeta::new(name, RuleCategory::Lifecycle)
        .priority(priority)
        .confidence(0.85)
        .expected_evidence(1)
}

/// The runtime failed to create the container.
pub struct CreateContainerError {
    meta: RuleMeta,
}

impl CreateContainerError {
    pub(crate) fn new() -> Self {
        Self {
            meta: runtime_error_meta("CreateContainerError", 65),
        }
    }
}

impl Rule for CreateContainerError {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("CreateContainerError")
            || !graph.pod.containers_waiting_with("CreateContainerError").is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "CreateContainerError",
            &graph.pod.name,
            "The container runtime failed to create the container",
        );
        for cs in graph.pod.containers_waiting_with("CreateContainerError") {
            cause = cause.with_evidence(Evidence::object_state(
                "status.containerStatuses[].state.waiting",
                cs.waiting_message.clone().unwrap_or_else(|| cs.name.clone()),
            ));
        }
        if let Some(event) = timeline.first(&EventPredicate::reason("CreateContainerError")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The container started and immediately failed to run.
pub struct RunContainerError {
    meta: RuleMeta,
}

impl RunContainerError {
    pub(crate) fn new() -> Self {
        Self {
            meta: runtime_error_meta("RunContainerError", 64),
        }
    }
}

impl Rule for RunContainerError {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has_reason("RunContainerError")
            || timeline.has_reason("ContainerCannotRun")
            || !graph.pod.containers_waiting_with("RunContainerError").is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "RunContainerError",
            &graph.pod.name,
            "The container could not be run (bad command, entrypoint, or runtime state)",
        );
        for reason in ["RunContainerError", "ContainerCannotRun"] {
            if let Some(event) = timeline.first(&EventPredicate::reason(reason)) {
                cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The pod has sat in ContainerCreating long enough to be suspicious.
pub struct ContainerCreatingStuck {
    meta: RuleMeta,
}

impl ContainerCreatingStuck {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ContainerCreatingStuck", RuleCategory::Lifecycle)
                .priority(50)
                .confidence(0.7)
                .phases(&["Pending"])
                .expected_evidence(1),
        }
    }
}

impl Rule for ContainerCreatingStuck {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, _timeline: &Timeline) -> bool {
        !graph.pod.containers_waiting_with("ContainerCreating").is_empty()
            && graph.pod.node_name.is_some()
    }

    fn explain(&self, graph: &ObjectGraph, _timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "ContainerCreatingStuck",
            &graph.pod.name,
            "The pod is scheduled but its containers never left ContainerCreating",
        );
        for cs in graph.pod.containers_waiting_with("ContainerCreating") {
            cause = cause.with_evidence(Evidence::object_state(
                "status.containerStatuses[].state.waiting.reason",
                format!("{} is ContainerCreating", cs.name),
            ));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// Restarts accumulating fast.
pub struct RapidRestartEscalation {
    meta: RuleMeta,
}

impl RapidRestartEscalation {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("RapidRestartEscalation", RuleCategory::Lifecycle)
                .priority(88)
                .confidence(0.9)
                .blocks(&["CrashLoopBackoff", "ContainerExitNonZero"])
                .expected_evidence(2),
        }
    }
}

impl Rule for RapidRestartEscalation {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        rapid_restart_escalation(timeline, &graph.pod)
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let restarts = graph.pod.max_restart_count();
        let backoffs = timeline.occurrences(&EventPredicate::reason("BackOff"));
        CausalChain::new().with_cause(
            Cause::new(
                "RapidRestartEscalation",
                &graph.pod.name,
                "Container restarts are escalating rapidly",
            )
            .with_evidence(Evidence::object_state(
                "status.containerStatuses[].restartCount",
                format!("{restarts} restarts recorded"),
            ))
            .with_evidence(Evidence::timeline(
                "BackOff",
                format!("{backoffs} back-off events within 10 minutes"),
            )),
        )
    }
}

pub(crate) fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(CrashLoopBackoff::new()),
        Box::new(OomKilled::new()),
        Box::new(ContainerExitNonZero::new()),
        Box::new(CreateContainerError::new()),
        Box::new(RunContainerError::new()),
        Box::new(ContainerCreatingStuck::new()),
        Box::new(RapidRestartEscalation::new()),
    ]
}
