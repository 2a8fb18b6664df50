//! Config, secret, quota, and admission rejection rules.

use super::{Rule, RuleMeta};
use crate::graph::{ObjectGraph, ObjectKind};
use crate::timeline::{EventPredicate, Timeline};
use crate::types::{CausalChain, Cause, Evidence, RuleCategory};

fn config_error(needle: &str) -> EventPredicate {
    EventPredicate::reason("CreateContainerConfigError").with_message(needle)
}

/// A referenced ConfigMap does not exist.
pub struct ConfigMapMissing {
    meta: RuleMeta,
}

impl ConfigMapMissing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ConfigMapMissing", RuleCategory::Admission)
                .priority(79)
                .confidence(0.94)
                .optional(&[ObjectKind::ConfigMaps])
                .expected_evidence(2),
        }
    }

    /// ConfigMap names referenced by the pod but absent from a provided
    /// configmaps slot. Event text alone is used when the slot is absent.
    fn missing_refs<'a>(graph: &'a ObjectGraph) -> Vec<&'a str> {
        let Some(config_maps) = graph.config_maps.as_ref() else {
            return Vec::new();
        };
        graph
            .pod
            .volumes
            .iter()
            .filter_map(|v| v.config_map.as_deref())
            .filter(|name| !config_maps.contains_key(*name))
            .collect()
    }
}

impl Rule for ConfigMapMissing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&config_error("configmap")) || !Self::missing_refs(graph).is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let missing = Self::missing_refs(graph);
        let object = missing.first().map_or(graph.pod.name.as_str(), |n| *n);
        let mut cause = Cause::new(
            "ConfigMapMissing",
            object,
            "A ConfigMap referenced by the pod does not exist",
        );
        for name in &missing {
            cause = cause.with_evidence(Evidence::object_state(
                "spec.volumes[].configMap.name",
                format!("{name} is referenced but absent"),
            ));
        }
        if let Some(event) = timeline.first(&config_error("configmap")) {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// A referenced Secret does not exist.
pub struct SecretMissing {
    meta: RuleMeta,
}

impl SecretMissing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("SecretMissing", RuleCategory::Admission)
                .priority(78)
                .confidence(0.94)
                .optional(&[ObjectKind::Secrets])
                .expected_evidence(2),
        }
    }

    fn missing_refs<'a>(graph: &'a ObjectGraph) -> Vec<&'a str> {
        let Some(secrets) = graph.secrets.as_ref() else {
            return Vec::new();
        };
        graph
            .pod
            .volumes
            .iter()
            .filter_map(|v| v.secret.as_deref())
            .filter(|name| !secrets.contains_key(*name))
            .collect()
    }
}

impl Rule for SecretMissing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&config_error("secret"))
            || timeline.has(&EventPredicate::reason("FailedMount").with_message("secret"))
            || !Self::missing_refs(graph).is_empty()
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let missing = Self::missing_refs(graph);
        let object = missing.first().map_or(graph.pod.name.as_str(), |n| *n);
        let mut cause = Cause::new(
            "SecretMissing",
            object,
            "A Secret referenced by the pod does not exist",
        );
        for name in &missing {
            cause = cause.with_evidence(Evidence::object_state(
                "spec.volumes[].secret.secretName",
                format!("{name} is referenced but absent"),
            ));
        }
        for predicate in [
            config_error("secret"),
            EventPredicate::reason("FailedMount").with_message("secret"),
        ] {
            if let Some(event) = timeline.first(&predicate) {
                cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// The pod's service account is missing.
pub struct ServiceAccountMissing {
    meta: RuleMeta,
}

impl ServiceAccountMissing {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("ServiceAccountMissing", RuleCategory::Admission)
                .priority(76)
                .confidence(0.92)
                .expected_evidence(1),
        }
    }
}

impl Rule for ServiceAccountMissing {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&EventPredicate::reason("FailedCreate").with_message("serviceaccount"))
            || timeline
                .has(&EventPredicate::reason("FailedCreate").with_message("service account"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let account = graph
            .pod
            .service_account
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let mut cause = Cause::new(
            "ServiceAccountMissing",
            &account,
            format!("Service account {account} was not found"),
        );
        for needle in ["serviceaccount", "service account"] {
            if let Some(event) =
                timeline.first(&EventPredicate::reason("FailedCreate").with_message(needle))
            {
                cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
            }
        }
        CausalChain::new().with_cause(cause)
    }
}

/// An admission webhook denied the workload.
pub struct AdmissionWebhookDenied {
    meta: RuleMeta,
}

impl AdmissionWebhookDenied {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("AdmissionWebhookDenied", RuleCategory::Admission)
                .priority(77)
                .confidence(0.93)
                .expected_evidence(1),
        }
    }
}

impl Rule for AdmissionWebhookDenied {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        ["admission webhook", "denied the request"].into_iter().any(|needle| {
            timeline.has(&EventPredicate::reason("FailedCreate").with_message(needle))
                || timeline.has(&EventPredicate::reason("FailedValidation").with_message(needle))
        })
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "AdmissionWebhookDenied",
            &graph.pod.name,
            "An admission webhook denied the pod",
        );
        for needle in ["admission webhook", "denied the request"] {
            for reason in ["FailedCreate", "FailedValidation"] {
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

/// A resource quota is exhausted.
pub struct QuotaExceeded {
    meta: RuleMeta,
}

impl QuotaExceeded {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("QuotaExceeded", RuleCategory::Admission)
                .priority(75)
                .confidence(0.92)
                .expected_evidence(1),
        }
    }
}

impl Rule for QuotaExceeded {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        timeline.has(&EventPredicate::reason("FailedCreate").with_message("exceeded quota"))
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "QuotaExceeded",
            &graph.pod.name,
            "Pod creation is blocked by an exhausted resource quota",
        );
        if let Some(event) =
            timeline.first(&EventPredicate::reason("FailedCreate").with_message("exceeded quota"))
        {
            cause = cause.with_evidence(Evidence::event(&event.reason, &event.message));
        }
        CausalChain::new().with_cause(cause)
    }
}

/// Pod security admission rejected the spec.
pub struct SecurityContextDenied {
    meta: RuleMeta,
}

impl SecurityContextDenied {
    pub(crate) fn new() -> Self {
        Self {
            meta: RuleMeta::new("SecurityContextDenied", RuleCategory::Admission)
                .priority(74)
                .confidence(0.9)
                .expected_evidence(1),
        }
    }
}

impl Rule for SecurityContextDenied {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn matches(&self, _graph: &ObjectGraph, timeline: &Timeline) -> bool {
        ["violates podsecurity", "securitycontext"].into_iter().any(|needle| {
            timeline.has(&EventPredicate::reason("FailedCreate").with_message(needle))
                || timeline.has(&EventPredicate::reason("Forbidden").with_message(needle))
        })
    }

    fn explain(&self, graph: &ObjectGraph, timeline: &Timeline) -> CausalChain {
        let mut cause = Cause::new(
            "SecurityContextDenied",
            &graph.pod.name,
            "The pod's security context violates namespace policy",
        );
        for needle in ["violates podsecurity", "securitycontext"] {
            for reason in ["FailedCreate", "Forbidden"] {
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
        Box::new(ConfigMapMissing::new()),
        Box::new(SecretMissing::new()),
        Box::new(ServiceAccountMissing::new()),
        Box::new(AdmissionWebhookDenied::new()),
        Box::new(QuotaExceeded::new()),
        Box::new(SecurityContextDenied::new()),
    ]
}
