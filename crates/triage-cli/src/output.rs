//! Renderers for the explanation record.
//!
//! Renderers are display-only: they never reorder arrays and never
//! recompute confidence. Confidence is printed with three decimal places.

#![allow(clippy::format_push_string)]

use triage_core::Explanation;

const RULE: &str = "───────────────────────────────────────────────────────────────";

/// Formats an explanation as a human-readable report.
#[must_use]
pub fn format_text(explanation: &Explanation) -> String {
    let mut out = String::new();

    match &explanation.root_cause {
        Some(cause) => {
            out.push_str(&format!("Root cause: {}: {}\n", cause.kind, cause.message));
            out.push_str(&format!("Confidence: {:.3}\n", explanation.confidence));
        }
        None => {
            if let Some(error) = &explanation.metadata.error {
                out.push_str(&format!("Input error: {error}\n"));
            } else {
                out.push_str(
                    "No conclusive root cause: insufficient signal in the snapshot.\n",
                );
            }
            out.push_str(&format!("Confidence: {:.3}\n", explanation.confidence));
        }
    }

    let chain = &explanation.causal_chain;
    if !chain.is_empty() {
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Causal chain:\n");
        for cause in &chain.causes {
            out.push_str(&format!("  cause        {}: {}\n", cause.kind, cause.message));
        }
        for symptom in &chain.symptoms {
            out.push_str(&format!("  symptom      {}: {}\n", symptom.kind, symptom.message));
        }
        for contributing in &chain.contributing {
            out.push_str(&format!(
                "  contributing {}: {}\n",
                contributing.kind, contributing.message
            ));
        }
    }

    if !explanation.evidence.is_empty() {
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Evidence:\n");
        for evidence in &explanation.evidence {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                evidence.source, evidence.locator, evidence.snippet
            ));
        }
    }

    if !explanation.suppressed_rules.is_empty() {
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Suppressed rules:\n");
        for suppressed in &explanation.suppressed_rules {
            out.push_str(&format!("  {} ({})\n", suppressed.name, suppressed.reason));
        }
    }

    if !explanation.suggested_next_checks.is_empty() {
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Suggested next checks:\n");
        for check in &explanation.suggested_next_checks {
            out.push_str(&format!("  - {check}\n"));
        }
    }

    out.push_str(&format!("{RULE}\n"));
    out.push_str(&format!(
        "Engine {} | rules evaluated: {} | matched: {} | inputs {}\n",
        explanation.metadata.engine_version,
        explanation.metadata.rules_evaluated,
        explanation.metadata.rules_matched,
        short_hash(&explanation.metadata.inputs_hash),
    ));

    if !explanation.metadata.rule_errors.is_empty() {
        out.push_str("Rule errors:\n");
        for error in &explanation.metadata.rule_errors {
            out.push_str(&format!("  {}: {}\n", error.name, error.message));
        }
    }

    if let Some(trace) = &explanation.metadata.rule_trace {
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Rule trace:\n");
        for entry in trace {
            let state = if entry.suppressed {
                "suppressed"
            } else if entry.matched {
                "matched"
            } else {
                "no match"
            };
            out.push_str(&format!(
                "  {:<32} {:<10} {:.3}\n",
                entry.name, state, entry.composed_confidence
            ));
        }
    }

    out
}

/// Formats an explanation as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_json(explanation: &Explanation) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(explanation)
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Cause, Evidence, Explanation, ExplanationMetadata, SuppressedRule};

    fn sample() -> Explanation {
        let cause = Cause::new("OOMKilled", "web-0", "Container exceeded its memory limit")
            .with_evidence(Evidence::object_state(
                "lastState.terminated",
                "OOMKilled exit 137",
            ))
            .with_confidence(0.855);
        let mut explanation = Explanation::empty(ExplanationMetadata {
            inputs_hash: "abcdef0123456789".to_string(),
            engine_version: "0.3.1".to_string(),
            rules_evaluated: 12,
            rules_matched: 2,
            ..ExplanationMetadata::default()
        });
        explanation.confidence = 0.855;
        explanation.evidence = cause.evidence.clone();
        explanation.causal_chain = triage_core::CausalChain::new().with_cause(cause.clone());
        explanation.root_cause = Some(cause);
        explanation.suppressed_rules = vec![SuppressedRule {
            name: "ContainerExitNonZero".to_string(),
            reason: "suppressed by OOMKilled".to_string(),
        }];
        explanation.suggested_next_checks = vec!["kubectl describe pod web-0".to_string()];
        explanation
    }

    #[test]
    fn text_report_prints_three_decimal_confidence() {
        let text = format_text(&sample());
        assert!(text.contains("Confidence: 0.855"));
        assert!(text.contains("Root cause: OOMKilled"));
    }

    #[test]
    fn text_report_lists_suppressed_and_checks() {
        let text = format_text(&sample());
        assert!(text.contains("ContainerExitNonZero (suppressed by OOMKilled)"));
        assert!(text.contains("- kubectl describe pod web-0"));
    }

    #[test]
    fn inconclusive_report_explains_itself() {
        let explanation = Explanation::empty(ExplanationMetadata::default());
        let text = format_text(&explanation);
        assert!(text.contains("insufficient signal"));
        assert!(text.contains("Confidence: 0.000"));
    }

    #[test]
    fn input_error_report_shows_error() {
        let explanation = Explanation::empty(ExplanationMetadata {
            error: Some("InputInvalid: pod has no metadata.name".to_string()),
            ..ExplanationMetadata::default()
        });
        let text = format_text(&explanation);
        assert!(text.contains("InputInvalid"));
    }

    #[test]
    fn json_output_round_trips() {
        let json = format_json(&sample()).expect("serializes");
        let back: Explanation = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, sample());
    }

    #[test]
    fn json_preserves_field_order() {
        let json = format_json(&sample()).expect("serializes");
        let root = json.find("\"root_cause\"").expect("root_cause");
        let conf = json.find("\"confidence\"").expect("confidence");
        let meta = json.find("\"metadata\"").expect("metadata");
        assert!(root < conf && conf < meta);
    }
}
