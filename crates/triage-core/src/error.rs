//! Error types for the triage engine.

use thiserror::Error;

/// Errors that can occur while building or invoking the engine.
#[derive(Debug, Error)]
pub enum TriageError {
    /// A required input object is missing or structurally malformed.
    ///
    /// Raised by the normalizer; the engine converts it into an
    /// `Explanation` with a null root cause and `metadata.error` set.
    #[error("InputInvalid: {0}")]
    InputInvalid(String),

    /// A rule definition is invalid (duplicate name, empty name, or a
    /// malformed declarative definition). Fails engine construction.
    #[error("RuleMalformed: {0}")]
    RuleMalformed(String),

    /// Failed to serialize an explanation.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_invalid_display_carries_detail() {
        let err = TriageError::InputInvalid("pod is not an object".to_string());
        assert_eq!(err.to_string(), "InputInvalid: pod is not an object");
    }

    #[test]
    fn rule_malformed_display_carries_detail() {
        let err = TriageError::RuleMalformed("duplicate rule name 'OOMKilled'".to_string());
        assert!(err.to_string().starts_with("RuleMalformed"));
    }
}
