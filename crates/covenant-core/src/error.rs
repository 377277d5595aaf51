//! Error types for the covenant engine
//!
//! All fallible operations return `Result<T, Error>`.
//! Every variant is fatal for the operation that produced it; the caller
//! sees a single reject signal plus the reason string.

use thiserror::Error;

/// Covenant engine error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Oracle or party signature did not verify
    #[error("Authentication failure: {0}")]
    Authentication(String),

    /// Witness data does not reference the UTXO being spent
    #[error("Binding failure: {0}")]
    Binding(String),

    /// Clearing/selling would break a bounded counter
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Computed outputs do not hash to the declared digest
    #[error("hashOutputs mismatch: expected {expected}, computed {computed}")]
    CommitmentMismatch { expected: String, computed: String },

    /// Turing step found no matching transition table entry
    #[error("No transition table entry found. (state {state:#04x}, symbol {symbol:#04x})")]
    NoTransition { state: u8, symbol: u8 },

    /// Malformed bytes or keys, out-of-range slices
    #[error("Codec error: {0}")]
    Codec(String),

    /// Method is not part of the covenant's closed call surface
    #[error("Unsupported call: {0}")]
    UnsupportedCall(String),

    /// JSON request could not be parsed or serialized
    #[error("Request error: {0}")]
    Request(String),
}

impl Error {
    /// Short reason string reported to the collaborator
    pub fn reason(&self) -> String {
        match self {
            Error::Authentication(msg)
            | Error::Binding(msg)
            | Error::InvariantViolation(msg)
            | Error::Codec(msg)
            | Error::UnsupportedCall(msg)
            | Error::Request(msg) => msg.clone(),
            Error::CommitmentMismatch { .. } => "hashOutputs mismatch".into(),
            Error::NoTransition { .. } => "No transition table entry found.".into(),
        }
    }

    /// Stable category name
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "authentication",
            Error::Binding(_) => "binding",
            Error::InvariantViolation(_) => "invariant",
            Error::CommitmentMismatch { .. } => "commitment",
            Error::NoTransition { .. } => "no_transition",
            Error::Codec(_) => "codec",
            Error::UnsupportedCall(_) => "unsupported_call",
            Error::Request(_) => "request",
        }
    }
}

/// Result type alias for covenant operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strips_category() {
        let err = Error::InvariantViolation("UTXO token amount exceeds total".into());
        assert_eq!(err.reason(), "UTXO token amount exceeds total");
        assert_eq!(err.kind(), "invariant");
        assert!(err.to_string().starts_with("Invariant violation"));
    }

    #[test]
    fn test_commitment_mismatch_display() {
        let err = Error::CommitmentMismatch {
            expected: "00".into(),
            computed: "ff".into(),
        };
        assert_eq!(err.reason(), "hashOutputs mismatch");
        assert_eq!(
            err.to_string(),
            "hashOutputs mismatch: expected 00, computed ff"
        );
    }

    #[test]
    fn test_no_transition_display() {
        let err = Error::NoTransition {
            state: 2,
            symbol: 1,
        };
        assert_eq!(err.kind(), "no_transition");
        assert!(err.to_string().contains("0x02"));
        assert!(err.to_string().contains("0x01"));
    }
}
