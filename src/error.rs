//! Persona Vault error types

use crate::memory::CandidateStatus;
use thiserror::Error;
use uuid::Uuid;

/// Persona Vault error type
#[derive(Error, Debug)]
pub enum Error {
    /// Scope/credential mismatch. Never retried, never carries partial data.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Extraction pipeline failed while creating a candidate
    #[error("Processing error: {0}")]
    Processing(String),

    /// Every tier search failed
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Promote/reject applied to a candidate that is not awaiting review
    #[error("Conflict: candidate {candidate_id} is {status}, not awaiting_review")]
    Conflict {
        /// Candidate the transition was attempted on
        candidate_id: Uuid,
        /// Status the candidate holds right now
        status: CandidateStatus,
    },

    /// Stored data violates a tier or lifecycle invariant
    #[error("Integrity fault: {0}")]
    Integrity(String),

    /// Unknown record id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed record
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding collaborator failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Storage collaborator failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the failure came from a collaborator that may succeed on retry.
    ///
    /// Authorization and conflict errors are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Embedding(_))
    }
}

/// Result type alias for Persona Vault operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_carries_status() {
        let id = Uuid::new_v4();
        let err = Error::Conflict {
            candidate_id: id,
            status: CandidateStatus::Promoted,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("promoted"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Store("timeout".into()).is_retryable());
        assert!(Error::Embedding("rate limited".into()).is_retryable());
        assert!(!Error::Authorization("missing credential".into()).is_retryable());
        assert!(!Error::Processing("summarize failed".into()).is_retryable());
    }
}
