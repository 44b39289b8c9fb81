//! Error types for the sync engine.

use catsync_core::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network, rate-limit or remote-side failure while fetching a page.
    #[error("source error: {message}")]
    Source {
        /// Error message.
        message: String,
        /// Whether the page request can be retried.
        retryable: bool,
    },

    /// The remote returned a response that cannot be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Store failure while writing a record or an index.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A remote record broke an assumption the remote guarantees.
    #[error("contract violation for {external_id}: {reason}")]
    ContractViolation {
        /// External identifier of the offending record.
        external_id: String,
        /// What was wrong.
        reason: String,
    },

    /// The retry budget for a page ran out.
    #[error("page failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<SyncError>,
    },

    /// A run was requested while another was active.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a retryable source error.
    pub fn source_retryable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable source error.
    pub fn source_fatal(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a contract violation.
    pub fn contract(external_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            external_id: external_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the page that raised this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Source { retryable, .. } => *retryable,
            SyncError::Store(StoreError::Poisoned) => false,
            SyncError::Store(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::source_retryable("connection reset").is_retryable());
        assert!(!SyncError::source_fatal("401 unauthorized").is_retryable());
        assert!(SyncError::Store(StoreError::Locked).is_retryable());
        assert!(!SyncError::Store(StoreError::Poisoned).is_retryable());
        assert!(!SyncError::contract("gid://1", "no variants").is_retryable());
        assert!(!SyncError::Protocol("bad json".into()).is_retryable());
    }

    #[test]
    fn exhausted_is_terminal() {
        let err = SyncError::RetriesExhausted {
            attempts: 3,
            last: Box::new(SyncError::source_retryable("timeout")),
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "page failed after 3 attempts: source error: timeout"
        );
    }

    #[test]
    fn error_display() {
        let err = SyncError::contract("gid://shopify/Product/9", "record has no variants");
        assert!(err.to_string().contains("gid://shopify/Product/9"));
        assert!(err.to_string().contains("no variants"));
    }
}
