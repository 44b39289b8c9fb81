//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or mutating a catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create or insert collided with an existing unique key.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// Entity kind (record, year, make, option, ...).
        entity: &'static str,
        /// The colliding key.
        key: String,
    },

    /// A targeted update referenced an entity that does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// The missing key.
        key: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A journal entry could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The journal contains entries that cannot be replayed.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the journal lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// A failed append could not be rolled back, so the journal may end in
    /// a partial entry. Reopening the store truncates it.
    #[error("store poisoned: journal rollback failed, reopen to recover")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
