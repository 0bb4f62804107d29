//! Errors crossing the persistence contract boundary.

use thiserror::Error;

/// Failure reported by a record-store collaborator.
///
/// None of these are fatal to the board: fetches degrade to empty data and
/// mutations roll back and re-query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    /// Backing store could not be reached or written (I/O, lock contention).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("corrupt store data: {0}")]
    Corrupt(String),

    /// The write conflicts with current record state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_entity_and_id() {
        let err = StoreError::not_found("deal", 42);
        assert_eq!(err.to_string(), "deal not found: 42");
    }

    #[test]
    fn unavailable_carries_reason() {
        let err = StoreError::Unavailable("disk full".into());
        assert!(err.to_string().contains("disk full"));
    }
}
