//! Application use cases: orchestrate repositories and publishers for the HTTP
//! layer and the queue listeners.
//!
//! Flow for every mutating use case:
//!
//! ```text
//! validate input -> mutate aggregate -> persist -> publish (outside the write)
//! ```
//!
//! A publish failure after a successful write is logged and does not fail the
//! request; the write is the source of truth.

pub mod orders;
pub mod products;

pub use orders::{NewOrder, OrderPublisher, OrderUseCases};
pub use products::{ProductPublisher, ProductPublishers, ProductUseCases};

use cook_core::{DomainError, PersistenceError};
use cook_messaging::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UseCaseError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Rejected input: bad tokens, non-positive prices, backward status moves.
    #[error(transparent)]
    InvalidInput(DomainError),

    #[error("Failed to execute usecase error: {0}")]
    Failed(String),
}

impl From<DomainError> for UseCaseError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(msg) => UseCaseError::NotFound(msg),
            DomainError::Conflict(msg) => UseCaseError::Conflict(msg),
            other => UseCaseError::InvalidInput(other),
        }
    }
}

impl From<PersistenceError> for UseCaseError {
    fn from(err: PersistenceError) -> Self {
        UseCaseError::Failed(err.to_string())
    }
}

impl From<TransportError> for UseCaseError {
    fn from(err: TransportError) -> Self {
        UseCaseError::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        assert!(matches!(
            UseCaseError::from(DomainError::not_found("Product with id 1 not found")),
            UseCaseError::NotFound(msg) if msg == "Product with id 1 not found"
        ));
        assert!(matches!(
            UseCaseError::from(DomainError::invariant("backwards")),
            UseCaseError::InvalidInput(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn storage_errors_become_failed() {
        let err = UseCaseError::from(PersistenceError::Connection("pool timed out".to_string()));
        assert!(err.to_string().starts_with("Failed to execute usecase error: "));
    }
}
