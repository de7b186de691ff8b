//! Domain and persistence error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures are [`PersistenceError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A raw value could not become a value object.
    #[error("invalid {kind}: {value:?} (expected {expected})")]
    Validation {
        kind: &'static str,
        value: String,
        expected: String,
    },

    /// A domain invariant was violated (e.g. moving an order backwards).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested aggregate does not exist.
    #[error("{0}")]
    NotFound(String),

    /// An aggregate with the same identity already exists.
    #[error("{0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(
        kind: &'static str,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Validation {
            kind,
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Storage-level failure, already detached from the driver error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database error in {operation}: {message}")]
    Query { operation: String, message: String },

    /// Unique constraint (`23505`).
    #[error("duplicate key in {operation}: {message}")]
    UniqueViolation { operation: String, message: String },

    /// Foreign key constraint (`23503`).
    #[error("referenced item does not exist ({operation}): {message}")]
    ForeignKeyViolation { operation: String, message: String },

    /// A persisted row no longer satisfies domain invariants.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
}

impl PersistenceError {
    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

impl From<DomainError> for PersistenceError {
    /// A row that fails value-object construction is corrupt data, not bad input.
    fn from(err: DomainError) -> Self {
        Self::DataIntegrity(err.to_string())
    }
}
