//! `cook-core`: shared building blocks for the kitchen service.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error model, entity/value-object markers and the
//! paginated-collection contract used by every list query.

pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, PersistenceError};
pub use id::{OrderId, ProductId};
pub use page::{PageRequest, PagedCollection};
pub use value_object::ValueObject;
