//! Products domain module.
//!
//! Catalog rules implemented as deterministic domain logic (no IO, no HTTP, no
//! storage). Persistence is reached through the [`ProductRepository`] port.

pub mod product;
pub mod repository;
pub mod value_objects;

pub use product::{Product, ProductDetails, ProductDraft, ProductSnapshot};
pub use repository::ProductRepository;
pub use value_objects::{Category, Price, ProductStatus};
