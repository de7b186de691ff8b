//! Repository adapters: Postgres for production, in-memory for tests/dev.

pub mod in_memory;
pub mod postgres_orders;
pub mod postgres_products;

pub use in_memory::{InMemoryOrderRepository, InMemoryProductRepository};
pub use postgres_orders::PostgresOrderRepository;
pub use postgres_products::PostgresProductRepository;
