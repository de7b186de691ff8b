//! Infrastructure layer: configuration, Postgres, queue transport, publishers,
//! use cases and background listeners.

pub mod config;
pub mod db;
pub mod listeners;
pub mod publishers;
pub mod queue;
pub mod repositories;
pub mod use_cases;
pub mod workers;

pub use config::{AppConfig, ConfigError, DatabaseConfig, QueuePurpose, QueueSettings};
pub use db::{Database, PageQuery, SqlParam};
pub use use_cases::{NewOrder, OrderUseCases, ProductPublishers, ProductUseCases, UseCaseError};
pub use workers::{WorkerHandle, spawn_listener};
