//! Kitchen orders domain module.
//!
//! Orders arrive from the upstream ordering context and move forward through the
//! kitchen (`PREPARING` -> `READY` -> `FINISHED`). No IO lives here; storage goes
//! through the [`OrderRepository`] port.

pub mod order;
pub mod repository;

pub use order::{Order, OrderProduct, OrderSnapshot, OrderStatus};
pub use repository::OrderRepository;
