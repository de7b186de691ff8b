//! Background listener tasks.

pub mod listener_worker;

pub use listener_worker::{WorkerHandle, spawn_listener};
