//! Queue transport implementations.
//!
//! The transport abstraction lives in `cook-messaging`; this module provides the
//! infrastructure-backed implementation (Redis Streams). Tests and local runs use
//! `cook_messaging::InMemoryQueue` instead.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsTransport;
