//! Queue messaging: the transport port, the queue client, publishers and the
//! long-polling listener loop.
//!
//! Delivery is **at-least-once**. A message is acknowledged (deleted) only after its
//! handler succeeds, so a crash between handling and acknowledging redelivers it.
//! Handlers must therefore be idempotent.

pub mod client;
pub mod envelope;
pub mod handler;
pub mod in_memory_queue;
pub mod listener;
pub mod publisher;
pub mod queue;

pub use client::{Delivery, QueueClient};
pub use envelope::{DecodeError, decode, encode, repair_bare_keys};
pub use handler::MessageHandler;
pub use in_memory_queue::InMemoryQueue;
pub use listener::{Listener, ListenerConfig, QueueListener, run_listener};
pub use publisher::{ChannelPublisher, MessagePublisher};
pub use queue::{ChannelId, DeliveryToken, QueueTransport, RawMessage, ReceiveOptions, TransportError};
