//! Queue transport port (mechanics only).
//!
//! A transport moves opaque text bodies between channels. It knows nothing about
//! payload types; serialization lives in [`crate::envelope`] and
//! [`crate::client::QueueClient`].

use std::sync::Arc;
use std::time::Duration;

/// Addressable queue endpoint: `{base}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(base: &str, name: &str) -> Self {
        Self(format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle returned with a received message; required to delete it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken(String);

impl DeliveryToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as handed out by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub token: DeliveryToken,
    pub body: String,
    /// How many times this message has been handed out, this delivery included.
    pub receive_count: u32,
}

/// Long-poll parameters for a single receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// How long to wait for a message when the channel is empty.
    pub wait: Duration,
    /// Upper bound on the batch size.
    pub max_messages: usize,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(20),
            max_messages: 10,
        }
    }
}

impl ReceiveOptions {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("message serialization error: {0}")]
    Serialization(String),

    #[error("queue closed: {0}")]
    Closed(String),
}

/// Send/receive/delete against a managed queue.
#[async_trait::async_trait]
pub trait QueueTransport: Send + Sync {
    async fn send(&self, channel: &ChannelId, body: &str) -> Result<(), TransportError>;

    /// Wait up to `options.wait` and return between zero and `options.max_messages`
    /// messages. Handed-out messages stay on the channel until deleted and become
    /// receivable again once the transport's visibility timeout passes.
    async fn receive(
        &self,
        channel: &ChannelId,
        options: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError>;

    /// Acknowledge: remove the message so it is never redelivered.
    async fn delete(&self, channel: &ChannelId, token: &DeliveryToken) -> Result<(), TransportError>;

    /// Park a message that keeps failing on the channel's dead-letter queue.
    ///
    /// The original delivery still has to be deleted by the caller.
    async fn dead_letter(
        &self,
        channel: &ChannelId,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<T> QueueTransport for Arc<T>
where
    T: QueueTransport + ?Sized,
{
    async fn send(&self, channel: &ChannelId, body: &str) -> Result<(), TransportError> {
        (**self).send(channel, body).await
    }

    async fn receive(
        &self,
        channel: &ChannelId,
        options: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        (**self).receive(channel, options).await
    }

    async fn delete(&self, channel: &ChannelId, token: &DeliveryToken) -> Result<(), TransportError> {
        (**self).delete(channel, token).await
    }

    async fn dead_letter(
        &self,
        channel: &ChannelId,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), TransportError> {
        (**self).dead_letter(channel, message, reason).await
    }
}
