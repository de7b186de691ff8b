//! Publisher port used by use cases to emit events without knowing the transport.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use crate::client::QueueClient;
use crate::queue::{ChannelId, QueueTransport, TransportError};

/// Emits `M` to wherever the implementation was configured to send it.
///
/// Implementations resolve their channel when they are built, never on first use.
#[async_trait::async_trait]
pub trait MessagePublisher<M: ?Sized + Sync>: Send + Sync {
    async fn publish(&self, message: &M) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<M, P> MessagePublisher<M> for Arc<P>
where
    M: ?Sized + Sync,
    P: MessagePublisher<M> + ?Sized,
{
    async fn publish(&self, message: &M) -> Result<(), TransportError> {
        (**self).publish(message).await
    }
}

/// Publishes `M` unchanged to a single channel.
#[derive(Debug)]
pub struct ChannelPublisher<T, M> {
    client: QueueClient<T>,
    channel: ChannelId,
    _message: PhantomData<fn(&M)>,
}

impl<T, M> ChannelPublisher<T, M> {
    pub fn new(client: QueueClient<T>, channel: ChannelId) -> Self {
        Self {
            client,
            channel,
            _message: PhantomData,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }
}

#[async_trait::async_trait]
impl<T, M> MessagePublisher<M> for ChannelPublisher<T, M>
where
    T: QueueTransport,
    M: Serialize + Sync,
{
    async fn publish(&self, message: &M) -> Result<(), TransportError> {
        self.client.send_message(&self.channel, message).await
    }
}
