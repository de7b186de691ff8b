use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::envelope::{self, DecodeError};
use crate::queue::{ChannelId, DeliveryToken, QueueTransport, RawMessage, ReceiveOptions, TransportError};

/// A received message with its decoded payload.
///
/// Decoding is per message: one undecodable body does not fail the batch.
#[derive(Debug)]
pub struct Delivery<M> {
    pub raw: RawMessage,
    pub payload: Result<M, DecodeError>,
}

/// Typed send/receive/delete on top of a [`QueueTransport`].
#[derive(Debug, Clone)]
pub struct QueueClient<T> {
    transport: T,
    options: ReceiveOptions,
}

impl<T> QueueClient<T>
where
    T: QueueTransport,
{
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            options: ReceiveOptions::default(),
        }
    }

    pub fn with_receive_options(mut self, options: ReceiveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[instrument(skip(self, payload), fields(channel = %channel), err)]
    pub async fn send_message<P>(&self, channel: &ChannelId, payload: &P) -> Result<(), TransportError>
    where
        P: Serialize + ?Sized + Sync,
    {
        let body = envelope::encode(payload)?;
        self.transport.send(channel, &body).await?;
        debug!(bytes = body.len(), "message sent");
        Ok(())
    }

    /// Long-poll for a batch using the client's [`ReceiveOptions`].
    pub async fn receive_messages<M>(&self, channel: &ChannelId) -> Result<Vec<Delivery<M>>, TransportError>
    where
        M: DeserializeOwned,
    {
        let batch = self.transport.receive(channel, self.options).await?;
        Ok(batch
            .into_iter()
            .map(|raw| {
                let payload = envelope::decode(&raw.body);
                Delivery { raw, payload }
            })
            .collect())
    }

    pub async fn delete_message(&self, channel: &ChannelId, token: &DeliveryToken) -> Result<(), TransportError> {
        self.transport.delete(channel, token).await
    }

    pub async fn dead_letter(
        &self,
        channel: &ChannelId,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.transport.dead_letter(channel, message, reason).await
    }
}
