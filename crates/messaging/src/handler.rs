use std::sync::Arc;

use serde::de::DeserializeOwned;

/// Processes one decoded message.
///
/// Delivery is at-least-once, so `handle` must tolerate seeing the same logical
/// message twice (e.g. treat "already exists" as done).
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    type Message: DeserializeOwned + Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, message: Self::Message) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<H> MessageHandler for Arc<H>
where
    H: MessageHandler + ?Sized,
{
    type Message = H::Message;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn handle(&self, message: Self::Message) -> anyhow::Result<()> {
        (**self).handle(message).await
    }
}
