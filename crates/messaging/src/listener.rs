//! Long-polling consumer loop.
//!
//! `Polling -> Dispatching -> Acknowledging -> Polling -> ...` until either the
//! shutdown signal fires (clean exit) or a receive call fails (fatal exit).
//!
//! Per message:
//! - handler success: acknowledge (delete) the delivery
//! - handler or decode failure: log it and leave the delivery unacknowledged so the
//!   transport redelivers it after its visibility timeout
//! - failure on the `max_receive_count`-th delivery: move it to the dead-letter
//!   queue, then acknowledge it
//!
//! Messages of one batch are handled sequentially, in transport order.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::client::{Delivery, QueueClient};
use crate::handler::MessageHandler;
use crate::queue::{ChannelId, DeliveryToken, QueueTransport, RawMessage, TransportError};

/// `{receive, handle, acknowledge}` seen by [`run_listener`].
#[async_trait::async_trait]
pub trait Listener: Send + Sync {
    type Message: Send;

    fn name(&self) -> &str;

    async fn receive(&self) -> Result<Vec<Delivery<Self::Message>>, TransportError>;

    async fn handle(&self, message: Self::Message) -> anyhow::Result<()>;

    async fn acknowledge(&self, token: &DeliveryToken) -> Result<(), TransportError>;

    async fn dead_letter(&self, message: &RawMessage, reason: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Dead-letter a failing message once it has been received this many times.
    /// `None` retries forever.
    pub max_receive_count: Option<u32>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_receive_count: Some(5),
        }
    }
}

/// Run `listener` until shutdown (`Ok`) or a transport failure on receive (`Err`).
///
/// Flip the watch value to `true` (or drop the sender) to stop. A pending long poll
/// is abandoned; a message that is being handled finishes first.
pub async fn run_listener<L>(
    listener: &L,
    config: ListenerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError>
where
    L: Listener + ?Sized,
{
    info!(listener = listener.name(), "listener started");

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }

        let received = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            received = listener.receive() => received,
        };

        let batch = match received {
            Ok(batch) => batch,
            Err(err) => {
                error!(listener = listener.name(), error = %err, "receive failed; listener stopping");
                return Err(err);
            }
        };

        if !batch.is_empty() {
            debug!(listener = listener.name(), count = batch.len(), "received batch");
        }

        for delivery in batch {
            dispatch(listener, config, delivery).await;
        }
    }

    info!(listener = listener.name(), "listener stopped");
    Ok(())
}

async fn dispatch<L>(listener: &L, config: ListenerConfig, delivery: Delivery<L::Message>)
where
    L: Listener + ?Sized,
{
    let Delivery { raw, payload } = delivery;

    let outcome = match payload {
        Ok(message) => listener.handle(message).await.map_err(|e| format!("{e:#}")),
        Err(err) => Err(err.to_string()),
    };

    let reason = match outcome {
        Ok(()) => {
            acknowledge(listener, &raw.token).await;
            return;
        }
        Err(reason) => reason,
    };

    let exhausted = config
        .max_receive_count
        .is_some_and(|max| raw.receive_count >= max);

    if !exhausted {
        warn!(
            listener = listener.name(),
            token = %raw.token,
            receive_count = raw.receive_count,
            error = %reason,
            "message handling failed; left for redelivery"
        );
        return;
    }

    match listener.dead_letter(&raw, &reason).await {
        Ok(()) => {
            error!(
                listener = listener.name(),
                token = %raw.token,
                receive_count = raw.receive_count,
                error = %reason,
                "message handling failed repeatedly; moved to dead-letter queue"
            );
            acknowledge(listener, &raw.token).await;
        }
        Err(err) => {
            error!(
                listener = listener.name(),
                token = %raw.token,
                error = %reason,
                dead_letter_error = %err,
                "message handling failed and dead-lettering failed; left for redelivery"
            );
        }
    }
}

async fn acknowledge<L>(listener: &L, token: &DeliveryToken)
where
    L: Listener + ?Sized,
{
    // The message comes back after the visibility timeout; handlers are idempotent.
    if let Err(err) = listener.acknowledge(token).await {
        warn!(listener = listener.name(), token = %token, error = %err, "acknowledge failed");
    }
}

/// A [`Listener`] that polls one channel and feeds a [`MessageHandler`].
#[derive(Debug)]
pub struct QueueListener<T, H> {
    client: QueueClient<T>,
    channel: ChannelId,
    handler: H,
}

impl<T, H> QueueListener<T, H> {
    pub fn new(client: QueueClient<T>, channel: ChannelId, handler: H) -> Self {
        Self {
            client,
            channel,
            handler,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }
}

#[async_trait::async_trait]
impl<T, H> Listener for QueueListener<T, H>
where
    T: QueueTransport,
    H: MessageHandler,
{
    type Message = H::Message;

    fn name(&self) -> &str {
        self.handler.name()
    }

    async fn receive(&self) -> Result<Vec<Delivery<Self::Message>>, TransportError> {
        self.client.receive_messages(&self.channel).await
    }

    async fn handle(&self, message: Self::Message) -> anyhow::Result<()> {
        self.handler.handle(message).await
    }

    async fn acknowledge(&self, token: &DeliveryToken) -> Result<(), TransportError> {
        self.client.delete_message(&self.channel, token).await
    }

    async fn dead_letter(&self, message: &RawMessage, reason: &str) -> Result<(), TransportError> {
        self.client.dead_letter(&self.channel, message, reason).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::in_memory_queue::InMemoryQueue;
    use crate::publisher::{ChannelPublisher, MessagePublisher};
    use crate::queue::ReceiveOptions;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct IdMessage {
        id: String,
    }

    /// Records every id it sees; fails for ids listed in `fail_on`.
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
        fail_on: Vec<String>,
    }

    #[async_trait::async_trait]
    impl MessageHandler for RecordingHandler {
        type Message = IdMessage;

        fn name(&self) -> &'static str {
            "recording"
        }

        async fn handle(&self, message: IdMessage) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(message.id.clone());
            if self.fail_on.contains(&message.id) {
                anyhow::bail!("refusing {}", message.id);
            }
            Ok(())
        }
    }

    fn client(queue: &Arc<InMemoryQueue>) -> QueueClient<Arc<InMemoryQueue>> {
        QueueClient::new(queue.clone()).with_receive_options(
            ReceiveOptions::default()
                .with_wait(Duration::from_millis(20))
                .with_max_messages(10),
        )
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn published_message_is_handled_then_deleted() {
        let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
        let channel = ChannelId::new("test", "Q");
        let publisher: ChannelPublisher<_, IdMessage> = ChannelPublisher::new(client(&queue), channel.clone());
        publisher
            .publish(&IdMessage { id: "123-uuid".to_string() })
            .await
            .unwrap();

        let handler = Arc::new(RecordingHandler::default());
        let listener = Arc::new(QueueListener::new(client(&queue), channel.clone(), handler.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { run_listener(&*listener, ListenerConfig::default(), stop_rx).await })
        };

        wait_until(|| queue.len(&channel) == 0).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(*handler.seen.lock().unwrap(), vec!["123-uuid".to_string()]);

        let again = client(&queue).receive_messages::<IdMessage>(&channel).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn handler_failure_does_not_stop_the_loop() {
        let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
        let channel = ChannelId::new("test", "Q");
        let sender = client(&queue);
        sender.send_message(&channel, &IdMessage { id: "M".into() }).await.unwrap();
        sender.send_message(&channel, &IdMessage { id: "M2".into() }).await.unwrap();

        let handler = Arc::new(RecordingHandler {
            fail_on: vec!["M".to_string()],
            ..Default::default()
        });
        let listener = Arc::new(QueueListener::new(client(&queue), channel.clone(), handler.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { run_listener(&*listener, ListenerConfig::default(), stop_rx).await })
        };

        wait_until(|| handler.seen.lock().unwrap().contains(&"M2".to_string())).await;
        // M2 acknowledged, M still waiting for redelivery.
        wait_until(|| queue.len(&channel) == 1).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failing_message_is_dead_lettered_after_max_receives() {
        // Zero visibility timeout: a failed message is immediately receivable again.
        let queue = Arc::new(InMemoryQueue::new(Duration::ZERO));
        let channel = ChannelId::new("test", "Q");
        client(&queue)
            .send_message(&channel, &IdMessage { id: "poison".into() })
            .await
            .unwrap();

        let handler = Arc::new(RecordingHandler {
            fail_on: vec!["poison".to_string()],
            ..Default::default()
        });
        let listener = QueueListener::new(client(&queue), channel.clone(), handler.clone());
        let (stop_tx, stop_rx) = watch::channel(false);
        let config = ListenerConfig {
            max_receive_count: Some(3),
        };

        let run = run_listener(&listener, config, stop_rx);
        let stop = async {
            wait_until(|| queue.len(&channel) == 0).await;
            stop_tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(run, stop);
        result.unwrap();

        assert_eq!(handler.seen.lock().unwrap().len(), 3);
        let dead = queue.dead_letters(&channel);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].0.receive_count, 3);
        assert!(dead[0].1.contains("refusing poison"));
    }

    #[tokio::test]
    async fn undecodable_message_is_left_unacknowledged() {
        let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
        let channel = ChannelId::new("test", "Q");
        queue.send(&channel, "{id: }").await.unwrap();
        queue.send(&channel, "{id: \"ok\"}").await.unwrap();

        let handler = Arc::new(RecordingHandler::default());
        let listener = QueueListener::new(client(&queue), channel.clone(), handler.clone());
        let (stop_tx, stop_rx) = watch::channel(false);

        let run = run_listener(&listener, ListenerConfig::default(), stop_rx);
        let stop = async {
            wait_until(|| handler.seen.lock().unwrap().len() == 1).await;
            stop_tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(run, stop);
        result.unwrap();

        // the repaired near-JSON message was handled, the broken one stays queued
        assert_eq!(*handler.seen.lock().unwrap(), vec!["ok".to_string()]);
        assert_eq!(queue.len(&channel), 1);
    }

    #[tokio::test]
    async fn receive_failure_stops_the_loop_with_error() {
        let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
        let channel = ChannelId::new("test", "Q");
        let listener = QueueListener::new(client(&queue), channel, Arc::new(RecordingHandler::default()));
        let (_stop_tx, stop_rx) = watch::channel(false);

        queue.close();
        let err = run_listener(&listener, ListenerConfig::default(), stop_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_long_poll() {
        let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
        let channel = ChannelId::new("test", "idle");
        let slow_client = QueueClient::new(queue.clone())
            .with_receive_options(ReceiveOptions::default().with_wait(Duration::from_secs(3600)));
        let listener = QueueListener::new(slow_client, channel, Arc::new(RecordingHandler::default()));
        let (stop_tx, stop_rx) = watch::channel(false);

        let run = run_listener(&listener, ListenerConfig::default(), stop_rx);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop_tx.send(true).unwrap();
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, stop) })
            .await
            .expect("listener did not stop");
        result.unwrap();
    }
}
