//! In-memory queue transport for tests/dev.
//!
//! Models the managed-queue contract: received messages become invisible for the
//! visibility timeout and are handed out again (with a fresh token) unless deleted
//! first.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::queue::{ChannelId, DeliveryToken, QueueTransport, RawMessage, ReceiveOptions, TransportError};

#[derive(Debug)]
struct Entry {
    body: String,
    token: Option<DeliveryToken>,
    invisible_until: Option<Instant>,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct State {
    channels: HashMap<ChannelId, Vec<Entry>>,
    dead_letters: HashMap<ChannelId, Vec<(RawMessage, String)>>,
}

#[derive(Debug)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    arrivals: Notify,
    visibility_timeout: Duration,
    closed: AtomicBool,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            arrivals: Notify::new(),
            visibility_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Messages still on `channel`, in flight or not.
    pub fn len(&self, channel: &ChannelId) -> usize {
        self.state
            .lock()
            .map(|s| s.channels.get(channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, channel: &ChannelId) -> bool {
        self.len(channel) == 0
    }

    /// Bodies currently on `channel`, oldest first.
    pub fn bodies(&self, channel: &ChannelId) -> Vec<String> {
        self.state
            .lock()
            .map(|s| {
                s.channels
                    .get(channel)
                    .map(|entries| entries.iter().map(|e| e.body.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn dead_letters(&self, channel: &ChannelId) -> Vec<(RawMessage, String)> {
        self.state
            .lock()
            .map(|s| s.dead_letters.get(channel).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Make every subsequent call fail, as if the transport went away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.arrivals.notify_waiters();
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed("in-memory queue closed".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, TransportError> {
        self.state
            .lock()
            .map_err(|_| TransportError::Command("in-memory queue lock poisoned".to_string()))
    }

    /// Hand out up to `max` visible messages; also report when the next hidden one reappears.
    fn take_visible(
        &self,
        channel: &ChannelId,
        max: usize,
        now: Instant,
    ) -> Result<(Vec<RawMessage>, Option<Instant>), TransportError> {
        let mut state = self.lock()?;
        let Some(entries) = state.channels.get_mut(channel) else {
            return Ok((vec![], None));
        };

        let mut batch = Vec::new();
        let mut next_visible: Option<Instant> = None;

        for entry in entries.iter_mut() {
            match entry.invisible_until {
                Some(until) if until > now => {
                    next_visible = Some(next_visible.map_or(until, |n| n.min(until)));
                }
                _ if batch.len() < max => {
                    let token = DeliveryToken::new(Uuid::now_v7().to_string());
                    entry.token = Some(token.clone());
                    entry.invisible_until = Some(now + self.visibility_timeout);
                    entry.receive_count += 1;
                    batch.push(RawMessage {
                        token,
                        body: entry.body.clone(),
                        receive_count: entry.receive_count,
                    });
                }
                _ => {}
            }
        }

        Ok((batch, next_visible))
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait::async_trait]
impl QueueTransport for InMemoryQueue {
    async fn send(&self, channel: &ChannelId, body: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.lock()?.channels.entry(channel.clone()).or_default().push(Entry {
            body: body.to_string(),
            token: None,
            invisible_until: None,
            receive_count: 0,
        });
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        channel: &ChannelId,
        options: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let deadline = Instant::now() + options.wait;

        loop {
            // Register interest before looking so a concurrent send is not missed.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            self.ensure_open()?;
            let now = Instant::now();
            let (batch, next_visible) = self.take_visible(channel, options.max_messages, now)?;
            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }

            let wake_at = next_visible.map_or(deadline, |n| n.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, arrival).await;
        }
    }

    async fn delete(&self, channel: &ChannelId, token: &DeliveryToken) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut state = self.lock()?;
        let entries = state.channels.entry(channel.clone()).or_default();
        let before = entries.len();
        entries.retain(|e| e.token.as_ref() != Some(token));

        if entries.len() == before {
            return Err(TransportError::Command(format!(
                "unknown or expired delivery token {token} on {channel}"
            )));
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        channel: &ChannelId,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.lock()?
            .dead_letters
            .entry(channel.clone())
            .or_default()
            .push((message.clone(), reason.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> ReceiveOptions {
        ReceiveOptions::default().with_wait(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn received_message_is_hidden_until_timeout() {
        let queue = InMemoryQueue::new(Duration::from_secs(60));
        let channel = ChannelId::new("q", "a");
        queue.send(&channel, "one").await.unwrap();

        let first = queue.receive(&channel, quick()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].receive_count, 1);

        let second = queue.receive(&channel, quick()).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(queue.len(&channel), 1);
    }

    #[tokio::test]
    async fn expired_message_is_redelivered_with_new_token() {
        let queue = InMemoryQueue::new(Duration::ZERO);
        let channel = ChannelId::new("q", "a");
        queue.send(&channel, "one").await.unwrap();

        let first = queue.receive(&channel, quick()).await.unwrap();
        let second = queue.receive(&channel, quick()).await.unwrap();
        assert_eq!(second[0].receive_count, 2);
        assert_ne!(first[0].token, second[0].token);

        // the stale token no longer deletes anything
        assert!(queue.delete(&channel, &first[0].token).await.is_err());
        queue.delete(&channel, &second[0].token).await.unwrap();
        assert!(queue.is_empty(&channel));
    }

    #[tokio::test]
    async fn batch_is_capped() {
        let queue = InMemoryQueue::default();
        let channel = ChannelId::new("q", "a");
        for i in 0..5 {
            queue.send(&channel, &i.to_string()).await.unwrap();
        }

        let batch = queue
            .receive(&channel, quick().with_max_messages(3))
            .await
            .unwrap();
        let bodies: Vec<_> = batch.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn long_poll_wakes_on_send() {
        let queue = std::sync::Arc::new(InMemoryQueue::default());
        let channel = ChannelId::new("q", "a");

        let waiter = {
            let queue = queue.clone();
            let channel = channel.clone();
            tokio::spawn(async move {
                queue
                    .receive(&channel, ReceiveOptions::default().with_wait(Duration::from_secs(10)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(&channel, "late").await.unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("receive did not wake up")
            .unwrap()
            .unwrap();
        assert_eq!(batch[0].body, "late");
    }

    #[tokio::test]
    async fn closed_queue_fails_receive() {
        let queue = InMemoryQueue::default();
        queue.close();
        let err = queue
            .receive(&ChannelId::new("q", "a"), quick())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
    }
}
