//! Redis Streams-backed queue transport (durable, at-least-once delivery).
//!
//! Each channel is one stream, read through one consumer group:
//!
//! - **send**: `XADD {channel} * payload {body}`
//! - **receive**: entries pending longer than the visibility timeout are reclaimed
//!   first (`XPENDING ... IDLE` + `XCLAIM`); otherwise new entries are read with
//!   `XREADGROUP ... BLOCK {wait} ... >`
//! - **delete**: `XACK` then `XDEL`, so acknowledged entries do not pile up
//! - **dead letter**: `XADD {channel}:dlq` with the original id, receive count,
//!   failure time and reason
//!
//! The delivery token is the stream entry id. A blocking read holds its
//! connection for the whole wait, so listeners and publishers should each own a
//! transport.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{RedisError, RedisResult};
use tracing::{debug, info, instrument, warn};

use cook_messaging::{
    ChannelId, DeliveryToken, QueueTransport, RawMessage, ReceiveOptions, TransportError,
};

use crate::config::QueueSettings;

const PAYLOAD_FIELD: &str = "payload";

/// `XREADGROUP` / `XCLAIM` reply shape: `[(stream, [(id, [(field, value)])])]`.
type StreamEntries = Vec<(String, Vec<(String, String)>)>;

pub struct RedisStreamsTransport {
    conn: ConnectionManager,
    group: String,
    consumer: String,
    visibility_timeout: Duration,
    initialized: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for RedisStreamsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsTransport")
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("visibility_timeout", &self.visibility_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStreamsTransport {
    /// Open a managed connection (reconnects on failure) for `settings.redis_url`.
    pub async fn connect(settings: &QueueSettings) -> Result<Self, TransportError> {
        let client = redis::Client::open(settings.redis_url.as_str())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        info!(
            group = %settings.consumer_group,
            consumer = %settings.consumer_name,
            "connected to redis streams"
        );

        Ok(Self {
            conn,
            group: settings.consumer_group.clone(),
            consumer: settings.consumer_name.clone(),
            visibility_timeout: settings.visibility_timeout,
            initialized: Mutex::new(HashSet::new()),
        })
    }

    /// Create the consumer group (and stream) once per channel; idempotent.
    async fn ensure_group(&self, stream: &str) -> Result<(), TransportError> {
        if self.is_initialized(stream) {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!(stream, group = %self.group, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream, group = %self.group, "consumer group already exists")
            }
            Err(e) => return Err(command_error("XGROUP CREATE", e)),
        }

        if let Ok(mut initialized) = self.initialized.lock() {
            initialized.insert(stream.to_string());
        }
        Ok(())
    }

    fn is_initialized(&self, stream: &str) -> bool {
        self.initialized
            .lock()
            .map(|set| set.contains(stream))
            .unwrap_or(false)
    }

    /// Forget the group so the next receive recreates it (stream deleted under us).
    fn forget_group(&self, stream: &str) {
        if let Ok(mut initialized) = self.initialized.lock() {
            initialized.remove(stream);
        }
    }

    /// Take over entries whose previous delivery was never acknowledged in time.
    async fn reclaim_expired(
        &self,
        stream: &str,
        max_messages: usize,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let mut conn = self.conn.clone();
        let idle_ms = self.visibility_timeout.as_millis() as u64;

        // (id, consumer, idle ms, deliveries so far)
        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(stream)
            .arg(&self.group)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(max_messages)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("XPENDING", e))?;

        if pending.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<&str> = pending.iter().map(|(id, ..)| id.as_str()).collect();
        let claimed: StreamEntries = redis::cmd("XCLAIM")
            .arg(stream)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(idle_ms)
            .arg(&ids)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("XCLAIM", e))?;

        let messages: Vec<RawMessage> = claimed
            .into_iter()
            .filter_map(|(id, fields)| {
                let deliveries = pending
                    .iter()
                    .find(|(pending_id, ..)| *pending_id == id)
                    .map(|(_, _, _, count)| *count)
                    .unwrap_or(0);
                entry_to_message(id, fields, receive_count(deliveries + 1))
            })
            .collect();

        if !messages.is_empty() {
            debug!(stream, count = messages.len(), "reclaimed expired deliveries");
        }
        Ok(messages)
    }

    async fn read_new(
        &self,
        stream: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(&self.group).arg(&self.consumer);
        let block_ms = options.wait.as_millis() as u64;
        if block_ms > 0 {
            cmd.arg("BLOCK").arg(block_ms);
        }
        cmd.arg("COUNT")
            .arg(options.max_messages)
            .arg("STREAMS")
            .arg(stream)
            .arg(">");

        let result: RedisResult<Option<Vec<(String, StreamEntries)>>> = cmd.query_async(&mut conn).await;

        match result {
            Ok(Some(streams)) => Ok(streams
                .into_iter()
                .flat_map(|(_, entries)| entries)
                .filter_map(|(id, fields)| entry_to_message(id, fields, 1))
                .collect()),
            Ok(None) => Ok(vec![]),
            Err(e) if e.to_string().contains("NOGROUP") => {
                warn!(stream, group = %self.group, "consumer group vanished; recreating");
                self.forget_group(stream);
                self.ensure_group(stream).await?;
                Ok(vec![])
            }
            Err(e) => Err(command_error("XREADGROUP", e)),
        }
    }
}

#[async_trait::async_trait]
impl QueueTransport for RedisStreamsTransport {
    #[instrument(skip(self, body), fields(stream = %channel), err)]
    async fn send(&self, channel: &ChannelId, body: &str) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("XADD")
            .arg(channel.as_str())
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("XADD", e))?;
        Ok(())
    }

    async fn receive(
        &self,
        channel: &ChannelId,
        options: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let stream = channel.as_str();
        self.ensure_group(stream).await?;

        let reclaimed = self.reclaim_expired(stream, options.max_messages).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        self.read_new(stream, options).await
    }

    async fn delete(&self, channel: &ChannelId, token: &DeliveryToken) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();

        let acked: u64 = redis::cmd("XACK")
            .arg(channel.as_str())
            .arg(&self.group)
            .arg(token.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("XACK", e))?;

        if acked == 0 {
            return Err(TransportError::Command(format!(
                "delivery {token} is not pending on {channel}"
            )));
        }

        let _: u64 = redis::cmd("XDEL")
            .arg(channel.as_str())
            .arg(token.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("XDEL", e))?;
        Ok(())
    }

    async fn dead_letter(
        &self,
        channel: &ChannelId,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("XADD")
            .arg(dead_letter_key(channel))
            .arg("*")
            .arg("original_id")
            .arg(message.token.as_str())
            .arg("receive_count")
            .arg(message.receive_count)
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("reason")
            .arg(reason)
            .arg(PAYLOAD_FIELD)
            .arg(&message.body)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("DLQ XADD", e))?;

        warn!(
            stream = %channel,
            message_id = %message.token,
            receive_count = message.receive_count,
            "message sent to dead-letter queue"
        );
        Ok(())
    }
}

fn dead_letter_key(channel: &ChannelId) -> String {
    format!("{}:dlq", channel.as_str())
}

fn receive_count(deliveries: u64) -> u32 {
    u32::try_from(deliveries).unwrap_or(u32::MAX)
}

/// Entries without a payload field are not ours; they are skipped (and stay pending).
fn entry_to_message(id: String, fields: Vec<(String, String)>, receive_count: u32) -> Option<RawMessage> {
    let body = fields
        .into_iter()
        .find(|(field, _)| field == PAYLOAD_FIELD)
        .map(|(_, value)| value);

    match body {
        Some(body) => Some(RawMessage {
            token: DeliveryToken::new(id),
            body,
            receive_count,
        }),
        None => {
            warn!(message_id = %id, "stream entry has no payload field; skipping");
            None
        }
    }
}

fn command_error(command: &str, e: RedisError) -> TransportError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        TransportError::Connection(format!("{command} failed: {e}"))
    } else {
        TransportError::Command(format!("{command} failed: {e}"))
    }
}
