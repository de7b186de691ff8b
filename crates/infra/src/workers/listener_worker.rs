use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use cook_messaging::{Listener, ListenerConfig, TransportError, run_listener};

/// Handle to stop and join a listener task.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<Result<(), TransportError>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request graceful shutdown and wait for the listener to stop.
    ///
    /// A message being handled is finished first; a pending long poll is dropped.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        let _ = self.shutdown.send(true);
        match self.join.await {
            Ok(result) => {
                info!(worker = %self.name, "worker stopped");
                result
            }
            Err(err) => {
                error!(worker = %self.name, error = %err, "worker task panicked or was cancelled");
                Err(TransportError::Closed(format!("worker {} aborted: {err}", self.name)))
            }
        }
    }
}

/// Run `listener` on its own tokio task until [`WorkerHandle::shutdown`].
pub fn spawn_listener<L>(listener: L, config: ListenerConfig) -> WorkerHandle
where
    L: Listener + 'static,
{
    let name = listener.name().to_string();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task_name = name.clone();
    let join = tokio::spawn(async move {
        let result = run_listener(&listener, config, shutdown_rx).await;
        if let Err(err) = &result {
            error!(worker = %task_name, error = %err, "listener exited with transport failure");
        }
        result
    });

    WorkerHandle {
        name,
        shutdown: shutdown_tx,
        join,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde::Deserialize;

    use cook_messaging::{
        ChannelId, InMemoryQueue, MessageHandler, QueueClient, QueueListener, QueueTransport,
        ReceiveOptions,
    };

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Ping {
        #[allow(dead_code)]
        n: u32,
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait::async_trait]
    impl MessageHandler for Counter {
        type Message = Ping;

        fn name(&self) -> &'static str {
            "counter"
        }

        async fn handle(&self, _: Ping) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn listener(queue: &Arc<InMemoryQueue>, handler: Arc<Counter>) -> QueueListener<Arc<InMemoryQueue>, Arc<Counter>> {
        let client = QueueClient::new(queue.clone())
            .with_receive_options(ReceiveOptions::default().with_wait(Duration::from_secs(60)));
        QueueListener::new(client, ChannelId::new("cook", "pings"), handler)
    }

    #[tokio::test]
    async fn worker_processes_until_shutdown() {
        let queue = Arc::new(InMemoryQueue::default());
        let counter = Arc::new(Counter::default());
        let handle = spawn_listener(listener(&queue, counter.clone()), ListenerConfig::default());
        assert_eq!(handle.name(), "counter");

        queue.send(&ChannelId::new("cook", "pings"), r#"{"n":1}"#).await.unwrap();
        for _ in 0..200 {
            if counter.0.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown hung")
            .unwrap();
    }

    #[tokio::test]
    async fn transport_failure_surfaces_on_shutdown() {
        let queue = Arc::new(InMemoryQueue::default());
        queue.close();
        let handle = spawn_listener(listener(&queue, Arc::new(Counter::default())), ListenerConfig::default());

        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
    }
}
