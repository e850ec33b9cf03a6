//! Redis adapter for the relay's queue publisher.
//!
//! Messages land on a plain list at `<namespace>:<queue>`; the downstream
//! grader consumes with a blocking pop. One LPUSH per ingested event, no
//! deduplication here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pushgate_core::{QueuePublisher, config::QueueConfig};
use redis::{AsyncCommands, aio::MultiplexedConnection};

/// Long-lived queue handle. The multiplexed connection is shared by all
/// in-flight deliveries; cloning it is cheap and does not open new sockets.
#[derive(Clone)]
pub struct Queue {
    conn: MultiplexedConnection,
    namespace: String,
}

impl Queue {
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .with_context(|| format!("Invalid Redis URL {:?}", config.url))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;
        tracing::info!(namespace = %config.namespace, "Connected to Redis");
        Ok(Self { conn, namespace: config.namespace.clone() })
    }
}

#[async_trait]
impl QueuePublisher for Queue {
    async fn publish(&self, queue: &str, message: &str) -> Result<()> {
        let key = queue_key(&self.namespace, queue);
        let mut conn = self.conn.clone();
        let depth: i64 = conn
            .lpush(&key, message)
            .await
            .with_context(|| format!("Failed to publish to queue {key}"))?;
        tracing::debug!(queue = %key, depth, "Published message");
        Ok(())
    }
}

fn queue_key(namespace: &str, queue: &str) -> String {
    if namespace.is_empty() {
        queue.to_string()
    } else {
        format!("{namespace}:{queue}")
    }
}
