//! Redis-backed broker using the reliable-queue pattern.
//!
//! Jobs wait in a list; `BRPOPLPUSH` leases by moving the payload into a
//! per-queue processing list in the same step, so a consumer crash never
//! loses a job. Ack removes the payload from the processing list; nack moves
//! it back to the main queue.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use strata_core::TransferJob;

use crate::broker::{BrokerError, BrokerResult, Delivery, TransferBroker};

#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> BrokerResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BrokerError::Unavailable(format!("invalid redis url: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("redis connect failed: {}", e)))?;
        tracing::info!(url = %url, "Connected transfer broker");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn processing_queue(queue: &str) -> String {
        format!("{}:processing", queue)
    }
}

fn broker_err(e: redis::RedisError) -> BrokerError {
    BrokerError::Unavailable(e.to_string())
}

#[async_trait]
impl TransferBroker for RedisBroker {
    async fn publish(&self, queue: &str, job: &TransferJob) -> BrokerResult<()> {
        let payload = job.to_payload().map_err(|e| BrokerError::Decode {
            reason: e.to_string(),
        })?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(broker_err)
    }

    async fn consume(&self, queue: &str, wait: Duration) -> BrokerResult<Option<Delivery>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(queue)
            .arg(Self::processing_queue(queue))
            .arg(wait.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(broker_err)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match TransferJob::from_payload(raw.as_bytes()) {
            Ok(job) => Ok(Some(Delivery::new(job, 0, raw))),
            Err(e) => {
                // poison message: drop it from the processing list so it
                // cannot wedge the queue, then surface the decode failure
                let _ = redis::cmd("LREM")
                    .arg(Self::processing_queue(queue))
                    .arg(-1)
                    .arg(&raw)
                    .query_async::<_, ()>(&mut conn)
                    .await;
                Err(BrokerError::Decode {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("LREM")
            .arg(Self::processing_queue(queue))
            .arg(-1)
            .arg(&delivery.raw)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(broker_err)
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        // requeue first so the job cannot vanish between the two steps
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(&delivery.raw)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(broker_err)?;
        redis::cmd("LREM")
            .arg(Self::processing_queue(queue))
            .arg(-1)
            .arg(&delivery.raw)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(broker_err)
    }
}
