//! Connection supervision for the transfer broker.
//!
//! Wraps a broker behind a health flag. A failed operation marks the
//! connection unhealthy; `publish` then retries once after a short delay, and
//! callers arriving during the unhealthy window wait on a bounded acquire
//! instead of piling onto a dead connection. A job that still cannot be
//! published is reported to the caller, never dropped.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use strata_core::TransferJob;
use tokio::sync::watch;

use crate::broker::{BrokerError, BrokerResult, Delivery, TransferBroker};

pub struct SupervisedBroker {
    inner: Arc<dyn TransferBroker>,
    healthy: watch::Sender<bool>,
    retry_delay: Duration,
    acquire_timeout: Duration,
}

impl SupervisedBroker {
    pub fn new(inner: Arc<dyn TransferBroker>) -> Self {
        Self::with_timing(inner, Duration::from_millis(500), Duration::from_secs(2))
    }

    pub fn with_timing(
        inner: Arc<dyn TransferBroker>,
        retry_delay: Duration,
        acquire_timeout: Duration,
    ) -> Self {
        let (healthy, _) = watch::channel(true);
        Self {
            inner,
            healthy,
            retry_delay,
            acquire_timeout,
        }
    }

    /// Observe connection health, e.g. for a readiness probe.
    pub fn health(&self) -> watch::Receiver<bool> {
        self.healthy.subscribe()
    }

    fn mark(&self, healthy: bool) {
        self.healthy.send_replace(healthy);
    }

    /// Bounded wait for the connection to come back. Fails fast once the
    /// acquire window is spent.
    async fn acquire(&self) -> BrokerResult<()> {
        if *self.healthy.borrow() {
            return Ok(());
        }
        let mut rx = self.healthy.subscribe();
        tokio::time::timeout(self.acquire_timeout, rx.wait_for(|h| *h))
            .await
            .map_err(|_| {
                BrokerError::Unavailable("broker reconnect in progress".to_string())
            })?
            .map_err(|_| BrokerError::Unavailable("broker supervisor gone".to_string()))?;
        Ok(())
    }

    fn record<T>(&self, result: BrokerResult<T>) -> BrokerResult<T> {
        match &result {
            Ok(_) => self.mark(true),
            Err(BrokerError::Unavailable(_)) => self.mark(false),
            Err(_) => {}
        }
        result
    }
}

#[async_trait]
impl TransferBroker for SupervisedBroker {
    async fn publish(&self, queue: &str, job: &TransferJob) -> BrokerResult<()> {
        self.acquire().await?;

        match self.record(self.inner.publish(queue, job).await) {
            Ok(()) => Ok(()),
            Err(BrokerError::Unavailable(first)) => {
                tracing::warn!(queue = %queue, error = %first, "Publish failed, retrying after reconnect delay");
                tokio::time::sleep(self.retry_delay).await;
                self.record(self.inner.publish(queue, job).await)
                    .map_err(|e| {
                        tracing::error!(
                            queue = %queue,
                            content_hash = %job.content_hash,
                            error = %e,
                            "Publish failed after retry; job not enqueued"
                        );
                        e
                    })
            }
            Err(e) => Err(e),
        }
    }

    async fn consume(&self, queue: &str, wait: Duration) -> BrokerResult<Option<Delivery>> {
        self.record(self.inner.consume(queue, wait).await)
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        self.record(self.inner.ack(queue, delivery).await)
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        self.record(self.inner.nack(queue, delivery).await)
    }
}
