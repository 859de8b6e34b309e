//! Transfer broker abstraction trait.

use async_trait::async_trait;
use std::time::Duration;
use strata_core::{AppError, TransferJob};
use thiserror::Error;

/// Broker operation errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed job payload: {reason}")]
    Decode { reason: String },
}

pub type BrokerResult<T> = Result<T, BrokerError>;

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Unavailable(msg) => AppError::BrokerUnavailable(msg),
            BrokerError::Decode { .. } => AppError::Internal(err.to_string()),
        }
    }
}

/// One in-flight job handed to a consumer. The job stays owned by the broker
/// (redeliverable) until acked.
#[derive(Debug)]
pub struct Delivery {
    pub job: TransferJob,
    /// Backend-specific handle for ack/nack bookkeeping.
    pub(crate) token: u64,
    /// Raw payload as it sits in the queue.
    pub(crate) raw: String,
}

impl Delivery {
    pub(crate) fn new(job: TransferJob, token: u64, raw: String) -> Self {
        Self { job, token, raw }
    }
}

/// At-least-once job queue.
///
/// `consume` leases a job; the lease ends with `ack` (done, drop it) or
/// `nack` (failed, requeue for redelivery). A consumer that dies without
/// acking leaves the job in the backend's in-flight area for recovery.
#[async_trait]
pub trait TransferBroker: Send + Sync {
    /// Enqueue a job. Durable in the broker when this returns.
    async fn publish(&self, queue: &str, job: &TransferJob) -> BrokerResult<()>;

    /// Lease the next job, waiting up to `wait`. `None` on timeout.
    async fn consume(&self, queue: &str, wait: Duration) -> BrokerResult<Option<Delivery>>;

    /// Finish a lease: the job is done and leaves the broker.
    async fn ack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()>;

    /// Abort a lease: the job returns to the queue for redelivery.
    async fn nack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()>;
}
