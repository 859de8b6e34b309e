//! In-memory broker for tests and single-node development.
//!
//! Honors the full lease protocol: consumed jobs sit in an in-flight table
//! until acked, and a nack puts them back at the head of the queue.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_core::TransferJob;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::broker::{BrokerError, BrokerResult, Delivery, TransferBroker};

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<(u64, String)>>,
    in_flight: HashMap<u64, (String, String)>,
    next_token: u64,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
    offline: Arc<AtomicBool>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a broker outage: while offline every operation fails with
    /// `Unavailable`. Lets callers exercise their reconnect/fail-fast paths.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        if !offline {
            self.notify.notify_waiters();
        }
    }

    fn check_online(&self) -> BrokerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }
        Ok(())
    }

    /// Jobs currently leased but not yet acked.
    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Jobs waiting in `queue`.
    pub async fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    async fn try_lease(&self, queue: &str) -> BrokerResult<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let Some(entries) = state.queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some((token, raw)) = entries.pop_front() else {
            return Ok(None);
        };
        state
            .in_flight
            .insert(token, (queue.to_string(), raw.clone()));

        let job = TransferJob::from_payload(raw.as_bytes()).map_err(|e| BrokerError::Decode {
            reason: e.to_string(),
        })?;
        Ok(Some(Delivery::new(job, token, raw)))
    }
}

#[async_trait]
impl TransferBroker for MemoryBroker {
    async fn publish(&self, queue: &str, job: &TransferJob) -> BrokerResult<()> {
        self.check_online()?;
        let raw = String::from_utf8(job.to_payload().map_err(|e| BrokerError::Decode {
            reason: e.to_string(),
        })?)
        .map_err(|e| BrokerError::Decode {
            reason: e.to_string(),
        })?;

        let mut state = self.state.lock().await;
        state.next_token += 1;
        let token = state.next_token;
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back((token, raw));
        drop(state);

        self.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, queue: &str, wait: Duration) -> BrokerResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            self.check_online()?;
            // register before checking so a publish between check and wait
            // still wakes us
            let notified = self.notify.notified();
            if let Some(delivery) = self.try_lease(queue).await? {
                return Ok(Some(delivery));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, _queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        self.check_online()?;
        self.state.lock().await.in_flight.remove(&delivery.token);
        Ok(())
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> BrokerResult<()> {
        self.check_online()?;
        let mut state = self.state.lock().await;
        if let Some((_, raw)) = state.in_flight.remove(&delivery.token) {
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_front((delivery.token, raw));
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }
}
