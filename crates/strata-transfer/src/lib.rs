//! Strata Transfer Pipeline
//!
//! Asynchronous cross-tier migration of merged artifacts. The dispatcher
//! publishes `TransferJob`s to a broker queue; the worker consumes them,
//! moves bytes between tiers, and records the new location. Delivery is
//! at-least-once: the worker acks only after the destination write and the
//! metadata update are durable, and job handling is idempotent under
//! redelivery.

pub mod broker;
pub mod dispatcher;
pub mod memory;
#[cfg(feature = "transfer-redis")]
pub mod redis;
pub mod supervisor;
pub mod worker;

pub use broker::{BrokerError, BrokerResult, Delivery, TransferBroker};
pub use dispatcher::TransferDispatcher;
pub use memory::MemoryBroker;
#[cfg(feature = "transfer-redis")]
pub use redis::RedisBroker;
pub use supervisor::SupervisedBroker;
pub use worker::TransferWorker;
