//! dynamik-queue — Broker plumbing between the front-end and the worker.
//!
//! - [`BrokerConnection`]: the one long-lived AMQP connection, opened at
//!   start-up and closed at shutdown, handed to the components below
//! - [`JobDispatcher`]: one durable, publisher-confirmed message per experiment
//! - [`StatusChannel`]: per-viewer exclusive subscriptions on the status exchange
//! - [`MemoryBroker`]: in-process stand-in for both, used by tests and
//!   broker-less local runs

pub mod connection;
pub mod dispatcher;
pub mod live;
pub mod memory;

pub use connection::BrokerConnection;
pub use dispatcher::{AmqpDispatcher, JobDispatcher};
pub use live::{AmqpStatusChannel, StatusChannel, StatusSubscription};
pub use memory::MemoryBroker;

use dynamik_common::DynamikError;

pub(crate) fn unavailable(err: lapin::Error) -> DynamikError {
    DynamikError::BackendUnavailable(err.to_string())
}
