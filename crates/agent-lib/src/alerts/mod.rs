//! Alert lifecycle
//!
//! This module provides:
//! - A bounded, durable alert log shared by all scenarios
//! - The dispatcher that creates, stores and forwards alerts
//! - A fire-and-forget forward queue with a single delivery worker

mod dispatcher;
mod forwarder;
mod store;

#[cfg(test)]
mod tests;

pub use dispatcher::{resolve_device_id, AlertDispatcher};
pub use forwarder::{
    AlertSink, ForwardConfig, ForwardError, ForwardQueue, ForwardStats, ForwardWorker,
    HttpForwarder, PayloadShape,
};
pub use store::{AlertStore, StoreConfig, StoreError, DEFAULT_MAX_RECORDS};
