//! rill-connection - shared connection registry for rill pipelines
//!
//! Rule pipelines (sources and sinks) need long-lived, typed connections to
//! brokers, databases and HTTP endpoints. Instead of every pipeline opening
//! its own, the registry multiplexes them by a stable id:
//!
//! - multiple pipelines attach to one named connection via the
//!   `connectionSelector` property and are reference-counted;
//! - anonymous connections are created per pipeline and closed on detach;
//! - initial construction retries transient I/O failures under an
//!   exponential backoff budget, while configuration failures surface
//!   immediately;
//! - named-connection metadata is persisted to a key-value store and the
//!   set is rebuilt on restart, keeping a record of entries whose
//!   reconstruction failed.
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_connection::{
//!     ConnectionConfig, ConnectionManager, FactoryRegistry, MemoryConfigStore, StreamContext,
//! };
//! use std::sync::Arc;
//!
//! let mut factories = FactoryRegistry::new();
//! factories.register("mqtt", Arc::new(MqttConnectionFactory));
//!
//! let manager = ConnectionManager::new(
//!     Arc::new(MemoryConfigStore::new()),
//!     factories,
//!     &ConnectionConfig::default(),
//! );
//! manager.reload().await?;
//!
//! let ctx = StreamContext::new();
//! let conn = manager
//!     .create_named_connection(&ctx, "broker1", "mqtt", props)
//!     .await?;
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionFactory, FactoryRegistry};
pub use context::StreamContext;
pub use error::{ConnectionError, Result};
pub use manager::{ConnectionManager, CONNECTION_NAMESPACE};
pub use store::{ConfigStore, MemoryConfigStore, RedbConfigStore};
pub use types::{
    extract_selector, ConnectionState, ConnectionStatus, Props, CONNECTION_SELECTOR_KEY,
};
