//! Key-value metadata store consumed by the registry
//!
//! Named connections are persisted as property bags keyed
//! `"<namespace>.<typ>.<id>"` so the set can be rebuilt on restart. The
//! registry only needs three operations: write, delete, list-by-namespace.

mod memory;
mod redb_store;

pub use memory::MemoryConfigStore;
pub use redb_store::RedbConfigStore;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::Props;

/// Build the composite store key for one record
pub fn composite_key(namespace: &str, typ: &str, id: &str) -> String {
    format!("{namespace}.{typ}.{id}")
}

/// Keyed property-map storage for connection metadata
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Write (or overwrite) the record for `(typ, id)` under `namespace`
    async fn write(&self, namespace: &str, typ: &str, id: &str, props: &Props) -> Result<()>;

    /// Delete the record for `(typ, id)` under `namespace`; absent keys are
    /// a no-op
    async fn delete(&self, namespace: &str, typ: &str, id: &str) -> Result<()>;

    /// All records under `namespace`, keyed `"<namespace>.<typ>.<id>"`
    async fn list(&self, namespace: &str) -> Result<HashMap<String, Props>>;
}
