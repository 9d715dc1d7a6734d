//! redb-based metadata store
//!
//! Pure Rust persistence with ACID transactions and zero C dependencies.
//! One table maps the composite `"<namespace>.<typ>.<id>"` key to the
//! JSON-serialized property bag.

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{composite_key, ConfigStore};
use crate::error::{ConnectionError, Result};
use crate::types::Props;

/// Table for connection metadata (key: composite string, value: JSON props)
const CFG_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("connection_cfg");

/// redb-backed metadata store
pub struct RedbConfigStore {
    db: Database,
}

impl RedbConfigStore {
    /// Open (or create) the database at the given path.
    ///
    /// Creates the parent directory and the table if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConnectionError::storage(format!("failed to create dir: {e}")))?;
        }

        let db = Database::create(path)
            .map_err(|e| ConnectionError::storage(format!("failed to open redb: {e}")))?;

        {
            let write_txn = db
                .begin_write()
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
            {
                let _ = write_txn
                    .open_table(CFG_TABLE)
                    .map_err(|e| ConnectionError::storage(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
        }

        info!(path = %path.display(), "opened redb connection metadata store");

        Ok(Self { db })
    }
}

#[async_trait]
impl ConfigStore for RedbConfigStore {
    async fn write(&self, namespace: &str, typ: &str, id: &str, props: &Props) -> Result<()> {
        let key = composite_key(namespace, typ, id);
        let bytes = serde_json::to_vec(props)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| ConnectionError::storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(CFG_TABLE)
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| ConnectionError::storage(e.to_string()))
    }

    async fn delete(&self, namespace: &str, typ: &str, id: &str) -> Result<()> {
        let key = composite_key(namespace, typ, id);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| ConnectionError::storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(CFG_TABLE)
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
            table
                .remove(key.as_str())
                .map_err(|e| ConnectionError::storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| ConnectionError::storage(e.to_string()))
    }

    async fn list(&self, namespace: &str) -> Result<HashMap<String, Props>> {
        let prefix = format!("{namespace}.");

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| ConnectionError::storage(e.to_string()))?;
        let table = read_txn
            .open_table(CFG_TABLE)
            .map_err(|e| ConnectionError::storage(e.to_string()))?;

        let mut entries = HashMap::new();
        for item in table
            .iter()
            .map_err(|e| ConnectionError::storage(e.to_string()))?
        {
            let (key, value) = item.map_err(|e| ConnectionError::storage(e.to_string()))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let props: Props = serde_json::from_slice(value.value())?;
            entries.insert(key.value().to_string(), props);
        }
        Ok(entries)
    }
}
