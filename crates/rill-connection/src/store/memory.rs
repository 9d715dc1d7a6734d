//! In-memory store backend for testing and embedded use

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

use super::{composite_key, ConfigStore};
use crate::error::Result;
use crate::types::Props;

/// In-memory store backend
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: DashMap<String, Props>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn write(&self, namespace: &str, typ: &str, id: &str, props: &Props) -> Result<()> {
        self.entries
            .insert(composite_key(namespace, typ, id), props.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, typ: &str, id: &str) -> Result<()> {
        self.entries.remove(&composite_key(namespace, typ, id));
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<HashMap<String, Props>> {
        let prefix = format!("{namespace}.");
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }
}
