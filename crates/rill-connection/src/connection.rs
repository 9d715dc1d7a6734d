//! Connection capability traits and the connection-type registry
//!
//! A [`Connection`] is whatever a factory hands back: a broker session, a
//! database handle, an HTTP client. The registry only ever pings and closes
//! it; type-specific I/O lives on the concrete type behind the trait object.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::StreamContext;
use crate::error::Result;
use crate::types::Props;

/// A long-lived connection managed by the registry
#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Check liveness; the registry forwards the caller's context
    async fn ping(&self, ctx: &StreamContext) -> Result<()>;

    /// Release the underlying resource. The registry ignores the result.
    async fn close(&self, ctx: &StreamContext) -> Result<()>;
}

/// Factory for one connection type
///
/// Implementations classify their failures: transient I/O errors
/// ([`ConnectionError::is_transient`](crate::ConnectionError::is_transient))
/// are retried under backoff, anything else aborts construction.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Build a connection from an opaque property bag
    async fn create(&self, ctx: &StreamContext, props: &Props) -> Result<Arc<dyn Connection>>;
}

/// Registry of available connection types
///
/// Populated out of band at process startup; read-only from the connection
/// manager's perspective. Type names are stored and looked up lowercase.
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn ConnectionFactory>>,
}

impl FactoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under a type name
    pub fn register(&mut self, typ: &str, factory: Arc<dyn ConnectionFactory>) {
        self.factories.insert(typ.to_lowercase(), factory);
    }

    /// Look up a factory by type name
    pub fn get(&self, typ: &str) -> Option<&Arc<dyn ConnectionFactory>> {
        self.factories.get(&typ.to_lowercase())
    }

    /// Check if a type is registered
    pub fn contains(&self, typ: &str) -> bool {
        self.factories.contains_key(&typ.to_lowercase())
    }

    /// Registered type names
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;

    #[derive(Debug)]
    struct NullConnection;

    #[async_trait]
    impl Connection for NullConnection {
        async fn ping(&self, _ctx: &StreamContext) -> Result<()> {
            Ok(())
        }

        async fn close(&self, _ctx: &StreamContext) -> Result<()> {
            Ok(())
        }
    }

    struct NullFactory;

    #[async_trait]
    impl ConnectionFactory for NullFactory {
        async fn create(
            &self,
            _ctx: &StreamContext,
            _props: &Props,
        ) -> Result<Arc<dyn Connection>> {
            Ok(Arc::new(NullConnection))
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = FactoryRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("mqtt").is_none());
    }

    #[test]
    fn test_lowercase_lookup() {
        let mut registry = FactoryRegistry::new();
        registry.register("MQTT", Arc::new(NullFactory));

        assert!(registry.contains("mqtt"));
        assert!(registry.contains("Mqtt"));
        assert!(registry.get("mQtT").is_some());
        assert_eq!(registry.names(), vec!["mqtt"]);
    }

    #[tokio::test]
    async fn test_factory_roundtrip() {
        let mut registry = FactoryRegistry::new();
        registry.register("null", Arc::new(NullFactory));

        let ctx = StreamContext::new();
        let factory = registry.get("null").unwrap();
        let conn = factory.create(&ctx, &Props::new()).await.unwrap();
        assert!(conn.ping(&ctx).await.is_ok());
    }

    #[test]
    fn test_error_partition_visible_to_factories() {
        // factories lean on this partition when classifying their failures
        assert!(ConnectionError::io("dial tcp").is_transient());
        assert!(!ConnectionError::config("unknown host option").is_transient());
    }
}
