//! The shared connection registry
//!
//! One process-wide table of connection metadata, multiplexing long-lived
//! typed connections across pipelines. Named connections are persisted and
//! shareable via the `connectionSelector` property; anonymous connections
//! live and die with the pipeline that fetched them.
//!
//! A single reader-writer lock guards the live and failed tables as one
//! critical section. Connection construction runs while the write lock is
//! held, so a slow connect serializes other registry mutations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionFactory, FactoryRegistry};
use crate::context::StreamContext;
use crate::error::{ConnectionError, Result};
use crate::store::ConfigStore;
use crate::types::{extract_selector, ConnectionStatus, Props};

/// Store namespace under which named connections are persisted
pub const CONNECTION_NAMESPACE: &str = "connections";

/// One registry record
struct ConnectionMeta {
    id: String,
    typ: String,
    #[allow(dead_code)]
    props: Props,
    conn: Arc<dyn Connection>,
    ref_count: usize,
}

/// Both tables, guarded together as a single critical section
#[derive(Default)]
struct Tables {
    /// Successfully constructed connections; every entry holds a connection
    live: HashMap<String, ConnectionMeta>,
    /// Persisted records whose reconstruction failed on reload, keyed to
    /// the failure message
    failed: HashMap<String, String>,
}

/// Process-wide connection registry
///
/// Constructed once at startup and threaded through to pipelines. Tests
/// build private instances over a [`MemoryConfigStore`](crate::MemoryConfigStore)
/// with mock factories pre-registered.
pub struct ConnectionManager {
    store: Arc<dyn ConfigStore>,
    factories: FactoryRegistry,
    backoff: BackoffConfig,
    tables: RwLock<Tables>,
}

impl ConnectionManager {
    /// Build a registry with empty tables.
    ///
    /// The configured retry budget overrides the backoff policy's default.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        factories: FactoryRegistry,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            store,
            factories,
            backoff: BackoffConfig::default().with_max_elapsed(config.backoff_max_elapsed()),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Replace the whole backoff schedule (builder pattern)
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Create a named, persisted, shareable connection.
    ///
    /// The metadata is written to the store before the connection is
    /// constructed; if construction then fails the record is intentionally
    /// left behind so a later [`reload`](Self::reload) can pick it up.
    pub async fn create_named_connection(
        &self,
        ctx: &StreamContext,
        id: &str,
        typ: &str,
        props: Props,
    ) -> Result<Arc<dyn Connection>> {
        if id.is_empty() || typ.is_empty() {
            return Err(ConnectionError::IdAndTypeRequired);
        }
        let mut tables = self.tables.write().await;
        if tables.live.contains_key(id) {
            return Err(ConnectionError::AlreadyCreated(id.to_string()));
        }
        self.store
            .write(CONNECTION_NAMESPACE, typ, id, &props)
            .await?;
        let conn = self.create_connection(ctx, typ, &props).await?;
        tables.live.insert(
            id.to_string(),
            ConnectionMeta {
                id: id.to_string(),
                typ: typ.to_string(),
                props,
                conn: conn.clone(),
                ref_count: 0,
            },
        );
        tables.failed.remove(id);
        info!(id, typ, "created named connection");
        Ok(conn)
    }

    /// Create an anonymous, pipeline-local connection (never persisted)
    pub async fn create_non_stored_connection(
        &self,
        ctx: &StreamContext,
        id: &str,
        typ: &str,
        props: Props,
    ) -> Result<Arc<dyn Connection>> {
        if id.is_empty() || typ.is_empty() {
            return Err(ConnectionError::IdAndTypeRequired);
        }
        let mut tables = self.tables.write().await;
        if tables.live.contains_key(id) {
            return Err(ConnectionError::AlreadyCreated(id.to_string()));
        }
        let conn = self.create_connection(ctx, typ, &props).await?;
        tables.live.insert(
            id.to_string(),
            ConnectionMeta {
                id: id.to_string(),
                typ: typ.to_string(),
                props,
                conn: conn.clone(),
                ref_count: 0,
            },
        );
        debug!(id, typ, "created non-stored connection");
        Ok(conn)
    }

    /// Fetch a connection for a pipeline.
    ///
    /// With a `connectionSelector` in `props`, attaches to the named
    /// connection it selects and bumps its reference count. Without one,
    /// creates an anonymous connection under the caller's `id`.
    pub async fn fetch_connection(
        &self,
        ctx: &StreamContext,
        id: &str,
        typ: &str,
        props: Props,
    ) -> Result<Arc<dyn Connection>> {
        if id.is_empty() {
            return Err(ConnectionError::IdRequired);
        }
        let Some(selector) = extract_selector(&props) else {
            return self.create_non_stored_connection(ctx, id, typ, props).await;
        };
        let mut tables = self.tables.write().await;
        let meta = tables
            .live
            .get_mut(selector)
            .ok_or_else(|| ConnectionError::NotExisted(selector.to_string()))?;
        meta.ref_count += 1;
        Ok(meta.conn.clone())
    }

    /// Release a pipeline's hold on a connection.
    ///
    /// With a selector, decrements the shared record's reference count.
    /// Without one, closes and removes the anonymous record under `id`.
    /// Missing ids are silent no-ops.
    pub async fn detach_connection(
        &self,
        ctx: &StreamContext,
        id: &str,
        props: &Props,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(ConnectionError::IdRequired);
        }
        let mut tables = self.tables.write().await;
        match extract_selector(props) {
            None => {
                if let Some(meta) = tables.live.remove(id) {
                    let _ = meta.conn.close(ctx).await;
                    debug!(id = %meta.id, typ = %meta.typ, "closed anonymous connection");
                }
            }
            Some(selector) => {
                if let Some(meta) = tables.live.get_mut(selector) {
                    meta.ref_count = meta.ref_count.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    /// Drop a named connection and its persisted record.
    ///
    /// Refused while shared attachers still reference it. Also the removal
    /// path for records parked in the failed table by a reload. Unknown ids
    /// are a no-op.
    pub async fn drop_named_connection(&self, ctx: &StreamContext, sel_id: &str) -> Result<()> {
        if sel_id.is_empty() {
            return Err(ConnectionError::IdRequired);
        }
        let mut tables = self.tables.write().await;
        let (ref_count, typ) = match tables.live.get(sel_id) {
            Some(meta) => (meta.ref_count, meta.typ.clone()),
            None => {
                if tables.failed.remove(sel_id).is_some() {
                    debug!(id = sel_id, "dropped failed connection record");
                }
                return Ok(());
            }
        };
        if ref_count > 0 {
            return Err(ConnectionError::StillReferenced(sel_id.to_string()));
        }
        if let Err(err) = self.store.delete(CONNECTION_NAMESPACE, &typ, sel_id).await {
            return Err(ConnectionError::DropFailed {
                id: sel_id.to_string(),
                cause: err.to_string(),
            });
        }
        if let Some(meta) = tables.live.remove(sel_id) {
            let _ = meta.conn.close(ctx).await;
            info!(id = %meta.id, typ = %meta.typ, "dropped named connection");
        }
        Ok(())
    }

    /// Ping a live connection, propagating its result
    pub async fn ping_connection(&self, ctx: &StreamContext, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(ConnectionError::IdRequired);
        }
        let tables = self.tables.read().await;
        let meta = tables
            .live
            .get(id)
            .ok_or_else(|| ConnectionError::NotExisted(id.to_string()))?;
        meta.conn.ping(ctx).await
    }

    /// Status of every registry entry, failed records included.
    ///
    /// Live connections are pinged synchronously under the read lock;
    /// callers must tolerate the aggregate latency.
    pub async fn all_connection_status(
        &self,
        ctx: &StreamContext,
    ) -> HashMap<String, ConnectionStatus> {
        let tables = self.tables.read().await;
        let mut statuses = HashMap::with_capacity(tables.live.len() + tables.failed.len());
        for (id, msg) in &tables.failed {
            statuses.insert(id.clone(), ConnectionStatus::fail(msg.clone()));
        }
        for (id, meta) in &tables.live {
            let status = match meta.conn.ping(ctx).await {
                Ok(()) => ConnectionStatus::running(),
                Err(err) => ConnectionStatus::fail(err.to_string()),
            };
            statuses.insert(id.clone(), status);
        }
        statuses
    }

    /// Snapshot of the live connection ids
    pub async fn all_connection_ids(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        tables.live.keys().cloned().collect()
    }

    /// Reference count of a live connection, or 0 if absent
    pub async fn connection_ref(&self, id: &str) -> usize {
        let tables = self.tables.read().await;
        tables.live.get(id).map(|m| m.ref_count).unwrap_or(0)
    }

    /// Rebuild the registry from the persistent store.
    ///
    /// Called once at startup. Records whose factory fails are parked in
    /// the failed table with the error message; the reload itself never
    /// aborts over a single record.
    pub async fn reload(&self) -> Result<()> {
        let entries = self.store.list(CONNECTION_NAMESPACE).await?;
        let ctx = StreamContext::background();
        let mut tables = self.tables.write().await;
        for (key, props) in entries {
            let segments: Vec<&str> = key.split('.').collect();
            if segments.len() != 3 {
                continue;
            }
            let typ = segments[1];
            let id = segments[2];
            match self.create_connection(&ctx, typ, &props).await {
                Ok(conn) => {
                    tables.live.insert(
                        id.to_string(),
                        ConnectionMeta {
                            id: id.to_string(),
                            typ: typ.to_string(),
                            props,
                            conn,
                            ref_count: 0,
                        },
                    );
                }
                Err(err) => {
                    warn!(id, typ, error = %err, "failed to initialize connection on reload");
                    tables.failed.insert(id.to_string(), err.to_string());
                }
            }
        }
        info!(
            live = tables.live.len(),
            failed = tables.failed.len(),
            "reloaded connections from store"
        );
        Ok(())
    }

    /// Resolve the factory and drive it under the backoff schedule.
    ///
    /// Transient failures are retried until the elapsed budget runs out;
    /// permanent failures and unknown types return immediately.
    async fn create_connection(
        &self,
        ctx: &StreamContext,
        typ: &str,
        props: &Props,
    ) -> Result<Arc<dyn Connection>> {
        let factory = self
            .factories
            .get(typ)
            .ok_or(ConnectionError::UnknownType)?;
        let mut backoff = ExponentialBackoff::new(self.backoff.clone());
        loop {
            match factory.create(ctx, props).await {
                Ok(conn) => return Ok(conn),
                Err(err) if err.is_transient() => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(
                            typ,
                            attempt = backoff.attempt(),
                            ?delay,
                            error = %err,
                            "transient connection failure, backing off"
                        );
                        sleep(delay).await;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;
    use crate::types::CONNECTION_SELECTOR_KEY;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct MockConnection {
        pings: AtomicUsize,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn ping(&self, _ctx: &StreamContext) -> Result<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self, _ctx: &StreamContext) -> Result<()> {
            Ok(())
        }
    }

    struct MockFactory;

    #[async_trait]
    impl ConnectionFactory for MockFactory {
        async fn create(
            &self,
            _ctx: &StreamContext,
            _props: &Props,
        ) -> Result<Arc<dyn Connection>> {
            Ok(Arc::new(MockConnection {
                pings: AtomicUsize::new(0),
            }))
        }
    }

    fn manager() -> ConnectionManager {
        let mut factories = FactoryRegistry::new();
        factories.register("mock", Arc::new(MockFactory));
        ConnectionManager::new(
            Arc::new(MemoryConfigStore::new()),
            factories,
            &ConnectionConfig::default(),
        )
        .with_backoff(
            BackoffConfig::new()
                .with_initial_interval(Duration::from_millis(1))
                .with_max_elapsed(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn test_create_validation() {
        let mgr = manager();
        let ctx = StreamContext::new();

        let err = mgr
            .create_named_connection(&ctx, "", "mock", Props::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection id and type should be defined");

        let err = mgr
            .create_named_connection(&ctx, "c1", "", Props::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection id and type should be defined");
    }

    #[tokio::test]
    async fn test_unknown_type_fails_immediately() {
        let mgr = manager();
        let ctx = StreamContext::new();

        let err = mgr
            .create_named_connection(&ctx, "c1", "nosuch", Props::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::UnknownType));
    }

    #[tokio::test]
    async fn test_type_lookup_is_case_insensitive() {
        let mgr = manager();
        let ctx = StreamContext::new();

        assert!(mgr
            .create_named_connection(&ctx, "c1", "MOCK", Props::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let mgr = manager();
        let ctx = StreamContext::new();

        mgr.create_named_connection(&ctx, "c1", "mock", Props::new())
            .await
            .unwrap();
        let err = mgr
            .create_named_connection(&ctx, "c1", "mock", Props::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection c1 already been created");
    }

    #[tokio::test]
    async fn test_attach_missing_selector() {
        let mgr = manager();
        let ctx = StreamContext::new();

        let mut props = Props::new();
        props.insert(CONNECTION_SELECTOR_KEY.to_string(), json!("ghost"));
        let err = mgr
            .fetch_connection(&ctx, "x", "mock", props)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection ghost not existed");
    }

    #[tokio::test]
    async fn test_ref_count_saturates_at_zero() {
        let mgr = manager();
        let ctx = StreamContext::new();

        mgr.create_named_connection(&ctx, "c1", "mock", Props::new())
            .await
            .unwrap();

        let mut props = Props::new();
        props.insert(CONNECTION_SELECTOR_KEY.to_string(), json!("c1"));
        mgr.detach_connection(&ctx, "x", &props).await.unwrap();
        mgr.detach_connection(&ctx, "x", &props).await.unwrap();
        assert_eq!(mgr.connection_ref("c1").await, 0);
    }

    #[tokio::test]
    async fn test_detach_missing_is_noop() {
        let mgr = manager();
        let ctx = StreamContext::new();
        assert!(mgr
            .detach_connection(&ctx, "ghost", &Props::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_ping_missing() {
        let mgr = manager();
        let ctx = StreamContext::new();
        let err = mgr.ping_connection(&ctx, "ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "connection ghost not existed");
    }

    #[tokio::test]
    async fn test_reload_skips_malformed_keys() {
        let store = Arc::new(MemoryConfigStore::new());
        store
            .write("connections", "mock", "c1", &Props::new())
            .await
            .unwrap();
        // dotted id yields a four-segment key, which reload must skip
        store
            .write("connections", "mock", "a.b", &Props::new())
            .await
            .unwrap();

        let mut factories = FactoryRegistry::new();
        factories.register("mock", Arc::new(MockFactory));
        let mgr = ConnectionManager::new(store, factories, &ConnectionConfig::default());

        mgr.reload().await.unwrap();
        let ids = mgr.all_connection_ids().await;
        assert_eq!(ids, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_ids_snapshot() {
        let mgr = manager();
        let ctx = StreamContext::new();

        mgr.create_named_connection(&ctx, "a", "mock", Props::new())
            .await
            .unwrap();
        mgr.create_non_stored_connection(&ctx, "b", "mock", Props::new())
            .await
            .unwrap();

        let mut ids = mgr.all_connection_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
