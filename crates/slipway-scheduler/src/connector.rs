//! Cloud connectors — the per-provider executor capability.
//!
//! Each provider implements [`CloudConnector`] and is registered under a
//! [`CloudKey`] at startup. The scheduler never looks inside a connector;
//! it only resolves one per node and awaits its result.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use slipway_core::{CloudKey, NodeInstance};

use crate::error::{SchedulerError, SchedulerResult};

/// Boxed future returned by [`CloudConnector::execute`].
pub type ExecuteFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send + 'a>>;

/// Executes one operation (provision, scale, tear down) on a node.
///
/// Must be safe to call concurrently for distinct nodes. Timeouts and
/// retries are the connector's business.
pub trait CloudConnector: Send + Sync {
    /// Run the operation and return an opaque result payload.
    fn execute<'a>(&'a self, node: &'a NodeInstance) -> ExecuteFuture<'a>;
}

/// Adapts an async closure into a [`CloudConnector`].
///
/// The closure receives an owned copy of the node.
pub struct FnConnector<F> {
    f: F,
}

impl<F, Fut> FnConnector<F>
where
    F: Fn(NodeInstance) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> CloudConnector for FnConnector<F>
where
    F: Fn(NodeInstance) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
{
    fn execute<'a>(&'a self, node: &'a NodeInstance) -> ExecuteFuture<'a> {
        Box::pin((self.f)(node.clone()))
    }
}

/// Typed lookup table from cloud key to connector.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<CloudKey, Arc<dyn CloudConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under `key`, replacing any previous one.
    pub fn register(&mut self, key: impl Into<CloudKey>, connector: Arc<dyn CloudConnector>) {
        let key = key.into();
        if self.connectors.insert(key.clone(), connector).is_some() {
            info!(cloud = %key, "connector replaced");
        } else {
            info!(cloud = %key, "connector registered");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, key: impl Into<CloudKey>, connector: Arc<dyn CloudConnector>) -> Self {
        self.register(key, connector);
        self
    }

    /// Look up the connector for `key`.
    pub fn resolve(&self, key: &CloudKey) -> SchedulerResult<Arc<dyn CloudConnector>> {
        self.connectors
            .get(key)
            .cloned()
            .ok_or_else(|| SchedulerError::ConnectorNotFound(key.clone()))
    }

    pub fn contains(&self, key: &CloudKey) -> bool {
        self.connectors.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<CloudKey> {
        let mut keys: Vec<_> = self.connectors.keys().cloned().collect();
        keys.sort();
        keys
    }
}
