//! Private service discovery.
//!
//! Maps `{name}.{namespace}` to the addresses of a service's replicas.
//! Callers look services up by name rather than by a hardcoded address.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use forge_core::{ServiceDiscoveryEntry, StackConfig};

use crate::error::{RoutingError, RoutingResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoint {
    pub fqdn: String,
    pub port: u16,
    pub addresses: Vec<String>,
}

impl ServiceEndpoint {
    /// Base URL of the OpenAI-compatible API a service exposes.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/v1", self.fqdn, self.port)
    }
}

/// Shared, cloneable registry of discoverable services.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    records: Arc<RwLock<BTreeMap<String, ServiceEndpoint>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an entry, without addresses yet, for every
    /// discoverable service in the stack.
    pub fn from_stack(config: &StackConfig) -> Self {
        let registry = Self::new();
        for entry in config.services.iter().filter_map(|s| s.discovery.as_ref()) {
            registry.register(entry, Vec::new());
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ServiceEndpoint>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ServiceEndpoint>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register or replace the addresses behind a discovery entry.
    pub fn register(&self, entry: &ServiceDiscoveryEntry, addresses: Vec<String>) {
        let fqdn = entry.fqdn();
        debug!(fqdn = %fqdn, addresses = addresses.len(), "registered service");
        self.write().insert(
            fqdn.clone(),
            ServiceEndpoint {
                fqdn,
                port: entry.port,
                addresses,
            },
        );
    }

    pub fn resolve(&self, fqdn: &str) -> Option<ServiceEndpoint> {
        self.read().get(fqdn).cloned()
    }

    pub fn resolve_service(&self, name: &str, namespace: &str) -> Option<ServiceEndpoint> {
        self.resolve(&format!("{name}.{namespace}"))
    }

    pub fn base_url(&self, fqdn: &str) -> RoutingResult<String> {
        self.resolve(fqdn)
            .map(|endpoint| endpoint.base_url())
            .ok_or_else(|| RoutingError::UnknownService(fqdn.to_string()))
    }

    pub fn remove(&self, fqdn: &str) -> bool {
        self.write().remove(fqdn).is_some()
    }

    /// All endpoints, ordered by name.
    pub fn list(&self) -> Vec<ServiceEndpoint> {
        self.read().values().cloned().collect()
    }
}
