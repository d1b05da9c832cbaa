//! The provisioning backend seam.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use forge_graph::ResourceId;

use crate::error::ProvisionError;

/// Attributes a live resource exports (endpoint, arn, ...).
pub type Attributes = BTreeMap<String, String>;

/// Boxed future returned by every [`Provisioner`] operation.
pub type ProvisionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProvisionError>> + Send + 'a>>;

/// Everything a backend needs to create or update one resource.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub stack: String,
    pub id: ResourceId,
    /// Desired properties from the graph node.
    pub properties: serde_json::Value,
    /// Binding name → value resolved from a dependency's attributes.
    pub inputs: BTreeMap<String, String>,
}

impl ProvisionRequest {
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn property_u64(&self, key: &str) -> Option<u64> {
        self.properties.get(key).and_then(|v| v.as_u64())
    }
}

/// A backend that can realize resources.
///
/// Injected into the engine as `Arc<dyn Provisioner>`; tests supply fakes
/// that fail on chosen resources.
pub trait Provisioner: Send + Sync {
    /// Create the resource and return its exported attributes.
    fn create<'a>(&'a self, request: &'a ProvisionRequest) -> ProvisionFuture<'a, Attributes>;

    /// Converge an existing resource to new desired properties.
    fn update<'a>(
        &'a self,
        request: &'a ProvisionRequest,
        current: &'a Attributes,
    ) -> ProvisionFuture<'a, Attributes>;

    /// Remove the resource.
    fn delete<'a>(&'a self, id: &'a ResourceId, current: &'a Attributes) -> ProvisionFuture<'a, ()>;

    /// Resolve once the resource can serve its dependents, e.g. a
    /// database accepting connections.
    fn wait_ready<'a>(
        &'a self,
        id: &'a ResourceId,
        attributes: &'a Attributes,
    ) -> ProvisionFuture<'a, ()>;

    /// Take a final snapshot before deletion, returning its identifier.
    fn snapshot<'a>(
        &'a self,
        id: &'a ResourceId,
        current: &'a Attributes,
    ) -> ProvisionFuture<'a, String>;
}
