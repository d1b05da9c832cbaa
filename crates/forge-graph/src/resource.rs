//! Typed resource nodes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use forge_core::RefKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Gateway,
    Boundary,
    IngressRule,
    Secret,
    Role,
    Grant,
    SubnetGroup,
    Database,
    Cluster,
    LogGroup,
    Namespace,
    Discovery,
    TaskDefinition,
    Service,
    LoadBalancer,
    TargetGroup,
    Listener,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 19] = [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Gateway,
        ResourceKind::Boundary,
        ResourceKind::IngressRule,
        ResourceKind::Secret,
        ResourceKind::Role,
        ResourceKind::Grant,
        ResourceKind::SubnetGroup,
        ResourceKind::Database,
        ResourceKind::Cluster,
        ResourceKind::LogGroup,
        ResourceKind::Namespace,
        ResourceKind::Discovery,
        ResourceKind::TaskDefinition,
        ResourceKind::Service,
        ResourceKind::LoadBalancer,
        ResourceKind::TargetGroup,
        ResourceKind::Listener,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Gateway => "gateway",
            ResourceKind::Boundary => "boundary",
            ResourceKind::IngressRule => "ingress-rule",
            ResourceKind::Secret => "secret",
            ResourceKind::Role => "role",
            ResourceKind::Grant => "grant",
            ResourceKind::SubnetGroup => "subnet-group",
            ResourceKind::Database => "database",
            ResourceKind::Cluster => "cluster",
            ResourceKind::LogGroup => "log-group",
            ResourceKind::Namespace => "namespace",
            ResourceKind::Discovery => "discovery",
            ResourceKind::TaskDefinition => "task-definition",
            ResourceKind::Service => "service",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::Listener => "listener",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Attributes a live resource of this kind exposes to references.
    /// The first entry is used when a reference names no attribute.
    pub fn exports(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["id", "cidr"],
            ResourceKind::Subnet => &["id", "cidr", "zone"],
            ResourceKind::Gateway => &["id"],
            ResourceKind::Boundary => &["id"],
            ResourceKind::IngressRule => &["id"],
            ResourceKind::Secret => &["arn", "locator", "name"],
            ResourceKind::Role => &["arn", "name"],
            ResourceKind::Grant => &["id"],
            ResourceKind::SubnetGroup => &["name"],
            ResourceKind::Database => {
                &["endpoint", "host", "port", "url", "name", "username", "arn"]
            }
            ResourceKind::Cluster => &["arn", "name"],
            ResourceKind::LogGroup => &["arn", "name"],
            ResourceKind::Namespace => &["id", "name"],
            ResourceKind::Discovery => &["url", "fqdn", "host", "port", "arn"],
            ResourceKind::TaskDefinition => &["arn", "revision"],
            ResourceKind::Service => &["arn", "name"],
            ResourceKind::LoadBalancer => &["url", "dns_name", "arn"],
            ResourceKind::TargetGroup => &["arn"],
            ResourceKind::Listener => &["arn", "port"],
        }
    }

    pub fn default_attribute(&self) -> &'static str {
        self.exports()[0]
    }

    pub fn exports_attribute(&self, attribute: &str) -> bool {
        self.exports().contains(&attribute)
    }
}

impl From<RefKind> for ResourceKind {
    fn from(kind: RefKind) -> Self {
        match kind {
            RefKind::Network => ResourceKind::Network,
            RefKind::Secret => ResourceKind::Secret,
            RefKind::Boundary => ResourceKind::Boundary,
            RefKind::Role => ResourceKind::Role,
            RefKind::Database => ResourceKind::Database,
            RefKind::Cluster => ResourceKind::Cluster,
            RefKind::Service => ResourceKind::Service,
            RefKind::Discovery => ResourceKind::Discovery,
            RefKind::LoadBalancer => ResourceKind::LoadBalancer,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one resource within a stack: `kind/name`.
///
/// Ordered by the rendered id, so `database/x` sorts before `subnet/y`
/// regardless of enum declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Parse `kind/name`.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, name) = s.split_once('/')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(ResourceKind::parse(kind)?, name))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .as_str()
            .cmp(other.kind.as_str())
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A value this node consumes from another resource's live attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub target: ResourceId,
    pub attribute: String,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// One desired resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: ResourceId,
    /// Desired properties handed to the provisioner.
    pub properties: serde_json::Value,
    /// Input name → attribute of another resource, resolved at apply time.
    pub bindings: BTreeMap<String, Binding>,
}

impl ResourceNode {
    pub fn new(id: ResourceId, properties: serde_json::Value) -> Self {
        Self {
            id,
            properties,
            bindings: BTreeMap::new(),
        }
    }

    /// sha256 over the canonical JSON of properties and bindings.
    ///
    /// `serde_json::Value` objects are key-sorted, so equal desired states
    /// always hash equally.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "id": self.id.to_string(),
            "properties": self.properties,
            "bindings": self
                .bindings
                .iter()
                .map(|(k, b)| (k.clone(), b.to_string()))
                .collect::<BTreeMap<_, _>>(),
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_display_and_parse() {
        let id = ResourceId::new(ResourceKind::TaskDefinition, "webui");
        assert_eq!(id.to_string(), "task-definition/webui");
        assert_eq!(ResourceId::parse("task-definition/webui"), Some(id));
        assert_eq!(ResourceId::parse("nothing/here"), None);
        assert_eq!(ResourceId::parse("service/"), None);
    }

    #[test]
    fn ids_order_by_rendered_form() {
        let mut ids = vec![
            ResourceId::new(ResourceKind::Subnet, "public-a"),
            ResourceId::new(ResourceKind::Database, "chat-db"),
            ResourceId::new(ResourceKind::Boundary, "lb"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["boundary/lb", "database/chat-db", "subnet/public-a"]);
    }

    #[test]
    fn every_kind_round_trips_and_exports_something() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
            assert!(!kind.exports().is_empty());
        }
    }

    #[test]
    fn fingerprint_ignores_key_order_but_not_values() {
        let id = ResourceId::new(ResourceKind::Database, "chat-db");
        let a = ResourceNode::new(id.clone(), json!({"port": 5432, "engine": "postgres"}));
        let b = ResourceNode::new(id.clone(), json!({"engine": "postgres", "port": 5432}));
        let c = ResourceNode::new(id, json!({"engine": "postgres", "port": 5433}));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_covers_bindings() {
        let id = ResourceId::new(ResourceKind::TaskDefinition, "webui");
        let plain = ResourceNode::new(id.clone(), json!({}));
        let mut bound = ResourceNode::new(id, json!({}));
        bound.bindings.insert(
            "DATABASE_URL".to_string(),
            Binding {
                target: ResourceId::new(ResourceKind::Database, "chat-db"),
                attribute: "url".to_string(),
            },
        );
        assert_ne!(plain.fingerprint(), bound.fingerprint());
    }
}
