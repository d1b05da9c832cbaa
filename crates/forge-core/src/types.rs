//! Enumerations and reference syntax shared across StackForge crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Network tier a subnet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Routes to the internet gateway. Hosts load balancers only.
    Public,
    /// Egress through a NAT gateway, no inbound route from the internet.
    Private,
    /// No route outside the VPC. Reserved for the database.
    Isolated,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Public => "public",
            TierKind::Private => "private",
            TierKind::Isolated => "isolated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// What happens to the managed database on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Take a final snapshot, then delete.
    #[default]
    Snapshot,
    /// Never delete; the record survives `destroy`.
    Retain,
    /// Delete without a snapshot.
    Destroy,
}

/// Condition an upstream container must reach before a dependent starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    /// Upstream has been started.
    Start,
    /// Upstream has exited, with any code.
    Complete,
    /// Upstream has exited with code 0.
    Success,
    /// Upstream reported healthy.
    Healthy,
}

impl fmt::Display for DependencyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyCondition::Start => "START",
            DependencyCondition::Complete => "COMPLETE",
            DependencyCondition::Success => "SUCCESS",
            DependencyCondition::Healthy => "HEALTHY",
        };
        f.write_str(s)
    }
}

/// Kind of entity a reference string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefKind {
    Network,
    Secret,
    Boundary,
    Role,
    Database,
    Cluster,
    Service,
    Discovery,
    LoadBalancer,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Network => "network",
            RefKind::Secret => "secret",
            RefKind::Boundary => "boundary",
            RefKind::Role => "role",
            RefKind::Database => "database",
            RefKind::Cluster => "cluster",
            RefKind::Service => "service",
            RefKind::Discovery => "discovery",
            RefKind::LoadBalancer => "load-balancer",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "network" => RefKind::Network,
            "secret" => RefKind::Secret,
            "boundary" => RefKind::Boundary,
            "role" => RefKind::Role,
            "database" => RefKind::Database,
            "cluster" => RefKind::Cluster,
            "service" => RefKind::Service,
            "discovery" => RefKind::Discovery,
            "load-balancer" | "lb" => RefKind::LoadBalancer,
            _ => return None,
        })
    }
}

/// A reference from one entity to another: `kind:name[.attribute]`.
///
/// Examples: `database:chat-db.endpoint`, `secret:admin-password`,
/// `discovery:gateway.url`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub kind: RefKind,
    pub name: String,
    pub attribute: Option<String>,
}

impl Reference {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidReference(s.to_string()))?;
        let kind = RefKind::parse(kind.trim())
            .ok_or_else(|| ConfigError::InvalidReference(s.to_string()))?;
        let (name, attribute) = match rest.split_once('.') {
            Some((name, attr)) if !attr.is_empty() => (name, Some(attr.to_string())),
            Some(_) => return Err(ConfigError::InvalidReference(s.to_string())),
            None => (rest, None),
        };
        if name.is_empty() {
            return Err(ConfigError::InvalidReference(s.to_string()));
        }
        Ok(Reference {
            kind,
            name: name.to_string(),
            attribute,
        })
    }

    pub fn new(kind: RefKind, name: &str) -> Self {
        Reference {
            kind,
            name: name.to_string(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)?;
        if let Some(attr) = &self.attribute {
            write!(f, ".{attr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference_with_attribute() {
        let r = Reference::parse("database:chat-db.endpoint").unwrap();
        assert_eq!(r.kind, RefKind::Database);
        assert_eq!(r.name, "chat-db");
        assert_eq!(r.attribute.as_deref(), Some("endpoint"));
        assert_eq!(r.to_string(), "database:chat-db.endpoint");
    }

    #[test]
    fn parse_reference_without_attribute() {
        let r = Reference::parse("secret:admin-password").unwrap();
        assert_eq!(r.kind, RefKind::Secret);
        assert!(r.attribute.is_none());
    }

    #[test]
    fn lb_alias() {
        let r = Reference::parse("lb:web.dns_name").unwrap();
        assert_eq!(r.kind, RefKind::LoadBalancer);
        assert_eq!(r.to_string(), "load-balancer:web.dns_name");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Reference::parse("chat-db").is_err());
        assert!(Reference::parse("queue:jobs").is_err());
        assert!(Reference::parse("secret:").is_err());
        assert!(Reference::parse("database:db.").is_err());
    }

    #[test]
    fn condition_display_matches_task_definition_casing() {
        assert_eq!(DependencyCondition::Success.to_string(), "SUCCESS");
    }
}
