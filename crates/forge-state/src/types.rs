//! Domain types for the StackForge state store.
//!
//! These types represent what has actually been provisioned. All types
//! are serializable to/from JSON for storage in redb tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Resources ──────────────────────────────────────────────────────

/// Lifecycle status of a provisioned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Creation or update started but readiness not yet confirmed.
    Creating,
    /// Provisioned and ready for dependents.
    Ready,
    /// The last create/update attempt failed.
    Failed,
    /// Deletion started.
    Deleting,
    /// Kept on teardown because of a retain policy.
    Retained,
}

/// A resource as recorded after the engine touched it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRecord {
    pub stack: String,
    /// Resource kind, e.g. "database", "subnet".
    pub kind: String,
    pub name: String,
    /// sha256 of the desired properties this record was applied from.
    pub fingerprint: String,
    pub status: ResourceStatus,
    /// Attributes exported by the provider (endpoint, arn, ...).
    pub attributes: BTreeMap<String, String>,
    /// `kind/name` of every resource this one depended on when applied.
    pub depends_on: Vec<String>,
    /// Input values resolved from upstream attributes at the last apply.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Unix timestamp (seconds) of creation.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: u64,
}

impl ResourceRecord {
    /// `kind/name`, the identifier used in dependency lists.
    pub fn id(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// Build the composite key for the resources table.
    pub fn table_key(&self) -> String {
        resource_key(&self.stack, &self.kind, &self.name)
    }
}

pub fn resource_key(stack: &str, kind: &str, name: &str) -> String {
    format!("{stack}/{kind}/{name}")
}

// ── Outputs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackOutput {
    pub stack: String,
    pub name: String,
    pub value: String,
}

impl StackOutput {
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.stack, self.name)
    }
}

// ── Secrets ────────────────────────────────────────────────────────

/// Persisted secret material.
///
/// `Debug` is implemented by hand so the value never reaches a log line.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSecret {
    pub stack: String,
    pub name: String,
    pub value: String,
    pub created_at: u64,
    pub rotated_at: Option<u64>,
}

impl StoredSecret {
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.stack, self.name)
    }
}

impl std::fmt::Debug for StoredSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSecret")
            .field("stack", &self.stack)
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}

/// Seconds since the unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
