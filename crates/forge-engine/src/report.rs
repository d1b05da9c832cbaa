//! Apply and destroy reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use forge_graph::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedResource {
    pub id: ResourceId,
    pub error: String,
}

impl fmt::Display for FailedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.error)
    }
}

/// Outcome of one apply. Never successful while anything failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub created: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    pub deleted: Vec<ResourceId>,
    /// No longer declared but kept because of a retain deletion policy.
    pub retained: Vec<ResourceId>,
    /// Final snapshots taken before deleting undeclared resources.
    pub snapshots: Vec<(ResourceId, String)>,
    pub unchanged: usize,
    pub failed: Vec<FailedResource>,
    /// Planned changes never started because an earlier wave failed.
    pub skipped: Vec<ResourceId>,
    /// Resources created in this run and removed again by rollback.
    pub rolled_back: Vec<ResourceId>,
    pub outputs: BTreeMap<String, String>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created.len(),
            self.updated.len(),
            self.deleted.len(),
            self.unchanged
        )?;
        if !self.retained.is_empty() {
            write!(f, ", {} retained", self.retained.len())?;
        }
        if !self.is_success() {
            write!(
                f,
                "; {} failed, {} skipped, {} rolled back",
                self.failed.len(),
                self.skipped.len(),
                self.rolled_back.len()
            )?;
            for failure in &self.failed {
                write!(f, "\n  {failure}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DestroyReport {
    pub deleted: Vec<ResourceId>,
    /// Kept because of a retain deletion policy.
    pub retained: Vec<ResourceId>,
    /// Resource and its final snapshot identifier.
    pub snapshots: Vec<(ResourceId, String)>,
    pub failed: Option<FailedResource>,
    /// Left in place because a dependent failed to delete.
    pub remaining: Vec<ResourceId>,
}

impl DestroyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

impl fmt::Display for DestroyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} deleted, {} retained, {} snapshots",
            self.deleted.len(),
            self.retained.len(),
            self.snapshots.len()
        )?;
        if let Some(failure) = &self.failed {
            write!(f, "; failed at {failure}, {} left in place", self.remaining.len())?;
        }
        Ok(())
    }
}
