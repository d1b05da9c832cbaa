//! Teardown in reverse dependency order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{error, info};

use forge_graph::ResourceId;
use forge_state::{ResourceRecord, ResourceStatus};

use crate::engine::{DELETION_POLICY, Engine};
use crate::error::EngineResult;
use crate::plan::deletion_order;
use crate::report::{DestroyReport, FailedResource};

const FINAL_SNAPSHOT: &str = "final_snapshot";

/// Outcome of removing one live resource.
#[derive(Debug)]
pub(crate) enum Retired {
    Deleted {
        snapshot: Option<String>,
    },
    Failed {
        snapshot: Option<String>,
        error: String,
    },
}

impl Engine {
    /// Delete every live resource of `stack`, dependents first.
    ///
    /// A resource whose deletion policy is `retain` is marked `Retained`
    /// and kept, together with everything it depends on. `snapshot` takes
    /// a final snapshot before the delete. The first failed delete stops
    /// the teardown; what was not yet attempted is listed as remaining.
    pub async fn destroy(&self, stack: &str) -> EngineResult<DestroyReport> {
        let live = self.live_records(stack)?;
        let by_ref: BTreeMap<ResourceId, &ResourceRecord> =
            live.iter().map(|(id, r)| (id.clone(), r)).collect();
        let order = deletion_order(&by_ref)?;
        let kept = retained_closure(&live);
        let mut report = DestroyReport::default();

        info!(stack = %stack, resources = order.len(), retained = kept.len(), "destroy started");

        for (index, id) in order.iter().enumerate() {
            let Some(record) = live.get(id) else {
                continue;
            };

            if kept.contains(id) {
                self.retain(stack, id, record)?;
                report.retained.push(id.clone());
                continue;
            }

            match self.retire(stack, id, record).await? {
                Retired::Deleted { snapshot } => {
                    if let Some(snapshot) = snapshot {
                        report.snapshots.push((id.clone(), snapshot));
                    }
                    report.deleted.push(id.clone());
                }
                Retired::Failed { snapshot, error } => {
                    if let Some(snapshot) = snapshot {
                        report.snapshots.push((id.clone(), snapshot));
                    }
                    report.failed = Some(FailedResource {
                        id: id.clone(),
                        error,
                    });
                    report.remaining = order[index + 1..]
                        .iter()
                        .filter(|r| !kept.contains(*r))
                        .cloned()
                        .collect();
                    break;
                }
            }
        }

        if report.is_success() {
            self.store.clear_outputs(stack)?;
        }
        info!(stack = %stack, summary = %report, "destroy finished");
        Ok(report)
    }

    /// Mark a live resource `Retained` instead of deleting it.
    pub(crate) fn retain(
        &self,
        stack: &str,
        id: &ResourceId,
        record: &ResourceRecord,
    ) -> EngineResult<ResourceRecord> {
        info!(resource = %id, "retained");
        if record.status == ResourceStatus::Retained {
            return Ok(record.clone());
        }
        self.commit(
            stack,
            id,
            Some(record),
            &record.fingerprint,
            ResourceStatus::Retained,
            record.attributes.clone(),
            record.depends_on.clone(),
            None,
        )
    }

    /// Delete one live resource, taking a final snapshot first when its
    /// policy asks for one. A provider failure is recorded as `Failed` and
    /// returned, not raised.
    pub(crate) async fn retire(
        &self,
        stack: &str,
        id: &ResourceId,
        record: &ResourceRecord,
    ) -> EngineResult<Retired> {
        let mut attributes = record.attributes.clone();
        let mut snapshot = None;
        if attributes.get(DELETION_POLICY).map(String::as_str) == Some("snapshot") {
            match self.provisioner.snapshot(id, &attributes).await {
                Ok(taken) => {
                    info!(resource = %id, snapshot = %taken, "final snapshot taken");
                    attributes.insert(FINAL_SNAPSHOT.to_string(), taken.clone());
                    snapshot = Some(taken);
                }
                Err(err) => return self.retire_failed(stack, id, record, attributes, None, err.to_string()),
            }
        }

        self.commit(
            stack,
            id,
            Some(record),
            &record.fingerprint,
            ResourceStatus::Deleting,
            attributes.clone(),
            record.depends_on.clone(),
            None,
        )?;
        match self.provisioner.delete(id, &attributes).await {
            Ok(()) => {
                self.store.delete_resource(stack, &record.kind, &record.name)?;
                info!(resource = %id, "deleted");
                Ok(Retired::Deleted { snapshot })
            }
            Err(err) => self.retire_failed(stack, id, record, attributes, snapshot, err.to_string()),
        }
    }

    fn retire_failed(
        &self,
        stack: &str,
        id: &ResourceId,
        record: &ResourceRecord,
        attributes: BTreeMap<String, String>,
        snapshot: Option<String>,
        error: String,
    ) -> EngineResult<Retired> {
        error!(resource = %id, error = %error, "delete failed");
        self.commit(
            stack,
            id,
            Some(record),
            &record.fingerprint,
            ResourceStatus::Failed,
            attributes,
            record.depends_on.clone(),
            None,
        )?;
        Ok(Retired::Failed { snapshot, error })
    }
}

/// Resources with a retain policy (or already retained) plus everything
/// they depend on within `live`, transitively.
pub(crate) fn retained_closure(live: &BTreeMap<ResourceId, ResourceRecord>) -> BTreeSet<ResourceId> {
    let mut kept = BTreeSet::new();
    let mut pending: Vec<ResourceId> = live
        .iter()
        .filter(|(_, r)| {
            r.status == ResourceStatus::Retained
                || r.attributes.get(DELETION_POLICY).map(String::as_str) == Some("retain")
        })
        .map(|(id, _)| id.clone())
        .collect();

    while let Some(id) = pending.pop() {
        if !kept.insert(id.clone()) {
            continue;
        }
        if let Some(record) = live.get(&id) {
            pending.extend(
                record
                    .depends_on
                    .iter()
                    .filter_map(|d| ResourceId::parse(d))
                    .filter(|d| live.contains_key(d)),
            );
        }
    }
    kept
}
