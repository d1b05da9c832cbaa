//! Dependency-ordered apply.
//!
//! Resources are applied wave by wave. Every resource in a wave depends
//! only on resources in earlier waves, so by the time a wave starts each
//! of its dependencies has been created and has passed `wait_ready`.
//! Within a wave, resources run concurrently on a `JoinSet`, bounded by
//! a semaphore. The first failure halts the apply after the current wave
//! drains; later waves never start.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use forge_graph::{GraphError, ResourceGraph, ResourceId};
use forge_state::{ResourceRecord, ResourceStatus, StackOutput, StateStore, epoch_secs};

use crate::error::{EngineError, EngineResult, ProvisionError};
use crate::plan::{ChangeKind, Plan, resolve_inputs};
use crate::provisioner::{Attributes, ProvisionRequest, Provisioner};
use crate::destroy::{Retired, retained_closure};
use crate::report::{ApplyReport, FailedResource};

/// What to do with resources created by an apply that later failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Keep everything and report the partial state.
    #[default]
    LeaveInPlace,
    /// Delete resources created in this run that no ready resource
    /// depends on, dependents first.
    RollbackOrphans,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum resources provisioned at once within a wave.
    pub parallelism: usize,
    pub rollback: RollbackPolicy,
    /// Upper bound on one resource's `wait_ready`.
    pub ready_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            rollback: RollbackPolicy::default(),
            ready_timeout: Duration::from_secs(30 * 60),
        }
    }
}

pub struct Engine {
    pub(crate) store: StateStore,
    pub(crate) provisioner: Arc<dyn Provisioner>,
    pub(crate) options: EngineOptions,
}

/// Property copied into live attributes so teardown can honour it
/// without the desired graph.
pub(crate) const DELETION_POLICY: &str = "deletion_policy";

impl Engine {
    pub fn new(store: StateStore, provisioner: Arc<dyn Provisioner>, options: EngineOptions) -> Self {
        Self {
            store,
            provisioner,
            options,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Live records of a stack keyed by resource id.
    pub(crate) fn live_records(&self, stack: &str) -> EngineResult<BTreeMap<ResourceId, ResourceRecord>> {
        let mut live = BTreeMap::new();
        for record in self.store.list_resources(stack)? {
            let id = ResourceId::parse(&record.id())
                .ok_or_else(|| EngineError::UnknownRecord(record.id()))?;
            live.insert(id, record);
        }
        Ok(live)
    }

    /// Persist one resource's state. Each call is its own commit.
    /// `inputs: None` keeps the inputs of `previous`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn commit(
        &self,
        stack: &str,
        id: &ResourceId,
        previous: Option<&ResourceRecord>,
        fingerprint: &str,
        status: ResourceStatus,
        attributes: Attributes,
        depends_on: Vec<String>,
        inputs: Option<BTreeMap<String, String>>,
    ) -> EngineResult<ResourceRecord> {
        let now = epoch_secs();
        let record = ResourceRecord {
            stack: stack.to_string(),
            kind: id.kind.to_string(),
            name: id.name.clone(),
            fingerprint: fingerprint.to_string(),
            status,
            attributes,
            depends_on,
            inputs: inputs
                .or_else(|| previous.map(|r| r.inputs.clone()))
                .unwrap_or_default(),
            created_at: previous.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.store.put_resource(&record)?;
        Ok(record)
    }

    /// Apply `plan` for `graph`. Errors are returned only for problems
    /// outside individual resources (state store, graph); resource
    /// failures land in the report.
    pub async fn apply(&self, graph: &ResourceGraph, plan: &Plan) -> EngineResult<ApplyReport> {
        let stack = graph.stack();
        let waves = graph.waves()?;
        let mut live = self.live_records(stack)?;
        let mut report = ApplyReport::default();
        let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
        let mut halted = false;

        info!(
            stack = %stack,
            waves = waves.len(),
            create = plan.count(ChangeKind::Create),
            update = plan.count(ChangeKind::Update),
            delete = plan.count(ChangeKind::Delete),
            "apply started"
        );

        for (index, wave) in waves.iter().enumerate() {
            let mut tasks = JoinSet::new();
            let mut kinds: BTreeMap<ResourceId, ChangeKind> = BTreeMap::new();

            for id in wave {
                let planned = plan.change(id).map(|c| c.kind).unwrap_or(ChangeKind::Create);
                if planned == ChangeKind::Delete {
                    continue;
                }
                if halted {
                    if planned == ChangeKind::NoOp {
                        report.unchanged += 1;
                    } else {
                        report.skipped.push(id.clone());
                    }
                    continue;
                }

                let node = graph
                    .node(id)
                    .ok_or_else(|| GraphError::UnknownResource(id.to_string()))?;
                let depends_on: Vec<String> =
                    graph.dependencies(id).iter().map(ToString::to_string).collect();
                let previous = live.get(id);
                let resolved = resolve_inputs(node, &live);

                // An earlier wave may have changed a value this resource
                // consumes.
                let kind = match (planned, &resolved, previous) {
                    (ChangeKind::NoOp, Ok(inputs), Some(record)) if *inputs != record.inputs => {
                        debug!(resource = %id, "upstream inputs changed");
                        ChangeKind::Update
                    }
                    _ => planned,
                };
                if kind == ChangeKind::NoOp {
                    report.unchanged += 1;
                    continue;
                }

                let inputs = match resolved {
                    Ok(inputs) => inputs,
                    Err(err) => {
                        let attrs = previous.map(|r| r.attributes.clone()).unwrap_or_default();
                        let record = self.commit(
                            stack,
                            id,
                            previous,
                            &node.fingerprint(),
                            ResourceStatus::Failed,
                            attrs,
                            depends_on,
                            None,
                        )?;
                        live.insert(id.clone(), record);
                        report.failed.push(FailedResource {
                            id: id.clone(),
                            error: err.to_string(),
                        });
                        continue;
                    }
                };

                let current = match kind {
                    ChangeKind::Update => previous.map(|r| r.attributes.clone()),
                    _ => None,
                };
                let record = self.commit(
                    stack,
                    id,
                    previous,
                    &node.fingerprint(),
                    ResourceStatus::Creating,
                    current.clone().unwrap_or_default(),
                    depends_on,
                    Some(inputs.clone()),
                )?;
                live.insert(id.clone(), record);
                kinds.insert(id.clone(), kind);

                let request = ProvisionRequest {
                    stack: stack.to_string(),
                    id: id.clone(),
                    properties: node.properties.clone(),
                    inputs,
                };
                let provisioner = Arc::clone(&self.provisioner);
                let semaphore = Arc::clone(&semaphore);
                let timeout = self.options.ready_timeout;
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let outcome =
                        provision(provisioner.as_ref(), &request, current.as_ref(), timeout).await;
                    (request, outcome)
                });
            }

            debug!(stack = %stack, wave = index, tasks = tasks.len(), "wave started");

            while let Some(joined) = tasks.join_next().await {
                let (request, outcome) = joined.map_err(|e| EngineError::Join(e.to_string()))?;
                let id = request.id;
                let previous = live.get(&id).cloned();
                let fingerprint = previous
                    .as_ref()
                    .map(|r| r.fingerprint.clone())
                    .unwrap_or_default();
                let depends_on = previous
                    .as_ref()
                    .map(|r| r.depends_on.clone())
                    .unwrap_or_default();

                match outcome {
                    Ok(mut attributes) => {
                        if let Some(policy) = request.properties.get(DELETION_POLICY).and_then(|v| v.as_str()) {
                            attributes.insert(DELETION_POLICY.to_string(), policy.to_string());
                        }
                        let record = self.commit(
                            stack,
                            &id,
                            previous.as_ref(),
                            &fingerprint,
                            ResourceStatus::Ready,
                            attributes,
                            depends_on,
                            None,
                        )?;
                        live.insert(id.clone(), record);
                        if kinds.get(&id) == Some(&ChangeKind::Update) {
                            info!(resource = %id, "updated");
                            report.updated.push(id);
                        } else {
                            info!(resource = %id, "created");
                            report.created.push(id);
                        }
                    }
                    Err(err) => {
                        error!(resource = %id, error = %err, "provisioning failed");
                        let attributes = previous
                            .as_ref()
                            .map(|r| r.attributes.clone())
                            .unwrap_or_default();
                        let record = self.commit(
                            stack,
                            &id,
                            previous.as_ref(),
                            &fingerprint,
                            ResourceStatus::Failed,
                            attributes,
                            depends_on,
                            None,
                        )?;
                        live.insert(id.clone(), record);
                        report.failed.push(FailedResource {
                            id,
                            error: err.to_string(),
                        });
                    }
                }
            }

            if !report.failed.is_empty() && !halted {
                warn!(stack = %stack, wave = index, failed = report.failed.len(), "halting apply");
                halted = true;
            }
        }

        if halted {
            if self.options.rollback == RollbackPolicy::RollbackOrphans {
                self.rollback(graph, &mut report, &mut live).await?;
            }
            for change in plan.deletions() {
                report.skipped.push(change.id.clone());
            }
            report.failed.sort_by(|a, b| a.id.cmp(&b.id));
            return Ok(report);
        }

        self.apply_deletions(stack, plan, &mut report, &mut live).await?;

        report.outputs = render_outputs(graph, &live);
        self.store.clear_outputs(stack)?;
        for (name, value) in &report.outputs {
            self.store.put_output(&StackOutput {
                stack: stack.to_string(),
                name: name.clone(),
                value: value.clone(),
            })?;
        }

        info!(stack = %stack, summary = %report, "apply finished");
        Ok(report)
    }

    /// Remove what the stack no longer declares, honouring deletion
    /// policies the way [`Engine::destroy`] does. Retained records also
    /// pin what they depend on. The first failed delete stops the phase;
    /// the deletions after it are reported as skipped.
    async fn apply_deletions(
        &self,
        stack: &str,
        plan: &Plan,
        report: &mut ApplyReport,
        live: &mut BTreeMap<ResourceId, ResourceRecord>,
    ) -> EngineResult<()> {
        let order: Vec<ResourceId> = plan
            .deletions()
            .map(|c| c.id.clone())
            .filter(|id| live.contains_key(id))
            .collect();
        if order.is_empty() {
            return Ok(());
        }
        let candidates: BTreeMap<ResourceId, ResourceRecord> = live
            .iter()
            .filter(|(id, r)| order.contains(id) || r.status == ResourceStatus::Retained)
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect();
        let kept = retained_closure(&candidates);

        for (index, id) in order.iter().enumerate() {
            let Some(record) = live.get(id).cloned() else {
                continue;
            };
            if kept.contains(id) {
                let retained = self.retain(stack, id, &record)?;
                live.insert(id.clone(), retained);
                report.retained.push(id.clone());
                continue;
            }
            match self.retire(stack, id, &record).await? {
                Retired::Deleted { snapshot } => {
                    live.remove(id);
                    if let Some(snapshot) = snapshot {
                        report.snapshots.push((id.clone(), snapshot));
                    }
                    report.deleted.push(id.clone());
                }
                Retired::Failed { snapshot, error } => {
                    if let Some(snapshot) = snapshot {
                        report.snapshots.push((id.clone(), snapshot));
                    }
                    if let Some(failed) = live.get_mut(id) {
                        failed.status = ResourceStatus::Failed;
                    }
                    report.failed.push(FailedResource {
                        id: id.clone(),
                        error,
                    });
                    report.skipped.extend(
                        order[index + 1..]
                            .iter()
                            .filter(|rest| !kept.contains(*rest))
                            .cloned(),
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Delete resources created in this run that no ready resource still
    /// depends on, dependents first.
    async fn rollback(
        &self,
        graph: &ResourceGraph,
        report: &mut ApplyReport,
        live: &mut BTreeMap<ResourceId, ResourceRecord>,
    ) -> EngineResult<()> {
        let created: BTreeSet<ResourceId> = report.created.iter().cloned().collect();
        for id in graph.destruction_order()? {
            if !created.contains(&id) {
                continue;
            }
            let needed = graph.dependents(&id).into_iter().any(|dependent| {
                live.get(dependent)
                    .is_some_and(|r| r.status == ResourceStatus::Ready)
            });
            if needed {
                debug!(resource = %id, "kept, a ready resource depends on it");
                continue;
            }
            let Some(record) = live.get(&id).cloned() else {
                continue;
            };
            match self.provisioner.delete(&id, &record.attributes).await {
                Ok(()) => {
                    self.store
                        .delete_resource(graph.stack(), &record.kind, &record.name)?;
                    live.remove(&id);
                    info!(resource = %id, "rolled back");
                    report.rolled_back.push(id);
                }
                Err(err) => {
                    warn!(resource = %id, error = %err, "rollback delete failed, leaving in place");
                }
            }
        }
        Ok(())
    }
}

async fn provision(
    provisioner: &dyn Provisioner,
    request: &ProvisionRequest,
    current: Option<&Attributes>,
    ready_timeout: Duration,
) -> Result<Attributes, ProvisionError> {
    let attributes = match current {
        Some(current) => provisioner.update(request, current).await?,
        None => provisioner.create(request).await?,
    };
    tokio::time::timeout(ready_timeout, provisioner.wait_ready(&request.id, &attributes))
        .await
        .map_err(|_| ProvisionError::NotReady(ready_timeout))??;
    Ok(attributes)
}

/// Render the graph's outputs from live attributes. Outputs whose target
/// is not ready are left out.
pub fn render_outputs(
    graph: &ResourceGraph,
    live: &BTreeMap<ResourceId, ResourceRecord>,
) -> BTreeMap<String, String> {
    graph
        .outputs()
        .iter()
        .filter_map(|(name, binding)| {
            let value = live
                .get(&binding.target)
                .and_then(|r| r.attributes.get(&binding.attribute));
            if value.is_none() {
                warn!(output = %name, binding = %binding, "output target not ready");
            }
            value.map(|v| (name.clone(), v.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalProvisioner;
    use crate::testing::{Event, ScriptedProvisioner};
    use forge_core::{DeletionPolicy, StackConfig};
    use forge_graph::GraphBuilder;

    fn graph() -> ResourceGraph {
        GraphBuilder::from_stack(&StackConfig::scaffold("chat", "us-east-1")).unwrap()
    }

    fn engine(provisioner: Arc<dyn Provisioner>, options: EngineOptions) -> Engine {
        Engine::new(StateStore::open_in_memory().unwrap(), provisioner, options)
    }

    fn id(s: &str) -> ResourceId {
        ResourceId::parse(s).unwrap()
    }

    async fn deploy(engine: &Engine, graph: &ResourceGraph) -> ApplyReport {
        let live = engine.store().list_resources(graph.stack()).unwrap();
        let plan = Plan::compute(graph, &live).unwrap();
        engine.apply(graph, &plan).await.unwrap()
    }

    #[tokio::test]
    async fn full_apply_creates_everything_and_renders_outputs() {
        let g = graph();
        let engine = engine(
            Arc::new(LocalProvisioner::new("us-east-1", "123456789012")),
            EngineOptions::default(),
        );
        let report = deploy(&engine, &g).await;

        assert!(report.is_success(), "{report}");
        assert_eq!(report.created.len(), g.len());
        assert!(report.outputs["endpoint"].starts_with("http://web-"));
        assert_eq!(report.outputs["admin-secret"], "stackforge/chat/admin-password");

        let records = engine.store().list_resources("chat").unwrap();
        assert_eq!(records.len(), g.len());
        assert!(records.iter().all(|r| r.status == ResourceStatus::Ready));
        let stored = engine.store().list_outputs("chat").unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn second_apply_is_a_noop() {
        let g = graph();
        let engine = engine(
            Arc::new(LocalProvisioner::new("us-east-1", "123456789012")),
            EngineOptions::default(),
        );
        let first = deploy(&engine, &g).await;
        let live = engine.store().list_resources("chat").unwrap();
        let plan = Plan::compute(&g, &live).unwrap();
        assert!(plan.is_empty(), "{plan}");

        let second = engine.apply(&g, &plan).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.unchanged, g.len());
        assert_eq!(second.outputs, first.outputs);
    }

    #[tokio::test]
    async fn dependencies_are_ready_before_dependents_start() {
        let g = graph();
        let provisioner = Arc::new(ScriptedProvisioner::new().with_delay(Duration::from_millis(2)));
        let engine = engine(provisioner.clone(), EngineOptions::default());
        assert!(deploy(&engine, &g).await.is_success());

        let events = provisioner.events();
        let position = |event: &Event| events.iter().position(|e| e == event).unwrap();
        for node in g.nodes() {
            let started = position(&Event::Started(node.id.clone()));
            for dep in g.dependencies(&node.id) {
                let ready = position(&Event::Ready(dep.clone()));
                assert!(ready < started, "{} started before {dep} was ready", node.id);
            }
        }
    }

    #[tokio::test]
    async fn parallelism_is_bounded() {
        let g = graph();
        let provisioner = Arc::new(ScriptedProvisioner::new().with_delay(Duration::from_millis(5)));
        let options = EngineOptions {
            parallelism: 2,
            ..EngineOptions::default()
        };
        let engine = engine(provisioner.clone(), options);
        assert!(deploy(&engine, &g).await.is_success());
        assert!(provisioner.max_in_flight() <= 2);
        assert!(provisioner.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn failure_halts_later_waves_and_is_reported() {
        let g = graph();
        let provisioner = Arc::new(ScriptedProvisioner::new().failing_create("database/chat-db"));
        let engine = engine(provisioner.clone(), EngineOptions::default());
        let report = deploy(&engine, &g).await;

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, id("database/chat-db"));
        assert!(report.failed[0].error.contains("injected"));

        // Nothing that depends on the database was started.
        for dependent in g.edges().transitive_dependents(&id("database/chat-db")) {
            assert!(!provisioner.events().contains(&Event::Started(dependent.clone())));
            assert!(report.skipped.contains(&dependent), "{dependent} not skipped");
        }
        let db = engine
            .store()
            .get_resource("chat", "database", "chat-db")
            .unwrap()
            .unwrap();
        assert_eq!(db.status, ResourceStatus::Failed);
        assert!(report.outputs.is_empty());
        assert!(engine.store().list_outputs("chat").unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_removes_orphans() {
        let g = graph();
        let provisioner = Arc::new(ScriptedProvisioner::new().failing_create("database/chat-db"));
        let options = EngineOptions {
            rollback: RollbackPolicy::RollbackOrphans,
            ..EngineOptions::default()
        };
        let engine = engine(provisioner.clone(), options);
        let report = deploy(&engine, &g).await;

        assert!(!report.is_success());
        assert_eq!(report.rolled_back.len(), report.created.len());
        assert!(report.rolled_back.contains(&id("network/chat")));
        let position = |r: &str| report.rolled_back.iter().position(|x| *x == id(r)).unwrap();
        assert!(position("subnet/public-a") < position("network/chat"));

        let remaining = engine.store().list_resources("chat").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, ResourceStatus::Failed);
    }

    #[tokio::test]
    async fn readiness_timeout_is_a_failure() {
        let g = graph();
        let provisioner = Arc::new(
            ScriptedProvisioner::new().slow_ready("database/chat-db", Duration::from_secs(5)),
        );
        let options = EngineOptions {
            ready_timeout: Duration::from_millis(20),
            ..EngineOptions::default()
        };
        let engine = engine(provisioner, options);
        let report = deploy(&engine, &g).await;
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("not ready"), "{}", report.failed[0].error);
    }

    #[tokio::test]
    async fn changed_property_updates_only_that_resource() {
        let engine = engine(
            Arc::new(LocalProvisioner::new("us-east-1", "123456789012")),
            EngineOptions::default(),
        );
        deploy(&engine, &graph()).await;

        let mut config = StackConfig::scaffold("chat", "us-east-1");
        config.services[1].replicas = 4;
        let changed = GraphBuilder::from_stack(&config).unwrap();
        let report = deploy(&engine, &changed).await;
        assert!(report.is_success());
        assert_eq!(report.updated, vec![id("service/webui")]);
        assert!(report.created.is_empty());
    }

    #[tokio::test]
    async fn removed_resources_are_deleted() {
        let engine = engine(
            Arc::new(LocalProvisioner::new("us-east-1", "123456789012")),
            EngineOptions::default(),
        );
        deploy(&engine, &graph()).await;

        let mut config = StackConfig::scaffold("chat", "us-east-1");
        config.roles.push(forge_core::RoleSpec {
            name: "unused".to_string(),
            policies: Vec::new(),
        });
        deploy(&engine, &GraphBuilder::from_stack(&config).unwrap()).await;
        assert!(engine.store().get_resource("chat", "role", "unused").unwrap().is_some());

        let report = deploy(&engine, &graph()).await;
        assert_eq!(report.deleted, vec![id("role/unused")]);
        assert!(engine.store().get_resource("chat", "role", "unused").unwrap().is_none());
    }

    fn with_policy(policy: DeletionPolicy) -> StackConfig {
        let mut config = StackConfig::scaffold("chat", "us-east-1");
        if let Some(db) = config.database.as_mut() {
            db.deletion_policy = policy;
        }
        config
    }

    /// `config` with its database and every reference to it removed.
    fn without_database(mut config: StackConfig) -> ResourceGraph {
        config.database = None;
        for service in &mut config.services {
            for container in &mut service.containers {
                container.env_from.retain(|_, reference| !reference.starts_with("database:"));
            }
        }
        GraphBuilder::from_stack(&config).unwrap()
    }

    #[tokio::test]
    async fn removed_retained_database_is_kept_with_its_dependencies() {
        let provisioner = Arc::new(ScriptedProvisioner::new());
        let engine = engine(provisioner.clone(), EngineOptions::default());
        let config = with_policy(DeletionPolicy::Retain);
        deploy(&engine, &GraphBuilder::from_stack(&config).unwrap()).await;

        let shrunk = without_database(config);
        let report = deploy(&engine, &shrunk).await;
        assert!(report.is_success(), "{report}");
        assert!(report.retained.contains(&id("database/chat-db")), "{report:?}");
        assert!(report.retained.contains(&id("subnet-group/chat-db")), "{report:?}");
        assert!(!report.deleted.contains(&id("database/chat-db")));
        assert!(!report.deleted.contains(&id("subnet-group/chat-db")));
        assert!(!provisioner.events().contains(&Event::Deleted(id("database/chat-db"))));

        let db = engine
            .store()
            .get_resource("chat", "database", "chat-db")
            .unwrap()
            .unwrap();
        assert_eq!(db.status, ResourceStatus::Retained);

        let live = engine.store().list_resources("chat").unwrap();
        let plan = Plan::compute(&shrunk, &live).unwrap();
        assert_eq!(plan.count(ChangeKind::Delete), 0, "{plan}");
    }

    #[tokio::test]
    async fn removed_snapshot_database_is_snapshotted_before_delete() {
        let provisioner = Arc::new(ScriptedProvisioner::new());
        let engine = engine(provisioner.clone(), EngineOptions::default());
        let config = with_policy(DeletionPolicy::Snapshot);
        deploy(&engine, &GraphBuilder::from_stack(&config).unwrap()).await;

        let report = deploy(&engine, &without_database(config)).await;
        assert!(report.is_success(), "{report}");
        assert!(report.deleted.contains(&id("database/chat-db")));
        assert!(report.retained.is_empty());
        assert!(report.snapshots.iter().any(|(r, _)| *r == id("database/chat-db")));

        let events = provisioner.events();
        let snapshot = events
            .iter()
            .position(|e| *e == Event::Snapshot(id("database/chat-db")))
            .unwrap();
        let deleted = events
            .iter()
            .position(|e| *e == Event::Deleted(id("database/chat-db")))
            .unwrap();
        assert!(snapshot < deleted);
    }

    #[tokio::test]
    async fn upstream_change_updates_dependents_until_converged() {
        let engine = engine(Arc::new(ScriptedProvisioner::new()), EngineOptions::default());
        deploy(&engine, &graph()).await;

        let mut config = StackConfig::scaffold("chat", "us-east-1");
        if let Some(db) = config.database.as_mut() {
            db.port = 6543;
        }
        for boundary in config.boundaries.iter_mut().filter(|b| b.name == "database") {
            boundary.ingress[0].port = 6543;
        }
        let moved = GraphBuilder::from_stack(&config).unwrap();
        let report = deploy(&engine, &moved).await;
        assert!(report.is_success(), "{report}");
        assert!(report.updated.contains(&id("database/chat-db")));
        assert!(report.updated.contains(&id("task-definition/webui")), "{report:?}");
        assert!(!report.updated.contains(&id("task-definition/gateway")));

        let task = engine
            .store()
            .get_resource("chat", "task-definition", "webui")
            .unwrap()
            .unwrap();
        assert!(task.inputs.values().any(|v| v.contains(":6543/openwebui")), "{:?}", task.inputs);
        assert!(task.inputs.values().all(|v| !v.contains(":5432")), "{:?}", task.inputs);

        let live = engine.store().list_resources("chat").unwrap();
        let plan = Plan::compute(&moved, &live).unwrap();
        assert!(plan.is_empty(), "{plan}");
    }

    #[tokio::test]
    async fn failed_plan_deletion_skips_the_rest_and_keeps_outputs() {
        let provisioner = Arc::new(ScriptedProvisioner::new().failing_delete("database/chat-db"));
        let engine = engine(provisioner.clone(), EngineOptions::default());
        let config = with_policy(DeletionPolicy::Destroy);
        deploy(&engine, &GraphBuilder::from_stack(&config).unwrap()).await;
        engine.store().clear_outputs("chat").unwrap();

        let report = deploy(&engine, &without_database(config)).await;
        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, id("database/chat-db"));
        assert!(report.failed[0].error.contains("injected delete failure"));
        assert!(report.skipped.contains(&id("subnet-group/chat-db")), "{report:?}");
        assert!(!provisioner.events().contains(&Event::Deleted(id("subnet-group/chat-db"))));

        let db = engine
            .store()
            .get_resource("chat", "database", "chat-db")
            .unwrap()
            .unwrap();
        assert_eq!(db.status, ResourceStatus::Failed);
        assert!(engine
            .store()
            .get_resource("chat", "subnet-group", "chat-db")
            .unwrap()
            .is_some());
        assert!(report.outputs.contains_key("endpoint"));
        assert_eq!(engine.store().list_outputs("chat").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn database_receives_password_reference_not_material() {
        let g = graph();
        let provisioner = Arc::new(ScriptedProvisioner::new());
        let engine = engine(provisioner.clone(), EngineOptions::default());
        deploy(&engine, &g).await;
        let inputs = provisioner.inputs_of(&id("database/chat-db")).unwrap();
        assert!(inputs["master_password"].starts_with("arn:forge:secret:"));
    }
}
