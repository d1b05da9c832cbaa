//! Desired-versus-live diff.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use forge_graph::{DependencyGraph, ResourceGraph, ResourceId, ResourceNode};
use forge_state::{ResourceRecord, ResourceStatus};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    NoOp,
}

impl ChangeKind {
    pub fn symbol(&self) -> char {
        match self {
            ChangeKind::Create => '+',
            ChangeKind::Update => '~',
            ChangeKind::Delete => '-',
            ChangeKind::NoOp => ' ',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub id: ResourceId,
    pub kind: ChangeKind,
    /// Fingerprint of the desired node; `None` for deletions.
    pub desired: Option<String>,
    /// Fingerprint recorded in live state, if any.
    pub live: Option<String>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.symbol(), self.id)
    }
}

/// Ordered change list for one stack.
///
/// Creates, updates and no-ops follow the desired creation order;
/// deletions follow, dependents before their dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub stack: String,
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn compute(graph: &ResourceGraph, live: &[ResourceRecord]) -> EngineResult<Self> {
        let mut live_by_id: BTreeMap<ResourceId, &ResourceRecord> = BTreeMap::new();
        for record in live {
            let id = ResourceId::parse(&record.id())
                .ok_or_else(|| EngineError::UnknownRecord(record.id()))?;
            live_by_id.insert(id, record);
        }
        let resolvable = live_by_id.clone();

        let mut changes = Vec::with_capacity(graph.len());
        for id in graph.creation_order()? {
            let Some(node) = graph.node(&id) else {
                continue;
            };
            let desired = node.fingerprint();
            let record = live_by_id.remove(&id);
            let kind = match record {
                None => ChangeKind::Create,
                Some(r) => match r.status {
                    ResourceStatus::Ready | ResourceStatus::Retained if r.fingerprint != desired => {
                        ChangeKind::Update
                    }
                    // Same desired properties, but an upstream value it
                    // consumes moved. Inputs that cannot be resolved yet
                    // are checked again during apply.
                    ResourceStatus::Ready | ResourceStatus::Retained => match resolve_inputs(node, &resolvable) {
                        Ok(inputs) if inputs != r.inputs => ChangeKind::Update,
                        _ => ChangeKind::NoOp,
                    },
                    // Never confirmed ready: provision again from scratch.
                    ResourceStatus::Creating | ResourceStatus::Failed | ResourceStatus::Deleting => {
                        ChangeKind::Create
                    }
                },
            };
            changes.push(Change {
                id,
                kind,
                desired: Some(desired),
                live: record.map(|r| r.fingerprint.clone()),
            });
        }

        // Retained records outlive their declaration; only destroy sees them.
        live_by_id.retain(|_, r| r.status != ResourceStatus::Retained);
        for id in deletion_order(&live_by_id)? {
            let live = live_by_id.get(&id).map(|r| r.fingerprint.clone());
            changes.push(Change {
                id,
                kind: ChangeKind::Delete,
                desired: None,
                live,
            });
        }

        Ok(Self {
            stack: graph.stack().to_string(),
            changes,
        })
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// True when applying would change nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|c| c.kind == ChangeKind::NoOp)
    }

    pub fn change(&self, id: &ResourceId) -> Option<&Change> {
        self.changes.iter().find(|c| &c.id == id)
    }

    pub fn deletions(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.kind == ChangeKind::Delete)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in self.changes.iter().filter(|c| c.kind != ChangeKind::NoOp) {
            writeln!(f, "{change}")?;
        }
        write!(
            f,
            "plan for {}: {} to create, {} to update, {} to delete, {} unchanged",
            self.stack,
            self.count(ChangeKind::Create),
            self.count(ChangeKind::Update),
            self.count(ChangeKind::Delete),
            self.count(ChangeKind::NoOp),
        )
    }
}

/// Resolve a node's bindings against the attributes of ready or retained
/// resources.
pub(crate) fn resolve_inputs<R: Borrow<ResourceRecord>>(
    node: &ResourceNode,
    live: &BTreeMap<ResourceId, R>,
) -> EngineResult<BTreeMap<String, String>> {
    node.bindings
        .iter()
        .map(|(name, binding)| {
            live.get(&binding.target)
                .map(|r| <R as Borrow<ResourceRecord>>::borrow(r))
                .filter(|r| r.status == ResourceStatus::Ready || r.status == ResourceStatus::Retained)
                .and_then(|r| r.attributes.get(&binding.attribute))
                .map(|value| (name.clone(), value.clone()))
                .ok_or_else(|| EngineError::UnresolvedInput {
                    resource: node.id.to_string(),
                    input: name.clone(),
                    binding: binding.to_string(),
                })
        })
        .collect()
}

/// Dependents first, using the dependencies each record was applied with.
pub(crate) fn deletion_order(
    records: &BTreeMap<ResourceId, &ResourceRecord>,
) -> EngineResult<Vec<ResourceId>> {
    let mut graph = DependencyGraph::new();
    for (id, record) in records {
        graph.add_node(id.clone());
        for dep in &record.depends_on {
            if let Some(dep) = ResourceId::parse(dep).filter(|d| records.contains_key(d)) {
                graph.add_edge(id.clone(), dep);
            }
        }
    }
    let mut order = graph.topological_order().map_err(|members| {
        EngineError::LiveCycle(members.iter().map(ToString::to_string).collect())
    })?;
    order.reverse();
    Ok(order)
}
