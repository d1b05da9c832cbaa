//! The resource graph: nodes, explicit dependency edges, and ordering.

use std::collections::BTreeMap;

use crate::error::{GraphError, GraphResult};
use crate::layout::SubnetLayout;
use crate::order::DependencyGraph;
use crate::resource::{Binding, ResourceId, ResourceNode};

#[derive(Debug, Clone)]
pub struct ResourceGraph {
    stack: String,
    layout: SubnetLayout,
    nodes: BTreeMap<ResourceId, ResourceNode>,
    edges: DependencyGraph<ResourceId>,
    outputs: BTreeMap<String, Binding>,
}

impl ResourceGraph {
    pub fn new(stack: &str, layout: SubnetLayout) -> Self {
        Self {
            stack: stack.to_string(),
            layout,
            nodes: BTreeMap::new(),
            edges: DependencyGraph::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn layout(&self) -> &SubnetLayout {
        &self.layout
    }

    pub fn add_node(&mut self, node: ResourceNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::Duplicate(node.id.to_string()));
        }
        self.edges.add_node(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Record that `node` depends on `depends_on`, so `depends_on` is
    /// created first and destroyed last.
    pub fn add_edge(&mut self, node: &ResourceId, depends_on: &ResourceId) -> GraphResult<()> {
        for id in [node, depends_on] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownResource(id.to_string()));
            }
        }
        self.edges.add_edge(node.clone(), depends_on.clone());
        Ok(())
    }

    pub fn set_output(&mut self, name: &str, binding: Binding) {
        self.outputs.insert(name.to_string(), binding);
    }

    pub fn outputs(&self) -> &BTreeMap<String, Binding> {
        &self.outputs
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &ResourceId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes
            .keys()
            .map(|id| self.edges.dependencies(id).count())
            .sum()
    }

    pub fn dependencies(&self, id: &ResourceId) -> Vec<&ResourceId> {
        self.edges.dependencies(id).collect()
    }

    pub fn dependents(&self, id: &ResourceId) -> Vec<&ResourceId> {
        self.edges.dependents(id)
    }

    pub fn edges(&self) -> &DependencyGraph<ResourceId> {
        &self.edges
    }

    /// Every resource in an order where each follows all of its
    /// dependencies. Ties are broken by resource id.
    pub fn creation_order(&self) -> GraphResult<Vec<ResourceId>> {
        self.edges.topological_order().map_err(cycle)
    }

    /// Exact reverse of [`Self::creation_order`].
    pub fn destruction_order(&self) -> GraphResult<Vec<ResourceId>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }

    /// Layers of mutually independent resources. Every dependency of a
    /// resource in wave n sits in a wave before n.
    pub fn waves(&self) -> GraphResult<Vec<Vec<ResourceId>>> {
        self.edges.layers().map_err(cycle)
    }
}

fn cycle(members: Vec<ResourceId>) -> GraphError {
    GraphError::Cycle {
        members: members.iter().map(ToString::to_string).collect(),
    }
}
