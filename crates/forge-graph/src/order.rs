//! Generic dependency ordering.
//!
//! `DependencyGraph<K>` stores, for each node, the set of nodes it
//! depends on. Ordering uses Kahn's algorithm with a sorted ready set so
//! the result is a deterministic function of the edges alone. When Kahn
//! stalls, Tarjan's strongly-connected-components pass over the stalled
//! remainder names exactly the nodes that sit on a cycle.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    deps: BTreeMap<K, BTreeSet<K>>,
}

impl<K: Ord + Clone> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            deps: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> DependencyGraph<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: K) {
        self.deps.entry(node).or_default();
    }

    /// Record that `node` depends on `depends_on`. Both become nodes.
    pub fn add_edge(&mut self, node: K, depends_on: K) {
        self.deps.entry(depends_on.clone()).or_default();
        self.deps.entry(node).or_default().insert(depends_on);
    }

    pub fn contains(&self, node: &K) -> bool {
        self.deps.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &K> {
        self.deps.keys()
    }

    /// Direct dependencies of `node`.
    pub fn dependencies(&self, node: &K) -> impl Iterator<Item = &K> {
        self.deps.get(node).into_iter().flatten()
    }

    /// Nodes that directly depend on `node`.
    pub fn dependents(&self, node: &K) -> Vec<&K> {
        self.deps
            .iter()
            .filter(|(_, deps)| deps.contains(node))
            .map(|(k, _)| k)
            .collect()
    }

    /// Every node that depends on `node`, directly or transitively.
    pub fn transitive_dependents(&self, node: &K) -> BTreeSet<K> {
        let reverse = self.reverse();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&K> = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            for dependent in reverse.get(current).into_iter().flatten() {
                if seen.insert((*dependent).clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }

    fn reverse(&self) -> BTreeMap<&K, Vec<&K>> {
        let mut reverse: BTreeMap<&K, Vec<&K>> = BTreeMap::new();
        for (node, deps) in &self.deps {
            for dep in deps {
                reverse.entry(dep).or_default().push(node);
            }
        }
        reverse
    }

    /// Linearize so every node follows all of its dependencies.
    ///
    /// Ties are broken by `K`'s ordering. On a cycle, returns
    /// `Err(members)` with every node on every cycle, sorted.
    pub fn topological_order(&self) -> Result<Vec<K>, Vec<K>> {
        let reverse = self.reverse();
        let mut remaining: BTreeMap<&K, usize> =
            self.deps.iter().map(|(k, deps)| (k, deps.len())).collect();
        let mut ready: BTreeSet<&K> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut order = Vec::with_capacity(self.deps.len());

        while let Some(node) = ready.pop_first() {
            remaining.remove(node);
            order.push(node.clone());
            for dependent in reverse.get(node).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if remaining.is_empty() {
            Ok(order)
        } else {
            let stalled: BTreeSet<&K> = remaining.keys().copied().collect();
            Err(self.cycle_members_within(&stalled))
        }
    }

    /// Group nodes into layers: layer 0 has no dependencies, layer n
    /// depends only on earlier layers with at least one in layer n-1.
    /// Nodes in one layer are mutually independent.
    pub fn layers(&self) -> Result<Vec<Vec<K>>, Vec<K>> {
        let order = self.topological_order()?;
        let mut depth: BTreeMap<&K, usize> = BTreeMap::new();
        let mut layers: Vec<Vec<K>> = Vec::new();
        for node in &order {
            let d = self
                .dependencies(node)
                .filter_map(|dep| depth.get(dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(node, d);
            if layers.len() <= d {
                layers.resize_with(d + 1, Vec::new);
            }
            layers[d].push(node.clone());
        }
        for layer in &mut layers {
            layer.sort();
        }
        Ok(layers)
    }

    /// Every node on a cycle anywhere in the graph, sorted.
    pub fn cycle_members(&self) -> Vec<K> {
        let all: BTreeSet<&K> = self.deps.keys().collect();
        self.cycle_members_within(&all)
    }

    fn cycle_members_within(&self, subset: &BTreeSet<&K>) -> Vec<K> {
        let sub: BTreeMap<&K, Vec<&K>> = subset
            .iter()
            .map(|k| {
                let deps = self
                    .deps
                    .get(*k)
                    .into_iter()
                    .flatten()
                    .filter(|d| subset.contains(d))
                    .collect();
                (*k, deps)
            })
            .collect();

        let mut tarjan = Tarjan::new(&sub);
        for node in sub.keys() {
            if !tarjan.indices.contains_key(node) {
                tarjan.connect(node);
            }
        }

        let mut members: Vec<K> = tarjan
            .components
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || sub.get(scc[0]).is_some_and(|deps| deps.contains(&scc[0]))
            })
            .flatten()
            .map(|k| k.clone())
            .collect();
        members.sort();
        members.dedup();
        members
    }
}

/// Tarjan's strongly connected components over borrowed keys.
struct Tarjan<'g, 'k, K> {
    graph: &'g BTreeMap<&'k K, Vec<&'k K>>,
    next_index: usize,
    indices: BTreeMap<&'k K, usize>,
    lowlink: BTreeMap<&'k K, usize>,
    stack: Vec<&'k K>,
    on_stack: BTreeSet<&'k K>,
    components: Vec<Vec<&'k K>>,
}

impl<'g, 'k, K: Ord> Tarjan<'g, 'k, K> {
    fn new(graph: &'g BTreeMap<&'k K, Vec<&'k K>>) -> Self {
        Self {
            graph,
            next_index: 0,
            indices: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            components: Vec::new(),
        }
    }

    fn connect(&mut self, v: &'k K) {
        self.indices.insert(v, self.next_index);
        self.lowlink.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        let graph = self.graph;
        for &w in graph.get(v).into_iter().flatten() {
            if !self.indices.contains_key(w) {
                self.connect(w);
                let low = self.lowlink[v].min(self.lowlink[w]);
                self.lowlink.insert(v, low);
            } else if self.on_stack.contains(w) {
                let low = self.lowlink[v].min(self.indices[w]);
                self.lowlink.insert(v, low);
            }
        }

        if self.lowlink[v] == self.indices[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.remove(w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&'static str, &'static str)]) -> DependencyGraph<&'static str> {
        let mut g = DependencyGraph::new();
        for (node, dep) in edges {
            g.add_edge(*node, *dep);
        }
        g
    }

    fn position(order: &[&str], node: &str) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn order_respects_every_edge() {
        let edges = [
            ("service", "task"),
            ("task", "role"),
            ("task", "database"),
            ("database", "subnet"),
            ("subnet", "vpc"),
            ("service", "subnet"),
        ];
        let g = graph(&edges);
        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 6);
        for (node, dep) in edges {
            assert!(position(&order, dep) < position(&order, node), "{dep} before {node}");
        }
    }

    #[test]
    fn order_is_independent_of_insertion_order() {
        let a = graph(&[("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")]);
        let b = graph(&[("d", "c"), ("d", "b"), ("c", "a"), ("b", "a")]);
        assert_eq!(a.topological_order().unwrap(), b.topological_order().unwrap());
        assert_eq!(a.topological_order().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cycle_names_all_members_only() {
        // x → y → z → x is a cycle; w depends on it but is not on it.
        let g = graph(&[("x", "y"), ("y", "z"), ("z", "x"), ("w", "x"), ("y", "v")]);
        assert_eq!(g.topological_order().unwrap_err(), vec!["x", "y", "z"]);
    }

    #[test]
    fn two_disjoint_cycles_reported_together() {
        let g = graph(&[("a", "b"), ("b", "a"), ("m", "n"), ("n", "m"), ("q", "r")]);
        assert_eq!(g.topological_order().unwrap_err(), vec!["a", "b", "m", "n"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&[("a", "a"), ("b", "a")]);
        assert_eq!(g.topological_order().unwrap_err(), vec!["a"]);
        assert_eq!(g.cycle_members(), vec!["a"]);
    }

    #[test]
    fn cycle_detection_is_deterministic() {
        let g = graph(&[("p", "q"), ("q", "r"), ("r", "p")]);
        let first = g.topological_order().unwrap_err();
        for _ in 0..10 {
            assert_eq!(g.topological_order().unwrap_err(), first);
        }
    }

    #[test]
    fn layers_group_independent_nodes() {
        let g = graph(&[("b", "a"), ("c", "a"), ("d", "b"), ("e", "a")]);
        let layers = g.layers().unwrap();
        assert_eq!(layers, vec![vec!["a"], vec!["b", "c", "e"], vec!["d"]]);
    }

    #[test]
    fn dependents_and_transitive_dependents() {
        let g = graph(&[("b", "a"), ("c", "b"), ("d", "a")]);
        let mut direct = g.dependents(&"a");
        direct.sort();
        assert_eq!(direct, vec![&"b", &"d"]);
        assert_eq!(
            g.transitive_dependents(&"a").into_iter().collect::<Vec<_>>(),
            vec!["b", "c", "d"]
        );
    }

    #[test]
    fn empty_graph_orders_to_nothing() {
        let g: DependencyGraph<String> = DependencyGraph::new();
        assert!(g.topological_order().unwrap().is_empty());
        assert!(g.layers().unwrap().is_empty());
    }
}
