//! The dependency graph of a page load.
//!
//! Every [`Node`] is a piece of work (a network request or a top level
//! task of the main thread) and depends on the nodes that had to finish
//! before it could start. The graph is an arena: nodes and edges live in
//! vectors indexed by [`NodeId`], the graph is immutable once built and
//! shared between simulations through an `Arc`.
//!
//! Two kinds of edges are kept apart. [`EdgeKind::Causal`] edges come
//! from what the capture shows (an initiator, a redirect, a script being
//! evaluated). [`EdgeKind::MainThread`] edges chain the CPU nodes in the
//! order the main thread ran them and are re-derived whenever a graph is
//! [`filtered`](DependencyGraph::filtered).
//!
//! ```
//! use lantern_core::{
//!     graph::GraphBuilder,
//!     record::{NetworkRecord, RequestId},
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! let document = NetworkRecord::new(RequestId::new("1"), "https://a.com/");
//! let script = NetworkRecord {
//!     start_time: Duration::from_millis(100),
//!     ..NetworkRecord::new(RequestId::new("2"), "https://a.com/app.js")
//! };
//!
//! let mut builder = GraphBuilder::new();
//! let root = builder.add_network(Arc::new(document));
//! let app = builder.add_network(Arc::new(script));
//! builder.add_dependency(app, root);
//!
//! let graph = builder.build(root).unwrap();
//! assert_eq!(graph.topological_order(), &[root, app]);
//! assert_eq!(graph.dependencies(app).collect::<Vec<_>>(), vec![root]);
//! ```

mod builder;
mod id;
mod node;

pub use self::{
    id::NodeId,
    node::{CpuNode, NetworkNode, Node, NodeKind},
};
use crate::{record::NetworkRecord, task::Task};
use fnv::FnvHasher;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, BinaryHeap},
    hash::{Hash, Hasher},
    sync::Arc,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// the dependent was caused by, or needs the output of, the dependency
    Causal,
    /// both nodes run on the main thread, the dependency ran first
    MainThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub node: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Error)]
pub enum GraphConstructionError {
    #[error("No main document among the {records} network records")]
    MissingMainDocument { records: usize },
    #[error("Node ({node}) Not Found in a graph of {len} nodes")]
    UnknownNode { node: NodeId, len: usize },
    #[error("Dependency cycle through nodes {nodes:?}")]
    Cycle { nodes: Vec<NodeId> },
}

/// An acyclic graph of page load activities, see the [module](self)
/// documentation.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: NodeId,
    nodes: Vec<Node>,
    dependencies: Vec<Vec<Edge>>,
    dependents: Vec<Vec<Edge>>,
    topological_order: Vec<NodeId>,
}

/// Low level construction of a [`DependencyGraph`].
///
/// Edges are taken as given; [`build`](GraphBuilder::build) only checks
/// that they reference known nodes and do not form a cycle. Graphs built
/// from a capture go through [`DependencyGraph::from_capture`] instead,
/// which discovers the edges and settles timestamp conflicts.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: BTreeMap<(NodeId, NodeId), EdgeKind>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node::new(id, kind));
        id
    }

    pub fn add_network(&mut self, record: Arc<NetworkRecord>) -> NodeId {
        self.add(NodeKind::Network(NetworkNode { record }))
    }

    pub fn add_cpu(&mut self, task: Arc<Task>) -> NodeId {
        self.add(NodeKind::Cpu(CpuNode { task }))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `dependent` cannot start before `dependency` has finished.
    pub fn add_dependency(&mut self, dependent: NodeId, dependency: NodeId) -> &mut Self {
        self.add_edge(dependent, dependency, EdgeKind::Causal)
    }

    /// Like [`add_dependency`](Self::add_dependency) for two CPU nodes
    /// the main thread ran one after the other.
    pub fn add_main_thread_dependency(
        &mut self,
        dependent: NodeId,
        dependency: NodeId,
    ) -> &mut Self {
        self.add_edge(dependent, dependency, EdgeKind::MainThread)
    }

    fn add_edge(&mut self, dependent: NodeId, dependency: NodeId, kind: EdgeKind) -> &mut Self {
        if dependent != dependency {
            let entry = self.edges.entry((dependent, dependency)).or_insert(kind);
            // a causal reason outranks the main thread ordering
            *entry = (*entry).min(kind);
        }
        self
    }

    fn has_edge(&self, dependent: NodeId, dependency: NodeId) -> bool {
        self.edges.contains_key(&(dependent, dependency))
    }

    /// `true` if `to` is `from` or one of its (transitive) dependencies.
    fn depends_on(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.edges
                    .range((current, NodeId::ZERO)..=(current, NodeId::new(u32::MAX)))
                    .map(|(&(_, dependency), _)| dependency),
            );
        }
        false
    }

    /// Add the edge unless it contradicts the observed timestamps: a
    /// dependency that started strictly after its dependent is dropped,
    /// so is an edge between nodes that started together and would close
    /// a cycle. Returns whether the edge was kept.
    pub(crate) fn add_edge_checked(
        &mut self,
        dependent: NodeId,
        dependency: NodeId,
        kind: EdgeKind,
    ) -> bool {
        if dependent == dependency {
            return false;
        }
        let (Some(dependent_node), Some(dependency_node)) = (
            self.nodes.get(dependent.index()),
            self.nodes.get(dependency.index()),
        ) else {
            return false;
        };

        let dependent_start = dependent_node.start_time();
        let dependency_start = dependency_node.start_time();
        if dependency_start > dependent_start {
            tracing::trace!(
                %dependent,
                %dependency,
                "dependency starts after its dependent, dropping edge"
            );
            return false;
        }
        if dependency_start == dependent_start
            && !self.has_edge(dependent, dependency)
            && self.depends_on(dependency, dependent)
        {
            tracing::debug!(%dependent, %dependency, "edge would close a cycle, dropping");
            return false;
        }

        self.add_edge(dependent, dependency, kind);
        true
    }

    /// Check the edges and freeze the graph.
    ///
    /// # Errors
    ///
    /// - [`GraphConstructionError::UnknownNode`] if `root` or an edge
    ///   references a node that was never added;
    /// - [`GraphConstructionError::Cycle`] if the edges form a cycle.
    pub fn build(self, root: NodeId) -> Result<DependencyGraph, GraphConstructionError> {
        let len = self.nodes.len();
        let check = |node: NodeId| {
            if node.index() < len {
                Ok(())
            } else {
                Err(GraphConstructionError::UnknownNode { node, len })
            }
        };
        check(root)?;

        let mut dependencies = vec![Vec::new(); len];
        let mut dependents = vec![Vec::new(); len];
        for (&(dependent, dependency), &kind) in &self.edges {
            check(dependent)?;
            check(dependency)?;
            dependencies[dependent.index()].push(Edge {
                node: dependency,
                kind,
            });
            dependents[dependency.index()].push(Edge {
                node: dependent,
                kind,
            });
        }
        for edges in dependents.iter_mut() {
            edges.sort();
        }

        let topological_order = topological_order(&dependencies, &dependents)?;

        Ok(DependencyGraph {
            root,
            nodes: self.nodes,
            dependencies,
            dependents,
            topological_order,
        })
    }
}

/// Kahn's algorithm, smallest ready id first.
fn topological_order(
    dependencies: &[Vec<Edge>],
    dependents: &[Vec<Edge>],
) -> Result<Vec<NodeId>, GraphConstructionError> {
    let mut remaining: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<NodeId>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(index, _)| Reverse(NodeId::from_index(index)))
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for edge in &dependents[node.index()] {
            let count = &mut remaining[edge.node.index()];
            *count -= 1;
            if *count == 0 {
                ready.push(Reverse(edge.node));
            }
        }
    }

    if order.len() != dependencies.len() {
        let nodes = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, _)| NodeId::from_index(index))
            .collect();
        return Err(GraphConstructionError::Cycle { nodes });
    }
    Ok(order)
}

impl DependencyGraph {
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// if `id` does not belong to this graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All the nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn dependencies(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependency_edges(id).iter().map(|edge| edge.node)
    }

    pub fn dependency_edges(&self, id: NodeId) -> &[Edge] {
        self.dependencies
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn dependents(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependent_edges(id).iter().map(|edge| edge.node)
    }

    pub fn dependent_edges(&self, id: NodeId) -> &[Edge] {
        self.dependents
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every node after all of its dependencies; ties go to the smallest
    /// id.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topological_order
    }

    pub fn network_nodes(&self) -> impl Iterator<Item = (NodeId, &NetworkNode)> {
        self.nodes
            .iter()
            .filter_map(|node| node.as_network().map(|network| (node.id(), network)))
    }

    pub fn cpu_nodes(&self) -> impl Iterator<Item = (NodeId, &CpuNode)> {
        self.nodes
            .iter()
            .filter_map(|node| node.as_cpu().map(|cpu| (node.id(), cpu)))
    }

    /// A graph of the nodes matching `predicate`, the root and every node
    /// they causally depend on.
    ///
    /// Node ids are renumbered in their original order. Main-thread edges
    /// are derived again among the CPU nodes that are kept.
    pub fn filtered<F>(&self, predicate: F) -> Result<DependencyGraph, GraphConstructionError>
    where
        F: Fn(&Node) -> bool,
    {
        let mut keep = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|node| node.id() == self.root || predicate(node))
            .map(Node::id)
            .collect();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut keep[id.index()], true) {
                continue;
            }
            stack.extend(
                self.dependency_edges(id)
                    .iter()
                    .filter(|edge| edge.kind == EdgeKind::Causal)
                    .map(|edge| edge.node),
            );
        }

        let mut builder = GraphBuilder::new();
        let mut remap = vec![None; self.nodes.len()];
        for node in self.nodes.iter().filter(|node| keep[node.id().index()]) {
            remap[node.id().index()] = Some(builder.add(node.kind().clone()));
        }

        for node in &self.nodes {
            let Some(dependent) = remap[node.id().index()] else {
                continue;
            };
            for edge in self.dependency_edges(node.id()) {
                if edge.kind == EdgeKind::Causal
                    && let Some(dependency) = remap[edge.node.index()]
                {
                    builder.add_dependency(dependent, dependency);
                }
            }
        }
        builder.link_main_thread();

        let root = remap[self.root.index()].unwrap_or(NodeId::ZERO);
        // a task that only followed a dropped task on the main thread
        for id in remap.iter().flatten().copied() {
            if id != root && !builder.has_dependencies(id) {
                builder.add_edge_checked(id, root, EdgeKind::Causal);
            }
        }
        builder.build(root)
    }

    /// A stable hash of the nodes, their records and tasks, and the edges
    /// of the graph.
    ///
    /// Two graphs built from the same capture have the same fingerprint,
    /// in this process or the next one.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.nodes.len().hash(&mut hasher);
        self.root.hash(&mut hasher);
        for node in &self.nodes {
            match node.kind() {
                NodeKind::Network(network) => {
                    0u8.hash(&mut hasher);
                    network.record.fingerprint_into(&mut hasher);
                }
                NodeKind::Cpu(cpu) => {
                    1u8.hash(&mut hasher);
                    cpu.task.hash(&mut hasher);
                }
            }
            node.start_time().hash(&mut hasher);
            for edge in self.dependency_edges(node.id()) {
                edge.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

impl GraphBuilder {
    /// Chain the CPU nodes in the order the main thread ran them.
    pub(crate) fn link_main_thread(&mut self) {
        let mut cpu: Vec<(std::time::Duration, NodeId)> = self
            .nodes
            .iter()
            .filter(|node| node.is_cpu())
            .map(|node| (node.start_time(), node.id()))
            .collect();
        cpu.sort();
        for pair in cpu.windows(2) {
            let [(_, previous), (_, next)] = pair else {
                continue;
            };
            self.add_edge_checked(*next, *previous, EdgeKind::MainThread);
        }
    }
}
