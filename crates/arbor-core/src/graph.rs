//! Graph storage over petgraph::StableDiGraph with typed NodeId/EdgeId
//!
//! Stable indices make node identity survive edge surgery: disconnecting a
//! node severs its edges but keeps the allocation, so ids held elsewhere
//! stay valid. That is the property the reparenting step and the analysis
//! passes lean on.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::model::{Edge, EdgeId, EdgeLabel, EdgeProperties, Node, NodeId};
use crate::scope::{ScopeId, ScopeManager};
use crate::types::TypeAliasStore;

/// The code property graph — a directed multigraph with stable indices.
pub struct CpgGraph {
    inner: StableDiGraph<Node, Edge>,
}

impl std::fmt::Debug for CpgGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpgGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Default for CpgGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CpgGraph {
    pub fn new() -> Self {
        CpgGraph {
            inner: StableDiGraph::new(),
        }
    }

    /// Add a node. The assigned id is written back into the node.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let idx = self.inner.add_node(node);
        let id = NodeId(idx.index() as u64);
        self.inner[idx].id = id;
        id
    }

    pub fn add_edge(
        &mut self,
        source: NodeId,
        label: EdgeLabel,
        target: NodeId,
        properties: EdgeProperties,
    ) -> EdgeId {
        let idx = self.inner.add_edge(
            NodeIndex::new(source.0 as usize),
            NodeIndex::new(target.0 as usize),
            Edge { label, properties },
        );
        EdgeId(idx.index() as u64)
    }

    /// Add an ordered AST child edge; the index is the current child count
    /// under that label.
    pub fn add_ast_child(&mut self, source: NodeId, label: EdgeLabel, target: NodeId) -> EdgeId {
        let index = self.targets(source, label).len() as u32;
        self.add_edge(source, label, target, EdgeProperties::indexed(index))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.inner.node_weight(NodeIndex::new(id.0 as usize))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.inner.node_weight_mut(NodeIndex::new(id.0 as usize))
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.inner
            .node_indices()
            .map(|idx| NodeId(idx.index() as u64))
            .collect()
    }

    /// Outgoing edges of a node as (label, properties, target).
    pub fn out_edges(&self, source: NodeId) -> Vec<(EdgeLabel, EdgeProperties, NodeId)> {
        self.inner
            .edges_directed(NodeIndex::new(source.0 as usize), Direction::Outgoing)
            .map(|e| {
                (
                    e.weight().label,
                    e.weight().properties,
                    NodeId(e.target().index() as u64),
                )
            })
            .collect()
    }

    /// Incoming edges of a node as (label, properties, source).
    pub fn in_edges(&self, target: NodeId) -> Vec<(EdgeLabel, EdgeProperties, NodeId)> {
        self.inner
            .edges_directed(NodeIndex::new(target.0 as usize), Direction::Incoming)
            .map(|e| {
                (
                    e.weight().label,
                    e.weight().properties,
                    NodeId(e.source().index() as u64),
                )
            })
            .collect()
    }

    /// Targets of outgoing `label` edges, ordered by the index property
    /// where present.
    pub fn targets(&self, source: NodeId, label: EdgeLabel) -> Vec<NodeId> {
        let mut found: Vec<(Option<u32>, u64, NodeId)> = self
            .inner
            .edges_directed(NodeIndex::new(source.0 as usize), Direction::Outgoing)
            .filter(|e| e.weight().label == label)
            .map(|e| {
                (
                    e.weight().properties.index,
                    e.id().index() as u64,
                    NodeId(e.target().index() as u64),
                )
            })
            .collect();
        found.sort_by_key(|(index, edge, _)| (index.unwrap_or(u32::MAX), *edge));
        found.into_iter().map(|(_, _, target)| target).collect()
    }

    /// The single target of a `label` edge, if any.
    pub fn target(&self, source: NodeId, label: EdgeLabel) -> Option<NodeId> {
        self.targets(source, label).into_iter().next()
    }

    /// Sources of incoming `label` edges.
    pub fn sources(&self, target: NodeId, label: EdgeLabel) -> Vec<NodeId> {
        let mut found: Vec<(u64, NodeId)> = self
            .inner
            .edges_directed(NodeIndex::new(target.0 as usize), Direction::Incoming)
            .filter(|e| e.weight().label == label)
            .map(|e| (e.id().index() as u64, NodeId(e.source().index() as u64)))
            .collect();
        found.sort_by_key(|(edge, _)| *edge);
        found.into_iter().map(|(_, source)| source).collect()
    }

    pub fn has_edge(&self, source: NodeId, target: NodeId, label: EdgeLabel) -> bool {
        self.inner
            .edges_directed(NodeIndex::new(source.0 as usize), Direction::Outgoing)
            .any(|e| e.weight().label == label && e.target().index() as u64 == target.0)
    }

    /// Remove the first `label` edge between two nodes, if present.
    pub fn remove_edge_between(&mut self, source: NodeId, target: NodeId, label: EdgeLabel) {
        let found = self
            .inner
            .edges_directed(NodeIndex::new(source.0 as usize), Direction::Outgoing)
            .find(|e| e.weight().label == label && e.target().index() as u64 == target.0)
            .map(|e| e.id());
        if let Some(idx) = found {
            self.inner.remove_edge(idx);
        }
    }

    /// Sever all incoming and outgoing edges. The node stays allocated, so
    /// ids held elsewhere remain valid.
    pub fn disconnect_from_graph(&mut self, id: NodeId) {
        let idx = NodeIndex::new(id.0 as usize);
        let incident: Vec<EdgeIndex> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.inner.edges_directed(idx, Direction::Incoming))
            .map(|e| e.id())
            .collect();
        for edge in incident {
            self.inner.remove_edge(edge);
        }
    }

    /// Rewrite all incoming edges of `old` to point at `new`, preserving
    /// labels and properties. Half of the reparenting primitive.
    pub fn transfer_incoming_edges(&mut self, old: NodeId, new: NodeId) {
        let old_idx = NodeIndex::new(old.0 as usize);
        let moved: Vec<(NodeIndex, Edge, EdgeIndex)> = self
            .inner
            .edges_directed(old_idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight().clone(), e.id()))
            .collect();
        for (source, edge, idx) in moved {
            self.inner.remove_edge(idx);
            self.inner
                .add_edge(source, NodeIndex::new(new.0 as usize), edge);
        }
    }

    /// Rewrite all outgoing edges of `old` to originate from `new`. The
    /// other half of the reparenting primitive: children follow the node.
    pub fn transfer_outgoing_edges(&mut self, old: NodeId, new: NodeId) {
        let old_idx = NodeIndex::new(old.0 as usize);
        let moved: Vec<(NodeIndex, Edge, EdgeIndex)> = self
            .inner
            .edges_directed(old_idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight().clone(), e.id()))
            .collect();
        for (target, edge, idx) in moved {
            self.inner.remove_edge(idx);
            self.inner
                .add_edge(NodeIndex::new(new.0 as usize), target, edge);
        }
    }

    /// Ordered AST children of a node across all AST labels.
    pub fn ast_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut found: Vec<(Option<u32>, u64, NodeId)> = self
            .inner
            .edges_directed(NodeIndex::new(id.0 as usize), Direction::Outgoing)
            .filter(|e| e.weight().label.is_ast())
            .map(|e| {
                (
                    e.weight().properties.index,
                    e.id().index() as u64,
                    NodeId(e.target().index() as u64),
                )
            })
            .collect();
        found.sort_by_key(|(index, edge, _)| (index.unwrap_or(u32::MAX), *edge));
        found.into_iter().map(|(_, _, target)| target).collect()
    }

    /// The AST parent of a node, if connected.
    pub fn ast_parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner
            .edges_directed(NodeIndex::new(id.0 as usize), Direction::Incoming)
            .find(|e| e.weight().label.is_ast())
            .map(|e| NodeId(e.source().index() as u64))
    }

    /// All nodes reachable from `root` via AST edges, root first, in BFS
    /// order.
    pub fn ast_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root]);
        seen.insert(root);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for child in self.ast_children(current) {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// The nearest enclosing function-like declaration, walking AST parents.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.ast_parent(id);
        while let Some(node) = current {
            if self.node(node).is_some_and(|n| n.is_function_like()) {
                return Some(node);
            }
            current = self.ast_parent(node);
        }
        None
    }

    fn edge_references(&self) -> Vec<(NodeId, NodeId, Edge)> {
        self.inner
            .edge_indices()
            .filter_map(|idx| {
                let (source, target) = self.inner.edge_endpoints(idx)?;
                let edge = self.inner.edge_weight(idx)?.clone();
                Some((
                    NodeId(source.index() as u64),
                    NodeId(target.index() as u64),
                    edge,
                ))
            })
            .collect()
    }
}

/// A translation context: the graph, its scope tree, typedef registrations
/// and the translation-unit roots. Frontends each build one; the manager
/// absorbs them into a single shared Cpg that the passes enrich.
#[derive(Debug)]
pub struct Cpg {
    pub graph: CpgGraph,
    pub scopes: ScopeManager,
    pub aliases: TypeAliasStore,
    pub units: Vec<NodeId>,
}

impl Cpg {
    pub fn new(delimiter: &str) -> Self {
        Cpg {
            graph: CpgGraph::new(),
            scopes: ScopeManager::new(delimiter),
            aliases: TypeAliasStore::new(),
            units: Vec::new(),
        }
    }

    /// Merge a per-frontend context into this one. Node ids, scope ids and
    /// all intra-node references are remapped; the other context's global
    /// scope is unified with ours.
    pub fn absorb(&mut self, other: Cpg) -> HashMap<NodeId, NodeId> {
        let mut node_map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut old_ids: Vec<NodeId> = other.graph.node_ids();
        old_ids.sort();
        for old in &old_ids {
            let node = other
                .graph
                .node(*old)
                .expect("listed node exists")
                .clone();
            let new = self.graph.add_node(node);
            node_map.insert(*old, new);
        }
        let map = |id: NodeId| *node_map.get(&id).unwrap_or(&id);

        for old in &old_ids {
            if let Some(node) = self.graph.node_mut(map(*old)) {
                node.remap_ids(&map);
            }
        }
        for (source, target, edge) in other.graph.edge_references() {
            self.graph
                .add_edge(map(source), edge.label, map(target), edge.properties);
        }

        let scope_map = self.scopes.absorb(other.scopes, &map);
        for old in &old_ids {
            if let Some(node) = self.graph.node_mut(map(*old)) {
                if let Some(scope) = node.scope {
                    node.scope = Some(*scope_map.get(&scope).unwrap_or(&ScopeId(0)));
                }
            }
        }

        self.aliases.absorb(other.aliases, &map);
        self.units.extend(other.units.iter().map(|u| map(*u)));
        tracing::debug!(
            nodes = old_ids.len(),
            total = self.graph.node_count(),
            "absorbed translation context"
        );
        node_map
    }

    /// All nodes reachable from the translation units via AST edges.
    pub fn ast_reachable(&self) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        for unit in &self.units {
            for node in self.graph.ast_descendants(*unit) {
                if seen.insert(node) {
                    order.push(node);
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Declaration, Expression, NodeData};

    fn variable(name: &str) -> Node {
        Node::declaration(name, Declaration::Variable)
    }

    #[test]
    fn identity_is_by_allocation() {
        let mut graph = CpgGraph::new();
        let a = graph.add_node(Node::expression(
            "1",
            Expression::Literal {
                value: crate::model::LiteralValue::Int(1),
            },
        ));
        let b = graph.add_node(Node::expression(
            "1",
            Expression::Literal {
                value: crate::model::LiteralValue::Int(1),
            },
        ));
        assert_ne!(a, b);
        assert_eq!(graph.node(a).unwrap().data, graph.node(b).unwrap().data);
    }

    #[test]
    fn ordered_children() {
        let mut graph = CpgGraph::new();
        let unit = graph.add_node(Node::declaration("tu", Declaration::TranslationUnit));
        let first = graph.add_node(variable("a"));
        let second = graph.add_node(variable("b"));
        let third = graph.add_node(variable("c"));
        graph.add_ast_child(unit, EdgeLabel::Declarations, first);
        graph.add_ast_child(unit, EdgeLabel::Declarations, second);
        graph.add_ast_child(unit, EdgeLabel::Declarations, third);
        assert_eq!(
            graph.targets(unit, EdgeLabel::Declarations),
            vec![first, second, third]
        );
    }

    #[test]
    fn disconnect_keeps_node_alive() {
        let mut graph = CpgGraph::new();
        let unit = graph.add_node(Node::declaration("tu", Declaration::TranslationUnit));
        let var = graph.add_node(variable("x"));
        graph.add_ast_child(unit, EdgeLabel::Declarations, var);
        graph.disconnect_from_graph(var);
        assert!(graph.targets(unit, EdgeLabel::Declarations).is_empty());
        assert_eq!(graph.node(var).unwrap().name, "x");
    }

    #[test]
    fn reparenting_moves_edges() {
        let mut graph = CpgGraph::new();
        let unit = graph.add_node(Node::declaration("tu", Declaration::TranslationUnit));
        let func = graph.add_node(Node::declaration(
            "f",
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        let param = graph.add_node(Node::declaration(
            "p",
            Declaration::Parameter { is_variadic: false },
        ));
        graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        graph.add_ast_child(func, EdgeLabel::Parameters, param);

        let method = graph.add_node(Node::declaration(
            "f",
            Declaration::Method {
                record: None,
                is_static: false,
                is_variadic: false,
            },
        ));
        graph.transfer_outgoing_edges(func, method);
        graph.disconnect_from_graph(func);

        assert_eq!(graph.targets(method, EdgeLabel::Parameters), vec![param]);
        assert!(graph.out_edges(func).is_empty());
        assert!(graph.node(func).is_some());
    }

    #[test]
    fn absorb_remaps_ids_and_scopes() {
        let mut shared = Cpg::new("::");
        // Occupy a few ids so the maps actually shift.
        shared
            .graph
            .add_node(Node::declaration("existing", Declaration::Variable));

        let mut ctx = Cpg::new("::");
        let unit = ctx
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        let var = ctx.graph.add_node(variable("x"));
        ctx.graph.add_ast_child(unit, EdgeLabel::Declarations, var);
        ctx.scopes.add_declaration(&mut ctx.graph, var);
        ctx.units.push(unit);

        let map = shared.absorb(ctx);
        let new_unit = map[&unit];
        let new_var = map[&var];
        assert_eq!(shared.units, vec![new_unit]);
        assert_eq!(
            shared.graph.targets(new_unit, EdgeLabel::Declarations),
            vec![new_var]
        );
        let node = shared.graph.node(new_var).unwrap();
        assert_eq!(node.id, new_var);
        let scope = node.scope.expect("scope survives the merge");
        assert!(
            shared
                .scopes
                .resolve(&shared.graph, "x", scope, |n| n.is_value_declaration())
                .contains(&new_var)
        );
    }

    #[test]
    fn ast_reachability() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        let func = cpg.graph.add_node(Node::declaration(
            "f",
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        let orphan = cpg.graph.add_node(variable("dangling"));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        cpg.units.push(unit);

        let reachable = cpg.ast_reachable();
        assert!(reachable.contains(&unit));
        assert!(reachable.contains(&func));
        assert!(!reachable.contains(&orphan));
        assert!(
            cpg.graph
                .node(func)
                .unwrap()
                .data
                .eq(&NodeData::Declaration(Declaration::Function {
                    is_definition: true,
                    is_variadic: false,
                }))
        );
    }
}
