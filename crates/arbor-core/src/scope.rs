//! Lexical scope tree, symbol tables and name resolution
//!
//! Scopes form a tree rooted at the global scope. During parsing a frontend
//! drives the stack with `enter_scope`/`leave_scope`; declarations register
//! into the innermost scope their kind permits. Resolution walks from a
//! scope outward to global, inner scopes shadowing outer ones.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::CpgGraph;
use crate::model::{Declaration, Node, NodeData, NodeId};

/// Stable identifier of a scope (index into the scope arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ScopeId(pub u32);

pub const GLOBAL_SCOPE: ScopeId = ScopeId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Global,
    Namespace,
    Record,
    Function,
    Block,
    TryCatch,
    Loop,
}

/// A lexical container holding declarations.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// The AST node that opened this scope, if any.
    pub ast_node: Option<NodeId>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Simple name for Namespace and Record scopes.
    pub name: Option<String>,
    /// Declarations in registration order.
    pub declarations: Vec<NodeId>,
    /// Simple name to declarations, in registration order; the most recently
    /// added declaration wins for same-name lookups.
    pub symbols: HashMap<String, Vec<NodeId>>,
}

#[derive(Debug, Error)]
pub enum ScopeError {
    /// Enter/leave mismatch. Indicates a frontend bug; the build aborts.
    #[error("scope imbalance: tried to leave {expected}, active stack is [{stack}]")]
    Imbalance { expected: String, stack: String },
}

/// Scope stack plus declaration-to-scope mapping for one translation
/// context (merged into the shared one when units are collected).
#[derive(Debug)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
    decl_scope: HashMap<NodeId, ScopeId>,
    delimiter: String,
}

impl ScopeManager {
    pub fn new(delimiter: impl Into<String>) -> Self {
        let global = Scope {
            id: GLOBAL_SCOPE,
            kind: ScopeKind::Global,
            ast_node: None,
            parent: None,
            children: Vec::new(),
            name: None,
            declarations: Vec::new(),
            symbols: HashMap::new(),
        };
        ScopeManager {
            scopes: vec![global],
            stack: vec![GLOBAL_SCOPE],
            decl_scope: HashMap::new(),
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn current_scope(&self) -> ScopeId {
        *self.stack.last().expect("global scope never leaves the stack")
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Push a new scope for `ast_node` and link it to its parent.
    pub fn enter_scope(
        &mut self,
        kind: ScopeKind,
        ast_node: Option<NodeId>,
        name: Option<String>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let parent = self.current_scope();
        self.scopes.push(Scope {
            id,
            kind,
            ast_node,
            parent: Some(parent),
            children: Vec::new(),
            name,
            declarations: Vec::new(),
            symbols: HashMap::new(),
        });
        self.scope_mut(parent).children.push(id);
        self.stack.push(id);
        id
    }

    /// Pop the top scope, which must belong to `ast_node`.
    pub fn leave_scope(&mut self, ast_node: Option<NodeId>) -> Result<ScopeId, ScopeError> {
        let top = self.current_scope();
        if top == GLOBAL_SCOPE || self.scope(top).ast_node != ast_node {
            return Err(ScopeError::Imbalance {
                expected: format!("{:?}", ast_node),
                stack: self.render_stack(),
            });
        }
        self.stack.pop();
        Ok(top)
    }

    fn render_stack(&self) -> String {
        self.stack
            .iter()
            .map(|id| {
                let s = self.scope(*id);
                match &s.name {
                    Some(name) => format!("{:?}({})", s.kind, name),
                    None => format!("{:?}", s.kind),
                }
            })
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Register `decl` in the innermost scope its kind permits and record
    /// the declaration's defining scope on the node.
    pub fn add_declaration(&mut self, graph: &mut CpgGraph, decl: NodeId) {
        let target = self.target_scope_for(graph.node(decl));
        let name = graph
            .node(decl)
            .map(|n| n.name.clone())
            .unwrap_or_default();
        let scope = self.scope_mut(target);
        scope.declarations.push(decl);
        if !name.is_empty() {
            scope.symbols.entry(name).or_default().push(decl);
        }
        self.decl_scope.insert(decl, target);
        if let Some(node) = graph.node_mut(decl) {
            node.scope = Some(target);
        }
    }

    fn target_scope_for(&self, node: Option<&Node>) -> ScopeId {
        let Some(node) = node else {
            return self.current_scope();
        };
        let NodeData::Declaration(decl) = &node.data else {
            return self.current_scope();
        };
        let wanted: &[ScopeKind] = match decl {
            Declaration::Field => &[ScopeKind::Record],
            Declaration::Parameter { .. } => &[ScopeKind::Function],
            Declaration::Variable => &[
                ScopeKind::Block,
                ScopeKind::Loop,
                ScopeKind::TryCatch,
                ScopeKind::Function,
                ScopeKind::Namespace,
                ScopeKind::Global,
            ],
            Declaration::Function { .. }
            | Declaration::Record { .. }
            | Declaration::Enum
            | Declaration::Typedef { .. }
            | Declaration::Namespace => &[
                ScopeKind::Namespace,
                ScopeKind::Record,
                ScopeKind::Global,
            ],
            _ => return self.current_scope(),
        };
        for id in self.stack.iter().rev() {
            if wanted.contains(&self.scope(*id).kind) {
                return *id;
            }
        }
        self.current_scope()
    }

    /// The defining scope of a declaration.
    pub fn scope_of(&self, decl: NodeId) -> Option<ScopeId> {
        self.decl_scope.get(&decl).copied()
    }

    /// Drop a declaration's registration. Used when reparenting retires a
    /// node in favor of a promoted replacement.
    pub fn remove_declaration(&mut self, decl: NodeId) {
        if let Some(scope_id) = self.decl_scope.remove(&decl) {
            let scope = self.scope_mut(scope_id);
            scope.declarations.retain(|d| *d != decl);
            for declarations in scope.symbols.values_mut() {
                declarations.retain(|d| *d != decl);
            }
            scope.symbols.retain(|_, declarations| !declarations.is_empty());
        }
    }

    /// Walk from `from` outward to global, returning all declarations named
    /// `name` that satisfy `filter` in the innermost scope that has any.
    /// Qualified names first locate the Namespace/Record chain, then search
    /// within it.
    pub fn resolve(
        &self,
        graph: &CpgGraph,
        name: &str,
        from: ScopeId,
        filter: impl Fn(&Node) -> bool,
    ) -> Vec<NodeId> {
        if !self.delimiter.is_empty() && name.contains(self.delimiter.as_str()) {
            return self.resolve_qualified(graph, name, from, filter);
        }
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(candidates) = scope.symbols.get(name) {
                let matching: Vec<NodeId> = candidates
                    .iter()
                    .copied()
                    .filter(|c| graph.node(*c).is_some_and(&filter))
                    .collect();
                if !matching.is_empty() {
                    return matching;
                }
            }
            current = scope.parent;
        }
        Vec::new()
    }

    fn resolve_qualified(
        &self,
        graph: &CpgGraph,
        name: &str,
        from: ScopeId,
        filter: impl Fn(&Node) -> bool,
    ) -> Vec<NodeId> {
        let mut segments: Vec<&str> = name.split(self.delimiter.as_str()).collect();
        let Some(simple) = segments.pop() else {
            return Vec::new();
        };
        let segments: Vec<&str> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return self.resolve(graph, simple, from, filter);
        }

        // Locate the container scope for the first segment anywhere on the
        // chain from `from` to global.
        let mut container = None;
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(child) = self.named_child_scope(id, segments[0]) {
                container = Some(child);
                break;
            }
            // A namespace or record scope may itself be the first segment.
            if self.scope(id).name.as_deref() == Some(segments[0]) {
                container = Some(id);
                break;
            }
            current = self.scope(id).parent;
        }
        let Some(mut container) = container else {
            return Vec::new();
        };
        for segment in &segments[1..] {
            match self.named_child_scope(container, segment) {
                Some(child) => container = child,
                None => return Vec::new(),
            }
        }
        self.scope(container)
            .symbols
            .get(simple)
            .map(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|c| graph.node(*c).is_some_and(&filter))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn named_child_scope(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        self.scope(parent)
            .children
            .iter()
            .copied()
            .find(|c| {
                let scope = self.scope(*c);
                matches!(scope.kind, ScopeKind::Namespace | ScopeKind::Record)
                    && scope.name.as_deref() == Some(name)
            })
    }

    /// Find the record or namespace scope with the given (possibly
    /// qualified) name, starting from the global scope.
    pub fn find_container_scope(&self, qualified: &str) -> Option<ScopeId> {
        let mut container = GLOBAL_SCOPE;
        for segment in qualified
            .split(self.delimiter.as_str())
            .filter(|s| !s.is_empty())
        {
            container = self.named_child_scope(container, segment)?;
        }
        if container == GLOBAL_SCOPE {
            None
        } else {
            Some(container)
        }
    }

    /// Concatenation of the enclosing Namespace/Record names, outermost
    /// first, joined with the frontend's delimiter. Empty at global scope.
    pub fn current_name_prefix(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for id in &self.stack {
            let scope = self.scope(*id);
            if matches!(scope.kind, ScopeKind::Namespace | ScopeKind::Record) {
                if let Some(name) = &scope.name {
                    parts.push(name);
                }
            }
        }
        parts.join(self.delimiter.as_str())
    }

    /// Qualify `name` with the current prefix.
    pub fn qualified_name(&self, name: &str) -> String {
        let prefix = self.current_name_prefix();
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", prefix, self.delimiter, name)
        }
    }

    /// Whether `ancestor` is on the parent chain of `scope` (or equal).
    pub fn is_ancestor(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }

    /// Whether every scope's parent chain terminates at the global scope.
    pub fn is_tree(&self) -> bool {
        self.scopes
            .iter()
            .all(|s| self.is_ancestor(GLOBAL_SCOPE, s.id))
    }

    /// Merge another manager into this one: the other global scope is
    /// unified with ours, all other scopes are appended with fresh ids.
    /// `node_map` rewrites the node ids the scopes refer to. Returns the
    /// scope id mapping.
    pub(crate) fn absorb(
        &mut self,
        other: ScopeManager,
        node_map: &impl Fn(NodeId) -> NodeId,
    ) -> HashMap<ScopeId, ScopeId> {
        let offset = self.scopes.len() as u32;
        let mut scope_map: HashMap<ScopeId, ScopeId> = HashMap::new();
        scope_map.insert(GLOBAL_SCOPE, GLOBAL_SCOPE);
        for scope in other.scopes.iter().skip(1) {
            scope_map.insert(scope.id, ScopeId(offset + scope.id.0 - 1));
        }
        let remap = |id: ScopeId| scope_map[&id];

        for scope in other.scopes.into_iter() {
            if scope.id == GLOBAL_SCOPE {
                let global = self.scope_mut(GLOBAL_SCOPE);
                global
                    .children
                    .extend(scope.children.iter().map(|c| remap(*c)));
                global
                    .declarations
                    .extend(scope.declarations.iter().map(|d| node_map(*d)));
                for (name, decls) in scope.symbols {
                    global
                        .symbols
                        .entry(name)
                        .or_default()
                        .extend(decls.iter().map(|d| node_map(*d)));
                }
                continue;
            }
            self.scopes.push(Scope {
                id: remap(scope.id),
                kind: scope.kind,
                ast_node: scope.ast_node.map(node_map),
                parent: scope.parent.map(remap),
                children: scope.children.iter().map(|c| remap(*c)).collect(),
                name: scope.name,
                declarations: scope.declarations.iter().map(|d| node_map(*d)).collect(),
                symbols: scope
                    .symbols
                    .into_iter()
                    .map(|(name, decls)| (name, decls.iter().map(|d| node_map(*d)).collect()))
                    .collect(),
            });
        }
        for (decl, scope) in other.decl_scope {
            self.decl_scope.insert(node_map(decl), remap(scope));
        }
        scope_map
    }
}
