//! Resolution of declared references and member accesses
//!
//! References inside function bodies resolve against the local scope chain
//! first, then the enclosing record's members (for methods, including
//! accesses through `this`), then the enclosing namespace, then global.
//! Member expressions resolve the base's type to a record and look the
//! member up among its fields and inherited fields. The pass iterates to a
//! fixed point because chained member accesses need the base reference's
//! type from the previous sweep.

use std::collections::HashMap;

use arbor_core::{Cpg, Declaration, EdgeLabel, EdgeProperties, Node, NodeData, NodeId};

use crate::{FIXPOINT_CAP, Pass, PassError};

pub struct VariableUsageResolver;

impl Pass for VariableUsageResolver {
    fn name(&self) -> &'static str {
        "VariableUsageResolver"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        for iteration in 0..=FIXPOINT_CAP {
            if iteration == FIXPOINT_CAP {
                tracing::warn!(
                    cap = FIXPOINT_CAP,
                    "usage resolution did not reach a fixed point, keeping partial result"
                );
                break;
            }
            if resolve_once(cpg) == 0 {
                break;
            }
        }
        Ok(())
    }
}

fn record_of(node: &Node) -> Option<NodeId> {
    match &node.data {
        NodeData::Declaration(Declaration::Method { record, .. })
        | NodeData::Declaration(Declaration::Constructor { record }) => *record,
        _ => None,
    }
}

/// Fields of a record including inherited ones, own fields first.
pub(crate) fn fields_with_inherited(cpg: &Cpg, record: NodeId) -> Vec<NodeId> {
    let mut fields = Vec::new();
    let mut visited = vec![record];
    let mut frontier = vec![record];
    while let Some(current) = frontier.pop() {
        fields.extend(cpg.graph.targets(current, EdgeLabel::Fields));
        for parent in cpg.graph.targets(current, EdgeLabel::SuperRecord) {
            if !visited.contains(&parent) {
                visited.push(parent);
                frontier.push(parent);
            }
        }
    }
    fields
}

fn resolve_once(cpg: &mut Cpg) -> usize {
    let reachable = cpg.ast_reachable();

    // Definitions win over forward declarations, as in the type resolver.
    let mut records: HashMap<String, NodeId> = HashMap::new();
    for id in &reachable {
        if let Some(node) = cpg.graph.node(*id) {
            if matches!(node.data, NodeData::Declaration(Declaration::Record { .. })) {
                for key in [node.name.clone(), node.qualified_name.clone()] {
                    match records.get(&key) {
                        Some(existing)
                            if !cpg.graph.ast_children(*existing).is_empty()
                                || cpg.graph.ast_children(*id).is_empty() => {}
                        _ => {
                            records.insert(key, *id);
                        }
                    }
                }
            }
        }
    }

    let mut changes = 0;
    for function in reachable {
        let Some(node) = cpg.graph.node(function) else {
            continue;
        };
        if !node.is_function_like() {
            continue;
        }
        let record = record_of(node);
        let Some(body) = cpg.graph.target(function, EdgeLabel::Body) else {
            continue;
        };
        for id in cpg.graph.ast_descendants(body) {
            let kind = cpg.graph.node(id).map(|n| n.kind());
            match kind {
                Some(arbor_core::NodeKind::DeclaredReference) => {
                    changes += resolve_reference(cpg, id, function, record);
                }
                Some(arbor_core::NodeKind::Member) => {
                    changes += resolve_member(cpg, id, record, &records);
                }
                _ => {}
            }
        }
    }
    changes
}

fn resolve_reference(cpg: &mut Cpg, reference: NodeId, function: NodeId, record: Option<NodeId>) -> usize {
    if !cpg.graph.targets(reference, EdgeLabel::RefersTo).is_empty() {
        return 0;
    }
    let Some(node) = cpg.graph.node(reference) else {
        return 0;
    };
    let name = node.name.clone();
    let scope = node.scope.or_else(|| {
        cpg.graph
            .node(function)
            .and_then(|f| f.scope)
    });

    // `this` has no declaration; it carries the record's type instead.
    if name == "this" {
        if let Some(record) = record {
            let record_name = cpg
                .graph
                .node(record)
                .map(|r| r.name.clone())
                .unwrap_or_default();
            if let Some(node) = cpg.graph.node_mut(reference) {
                if node.ty.root_record().is_none() {
                    let mut ty = arbor_core::Type::object(record_name.clone());
                    ty.link_record(&record_name, record);
                    node.ty = ty;
                    return 1;
                }
            }
        }
        return 0;
    }

    // (a) local scope chain, which continues through namespace to global.
    let target = scope.and_then(|scope| {
        cpg.scopes
            .resolve(&cpg.graph, &name, scope, |n| n.is_value_declaration())
            .last()
            .copied()
    });

    // (b) enclosing record members, for methods.
    let target = target.or_else(|| {
        record.and_then(|record| {
            fields_with_inherited(cpg, record)
                .into_iter()
                .find(|f| cpg.graph.node(*f).is_some_and(|n| n.name == name))
        })
    });

    // (c) the enclosing namespace as merged across units.
    let target = target.or_else(|| {
        let mut current = cpg.graph.ast_parent(function);
        while let Some(ancestor) = current {
            let Some(node) = cpg.graph.node(ancestor) else {
                break;
            };
            if matches!(node.data, NodeData::Declaration(Declaration::Namespace)) {
                return cpg
                    .graph
                    .targets(ancestor, EdgeLabel::Declarations)
                    .into_iter()
                    .find(|d| {
                        cpg.graph
                            .node(*d)
                            .is_some_and(|n| n.is_value_declaration() && n.name == name)
                    });
            }
            current = cpg.graph.ast_parent(ancestor);
        }
        None
    });

    match target {
        Some(decl) => {
            cpg.graph
                .add_edge(reference, EdgeLabel::RefersTo, decl, EdgeProperties::default());
            let ty = cpg.graph.node(decl).map(|d| d.ty.clone());
            if let (Some(ty), Some(node)) = (ty, cpg.graph.node_mut(reference)) {
                if node.ty.is_unknown() {
                    node.ty = ty;
                }
            }
            1
        }
        None => {
            if let Some(node) = cpg.graph.node_mut(reference) {
                if !node.unresolved {
                    node.unresolved = true;
                    tracing::debug!(name = %name, "reference did not resolve");
                }
            }
            0
        }
    }
}

fn resolve_member(
    cpg: &mut Cpg,
    member: NodeId,
    enclosing_record: Option<NodeId>,
    records: &HashMap<String, NodeId>,
) -> usize {
    if !cpg.graph.targets(member, EdgeLabel::RefersTo).is_empty() {
        return 0;
    }
    let Some(base) = cpg.graph.target(member, EdgeLabel::Base) else {
        return 0;
    };
    let base_node = cpg.graph.node(base);
    let base_record = match base_node {
        Some(node) if node.name == "this" => enclosing_record,
        Some(node) => node
            .ty
            .root_record()
            .or_else(|| node.ty.root_name().and_then(|n| records.get(n).copied())),
        None => None,
    };
    let name = cpg
        .graph
        .node(member)
        .map(|n| n.name.clone())
        .unwrap_or_default();

    let field = base_record.and_then(|record| {
        fields_with_inherited(cpg, record)
            .into_iter()
            .find(|f| cpg.graph.node(*f).is_some_and(|n| n.name == name))
    });

    match field {
        Some(field) => {
            cpg.graph
                .add_edge(member, EdgeLabel::RefersTo, field, EdgeProperties::default());
            let ty = cpg.graph.node(field).map(|f| f.ty.clone());
            if let (Some(ty), Some(node)) = (ty, cpg.graph.node_mut(member)) {
                if node.ty.is_unknown() {
                    node.ty = ty;
                }
            }
            1
        }
        None => {
            if let Some(node) = cpg.graph.node_mut(member) {
                if !node.unresolved && base_record.is_some() {
                    node.unresolved = true;
                }
            }
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{Expression, RecordKind, ScopeKind, Statement, Type};

    /// Builds `int x; int f() { int x = 1; return x; }` by hand.
    #[test]
    fn shadowing_resolves_to_local() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);

        let global_x = cpg
            .graph
            .add_node(Node::declaration("x", Declaration::Variable));
        cpg.graph
            .add_ast_child(unit, EdgeLabel::Declarations, global_x);
        cpg.scopes.add_declaration(&mut cpg.graph, global_x);

        let func = cpg.graph.add_node(Node::declaration(
            "f",
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        cpg.scopes.add_declaration(&mut cpg.graph, func);
        cpg.scopes
            .enter_scope(ScopeKind::Function, Some(func), None);

        let body = cpg.graph.add_node(Node::statement(Statement::Block));
        cpg.graph.add_ast_child(func, EdgeLabel::Body, body);

        let local_x = cpg
            .graph
            .add_node(Node::declaration("x", Declaration::Variable));
        cpg.scopes.add_declaration(&mut cpg.graph, local_x);
        let decl_stmt = cpg
            .graph
            .add_node(Node::statement(Statement::DeclarationStmt));
        cpg.graph
            .add_ast_child(body, EdgeLabel::Statements, decl_stmt);
        cpg.graph
            .add_ast_child(decl_stmt, EdgeLabel::Declarations, local_x);

        let ret = cpg.graph.add_node(Node::statement(Statement::Return));
        let mut reference = Node::expression("x", Expression::DeclaredReference);
        reference.scope = Some(cpg.scopes.current_scope());
        let reference = cpg.graph.add_node(reference);
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, ret);
        cpg.graph.add_ast_child(ret, EdgeLabel::Value, reference);
        cpg.scopes.leave_scope(Some(func)).unwrap();

        VariableUsageResolver.run(&mut cpg).unwrap();

        assert_eq!(
            cpg.graph.targets(reference, EdgeLabel::RefersTo),
            vec![local_x]
        );
    }

    #[test]
    fn member_resolves_through_base_type() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.cpp", Declaration::TranslationUnit));
        cpg.units.push(unit);

        let record = cpg.graph.add_node(Node::declaration(
            "S",
            Declaration::Record {
                kind: RecordKind::Struct,
                superclass_names: vec![],
            },
        ));
        let field = cpg.graph.add_node(Node::declaration("val", Declaration::Field));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, record);
        cpg.graph.add_ast_child(record, EdgeLabel::Fields, field);

        let func = cpg.graph.add_node(Node::declaration(
            "f",
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        let body = cpg.graph.add_node(Node::statement(Statement::Block));
        cpg.graph.add_ast_child(func, EdgeLabel::Body, body);

        let mut base = Node::expression("s", Expression::DeclaredReference);
        base.ty = Type::object("S");
        base.ty.link_record("S", record);
        let base = cpg.graph.add_node(base);
        let member = cpg.graph.add_node(Node::expression("val", Expression::Member));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, member);
        cpg.graph.add_ast_child(member, EdgeLabel::Base, base);

        VariableUsageResolver.run(&mut cpg).unwrap();
        assert_eq!(cpg.graph.targets(member, EdgeLabel::RefersTo), vec![field]);
    }
}
