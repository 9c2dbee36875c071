//! Fix-point resolution of object types against known records
//!
//! Each iteration re-resolves typedef aliases, links `Object` types to the
//! record declarations they name, and materializes SuperRecord edges from
//! the superclass names parsed by the frontends. The pass iterates until an
//! iteration changes nothing or the cap is reached.

use std::collections::HashMap;

use arbor_core::{Cpg, Declaration, EdgeLabel, EdgeProperties, NodeData, NodeId, types};

use crate::{FIXPOINT_CAP, Pass, PassError};

pub struct TypeResolver;

impl Pass for TypeResolver {
    fn name(&self) -> &'static str {
        "TypeResolver"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        for iteration in 0..=FIXPOINT_CAP {
            if iteration == FIXPOINT_CAP {
                tracing::warn!(
                    cap = FIXPOINT_CAP,
                    "type resolution did not reach a fixed point, keeping partial result"
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

/// One resolution sweep; returns the number of changes made.
fn resolve_once(cpg: &mut Cpg) -> usize {
    let reachable = cpg.ast_reachable();

    // Records by simple and qualified name. A definition wins over a
    // forward declaration of the same name.
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

    for id in &reachable {
        let Some(node) = cpg.graph.node(*id) else {
            continue;
        };
        let root = node.ty.root_name().map(str::to_owned);
        let needs_alias = node.ty.root_record().is_none();

        if let Some(node) = cpg.graph.node_mut(*id) {
            if needs_alias && types::refresh(&mut node.ty, &cpg.aliases) {
                changes += 1;
            }
        }

        let root = cpg
            .graph
            .node(*id)
            .and_then(|n| n.ty.root_name().map(str::to_owned))
            .or(root);
        if let Some(root) = root {
            if let Some(record) = records.get(&root).copied() {
                if let Some(node) = cpg.graph.node_mut(*id) {
                    if node.ty.link_record(&root, record) {
                        changes += 1;
                    }
                }
            }
        }
    }

    // Superclass names -> SuperRecord edges.
    let mut super_edges: Vec<(NodeId, NodeId)> = Vec::new();
    for id in &reachable {
        let Some(node) = cpg.graph.node(*id) else {
            continue;
        };
        if let NodeData::Declaration(Declaration::Record {
            superclass_names, ..
        }) = &node.data
        {
            for name in superclass_names {
                if let Some(parent) = records.get(name).copied() {
                    if parent != *id && !cpg.graph.has_edge(*id, parent, EdgeLabel::SuperRecord) {
                        super_edges.push((*id, parent));
                    }
                }
            }
        }
    }
    for (child, parent) in super_edges {
        cpg.graph
            .add_edge(child, EdgeLabel::SuperRecord, parent, EdgeProperties::default());
        changes += 1;
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{Node, RecordKind, Type};

    #[test]
    fn links_object_types_and_superclasses() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.cpp", Declaration::TranslationUnit));
        let base = cpg.graph.add_node(Node::declaration(
            "Base",
            Declaration::Record {
                kind: RecordKind::Class,
                superclass_names: vec![],
            },
        ));
        let derived = cpg.graph.add_node(Node::declaration(
            "Derived",
            Declaration::Record {
                kind: RecordKind::Class,
                superclass_names: vec!["Base".into()],
            },
        ));
        let mut var = Node::declaration("d", Declaration::Variable);
        var.ty = Type::object("Derived");
        let var = cpg.graph.add_node(var);
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, base);
        cpg.graph
            .add_ast_child(unit, EdgeLabel::Declarations, derived);
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, var);
        cpg.units.push(unit);

        TypeResolver.run(&mut cpg).unwrap();

        assert_eq!(cpg.graph.node(var).unwrap().ty.root_record(), Some(derived));
        assert!(cpg.graph.has_edge(derived, base, EdgeLabel::SuperRecord));

        // Idempotent: a second run adds nothing.
        let edges = cpg.graph.edge_count();
        TypeResolver.run(&mut cpg).unwrap();
        assert_eq!(cpg.graph.edge_count(), edges);
    }

    #[test]
    fn resolves_aliases_registered_late() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        let mut var = Node::declaration("n", Declaration::Variable);
        var.ty = Type::object("count_t");
        let var = cpg.graph.add_node(var);
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, var);
        cpg.units.push(unit);
        cpg.aliases.register("count_t", Type::object("unsigned long"));

        TypeResolver.run(&mut cpg).unwrap();
        assert_eq!(
            cpg.graph.node(var).unwrap().ty.root_name(),
            Some("unsigned long")
        );
    }
}
