//! Cross-unit namespace merging and member attachment
//!
//! Same-named namespaces parsed in different units are merged: the first
//! occurrence becomes canonical and the members of the others are moved
//! under it. Unit-level declarations whose qualified name belongs to a
//! known namespace are attached to it. This pass rewrites AST edges and is
//! therefore not monotonic.

use std::collections::HashMap;

use arbor_core::{Cpg, Declaration, EdgeLabel, NodeData, NodeId};

use crate::{Pass, PassError};

pub struct NamespaceResolver;

impl Pass for NamespaceResolver {
    fn name(&self) -> &'static str {
        "NamespaceResolver"
    }

    fn is_monotonic(&self) -> bool {
        false
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        let reachable = cpg.ast_reachable();

        let mut canonical: HashMap<String, NodeId> = HashMap::new();
        let mut duplicates: Vec<(NodeId, NodeId)> = Vec::new();
        for id in &reachable {
            let Some(node) = cpg.graph.node(*id) else {
                continue;
            };
            if matches!(node.data, NodeData::Declaration(Declaration::Namespace)) {
                match canonical.get(&node.qualified_name) {
                    Some(first) => duplicates.push((*id, *first)),
                    None => {
                        canonical.insert(node.qualified_name.clone(), *id);
                    }
                }
            }
        }

        for (duplicate, target) in duplicates {
            let members = cpg.graph.targets(duplicate, EdgeLabel::Declarations);
            for member in members {
                cpg.graph
                    .remove_edge_between(duplicate, member, EdgeLabel::Declarations);
                cpg.graph
                    .add_ast_child(target, EdgeLabel::Declarations, member);
            }
            tracing::debug!(
                namespace = %cpg.graph.node(target).map(|n| n.qualified_name.as_str()).unwrap_or(""),
                "merged duplicate namespace"
            );
        }

        // Attach unit-level declarations carrying a namespace-qualified
        // name to their home namespace.
        let delimiter = cpg.scopes.delimiter().to_string();
        for unit in cpg.units.clone() {
            for decl in cpg.graph.targets(unit, EdgeLabel::Declarations) {
                let Some(node) = cpg.graph.node(decl) else {
                    continue;
                };
                if !node.is_declaration()
                    || matches!(node.data, NodeData::Declaration(Declaration::Namespace))
                {
                    continue;
                }
                let Some(prefix) = node
                    .qualified_name
                    .rsplit_once(delimiter.as_str())
                    .map(|(prefix, _)| prefix.to_string())
                else {
                    continue;
                };
                if let Some(home) = canonical.get(&prefix).copied() {
                    cpg.graph
                        .remove_edge_between(unit, decl, EdgeLabel::Declarations);
                    cpg.graph.add_ast_child(home, EdgeLabel::Declarations, decl);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Node;

    fn unit_with_namespace(cpg: &mut Cpg, file: &str, member: &str) -> (NodeId, NodeId, NodeId) {
        let unit = cpg
            .graph
            .add_node(Node::declaration(file, Declaration::TranslationUnit));
        let ns = cpg
            .graph
            .add_node(Node::declaration("util", Declaration::Namespace));
        let mut func = Node::declaration(
            member,
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        );
        func.qualified_name = format!("util::{}", member);
        let func = cpg.graph.add_node(func);
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, ns);
        cpg.graph.add_ast_child(ns, EdgeLabel::Declarations, func);
        cpg.units.push(unit);
        (unit, ns, func)
    }

    #[test]
    fn merges_same_named_namespaces() {
        let mut cpg = Cpg::new("::");
        let (_, first_ns, first_fn) = unit_with_namespace(&mut cpg, "a.cpp", "a");
        let (_, second_ns, second_fn) = unit_with_namespace(&mut cpg, "b.cpp", "b");

        NamespaceResolver.run(&mut cpg).unwrap();

        let members = cpg.graph.targets(first_ns, EdgeLabel::Declarations);
        assert!(members.contains(&first_fn));
        assert!(members.contains(&second_fn));
        assert!(cpg.graph.targets(second_ns, EdgeLabel::Declarations).is_empty());

        // Second run changes nothing.
        NamespaceResolver.run(&mut cpg).unwrap();
        assert_eq!(cpg.graph.targets(first_ns, EdgeLabel::Declarations).len(), 2);
    }
}
