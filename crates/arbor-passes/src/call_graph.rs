//! Optional transitive closure over resolved calls
//!
//! Direct Calls edges are derived from the Invokes sets of the calls inside
//! each function body, then closed transitively. Not part of the standard
//! pipeline; opt in by pushing it after the call resolver.

use arbor_core::{Cpg, EdgeLabel, EdgeProperties, NodeId};

use crate::{Pass, PassError};

pub struct CallGraphClosure;

impl Pass for CallGraphClosure {
    fn name(&self) -> &'static str {
        "CallGraphClosure"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        let reachable = cpg.ast_reachable();
        let functions: Vec<NodeId> = reachable
            .iter()
            .copied()
            .filter(|id| cpg.graph.node(*id).is_some_and(|n| n.is_function_like()))
            .collect();

        // Direct edges from the invokes sets.
        let mut direct: Vec<(NodeId, NodeId)> = Vec::new();
        for function in &functions {
            let Some(body) = cpg.graph.target(*function, EdgeLabel::Body) else {
                continue;
            };
            for node in cpg.graph.ast_descendants(body) {
                for callee in cpg.graph.targets(node, EdgeLabel::Invokes) {
                    direct.push((*function, callee));
                }
            }
        }
        for (caller, callee) in direct {
            if !cpg.graph.has_edge(caller, callee, EdgeLabel::Calls) {
                cpg.graph
                    .add_edge(caller, EdgeLabel::Calls, callee, EdgeProperties::default());
            }
        }

        // Transitive closure.
        loop {
            let mut added = 0;
            for function in &functions {
                let callees = cpg.graph.targets(*function, EdgeLabel::Calls);
                for callee in &callees {
                    for transitive in cpg.graph.targets(*callee, EdgeLabel::Calls) {
                        if !cpg.graph.has_edge(*function, transitive, EdgeLabel::Calls) {
                            cpg.graph.add_edge(
                                *function,
                                EdgeLabel::Calls,
                                transitive,
                                EdgeProperties::default(),
                            );
                            added += 1;
                        }
                    }
                }
            }
            if added == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{Declaration, Expression, Node, Statement};

    fn function_calling(cpg: &mut Cpg, unit: NodeId, name: &str, callee: &str) -> NodeId {
        let func = cpg.graph.add_node(Node::declaration(
            name,
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        let body = cpg.graph.add_node(Node::statement(Statement::Block));
        cpg.graph.add_ast_child(func, EdgeLabel::Body, body);
        let call = cpg.graph.add_node(Node::expression(
            callee,
            Expression::Call {
                callee_name: callee.into(),
            },
        ));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, call);
        func
    }

    #[test]
    fn closure_is_transitive() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let a = function_calling(&mut cpg, unit, "a", "b");
        let b = function_calling(&mut cpg, unit, "b", "c");
        let c = function_calling(&mut cpg, unit, "c", "missing");

        crate::CallResolver.run(&mut cpg).unwrap();
        CallGraphClosure.run(&mut cpg).unwrap();

        assert!(cpg.graph.has_edge(a, b, EdgeLabel::Calls));
        assert!(cpg.graph.has_edge(b, c, EdgeLabel::Calls));
        assert!(cpg.graph.has_edge(a, c, EdgeLabel::Calls));
    }
}
