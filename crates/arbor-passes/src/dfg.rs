//! Data-flow graph construction over the EOG
//!
//! Classic reaching definitions, per function: definition sites are
//! parameter bindings, variable initializers and assignment targets; the
//! state propagates forward over the EOG until it stabilizes. Every write
//! gets an edge from the written value to the declaration; every read gets
//! an edge from each reaching definition site, so multiple reaching writes
//! produce multiple incoming edges.

use std::collections::{BTreeSet, HashMap, VecDeque};

use arbor_core::{Cpg, Declaration, EdgeLabel, EdgeProperties, Expression, NodeData, NodeId};

use crate::{Pass, PassError};

pub struct DfgPass;

impl Pass for DfgPass {
    fn name(&self) -> &'static str {
        "DfgPass"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        for function in cpg.ast_reachable() {
            let Some(node) = cpg.graph.node(function) else {
                continue;
            };
            if !node.is_function_like() {
                continue;
            }
            if cpg.graph.target(function, EdgeLabel::Body).is_some() {
                build_function_dfg(cpg, function);
            }
        }
        Ok(())
    }
}

/// The definition sites currently reaching a point, per declaration.
type DefState = HashMap<NodeId, BTreeSet<NodeId>>;

fn merge_into(state: &mut DefState, other: &DefState) -> bool {
    let mut changed = false;
    for (decl, sites) in other {
        let entry = state.entry(*decl).or_default();
        for site in sites {
            changed |= entry.insert(*site);
        }
    }
    changed
}

/// Definitions generated at `id`: (declaration, definition site).
fn gen_at(cpg: &Cpg, id: NodeId) -> Vec<(NodeId, NodeId)> {
    let Some(node) = cpg.graph.node(id) else {
        return Vec::new();
    };
    match &node.data {
        // A local declaration defines itself once its initializer ran.
        NodeData::Declaration(
            Declaration::Variable | Declaration::Parameter { .. },
        ) => vec![(id, id)],
        NodeData::Expression(Expression::BinaryOperator { op }) if is_assignment(op) => {
            let Some(lhs) = cpg.graph.target(id, EdgeLabel::Lhs) else {
                return Vec::new();
            };
            cpg.graph
                .targets(lhs, EdgeLabel::RefersTo)
                .into_iter()
                .map(|decl| (decl, id))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn is_assignment(op: &str) -> bool {
    op == "="
        || (op.ends_with('=')
            && !matches!(op, "==" | "!=" | "<=" | ">=")
            && op.len() >= 2)
}

/// Whether `id` is the written target of a plain assignment (and therefore
/// not a read).
fn is_plain_assignment_target(cpg: &Cpg, id: NodeId) -> bool {
    cpg.graph.in_edges(id).iter().any(|(label, _, source)| {
        *label == EdgeLabel::Lhs
            && matches!(
                cpg.graph.node(*source).map(|n| &n.data),
                Some(NodeData::Expression(Expression::BinaryOperator { op })) if op == "="
            )
    })
}

fn build_function_dfg(cpg: &mut Cpg, function: NodeId) {
    // EOG-reachable nodes and their successor lists.
    let mut nodes: Vec<NodeId> = Vec::new();
    let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut queue = VecDeque::from([function]);
    let mut seen = BTreeSet::from([function]);
    while let Some(current) = queue.pop_front() {
        nodes.push(current);
        let next = cpg.graph.targets(current, EdgeLabel::Eog);
        for succ in &next {
            if seen.insert(*succ) {
                queue.push_back(*succ);
            }
        }
        successors.insert(current, next);
    }

    let mut predecessors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (node, succs) in &successors {
        for succ in succs {
            predecessors.entry(*succ).or_default().push(*node);
        }
    }

    // Parameters bind at entry.
    let mut entry_state = DefState::new();
    for param in cpg.graph.targets(function, EdgeLabel::Parameters) {
        entry_state.insert(param, BTreeSet::from([param]));
    }

    let mut in_states: HashMap<NodeId, DefState> = HashMap::new();
    let mut out_states: HashMap<NodeId, DefState> = HashMap::new();
    in_states.insert(function, entry_state);

    let mut worklist: VecDeque<NodeId> = nodes.iter().copied().collect();
    while let Some(current) = worklist.pop_front() {
        let mut incoming = in_states.get(&current).cloned().unwrap_or_default();
        if let Some(preds) = predecessors.get(&current) {
            for pred in preds {
                if let Some(out) = out_states.get(pred) {
                    merge_into(&mut incoming, out);
                }
            }
        }

        let mut outgoing = incoming.clone();
        for (decl, site) in gen_at(cpg, current) {
            outgoing.insert(decl, BTreeSet::from([site]));
        }

        let changed = out_states.get(&current) != Some(&outgoing);
        in_states.insert(current, incoming);
        if changed {
            out_states.insert(current, outgoing);
            for succ in successors.get(&current).cloned().unwrap_or_default() {
                worklist.push_back(succ);
            }
        }
    }

    // Write edges: the written value flows into the declaration.
    let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
    for id in &nodes {
        let Some(node) = cpg.graph.node(*id) else {
            continue;
        };
        match &node.data {
            NodeData::Declaration(Declaration::Variable) => {
                if let Some(init) = cpg.graph.target(*id, EdgeLabel::Initializer) {
                    edges.push((init, *id));
                }
            }
            NodeData::Expression(Expression::BinaryOperator { op }) if is_assignment(op) => {
                if let (Some(lhs), Some(rhs)) = (
                    cpg.graph.target(*id, EdgeLabel::Lhs),
                    cpg.graph.target(*id, EdgeLabel::Rhs),
                ) {
                    for decl in cpg.graph.targets(lhs, EdgeLabel::RefersTo) {
                        edges.push((rhs, decl));
                    }
                }
            }
            _ => {}
        }
    }

    // Read edges: every reaching definition site flows into the reference.
    for id in &nodes {
        let Some(node) = cpg.graph.node(*id) else {
            continue;
        };
        let is_reference = matches!(
            node.data,
            NodeData::Expression(Expression::DeclaredReference | Expression::Member)
        );
        if !is_reference || is_plain_assignment_target(cpg, *id) {
            continue;
        }
        let referred = cpg.graph.targets(*id, EdgeLabel::RefersTo);
        if referred.is_empty() {
            continue;
        }
        if let Some(incoming) = in_states.get(id) {
            for decl in referred {
                if let Some(sites) = incoming.get(&decl) {
                    for site in sites {
                        edges.push((*site, *id));
                    }
                }
            }
        }
    }

    for (from, to) in edges {
        if !cpg.graph.has_edge(from, to, EdgeLabel::Dfg) {
            cpg.graph
                .add_edge(from, EdgeLabel::Dfg, to, EdgeProperties::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EogPass;
    use crate::Pass;
    use arbor_core::{Node, Statement};

    /// int f(int p) { int x = p; x = 1; return x; }
    #[test]
    fn reaching_definitions_flow_to_reads() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let func = cpg.graph.add_node(Node::declaration(
            "f",
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        let param = cpg.graph.add_node(Node::declaration(
            "p",
            Declaration::Parameter { is_variadic: false },
        ));
        cpg.graph.add_ast_child(func, EdgeLabel::Parameters, param);
        let body = cpg.graph.add_node(Node::statement(Statement::Block));
        cpg.graph.add_ast_child(func, EdgeLabel::Body, body);

        // int x = p;
        let decl_stmt = cpg
            .graph
            .add_node(Node::statement(Statement::DeclarationStmt));
        cpg.graph
            .add_ast_child(body, EdgeLabel::Statements, decl_stmt);
        let x = cpg
            .graph
            .add_node(Node::declaration("x", Declaration::Variable));
        cpg.graph
            .add_ast_child(decl_stmt, EdgeLabel::Declarations, x);
        let p_read = cpg
            .graph
            .add_node(Node::expression("p", Expression::DeclaredReference));
        cpg.graph
            .add_edge(p_read, EdgeLabel::RefersTo, param, EdgeProperties::default());
        cpg.graph.add_ast_child(x, EdgeLabel::Initializer, p_read);

        // x = 1;
        let assign = cpg.graph.add_node(Node::expression(
            "=",
            Expression::BinaryOperator { op: "=".into() },
        ));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, assign);
        let x_write = cpg
            .graph
            .add_node(Node::expression("x", Expression::DeclaredReference));
        cpg.graph
            .add_edge(x_write, EdgeLabel::RefersTo, x, EdgeProperties::default());
        let one = cpg.graph.add_node(Node::expression(
            "1",
            Expression::Literal {
                value: arbor_core::LiteralValue::Int(1),
            },
        ));
        cpg.graph.add_ast_child(assign, EdgeLabel::Lhs, x_write);
        cpg.graph.add_ast_child(assign, EdgeLabel::Rhs, one);

        // return x;
        let ret = cpg.graph.add_node(Node::statement(Statement::Return));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, ret);
        let x_read = cpg
            .graph
            .add_node(Node::expression("x", Expression::DeclaredReference));
        cpg.graph
            .add_edge(x_read, EdgeLabel::RefersTo, x, EdgeProperties::default());
        cpg.graph.add_ast_child(ret, EdgeLabel::Value, x_read);

        EogPass.run(&mut cpg).unwrap();
        DfgPass.run(&mut cpg).unwrap();

        // The initializer read sees the parameter binding.
        assert!(cpg.graph.has_edge(param, p_read, EdgeLabel::Dfg));
        // Write edges: p -> x through the initializer, 1 -> x through the
        // assignment.
        assert!(cpg.graph.has_edge(p_read, x, EdgeLabel::Dfg));
        assert!(cpg.graph.has_edge(one, x, EdgeLabel::Dfg));
        // The read after the assignment sees the assignment site only.
        assert!(cpg.graph.has_edge(assign, x_read, EdgeLabel::Dfg));
        assert!(!cpg.graph.has_edge(x, x_read, EdgeLabel::Dfg));
        // The written reference is not a read.
        assert!(!cpg.graph.has_edge(x, x_write, EdgeLabel::Dfg));

        // Idempotent.
        let edges = cpg.graph.edge_count();
        DfgPass.run(&mut cpg).unwrap();
        assert_eq!(cpg.graph.edge_count(), edges);
    }

    /// if (c) x = 1; else x = 2; read(x): two reaching writes.
    #[test]
    fn multiple_reaching_writes() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
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

        let x = cpg
            .graph
            .add_node(Node::declaration("x", Declaration::Variable));
        let decl_stmt = cpg
            .graph
            .add_node(Node::statement(Statement::DeclarationStmt));
        cpg.graph
            .add_ast_child(body, EdgeLabel::Statements, decl_stmt);
        cpg.graph
            .add_ast_child(decl_stmt, EdgeLabel::Declarations, x);

        let if_stmt = cpg.graph.add_node(Node::statement(Statement::If));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, if_stmt);
        let cond = cpg
            .graph
            .add_node(Node::expression("c", Expression::DeclaredReference));
        cpg.graph.add_ast_child(if_stmt, EdgeLabel::Condition, cond);

        let mut branches = Vec::new();
        for (label, value) in [(EdgeLabel::ThenBranch, 1), (EdgeLabel::ElseBranch, 2)] {
            let assign = cpg.graph.add_node(Node::expression(
                "=",
                Expression::BinaryOperator { op: "=".into() },
            ));
            cpg.graph.add_ast_child(if_stmt, label, assign);
            let target = cpg
                .graph
                .add_node(Node::expression("x", Expression::DeclaredReference));
            cpg.graph
                .add_edge(target, EdgeLabel::RefersTo, x, EdgeProperties::default());
            let literal = cpg.graph.add_node(Node::expression(
                value.to_string(),
                Expression::Literal {
                    value: arbor_core::LiteralValue::Int(value),
                },
            ));
            cpg.graph.add_ast_child(assign, EdgeLabel::Lhs, target);
            cpg.graph.add_ast_child(assign, EdgeLabel::Rhs, literal);
            branches.push(assign);
        }

        let read = cpg
            .graph
            .add_node(Node::expression("x", Expression::DeclaredReference));
        cpg.graph
            .add_edge(read, EdgeLabel::RefersTo, x, EdgeProperties::default());
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, read);

        EogPass.run(&mut cpg).unwrap();
        DfgPass.run(&mut cpg).unwrap();

        for assign in branches {
            assert!(cpg.graph.has_edge(assign, read, EdgeLabel::Dfg));
        }
    }
}
