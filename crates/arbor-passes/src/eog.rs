//! Evaluation-order graph construction
//!
//! Intra-procedural: for every function with a body, EOG edges are threaded
//! from the function declaration (the entry) through operand evaluations in
//! left-to-right order, statement sequences, branch splits with recorded
//! branch outcomes, and loop back-edges. Short-circuit operators split the
//! left operand's exits; the join happens at the operator node.

use arbor_core::{Cpg, EdgeLabel, EdgeProperties, Expression, NodeData, NodeId, Statement};

use crate::{Pass, PassError};

pub struct EogPass;

impl Pass for EogPass {
    fn name(&self) -> &'static str {
        "EogPass"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        for function in cpg.ast_reachable() {
            let Some(node) = cpg.graph.node(function) else {
                continue;
            };
            if !node.is_function_like() {
                continue;
            }
            // Already built for this function; keeps the pipeline idempotent.
            if !cpg.graph.targets(function, EdgeLabel::Eog).is_empty() {
                continue;
            }
            let Some(body) = cpg.graph.target(function, EdgeLabel::Body) else {
                continue;
            };
            let mut builder = EogBuilder {
                cpg: &mut *cpg,
                current: vec![(function, None)],
                breaks: Vec::new(),
                continues: Vec::new(),
            };
            builder.handle(body);
        }
        Ok(())
    }
}

type Pending = (NodeId, Option<bool>);

struct EogBuilder<'a> {
    cpg: &'a mut Cpg,
    /// Evaluations whose EOG successor is still open, with the branch
    /// outcome the edge should carry.
    current: Vec<Pending>,
    breaks: Vec<Vec<NodeId>>,
    continues: Vec<Vec<NodeId>>,
}

fn with_branch(preds: &[Pending], outcome: bool) -> Vec<Pending> {
    preds.iter().map(|(n, _)| (*n, Some(outcome))).collect()
}

impl EogBuilder<'_> {
    fn add_eog(&mut self, from: NodeId, to: NodeId, branch: Option<bool>) {
        self.cpg.graph.add_edge(
            from,
            EdgeLabel::Eog,
            to,
            EdgeProperties {
                index: None,
                branch,
            },
        );
    }

    /// Close all open evaluations onto `next` and make `next` the single
    /// open evaluation.
    fn connect(&mut self, next: NodeId) {
        let pending = std::mem::take(&mut self.current);
        for (pred, branch) in pending {
            self.add_eog(pred, next, branch);
        }
        self.current = vec![(next, None)];
    }

    /// Close `preds` onto `target` without touching the open set. Used for
    /// loop back-edges.
    fn connect_back(&mut self, preds: Vec<Pending>, target: NodeId) {
        for (pred, branch) in preds {
            self.add_eog(pred, target, branch);
        }
    }

    fn child(&self, id: NodeId, label: EdgeLabel) -> Option<NodeId> {
        self.cpg.graph.target(id, label)
    }

    fn children(&self, id: NodeId, label: EdgeLabel) -> Vec<NodeId> {
        self.cpg.graph.targets(id, label)
    }

    /// Thread the EOG through `id`. Returns the entry of the evaluation,
    /// i.e. the first node that execution reaches inside this subtree.
    fn handle(&mut self, id: NodeId) -> Option<NodeId> {
        let data = self.cpg.graph.node(id).map(|n| n.data.clone());
        match data {
            Some(NodeData::Statement(stmt)) => self.handle_statement(id, stmt),
            Some(NodeData::Expression(expr)) => self.handle_expression(id, expr),
            Some(NodeData::Declaration(_)) => {
                // Local declarations reached through DeclarationStmt.
                let entry = self
                    .child(id, EdgeLabel::Initializer)
                    .and_then(|init| self.handle(init));
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            None => None,
        }
    }

    fn handle_statement(&mut self, id: NodeId, stmt: Statement) -> Option<NodeId> {
        match stmt {
            Statement::Block => {
                let mut entry = None;
                for child in self.children(id, EdgeLabel::Statements) {
                    let child_entry = self.handle(child);
                    entry = entry.or(child_entry);
                }
                entry
            }
            Statement::DeclarationStmt => {
                let mut entry = None;
                for decl in self.children(id, EdgeLabel::Declarations) {
                    let decl_entry = self.handle(decl);
                    entry = entry.or(decl_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Statement::Return => {
                let entry = self
                    .child(id, EdgeLabel::Value)
                    .and_then(|value| self.handle(value));
                self.connect(id);
                // A return is an EOG sink; nothing executes after it.
                self.current.clear();
                Some(entry.unwrap_or(id))
            }
            Statement::Break => {
                self.connect(id);
                if let Some(frame) = self.breaks.last_mut() {
                    frame.push(id);
                }
                self.current.clear();
                Some(id)
            }
            Statement::Continue => {
                self.connect(id);
                if let Some(frame) = self.continues.last_mut() {
                    frame.push(id);
                }
                self.current.clear();
                Some(id)
            }
            Statement::If => {
                let cond_entry = self
                    .child(id, EdgeLabel::Condition)
                    .and_then(|cond| self.handle(cond));
                self.connect(id);
                let head = self.current.clone();

                self.current = with_branch(&head, true);
                if let Some(then) = self.child(id, EdgeLabel::ThenBranch) {
                    self.handle(then);
                }
                let mut exits = std::mem::take(&mut self.current);

                if let Some(els) = self.child(id, EdgeLabel::ElseBranch) {
                    self.current = with_branch(&head, false);
                    self.handle(els);
                    exits.append(&mut self.current);
                } else {
                    exits.extend(with_branch(&head, false));
                }
                self.current = exits;
                Some(cond_entry.unwrap_or(id))
            }
            Statement::While => {
                let cond = self.child(id, EdgeLabel::Condition);
                let cond_entry = cond.and_then(|c| self.handle(c));
                self.connect(id);
                let head = self.current.clone();
                let back_target = cond_entry.unwrap_or(id);

                self.breaks.push(Vec::new());
                self.continues.push(Vec::new());
                self.current = if cond.is_some() {
                    with_branch(&head, true)
                } else {
                    head.clone()
                };
                if let Some(body) = self.child(id, EdgeLabel::Body) {
                    self.handle(body);
                }
                let mut back = std::mem::take(&mut self.current);
                back.extend(
                    self.continues
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.connect_back(back, back_target);

                let mut exits: Vec<Pending> = if cond.is_some() {
                    with_branch(&head, false)
                } else {
                    Vec::new()
                };
                exits.extend(
                    self.breaks
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.current = exits;
                Some(cond_entry.unwrap_or(id))
            }
            Statement::For => {
                let init_entry = self
                    .child(id, EdgeLabel::Initializer)
                    .and_then(|init| self.handle(init));
                let cond = self.child(id, EdgeLabel::Condition);
                let cond_entry = cond.and_then(|c| self.handle(c));
                self.connect(id);
                let head = self.current.clone();
                let back_target = cond_entry.unwrap_or(id);

                self.breaks.push(Vec::new());
                self.continues.push(Vec::new());
                self.current = if cond.is_some() {
                    with_branch(&head, true)
                } else {
                    head.clone()
                };
                if let Some(body) = self.child(id, EdgeLabel::Body) {
                    self.handle(body);
                }
                let mut before_iteration = std::mem::take(&mut self.current);
                before_iteration.extend(
                    self.continues
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.current = before_iteration;
                if let Some(iteration) = self.child(id, EdgeLabel::Iteration) {
                    self.handle(iteration);
                }
                let back = std::mem::take(&mut self.current);
                self.connect_back(back, back_target);

                let mut exits: Vec<Pending> = if cond.is_some() {
                    with_branch(&head, false)
                } else {
                    Vec::new()
                };
                exits.extend(
                    self.breaks
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.current = exits;
                Some(init_entry.or(cond_entry).unwrap_or(id))
            }
            Statement::ForEach => {
                let iterable_entry = self
                    .child(id, EdgeLabel::Iterable)
                    .and_then(|iterable| self.handle(iterable));
                self.connect(id);
                let head = self.current.clone();

                self.breaks.push(Vec::new());
                self.continues.push(Vec::new());
                self.current = with_branch(&head, true);
                if let Some(variable) = self.child(id, EdgeLabel::Variable) {
                    self.connect(variable);
                }
                if let Some(body) = self.child(id, EdgeLabel::Body) {
                    self.handle(body);
                }
                let mut back = std::mem::take(&mut self.current);
                back.extend(
                    self.continues
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.connect_back(back, id);

                let mut exits = with_branch(&head, false);
                exits.extend(
                    self.breaks
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.current = exits;
                Some(iterable_entry.unwrap_or(id))
            }
            Statement::Switch => {
                let selector_entry = self
                    .child(id, EdgeLabel::Condition)
                    .and_then(|selector| self.handle(selector));
                self.connect(id);
                let head = self.current.clone();

                self.breaks.push(Vec::new());
                self.current = Vec::new();
                let mut has_default = false;
                let body_children = self
                    .child(id, EdgeLabel::Body)
                    .map(|body| self.children(body, EdgeLabel::Statements))
                    .unwrap_or_default();
                for child in body_children {
                    let kind = self.cpg.graph.node(child).map(|n| n.data.clone());
                    match kind {
                        Some(NodeData::Statement(Statement::Case)) => {
                            self.current.extend(head.clone());
                            self.handle(child);
                        }
                        Some(NodeData::Statement(Statement::Default)) => {
                            has_default = true;
                            self.current.extend(head.clone());
                            self.handle(child);
                        }
                        _ => {
                            self.handle(child);
                        }
                    }
                }
                let mut exits = std::mem::take(&mut self.current);
                if !has_default {
                    exits.extend(head);
                }
                exits.extend(
                    self.breaks
                        .pop()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| (n, None)),
                );
                self.current = exits;
                Some(selector_entry.unwrap_or(id))
            }
            Statement::Case | Statement::Default => {
                self.connect(id);
                for child in self.children(id, EdgeLabel::Statements) {
                    self.handle(child);
                }
                Some(id)
            }
            Statement::Try => {
                let entry_preds = self.current.clone();
                let mut exits = Vec::new();
                if let Some(body) = self.child(id, EdgeLabel::Body) {
                    self.handle(body);
                }
                exits.append(&mut self.current);
                // Approximation: a catch handler can be entered from the
                // try block's entry.
                for catch in self.children(id, EdgeLabel::Catches) {
                    self.current = entry_preds.clone();
                    self.connect(catch);
                    if let Some(body) = self.child(catch, EdgeLabel::Body) {
                        self.handle(body);
                    }
                    exits.append(&mut self.current);
                }
                self.current = exits;
                Some(id)
            }
            Statement::Catch => {
                // Reached only when detached from a Try; treat as a block.
                self.connect(id);
                if let Some(body) = self.child(id, EdgeLabel::Body) {
                    self.handle(body);
                }
                Some(id)
            }
            Statement::Unimplemented { .. } => {
                self.connect(id);
                Some(id)
            }
        }
    }

    fn handle_expression(&mut self, id: NodeId, expr: Expression) -> Option<NodeId> {
        match expr {
            Expression::BinaryOperator { op } => match op.as_str() {
                "&&" | "||" | "and" | "or" => {
                    let lhs_entry = self
                        .child(id, EdgeLabel::Lhs)
                        .and_then(|lhs| self.handle(lhs));
                    let head = self.current.clone();
                    let short = op == "&&" || op == "and";
                    self.current = with_branch(&head, short);
                    if let Some(rhs) = self.child(id, EdgeLabel::Rhs) {
                        self.handle(rhs);
                    }
                    let mut preds = std::mem::take(&mut self.current);
                    preds.extend(with_branch(&head, !short));
                    self.current = preds;
                    self.connect(id);
                    Some(lhs_entry.unwrap_or(id))
                }
                "=" => {
                    // The written value evaluates before the target.
                    let rhs_entry = self
                        .child(id, EdgeLabel::Rhs)
                        .and_then(|rhs| self.handle(rhs));
                    if let Some(lhs) = self.child(id, EdgeLabel::Lhs) {
                        self.handle(lhs);
                    }
                    self.connect(id);
                    Some(rhs_entry.unwrap_or(id))
                }
                _ => {
                    let lhs_entry = self
                        .child(id, EdgeLabel::Lhs)
                        .and_then(|lhs| self.handle(lhs));
                    if let Some(rhs) = self.child(id, EdgeLabel::Rhs) {
                        self.handle(rhs);
                    }
                    self.connect(id);
                    Some(lhs_entry.unwrap_or(id))
                }
            },
            Expression::UnaryOperator { .. } => {
                let entry = self
                    .child(id, EdgeLabel::Operand)
                    .and_then(|operand| self.handle(operand));
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Call { .. } => {
                let mut entry = None;
                for argument in self.children(id, EdgeLabel::Arguments) {
                    let argument_entry = self.handle(argument);
                    entry = entry.or(argument_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::MemberCall => {
                let mut entry = self
                    .child(id, EdgeLabel::Base)
                    .and_then(|base| self.handle(base));
                for argument in self.children(id, EdgeLabel::Arguments) {
                    let argument_entry = self.handle(argument);
                    entry = entry.or(argument_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Member => {
                let entry = self
                    .child(id, EdgeLabel::Base)
                    .and_then(|base| self.handle(base));
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::ArraySubscript => {
                let mut entry = self
                    .child(id, EdgeLabel::Base)
                    .and_then(|base| self.handle(base));
                if let Some(index) = self.child(id, EdgeLabel::Index) {
                    let index_entry = self.handle(index);
                    entry = entry.or(index_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Cast => {
                let entry = self
                    .child(id, EdgeLabel::Operand)
                    .and_then(|operand| self.handle(operand));
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Conditional => {
                let cond_entry = self
                    .child(id, EdgeLabel::Condition)
                    .and_then(|cond| self.handle(cond));
                let head = self.current.clone();
                self.current = with_branch(&head, true);
                if let Some(then) = self.child(id, EdgeLabel::ThenBranch) {
                    self.handle(then);
                }
                let mut exits = std::mem::take(&mut self.current);
                self.current = with_branch(&head, false);
                if let Some(els) = self.child(id, EdgeLabel::ElseBranch) {
                    self.handle(els);
                }
                exits.append(&mut self.current);
                self.current = exits;
                self.connect(id);
                Some(cond_entry.unwrap_or(id))
            }
            Expression::InitializerList => {
                let mut entry = None;
                for element in self.children(id, EdgeLabel::Elements) {
                    let element_entry = self.handle(element);
                    entry = entry.or(element_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::New => {
                let entry = self
                    .child(id, EdgeLabel::Initializer)
                    .and_then(|construct| self.handle(construct));
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Construct { .. } => {
                let mut entry = None;
                for argument in self.children(id, EdgeLabel::Arguments) {
                    let argument_entry = self.handle(argument);
                    entry = entry.or(argument_entry);
                }
                self.connect(id);
                Some(entry.unwrap_or(id))
            }
            Expression::Literal { .. }
            | Expression::DeclaredReference
            | Expression::Unimplemented { .. } => {
                self.connect(id);
                Some(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{Declaration, Node};

    fn function_like(cpg: &mut Cpg, name: &str) -> (NodeId, NodeId) {
        let func = cpg.graph.add_node(Node::declaration(
            name,
            Declaration::Function {
                is_definition: true,
                is_variadic: false,
            },
        ));
        let body = cpg.graph.add_node(Node::statement(Statement::Block));
        cpg.graph.add_ast_child(func, EdgeLabel::Body, body);
        (func, body)
    }

    fn reference(cpg: &mut Cpg, name: &str) -> NodeId {
        cpg.graph
            .add_node(Node::expression(name, Expression::DeclaredReference))
    }

    fn eog_targets(cpg: &Cpg, id: NodeId) -> Vec<NodeId> {
        cpg.graph.targets(id, EdgeLabel::Eog)
    }

    #[test]
    fn sequential_statements_chain() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let (func, body) = function_like(&mut cpg, "f");
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        let first = reference(&mut cpg, "a");
        let second = reference(&mut cpg, "b");
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, first);
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, second);

        EogPass.run(&mut cpg).unwrap();
        assert_eq!(eog_targets(&cpg, func), vec![first]);
        assert_eq!(eog_targets(&cpg, first), vec![second]);
    }

    #[test]
    fn short_circuit_splits_lhs() {
        // if (a && b) c;
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let (func, body) = function_like(&mut cpg, "f");
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);

        let if_stmt = cpg.graph.add_node(Node::statement(Statement::If));
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, if_stmt);
        let and = cpg.graph.add_node(Node::expression(
            "&&",
            Expression::BinaryOperator { op: "&&".into() },
        ));
        cpg.graph.add_ast_child(if_stmt, EdgeLabel::Condition, and);
        let a = reference(&mut cpg, "a");
        let b = reference(&mut cpg, "b");
        cpg.graph.add_ast_child(and, EdgeLabel::Lhs, a);
        cpg.graph.add_ast_child(and, EdgeLabel::Rhs, b);
        let c = reference(&mut cpg, "c");
        cpg.graph.add_ast_child(if_stmt, EdgeLabel::ThenBranch, c);
        let after = reference(&mut cpg, "after");
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, after);

        EogPass.run(&mut cpg).unwrap();

        // a splits: true -> b, false -> the join at the operator.
        let a_successors = eog_targets(&cpg, a);
        assert_eq!(a_successors.len(), 2);
        assert!(a_successors.contains(&b));
        assert!(a_successors.contains(&and));
        // b joins at the operator only.
        assert_eq!(eog_targets(&cpg, b), vec![and]);
        // The if branches to the then statement and past the statement.
        let if_successors = eog_targets(&cpg, if_stmt);
        assert!(if_successors.contains(&c));
        assert!(if_successors.contains(&after));
    }

    #[test]
    fn while_loop_has_back_edge() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let (func, body) = function_like(&mut cpg, "f");
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);

        let while_stmt = cpg.graph.add_node(Node::statement(Statement::While));
        cpg.graph
            .add_ast_child(body, EdgeLabel::Statements, while_stmt);
        let cond = reference(&mut cpg, "cond");
        cpg.graph
            .add_ast_child(while_stmt, EdgeLabel::Condition, cond);
        let inner = reference(&mut cpg, "work");
        cpg.graph.add_ast_child(while_stmt, EdgeLabel::Body, inner);

        EogPass.run(&mut cpg).unwrap();
        // Body exit loops back to the condition.
        assert!(eog_targets(&cpg, inner).contains(&cond));
    }

    #[test]
    fn rerun_adds_no_edges() {
        let mut cpg = Cpg::new("::");
        let unit = cpg
            .graph
            .add_node(Node::declaration("a.c", Declaration::TranslationUnit));
        cpg.units.push(unit);
        let (func, body) = function_like(&mut cpg, "f");
        cpg.graph.add_ast_child(unit, EdgeLabel::Declarations, func);
        let only = reference(&mut cpg, "x");
        cpg.graph.add_ast_child(body, EdgeLabel::Statements, only);

        EogPass.run(&mut cpg).unwrap();
        let edges = cpg.graph.edge_count();
        EogPass.run(&mut cpg).unwrap();
        assert_eq!(cpg.graph.edge_count(), edges);
    }
}
