//! Statement handlers

use arbor_core::{EdgeLabel, Node, NodeId, ScopeKind, Statement};

use super::CxxFrontend;
use crate::frontend::HandlerMap;

pub(super) fn register(map: &mut HandlerMap<CxxFrontend>) {
    map.register("compound_statement", CxxFrontend::stmt_block);
    map.register("expression_statement", CxxFrontend::stmt_expression);
    map.register("declaration", CxxFrontend::stmt_declaration);
    map.register("if_statement", CxxFrontend::stmt_if);
    map.register("while_statement", CxxFrontend::stmt_while);
    map.register("for_statement", CxxFrontend::stmt_for);
    map.register("for_range_loop", CxxFrontend::stmt_for_range);
    map.register("switch_statement", CxxFrontend::stmt_switch);
    map.register("case_statement", CxxFrontend::stmt_case);
    map.register("return_statement", CxxFrontend::stmt_return);
    map.register("break_statement", CxxFrontend::stmt_break);
    map.register("continue_statement", CxxFrontend::stmt_continue);
    map.register("try_statement", CxxFrontend::stmt_try);
    map.register("comment", |f, raw| {
        f.ctx.stash_comment(raw);
        None
    });
}

impl CxxFrontend {
    /// `if (cond)` wraps the expression in a parenthesized node (or a
    /// condition clause in C++); unwrap to the actual expression.
    fn unwrap_condition<'t>(&self, raw: tree_sitter::Node<'t>) -> tree_sitter::Node<'t> {
        if matches!(raw.kind(), "parenthesized_expression" | "condition_clause") {
            if let Some(inner) = raw
                .child_by_field_name("value")
                .or_else(|| raw.named_child(0))
            {
                return inner;
            }
        }
        raw
    }

    fn stmt_block(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let block = self.ctx.add(Node::statement(Statement::Block), raw);
        self.enter_scope(ScopeKind::Block, Some(block), None);
        let mut cursor = raw.walk();
        let children: Vec<tree_sitter::Node> = raw.named_children(&mut cursor).collect();
        for child in children {
            if let Some(statement) = self.handle_statement(child) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(block, EdgeLabel::Statements, statement);
            }
        }
        self.ctx.leave_scope(Some(block));
        Some(block)
    }

    /// Expressions stand directly in statement position.
    fn stmt_expression(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let inner = raw.named_child(0)?;
        self.handle_expression(inner)
    }

    fn stmt_declaration(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self
            .ctx
            .add(Node::statement(Statement::DeclarationStmt), raw);
        for declaration in self.declaration_parts(raw) {
            self.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Declarations, declaration);
        }
        Some(statement)
    }

    fn stmt_if(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::If), raw);
        if let Some(condition) = raw.child_by_field_name("condition") {
            let condition = self.unwrap_condition(condition);
            if let Some(condition) = self.handle_expression(condition) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(consequence) = raw.child_by_field_name("consequence") {
            if let Some(consequence) = self.handle_statement(consequence) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::ThenBranch, consequence);
            }
        }
        if let Some(alternative) = raw.child_by_field_name("alternative") {
            // The else arm is wrapped in an else_clause node.
            let alternative = if alternative.kind() == "else_clause" {
                alternative.named_child(0)
            } else {
                Some(alternative)
            };
            if let Some(alternative) = alternative {
                if let Some(alternative) = self.handle_statement(alternative) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::ElseBranch, alternative);
                }
            }
        }
        Some(statement)
    }

    fn stmt_while(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::While), raw);
        self.enter_scope(ScopeKind::Loop, Some(statement), None);
        if let Some(condition) = raw.child_by_field_name("condition") {
            let condition = self.unwrap_condition(condition);
            if let Some(condition) = self.handle_expression(condition) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(body) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Body, body);
            }
        }
        self.ctx.leave_scope(Some(statement));
        Some(statement)
    }

    fn stmt_for(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::For), raw);
        self.enter_scope(ScopeKind::Loop, Some(statement), None);
        if let Some(initializer) = raw.child_by_field_name("initializer") {
            let initializer = if initializer.kind() == "declaration" {
                self.stmt_declaration(initializer)
            } else {
                self.handle_expression(initializer)
            };
            if let Some(initializer) = initializer {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Initializer, initializer);
            }
        }
        if let Some(condition) = raw.child_by_field_name("condition") {
            let condition = self.unwrap_condition(condition);
            if let Some(condition) = self.handle_expression(condition) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(update) = raw.child_by_field_name("update") {
            if let Some(update) = self.handle_expression(update) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Iteration, update);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(body) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Body, body);
            }
        }
        self.ctx.leave_scope(Some(statement));
        Some(statement)
    }

    /// C++ range-for maps onto the ForEach variant.
    fn stmt_for_range(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::ForEach), raw);
        self.enter_scope(ScopeKind::Loop, Some(statement), None);
        let type_text = raw
            .child_by_field_name("type")
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();
        if let Some(declarator) = raw.child_by_field_name("declarator") {
            let mut info = super::declarations::DeclaratorInfo::default();
            self.analyze_declarator(declarator, &mut info, false);
            let mut node =
                Node::declaration(info.name.clone(), arbor_core::Declaration::Variable);
            node.ty = arbor_core::types::parse(&type_text, true, &self.ctx.cpg.aliases);
            let variable = self.ctx.add(node, declarator);
            self.ctx
                .cpg
                .scopes
                .add_declaration(&mut self.ctx.cpg.graph, variable);
            self.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Variable, variable);
        }
        if let Some(right) = raw.child_by_field_name("right") {
            if let Some(iterable) = self.handle_expression(right) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Iterable, iterable);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(body) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Body, body);
            }
        }
        self.ctx.leave_scope(Some(statement));
        Some(statement)
    }

    fn stmt_switch(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::Switch), raw);
        if let Some(condition) = raw.child_by_field_name("condition") {
            let condition = self.unwrap_condition(condition);
            if let Some(condition) = self.handle_expression(condition) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(body) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Body, body);
            }
        }
        Some(statement)
    }

    /// `case value:` and `default:` both arrive as case_statement; the
    /// trailing statements are the node's children.
    fn stmt_case(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let value = raw.child_by_field_name("value");
        let statement = match value {
            Some(_) => self.ctx.add(Node::statement(Statement::Case), raw),
            None => self.ctx.add(Node::statement(Statement::Default), raw),
        };
        if let Some(value) = value {
            if let Some(value) = self.handle_expression(value) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Value, value);
            }
        }
        let mut cursor = raw.walk();
        let children: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| Some(c.id()) != value.map(|v| v.id()))
            .collect();
        for child in children {
            if let Some(inner) = self.handle_statement(child) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Statements, inner);
            }
        }
        Some(statement)
    }

    fn stmt_return(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::Return), raw);
        if let Some(value) = raw.named_child(0) {
            if let Some(value) = self.handle_expression(value) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Value, value);
            }
        }
        Some(statement)
    }

    fn stmt_break(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        Some(self.ctx.add(Node::statement(Statement::Break), raw))
    }

    fn stmt_continue(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        Some(self.ctx.add(Node::statement(Statement::Continue), raw))
    }

    fn stmt_try(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::Try), raw);
        self.enter_scope(ScopeKind::TryCatch, Some(statement), None);
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(body) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Body, body);
            }
        }
        let mut cursor = raw.walk();
        let clauses: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "catch_clause")
            .collect();
        for clause in clauses {
            let catch = self.ctx.add(Node::statement(Statement::Catch), clause);
            self.enter_scope(ScopeKind::TryCatch, Some(catch), None);
            if let Some(parameters) = clause.child_by_field_name("parameters") {
                let mut parameter_cursor = parameters.walk();
                let declarations: Vec<tree_sitter::Node> = parameters
                    .named_children(&mut parameter_cursor)
                    .filter(|p| p.kind() == "parameter_declaration")
                    .collect();
                for declaration in declarations {
                    let type_text = declaration
                        .child_by_field_name("type")
                        .map(|t| self.ctx.text(t).to_string())
                        .unwrap_or_default();
                    let mut info = super::declarations::DeclaratorInfo::default();
                    if let Some(declarator) = declaration.child_by_field_name("declarator") {
                        self.analyze_declarator(declarator, &mut info, false);
                    }
                    let mut node =
                        Node::declaration(info.name.clone(), arbor_core::Declaration::Variable);
                    node.ty = arbor_core::types::parse(&type_text, true, &self.ctx.cpg.aliases);
                    let variable = self.ctx.add(node, declaration);
                    self.ctx
                        .cpg
                        .scopes
                        .add_declaration(&mut self.ctx.cpg.graph, variable);
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(catch, EdgeLabel::Parameters, variable);
                }
            }
            if let Some(body) = clause.child_by_field_name("body") {
                if let Some(body) = self.handle_statement(body) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(catch, EdgeLabel::Body, body);
                }
            }
            self.ctx.leave_scope(Some(catch));
            self.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Catches, catch);
        }
        self.ctx.leave_scope(Some(statement));
        Some(statement)
    }
}
