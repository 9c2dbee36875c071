//! Go frontend over tree-sitter-go
//!
//! The package clause becomes a Namespace that owns every declaration in
//! the file. Struct type declarations become Records with Fields; methods
//! find their record through the receiver type once the whole file has
//! been walked, since Go puts no ordering constraints between them.

use std::path::Path;

use arbor_core::{
    Cpg, Declaration, EdgeLabel, Expression, Language, LiteralValue, Node, NodeData, NodeId,
    RecordKind, ScopeKind, Statement, Type, types,
};

use crate::frontend::{FrontendContext, HandlerMap, LanguageFrontend, TranslationError};

pub struct GoFrontend {
    pub(crate) ctx: FrontendContext,
    namespace: NodeId,
    /// Methods waiting for their receiver's record: (method, receiver type).
    method_fixups: Vec<(NodeId, String)>,
    statement_handlers: HandlerMap<Self>,
    expression_handlers: HandlerMap<Self>,
}

impl GoFrontend {
    pub fn new() -> Self {
        let mut frontend = GoFrontend {
            ctx: FrontendContext::new(".", Language::Go),
            namespace: NodeId::default(),
            method_fixups: Vec::new(),
            statement_handlers: HandlerMap::default(),
            expression_handlers: HandlerMap::default(),
        };
        register_statements(&mut frontend.statement_handlers);
        register_expressions(&mut frontend.expression_handlers);
        frontend
    }

    fn handle_statement(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        match self.statement_handlers.get(raw.kind()) {
            Some(handler) => handler(self, raw),
            None => {
                if self.expression_handlers.get(raw.kind()).is_some() {
                    return self.handle_expression(raw);
                }
                let node = Node::statement(Statement::Unimplemented {
                    raw_kind: raw.kind().to_string(),
                });
                Some(self.ctx.unimplemented(node, raw))
            }
        }
    }

    fn handle_expression(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        match self.expression_handlers.get(raw.kind()) {
            Some(handler) => handler(self, raw),
            None => {
                let node = Node::expression(
                    self.ctx.text(raw).to_string(),
                    Expression::Unimplemented {
                        raw_kind: raw.kind().to_string(),
                    },
                );
                Some(self.ctx.unimplemented(node, raw))
            }
        }
    }

    fn handle_declaration(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        match raw.kind() {
            "comment" => {
                self.ctx.stash_comment(raw);
                Vec::new()
            }
            "function_declaration" => self.decl_function(raw, None),
            "method_declaration" => {
                let receiver = self.receiver_type(raw);
                self.decl_function(raw, receiver)
            }
            "type_declaration" => self.decl_types(raw),
            "var_declaration" | "const_declaration" => self.decl_variables(raw),
            "import_declaration" => self.decl_imports(raw),
            _ => {
                let node = Node::declaration(
                    "",
                    Declaration::Unimplemented {
                        raw_kind: raw.kind().to_string(),
                    },
                );
                vec![self.ctx.unimplemented(node, raw)]
            }
        }
    }

    fn receiver_type(&self, raw: tree_sitter::Node) -> Option<String> {
        let receiver = raw.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let declaration = receiver
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")?;
        let ty = declaration.child_by_field_name("type")?;
        Some(self.ctx.text(ty).trim_start_matches('*').to_string())
    }

    fn decl_function(&mut self, raw: tree_sitter::Node, receiver: Option<String>) -> Vec<NodeId> {
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();
        let parameters = raw.child_by_field_name("parameters");
        let is_variadic = parameters.is_some_and(|p| {
            let mut cursor = p.walk();
            p.named_children(&mut cursor)
                .any(|c| c.kind() == "variadic_parameter_declaration")
        });

        let data = match receiver {
            Some(_) => Declaration::Method {
                record: None,
                is_static: false,
                is_variadic,
            },
            None => Declaration::Function {
                is_definition: raw.child_by_field_name("body").is_some(),
                is_variadic,
            },
        };
        let function = self.ctx.add(Node::declaration(name, data), raw);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, function);

        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Function, Some(function), None);
        let mut parameter_types = Vec::new();
        if let Some(parameters) = parameters {
            parameter_types = self.build_parameters(function, parameters);
        }
        let return_type = raw
            .child_by_field_name("result")
            .map(|r| types::parse(self.ctx.text(r), true, &self.ctx.cpg.aliases))
            .unwrap_or_else(Type::void);
        if let Some(body) = raw.child_by_field_name("body") {
            if let Some(block) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(function, EdgeLabel::Body, block);
            }
        }
        self.ctx.leave_scope(Some(function));

        if let Some(node) = self.ctx.cpg.graph.node_mut(function) {
            node.ty = Type::function(parameter_types, return_type);
        }
        if let Some(receiver) = self.receiver_type(raw) {
            self.method_fixups.push((function, receiver));
        }
        vec![function]
    }

    fn build_parameters(&mut self, function: NodeId, parameters: tree_sitter::Node) -> Vec<Type> {
        let mut cursor = parameters.walk();
        let children: Vec<tree_sitter::Node> = parameters.named_children(&mut cursor).collect();
        let mut parameter_types = Vec::new();
        for child in children {
            let variadic = child.kind() == "variadic_parameter_declaration";
            if child.kind() != "parameter_declaration" && !variadic {
                continue;
            }
            let ty = child
                .child_by_field_name("type")
                .map(|t| types::parse(self.ctx.text(t), true, &self.ctx.cpg.aliases))
                .unwrap_or_else(Type::unknown);
            // One parameter_declaration may bind several names.
            let mut name_cursor = child.walk();
            let names: Vec<String> = child
                .named_children(&mut name_cursor)
                .filter(|c| c.kind() == "identifier")
                .map(|c| self.ctx.text(c).to_string())
                .collect();
            let names = if names.is_empty() {
                vec![String::new()]
            } else {
                names
            };
            for name in names {
                parameter_types.push(ty.clone());
                let mut node = Node::declaration(
                    name,
                    Declaration::Parameter {
                        is_variadic: variadic,
                    },
                );
                node.ty = ty.clone();
                let parameter = self.ctx.add(node, child);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, parameter);
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(function, EdgeLabel::Parameters, parameter);
            }
        }
        parameter_types
    }

    fn decl_types(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let mut produced = Vec::new();
        let mut cursor = raw.walk();
        let specs: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "type_spec")
            .collect();
        for spec in specs {
            let name = spec
                .child_by_field_name("name")
                .map(|n| self.ctx.text(n).to_string())
                .unwrap_or_default();
            let Some(ty) = spec.child_by_field_name("type") else {
                continue;
            };
            match ty.kind() {
                "struct_type" => produced.push(self.decl_struct(spec, &name, ty)),
                "interface_type" => {
                    let record = self.ctx.add(
                        Node::declaration(
                            name,
                            Declaration::Record {
                                kind: RecordKind::Class,
                                superclass_names: Vec::new(),
                            },
                        ),
                        spec,
                    );
                    self.ctx
                        .cpg
                        .scopes
                        .add_declaration(&mut self.ctx.cpg.graph, record);
                    produced.push(record);
                }
                _ => {
                    let target = types::parse(self.ctx.text(ty), true, &self.ctx.cpg.aliases);
                    let mut node = Node::declaration(
                        name.clone(),
                        Declaration::Typedef {
                            target: target.clone(),
                        },
                    );
                    node.ty = target.clone();
                    let typedef = self.ctx.add(node, spec);
                    self.ctx
                        .cpg
                        .scopes
                        .add_declaration(&mut self.ctx.cpg.graph, typedef);
                    if !name.is_empty() {
                        self.ctx.cpg.aliases.register(name, target);
                    }
                    produced.push(typedef);
                }
            }
        }
        produced
    }

    fn decl_struct(
        &mut self,
        spec: tree_sitter::Node,
        name: &str,
        struct_type: tree_sitter::Node,
    ) -> NodeId {
        let record = self.ctx.add(
            Node::declaration(
                name,
                Declaration::Record {
                    kind: RecordKind::Struct,
                    superclass_names: Vec::new(),
                },
            ),
            spec,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, record);
        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Record, Some(record), Some(name.to_string()));

        if let Some(fields) = struct_type.named_child(0) {
            let mut cursor = fields.walk();
            let declarations: Vec<tree_sitter::Node> = fields
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "field_declaration")
                .collect();
            for declaration in declarations {
                let ty = declaration
                    .child_by_field_name("type")
                    .map(|t| types::parse(self.ctx.text(t), true, &self.ctx.cpg.aliases))
                    .unwrap_or_else(Type::unknown);
                let mut name_cursor = declaration.walk();
                let names: Vec<tree_sitter::Node> = declaration
                    .named_children(&mut name_cursor)
                    .filter(|c| c.kind() == "field_identifier")
                    .collect();
                for field_name in names {
                    let mut node = Node::declaration(
                        self.ctx.text(field_name).to_string(),
                        Declaration::Field,
                    );
                    node.ty = ty.clone();
                    let field = self.ctx.add(node, declaration);
                    self.ctx
                        .cpg
                        .scopes
                        .add_declaration(&mut self.ctx.cpg.graph, field);
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(record, EdgeLabel::Fields, field);
                }
            }
        }
        self.ctx.leave_scope(Some(record));
        record
    }

    fn decl_variables(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let mut produced = Vec::new();
        let mut cursor = raw.walk();
        let specs: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| matches!(c.kind(), "var_spec" | "const_spec"))
            .collect();
        for spec in specs {
            let ty = spec
                .child_by_field_name("type")
                .map(|t| types::parse(self.ctx.text(t), true, &self.ctx.cpg.aliases))
                .unwrap_or_else(Type::unknown);
            let mut name_cursor = spec.walk();
            let names: Vec<tree_sitter::Node> = spec
                .named_children(&mut name_cursor)
                .filter(|c| c.kind() == "identifier")
                .collect();
            let value = spec.child_by_field_name("value");
            for name in names {
                let mut node = Node::declaration(
                    self.ctx.text(name).to_string(),
                    Declaration::Variable,
                );
                node.ty = ty.clone();
                let variable = self.ctx.add(node, spec);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, variable);
                if let Some(value) = value.and_then(|v| v.named_child(0)) {
                    if let Some(value) = self.handle_expression(value) {
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(variable, EdgeLabel::Initializer, value);
                    }
                }
                produced.push(variable);
            }
        }
        produced
    }

    fn decl_imports(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let mut produced = Vec::new();
        let mut stack = vec![raw];
        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "import_spec" => {
                        let path = child
                            .child_by_field_name("path")
                            .map(|p| self.ctx.text(p).trim_matches('"').to_string())
                            .unwrap_or_default();
                        produced.push(self.ctx.add(
                            Node::declaration(path, Declaration::Include { target: None }),
                            child,
                        ));
                    }
                    "import_spec_list" => stack.push(child),
                    _ => {}
                }
            }
        }
        produced
    }

    /// Receivers resolve by type name after the whole file is in.
    fn apply_method_fixups(&mut self) {
        let fixups = std::mem::take(&mut self.method_fixups);
        for (method, receiver) in fixups {
            let record = self
                .ctx
                .cpg
                .graph
                .targets(self.namespace, EdgeLabel::Declarations)
                .into_iter()
                .find(|d| {
                    self.ctx.cpg.graph.node(*d).is_some_and(|n| {
                        matches!(n.data, NodeData::Declaration(Declaration::Record { .. }))
                            && n.name == receiver
                    })
                });
            let Some(record) = record else {
                continue;
            };
            if let Some(node) = self.ctx.cpg.graph.node_mut(method) {
                if let NodeData::Declaration(Declaration::Method {
                    record: method_record,
                    ..
                }) = &mut node.data
                {
                    *method_record = Some(record);
                }
            }
            self.ctx
                .cpg
                .graph
                .add_ast_child(record, EdgeLabel::Methods, method);
        }
    }
}

impl Default for GoFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageFrontend for GoFrontend {
    fn language(&self) -> Language {
        Language::Go
    }

    fn namespace_delimiter(&self) -> &'static str {
        "."
    }

    fn code_of(&self, raw: tree_sitter::Node) -> Option<String> {
        self.ctx.code_of(raw)
    }

    fn location_of(&self, raw: tree_sitter::Node) -> Option<arbor_core::PhysicalLocation> {
        self.ctx.location_of(raw)
    }

    fn attach_comment(&mut self, node: NodeId, raw: tree_sitter::Node) {
        self.ctx.attach_comment(node, raw);
    }

    fn parse(&mut self, path: &Path) -> Result<Cpg, TranslationError> {
        let source = std::fs::read_to_string(path).map_err(|source| TranslationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|_| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;

        self.ctx = FrontendContext::new(".", Language::Go);
        self.ctx.source = source;
        self.ctx.path = path.to_path_buf();

        let root = tree.root_node();
        let unit = self.ctx.add(
            Node::declaration(
                path.display().to_string(),
                Declaration::TranslationUnit,
            ),
            root,
        );
        self.ctx.cpg.units.push(unit);

        let package_name = {
            let mut cursor = root.walk();
            root.named_children(&mut cursor)
                .find(|c| c.kind() == "package_clause")
                .and_then(|clause| clause.named_child(0))
                .map(|name| self.ctx.text(name).to_string())
                .unwrap_or_else(|| "main".to_string())
        };
        self.namespace = self.ctx.add(
            Node::declaration(package_name.clone(), Declaration::Namespace),
            root,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, self.namespace);
        self.ctx
            .cpg
            .graph
            .add_ast_child(unit, EdgeLabel::Declarations, self.namespace);

        self.ctx.cpg.scopes.enter_scope(
            ScopeKind::Namespace,
            Some(self.namespace),
            Some(package_name),
        );
        let mut cursor = root.walk();
        let children: Vec<tree_sitter::Node> = root
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "package_clause")
            .collect();
        for child in children {
            for declaration in self.handle_declaration(child) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(self.namespace, EdgeLabel::Declarations, declaration);
            }
        }
        self.ctx.leave_scope(Some(self.namespace));
        self.apply_method_fixups();

        if let Some(scope_error) = self.ctx.scope_error.take() {
            return Err(TranslationError::Scope {
                path: path.to_path_buf(),
                source: scope_error,
            });
        }
        Ok(std::mem::replace(&mut self.ctx, FrontendContext::new(".", Language::Go)).cpg)
    }
}

fn register_statements(map: &mut HandlerMap<GoFrontend>) {
    map.register("block", |f, raw| {
        let block = f.ctx.add(Node::statement(Statement::Block), raw);
        f.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Block, Some(block), None);
        let mut cursor = raw.walk();
        let children: Vec<tree_sitter::Node> = raw.named_children(&mut cursor).collect();
        for child in children {
            if let Some(statement) = f.handle_statement(child) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(block, EdgeLabel::Statements, statement);
            }
        }
        f.ctx.leave_scope(Some(block));
        Some(block)
    });
    map.register("expression_statement", |f, raw| {
        let inner = raw.named_child(0)?;
        f.handle_expression(inner)
    });
    map.register("comment", |f, raw| {
        f.ctx.stash_comment(raw);
        None
    });
    map.register("var_declaration", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::DeclarationStmt), raw);
        for declaration in f.decl_variables(raw) {
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Declarations, declaration);
        }
        Some(statement)
    });
    map.register("short_var_declaration", GoFrontend::stmt_short_var);
    map.register("assignment_statement", GoFrontend::stmt_assignment);
    map.register("if_statement", GoFrontend::stmt_if);
    map.register("for_statement", GoFrontend::stmt_for);
    map.register("return_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::Return), raw);
        if let Some(values) = raw.named_child(0) {
            let value = if values.kind() == "expression_list" {
                values.named_child(0)
            } else {
                Some(values)
            };
            if let Some(value) = value {
                if let Some(value) = f.handle_expression(value) {
                    f.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::Value, value);
                }
            }
        }
        Some(statement)
    });
    map.register("break_statement", |f, raw| {
        Some(f.ctx.add(Node::statement(Statement::Break), raw))
    });
    map.register("continue_statement", |f, raw| {
        Some(f.ctx.add(Node::statement(Statement::Continue), raw))
    });
    map.register("inc_statement", GoFrontend::stmt_inc_dec);
    map.register("dec_statement", GoFrontend::stmt_inc_dec);
}

impl GoFrontend {
    fn stmt_short_var(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self
            .ctx
            .add(Node::statement(Statement::DeclarationStmt), raw);
        let left = raw.child_by_field_name("left");
        let right = raw.child_by_field_name("right");
        let mut values = Vec::new();
        if let Some(right) = right {
            let mut cursor = right.walk();
            values = right.named_children(&mut cursor).collect();
        }
        if let Some(left) = left {
            let mut cursor = left.walk();
            let names: Vec<tree_sitter::Node> = left
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "identifier")
                .collect();
            for (index, name) in names.into_iter().enumerate() {
                let node =
                    Node::declaration(self.ctx.text(name).to_string(), Declaration::Variable);
                let variable = self.ctx.add(node, name);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, variable);
                if let Some(value) = values.get(index).copied() {
                    if let Some(value) = self.handle_expression(value) {
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(variable, EdgeLabel::Initializer, value);
                    }
                }
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Declarations, variable);
            }
        }
        Some(statement)
    }

    fn stmt_assignment(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let mut cursor = raw.walk();
        let op = raw
            .children(&mut cursor)
            .find(|c| !c.is_named() && c.kind().ends_with('='))
            .map(|c| c.kind().to_string())
            .unwrap_or_else(|| "=".to_string());
        let node = self.ctx.add(
            Node::expression(op.clone(), Expression::BinaryOperator { op }),
            raw,
        );
        if let Some(left) = raw
            .child_by_field_name("left")
            .and_then(|l| l.named_child(0))
        {
            if let Some(lhs) = self.handle_expression(left) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Lhs, lhs);
            }
        }
        if let Some(right) = raw
            .child_by_field_name("right")
            .and_then(|r| r.named_child(0))
        {
            if let Some(rhs) = self.handle_expression(right) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Rhs, rhs);
            }
        }
        Some(node)
    }

    fn stmt_if(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let statement = self.ctx.add(Node::statement(Statement::If), raw);
        if let Some(condition) = raw.child_by_field_name("condition") {
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
            if let Some(alternative) = self.handle_statement(alternative) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::ElseBranch, alternative);
            }
        }
        Some(statement)
    }

    /// Go's `for` covers plain loops, while-style loops and range loops.
    fn stmt_for(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let mut cursor = raw.walk();
        let range = raw
            .named_children(&mut cursor)
            .find(|c| c.kind() == "range_clause");
        if let Some(range) = range {
            let statement = self.ctx.add(Node::statement(Statement::ForEach), raw);
            self.ctx
                .cpg
                .scopes
                .enter_scope(ScopeKind::Loop, Some(statement), None);
            if let Some(left) = range
                .child_by_field_name("left")
                .and_then(|l| l.named_child(0))
            {
                let node =
                    Node::declaration(self.ctx.text(left).to_string(), Declaration::Variable);
                let variable = self.ctx.add(node, left);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, variable);
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Variable, variable);
            }
            if let Some(right) = range.child_by_field_name("right") {
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
            return Some(statement);
        }

        let statement = self.ctx.add(Node::statement(Statement::For), raw);
        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Loop, Some(statement), None);
        let mut cursor = raw.walk();
        let clause = raw
            .named_children(&mut cursor)
            .find(|c| c.kind() == "for_clause");
        if let Some(clause) = clause {
            if let Some(initializer) = clause.child_by_field_name("initializer") {
                if let Some(initializer) = self.handle_statement(initializer) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::Initializer, initializer);
                }
            }
            if let Some(condition) = clause.child_by_field_name("condition") {
                if let Some(condition) = self.handle_expression(condition) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::Condition, condition);
                }
            }
            if let Some(update) = clause.child_by_field_name("update") {
                if let Some(update) = self.handle_statement(update) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::Iteration, update);
                }
            }
        } else {
            // `for cond { ... }`: the bare expression is the condition.
            let mut cursor = raw.walk();
            if let Some(condition) = raw
                .named_children(&mut cursor)
                .find(|c| c.kind() != "block" && c.kind() != "comment")
            {
                if let Some(condition) = self.handle_expression(condition) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(statement, EdgeLabel::Condition, condition);
                }
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

    fn stmt_inc_dec(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let op = if raw.kind() == "inc_statement" { "++" } else { "--" };
        let node = self.ctx.add(
            Node::expression(
                op,
                Expression::UnaryOperator {
                    op: op.to_string(),
                    is_postfix: true,
                },
            ),
            raw,
        );
        if let Some(operand) = raw.named_child(0) {
            if let Some(operand) = self.handle_expression(operand) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Operand, operand);
            }
        }
        Some(node)
    }
}

fn register_expressions(map: &mut HandlerMap<GoFrontend>) {
    map.register("identifier", |f, raw| {
        let name = f.ctx.text(raw).to_string();
        Some(f.ctx.add(Node::expression(name, Expression::DeclaredReference), raw))
    });
    map.register("field_identifier", |f, raw| {
        let name = f.ctx.text(raw).to_string();
        Some(f.ctx.add(Node::expression(name, Expression::DeclaredReference), raw))
    });
    map.register("int_literal", |f, raw| {
        let text = f.ctx.text(raw).to_string();
        let mut node = Node::expression(
            text.clone(),
            Expression::Literal {
                value: LiteralValue::Int(text.parse::<i64>().unwrap_or(0)),
            },
        );
        node.ty = Type::object("int");
        Some(f.ctx.add(node, raw))
    });
    map.register("float_literal", |f, raw| {
        let text = f.ctx.text(raw).to_string();
        let mut node = Node::expression(
            text.clone(),
            Expression::Literal {
                value: LiteralValue::Float(text.parse::<f64>().unwrap_or(0.0)),
            },
        );
        node.ty = Type::object("float64");
        Some(f.ctx.add(node, raw))
    });
    map.register("interpreted_string_literal", go_string);
    map.register("raw_string_literal", go_string);
    map.register("true", |f, raw| {
        let mut node = Node::expression(
            "true",
            Expression::Literal {
                value: LiteralValue::Bool(true),
            },
        );
        node.ty = Type::object("bool");
        Some(f.ctx.add(node, raw))
    });
    map.register("false", |f, raw| {
        let mut node = Node::expression(
            "false",
            Expression::Literal {
                value: LiteralValue::Bool(false),
            },
        );
        node.ty = Type::object("bool");
        Some(f.ctx.add(node, raw))
    });
    map.register("nil", |f, raw| {
        Some(f.ctx.add(
            Node::expression(
                "nil",
                Expression::Literal {
                    value: LiteralValue::Null,
                },
            ),
            raw,
        ))
    });
    map.register("call_expression", |f, raw| {
        let function = raw.child_by_field_name("function")?;
        let call = if function.kind() == "selector_expression" {
            let member = function
                .child_by_field_name("field")
                .map(|m| f.ctx.text(m).to_string())
                .unwrap_or_default();
            let call = f
                .ctx
                .add(Node::expression(member, Expression::MemberCall), raw);
            if let Some(operand) = function.child_by_field_name("operand") {
                if let Some(base) = f.handle_expression(operand) {
                    f.ctx.cpg.graph.add_ast_child(call, EdgeLabel::Base, base);
                }
            }
            call
        } else {
            let callee_name = f.ctx.text(function).to_string();
            f.ctx.add(
                Node::expression(callee_name.clone(), Expression::Call { callee_name }),
                raw,
            )
        };
        if let Some(arguments) = raw.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            let children: Vec<tree_sitter::Node> = arguments.named_children(&mut cursor).collect();
            for argument in children {
                if let Some(argument) = f.handle_expression(argument) {
                    f.ctx
                        .cpg
                        .graph
                        .add_ast_child(call, EdgeLabel::Arguments, argument);
                }
            }
        }
        Some(call)
    });
    map.register("selector_expression", |f, raw| {
        let name = raw
            .child_by_field_name("field")
            .map(|m| f.ctx.text(m).to_string())
            .unwrap_or_default();
        let member = f.ctx.add(Node::expression(name, Expression::Member), raw);
        if let Some(operand) = raw.child_by_field_name("operand") {
            if let Some(base) = f.handle_expression(operand) {
                f.ctx.cpg.graph.add_ast_child(member, EdgeLabel::Base, base);
            }
        }
        Some(member)
    });
    map.register("binary_expression", |f, raw| {
        let op = raw
            .child_by_field_name("operator")
            .map(|o| f.ctx.text(o).to_string())
            .unwrap_or_default();
        let node = f.ctx.add(
            Node::expression(op.clone(), Expression::BinaryOperator { op }),
            raw,
        );
        if let Some(left) = raw.child_by_field_name("left") {
            if let Some(lhs) = f.handle_expression(left) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Lhs, lhs);
            }
        }
        if let Some(right) = raw.child_by_field_name("right") {
            if let Some(rhs) = f.handle_expression(right) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Rhs, rhs);
            }
        }
        Some(node)
    });
    map.register("unary_expression", |f, raw| {
        let op = raw
            .child_by_field_name("operator")
            .map(|o| f.ctx.text(o).to_string())
            .unwrap_or_default();
        let node = f.ctx.add(
            Node::expression(
                op.clone(),
                Expression::UnaryOperator {
                    op,
                    is_postfix: false,
                },
            ),
            raw,
        );
        if let Some(operand) = raw.child_by_field_name("operand") {
            if let Some(operand) = f.handle_expression(operand) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Operand, operand);
            }
        }
        Some(node)
    });
    map.register("parenthesized_expression", |f, raw| {
        let inner = raw.named_child(0)?;
        f.handle_expression(inner)
    });
    map.register("index_expression", |f, raw| {
        let node = f.ctx.add(Node::expression("", Expression::ArraySubscript), raw);
        if let Some(operand) = raw.child_by_field_name("operand") {
            if let Some(base) = f.handle_expression(operand) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Base, base);
            }
        }
        if let Some(index) = raw.child_by_field_name("index") {
            if let Some(index) = f.handle_expression(index) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Index, index);
            }
        }
        Some(node)
    });
    map.register("composite_literal", |f, raw| {
        let type_name = raw
            .child_by_field_name("type")
            .map(|t| f.ctx.text(t).to_string())
            .unwrap_or_default();
        let mut node = Node::expression(
            type_name.clone(),
            Expression::Construct {
                type_name: type_name.clone(),
            },
        );
        node.ty = types::parse(&type_name, true, &f.ctx.cpg.aliases);
        let construct = f.ctx.add(node, raw);
        if let Some(body) = raw.child_by_field_name("body") {
            let mut cursor = body.walk();
            let children: Vec<tree_sitter::Node> = body.named_children(&mut cursor).collect();
            for child in children {
                if let Some(element) = f.handle_expression(child) {
                    f.ctx
                        .cpg
                        .graph
                        .add_ast_child(construct, EdgeLabel::Arguments, element);
                }
            }
        }
        Some(construct)
    });
}

fn go_string(f: &mut GoFrontend, raw: tree_sitter::Node) -> Option<NodeId> {
    let text = f.ctx.text(raw).to_string();
    let value = text.trim_matches(['"', '`']).to_string();
    let mut node = Node::expression(
        text,
        Expression::Literal {
            value: LiteralValue::Str(value),
        },
    );
    node.ty = Type::object("string");
    Some(f.ctx.add(node, raw))
}
