//! Python frontend over tree-sitter-python
//!
//! A module becomes a Namespace named after the file stem. Classes become
//! Records; `def` inside a class body is promoted to a Method (`__init__`
//! to a Constructor) and class-level assignments become Fields. Module and
//! function assignments introduce a Variable the first time a name is
//! bound, and a plain assignment afterwards.

use std::path::Path;

use arbor_core::{
    Cpg, Declaration, EdgeLabel, Expression, Language, LiteralValue, Node, NodeData, NodeId,
    RecordKind, ScopeKind, Statement, Type,
};

use crate::frontend::{FrontendContext, HandlerMap, LanguageFrontend, TranslationError};

pub struct PythonFrontend {
    pub(crate) ctx: FrontendContext,
    statement_handlers: HandlerMap<Self>,
    expression_handlers: HandlerMap<Self>,
}

impl PythonFrontend {
    pub fn new() -> Self {
        let mut frontend = PythonFrontend {
            ctx: FrontendContext::new(".", Language::Python),
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

    /// A suite of statements under `raw` collected into a Block.
    fn handle_block(&mut self, raw: tree_sitter::Node) -> NodeId {
        let block = self.ctx.add(Node::statement(Statement::Block), raw);
        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Block, Some(block), None);
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
        block
    }

    fn decl_function(&mut self, raw: tree_sitter::Node) -> NodeId {
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();
        let function = self.ctx.add(
            Node::declaration(
                name,
                Declaration::Function {
                    is_definition: true,
                    is_variadic: false,
                },
            ),
            raw,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, function);

        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Function, Some(function), None);
        if let Some(parameters) = raw.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            let children: Vec<tree_sitter::Node> =
                parameters.named_children(&mut cursor).collect();
            for child in children {
                let name_node = match child.kind() {
                    "identifier" => Some(child),
                    "typed_parameter" | "default_parameter" | "typed_default_parameter" => child
                        .child_by_field_name("name")
                        .or_else(|| child.named_child(0)),
                    _ => None,
                };
                let Some(name_node) = name_node else {
                    continue;
                };
                let node = Node::declaration(
                    self.ctx.text(name_node).to_string(),
                    Declaration::Parameter { is_variadic: false },
                );
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
        if let Some(body) = raw.child_by_field_name("body") {
            let block = self.handle_block(body);
            self.ctx
                .cpg
                .graph
                .add_ast_child(function, EdgeLabel::Body, block);
        }
        self.ctx.leave_scope(Some(function));
        function
    }

    fn decl_class(&mut self, raw: tree_sitter::Node) -> NodeId {
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();
        let mut superclass_names = Vec::new();
        if let Some(superclasses) = raw.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for superclass in superclasses.named_children(&mut cursor) {
                if matches!(superclass.kind(), "identifier" | "attribute") {
                    superclass_names.push(self.ctx.text(superclass).to_string());
                }
            }
        }

        let record = self.ctx.add(
            Node::declaration(
                name.clone(),
                Declaration::Record {
                    kind: RecordKind::Class,
                    superclass_names,
                },
            ),
            raw,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, record);
        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Record, Some(record), Some(name.clone()));

        let mut constructors = 0usize;
        if let Some(body) = raw.child_by_field_name("body") {
            let mut cursor = body.walk();
            let members: Vec<tree_sitter::Node> = body.named_children(&mut cursor).collect();
            for member in members {
                match member.kind() {
                    "comment" => self.ctx.stash_comment(member),
                    "function_definition" => {
                        let function = self.decl_function(member);
                        let promoted = self.promote_method(record, &name, function);
                        let label = if self.is_constructor(promoted) {
                            constructors += 1;
                            EdgeLabel::Constructors
                        } else {
                            EdgeLabel::Methods
                        };
                        self.ctx.cpg.graph.add_ast_child(record, label, promoted);
                    }
                    "class_definition" => {
                        let nested = self.decl_class(member);
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(record, EdgeLabel::Records, nested);
                    }
                    "expression_statement" => {
                        if let Some(assignment) = member
                            .named_child(0)
                            .filter(|c| c.kind() == "assignment")
                        {
                            for field in self.class_fields(record, &name, assignment) {
                                self.ctx
                                    .cpg
                                    .graph
                                    .add_ast_child(record, EdgeLabel::Fields, field);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        if constructors == 0 {
            let implicit = self.synthesize_default_constructor(record, &name, raw);
            self.ctx
                .cpg
                .graph
                .add_ast_child(record, EdgeLabel::Constructors, implicit);
        }
        self.ctx.leave_scope(Some(record));
        record
    }

    fn is_constructor(&self, id: NodeId) -> bool {
        matches!(
            self.ctx.cpg.graph.node(id).map(|n| &n.data),
            Some(NodeData::Declaration(Declaration::Constructor { .. }))
        )
    }

    /// Reparent a class-level function into a Method or, for `__init__`, a
    /// Constructor.
    fn promote_method(&mut self, record: NodeId, record_name: &str, function: NodeId) -> NodeId {
        let Some(old) = self.ctx.cpg.graph.node(function).cloned() else {
            return function;
        };
        let mut replacement = old.clone();
        replacement.qualified_name = format!("{}.{}", record_name, old.name);
        if old.name == "__init__" {
            replacement.data = NodeData::Declaration(Declaration::Constructor {
                record: Some(record),
            });
            let mut ty = Type::object(record_name);
            ty.link_record(record_name, record);
            replacement.ty = ty;
        } else {
            replacement.data = NodeData::Declaration(Declaration::Method {
                record: Some(record),
                is_static: false,
                is_variadic: false,
            });
        }
        let promoted = self.ctx.cpg.graph.add_node(replacement);
        self.ctx
            .cpg
            .graph
            .transfer_outgoing_edges(function, promoted);
        self.ctx
            .cpg
            .graph
            .transfer_incoming_edges(function, promoted);
        self.ctx.cpg.graph.disconnect_from_graph(function);
        self.ctx.cpg.scopes.remove_declaration(function);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, promoted);
        promoted
    }

    fn synthesize_default_constructor(
        &mut self,
        record: NodeId,
        record_name: &str,
        raw: tree_sitter::Node,
    ) -> NodeId {
        let mut ty = Type::object(record_name);
        ty.link_record(record_name, record);
        let mut node = Node::declaration(
            record_name,
            Declaration::Constructor {
                record: Some(record),
            },
        );
        node.qualified_name = format!("{}.{}", record_name, record_name);
        node.ty = ty;
        node.implicit = true;
        node.location = self.ctx.location_of(raw);
        node.language = Some(self.ctx.language);
        node.scope = Some(self.ctx.cpg.scopes.current_scope());
        let constructor = self.ctx.cpg.graph.add_node(node);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, constructor);
        constructor
    }

    fn class_fields(
        &mut self,
        _record: NodeId,
        record_name: &str,
        assignment: tree_sitter::Node,
    ) -> Vec<NodeId> {
        let Some(left) = assignment.child_by_field_name("left") else {
            return Vec::new();
        };
        if left.kind() != "identifier" {
            return Vec::new();
        }
        let name = self.ctx.text(left).to_string();
        let mut node = Node::declaration(name.clone(), Declaration::Field);
        node.qualified_name = format!("{}.{}", record_name, name);
        let field = self.ctx.add(node, assignment);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, field);
        if let Some(right) = assignment.child_by_field_name("right") {
            if let Some(value) = self.handle_expression(right) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(field, EdgeLabel::Initializer, value);
            }
        }
        vec![field]
    }

    /// `x = 1` binds a new Variable the first time the name appears in the
    /// current scope; later assignments are plain writes.
    fn stmt_assignment(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let left = raw.child_by_field_name("left");
        let is_new_binding = left.is_some_and(|l| {
            l.kind() == "identifier" && {
                let name = self.ctx.text(l);
                let current = self.ctx.cpg.scopes.current_scope();
                !self
                    .ctx
                    .cpg
                    .scopes
                    .scope(current)
                    .symbols
                    .contains_key(name)
            }
        });
        if is_new_binding {
            let left = left?;
            let statement = self
                .ctx
                .add(Node::statement(Statement::DeclarationStmt), raw);
            let node =
                Node::declaration(self.ctx.text(left).to_string(), Declaration::Variable);
            let variable = self.ctx.add(node, left);
            self.ctx
                .cpg
                .scopes
                .add_declaration(&mut self.ctx.cpg.graph, variable);
            if let Some(right) = raw.child_by_field_name("right") {
                if let Some(value) = self.handle_expression(right) {
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
            return Some(statement);
        }

        let node = self.ctx.add(
            Node::expression("=", Expression::BinaryOperator { op: "=".into() }),
            raw,
        );
        if let Some(left) = left {
            if let Some(lhs) = self.handle_expression(left) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Lhs, lhs);
            }
        }
        if let Some(right) = raw.child_by_field_name("right") {
            if let Some(rhs) = self.handle_expression(right) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Rhs, rhs);
            }
        }
        Some(node)
    }
}

impl Default for PythonFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageFrontend for PythonFrontend {
    fn language(&self) -> Language {
        Language::Python
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
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|_| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;

        self.ctx = FrontendContext::new(".", Language::Python);
        self.ctx.source = source;
        self.ctx.path = path.to_path_buf();

        let root = tree.root_node();
        let unit = self.ctx.add(
            Node::declaration(path.display().to_string(), Declaration::TranslationUnit),
            root,
        );
        self.ctx.cpg.units.push(unit);

        let module_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let namespace = self.ctx.add(
            Node::declaration(module_name.clone(), Declaration::Namespace),
            root,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, namespace);
        self.ctx
            .cpg
            .graph
            .add_ast_child(unit, EdgeLabel::Declarations, namespace);
        self.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Namespace, Some(namespace), Some(module_name));

        let mut cursor = root.walk();
        let children: Vec<tree_sitter::Node> = root.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "comment" => self.ctx.stash_comment(child),
                "function_definition" => {
                    let function = self.decl_function(child);
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(namespace, EdgeLabel::Declarations, function);
                }
                "class_definition" => {
                    let class = self.decl_class(child);
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(namespace, EdgeLabel::Declarations, class);
                }
                _ => {
                    if let Some(statement) = self.handle_statement(child) {
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(namespace, EdgeLabel::Declarations, statement);
                    }
                }
            }
        }
        self.ctx.leave_scope(Some(namespace));

        if let Some(scope_error) = self.ctx.scope_error.take() {
            return Err(TranslationError::Scope {
                path: path.to_path_buf(),
                source: scope_error,
            });
        }
        Ok(std::mem::replace(&mut self.ctx, FrontendContext::new(".", Language::Python)).cpg)
    }
}

fn register_statements(map: &mut HandlerMap<PythonFrontend>) {
    map.register("comment", |f, raw| {
        f.ctx.stash_comment(raw);
        None
    });
    map.register("expression_statement", |f, raw| {
        let inner = raw.named_child(0)?;
        if inner.kind() == "assignment" {
            return f.stmt_assignment(inner);
        }
        f.handle_expression(inner)
    });
    map.register("function_definition", |f, raw| Some(f.decl_function(raw)));
    map.register("class_definition", |f, raw| Some(f.decl_class(raw)));
    map.register("if_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::If), raw);
        if let Some(condition) = raw.child_by_field_name("condition") {
            if let Some(condition) = f.handle_expression(condition) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(consequence) = raw.child_by_field_name("consequence") {
            let block = f.handle_block(consequence);
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::ThenBranch, block);
        }
        if let Some(alternative) = raw.child_by_field_name("alternative") {
            let body = alternative
                .child_by_field_name("body")
                .unwrap_or(alternative);
            let block = f.handle_block(body);
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::ElseBranch, block);
        }
        Some(statement)
    });
    map.register("while_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::While), raw);
        f.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Loop, Some(statement), None);
        if let Some(condition) = raw.child_by_field_name("condition") {
            if let Some(condition) = f.handle_expression(condition) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Condition, condition);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            let block = f.handle_block(body);
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Body, block);
        }
        f.ctx.leave_scope(Some(statement));
        Some(statement)
    });
    map.register("for_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::ForEach), raw);
        f.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::Loop, Some(statement), None);
        if let Some(left) = raw.child_by_field_name("left") {
            if left.kind() == "identifier" {
                let node =
                    Node::declaration(f.ctx.text(left).to_string(), Declaration::Variable);
                let variable = f.ctx.add(node, left);
                f.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut f.ctx.cpg.graph, variable);
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Variable, variable);
            }
        }
        if let Some(right) = raw.child_by_field_name("right") {
            if let Some(iterable) = f.handle_expression(right) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Iterable, iterable);
            }
        }
        if let Some(body) = raw.child_by_field_name("body") {
            let block = f.handle_block(body);
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Body, block);
        }
        f.ctx.leave_scope(Some(statement));
        Some(statement)
    });
    map.register("return_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::Return), raw);
        if let Some(value) = raw.named_child(0) {
            if let Some(value) = f.handle_expression(value) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(statement, EdgeLabel::Value, value);
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
    map.register("try_statement", |f, raw| {
        let statement = f.ctx.add(Node::statement(Statement::Try), raw);
        f.ctx
            .cpg
            .scopes
            .enter_scope(ScopeKind::TryCatch, Some(statement), None);
        if let Some(body) = raw.child_by_field_name("body") {
            let block = f.handle_block(body);
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Body, block);
        }
        let mut cursor = raw.walk();
        let clauses: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "except_clause")
            .collect();
        for clause in clauses {
            let catch = f.ctx.add(Node::statement(Statement::Catch), clause);
            f.ctx
                .cpg
                .scopes
                .enter_scope(ScopeKind::TryCatch, Some(catch), None);
            let mut clause_cursor = clause.walk();
            if let Some(body) = clause
                .named_children(&mut clause_cursor)
                .find(|c| c.kind() == "block")
            {
                let block = f.handle_block(body);
                f.ctx.cpg.graph.add_ast_child(catch, EdgeLabel::Body, block);
            }
            f.ctx.leave_scope(Some(catch));
            f.ctx
                .cpg
                .graph
                .add_ast_child(statement, EdgeLabel::Catches, catch);
        }
        f.ctx.leave_scope(Some(statement));
        Some(statement)
    });
    map.register("pass_statement", |f, raw| {
        Some(f.ctx.add(
            Node::statement(Statement::Unimplemented {
                raw_kind: "pass_statement".into(),
            }),
            raw,
        ))
    });
}

fn register_expressions(map: &mut HandlerMap<PythonFrontend>) {
    map.register("identifier", |f, raw| {
        let name = f.ctx.text(raw).to_string();
        Some(
            f.ctx
                .add(Node::expression(name, Expression::DeclaredReference), raw),
        )
    });
    map.register("integer", |f, raw| {
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
    map.register("float", |f, raw| {
        let text = f.ctx.text(raw).to_string();
        let mut node = Node::expression(
            text.clone(),
            Expression::Literal {
                value: LiteralValue::Float(text.parse::<f64>().unwrap_or(0.0)),
            },
        );
        node.ty = Type::object("float");
        Some(f.ctx.add(node, raw))
    });
    map.register("string", |f, raw| {
        let text = f.ctx.text(raw).to_string();
        let value = text.trim_matches(['"', '\'']).to_string();
        let mut node = Node::expression(
            text,
            Expression::Literal {
                value: LiteralValue::Str(value),
            },
        );
        node.ty = Type::object("str");
        Some(f.ctx.add(node, raw))
    });
    map.register("true", |f, raw| {
        let mut node = Node::expression(
            "True",
            Expression::Literal {
                value: LiteralValue::Bool(true),
            },
        );
        node.ty = Type::object("bool");
        Some(f.ctx.add(node, raw))
    });
    map.register("false", |f, raw| {
        let mut node = Node::expression(
            "False",
            Expression::Literal {
                value: LiteralValue::Bool(false),
            },
        );
        node.ty = Type::object("bool");
        Some(f.ctx.add(node, raw))
    });
    map.register("none", |f, raw| {
        Some(f.ctx.add(
            Node::expression(
                "None",
                Expression::Literal {
                    value: LiteralValue::Null,
                },
            ),
            raw,
        ))
    });
    map.register("call", |f, raw| {
        let function = raw.child_by_field_name("function")?;
        let call = if function.kind() == "attribute" {
            let member = function
                .child_by_field_name("attribute")
                .map(|a| f.ctx.text(a).to_string())
                .unwrap_or_default();
            let call = f
                .ctx
                .add(Node::expression(member, Expression::MemberCall), raw);
            if let Some(object) = function.child_by_field_name("object") {
                if let Some(base) = f.handle_expression(object) {
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
            let children: Vec<tree_sitter::Node> =
                arguments.named_children(&mut cursor).collect();
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
    map.register("attribute", |f, raw| {
        let name = raw
            .child_by_field_name("attribute")
            .map(|a| f.ctx.text(a).to_string())
            .unwrap_or_default();
        let member = f.ctx.add(Node::expression(name, Expression::Member), raw);
        if let Some(object) = raw.child_by_field_name("object") {
            if let Some(base) = f.handle_expression(object) {
                f.ctx.cpg.graph.add_ast_child(member, EdgeLabel::Base, base);
            }
        }
        Some(member)
    });
    map.register("binary_operator", python_binary);
    map.register("boolean_operator", python_binary);
    map.register("comparison_operator", python_comparison);
    map.register("unary_operator", |f, raw| {
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
        if let Some(argument) = raw.child_by_field_name("argument") {
            if let Some(operand) = f.handle_expression(argument) {
                f.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Operand, operand);
            }
        }
        Some(node)
    });
    map.register("not_operator", |f, raw| {
        let node = f.ctx.add(
            Node::expression(
                "not",
                Expression::UnaryOperator {
                    op: "not".to_string(),
                    is_postfix: false,
                },
            ),
            raw,
        );
        if let Some(argument) = raw.child_by_field_name("argument") {
            if let Some(operand) = f.handle_expression(argument) {
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
    map.register("subscript", |f, raw| {
        let node = f
            .ctx
            .add(Node::expression("", Expression::ArraySubscript), raw);
        if let Some(value) = raw.child_by_field_name("value") {
            if let Some(base) = f.handle_expression(value) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Base, base);
            }
        }
        if let Some(subscript) = raw.child_by_field_name("subscript") {
            if let Some(index) = f.handle_expression(subscript) {
                f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Index, index);
            }
        }
        Some(node)
    });
    map.register("conditional_expression", |f, raw| {
        // `a if cond else b`: named children in source order.
        let node = f.ctx.add(Node::expression("", Expression::Conditional), raw);
        let mut cursor = raw.walk();
        let children: Vec<tree_sitter::Node> = raw.named_children(&mut cursor).collect();
        let labels = [
            EdgeLabel::ThenBranch,
            EdgeLabel::Condition,
            EdgeLabel::ElseBranch,
        ];
        for (child, label) in children.into_iter().zip(labels) {
            if let Some(child) = f.handle_expression(child) {
                f.ctx.cpg.graph.add_ast_child(node, label, child);
            }
        }
        Some(node)
    });
}

/// A comparison carries its operators as `operators` field tokens between
/// the operands (`!=`, `<`, `is not`, `not in`, ...). Chained comparisons
/// like `a < b < c` fold left into nested binary operators, one per
/// operator token.
fn python_comparison(f: &mut PythonFrontend, raw: tree_sitter::Node) -> Option<NodeId> {
    let mut cursor = raw.walk();
    let operand_nodes: Vec<tree_sitter::Node> = raw.named_children(&mut cursor).collect();

    let mut op_cursor = raw.walk();
    let mut operators: Vec<String> = raw
        .children_by_field_name("operators", &mut op_cursor)
        .map(|o| f.ctx.text(o).to_string())
        .collect();
    if operators.is_empty() {
        // Older grammars expose the operators only as anonymous tokens.
        let mut scan = raw.walk();
        operators = raw
            .children(&mut scan)
            .filter(|c| !c.is_named())
            .map(|c| c.kind().to_string())
            .collect();
    }

    let mut operands = Vec::new();
    for operand in operand_nodes {
        if let Some(operand) = f.handle_expression(operand) {
            operands.push(operand);
        }
    }
    let mut lhs = *operands.first()?;
    if operands.len() == 1 {
        return Some(lhs);
    }
    for (index, rhs) in operands[1..].iter().enumerate() {
        let op = operators
            .get(index)
            .cloned()
            .unwrap_or_else(|| "==".to_string());
        let node = f.ctx.add(
            Node::expression(op.clone(), Expression::BinaryOperator { op }),
            raw,
        );
        f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Lhs, lhs);
        f.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Rhs, *rhs);
        lhs = node;
    }
    Some(lhs)
}

fn python_binary(f: &mut PythonFrontend, raw: tree_sitter::Node) -> Option<NodeId> {
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
}
