//! Declaration handlers: functions, records with member promotion,
//! variables, enums, typedefs, namespaces

use arbor_core::{
    Declaration, EdgeLabel, Node, NodeData, NodeId, RecordKind, ScopeKind, Type, types,
};

use super::CxxFrontend;
use crate::frontend::HandlerMap;

pub(super) fn register(map: &mut HandlerMap<CxxFrontend, Vec<NodeId>>) {
    map.register("comment", |f, raw| {
        f.ctx.stash_comment(raw);
        Vec::new()
    });
    map.register("preproc_include", CxxFrontend::handle_include);
    map.register("function_definition", CxxFrontend::decl_function);
    map.register("declaration", CxxFrontend::declaration_parts);
    map.register("field_declaration", CxxFrontend::declaration_parts);
    map.register("class_specifier", CxxFrontend::decl_record);
    map.register("struct_specifier", CxxFrontend::decl_record);
    map.register("union_specifier", CxxFrontend::decl_record);
    map.register("enum_specifier", CxxFrontend::decl_enum);
    map.register("type_definition", CxxFrontend::decl_typedef);
    map.register("namespace_definition", CxxFrontend::decl_namespace);
}

/// What a declarator subtree contributes: the declared name, the wrapper
/// stack around the base type, and the parameter list if it declares a
/// function. A pointer underneath the function declarator means a
/// function-pointer variable, not a function.
#[derive(Default)]
pub(super) struct DeclaratorInfo<'t> {
    pub name: String,
    pub pointer_depth: usize,
    pub is_reference: bool,
    pub arrays: Vec<Option<u64>>,
    pub parameters: Option<tree_sitter::Node<'t>>,
    pub inner_pointer: bool,
    pub initializer: Option<tree_sitter::Node<'t>>,
}

impl CxxFrontend {
    pub(super) fn analyze_declarator<'t>(
        &self,
        node: tree_sitter::Node<'t>,
        info: &mut DeclaratorInfo<'t>,
        in_function: bool,
    ) {
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
            | "destructor_name" | "operator_name" => {
                info.name = self.ctx.text(node).to_string();
            }
            "pointer_declarator" | "abstract_pointer_declarator" => {
                if in_function {
                    info.inner_pointer = true;
                } else {
                    info.pointer_depth += 1;
                }
                if let Some(inner) = node
                    .child_by_field_name("declarator")
                    .or_else(|| node.named_child(0))
                {
                    self.analyze_declarator(inner, info, in_function);
                }
            }
            "reference_declarator" => {
                info.is_reference = true;
                if let Some(inner) = node.named_child(0) {
                    self.analyze_declarator(inner, info, in_function);
                }
            }
            "array_declarator" => {
                let length = node
                    .child_by_field_name("size")
                    .and_then(|s| self.ctx.text(s).trim().parse::<u64>().ok());
                info.arrays.push(length);
                if let Some(inner) = node.child_by_field_name("declarator") {
                    self.analyze_declarator(inner, info, in_function);
                }
            }
            "function_declarator" | "abstract_function_declarator" => {
                if info.parameters.is_none() {
                    info.parameters = node.child_by_field_name("parameters");
                }
                if let Some(inner) = node.child_by_field_name("declarator") {
                    self.analyze_declarator(inner, info, true);
                }
            }
            "parenthesized_declarator" | "init_declarator" => {
                if node.kind() == "init_declarator" {
                    info.initializer = node.child_by_field_name("value");
                }
                if let Some(inner) = node
                    .child_by_field_name("declarator")
                    .or_else(|| node.named_child(0))
                {
                    self.analyze_declarator(inner, info, in_function);
                }
            }
            _ => {}
        }
    }

    /// Assemble a value type from the base type text and the declarator's
    /// wrapper stack.
    fn value_type(&self, type_text: &str, info: &DeclaratorInfo) -> Type {
        if let Some(parameters) = info.parameters {
            if info.inner_pointer {
                let parameter_types = self.parameter_types(parameters);
                let return_type = self.wrapped_base(type_text, info.pointer_depth);
                return Type::pointer_to(Type::function(parameter_types, return_type));
            }
        }
        let mut ty = self.wrapped_base(type_text, info.pointer_depth);
        for length in info.arrays.iter().rev() {
            ty = Type {
                qualifiers: Default::default(),
                shape: arbor_core::TypeShape::Array {
                    element: Box::new(ty),
                    length: *length,
                },
            };
        }
        if info.is_reference {
            ty = Type::reference_to(ty);
        }
        ty
    }

    fn wrapped_base(&self, type_text: &str, pointer_depth: usize) -> Type {
        let mut ty = types::parse(type_text, true, &self.ctx.cpg.aliases);
        for _ in 0..pointer_depth {
            ty = Type::pointer_to(ty);
        }
        ty
    }

    fn parameter_types(&self, parameter_list: tree_sitter::Node) -> Vec<Type> {
        let mut cursor = parameter_list.walk();
        let parameters: Vec<tree_sitter::Node> =
            parameter_list.named_children(&mut cursor).collect();
        parameters
            .into_iter()
            .filter(|p| p.kind() == "parameter_declaration")
            .map(|p| {
                let type_text = p
                    .child_by_field_name("type")
                    .map(|t| self.ctx.text(t).to_string())
                    .unwrap_or_default();
                let mut info = DeclaratorInfo::default();
                if let Some(declarator) = p.child_by_field_name("declarator") {
                    self.analyze_declarator(declarator, &mut info, false);
                }
                self.value_type(&type_text, &info)
            })
            .collect()
    }

    /// A `function_definition` node: free function, inline method, or an
    /// out-of-line qualified member definition.
    fn decl_function(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let type_text = raw
            .child_by_field_name("type")
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();
        let Some(declarator) = raw.child_by_field_name("declarator") else {
            return Vec::new();
        };
        let mut info = DeclaratorInfo::default();
        self.analyze_declarator(declarator, &mut info, false);
        let body = raw.child_by_field_name("body");
        self.build_function(raw, &type_text, info, body)
    }

    /// Shared between definitions and prototypes. Returns the final node
    /// after any out-of-line promotion.
    fn build_function(
        &mut self,
        raw: tree_sitter::Node,
        type_text: &str,
        info: DeclaratorInfo,
        body: Option<tree_sitter::Node>,
    ) -> Vec<NodeId> {
        let full_name = if info.name.is_empty() {
            // Constructor-style prototypes have no declarator name; the
            // type text carries it.
            type_text.to_string()
        } else {
            info.name.clone()
        };
        let simple = full_name
            .rsplit("::")
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();

        let is_variadic = info.parameters.is_some_and(|p| {
            let mut cursor = p.walk();
            p.children(&mut cursor)
                .any(|c| c.kind() == "..." || c.kind() == "variadic_parameter")
        });

        let node = Node::declaration(
            simple.clone(),
            Declaration::Function {
                is_definition: body.is_some(),
                is_variadic,
            },
        );
        let return_type = self.wrapped_base(type_text, info.pointer_depth);
        let function = self.ctx.add(node, raw);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, function);

        self.enter_scope(ScopeKind::Function, Some(function), None);
        let mut parameter_types = Vec::new();
        if let Some(parameters) = info.parameters {
            parameter_types = self.build_parameters(function, parameters, is_variadic);
        }
        if let Some(body) = body {
            if let Some(block) = self.handle_statement(body) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(function, EdgeLabel::Body, block);
            }
        }
        self.ctx.leave_scope(Some(function));

        if let Some(stored) = self.ctx.cpg.graph.node_mut(function) {
            stored.ty = Type::function(parameter_types, return_type);
        }

        // Out-of-line member definition: `SomeClass::DoSomething`.
        if full_name.contains("::") {
            let prefix = full_name.rsplit_once("::").map(|(p, _)| p).unwrap_or("");
            if let Some(scope) = self.ctx.cpg.scopes.find_container_scope(prefix) {
                let record_scope = self.ctx.cpg.scopes.scope(scope);
                if record_scope.kind == ScopeKind::Record {
                    if let Some(record) = record_scope.ast_node {
                        let record_name = record_scope.name.clone().unwrap_or_default();
                        let promoted =
                            self.promote_function(function, record, &record_name, &full_name);
                        return vec![promoted];
                    }
                }
            }
        }
        vec![function]
    }

    fn build_parameters(
        &mut self,
        function: NodeId,
        parameter_list: tree_sitter::Node,
        is_variadic: bool,
    ) -> Vec<Type> {
        let mut cursor = parameter_list.walk();
        let children: Vec<tree_sitter::Node> =
            parameter_list.named_children(&mut cursor).collect();
        let mut parameter_types = Vec::new();
        for child in children {
            if child.kind() != "parameter_declaration" {
                continue;
            }
            let type_text = child
                .child_by_field_name("type")
                .map(|t| self.ctx.text(t).to_string())
                .unwrap_or_default();
            let mut info = DeclaratorInfo::default();
            if let Some(declarator) = child.child_by_field_name("declarator") {
                self.analyze_declarator(declarator, &mut info, false);
            }
            // `void` as the whole parameter list declares zero parameters.
            if type_text == "void" && info.name.is_empty() && info.pointer_depth == 0 {
                continue;
            }
            let ty = self.value_type(&type_text, &info);
            parameter_types.push(ty.clone());
            let mut node = Node::declaration(
                info.name.clone(),
                Declaration::Parameter { is_variadic: false },
            );
            node.ty = ty;
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
        if is_variadic {
            let mut marker =
                Node::declaration("...", Declaration::Parameter { is_variadic: true });
            marker.implicit = true;
            let marker = self.ctx.add(marker, parameter_list);
            self.ctx
                .cpg
                .graph
                .add_ast_child(function, EdgeLabel::Parameters, marker);
        }
        parameter_types
    }

    /// The reparenting step: retire a parsed FunctionDeclaration and stand
    /// up a Method or Constructor in its place, moving the children over.
    fn promote_function(
        &mut self,
        function: NodeId,
        record: NodeId,
        record_name: &str,
        qualified: &str,
    ) -> NodeId {
        let Some(old) = self.ctx.cpg.graph.node(function).cloned() else {
            return function;
        };
        let mut replacement = old.clone();
        replacement.qualified_name = qualified.to_string();
        let variadic = matches!(
            old.data,
            NodeData::Declaration(Declaration::Function {
                is_variadic: true,
                ..
            })
        );
        if old.name == record_name {
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
                is_variadic: variadic,
            });
        }
        let promoted = self.ctx.cpg.graph.add_node(replacement);
        self.ctx.cpg.graph.transfer_outgoing_edges(function, promoted);
        self.ctx.cpg.graph.transfer_incoming_edges(function, promoted);
        self.ctx.cpg.graph.disconnect_from_graph(function);
        self.ctx.cpg.scopes.remove_declaration(function);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, promoted);
        promoted
    }

    /// A `declaration`/`field_declaration` node: variables, prototypes,
    /// function pointers, possibly several declarators, possibly with an
    /// inline record definition as its type.
    pub(super) fn declaration_parts(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let mut produced = Vec::new();
        let type_node = raw.child_by_field_name("type");
        let mut type_text = type_node
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();

        // `struct S { ... } s;`: the record is its own declaration.
        if let Some(type_node) = type_node {
            if matches!(
                type_node.kind(),
                "class_specifier" | "struct_specifier" | "union_specifier"
            ) && type_node.child_by_field_name("body").is_some()
            {
                let record = self.decl_record(type_node);
                if let Some(first) = record.first() {
                    if let Some(node) = self.ctx.cpg.graph.node(*first) {
                        type_text = node.name.clone();
                    }
                }
                produced.extend(record);
            } else if type_node.kind() == "enum_specifier"
                && type_node.child_by_field_name("body").is_some()
            {
                let parsed = self.decl_enum(type_node);
                if let Some(first) = parsed.first() {
                    if let Some(node) = self.ctx.cpg.graph.node(*first) {
                        type_text = node.name.clone();
                    }
                }
                produced.extend(parsed);
            }
        }

        let mut cursor = raw.walk();
        let declarators: Vec<tree_sitter::Node> = raw
            .named_children(&mut cursor)
            .filter(|c| {
                Some(c.id()) != type_node.map(|t| t.id())
                    && matches!(
                        c.kind(),
                        "init_declarator"
                            | "function_declarator"
                            | "abstract_function_declarator"
                            | "pointer_declarator"
                            | "array_declarator"
                            | "reference_declarator"
                            | "parenthesized_declarator"
                            | "identifier"
                            | "field_identifier"
                    )
            })
            .collect();

        // A bare `SomeClass();` prototype has no declarator at all.
        if declarators.is_empty() {
            let mut scan = raw.walk();
            let has_parameters = raw
                .children(&mut scan)
                .any(|c| c.kind() == "parameter_list");
            if has_parameters && !type_text.is_empty() {
                let mut info = DeclaratorInfo::default();
                let mut scan = raw.walk();
                info.parameters = raw
                    .children(&mut scan)
                    .find(|c| c.kind() == "parameter_list");
                produced.extend(self.build_function(raw, &type_text, info, None));
            }
            return produced;
        }

        for declarator in declarators {
            let mut info = DeclaratorInfo::default();
            self.analyze_declarator(declarator, &mut info, false);

            if info.parameters.is_some() && !info.inner_pointer {
                produced.extend(self.build_function(raw, &type_text, info, None));
                continue;
            }

            let ty = self.value_type(&type_text, &info);
            let mut node = Node::declaration(info.name.clone(), Declaration::Variable);
            node.ty = ty;
            let variable = self.ctx.add(node, declarator);
            self.ctx
                .cpg
                .scopes
                .add_declaration(&mut self.ctx.cpg.graph, variable);
            if let Some(initializer) = info.initializer {
                if let Some(value) = self.handle_expression(initializer) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(variable, EdgeLabel::Initializer, value);
                }
            }
            produced.push(variable);
        }
        produced
    }

    fn decl_record(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let kind = match raw.kind() {
            "class_specifier" => RecordKind::Class,
            "union_specifier" => RecordKind::Union,
            _ => RecordKind::Struct,
        };
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();

        let mut superclass_names = Vec::new();
        let mut cursor = raw.walk();
        if let Some(bases) = raw
            .children(&mut cursor)
            .find(|c| c.kind() == "base_class_clause")
        {
            let mut base_cursor = bases.walk();
            for base in bases.named_children(&mut base_cursor) {
                if matches!(base.kind(), "type_identifier" | "qualified_identifier") {
                    superclass_names.push(self.ctx.text(base).to_string());
                }
            }
        }

        let record = self.ctx.add(
            Node::declaration(
                name.clone(),
                Declaration::Record {
                    kind,
                    superclass_names,
                },
            ),
            raw,
        );
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, record);

        let Some(body) = raw.child_by_field_name("body") else {
            return vec![record];
        };

        self.enter_scope(ScopeKind::Record, Some(record), Some(name.clone()));
        let mut constructors = 0usize;
        let mut body_cursor = body.walk();
        let members: Vec<tree_sitter::Node> = body.named_children(&mut body_cursor).collect();
        for member in members {
            match member.kind() {
                "comment" => self.ctx.stash_comment(member),
                "access_specifier" => {}
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    for nested in self.decl_record(member) {
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(record, EdgeLabel::Records, nested);
                    }
                }
                _ => {
                    for id in self.handle_declaration(member) {
                        let (label, adopted) = self.adopt_member(record, &name, id);
                        if label == EdgeLabel::Constructors {
                            constructors += 1;
                        }
                        self.ctx.cpg.graph.add_ast_child(record, label, adopted);
                        // Member prototypes begin life as free function
                        // declarations; the promotion rewires them into the
                        // record but they stay listed on the unit.
                        if matches!(label, EdgeLabel::Methods | EdgeLabel::Constructors) {
                            self.ctx.cpg.graph.add_ast_child(
                                self.unit,
                                EdgeLabel::Declarations,
                                adopted,
                            );
                        }
                    }
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
        vec![record]
    }

    /// Record-member promotion: functions become methods or constructors,
    /// variables become fields. Returns the member's edge label and the
    /// node to attach, which differs from the input when promotion retired
    /// the parsed node.
    fn adopt_member(
        &mut self,
        record: NodeId,
        record_name: &str,
        member: NodeId,
    ) -> (EdgeLabel, NodeId) {
        let Some(node) = self.ctx.cpg.graph.node(member) else {
            return (EdgeLabel::Declarations, member);
        };
        match &node.data {
            NodeData::Declaration(Declaration::Function { .. }) => {
                let qualified = format!("{}::{}", record_name, node.name);
                let is_constructor = node.name == record_name;
                let promoted = self.promote_function(member, record, record_name, &qualified);
                if is_constructor {
                    (EdgeLabel::Constructors, promoted)
                } else {
                    (EdgeLabel::Methods, promoted)
                }
            }
            NodeData::Declaration(Declaration::Variable) => {
                let mut replacement = node.clone();
                replacement.data = NodeData::Declaration(Declaration::Field);
                replacement.qualified_name = format!("{}::{}", record_name, node.name);
                let field = self.ctx.cpg.graph.add_node(replacement);
                self.ctx.cpg.graph.transfer_outgoing_edges(member, field);
                self.ctx.cpg.graph.transfer_incoming_edges(member, field);
                self.ctx.cpg.graph.disconnect_from_graph(member);
                self.ctx.cpg.scopes.remove_declaration(member);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, field);
                (EdgeLabel::Fields, field)
            }
            NodeData::Declaration(Declaration::Method { .. }) => (EdgeLabel::Methods, member),
            NodeData::Declaration(Declaration::Constructor { .. }) => {
                (EdgeLabel::Constructors, member)
            }
            NodeData::Declaration(Declaration::Field) => (EdgeLabel::Fields, member),
            NodeData::Declaration(Declaration::Record { .. }) => (EdgeLabel::Records, member),
            _ => (EdgeLabel::Declarations, member),
        }
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
        node.qualified_name = format!("{}::{}", record_name, record_name);
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

    fn decl_enum(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();
        let enum_node = self
            .ctx
            .add(Node::declaration(name.clone(), Declaration::Enum), raw);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, enum_node);

        if let Some(body) = raw.child_by_field_name("body") {
            let mut cursor = body.walk();
            let enumerators: Vec<tree_sitter::Node> = body
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "enumerator")
                .collect();
            for enumerator in enumerators {
                let constant_name = enumerator
                    .child_by_field_name("name")
                    .map(|n| self.ctx.text(n).to_string())
                    .unwrap_or_default();
                let mut node =
                    Node::declaration(constant_name, Declaration::EnumConstant);
                if !name.is_empty() {
                    node.ty = Type::object(name.clone());
                }
                let constant = self.ctx.add(node, enumerator);
                self.ctx
                    .cpg
                    .scopes
                    .add_declaration(&mut self.ctx.cpg.graph, constant);
                if let Some(value) = enumerator.child_by_field_name("value") {
                    if let Some(value) = self.handle_expression(value) {
                        self.ctx
                            .cpg
                            .graph
                            .add_ast_child(constant, EdgeLabel::Initializer, value);
                    }
                }
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(enum_node, EdgeLabel::Declarations, constant);
            }
        }
        vec![enum_node]
    }

    fn decl_typedef(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let type_text = raw
            .child_by_field_name("type")
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();
        let Some(declarator) = raw.child_by_field_name("declarator") else {
            return Vec::new();
        };
        let mut info = DeclaratorInfo::default();
        self.analyze_declarator(declarator, &mut info, false);
        let target = self.value_type(&type_text, &info);

        let mut node = Node::declaration(
            info.name.clone(),
            Declaration::Typedef {
                target: target.clone(),
            },
        );
        node.ty = target.clone();
        let typedef = self.ctx.add(node, raw);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, typedef);
        if !info.name.is_empty() {
            self.ctx.cpg.aliases.register(info.name.clone(), target);
        }
        vec![typedef]
    }

    fn decl_namespace(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let name = raw
            .child_by_field_name("name")
            .map(|n| self.ctx.text(n).to_string())
            .unwrap_or_default();
        let namespace = self
            .ctx
            .add(Node::declaration(name.clone(), Declaration::Namespace), raw);
        self.ctx
            .cpg
            .scopes
            .add_declaration(&mut self.ctx.cpg.graph, namespace);

        if let Some(body) = raw.child_by_field_name("body") {
            self.enter_scope(ScopeKind::Namespace, Some(namespace), Some(name));
            let mut cursor = body.walk();
            let children: Vec<tree_sitter::Node> = body.named_children(&mut cursor).collect();
            for child in children {
                for declaration in self.handle_declaration(child) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(namespace, EdgeLabel::Declarations, declaration);
                }
            }
            self.ctx.leave_scope(Some(namespace));
        }
        vec![namespace]
    }
}
