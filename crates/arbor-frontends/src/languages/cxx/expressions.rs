//! Expression handlers

use arbor_core::{EdgeLabel, Expression, LiteralValue, Node, NodeId, Type, types};

use super::CxxFrontend;
use crate::frontend::HandlerMap;

pub(super) fn register(map: &mut HandlerMap<CxxFrontend>) {
    map.register("identifier", CxxFrontend::expr_reference);
    map.register("field_identifier", CxxFrontend::expr_reference);
    map.register("qualified_identifier", CxxFrontend::expr_reference);
    map.register("this", CxxFrontend::expr_reference);
    map.register("number_literal", CxxFrontend::expr_number);
    map.register("string_literal", CxxFrontend::expr_string);
    map.register("concatenated_string", CxxFrontend::expr_string);
    map.register("char_literal", CxxFrontend::expr_char);
    map.register("true", CxxFrontend::expr_bool);
    map.register("false", CxxFrontend::expr_bool);
    map.register("null", CxxFrontend::expr_null);
    map.register("nullptr", CxxFrontend::expr_null);
    map.register("call_expression", CxxFrontend::expr_call);
    map.register("field_expression", CxxFrontend::expr_member);
    map.register("assignment_expression", CxxFrontend::expr_binary);
    map.register("binary_expression", CxxFrontend::expr_binary);
    map.register("unary_expression", CxxFrontend::expr_unary);
    map.register("pointer_expression", CxxFrontend::expr_unary);
    map.register("update_expression", CxxFrontend::expr_update);
    map.register("cast_expression", CxxFrontend::expr_cast);
    map.register("subscript_expression", CxxFrontend::expr_subscript);
    map.register("conditional_expression", CxxFrontend::expr_conditional);
    map.register("initializer_list", CxxFrontend::expr_initializer_list);
    map.register("parenthesized_expression", CxxFrontend::expr_parenthesized);
    map.register("new_expression", CxxFrontend::expr_new);
    map.register("sizeof_expression", CxxFrontend::expr_sizeof);
}

impl CxxFrontend {
    fn expr_reference(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let name = self.ctx.text(raw).to_string();
        let mut node = Node::expression(name.clone(), Expression::DeclaredReference);
        node.qualified_name = name;
        Some(self.ctx.add(node, raw))
    }

    fn expr_number(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let text = self.ctx.text(raw).to_string();
        let trimmed = text
            .trim_end_matches(|c: char| matches!(c, 'f' | 'F' | 'l' | 'L' | 'u' | 'U'));
        let (value, ty) = if trimmed.contains('.')
            || (trimmed.contains(['e', 'E']) && !trimmed.starts_with("0x"))
        {
            (
                LiteralValue::Float(trimmed.parse::<f64>().unwrap_or(0.0)),
                Type::object("double"),
            )
        } else {
            let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).unwrap_or(0)
            } else {
                trimmed.parse::<i64>().unwrap_or(0)
            };
            (LiteralValue::Int(parsed), Type::object("int"))
        };
        let mut node = Node::expression(text, Expression::Literal { value });
        node.ty = ty;
        Some(self.ctx.add(node, raw))
    }

    fn expr_string(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let text = self.ctx.text(raw).to_string();
        let value = text.trim_matches('"').to_string();
        let mut node = Node::expression(
            text,
            Expression::Literal {
                value: LiteralValue::Str(value),
            },
        );
        let mut char_type = Type::object("char");
        char_type.qualifiers.is_const = true;
        node.ty = Type::pointer_to(char_type);
        Some(self.ctx.add(node, raw))
    }

    fn expr_char(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let text = self.ctx.text(raw).to_string();
        let value = text.trim_matches('\'').chars().next().unwrap_or('\0');
        let mut node = Node::expression(
            text,
            Expression::Literal {
                value: LiteralValue::Char(value),
            },
        );
        node.ty = Type::object("char");
        Some(self.ctx.add(node, raw))
    }

    fn expr_bool(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let text = self.ctx.text(raw).to_string();
        let mut node = Node::expression(
            text.clone(),
            Expression::Literal {
                value: LiteralValue::Bool(text == "true"),
            },
        );
        node.ty = Type::object("bool");
        Some(self.ctx.add(node, raw))
    }

    fn expr_null(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let mut node = Node::expression(
            self.ctx.text(raw).to_string(),
            Expression::Literal {
                value: LiteralValue::Null,
            },
        );
        node.ty = Type::pointer_to(Type::void());
        Some(self.ctx.add(node, raw))
    }

    /// `f(a)` is a plain call; `o.m(a)` and `o->m(a)` are member calls with
    /// the field expression folded into the call node.
    fn expr_call(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let function = raw.child_by_field_name("function")?;
        let call = if function.kind() == "field_expression" {
            let member_name = function
                .child_by_field_name("field")
                .map(|f| self.ctx.text(f).to_string())
                .unwrap_or_default();
            let call = self
                .ctx
                .add(Node::expression(member_name, Expression::MemberCall), raw);
            if let Some(base) = function.child_by_field_name("argument") {
                if let Some(base) = self.handle_expression(base) {
                    self.ctx.cpg.graph.add_ast_child(call, EdgeLabel::Base, base);
                }
            }
            call
        } else {
            let callee_name = self.ctx.text(function).to_string();
            self.ctx.add(
                Node::expression(
                    callee_name.clone(),
                    Expression::Call { callee_name },
                ),
                raw,
            )
        };
        if let Some(arguments) = raw.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            let children: Vec<tree_sitter::Node> =
                arguments.named_children(&mut cursor).collect();
            for argument in children {
                if argument.kind() == "comment" {
                    self.ctx.stash_comment(argument);
                    continue;
                }
                if let Some(argument) = self.handle_expression(argument) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(call, EdgeLabel::Arguments, argument);
                }
            }
        }
        Some(call)
    }

    fn expr_member(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let name = raw
            .child_by_field_name("field")
            .map(|f| self.ctx.text(f).to_string())
            .unwrap_or_default();
        let member = self.ctx.add(Node::expression(name, Expression::Member), raw);
        if let Some(base) = raw.child_by_field_name("argument") {
            if let Some(base) = self.handle_expression(base) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(member, EdgeLabel::Base, base);
            }
        }
        Some(member)
    }

    fn expr_binary(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let op = raw
            .child_by_field_name("operator")
            .map(|o| self.ctx.text(o).to_string())
            .unwrap_or_else(|| "=".to_string());
        let node = self.ctx.add(
            Node::expression(op.clone(), Expression::BinaryOperator { op }),
            raw,
        );
        if let Some(lhs) = raw.child_by_field_name("left") {
            if let Some(lhs) = self.handle_expression(lhs) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Lhs, lhs);
            }
        }
        if let Some(rhs) = raw.child_by_field_name("right") {
            if let Some(rhs) = self.handle_expression(rhs) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Rhs, rhs);
            }
        }
        Some(node)
    }

    fn expr_unary(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let op = raw
            .child_by_field_name("operator")
            .map(|o| self.ctx.text(o).to_string())
            .unwrap_or_default();
        let node = self.ctx.add(
            Node::expression(
                op.clone(),
                Expression::UnaryOperator {
                    op,
                    is_postfix: false,
                },
            ),
            raw,
        );
        if let Some(operand) = raw.child_by_field_name("argument") {
            if let Some(operand) = self.handle_expression(operand) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Operand, operand);
            }
        }
        Some(node)
    }

    /// `++i` and `i++`: postfix when the operator trails the operand.
    fn expr_update(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let operator = raw.child_by_field_name("operator");
        let argument = raw.child_by_field_name("argument");
        let is_postfix = match (operator, argument) {
            (Some(op), Some(arg)) => op.start_byte() > arg.start_byte(),
            _ => false,
        };
        let op = operator
            .map(|o| self.ctx.text(o).to_string())
            .unwrap_or_default();
        let node = self.ctx.add(
            Node::expression(op.clone(), Expression::UnaryOperator { op, is_postfix }),
            raw,
        );
        if let Some(argument) = argument {
            if let Some(operand) = self.handle_expression(argument) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Operand, operand);
            }
        }
        Some(node)
    }

    fn expr_cast(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let type_text = raw
            .child_by_field_name("type")
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();
        let mut node = Node::expression(type_text.clone(), Expression::Cast);
        node.ty = types::parse(&type_text, true, &self.ctx.cpg.aliases);
        let cast = self.ctx.add(node, raw);
        if let Some(value) = raw.child_by_field_name("value") {
            if let Some(operand) = self.handle_expression(value) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(cast, EdgeLabel::Operand, operand);
            }
        }
        Some(cast)
    }

    fn expr_subscript(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let node = self
            .ctx
            .add(Node::expression("", Expression::ArraySubscript), raw);
        if let Some(base) = raw.child_by_field_name("argument") {
            if let Some(base) = self.handle_expression(base) {
                self.ctx.cpg.graph.add_ast_child(node, EdgeLabel::Base, base);
            }
        }
        if let Some(index) = raw
            .child_by_field_name("index")
            .or_else(|| raw.child_by_field_name("indices"))
        {
            if let Some(index) = self.handle_expression(index) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Index, index);
            }
        }
        Some(node)
    }

    fn expr_conditional(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let node = self
            .ctx
            .add(Node::expression("", Expression::Conditional), raw);
        if let Some(condition) = raw.child_by_field_name("condition") {
            if let Some(condition) = self.handle_expression(condition) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Condition, condition);
            }
        }
        if let Some(consequence) = raw.child_by_field_name("consequence") {
            if let Some(consequence) = self.handle_expression(consequence) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::ThenBranch, consequence);
            }
        }
        if let Some(alternative) = raw.child_by_field_name("alternative") {
            if let Some(alternative) = self.handle_expression(alternative) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::ElseBranch, alternative);
            }
        }
        Some(node)
    }

    fn expr_initializer_list(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let node = self
            .ctx
            .add(Node::expression("", Expression::InitializerList), raw);
        let mut cursor = raw.walk();
        let children: Vec<tree_sitter::Node> = raw.named_children(&mut cursor).collect();
        for child in children {
            if let Some(element) = self.handle_expression(child) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(node, EdgeLabel::Elements, element);
            }
        }
        Some(node)
    }

    /// Parentheses leave no node of their own.
    fn expr_parenthesized(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let inner = raw.named_child(0)?;
        self.handle_expression(inner)
    }

    /// `new T(args)` wraps a construct expression.
    fn expr_new(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let type_name = raw
            .child_by_field_name("type")
            .map(|t| self.ctx.text(t).to_string())
            .unwrap_or_default();
        let new_node = self.ctx.add(
            Node::expression(type_name.clone(), Expression::New),
            raw,
        );
        let mut construct = Node::expression(
            type_name.clone(),
            Expression::Construct {
                type_name: type_name.clone(),
            },
        );
        construct.ty = types::parse(&type_name, true, &self.ctx.cpg.aliases);
        let construct = self.ctx.add(construct, raw);
        if let Some(arguments) = raw.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            let children: Vec<tree_sitter::Node> =
                arguments.named_children(&mut cursor).collect();
            for argument in children {
                if let Some(argument) = self.handle_expression(argument) {
                    self.ctx
                        .cpg
                        .graph
                        .add_ast_child(construct, EdgeLabel::Arguments, argument);
                }
            }
        }
        self.ctx
            .cpg
            .graph
            .add_ast_child(new_node, EdgeLabel::Initializer, construct);
        if let Some(node) = self.ctx.cpg.graph.node_mut(new_node) {
            node.ty = Type::pointer_to(types::parse(&type_name, true, &self.ctx.cpg.aliases));
        }
        Some(new_node)
    }

    fn expr_sizeof(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        let mut node = Node::expression(
            "sizeof",
            Expression::UnaryOperator {
                op: "sizeof".into(),
                is_postfix: false,
            },
        );
        node.ty = Type::object("unsigned long");
        let sizeof_node = self.ctx.add(node, raw);
        if let Some(value) = raw.child_by_field_name("value") {
            if let Some(operand) = self.handle_expression(value) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(sizeof_node, EdgeLabel::Operand, operand);
            }
        }
        Some(sizeof_node)
    }
}
