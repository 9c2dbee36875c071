//! Core data structures for the code property graph

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeId;
use crate::types::Type;

/// Stable identifier of a node. Identity is by allocation: two syntactically
/// equal literals are distinct nodes with distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Stable identifier of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u64);

/// Source region with 1-based lines and columns. `end_column` points one
/// past the last character of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Region {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// Where a node comes from: file plus region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalLocation {
    pub file: PathBuf,
    pub region: Region,
}

/// Languages with a registered frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    C,
    Cpp,
    Go,
    Python,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &PathBuf) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => Language::C,
            Some("cpp") | Some("cc") | Some("cxx") | Some("h") | Some("hpp") | Some("hh") => {
                Language::Cpp
            }
            Some("go") => Language::Go,
            Some("py") | Some("pyi") => Language::Python,
            _ => Language::Other,
        }
    }
}

/// What kind of record a RecordDeclaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Struct,
    Union,
    Class,
}

/// Constant values carried by literal expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Char(char),
    Null,
}

/// Declaration variants. Children (fields, parameters, bodies, …) hang off
/// the node via labeled AST edges; only scalar attributes live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    TranslationUnit,
    /// A resolved `#include` directive. The included file's declarations are
    /// spliced into the including translation unit.
    Include { target: Option<PathBuf> },
    Namespace,
    Record {
        kind: RecordKind,
        /// Superclass names as written in source; resolved to SuperRecord
        /// edges by the type resolver.
        superclass_names: Vec<String>,
    },
    Function {
        is_definition: bool,
        is_variadic: bool,
    },
    Method {
        record: Option<NodeId>,
        is_static: bool,
        is_variadic: bool,
    },
    Constructor { record: Option<NodeId> },
    Field,
    Variable,
    Parameter { is_variadic: bool },
    Enum,
    EnumConstant,
    Typedef { target: Type },
    /// Raw-AST kind the frontend had no handler for.
    Unimplemented { raw_kind: String },
}

/// Statement variants. Expressions may appear directly in statement
/// position; there is no wrapper variant for expression statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Block,
    If,
    While,
    For,
    ForEach,
    Switch,
    Case,
    Default,
    Return,
    Break,
    Continue,
    Try,
    Catch,
    DeclarationStmt,
    Unimplemented { raw_kind: String },
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal { value: LiteralValue },
    /// Unresolved identifier; usage resolution fills RefersTo edges.
    DeclaredReference,
    /// Field access; the accessed member's name is the node name, the base
    /// expression hangs off a Base edge.
    Member,
    /// Plain call; callee name as written (possibly qualified). Call
    /// resolution fills Invokes edges.
    Call { callee_name: String },
    /// Call through a base object; the member name is the node name.
    MemberCall,
    New,
    Construct { type_name: String },
    BinaryOperator { op: String },
    UnaryOperator { op: String, is_postfix: bool },
    Cast,
    ArraySubscript,
    Conditional,
    InitializerList,
    Unimplemented { raw_kind: String },
}

/// The tagged families sharing the Node envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    Declaration(Declaration),
    Statement(Statement),
    Expression(Expression),
}

/// Flat kind mirror used for filters and mismatch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Declarations
    TranslationUnit,
    Include,
    Namespace,
    Record,
    Function,
    Method,
    Constructor,
    Field,
    Variable,
    Parameter,
    Enum,
    EnumConstant,
    Typedef,
    UnimplementedDeclaration,
    // Statements
    Block,
    If,
    While,
    For,
    ForEach,
    Switch,
    Case,
    Default,
    Return,
    Break,
    Continue,
    Try,
    Catch,
    DeclarationStmt,
    UnimplementedStatement,
    // Expressions
    Literal,
    DeclaredReference,
    Member,
    Call,
    MemberCall,
    New,
    Construct,
    BinaryOperator,
    UnaryOperator,
    Cast,
    ArraySubscript,
    Conditional,
    InitializerList,
    UnimplementedExpression,
}

/// A single node in the code property graph. Shared attributes live on this
/// envelope; the variant-specific attributes live in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Simple name ("DoSomething"). Empty for unnamed nodes.
    pub name: String,
    /// Qualified name ("SomeClass::DoSomething") where one applies.
    pub qualified_name: String,
    /// The originating source substring.
    pub code: Option<String>,
    pub location: Option<PhysicalLocation>,
    /// Originating file, stamped by the filename-mapper pass.
    pub file: Option<PathBuf>,
    pub scope: Option<ScopeId>,
    pub language: Option<Language>,
    /// Static type; `Type::unknown()` where a type is meaningless.
    pub ty: Type,
    pub comment: Option<String>,
    /// True for synthesized nodes such as implicit default constructors.
    pub implicit: bool,
    /// Set by the resolution passes when a name found no target.
    pub unresolved: bool,
    pub data: NodeData,
}

impl Node {
    pub fn new(name: impl Into<String>, data: NodeData) -> Self {
        let name = name.into();
        Node {
            id: NodeId::default(),
            qualified_name: name.clone(),
            name,
            code: None,
            location: None,
            file: None,
            scope: None,
            language: None,
            ty: Type::unknown(),
            comment: None,
            implicit: false,
            unresolved: false,
            data,
        }
    }

    pub fn declaration(name: impl Into<String>, decl: Declaration) -> Self {
        Node::new(name, NodeData::Declaration(decl))
    }

    pub fn statement(stmt: Statement) -> Self {
        Node::new("", NodeData::Statement(stmt))
    }

    pub fn expression(name: impl Into<String>, expr: Expression) -> Self {
        Node::new(name, NodeData::Expression(expr))
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Declaration(d) => match d {
                Declaration::TranslationUnit => NodeKind::TranslationUnit,
                Declaration::Include { .. } => NodeKind::Include,
                Declaration::Namespace => NodeKind::Namespace,
                Declaration::Record { .. } => NodeKind::Record,
                Declaration::Function { .. } => NodeKind::Function,
                Declaration::Method { .. } => NodeKind::Method,
                Declaration::Constructor { .. } => NodeKind::Constructor,
                Declaration::Field => NodeKind::Field,
                Declaration::Variable => NodeKind::Variable,
                Declaration::Parameter { .. } => NodeKind::Parameter,
                Declaration::Enum => NodeKind::Enum,
                Declaration::EnumConstant => NodeKind::EnumConstant,
                Declaration::Typedef { .. } => NodeKind::Typedef,
                Declaration::Unimplemented { .. } => NodeKind::UnimplementedDeclaration,
            },
            NodeData::Statement(s) => match s {
                Statement::Block => NodeKind::Block,
                Statement::If => NodeKind::If,
                Statement::While => NodeKind::While,
                Statement::For => NodeKind::For,
                Statement::ForEach => NodeKind::ForEach,
                Statement::Switch => NodeKind::Switch,
                Statement::Case => NodeKind::Case,
                Statement::Default => NodeKind::Default,
                Statement::Return => NodeKind::Return,
                Statement::Break => NodeKind::Break,
                Statement::Continue => NodeKind::Continue,
                Statement::Try => NodeKind::Try,
                Statement::Catch => NodeKind::Catch,
                Statement::DeclarationStmt => NodeKind::DeclarationStmt,
                Statement::Unimplemented { .. } => NodeKind::UnimplementedStatement,
            },
            NodeData::Expression(e) => match e {
                Expression::Literal { .. } => NodeKind::Literal,
                Expression::DeclaredReference => NodeKind::DeclaredReference,
                Expression::Member => NodeKind::Member,
                Expression::Call { .. } => NodeKind::Call,
                Expression::MemberCall => NodeKind::MemberCall,
                Expression::New => NodeKind::New,
                Expression::Construct { .. } => NodeKind::Construct,
                Expression::BinaryOperator { .. } => NodeKind::BinaryOperator,
                Expression::UnaryOperator { .. } => NodeKind::UnaryOperator,
                Expression::Cast => NodeKind::Cast,
                Expression::ArraySubscript => NodeKind::ArraySubscript,
                Expression::Conditional => NodeKind::Conditional,
                Expression::InitializerList => NodeKind::InitializerList,
                Expression::Unimplemented { .. } => NodeKind::UnimplementedExpression,
            },
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.data, NodeData::Declaration(_))
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.data, NodeData::Expression(_))
    }

    /// Declarations that carry a value: variables, fields, parameters and
    /// enum constants. These are the legal targets of RefersTo edges.
    pub fn is_value_declaration(&self) -> bool {
        matches!(
            self.data,
            NodeData::Declaration(
                Declaration::Variable
                    | Declaration::Field
                    | Declaration::Parameter { .. }
                    | Declaration::EnumConstant
            )
        )
    }

    /// Functions, methods and constructors.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self.data,
            NodeData::Declaration(
                Declaration::Function { .. }
                    | Declaration::Method { .. }
                    | Declaration::Constructor { .. }
            )
        )
    }

    /// Rewrite the NodeId references embedded in the variant data and the
    /// type. Used when a per-frontend graph is absorbed into the shared
    /// one; `id` itself is assigned by the receiving graph.
    pub(crate) fn remap_ids(&mut self, map: &impl Fn(NodeId) -> NodeId) {
        match &mut self.data {
            NodeData::Declaration(Declaration::Method { record, .. })
            | NodeData::Declaration(Declaration::Constructor { record }) => {
                if let Some(r) = record {
                    *r = map(*r);
                }
            }
            NodeData::Declaration(Declaration::Typedef { target }) => target.remap_ids(map),
            _ => {}
        }
        self.ty.remap_ids(map);
    }
}

/// Labels on graph edges. AST labels span the syntax tree; the analysis
/// labels are added by the pass pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    // ── AST structure ───────────────────────────────────────
    Declarations,
    /// Translation unit to its Include declarations; includes sit beside
    /// the declaration list, not in it.
    Includes,
    Statements,
    Fields,
    Methods,
    Constructors,
    Records,
    Parameters,
    Body,
    Condition,
    ThenBranch,
    ElseBranch,
    Initializer,
    Iteration,
    Variable,
    Iterable,
    Arguments,
    Base,
    Lhs,
    Rhs,
    Operand,
    Index,
    Value,
    Cases,
    Catches,
    Elements,

    // ── Analysis results ────────────────────────────────────
    Eog,
    Dfg,
    RefersTo,
    Invokes,
    SuperRecord,
    Calls,
}

impl EdgeLabel {
    /// Whether this label is part of the syntax tree. AST edges define
    /// reachability from translation units.
    pub fn is_ast(self) -> bool {
        !matches!(
            self,
            EdgeLabel::Eog
                | EdgeLabel::Dfg
                | EdgeLabel::RefersTo
                | EdgeLabel::Invokes
                | EdgeLabel::SuperRecord
                | EdgeLabel::Calls
        )
    }
}

/// Secondary edge payload. `index` orders sibling edges where ordering is
/// semantically meaningful; `branch` marks branch outcomes on EOG edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EdgeProperties {
    pub index: Option<u32>,
    pub branch: Option<bool>,
}

impl EdgeProperties {
    pub fn indexed(index: u32) -> Self {
        EdgeProperties {
            index: Some(index),
            branch: None,
        }
    }

    pub fn branch(outcome: bool) -> Self {
        EdgeProperties {
            index: None,
            branch: Some(outcome),
        }
    }
}

/// A directed edge in the code property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub label: EdgeLabel,
    pub properties: EdgeProperties,
}

impl Edge {
    pub fn new(label: EdgeLabel) -> Self {
        Edge {
            label,
            properties: EdgeProperties::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mirrors_variant() {
        let record = Node::declaration(
            "S",
            Declaration::Record {
                kind: RecordKind::Struct,
                superclass_names: vec![],
            },
        );
        assert_eq!(record.kind(), NodeKind::Record);
        assert!(record.is_declaration());
        assert!(!record.is_value_declaration());

        let var = Node::declaration("x", Declaration::Variable);
        assert!(var.is_value_declaration());

        let call = Node::expression(
            "printf",
            Expression::Call {
                callee_name: "printf".into(),
            },
        );
        assert_eq!(call.kind(), NodeKind::Call);
    }

    #[test]
    fn ast_labels_partition() {
        assert!(EdgeLabel::Statements.is_ast());
        assert!(EdgeLabel::Arguments.is_ast());
        assert!(!EdgeLabel::Eog.is_ast());
        assert!(!EdgeLabel::RefersTo.is_ast());
    }

    #[test]
    fn language_detection() {
        let cases = vec![
            ("main.c", Language::C),
            ("main.cpp", Language::Cpp),
            ("lib.h", Language::Cpp),
            ("main.go", Language::Go),
            ("lib.py", Language::Python),
            ("unknown.xyz", Language::Other),
        ];
        for (file, expected) in cases {
            let path = PathBuf::from(file);
            assert_eq!(Language::from_path(&path), expected, "failed for {}", file);
        }
    }

    #[test]
    fn node_serialization_roundtrip() {
        let mut node = Node::declaration("x", Declaration::Variable);
        node.location = Some(PhysicalLocation {
            file: PathBuf::from("test.c"),
            region: Region {
                start_line: 1,
                start_column: 1,
                end_line: 1,
                end_column: 9,
            },
        });
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
