//! Arbor core — graph model, type system, scope manager and query surface

pub mod graph;
pub mod model;
pub mod query;
pub mod scope;
pub mod types;

pub use graph::{Cpg, CpgGraph};
pub use model::{
    Declaration, Edge, EdgeId, EdgeLabel, EdgeProperties, Expression, Language, LiteralValue,
    Node, NodeData, NodeId, NodeKind, PhysicalLocation, RecordKind, Region, Statement,
};
pub use query::{QueryError, body_statement_as, declaration_by_name, declarations_by_name};
pub use scope::{GLOBAL_SCOPE, Scope, ScopeError, ScopeId, ScopeKind, ScopeManager};
pub use types::{Qualifiers, Type, TypeAliasStore, TypeShape, is_compatible, parse, refresh};
