//! Read-only query surface over a finished graph

use thiserror::Error;

use crate::graph::Cpg;
use crate::model::{EdgeLabel, NodeId, NodeKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("expected a {expected:?} but found a {actual:?}")]
    TypeMismatch { expected: NodeKind, actual: NodeKind },
    #[error("statement index {index} out of bounds for a body of {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("node has no body")]
    NoBody,
}

/// All declarations in `unit`'s subtree whose simple name is `name` and
/// whose kind is in `kinds`. An empty kind set matches every declaration.
pub fn declarations_by_name(
    cpg: &Cpg,
    unit: NodeId,
    name: &str,
    kinds: &[NodeKind],
) -> Vec<NodeId> {
    cpg.graph
        .ast_descendants(unit)
        .into_iter()
        .filter(|id| {
            cpg.graph.node(*id).is_some_and(|n| {
                n.is_declaration()
                    && n.name == name
                    && (kinds.is_empty() || kinds.contains(&n.kind()))
            })
        })
        .collect()
}

/// The first declaration named `name` of one of `kinds`, if any.
pub fn declaration_by_name(
    cpg: &Cpg,
    unit: NodeId,
    name: &str,
    kinds: &[NodeKind],
) -> Option<NodeId> {
    declarations_by_name(cpg, unit, name, kinds).into_iter().next()
}

/// The i-th statement of a function body, checked against the requested
/// kind. Fails with TypeMismatch when the statement is of another kind.
pub fn body_statement_as(
    cpg: &Cpg,
    function: NodeId,
    index: usize,
    expected: NodeKind,
) -> Result<NodeId, QueryError> {
    let body = cpg
        .graph
        .target(function, EdgeLabel::Body)
        .ok_or(QueryError::NoBody)?;
    let statements = cpg.graph.targets(body, EdgeLabel::Statements);
    let statement = statements
        .get(index)
        .copied()
        .ok_or(QueryError::OutOfBounds {
            index,
            len: statements.len(),
        })?;
    let actual = cpg
        .graph
        .node(statement)
        .map(|n| n.kind())
        .expect("statement edge targets a live node");
    if actual != expected {
        return Err(QueryError::TypeMismatch { expected, actual });
    }
    Ok(statement)
}
