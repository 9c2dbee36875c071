//! Call-expression resolution
//!
//! Candidates are collected by (simple or qualified) name, then filtered by
//! arity and argument-type compatibility. Member calls restrict the search
//! to the base type's record, its superclasses and subclass overrides; a
//! base of unknown type over-approximates across all known records, which
//! is preferred over silently losing call edges.

use dashmap::DashMap;
use rayon::prelude::*;

use arbor_core::{
    Cpg, Declaration, EdgeLabel, EdgeProperties, Expression, NodeData, NodeId, types,
};

use crate::{Pass, PassError};

pub struct CallResolver;

impl Pass for CallResolver {
    fn name(&self) -> &'static str {
        "CallResolver"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        let reachable = cpg.ast_reachable();

        // Function index by simple and qualified name. Read-only over the
        // graph, so the sweep can fan out.
        let index: DashMap<String, Vec<NodeId>> = DashMap::new();
        reachable.par_iter().for_each(|id| {
            if let Some(node) = cpg.graph.node(*id) {
                if node.is_function_like() {
                    index.entry(node.name.clone()).or_default().push(*id);
                    if node.qualified_name != node.name {
                        index
                            .entry(node.qualified_name.clone())
                            .or_default()
                            .push(*id);
                    }
                }
            }
        });
        for mut entry in index.iter_mut() {
            entry.value_mut().sort();
        }

        let records: Vec<NodeId> = reachable
            .iter()
            .copied()
            .filter(|id| {
                cpg.graph.node(*id).is_some_and(|n| {
                    matches!(n.data, NodeData::Declaration(Declaration::Record { .. }))
                })
            })
            .collect();

        let mut resolved: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
        for id in &reachable {
            let Some(node) = cpg.graph.node(*id) else {
                continue;
            };
            let candidates = match &node.data {
                NodeData::Expression(Expression::Call { callee_name }) => {
                    let mut named = index
                        .get(callee_name.as_str())
                        .map(|v| v.value().clone())
                        .unwrap_or_default();
                    if named.is_empty() {
                        if let Some(simple) = simple_name(callee_name) {
                            named = index.get(simple).map(|v| v.value().clone()).unwrap_or_default();
                        }
                    }
                    named
                }
                NodeData::Expression(Expression::MemberCall) => {
                    member_candidates(cpg, *id, &node.name, &records)
                }
                NodeData::Expression(Expression::Construct { type_name }) => {
                    constructor_candidates(cpg, type_name, &records)
                }
                _ => continue,
            };
            if !cpg.graph.targets(*id, EdgeLabel::Invokes).is_empty() {
                continue;
            }
            let arguments = cpg.graph.targets(*id, EdgeLabel::Arguments);
            let matching: Vec<NodeId> = candidates
                .into_iter()
                .filter(|c| signature_matches(cpg, *c, &arguments))
                .collect();
            resolved.push((*id, matching));
        }

        for (call, targets) in resolved {
            if targets.is_empty() {
                if let Some(node) = cpg.graph.node_mut(call) {
                    if !node.unresolved {
                        node.unresolved = true;
                        tracing::debug!(call = %node.name, "call did not resolve");
                    }
                }
                continue;
            }
            for target in targets {
                if !cpg.graph.has_edge(call, target, EdgeLabel::Invokes) {
                    cpg.graph
                        .add_edge(call, EdgeLabel::Invokes, target, EdgeProperties::default());
                }
            }
        }
        Ok(())
    }
}

fn simple_name(qualified: &str) -> Option<&str> {
    for delimiter in ["::", "."] {
        if let Some((_, simple)) = qualified.rsplit_once(delimiter) {
            return Some(simple);
        }
    }
    None
}

/// Methods visible for a member call: the base record's own methods, those
/// of its superclasses, and every override in its subclasses (virtual
/// dispatch is modeled by taking all of them).
fn member_candidates(cpg: &Cpg, call: NodeId, name: &str, records: &[NodeId]) -> Vec<NodeId> {
    let base_record = cpg.graph.target(call, EdgeLabel::Base).and_then(|base| {
        let node = cpg.graph.node(base)?;
        if node.name == "this" {
            cpg.graph
                .enclosing_function(call)
                .and_then(|f| match &cpg.graph.node(f)?.data {
                    NodeData::Declaration(Declaration::Method { record, .. })
                    | NodeData::Declaration(Declaration::Constructor { record }) => *record,
                    _ => None,
                })
        } else {
            node.ty.root_record()
        }
    });

    let searched: Vec<NodeId> = match base_record {
        Some(record) => {
            let mut set = vec![record];
            // Superclasses.
            let mut frontier = vec![record];
            while let Some(current) = frontier.pop() {
                for parent in cpg.graph.targets(current, EdgeLabel::SuperRecord) {
                    if !set.contains(&parent) {
                        set.push(parent);
                        frontier.push(parent);
                    }
                }
            }
            // Subclass overrides.
            let mut frontier = vec![record];
            while let Some(current) = frontier.pop() {
                for child in cpg.graph.sources(current, EdgeLabel::SuperRecord) {
                    if !set.contains(&child) {
                        set.push(child);
                        frontier.push(child);
                    }
                }
            }
            set
        }
        // Unknown base type: over-approximate across all known records.
        None => records.to_vec(),
    };

    searched
        .into_iter()
        .flat_map(|record| cpg.graph.targets(record, EdgeLabel::Methods))
        .filter(|m| cpg.graph.node(*m).is_some_and(|n| n.name == name))
        .collect()
}

fn constructor_candidates(cpg: &Cpg, type_name: &str, records: &[NodeId]) -> Vec<NodeId> {
    records
        .iter()
        .copied()
        .filter(|r| {
            cpg.graph
                .node(*r)
                .is_some_and(|n| n.name == type_name || n.qualified_name == type_name)
        })
        .flat_map(|r| cpg.graph.targets(r, EdgeLabel::Constructors))
        .collect()
}

/// Arity and argument-type check. A variadic callee accepts any call with
/// at least its fixed parameter count. Unknown types are permissive.
fn signature_matches(cpg: &Cpg, callee: NodeId, arguments: &[NodeId]) -> bool {
    let Some(node) = cpg.graph.node(callee) else {
        return false;
    };
    let variadic = match &node.data {
        NodeData::Declaration(Declaration::Function { is_variadic, .. })
        | NodeData::Declaration(Declaration::Method { is_variadic, .. }) => *is_variadic,
        _ => false,
    };
    let fixed: Vec<NodeId> = cpg
        .graph
        .targets(callee, EdgeLabel::Parameters)
        .into_iter()
        .filter(|p| {
            !matches!(
                cpg.graph.node(*p).map(|n| &n.data),
                Some(NodeData::Declaration(Declaration::Parameter {
                    is_variadic: true
                }))
            )
        })
        .collect();

    if variadic {
        if arguments.len() < fixed.len() {
            return false;
        }
    } else if arguments.len() != fixed.len() {
        return false;
    }

    fixed.iter().zip(arguments.iter()).all(|(param, arg)| {
        let (Some(param), Some(arg)) = (cpg.graph.node(*param), cpg.graph.node(*arg)) else {
            return true;
        };
        types::is_compatible(&arg.ty, &param.ty, &cpg.graph)
    })
}
