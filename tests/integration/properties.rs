//! Graph invariants checked over whole builds

use arbor::{EdgeLabel, NodeKind, PassPipeline, declarations_by_name};

use crate::helpers::build;

const MIXED_SOURCE: &str = "\
int global;

struct Pair {
  int first;
  int second;
};

int sum(struct Pair p) {
  int total = p.first;
  total = total + p.second;
  return total;
}

int twice(int value) {
  return sum((struct Pair){value, value});
}
";

/// Every node reachable from a unit has a scope chain that terminates at
/// the global scope.
#[test]
fn scope_chains_terminate_at_global() {
    let (_dir, result) = build(&[("mixed.c", MIXED_SOURCE)]);
    let cpg = &result.cpg;
    for id in cpg.ast_reachable() {
        let node = cpg.graph.node(id).unwrap();
        let Some(scope) = node.scope else {
            panic!("node {:?} ({:?}) has no scope", id, node.kind());
        };
        assert!(
            cpg.scopes.is_ancestor(arbor::GLOBAL_SCOPE, scope),
            "scope chain of {:?} does not reach global",
            node.name
        );
    }
    assert!(cpg.scopes.is_tree());
}

/// Every reachable node carries a location pointing into an input file.
#[test]
fn locations_point_into_inputs() {
    let (_dir, result) = build(&[("mixed.c", MIXED_SOURCE)]);
    let cpg = &result.cpg;
    for id in cpg.ast_reachable() {
        let node = cpg.graph.node(id).unwrap();
        let location = node
            .location
            .as_ref()
            .unwrap_or_else(|| panic!("{:?} ({:?}) has no location", node.name, node.kind()));
        assert!(location.file.to_string_lossy().ends_with("mixed.c"));
        assert!(location.region.start_line >= 1);
        assert!(location.region.start_column >= 1);
    }
}

/// Resolved references point at declarations whose defining scope is an
/// ancestor of the reference's scope, or a record scope for field
/// accesses.
#[test]
fn refers_to_targets_are_visible() {
    let (_dir, result) = build(&[("mixed.c", MIXED_SOURCE)]);
    let cpg = &result.cpg;
    for id in cpg.ast_reachable() {
        let node = cpg.graph.node(id).unwrap();
        if !matches!(
            node.kind(),
            NodeKind::DeclaredReference | NodeKind::Member
        ) {
            continue;
        }
        for target in cpg.graph.targets(id, EdgeLabel::RefersTo) {
            let declaration = cpg.graph.node(target).unwrap();
            assert!(declaration.is_value_declaration());
            let declaration_scope = declaration.scope.unwrap();
            let reference_scope = node.scope.unwrap();
            let visible = cpg.scopes.is_ancestor(declaration_scope, reference_scope)
                || cpg
                    .scopes
                    .scope(declaration_scope)
                    .kind
                    == arbor::ScopeKind::Record;
            assert!(visible, "{} resolved out of scope", node.name);
        }
    }
}

/// Re-parsing the recorded source text of a top-level record yields a
/// structurally equivalent declaration.
#[test]
fn roundtrip_of_recorded_code() {
    let source = "struct Pair {\n  int first;\n  int second;\n};\n";
    let (_dir, result) = build(&[("pair.c", source)]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];
    let record = declarations_by_name(cpg, unit, "Pair", &[NodeKind::Record])[0];
    let code = cpg.graph.node(record).unwrap().code.clone().unwrap();

    let (_dir2, reparsed) = build(&[("again.c", &format!("{};\n", code))]);
    let cpg2 = &reparsed.cpg;
    let unit2 = cpg2.units[0];
    let record2 = declarations_by_name(cpg2, unit2, "Pair", &[NodeKind::Record])[0];

    let original_fields: Vec<String> = cpg
        .graph
        .targets(record, EdgeLabel::Fields)
        .into_iter()
        .map(|f| cpg.graph.node(f).unwrap().name.clone())
        .collect();
    let reparsed_fields: Vec<String> = cpg2
        .graph
        .targets(record2, EdgeLabel::Fields)
        .into_iter()
        .map(|f| cpg2.graph.node(f).unwrap().name.clone())
        .collect();
    assert_eq!(original_fields, reparsed_fields);
    assert_eq!(
        cpg.graph.node(record).unwrap().kind(),
        cpg2.graph.node(record2).unwrap().kind()
    );
}

/// Running the pipeline a second time adds no edges.
#[test]
fn pipeline_is_idempotent() {
    let (_dir, mut result) = build(&[("mixed.c", MIXED_SOURCE)]);
    let nodes = result.cpg.graph.node_count();
    let edges = result.cpg.graph.edge_count();
    let report = PassPipeline::standard().run(&mut result.cpg);
    assert!(report.all_succeeded());
    assert_eq!(result.cpg.graph.node_count(), nodes);
    assert_eq!(result.cpg.graph.edge_count(), edges);
}

/// Every resolved call's targets accept the call's argument count.
#[test]
fn invoked_targets_match_arity(){
    let source = "\
int add(int a, int b) { return a + b; }
int log_all(const char* fmt, ...);
int run() { add(1, 2); log_all(\"x\", 1, 2, 3); return 0; }
";
    let (_dir, result) = build(&[("calls.c", source)]);
    let cpg = &result.cpg;
    for id in cpg.ast_reachable() {
        let node = cpg.graph.node(id).unwrap();
        if !matches!(node.kind(), NodeKind::Call | NodeKind::MemberCall) {
            continue;
        }
        let arguments = cpg.graph.targets(id, EdgeLabel::Arguments).len();
        for target in cpg.graph.targets(id, EdgeLabel::Invokes) {
            let fixed = cpg
                .graph
                .targets(target, EdgeLabel::Parameters)
                .into_iter()
                .filter(|p| {
                    !matches!(
                        cpg.graph.node(*p).map(|n| &n.data),
                        Some(arbor::NodeData::Declaration(
                            arbor::Declaration::Parameter { is_variadic: true }
                        ))
                    )
                })
                .count();
            let variadic = matches!(
                cpg.graph.node(target).map(|n| &n.data),
                Some(arbor::NodeData::Declaration(
                    arbor::Declaration::Function {
                        is_variadic: true,
                        ..
                    } | arbor::Declaration::Method {
                        is_variadic: true,
                        ..
                    }
                ))
            );
            if variadic {
                assert!(fixed <= arguments);
            } else {
                assert_eq!(fixed, arguments);
            }
        }
    }
    // And the calls did resolve.
    let unit = cpg.units[0];
    let run = declarations_by_name(cpg, unit, "run", &[NodeKind::Function])[0];
    let body = cpg.graph.target(run, EdgeLabel::Body).unwrap();
    let resolved_calls = cpg
        .graph
        .ast_descendants(body)
        .into_iter()
        .filter(|id| {
            cpg.graph.node(*id).is_some_and(|n| n.kind() == NodeKind::Call)
                && !cpg.graph.targets(*id, EdgeLabel::Invokes).is_empty()
        })
        .count();
    assert_eq!(resolved_calls, 2);
}

/// Every EOG-reachable node inside a function has an incoming EOG edge,
/// except the entry itself; data flows from both reaching writes.
#[test]
fn eog_and_dfg_shape() {
    let source = "\
int pick(int which) {
  int x = 0;
  if (which) {
    x = 1;
  } else {
    x = 2;
  }
  return x;
}
";
    let (_dir, result) = build(&[("pick.c", source)]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];
    let function = declarations_by_name(cpg, unit, "pick", &[NodeKind::Function])[0];

    // Walk the EOG from the entry.
    let mut seen = vec![function];
    let mut frontier = vec![function];
    while let Some(current) = frontier.pop() {
        for next in cpg.graph.targets(current, EdgeLabel::Eog) {
            if !seen.contains(&next) {
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    assert!(seen.len() > 5, "the EOG actually covers the body");
    for id in &seen {
        if *id == function {
            continue;
        }
        assert!(
            !cpg.graph.sources(*id, EdgeLabel::Eog).is_empty(),
            "{:?} lacks an incoming EOG edge",
            cpg.graph.node(*id).unwrap().kind()
        );
    }

    // The return's read of x sees both branch writes.
    let body = cpg.graph.target(function, EdgeLabel::Body).unwrap();
    let x_read = cpg
        .graph
        .ast_descendants(body)
        .into_iter()
        .filter(|id| {
            cpg.graph
                .node(*id)
                .is_some_and(|n| n.kind() == NodeKind::DeclaredReference && n.name == "x")
        })
        .find(|id| {
            cpg.graph
                .ast_parent(*id)
                .and_then(|p| cpg.graph.node(p))
                .is_some_and(|p| p.kind() == NodeKind::Return)
        })
        .expect("read of x in the return");
    assert_eq!(cpg.graph.sources(x_read, EdgeLabel::Dfg).len(), 2);
}
