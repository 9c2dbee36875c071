//! Concrete end-to-end scenarios over literal inputs

use arbor::{
    Declaration, EdgeLabel, NodeData, NodeKind, body_statement_as, declarations_by_name,
};

use crate::helpers::build;

const SOMECLASS_HEADER: &str = "\
// SomeClass header
//
// A class with one constructor, one
// method and one field. The padding
// above the class keeps the layout
// stable for the location checks in
// the build tests.
//
//
//
//
//
//
class SomeClass {
public:
  SomeClass();
  int DoSomething();

  int someField;
};
";

const SOMECLASS_SOURCE: &str = "\
#include \"someclass.h\"

SomeClass::SomeClass() {}

int SomeClass::DoSomething() { return someField; }
";

/// An included header contributes its declarations to the including unit,
/// in-class members are promoted, and field references resolve through the
/// method's record.
#[test]
fn include_with_definition() {
    let (_dir, result) = crate::helpers::build_with_support(
        &[("someclass.cpp", SOMECLASS_SOURCE)],
        &[("someclass.h", SOMECLASS_HEADER)],
    );
    let cpg = &result.cpg;
    assert!(result.failures.is_empty());
    assert_eq!(cpg.units.len(), 1);
    let unit = cpg.units[0];

    // The record from the header, its two member prototypes (listed on the
    // unit as every parsed function declaration is), and the two
    // out-of-line member definitions.
    let top_level = cpg.graph.targets(unit, EdgeLabel::Declarations);
    assert_eq!(top_level.len(), 5);
    // The include itself is recorded beside the declaration list.
    assert_eq!(cpg.graph.targets(unit, EdgeLabel::Includes).len(), 1);

    let record = declarations_by_name(cpg, unit, "SomeClass", &[NodeKind::Record])[0];
    let constructors = cpg.graph.targets(record, EdgeLabel::Constructors);
    assert_eq!(constructors.len(), 1);
    let constructor = cpg.graph.node(constructors[0]).unwrap();
    assert_eq!(constructor.code.as_deref(), Some("SomeClass();"));
    let region = constructor.location.as_ref().unwrap().region;
    assert_eq!(region.start_line, 16);
    assert_eq!(region.start_column, 3);
    assert_eq!(region.end_column, 15);

    let definition = declarations_by_name(cpg, unit, "DoSomething", &[NodeKind::Method])
        .into_iter()
        .find(|m| {
            cpg.graph
                .node(*m)
                .is_some_and(|n| matches!(
                    n.data,
                    NodeData::Declaration(Declaration::Method { .. })
                ) && cpg.graph.target(*m, EdgeLabel::Body).is_some())
        })
        .expect("out-of-line definition");
    let NodeData::Declaration(Declaration::Method {
        record: linked, ..
    }) = &cpg.graph.node(definition).unwrap().data
    else {
        panic!("expected a method");
    };
    assert_eq!(*linked, Some(record));

    let ret = body_statement_as(cpg, definition, 0, NodeKind::Return).unwrap();
    let value = cpg.graph.target(ret, EdgeLabel::Value).expect("return value");
    assert_eq!(
        cpg.graph.node(value).unwrap().kind(),
        NodeKind::DeclaredReference
    );
    let field = cpg.graph.targets(record, EdgeLabel::Fields)[0];
    assert_eq!(cpg.graph.targets(value, EdgeLabel::RefersTo), vec![field]);
}

/// A variadic prototype accepts calls with more arguments than its fixed
/// parameters, and its parameter list ends with the variadic marker.
#[test]
fn variadic_printf() {
    let (_dir, result) = build(&[(
        "main.c",
        "int printf(const char*, ...);\nint main() { printf(\"%d\", 1); return 0; }\n",
    )]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];

    let printf = declarations_by_name(cpg, unit, "printf", &[NodeKind::Function])[0];
    let parameters = cpg.graph.targets(printf, EdgeLabel::Parameters);
    let marker = cpg.graph.node(*parameters.last().unwrap()).unwrap();
    assert!(matches!(
        marker.data,
        NodeData::Declaration(Declaration::Parameter { is_variadic: true })
    ));

    let main = declarations_by_name(cpg, unit, "main", &[NodeKind::Function])[0];
    let body = cpg.graph.target(main, EdgeLabel::Body).unwrap();
    let call = cpg
        .graph
        .ast_descendants(body)
        .into_iter()
        .find(|id| cpg.graph.node(*id).is_some_and(|n| n.kind() == NodeKind::Call))
        .expect("call expression");
    assert_eq!(cpg.graph.targets(call, EdgeLabel::Invokes), vec![printf]);
}

/// A record without constructors gets an implicit default one.
#[test]
fn default_constructor_synthesis() {
    let (_dir, result) = build(&[("p.cpp", "struct P { int x; };\n")]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];

    let record = declarations_by_name(cpg, unit, "P", &[NodeKind::Record])[0];
    let constructors = cpg.graph.targets(record, EdgeLabel::Constructors);
    assert_eq!(constructors.len(), 1);
    let constructor = cpg.graph.node(constructors[0]).unwrap();
    assert_eq!(constructor.name, "P");
    assert!(constructor.implicit);
    assert!(
        cpg.graph
            .targets(constructors[0], EdgeLabel::Parameters)
            .is_empty()
    );
}

/// The local shadows the global of the same name.
#[test]
fn scope_shadowing() {
    let (_dir, result) = build(&[(
        "shadow.c",
        "int x;\nint f() { int x = 1; return x; }\n",
    )]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];

    let function = declarations_by_name(cpg, unit, "f", &[NodeKind::Function])[0];
    let locals: Vec<_> = declarations_by_name(cpg, unit, "x", &[NodeKind::Variable])
        .into_iter()
        .filter(|x| cpg.graph.enclosing_function(*x) == Some(function))
        .collect();
    assert_eq!(locals.len(), 1);

    let ret = body_statement_as(cpg, function, 1, NodeKind::Return).unwrap();
    let value = cpg.graph.target(ret, EdgeLabel::Value).unwrap();
    assert_eq!(cpg.graph.targets(value, EdgeLabel::RefersTo), vec![locals[0]]);
}

/// Function-pointer declarators: a field inside a record, a variable at
/// global scope.
#[test]
fn function_pointer_field_vs_variable() {
    let (_dir, result) = build(&[(
        "fp.cpp",
        "struct S { int (*fp)(int); };\nint (*g)(int);\n",
    )]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];

    let record = declarations_by_name(cpg, unit, "S", &[NodeKind::Record])[0];
    let fields = cpg.graph.targets(record, EdgeLabel::Fields);
    assert_eq!(fields.len(), 1);
    assert_eq!(cpg.graph.node(fields[0]).unwrap().name, "fp");

    let variables = declarations_by_name(cpg, unit, "g", &[NodeKind::Variable]);
    assert_eq!(variables.len(), 1);
    assert_eq!(
        cpg.graph.node(variables[0]).unwrap().scope,
        Some(arbor::GLOBAL_SCOPE)
    );
}

/// Short-circuit evaluation: the left operand splits into the right
/// operand and the join at the operator; the if branches to the then
/// statement and past it.
#[test]
fn eog_short_circuit() {
    let (_dir, result) = build(&[(
        "sc.c",
        "int a; int b; int c; int d;\nint f() { if (a && b) c; d; return 0; }\n",
    )]);
    let cpg = &result.cpg;
    let unit = cpg.units[0];

    let function = declarations_by_name(cpg, unit, "f", &[NodeKind::Function])[0];
    let body = cpg.graph.target(function, EdgeLabel::Body).unwrap();
    let if_stmt = cpg
        .graph
        .targets(body, EdgeLabel::Statements)
        .into_iter()
        .find(|s| cpg.graph.node(*s).is_some_and(|n| n.kind() == NodeKind::If))
        .unwrap();
    let and = cpg.graph.target(if_stmt, EdgeLabel::Condition).unwrap();
    let a = cpg.graph.target(and, EdgeLabel::Lhs).unwrap();
    let b = cpg.graph.target(and, EdgeLabel::Rhs).unwrap();
    let then_ref = cpg.graph.target(if_stmt, EdgeLabel::ThenBranch).unwrap();

    // a -> { b (true), the join at && (false) }.
    let a_successors = cpg.graph.targets(a, EdgeLabel::Eog);
    assert_eq!(a_successors.len(), 2);
    assert!(a_successors.contains(&b));
    assert!(a_successors.contains(&and));

    // b joins at the operator only.
    assert_eq!(cpg.graph.targets(b, EdgeLabel::Eog), vec![and]);

    // The statement after the if is reachable both ways.
    let d = cpg
        .graph
        .targets(body, EdgeLabel::Statements)
        .into_iter()
        .find(|s| cpg.graph.node(*s).is_some_and(|n| n.name == "d"))
        .unwrap();
    let if_successors = cpg.graph.targets(if_stmt, EdgeLabel::Eog);
    assert!(if_successors.contains(&then_ref));
    assert!(if_successors.contains(&d));
}

/// All three frontends contribute units to one graph.
#[test]
fn mixed_language_build() {
    let (_dir, result) = build(&[
        ("one.c", "int one() { return 1; }\n"),
        ("two.go", "package two\n\nfunc Two() int {\n\treturn 2\n}\n"),
        ("three.py", "def three():\n    return 3\n"),
    ]);
    assert_eq!(result.cpg.units.len(), 3);
    assert!(result.failures.is_empty());
    assert!(result.pass_report.all_succeeded());
}

/// A file that fails to parse is skipped; the rest of the build goes on.
#[test]
fn unparseable_file_is_skipped() {
    let (_dir, result) = build(&[
        ("good.c", "int ok;\n"),
        ("bad.unknownext", "not a language\n"),
    ]);
    assert_eq!(result.cpg.units.len(), 1);
    assert_eq!(result.failures.len(), 1);
}
