//! Frontend tests over real parses of on-disk fixtures

use std::io::Write;
use std::path::PathBuf;

use arbor_core::{Cpg, EdgeLabel, NodeId, NodeKind, declarations_by_name};
use tempfile::TempDir;

use crate::frontend::{FrontendConfig, LanguageFrontend};
use crate::languages::{CxxFrontend, GoFrontend, PythonFrontend};

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn unit_of(cpg: &Cpg) -> NodeId {
    *cpg.units.first().expect("one unit parsed")
}

#[test]
fn cxx_functions_and_globals() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "main.c",
        "int x;\nint f(int a) { return a; }\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let x = declarations_by_name(&cpg, unit, "x", &[NodeKind::Variable]);
    assert_eq!(x.len(), 1);
    let f = declarations_by_name(&cpg, unit, "f", &[NodeKind::Function]);
    assert_eq!(f.len(), 1);
    let parameters = cpg.graph.targets(f[0], EdgeLabel::Parameters);
    assert_eq!(parameters.len(), 1);
    assert_eq!(cpg.graph.node(parameters[0]).unwrap().name, "a");
    let body = cpg.graph.target(f[0], EdgeLabel::Body).expect("body");
    let statements = cpg.graph.targets(body, EdgeLabel::Statements);
    assert_eq!(statements.len(), 1);
    assert_eq!(cpg.graph.node(statements[0]).unwrap().kind(), NodeKind::Return);
}

#[test]
fn cxx_record_members_are_promoted() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "some.cpp",
        "class SomeClass {\npublic:\n  SomeClass();\n  int DoSomething();\n  int someField;\n};\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let records = declarations_by_name(&cpg, unit, "SomeClass", &[NodeKind::Record]);
    assert_eq!(records.len(), 1);
    let record = records[0];

    let constructors = cpg.graph.targets(record, EdgeLabel::Constructors);
    assert_eq!(constructors.len(), 1);
    let constructor = cpg.graph.node(constructors[0]).unwrap();
    assert_eq!(constructor.name, "SomeClass");
    assert!(!constructor.implicit);

    let methods = cpg.graph.targets(record, EdgeLabel::Methods);
    assert_eq!(methods.len(), 1);
    assert_eq!(cpg.graph.node(methods[0]).unwrap().name, "DoSomething");

    let fields = cpg.graph.targets(record, EdgeLabel::Fields);
    assert_eq!(fields.len(), 1);
    assert_eq!(cpg.graph.node(fields[0]).unwrap().name, "someField");
}

#[test]
fn cxx_default_constructor_synthesis() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "p.cpp", "struct P { int x; };\n");
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let record = declarations_by_name(&cpg, unit, "P", &[NodeKind::Record])[0];
    let constructors = cpg.graph.targets(record, EdgeLabel::Constructors);
    assert_eq!(constructors.len(), 1);
    let constructor = cpg.graph.node(constructors[0]).unwrap();
    assert_eq!(constructor.name, "P");
    assert!(constructor.implicit);
    assert!(cpg.graph.targets(constructors[0], EdgeLabel::Parameters).is_empty());
}

#[test]
fn cxx_function_pointer_field_vs_variable() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "fp.cpp",
        "struct S { int (*fp)(int); };\nint (*g)(int);\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let record = declarations_by_name(&cpg, unit, "S", &[NodeKind::Record])[0];
    let fields = cpg.graph.targets(record, EdgeLabel::Fields);
    assert_eq!(fields.len(), 1);
    let fp = cpg.graph.node(fields[0]).unwrap();
    assert_eq!(fp.name, "fp");
    assert!(fp.ty.is_pointer());

    let globals = declarations_by_name(&cpg, unit, "g", &[NodeKind::Variable]);
    assert_eq!(globals.len(), 1);
    let g = cpg.graph.node(globals[0]).unwrap();
    assert!(g.ty.is_pointer());
    assert_eq!(g.scope, Some(arbor_core::GLOBAL_SCOPE));
}

#[test]
fn cxx_include_is_spliced_once() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "lib.h", "struct FromHeader { int v; };\n");
    let path = write_file(
        &dir,
        "main.cpp",
        "#include \"lib.h\"\n#include \"lib.h\"\nint user;\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let records = declarations_by_name(&cpg, unit, "FromHeader", &[NodeKind::Record]);
    assert_eq!(records.len(), 1, "the header splices exactly once");
    let header_file = cpg.graph.node(records[0]).unwrap().location.as_ref().unwrap().file.clone();
    assert!(header_file.ends_with("lib.h"));
    let includes = declarations_by_name(&cpg, unit, "lib.h", &[NodeKind::Include]);
    assert_eq!(includes.len(), 2);
}

#[test]
fn cxx_out_of_line_definition_becomes_method() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "def.cpp",
        "class C { public: int m(); };\nint C::m() { return 1; }\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let record = declarations_by_name(&cpg, unit, "C", &[NodeKind::Record])[0];
    let methods = declarations_by_name(&cpg, unit, "m", &[NodeKind::Method]);
    // The in-class prototype and the out-of-line definition.
    assert_eq!(methods.len(), 2);
    for method in methods {
        let node = cpg.graph.node(method).unwrap();
        let arbor_core::NodeData::Declaration(arbor_core::Declaration::Method {
            record: linked,
            ..
        }) = &node.data
        else {
            panic!("expected a method");
        };
        assert_eq!(*linked, Some(record));
    }
}

#[test]
fn go_package_structs_and_methods() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "point.go",
        "package geo\n\ntype Point struct {\n\tX int\n\tY int\n}\n\nfunc (p *Point) Norm() int {\n\treturn p.X\n}\n\nfunc Origin() Point {\n\treturn Point{}\n}\n",
    );
    let mut frontend = GoFrontend::new();
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let namespaces = declarations_by_name(&cpg, unit, "geo", &[NodeKind::Namespace]);
    assert_eq!(namespaces.len(), 1);

    let record = declarations_by_name(&cpg, unit, "Point", &[NodeKind::Record])[0];
    let fields = cpg.graph.targets(record, EdgeLabel::Fields);
    assert_eq!(fields.len(), 2);

    let methods = cpg.graph.targets(record, EdgeLabel::Methods);
    assert_eq!(methods.len(), 1);
    assert_eq!(cpg.graph.node(methods[0]).unwrap().name, "Norm");

    assert_eq!(
        declarations_by_name(&cpg, unit, "Origin", &[NodeKind::Function]).len(),
        1
    );
}

#[test]
fn python_classes_and_constructors() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "shapes.py",
        "class Circle:\n    def __init__(self, r):\n        self.r = r\n    def area(self):\n        return self.r\n\ndef main():\n    c = Circle(1)\n",
    );
    let mut frontend = PythonFrontend::new();
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let record = declarations_by_name(&cpg, unit, "Circle", &[NodeKind::Record])[0];
    let constructors = cpg.graph.targets(record, EdgeLabel::Constructors);
    assert_eq!(constructors.len(), 1);
    assert_eq!(cpg.graph.node(constructors[0]).unwrap().name, "__init__");

    let methods = cpg.graph.targets(record, EdgeLabel::Methods);
    assert_eq!(methods.len(), 1);
    assert_eq!(cpg.graph.node(methods[0]).unwrap().name, "area");

    assert_eq!(
        declarations_by_name(&cpg, unit, "main", &[NodeKind::Function]).len(),
        1
    );
}

#[test]
fn python_comparisons_keep_their_operators() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "cmp.py",
        "def check(x, y, z):\n    if x != y:\n        return x\n    return x < y < z\n",
    );
    let mut frontend = PythonFrontend::new();
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    let function = declarations_by_name(&cpg, unit, "check", &[NodeKind::Function])[0];
    let body = cpg.graph.target(function, EdgeLabel::Body).unwrap();
    let operators: Vec<String> = cpg
        .graph
        .ast_descendants(body)
        .into_iter()
        .filter_map(|id| match &cpg.graph.node(id)?.data {
            arbor_core::NodeData::Expression(arbor_core::Expression::BinaryOperator { op }) => {
                Some(op.clone())
            }
            _ => None,
        })
        .collect();
    assert!(operators.contains(&"!=".to_string()));
    assert!(!operators.contains(&"==".to_string()));
    // The chain `x < y < z` folds into one binary per operator token.
    assert_eq!(operators.iter().filter(|op| *op == "<").count(), 2);
}

#[test]
fn unknown_constructs_become_unimplemented_stubs() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "odd.cpp",
        "template <typename T> T id(T t) { return t; }\nint ok;\n",
    );
    let mut frontend = CxxFrontend::new(FrontendConfig::default());
    let cpg = frontend.parse(&path).unwrap();
    let unit = unit_of(&cpg);

    // The template is stubbed, the rest of the file still translates.
    assert_eq!(
        declarations_by_name(&cpg, unit, "ok", &[NodeKind::Variable]).len(),
        1
    );
    let stubs: Vec<NodeId> = cpg
        .graph
        .ast_descendants(unit)
        .into_iter()
        .filter(|id| {
            cpg.graph
                .node(*id)
                .is_some_and(|n| n.kind() == NodeKind::UnimplementedDeclaration)
        })
        .collect();
    assert_eq!(stubs.len(), 1);
    assert!(
        cpg.graph
            .node(stubs[0])
            .unwrap()
            .code
            .as_deref()
            .unwrap()
            .contains("template")
    );
}
