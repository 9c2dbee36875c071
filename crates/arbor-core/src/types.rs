//! Parsed types: qualifiers, wrapper stacks, equivalence and compatibility
//!
//! Types are values carried on nodes, not graph nodes themselves. An
//! `Object` shape may hold a direct link to its resolved record declaration;
//! the link is filled in by the type-resolver pass and ignored by equality.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::graph::CpgGraph;
use crate::model::{EdgeLabel, NodeId};

/// Canonicalized qualifier set collected from a type fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_static: bool,
    pub is_extern: bool,
}

impl Qualifiers {
    fn merge(self, other: Qualifiers) -> Qualifiers {
        Qualifiers {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
            is_static: self.is_static || other.is_static,
            is_extern: self.is_extern || other.is_extern,
        }
    }
}

/// Structural part of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeShape {
    /// Named type; `record` is the resolved record declaration, if any.
    Object {
        name: String,
        record: Option<NodeId>,
    },
    Pointer(Box<Type>),
    Reference(Box<Type>),
    Array {
        element: Box<Type>,
        length: Option<u64>,
    },
    Function {
        parameters: Vec<Type>,
        return_type: Box<Type>,
    },
    /// `void`.
    Incomplete,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub qualifiers: Qualifiers,
    pub shape: TypeShape,
}

impl Type {
    pub fn unknown() -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Unknown,
        }
    }

    pub fn void() -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Incomplete,
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Object {
                name: name.into(),
                record: None,
            },
        }
    }

    pub fn pointer_to(inner: Type) -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Pointer(Box::new(inner)),
        }
    }

    pub fn reference_to(inner: Type) -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Reference(Box::new(inner)),
        }
    }

    pub fn function(parameters: Vec<Type>, return_type: Type) -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            shape: TypeShape::Function {
                parameters,
                return_type: Box::new(return_type),
            },
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.shape, TypeShape::Unknown)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.shape, TypeShape::Pointer(_))
    }

    /// Simple name of the innermost object type, if the type bottoms out in
    /// one ("const SomeClass*" -> "SomeClass").
    pub fn root_name(&self) -> Option<&str> {
        match &self.shape {
            TypeShape::Object { name, .. } => Some(name),
            TypeShape::Pointer(inner)
            | TypeShape::Reference(inner)
            | TypeShape::Array { element: inner, .. } => inner.root_name(),
            _ => None,
        }
    }

    /// Resolved record of the innermost object type, if any.
    pub fn root_record(&self) -> Option<NodeId> {
        match &self.shape {
            TypeShape::Object { record, .. } => *record,
            TypeShape::Pointer(inner)
            | TypeShape::Reference(inner)
            | TypeShape::Array { element: inner, .. } => inner.root_record(),
            _ => None,
        }
    }

    /// Attach a resolved record link to the innermost object type. Returns
    /// true if the link changed.
    pub fn link_record(&mut self, name: &str, id: NodeId) -> bool {
        match &mut self.shape {
            TypeShape::Object {
                name: object_name,
                record,
            } => {
                let simple = object_name.rsplit("::").next().unwrap_or(object_name);
                if (object_name == name || simple == name) && *record != Some(id) {
                    *record = Some(id);
                    true
                } else {
                    false
                }
            }
            TypeShape::Pointer(inner)
            | TypeShape::Reference(inner)
            | TypeShape::Array { element: inner, .. } => inner.link_record(name, id),
            _ => false,
        }
    }

    /// Semantic equality: qualifier set plus the wrapper stack and base
    /// name. Resolved record links are ignored.
    pub fn equals(&self, other: &Type) -> bool {
        if self.qualifiers != other.qualifiers {
            return false;
        }
        match (&self.shape, &other.shape) {
            (TypeShape::Object { name: a, .. }, TypeShape::Object { name: b, .. }) => a == b,
            (TypeShape::Pointer(a), TypeShape::Pointer(b))
            | (TypeShape::Reference(a), TypeShape::Reference(b)) => a.equals(b),
            (
                TypeShape::Array {
                    element: a,
                    length: la,
                },
                TypeShape::Array {
                    element: b,
                    length: lb,
                },
            ) => la == lb && a.equals(b),
            (
                TypeShape::Function {
                    parameters: pa,
                    return_type: ra,
                },
                TypeShape::Function {
                    parameters: pb,
                    return_type: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && ra.equals(rb)
                    && pa.iter().zip(pb.iter()).all(|(x, y)| x.equals(y))
            }
            (TypeShape::Incomplete, TypeShape::Incomplete) => true,
            (TypeShape::Unknown, TypeShape::Unknown) => true,
            _ => false,
        }
    }

    pub(crate) fn remap_ids(&mut self, map: &impl Fn(NodeId) -> NodeId) {
        match &mut self.shape {
            TypeShape::Object { record, .. } => {
                if let Some(r) = record {
                    *r = map(*r);
                }
            }
            TypeShape::Pointer(inner) | TypeShape::Reference(inner) => inner.remap_ids(map),
            TypeShape::Array { element, .. } => element.remap_ids(map),
            TypeShape::Function {
                parameters,
                return_type,
            } => {
                for p in parameters {
                    p.remap_ids(map);
                }
                return_type.remap_ids(map);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifiers.is_const {
            write!(f, "const ")?;
        }
        if self.qualifiers.is_volatile {
            write!(f, "volatile ")?;
        }
        match &self.shape {
            TypeShape::Object { name, .. } => write!(f, "{}", name),
            TypeShape::Pointer(inner) => write!(f, "{}*", inner),
            TypeShape::Reference(inner) => write!(f, "{}&", inner),
            TypeShape::Array { element, length } => match length {
                Some(n) => write!(f, "{}[{}]", element, n),
                None => write!(f, "{}[]", element),
            },
            TypeShape::Function {
                parameters,
                return_type,
            } => {
                let params: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "{}({})", return_type, params.join(", "))
            }
            TypeShape::Incomplete => write!(f, "void"),
            TypeShape::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Typedef registrations, shared between frontends and the type resolver.
#[derive(Debug, Default)]
pub struct TypeAliasStore {
    map: DashMap<String, Type>,
}

impl TypeAliasStore {
    pub fn new() -> Self {
        TypeAliasStore::default()
    }

    pub fn register(&self, alias: impl Into<String>, target: Type) {
        self.map.insert(alias.into(), target);
    }

    pub fn resolve(&self, alias: &str) -> Option<Type> {
        self.map.get(alias).map(|t| t.value().clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn absorb(&self, other: TypeAliasStore, map: &impl Fn(NodeId) -> NodeId) {
        for (alias, mut target) in other.map.into_iter() {
            target.remap_ids(map);
            self.map.entry(alias).or_insert(target);
        }
    }
}

const QUALIFIER_WORDS: [&str; 4] = ["const", "volatile", "static", "extern"];

const BUILTIN_SUFFIX_WORDS: [&str; 6] = ["int", "char", "short", "long", "float", "double"];

/// Widening rank among numeric builtins. Signedness is ignored.
fn numeric_rank(name: &str) -> Option<u32> {
    let stripped = name
        .trim_start_matches("unsigned ")
        .trim_start_matches("signed ")
        .trim();
    match stripped {
        "bool" => Some(1),
        "char" => Some(2),
        "short" | "short int" => Some(3),
        "int" | "unsigned" | "rune" | "int32" | "uint32" => Some(4),
        "long" | "long int" | "int64" | "uint64" => Some(5),
        "long long" | "long long int" => Some(6),
        "float" | "float32" => Some(7),
        "double" | "float64" => Some(8),
        _ => None,
    }
}

/// Parse a type text fragment into a `Type`.
///
/// The scan is syntactic: qualifiers are collected wherever they appear
/// before the base, multi-word builtins ("unsigned long long") are joined,
/// and postfix `*`, `&`, `[N]` produce wrappers in source order. The
/// function-pointer shape `ret (*name)(args)` is recognized structurally.
/// Unparseable fragments yield `Unknown`.
pub fn parse(text: &str, resolve_alias: bool, aliases: &TypeAliasStore) -> Type {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Type::unknown();
    }

    if let Some(ty) = parse_function_pointer(trimmed, aliases) {
        return ty;
    }

    let mut qualifiers = Qualifiers::default();
    let mut base_words: Vec<String> = Vec::new();
    let mut wrappers: Vec<Wrapper> = Vec::new();

    let mut chars = trimmed.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '*' => wrappers.push(Wrapper::Pointer),
            '&' => wrappers.push(Wrapper::Reference),
            '[' => {
                let mut digits = String::new();
                for (_, c2) in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    digits.push(c2);
                }
                wrappers.push(Wrapper::Array(digits.trim().parse::<u64>().ok()));
            }
            c if c.is_alphanumeric() || c == '_' || c == ':' => {
                let mut end = i + c.len_utf8();
                let mut depth = 0usize;
                while let Some(&(j, c2)) = chars.peek() {
                    let part_of_name = c2.is_alphanumeric()
                        || c2 == '_'
                        || c2 == ':'
                        || c2 == '<'
                        || c2 == '>'
                        || (depth > 0 && (c2 == ',' || c2.is_whitespace()));
                    if !part_of_name {
                        break;
                    }
                    if c2 == '<' {
                        depth += 1;
                    }
                    if c2 == '>' {
                        depth = depth.saturating_sub(1);
                    }
                    end = j + c2.len_utf8();
                    chars.next();
                }
                let word = &trimmed[i..end];
                if QUALIFIER_WORDS.contains(&word) {
                    match word {
                        "const" => qualifiers.is_const = true,
                        "volatile" => qualifiers.is_volatile = true,
                        "static" => qualifiers.is_static = true,
                        _ => qualifiers.is_extern = true,
                    }
                } else if wrappers.is_empty() {
                    base_words.push(word.to_string());
                } else {
                    // A name following the wrappers is the declarator name,
                    // not part of the type.
                    break;
                }
            }
            // Anything else ends the scan; what we have so far decides the
            // result.
            _ => break,
        }
    }

    // Multi-word bases are only joined for builtin combinations; otherwise
    // the last identifier before the wrappers wins ("struct Foo" -> "Foo").
    let base = if base_words.is_empty() {
        String::new()
    } else if base_words
        .iter()
        .all(|w| BUILTIN_SUFFIX_WORDS.contains(&w.as_str()) || w == "unsigned" || w == "signed")
    {
        base_words.join(" ")
    } else {
        base_words
            .iter()
            .filter(|w| !matches!(w.as_str(), "struct" | "union" | "class" | "enum"))
            .next_back()
            .cloned()
            .unwrap_or_default()
    };

    if base.is_empty() {
        return Type::unknown();
    }

    let mut ty = if base == "void" {
        Type::void()
    } else if resolve_alias {
        aliases.resolve(&base).unwrap_or_else(|| Type::object(base))
    } else {
        Type::object(base)
    };
    ty.qualifiers = ty.qualifiers.merge(qualifiers);

    for wrapper in wrappers {
        ty = match wrapper {
            Wrapper::Pointer => Type::pointer_to(ty),
            Wrapper::Reference => Type::reference_to(ty),
            Wrapper::Array(length) => Type {
                qualifiers: Qualifiers::default(),
                shape: TypeShape::Array {
                    element: Box::new(ty),
                    length,
                },
            },
        };
    }
    ty
}

enum Wrapper {
    Pointer,
    Reference,
    Array(Option<u64>),
}

/// Recognize `ret (*name)(args)` and `ret (*)(args)`.
fn parse_function_pointer(text: &str, aliases: &TypeAliasStore) -> Option<Type> {
    let open = text.find("(*")?;
    let close = text[open..].find(')').map(|p| open + p)?;
    let args_open = text[close + 1..].find('(').map(|p| close + 1 + p)?;
    let args_close = text.rfind(')')?;
    if args_close <= args_open {
        return None;
    }

    let return_type = parse(&text[..open], false, aliases);
    let args_text = &text[args_open + 1..args_close];
    let parameters: Vec<Type> = args_text
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != "void")
        .map(|a| parse(a, false, aliases))
        .collect();

    Some(Type::pointer_to(Type::function(parameters, return_type)))
}

/// Re-resolve aliases in a type once more declarations are known. Returns
/// true if anything changed.
pub fn refresh(ty: &mut Type, aliases: &TypeAliasStore) -> bool {
    let replacement = match &ty.shape {
        TypeShape::Object { name, record } if record.is_none() => aliases.resolve(name),
        _ => None,
    };
    if let Some(mut target) = replacement {
        target.qualifiers = target.qualifiers.merge(ty.qualifiers);
        // A typedef that resolves to itself must not count as progress.
        if !target.equals(ty) {
            *ty = target;
            return true;
        }
        return false;
    }
    match &mut ty.shape {
        TypeShape::Pointer(inner) | TypeShape::Reference(inner) => refresh(inner, aliases),
        TypeShape::Array { element, .. } => refresh(element, aliases),
        TypeShape::Function {
            parameters,
            return_type,
        } => {
            let mut changed = refresh(return_type, aliases);
            for p in parameters {
                changed |= refresh(p, aliases);
            }
            changed
        }
        _ => false,
    }
}

/// Whether a value of `from` is assignable where `to` is expected.
///
/// Permits exact matches, widening among numeric builtins, derived-to-base
/// conversion once SuperRecord edges exist, and any-pointer-to-void-pointer.
/// Unknown on either side is treated as compatible: the graph tolerates
/// partial information.
pub fn is_compatible(from: &Type, to: &Type, graph: &CpgGraph) -> bool {
    if from.is_unknown() || to.is_unknown() {
        return true;
    }
    if from.equals(to) {
        return true;
    }
    match (&from.shape, &to.shape) {
        (TypeShape::Object { name: a, record: ra }, TypeShape::Object { name: b, record: rb }) => {
            if let (Some(na), Some(nb)) = (numeric_rank(a), numeric_rank(b)) {
                return na <= nb;
            }
            derives_from(*ra, *rb, graph)
        }
        (TypeShape::Pointer(inner_from), TypeShape::Pointer(inner_to)) => {
            // void* accepts any pointer.
            if matches!(inner_to.shape, TypeShape::Incomplete) {
                return true;
            }
            is_compatible(inner_from, inner_to, graph)
        }
        (TypeShape::Reference(inner_from), TypeShape::Reference(inner_to)) => {
            is_compatible(inner_from, inner_to, graph)
        }
        // Array-to-pointer decay.
        (TypeShape::Array { element, .. }, TypeShape::Pointer(inner_to)) => {
            matches!(inner_to.shape, TypeShape::Incomplete)
                || is_compatible(element, inner_to, graph)
        }
        _ => false,
    }
}

fn derives_from(from: Option<NodeId>, to: Option<NodeId>, graph: &CpgGraph) -> bool {
    let (Some(from), Some(to)) = (from, to) else {
        return false;
    };
    let mut visited = vec![from];
    let mut frontier = vec![from];
    while let Some(current) = frontier.pop() {
        if current == to {
            return true;
        }
        for parent in graph.targets(current, EdgeLabel::SuperRecord) {
            if !visited.contains(&parent) {
                visited.push(parent);
                frontier.push(parent);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> TypeAliasStore {
        TypeAliasStore::new()
    }

    #[test]
    fn parse_simple_and_qualified() {
        let ty = parse("const unsigned long long", false, &aliases());
        assert!(ty.qualifiers.is_const);
        assert_eq!(ty.root_name(), Some("unsigned long long"));
    }

    #[test]
    fn parse_wrapper_stack() {
        let ty = parse("int**", false, &aliases());
        let TypeShape::Pointer(inner) = &ty.shape else {
            panic!("expected pointer");
        };
        assert!(inner.is_pointer());
        assert_eq!(ty.root_name(), Some("int"));

        let arr = parse("char[16]", false, &aliases());
        let TypeShape::Array { length, .. } = &arr.shape else {
            panic!("expected array");
        };
        assert_eq!(*length, Some(16));
    }

    #[test]
    fn parse_reference_and_declarator_name() {
        let ty = parse("SomeClass& ref", false, &aliases());
        assert!(matches!(ty.shape, TypeShape::Reference(_)));
        assert_eq!(ty.root_name(), Some("SomeClass"));
    }

    #[test]
    fn parse_function_pointer_shape() {
        let ty = parse("int (*fp)(int, char*)", false, &aliases());
        let TypeShape::Pointer(inner) = &ty.shape else {
            panic!("expected pointer to function");
        };
        let TypeShape::Function {
            parameters,
            return_type,
        } = &inner.shape
        else {
            panic!("expected function shape");
        };
        assert_eq!(parameters.len(), 2);
        assert_eq!(return_type.root_name(), Some("int"));
    }

    #[test]
    fn parse_garbage_is_unknown() {
        assert!(parse("???", false, &aliases()).is_unknown());
        assert!(parse("", false, &aliases()).is_unknown());
    }

    #[test]
    fn alias_resolution_and_refresh() {
        let store = aliases();
        store.register("size_t", parse("unsigned long", false, &store));
        let resolved = parse("size_t", true, &store);
        assert_eq!(resolved.root_name(), Some("unsigned long"));

        let mut deferred = parse("size_t", false, &store);
        assert_eq!(deferred.root_name(), Some("size_t"));
        assert!(refresh(&mut deferred, &store));
        assert_eq!(deferred.root_name(), Some("unsigned long"));
    }

    #[test]
    fn equality_ignores_record_links() {
        let mut a = Type::object("S");
        let b = Type::object("S");
        a.link_record("S", NodeId(7));
        assert!(a.equals(&b));
        assert!(!a.equals(&Type::object("T")));
    }

    #[test]
    fn numeric_widening_and_void_pointer() {
        let graph = CpgGraph::new();
        assert!(is_compatible(
            &Type::object("char"),
            &Type::object("int"),
            &graph
        ));
        assert!(!is_compatible(
            &Type::object("double"),
            &Type::object("int"),
            &graph
        ));
        assert!(is_compatible(
            &Type::pointer_to(Type::object("SomeClass")),
            &Type::pointer_to(Type::void()),
            &graph
        ));
    }
}
