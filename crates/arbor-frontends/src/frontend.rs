//! The contract a language frontend implements, plus shared translation
//! machinery: the per-parse context, node construction with source ranges,
//! and comment attachment.
//!
//! Each frontend owns a family of handlers dispatched by the raw parser's
//! node kind; a kind nobody handles becomes an Unimplemented stub carrying
//! the raw source text, and the build continues.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use arbor_core::{
    Cpg, Language, Node, NodeId, PhysicalLocation, Region, ScopeError,
};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The parser produced no syntax tree at all.
    #[error("could not parse {path}")]
    ParseFailure { path: PathBuf },
    /// Parsing succeeded but no coherent unit could be produced.
    #[error("could not translate {path}: {message}")]
    Translation { path: PathBuf, message: String },
    /// Scope imbalance is a frontend bug and aborts the build.
    #[error("scope handling failed in {path}")]
    Scope {
        path: PathBuf,
        #[source]
        source: ScopeError,
    },
}

impl TranslationError {
    /// Whether this failure must abort the whole build rather than skip the
    /// file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranslationError::Scope { .. })
    }
}

/// Search roots handed to frontends that resolve includes.
#[derive(Debug, Clone, Default)]
pub struct FrontendConfig {
    pub include_paths: Vec<PathBuf>,
    pub top_level: Option<PathBuf>,
}

/// A language frontend turns one source file into a single-unit Cpg whose
/// scopes are populated and whose type strings are parsed. Everything
/// cross-unit is left to the passes.
pub trait LanguageFrontend {
    fn language(&self) -> Language;

    /// Delimiter between namespace segments in qualified names.
    fn namespace_delimiter(&self) -> &'static str;

    fn parse(&mut self, path: &Path) -> Result<Cpg, TranslationError>;

    /// Source text of a raw node in the file currently being parsed.
    fn code_of(&self, raw: tree_sitter::Node) -> Option<String>;

    /// Physical location of a raw node in the file currently being parsed.
    fn location_of(&self, raw: tree_sitter::Node) -> Option<PhysicalLocation>;

    /// Attach the raw node's text as a comment on a graph node.
    fn attach_comment(&mut self, node: NodeId, raw: tree_sitter::Node);
}

/// Per-parse translation state shared by all frontends: the graph being
/// built, the active source buffer, and the pending comment waiting for the
/// next node.
pub struct FrontendContext {
    pub cpg: Cpg,
    pub source: String,
    pub path: PathBuf,
    pub language: Language,
    /// First scope imbalance observed, reported when the parse finishes.
    pub scope_error: Option<ScopeError>,
    pending_comment: Option<String>,
}

impl FrontendContext {
    pub fn new(delimiter: &str, language: Language) -> Self {
        FrontendContext {
            cpg: Cpg::new(delimiter),
            source: String::new(),
            path: PathBuf::new(),
            language,
            scope_error: None,
            pending_comment: None,
        }
    }

    /// Pop a scope, remembering the first imbalance for the end of parse.
    pub fn leave_scope(&mut self, ast_node: Option<NodeId>) {
        if let Err(err) = self.cpg.scopes.leave_scope(ast_node) {
            if self.scope_error.is_none() {
                self.scope_error = Some(err);
            }
        }
    }

    /// Raw source text of a node.
    pub fn text(&self, raw: tree_sitter::Node) -> &str {
        raw.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// The originating source substring, for `Node::code`.
    pub fn code_of(&self, raw: tree_sitter::Node) -> Option<String> {
        let text = self.text(raw);
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// 1-based location of a node; the end column points one past the last
    /// character.
    pub fn location_of(&self, raw: tree_sitter::Node) -> Option<PhysicalLocation> {
        let start = raw.start_position();
        let end = raw.end_position();
        Some(PhysicalLocation {
            file: self.path.clone(),
            region: Region {
                start_line: start.row as u32 + 1,
                start_column: start.column as u32 + 1,
                end_line: end.row as u32 + 1,
                end_column: end.column as u32 + 1,
            },
        })
    }

    /// Stash a comment; it attaches to the next node created.
    pub fn stash_comment(&mut self, raw: tree_sitter::Node) {
        let text = self
            .text(raw)
            .trim_start_matches("//")
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .trim_start_matches('#')
            .trim()
            .to_string();
        if !text.is_empty() {
            self.pending_comment = Some(text);
        }
    }

    /// Attach a comment directly to an existing node.
    pub fn attach_comment(&mut self, node: NodeId, raw: tree_sitter::Node) {
        let text = self.text(raw).to_string();
        if let Some(node) = self.cpg.graph.node_mut(node) {
            node.comment = Some(text);
        }
    }

    /// Insert a node filled with code, location, language, the current
    /// scope and a qualified name derived from the scope stack. Any stashed
    /// comment attaches here.
    pub fn add(&mut self, mut node: Node, raw: tree_sitter::Node) -> NodeId {
        node.code = self.code_of(raw);
        node.location = self.location_of(raw);
        node.language = Some(self.language);
        node.scope = Some(self.cpg.scopes.current_scope());
        if node.qualified_name == node.name && !node.name.is_empty() {
            node.qualified_name = self.cpg.scopes.qualified_name(&node.name);
        }
        node.comment = self.pending_comment.take();
        self.cpg.graph.add_node(node)
    }

    /// An Unimplemented stub of the right family, raw text preserved.
    pub fn unimplemented(&mut self, node: Node, raw: tree_sitter::Node) -> NodeId {
        debug!(kind = raw.kind(), file = %self.path.display(), "no handler for raw node kind");
        self.add(node, raw)
    }
}

/// Dispatch table from a raw-AST node kind to a translation routine, built
/// once per frontend instance. Declaration handlers may produce several
/// nodes (`int a, b;`), so the result type is a parameter.
pub struct HandlerMap<F, R = Option<NodeId>> {
    handlers: std::collections::HashMap<&'static str, fn(&mut F, tree_sitter::Node) -> R>,
}

impl<F, R> Default for HandlerMap<F, R> {
    fn default() -> Self {
        HandlerMap {
            handlers: std::collections::HashMap::new(),
        }
    }
}

impl<F, R> HandlerMap<F, R> {
    pub fn register(&mut self, kind: &'static str, handler: fn(&mut F, tree_sitter::Node) -> R) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: &str) -> Option<fn(&mut F, tree_sitter::Node) -> R> {
        self.handlers.get(kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Declaration;

    #[test]
    fn locations_are_one_based_with_open_end_column() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .unwrap();
        let source = "int x;\n";
        let tree = parser.parse(source, None).unwrap();

        let mut ctx = FrontendContext::new("::", Language::C);
        ctx.source = source.to_string();
        ctx.path = PathBuf::from("test.c");

        let root = tree.root_node();
        let location = ctx.location_of(root.named_child(0).unwrap()).unwrap();
        assert_eq!(location.region.start_line, 1);
        assert_eq!(location.region.start_column, 1);
        // "int x;" spans columns 1..7, end pointing past the semicolon.
        assert_eq!(location.region.end_column, 7);
    }

    #[test]
    fn comments_attach_to_the_next_node() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .unwrap();
        let source = "// counts things\nint counter;\n";
        let tree = parser.parse(source, None).unwrap();

        let mut ctx = FrontendContext::new("::", Language::C);
        ctx.source = source.to_string();
        ctx.path = PathBuf::from("test.c");

        let root = tree.root_node();
        ctx.stash_comment(root.child(0).unwrap());
        let id = ctx.add(
            Node::declaration("counter", Declaration::Variable),
            root.named_child(1).unwrap_or(root),
        );
        assert_eq!(
            ctx.cpg.graph.node(id).unwrap().comment.as_deref(),
            Some("counts things")
        );
    }
}
