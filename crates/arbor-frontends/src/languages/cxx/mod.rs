//! C/C++ frontend over the tree-sitter grammars
//!
//! `.c` files parse with the C grammar, everything else with the C++ one.
//! Quoted includes are resolved against the including file's directory, the
//! configured include paths and the top-level root, and spliced into the
//! same translation unit once per unit.

mod declarations;
mod expressions;
mod statements;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use arbor_core::{
    Cpg, Declaration, EdgeLabel, Language, Node, NodeId, ScopeKind,
};

use crate::frontend::{
    FrontendConfig, FrontendContext, HandlerMap, LanguageFrontend, TranslationError,
};

pub struct CxxFrontend {
    config: FrontendConfig,
    pub(crate) ctx: FrontendContext,
    pub(crate) unit: NodeId,
    included: HashSet<PathBuf>,
    declaration_handlers: HandlerMap<Self, Vec<NodeId>>,
    statement_handlers: HandlerMap<Self>,
    expression_handlers: HandlerMap<Self>,
}

impl CxxFrontend {
    pub fn new(config: FrontendConfig) -> Self {
        let mut frontend = CxxFrontend {
            config,
            ctx: FrontendContext::new("::", Language::Cpp),
            unit: NodeId::default(),
            included: HashSet::new(),
            declaration_handlers: HandlerMap::default(),
            statement_handlers: HandlerMap::default(),
            expression_handlers: HandlerMap::default(),
        };
        declarations::register(&mut frontend.declaration_handlers);
        statements::register(&mut frontend.statement_handlers);
        expressions::register(&mut frontend.expression_handlers);
        frontend
    }

    fn grammar_for(path: &Path) -> tree_sitter::Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => tree_sitter_c::LANGUAGE.into(),
            _ => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// Parse one file's source and append its top-level declarations to the
    /// current translation unit. Used for the unit's own file and again for
    /// every spliced include.
    fn translate_source(&mut self, path: &Path, source: String) -> Result<(), TranslationError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&Self::grammar_for(path))
            .map_err(|_| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| TranslationError::ParseFailure {
                path: path.to_path_buf(),
            })?;

        let saved_source = std::mem::replace(&mut self.ctx.source, source);
        let saved_path = std::mem::replace(&mut self.ctx.path, path.to_path_buf());

        let root = tree.root_node();
        let mut cursor = root.walk();
        let children: Vec<tree_sitter::Node> = root.named_children(&mut cursor).collect();
        for child in children {
            for declaration in self.handle_declaration(child) {
                self.ctx
                    .cpg
                    .graph
                    .add_ast_child(self.unit, EdgeLabel::Declarations, declaration);
            }
        }

        self.ctx.source = saved_source;
        self.ctx.path = saved_path;
        Ok(())
    }

    pub(crate) fn handle_declaration(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        match self.declaration_handlers.get(raw.kind()) {
            Some(handler) => handler(self, raw),
            None => {
                let node = Node::declaration(
                    "",
                    Declaration::Unimplemented {
                        raw_kind: raw.kind().to_string(),
                    },
                );
                vec![self.ctx.unimplemented(node, raw)]
            }
        }
    }

    pub(crate) fn handle_statement(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        match self.statement_handlers.get(raw.kind()) {
            Some(handler) => handler(self, raw),
            None => {
                // Expression statements and bare expressions share the
                // statement position.
                if self.expression_handlers.get(raw.kind()).is_some() {
                    return self.handle_expression(raw);
                }
                let node = Node::statement(arbor_core::Statement::Unimplemented {
                    raw_kind: raw.kind().to_string(),
                });
                Some(self.ctx.unimplemented(node, raw))
            }
        }
    }

    pub(crate) fn handle_expression(&mut self, raw: tree_sitter::Node) -> Option<NodeId> {
        match self.expression_handlers.get(raw.kind()) {
            Some(handler) => handler(self, raw),
            None => {
                let node = Node::expression(
                    self.ctx.text(raw).to_string(),
                    arbor_core::Expression::Unimplemented {
                        raw_kind: raw.kind().to_string(),
                    },
                );
                Some(self.ctx.unimplemented(node, raw))
            }
        }
    }

    /// `#include`: resolve quoted targets and splice them into this unit.
    pub(crate) fn handle_include(&mut self, raw: tree_sitter::Node) -> Vec<NodeId> {
        let Some(path_node) = raw.child_by_field_name("path") else {
            return Vec::new();
        };
        let raw_target = self.ctx.text(path_node).to_string();
        let quoted = raw_target.starts_with('"');
        let target_name = raw_target
            .trim_matches('"')
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string();

        let resolved = if quoted {
            self.resolve_include(&target_name)
        } else {
            // System headers are recorded but not parsed.
            None
        };

        let include = self.ctx.add(
            Node::declaration(
                target_name.clone(),
                Declaration::Include {
                    target: resolved.clone(),
                },
            ),
            raw,
        );
        // Includes are recorded beside the declaration list, not in it.
        self.ctx
            .cpg
            .graph
            .add_ast_child(self.unit, EdgeLabel::Includes, include);

        if let Some(resolved) = resolved {
            if self.included.insert(resolved.clone()) {
                match std::fs::read_to_string(&resolved) {
                    Ok(source) => {
                        debug!(header = %resolved.display(), "splicing include");
                        if let Err(err) = self.translate_source(&resolved, source) {
                            warn!(header = %resolved.display(), error = %err, "skipping include");
                        }
                    }
                    Err(err) => {
                        warn!(header = %resolved.display(), error = %err, "unreadable include");
                    }
                }
            }
        } else if quoted {
            debug!(include = %target_name, "include target not found");
        }
        Vec::new()
    }

    fn resolve_include(&self, target: &str) -> Option<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        if let Some(parent) = self.ctx.path.parent() {
            roots.push(parent.to_path_buf());
        }
        roots.extend(self.config.include_paths.iter().cloned());
        if let Some(top_level) = &self.config.top_level {
            roots.push(top_level.clone());
        }
        roots
            .into_iter()
            .map(|root| root.join(target))
            .find(|candidate| candidate.is_file())
    }

    /// Enter a scope on the shared context.
    pub(crate) fn enter_scope(&mut self, kind: ScopeKind, node: Option<NodeId>, name: Option<String>) {
        self.ctx.cpg.scopes.enter_scope(kind, node, name);
    }
}

impl LanguageFrontend for CxxFrontend {
    fn language(&self) -> Language {
        self.ctx.language
    }

    fn namespace_delimiter(&self) -> &'static str {
        "::"
    }

    fn code_of(&self, raw: tree_sitter::Node) -> Option<String> {
        self.ctx.code_of(raw)
    }

    fn location_of(&self, raw: tree_sitter::Node) -> Option<arbor_core::PhysicalLocation> {
        self.ctx.location_of(raw)
    }

    fn attach_comment(&mut self, node: NodeId, raw: tree_sitter::Node) {
        self.ctx.attach_comment(node, raw);
    }

    fn parse(&mut self, path: &Path) -> Result<Cpg, TranslationError> {
        let source = std::fs::read_to_string(path).map_err(|source| TranslationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let language = Language::from_path(&path.to_path_buf());
        self.ctx = FrontendContext::new("::", language);
        self.included.clear();
        self.included.insert(path.to_path_buf());

        // The unit root spans the whole file.
        let mut unit = Node::declaration(path.display().to_string(), Declaration::TranslationUnit);
        let lines = source.lines().count().max(1) as u32;
        unit.location = Some(arbor_core::PhysicalLocation {
            file: path.to_path_buf(),
            region: arbor_core::Region {
                start_line: 1,
                start_column: 1,
                end_line: lines,
                end_column: 1,
            },
        });
        unit.language = Some(language);
        unit.scope = Some(arbor_core::GLOBAL_SCOPE);
        self.unit = self.ctx.cpg.graph.add_node(unit);
        self.ctx.cpg.units.push(self.unit);

        self.translate_source(path, source)?;

        if let Some(scope_error) = self.ctx.scope_error.take() {
            return Err(TranslationError::Scope {
                path: path.to_path_buf(),
                source: scope_error,
            });
        }
        Ok(std::mem::replace(
            &mut self.ctx,
            FrontendContext::new("::", Language::Cpp),
        )
        .cpg)
    }
}
