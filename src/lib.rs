//! Arbor — a multi-language code property graph builder
//!
//! Frontends parse C/C++, Go and Python sources into a unified graph of
//! declarations, statements and expressions; the pass pipeline then
//! resolves types, names and calls and threads evaluation-order and
//! data-flow edges through it.

pub mod manager;

pub use arbor_core::*;
pub use arbor_frontends::{
    CxxFrontend, FrontendConfig, GoFrontend, LanguageFrontend, PythonFrontend, TranslationError,
};
pub use arbor_passes::{
    CallGraphClosure, CallResolver, DfgPass, EogPass, FilenameMapper, NamespaceResolver, Pass,
    PassError, PassPipeline, PassReport, TypeResolver, VariableUsageResolver,
};
pub use manager::{
    FrontendRegistry, TranslationConfiguration, TranslationManager, TranslationResult,
};
