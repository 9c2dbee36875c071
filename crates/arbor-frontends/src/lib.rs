//! Language frontends turning source files into raw CPG subtrees

pub mod frontend;
pub mod languages;

pub use frontend::{
    FrontendConfig, FrontendContext, HandlerMap, LanguageFrontend, TranslationError,
};
pub use languages::{CxxFrontend, GoFrontend, PythonFrontend};

#[cfg(test)]
mod tests;
