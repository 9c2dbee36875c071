//! Pass pipeline — graph-to-graph enrichment of the raw AST graph
//!
//! Passes run in a fixed partial order over the shared mutable graph. A
//! pass that fails is logged and the pipeline continues with the remaining
//! passes; the CPG tolerates partial information by design.

use arbor_core::{Cpg, ScopeError};
use thiserror::Error;

pub mod call_graph;
pub mod call_resolver;
pub mod dfg;
pub mod eog;
pub mod filename_mapper;
pub mod namespace_resolver;
pub mod type_resolver;
pub mod usage_resolver;

pub use call_graph::CallGraphClosure;
pub use call_resolver::CallResolver;
pub use dfg::DfgPass;
pub use eog::EogPass;
pub use filename_mapper::FilenameMapper;
pub use namespace_resolver::NamespaceResolver;
pub use type_resolver::TypeResolver;
pub use usage_resolver::VariableUsageResolver;

/// Iteration cap shared by the fix-point passes. Hitting it is reported as
/// a warning; the partial result is still returned.
pub const FIXPOINT_CAP: usize = 10;

#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("{0}")]
    Failed(String),
}

/// A graph-to-graph transformation.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Monotonic passes only add edges and attributes and compose freely;
    /// mutating passes rewrite structure and rely on their position in the
    /// pipeline order.
    fn is_monotonic(&self) -> bool {
        true
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError>;
}

/// What happened when a pipeline ran.
#[derive(Debug, Default)]
pub struct PassReport {
    pub executed: Vec<&'static str>,
    pub failures: Vec<(&'static str, PassError)>,
}

impl PassReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An ordered set of passes applied to a collected graph.
pub struct PassPipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    pub fn empty() -> Self {
        PassPipeline { passes: Vec::new() }
    }

    /// The canonical order. CallGraphClosure is optional and not included.
    pub fn standard() -> Self {
        let mut pipeline = PassPipeline::empty();
        pipeline.push(Box::new(FilenameMapper));
        pipeline.push(Box::new(TypeResolver));
        pipeline.push(Box::new(NamespaceResolver));
        pipeline.push(Box::new(VariableUsageResolver));
        pipeline.push(Box::new(CallResolver));
        pipeline.push(Box::new(EogPass));
        pipeline.push(Box::new(DfgPass));
        pipeline
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass in order. A failing pass is logged and skipped; later
    /// passes still run so the graph carries as much information as could
    /// be computed.
    pub fn run(&self, cpg: &mut Cpg) -> PassReport {
        let mut report = PassReport::default();
        for pass in &self.passes {
            tracing::debug!(pass = pass.name(), "running pass");
            match pass.run(cpg) {
                Ok(()) => report.executed.push(pass.name()),
                Err(err) => {
                    tracing::error!(pass = pass.name(), error = %err, "pass failed, continuing");
                    report.failures.push((pass.name(), err));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;
    impl Pass for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn run(&self, _cpg: &mut Cpg) -> Result<(), PassError> {
            Err(PassError::Failed("deliberate".into()))
        }
    }

    struct Counting;
    impl Pass for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
            cpg.graph.add_node(arbor_core::Node::declaration(
                "marker",
                arbor_core::Declaration::Variable,
            ));
            Ok(())
        }
    }

    #[test]
    fn failing_pass_does_not_stop_pipeline() {
        let mut pipeline = PassPipeline::empty();
        pipeline.push(Box::new(Failing));
        pipeline.push(Box::new(Counting));
        let mut cpg = Cpg::new("::");
        let report = pipeline.run(&mut cpg);
        assert!(!report.all_succeeded());
        assert_eq!(report.executed, vec!["counting"]);
        assert_eq!(cpg.graph.node_count(), 1);
    }

    #[test]
    fn standard_order() {
        let pipeline = PassPipeline::standard();
        assert_eq!(pipeline.len(), 7);
    }
}
