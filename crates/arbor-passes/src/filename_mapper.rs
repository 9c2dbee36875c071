//! Stamps every node with the file its translation unit came from

use arbor_core::Cpg;

use crate::{Pass, PassError};

pub struct FilenameMapper;

impl Pass for FilenameMapper {
    fn name(&self) -> &'static str {
        "FilenameMapper"
    }

    fn run(&self, cpg: &mut Cpg) -> Result<(), PassError> {
        for unit in cpg.units.clone() {
            let unit_file = cpg
                .graph
                .node(unit)
                .and_then(|n| n.location.as_ref().map(|l| l.file.clone()));
            for id in cpg.graph.ast_descendants(unit) {
                if let Some(node) = cpg.graph.node_mut(id) {
                    if node.file.is_none() {
                        // Nodes spliced in from an include keep the header
                        // file recorded in their own location.
                        node.file = node
                            .location
                            .as_ref()
                            .map(|l| l.file.clone())
                            .or_else(|| unit_file.clone());
                    }
                }
            }
        }
        Ok(())
    }
}
