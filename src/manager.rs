//! Translation manager — drives frontends over the input files and runs
//! the pass pipeline over the collected graph
//!
//! Frontends are selected by file extension from a configurable registry.
//! Files parse in parallel with per-frontend graphs and scope managers;
//! the results are absorbed sequentially into one shared Cpg. A file whose
//! frontend fails is recorded and skipped; the build succeeds as long as
//! at least one unit was produced. Scope imbalance aborts the build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use rayon::prelude::*;
use tracing::{info, warn};

use arbor_core::Cpg;
use arbor_frontends::{
    CxxFrontend, FrontendConfig, GoFrontend, LanguageFrontend, PythonFrontend, TranslationError,
};
use arbor_passes::{PassPipeline, PassReport};

/// Build inputs: the files to translate, include search roots, and the
/// error policy.
#[derive(Debug, Clone)]
pub struct TranslationConfiguration {
    pub source_files: Vec<PathBuf>,
    /// Root directory used as an include search root.
    pub top_level: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    /// Strict mode: the first frontend failure aborts the build instead of
    /// skipping the file.
    pub fail_on_error: bool,
    /// Parse files in parallel (the default). Passes always run
    /// single-threaded over the shared graph.
    pub parallel: bool,
}

impl Default for TranslationConfiguration {
    fn default() -> Self {
        TranslationConfiguration {
            source_files: Vec::new(),
            top_level: None,
            include_paths: Vec::new(),
            fail_on_error: false,
            parallel: true,
        }
    }
}

impl TranslationConfiguration {
    pub fn for_files(files: impl IntoIterator<Item = PathBuf>) -> Self {
        TranslationConfiguration {
            source_files: files.into_iter().collect(),
            ..Default::default()
        }
    }
}

type FrontendFactory =
    Box<dyn Fn(&TranslationConfiguration) -> Box<dyn LanguageFrontend> + Send + Sync>;

/// Extension-to-frontend mapping. A new language plugs in by registering
/// its extension here.
pub struct FrontendRegistry {
    factories: HashMap<String, FrontendFactory>,
}

impl FrontendRegistry {
    pub fn standard() -> Self {
        let mut registry = FrontendRegistry {
            factories: HashMap::new(),
        };
        for extension in ["c", "h", "cc", "cpp", "cxx", "hpp", "hh"] {
            registry.register(extension, |config| {
                Box::new(CxxFrontend::new(FrontendConfig {
                    include_paths: config.include_paths.clone(),
                    top_level: config.top_level.clone(),
                }))
            });
        }
        registry.register("go", |_| Box::new(GoFrontend::new()));
        registry.register("py", |_| Box::new(PythonFrontend::new()));
        registry.register("pyi", |_| Box::new(PythonFrontend::new()));
        registry
    }

    pub fn register(
        &mut self,
        extension: impl Into<String>,
        factory: impl Fn(&TranslationConfiguration) -> Box<dyn LanguageFrontend>
        + Send
        + Sync
        + 'static,
    ) {
        self.factories.insert(extension.into(), Box::new(factory));
    }

    fn for_path(
        &self,
        path: &Path,
        config: &TranslationConfiguration,
    ) -> Option<Box<dyn LanguageFrontend>> {
        let extension = path.extension()?.to_str()?;
        self.factories
            .get(extension)
            .map(|factory| factory(config))
    }
}

/// The outcome of a build: the enriched graph, the files that failed, and
/// what the pass pipeline reported.
pub struct TranslationResult {
    pub cpg: Cpg,
    pub failures: Vec<(PathBuf, TranslationError)>,
    pub pass_report: PassReport,
}

pub struct TranslationManager {
    config: TranslationConfiguration,
    registry: FrontendRegistry,
    pipeline: PassPipeline,
}

impl TranslationManager {
    pub fn new(config: TranslationConfiguration) -> Self {
        TranslationManager {
            config,
            registry: FrontendRegistry::standard(),
            pipeline: PassPipeline::standard(),
        }
    }

    /// Replace the pass pipeline, e.g. to append CallGraphClosure.
    pub fn with_pipeline(mut self, pipeline: PassPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn registry_mut(&mut self) -> &mut FrontendRegistry {
        &mut self.registry
    }

    fn parse_one(&self, path: &Path) -> Result<Cpg, TranslationError> {
        let Some(mut frontend) = self.registry.for_path(path, &self.config) else {
            return Err(TranslationError::Translation {
                path: path.to_path_buf(),
                message: "no frontend registered for this extension".into(),
            });
        };
        frontend.parse(path)
    }

    /// Run the whole build: parse, collect, enrich.
    pub fn analyze(&self) -> anyhow::Result<TranslationResult> {
        let parsed: Vec<(PathBuf, Result<Cpg, TranslationError>)> = if self.config.parallel {
            self.config
                .source_files
                .par_iter()
                .map(|path| (path.clone(), self.parse_one(path)))
                .collect()
        } else {
            self.config
                .source_files
                .iter()
                .map(|path| (path.clone(), self.parse_one(path)))
                .collect()
        };

        let mut cpg = Cpg::new("::");
        let mut failures = Vec::new();
        for (path, result) in parsed {
            match result {
                Ok(context) => {
                    cpg.absorb(context);
                }
                Err(error) if error.is_fatal() => {
                    return Err(error).context("frontend reported a fatal error");
                }
                Err(error) => {
                    if self.config.fail_on_error {
                        return Err(error).context("strict mode aborts on the first failure");
                    }
                    warn!(file = %path.display(), error = %error, "skipping file");
                    failures.push((path, error));
                }
            }
        }

        if cpg.units.is_empty() && !self.config.source_files.is_empty() {
            bail!("no translation unit could be produced");
        }
        info!(
            units = cpg.units.len(),
            skipped = failures.len(),
            "parse stage finished"
        );

        let pass_report = self.pipeline.run(&mut cpg);
        Ok(TranslationResult {
            cpg,
            failures,
            pass_report,
        })
    }
}
