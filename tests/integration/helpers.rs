//! Shared fixture plumbing for the end-to-end tests

use std::io::Write;
use std::path::PathBuf;
use std::sync::Once;

use arbor::{TranslationConfiguration, TranslationManager, TranslationResult};
use tempfile::TempDir;

static LOGGING: Once = Once::new();

pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// Build the given (name, contents) fixtures in one temp dir and analyze
/// them all.
pub fn build(files: &[(&str, &str)]) -> (TempDir, TranslationResult) {
    build_with_support(files, &[])
}

/// Like `build`, but `support` files (headers) land on disk without being
/// analyzed as inputs of their own.
pub fn build_with_support(
    files: &[(&str, &str)],
    support: &[(&str, &str)],
) -> (TempDir, TranslationResult) {
    init_logging();
    let dir = TempDir::new().unwrap();
    for (name, contents) in support {
        write_file(&dir, name, contents);
    }
    let mut paths = Vec::new();
    for (name, contents) in files {
        paths.push(write_file(&dir, name, contents));
    }
    let mut config = TranslationConfiguration::for_files(paths);
    config.top_level = Some(dir.path().to_path_buf());
    let manager = TranslationManager::new(config);
    let result = manager.analyze().expect("build succeeds");
    (dir, result)
}
