//! The per-file load callback.

use hbspack_compiler::TemplateCompiler;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapter::CompilerAdapter;
use crate::cache::FreshnessCache;
use crate::codegen::ModuleGenerator;
use crate::config::{ExtensionTable, PluginConfig};
use crate::diagnostics::LoadOutput;
use crate::fs::FileSystem;
use crate::tracker::ReferenceTracker;

#[derive(Debug, Error)]
pub enum TransformError {
    /// The template could not be read; the file system error is passed on as is.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Matches template files by extension, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFilter {
    suffixes: Vec<String>,
}

impl LoadFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = extensions
            .into_iter()
            .map(|ext| format!(".{}", ext.as_ref().trim_start_matches('.').to_ascii_lowercase()))
            .collect();
        Self { suffixes }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_ascii_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

impl Default for LoadFilter {
    fn default() -> Self {
        Self::new(["hbs", "handlebars"])
    }
}

/// Turns a template path into module text, reusing fresh cached output.
pub struct HandlebarsTransform {
    fs: Arc<dyn FileSystem>,
    cache: Arc<FreshnessCache>,
    adapter: CompilerAdapter,
    generator: ModuleGenerator,
    table: Arc<ExtensionTable>,
    filter: LoadFilter,
}

impl HandlebarsTransform {
    pub fn new(
        config: &PluginConfig,
        compiler: Arc<dyn TemplateCompiler>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let table = Arc::new(config.extension_table());
        Self {
            fs,
            cache: Arc::new(FreshnessCache::new()),
            adapter: CompilerAdapter::new(compiler, &table, &config.compile_options),
            generator: ModuleGenerator::from_config(config),
            table,
            filter: LoadFilter::new(&config.extensions),
        }
    }

    /// Shares `cache` with other transforms instead of a private one.
    pub fn with_cache(mut self, cache: Arc<FreshnessCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<FreshnessCache> {
        &self.cache
    }

    pub fn filter(&self) -> &LoadFilter {
        &self.filter
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.filter.matches(path)
    }

    /// Loads one template.
    ///
    /// Compile failures come back as `LoadOutput::Errors` and are not
    /// cached; only a failure to read the file is an `Err`.
    pub fn load(&self, path: &Path) -> Result<LoadOutput> {
        if let Some(contents) = self.cache.get_fresh(path, self.fs.as_ref()) {
            return Ok(LoadOutput::contents(contents));
        }

        let timestamp = SystemTime::now();
        let source = self.fs.read_file(path)?;
        let started = Instant::now();

        let mut tracker = ReferenceTracker::begin(path);
        match self.adapter.precompile(path, &source, &mut tracker) {
            Ok(artifact) => {
                let record = tracker.finish();
                let module =
                    self.generator
                        .generate(&artifact, &record.helpers, &record.partials, &self.table);
                debug!(
                    "Compiled {} in {:?} ({} helpers, {} partials referenced)",
                    path.display(),
                    started.elapsed(),
                    record.helpers.len(),
                    record.partials.len()
                );
                self.cache.store(path, module.clone(), timestamp);
                Ok(LoadOutput::contents(module))
            }
            Err(err) => {
                warn!("Failed to compile {}: {}", path.display(), err);
                Ok(ModuleGenerator::failure(&err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use hbspack_compiler::Precompiler;

    fn setup(files: &[(&str, &str)]) -> (Arc<MockFileSystem>, HandlebarsTransform) {
        let fs = Arc::new(MockFileSystem::new());
        for (path, contents) in files {
            fs.add_file(*path, *contents);
        }
        let mut config = PluginConfig::default();
        config.helpers.insert("bold".into(), "./bold".into());
        config.partials.insert("footer".into(), "./footer".into());
        let transform = HandlebarsTransform::new(&config, Arc::new(Precompiler), fs.clone());
        (fs, transform)
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = LoadFilter::default();
        assert!(filter.matches(Path::new("/t/a.hbs")));
        assert!(filter.matches(Path::new("/t/A.HBS")));
        assert!(filter.matches(Path::new("/t/page.Handlebars")));
        assert!(!filter.matches(Path::new("/t/a.html")));
        assert!(!filter.matches(Path::new("/t/hbs")));
    }

    #[test]
    fn test_custom_extensions() {
        let filter = LoadFilter::new([".mustache"]);
        assert!(filter.matches(Path::new("x.mustache")));
        assert!(!filter.matches(Path::new("x.hbs")));
    }

    #[test]
    fn test_load_generates_module() {
        let (_fs, transform) = setup(&[("/t/card.hbs", "<b>{{bold name}}</b>{{> footer}}")]);
        let output = transform.load(Path::new("/t/card.hbs")).unwrap();
        let module = output.module_text().unwrap();
        assert!(module.contains("import bold from \"./bold\";"));
        assert!(module.contains("import footer from \"./footer\";"));
        assert_eq!(transform.cache().len(), 1);
    }

    #[test]
    fn test_compile_failure_is_not_cached() {
        let (_fs, transform) = setup(&[("/t/bad.hbs", "{{#if x}}")]);
        let output = transform.load(Path::new("/t/bad.hbs")).unwrap();
        assert!(output.is_error());
        assert!(transform.cache().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let (_fs, transform) = setup(&[]);
        let err = transform.load(Path::new("/t/none.hbs")).unwrap_err();
        let TransformError::Io(io) = err;
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_touched_file_is_recompiled() {
        let (fs, transform) = setup(&[("/t/a.hbs", "one")]);
        let path = Path::new("/t/a.hbs");
        let first = transform.load(path).unwrap();

        fs.set_contents(path, "two");
        assert_eq!(transform.load(path).unwrap(), first);

        fs.touch(path);
        let third = transform.load(path).unwrap();
        assert!(third.module_text().unwrap().contains("two"));
    }
}
