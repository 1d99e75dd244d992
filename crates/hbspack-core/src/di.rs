use hbspack_compiler::{Precompiler, TemplateCompiler};
use std::io::IsTerminal;
use std::sync::Arc;

use crate::cache::FreshnessCache;
use crate::config::PluginConfig;
use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use crate::fs::{FileSystem, RealFileSystem};
use crate::host::BuildSession;
use crate::plugin::HandlebarsPlugin;
use crate::transform::HandlebarsTransform;

/// Dependency injection container
/// Owns the shared pieces of a build and wires transforms from them
pub struct Container {
    config: Arc<PluginConfig>,
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
    file_system: Arc<dyn FileSystem>,
    compiler: Arc<dyn TemplateCompiler>,
    cache: Arc<FreshnessCache>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(config: PluginConfig) -> Self {
        Self::with_dependencies(
            config,
            Arc::new(ConsoleDiagnosticHandler::new(std::io::stderr().is_terminal())),
            Arc::new(RealFileSystem::new()),
            Arc::new(Precompiler::new()),
        )
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        config: PluginConfig,
        diagnostic_handler: Arc<dyn DiagnosticHandler>,
        file_system: Arc<dyn FileSystem>,
        compiler: Arc<dyn TemplateCompiler>,
    ) -> Self {
        Container {
            config: Arc::new(config),
            diagnostic_handler,
            file_system,
            compiler,
            cache: Arc::new(FreshnessCache::new()),
        }
    }

    pub fn config(&self) -> &Arc<PluginConfig> {
        &self.config
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    pub fn cache(&self) -> &Arc<FreshnessCache> {
        &self.cache
    }

    /// A transform over the container's cache, so every transform it hands
    /// out sees the others' results.
    pub fn transform(&self) -> HandlebarsTransform {
        HandlebarsTransform::new(
            &self.config,
            Arc::clone(&self.compiler),
            Arc::clone(&self.file_system),
        )
        .with_cache(Arc::clone(&self.cache))
    }

    pub fn plugin(&self) -> HandlebarsPlugin {
        HandlebarsPlugin::new(Arc::new(self.transform()))
    }

    pub fn session(&self) -> BuildSession {
        BuildSession::with_plugin(&self.plugin())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostic_handler.error_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::fs::MockFileSystem;
    use std::path::{Path, PathBuf};

    fn test_container(fs: Arc<MockFileSystem>) -> Container {
        Container::with_dependencies(
            PluginConfig::default(),
            Arc::new(CollectingDiagnosticHandler::new()),
            fs,
            Arc::new(Precompiler),
        )
    }

    #[test]
    fn test_container_creation() {
        let container = Container::new(PluginConfig::default());
        assert_eq!(container.error_count(), 0);
        assert!(!container.has_errors());
        assert_eq!(container.config().runtime_module, "handlebars/runtime");
    }

    #[test]
    fn test_transforms_share_cache() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/t/a.hbs", "hello");
        let container = test_container(fs);

        container.transform().load(Path::new("/t/a.hbs")).unwrap();
        container.transform().load(Path::new("/t/a.hbs")).unwrap();

        assert_eq!(container.cache().len(), 1);
        assert_eq!(container.cache().stats().hits, 1);
    }

    #[test]
    fn test_session_reports_into_handler() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/t/bad.hbs", "{{/nope}}");
        let container = test_container(fs);

        let outcomes = container.session().run(&[PathBuf::from("/t/bad.hbs")]);
        BuildSession::report(&outcomes, container.diagnostic_handler().as_ref());
        assert!(container.has_errors());
    }
}
