//! Bundler plugin surface.

use hbspack_compiler::TemplateCompiler;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PluginConfig;
use crate::diagnostics::LoadOutput;
use crate::fs::FileSystem;
use crate::transform::{HandlebarsTransform, LoadFilter, Result};

/// Arguments passed to a load callback.
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: PathBuf,
}

pub type LoadCallback = Arc<dyn Fn(&LoadArgs) -> Result<LoadOutput> + Send + Sync>;

/// What a host exposes to plugins during setup.
pub trait PluginBuild {
    fn on_load(&mut self, filter: LoadFilter, callback: LoadCallback);
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn setup(&self, build: &mut dyn PluginBuild);
}

/// Loads `.hbs`/`.handlebars` files as precompiled template modules.
pub struct HandlebarsPlugin {
    transform: Arc<HandlebarsTransform>,
}

impl HandlebarsPlugin {
    pub fn new(transform: Arc<HandlebarsTransform>) -> Self {
        Self { transform }
    }

    pub fn from_config(
        config: &PluginConfig,
        compiler: Arc<dyn TemplateCompiler>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self::new(Arc::new(HandlebarsTransform::new(config, compiler, fs)))
    }

    pub fn transform(&self) -> &Arc<HandlebarsTransform> {
        &self.transform
    }
}

impl Plugin for HandlebarsPlugin {
    fn name(&self) -> &str {
        "handlebars"
    }

    fn setup(&self, build: &mut dyn PluginBuild) {
        let transform = Arc::clone(&self.transform);
        build.on_load(
            self.transform.filter().clone(),
            Arc::new(move |args: &LoadArgs| transform.load(&args.path)),
        );
    }
}
