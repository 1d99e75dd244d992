//! Builders for transforms backed by an in-memory file system

use hbspack_compiler::{Precompiler, TemplateCompiler};
use hbspack_core::config::PluginConfig;
use hbspack_core::fs::MockFileSystem;
use hbspack_core::transform::HandlebarsTransform;
use std::path::PathBuf;
use std::sync::Arc;

/// Builds a [`HandlebarsTransform`] over a [`MockFileSystem`].
///
/// ```ignore
/// let (fs, transform) = TransformBuilder::new()
///     .helper("bold", "./bold")
///     .file("/project/card.hbs", "{{bold title}}")
///     .build();
/// ```
pub struct TransformBuilder {
    config: PluginConfig,
    files: Vec<(PathBuf, String)>,
    compiler: Arc<dyn TemplateCompiler>,
}

impl Default for TransformBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformBuilder {
    pub fn new() -> Self {
        Self {
            config: PluginConfig::default(),
            files: Vec::new(),
            compiler: Arc::new(Precompiler),
        }
    }

    pub fn helper(mut self, name: &str, specifier: &str) -> Self {
        self.config
            .helpers
            .insert(name.to_string(), specifier.to_string());
        self
    }

    pub fn partial(mut self, name: &str, specifier: &str) -> Self {
        self.config
            .partials
            .insert(name.to_string(), specifier.to_string());
        self
    }

    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.push((path.into(), contents.to_string()));
        self
    }

    pub fn compiler(mut self, compiler: Arc<dyn TemplateCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn build(self) -> (Arc<MockFileSystem>, HandlebarsTransform) {
        let fs = Arc::new(MockFileSystem::new());
        for (path, contents) in self.files {
            fs.add_file(path, contents);
        }
        let transform = HandlebarsTransform::new(&self.config, self.compiler, fs.clone());
        (fs, transform)
    }
}

/// Loads `source` as `/project/template.hbs` with the given tables and
/// returns the module text or the first error message.
pub fn load_template(
    source: &str,
    helpers: &[(&str, &str)],
    partials: &[(&str, &str)],
) -> Result<String, String> {
    let mut builder = TransformBuilder::new().file("/project/template.hbs", source);
    for (name, spec) in helpers {
        builder = builder.helper(name, spec);
    }
    for (name, spec) in partials {
        builder = builder.partial(name, spec);
    }
    let (_fs, transform) = builder.build();
    let output = transform
        .load(std::path::Path::new("/project/template.hbs"))
        .map_err(|e| e.to_string())?;
    match output.module_text() {
        Some(text) => Ok(text.to_string()),
        None => Err(output
            .errors()
            .first()
            .map(|m| m.text.clone())
            .unwrap_or_default()),
    }
}
