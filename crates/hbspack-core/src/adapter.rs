//! Runs the template compiler with the loader's fixed options.

use hbspack_compiler::{PrecompileOptions, Precompiled, TemplateCompiler};
use indexmap::IndexSet;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ExtensionTable;
use crate::tracker::TrackingHandle;

/// The compiler's output, consumed only by the module generator.
pub type CompiledArtifact = Precompiled;

/// A template failed to compile; `Display` is the compiler's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(transparent)]
pub struct CompileError(#[from] pub hbspack_compiler::Error);

/// Option keys the adapter owns; passthrough values for them are dropped.
const RESERVED_OPTIONS: &[&str] = &["srcName", "knownHelpers", "knownHelpersOnly"];

pub struct CompilerAdapter {
    compiler: Arc<dyn TemplateCompiler>,
    known_helpers: IndexSet<String>,
    passthrough: Map<String, Value>,
}

impl CompilerAdapter {
    /// `known_helpers` is taken from the helper table's keys.
    pub fn new(
        compiler: Arc<dyn TemplateCompiler>,
        table: &ExtensionTable,
        compile_options: &Map<String, Value>,
    ) -> Self {
        let passthrough = compile_options
            .iter()
            .filter(|(key, _)| !RESERVED_OPTIONS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            compiler,
            known_helpers: table.helpers.keys().cloned().collect(),
            passthrough,
        }
    }

    /// Options for compiling `path`: passthrough options plus the forced
    /// known-helpers-only mode and source name.
    pub fn options_for(&self, path: &Path) -> PrecompileOptions {
        PrecompileOptions {
            src_name: Some(path.display().to_string()),
            known_helpers: self.known_helpers.clone(),
            known_helpers_only: true,
            extra: self.passthrough.clone(),
        }
    }

    /// Compiles `source`, reporting resolved names to `tracker`.
    ///
    /// The tracker is borrowed for this call only.
    pub fn precompile(
        &self,
        path: &Path,
        source: &str,
        tracker: &mut TrackingHandle,
    ) -> Result<CompiledArtifact, CompileError> {
        let options = self.options_for(path);
        Ok(self.compiler.precompile(source, &options, tracker)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ReferenceTracker;
    use hbspack_compiler::Precompiler;
    use serde_json::json;

    fn table(helpers: &[&str]) -> ExtensionTable {
        ExtensionTable {
            helpers: helpers
                .iter()
                .map(|h| (h.to_string(), format!("./{}", h)))
                .collect(),
            partials: Default::default(),
        }
    }

    #[test]
    fn test_known_helpers_only_cannot_be_disabled() {
        let mut options = Map::new();
        options.insert("knownHelpersOnly".into(), json!(false));
        options.insert("noEscape".into(), json!(true));
        let adapter = CompilerAdapter::new(Arc::new(Precompiler), &table(&["bold"]), &options);

        let opts = adapter.options_for(Path::new("/t/a.hbs"));
        assert!(opts.known_helpers_only);
        assert!(opts.no_escape());
        assert!(!opts.extra.contains_key("knownHelpersOnly"));
        assert_eq!(opts.src_name.as_deref(), Some("/t/a.hbs"));
        assert!(opts.known_helpers.contains("bold"));
    }

    #[test]
    fn test_unknown_helper_fails_with_compiler_message() {
        let adapter = CompilerAdapter::new(Arc::new(Precompiler), &table(&["bold"]), &Map::new());
        let mut tracker = ReferenceTracker::begin("/t/a.hbs");
        let err = adapter
            .precompile(Path::new("/t/a.hbs"), "{{shout x}}", &mut tracker)
            .unwrap_err();
        assert!(err.to_string().contains("unknown helper shout"));
    }

    #[test]
    fn test_tracker_receives_lookups() {
        let adapter = CompilerAdapter::new(Arc::new(Precompiler), &table(&["bold"]), &Map::new());
        let mut tracker = ReferenceTracker::begin("/t/a.hbs");
        adapter
            .precompile(Path::new("/t/a.hbs"), "{{bold x}}{{> footer}}", &mut tracker)
            .unwrap();
        let record = tracker.finish();
        assert!(record.helpers.contains("bold"));
        assert!(record.partials.contains("footer"));
    }
}
