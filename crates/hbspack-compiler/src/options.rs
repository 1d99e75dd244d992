use indexmap::IndexSet;
use serde_json::{Map, Value};

/// Options for a single precompile call.
///
/// `extra` carries caller-supplied options verbatim. The built-in
/// [`Precompiler`](crate::Precompiler) understands `noEscape`, `strict` and
/// `sourceMap`; other keys are accepted and ignored.
#[derive(Debug, Clone, Default)]
pub struct PrecompileOptions {
    /// Name recorded as the source in source maps and diagnostics.
    pub src_name: Option<String>,
    /// Helper names the template may call besides the built-ins.
    pub known_helpers: IndexSet<String>,
    /// Reject calls to helpers that are neither built in nor known.
    pub known_helpers_only: bool,
    pub extra: Map<String, Value>,
}

impl PrecompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a boolean passthrough option; anything but `true` is false.
    pub fn flag(&self, key: &str) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn no_escape(&self) -> bool {
        self.flag("noEscape")
    }

    pub fn strict(&self) -> bool {
        self.flag("strict")
    }

    pub fn source_map(&self) -> bool {
        self.flag("sourceMap")
    }
}
