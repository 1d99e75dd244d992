//! Handlebars template precompiler.
//!
//! Turns template text into the JavaScript template-spec literal consumed
//! by `Handlebars.template()` from the Handlebars runtime. Evaluation is
//! left to that runtime; this crate only parses, resolves names and emits.
//!
//! Name resolution is observable: every helper, partial and context lookup
//! the compiler performs is reported to the [`NameLookupHook`] passed to
//! [`TemplateCompiler::precompile`].

pub mod ast;
pub mod error;
pub mod hook;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod sourcemap;
pub mod span;
mod spec;

pub use error::{Error, Result};
pub use hook::{LookupKind, NameLookupHook, NoopHook};
pub use options::PrecompileOptions;
pub use span::Span;

/// Template-spec revision understood by Handlebars runtime 4.3 and later.
pub const COMPILER_REVISION: u32 = 8;
pub const REVISION_CHANGES: &str = ">= 4.3.0";

/// Helpers the Handlebars runtime registers itself. They are always known.
pub const BUILTIN_HELPERS: &[&str] = &[
    "helperMissing",
    "blockHelperMissing",
    "each",
    "if",
    "unless",
    "with",
    "log",
    "lookup",
];

/// Output of a precompile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precompiled {
    /// JavaScript object literal for `Handlebars.template(...)`.
    pub code: String,
    /// Source map JSON, when the `sourceMap` option was set.
    pub map: Option<String>,
}

/// A template compiler.
///
/// Implementations must report names only to the hook they were handed for
/// that call and keep no per-call state on `self`, so one compiler value
/// can serve concurrent calls.
pub trait TemplateCompiler: Send + Sync {
    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hook: &mut dyn NameLookupHook,
    ) -> Result<Precompiled>;
}

/// The built-in compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Precompiler;

impl Precompiler {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for Precompiler {
    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hook: &mut dyn NameLookupHook,
    ) -> Result<Precompiled> {
        let program = parser::parse(source)?;
        spec::emit(source, &program, options, hook)
    }
}

/// Precompiles `source` with the built-in compiler, discarding lookups.
pub fn precompile(source: &str, options: &PrecompileOptions) -> Result<Precompiled> {
    Precompiler.precompile(source, options, &mut NoopHook)
}
