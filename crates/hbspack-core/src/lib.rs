//! Loads Handlebars templates as JavaScript modules for a bundler.
//!
//! A template file is precompiled once, the helpers and partials it
//! references are matched against the configured import tables, and the
//! resulting module is cached until the file changes on disk.

pub mod adapter;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod di;
pub mod diagnostics;
pub mod fs;
pub mod host;
pub mod plugin;
pub mod tracker;
pub mod transform;

pub use adapter::{CompileError, CompiledArtifact, CompilerAdapter};
pub use cache::{CacheEntry, CacheStats, Freshness, FreshnessCache};
pub use codegen::ModuleGenerator;
pub use config::{CliOverrides, ConfigError, ExtensionTable, PluginConfig};
pub use di::Container;
pub use diagnostics::{
    CollectingDiagnosticHandler, ConsoleDiagnosticHandler, Diagnostic, DiagnosticHandler,
    LoadOutput, Message,
};
pub use host::{BuildOutcome, BuildSession};
pub use plugin::{HandlebarsPlugin, LoadArgs, LoadCallback, Plugin, PluginBuild};
pub use tracker::{ReferenceRecord, ReferenceTracker, TrackingHandle};
pub use transform::{HandlebarsTransform, LoadFilter, TransformError};

pub use hbspack_compiler as compiler;
