use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A diagnostic returned to the bundler host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Result of loading one template, in the shape bundler load callbacks
/// return: `{ "contents": ... }` or `{ "errors": [{ "text": ... }] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoadOutput {
    Contents { contents: String },
    Errors { errors: Vec<Message> },
}

impl LoadOutput {
    pub fn contents(contents: impl Into<String>) -> Self {
        LoadOutput::Contents {
            contents: contents.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        LoadOutput::Errors {
            errors: vec![Message::new(text)],
        }
    }

    pub fn module_text(&self) -> Option<&str> {
        match self {
            LoadOutput::Contents { contents } => Some(contents),
            LoadOutput::Errors { .. } => None,
        }
    }

    pub fn errors(&self) -> &[Message] {
        match self {
            LoadOutput::Contents { .. } => &[],
            LoadOutput::Errors { errors } => errors,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoadOutput::Errors { .. })
    }
}

/// A diagnostic attributed to a template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub message: Message,
}

/// Receives per-file diagnostics from a build.
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn error(&self, path: &Path, text: &str) {
        self.report(Diagnostic {
            path: path.to_path_buf(),
            message: Message::new(text),
        });
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize;
    fn get_diagnostics(&self) -> Vec<Diagnostic>;
}

/// Prints each diagnostic to stderr as `error [path]: message`.
#[derive(Debug, Default)]
pub struct ConsoleDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
    pretty: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(pretty: bool) -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            pretty,
        }
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        if self.pretty {
            eprintln!(
                "\x1b[1;31merror\x1b[0m [{}]: {}",
                diagnostic.path.display(),
                diagnostic.message.text
            );
        } else {
            eprintln!(
                "error [{}]: {}",
                diagnostic.path.display(),
                diagnostic.message.text
            );
        }
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Collects diagnostics without printing
#[derive(Debug, Default)]
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
