//! A minimal bundler host that runs load callbacks over a batch of files.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::diagnostics::{DiagnosticHandler, LoadOutput};
use crate::plugin::{LoadArgs, LoadCallback, Plugin, PluginBuild};
use crate::transform::{LoadFilter, TransformError};

#[derive(Debug)]
pub enum BuildOutcome {
    Loaded { path: PathBuf, output: LoadOutput },
    Failed { path: PathBuf, error: TransformError },
    /// No registered filter matched the path.
    Skipped { path: PathBuf },
}

impl BuildOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BuildOutcome::Loaded { path, .. }
            | BuildOutcome::Failed { path, .. }
            | BuildOutcome::Skipped { path } => path,
        }
    }

    pub fn output(&self) -> Option<&LoadOutput> {
        match self {
            BuildOutcome::Loaded { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Error texts for this file, empty on success or skip.
    pub fn messages(&self) -> Vec<String> {
        match self {
            BuildOutcome::Loaded { output, .. } => {
                output.errors().iter().map(|m| m.text.clone()).collect()
            }
            BuildOutcome::Failed { error, .. } => vec![error.to_string()],
            BuildOutcome::Skipped { .. } => Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.messages().is_empty()
    }
}

/// Collects load callbacks from plugins and runs them in parallel.
#[derive(Default)]
pub struct BuildSession {
    callbacks: Vec<(LoadFilter, LoadCallback)>,
}

impl PluginBuild for BuildSession {
    fn on_load(&mut self, filter: LoadFilter, callback: LoadCallback) {
        self.callbacks.push((filter, callback));
    }
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: &dyn Plugin) {
        info!("Registering plugin '{}'", plugin.name());
        plugin.setup(self);
    }

    pub fn with_plugin(plugin: &dyn Plugin) -> Self {
        let mut session = Self::new();
        session.add_plugin(plugin);
        session
    }

    /// Runs the first callback whose filter matches `path`.
    pub fn load(&self, path: &Path) -> BuildOutcome {
        let Some((_, callback)) = self.callbacks.iter().find(|(filter, _)| filter.matches(path)) else {
            return BuildOutcome::Skipped {
                path: path.to_path_buf(),
            };
        };

        let args = LoadArgs {
            path: path.to_path_buf(),
        };
        match callback(&args) {
            Ok(output) => BuildOutcome::Loaded { path: args.path, output },
            Err(error) => BuildOutcome::Failed { path: args.path, error },
        }
    }

    /// Loads every path concurrently; outcomes are in input order.
    pub fn run(&self, paths: &[PathBuf]) -> Vec<BuildOutcome> {
        let started = Instant::now();
        let outcomes: Vec<BuildOutcome> = paths.par_iter().map(|path| self.load(path)).collect();

        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, BuildOutcome::Skipped { .. }))
            .count();
        info!(
            "Loaded {} file(s) in {:?}: {} failed, {} skipped",
            outcomes.len() - skipped,
            started.elapsed(),
            failed,
            skipped
        );
        outcomes
    }

    /// Reports every error in `outcomes` to `handler`, returning the count.
    pub fn report(outcomes: &[BuildOutcome], handler: &dyn DiagnosticHandler) -> usize {
        let mut count = 0;
        for outcome in outcomes {
            for message in outcome.messages() {
                handler.error(outcome.path(), &message);
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use std::sync::Arc;

    fn session() -> BuildSession {
        let mut session = BuildSession::new();
        session.on_load(
            LoadFilter::default(),
            Arc::new(|args: &LoadArgs| {
                if args.path.ends_with("bad.hbs") {
                    Ok(LoadOutput::error("bad template"))
                } else if args.path.ends_with("gone.hbs") {
                    Err(TransformError::from(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "gone",
                    )))
                } else {
                    Ok(LoadOutput::contents(args.path.display().to_string()))
                }
            }),
        );
        session
    }

    #[test]
    fn test_run_keeps_input_order() {
        let paths: Vec<PathBuf> = (0..32).map(|i| PathBuf::from(format!("/t/{}.hbs", i))).collect();
        let outcomes = session().run(&paths);
        for (path, outcome) in paths.iter().zip(&outcomes) {
            assert_eq!(outcome.path(), path);
            assert_eq!(
                outcome.output().and_then(LoadOutput::module_text),
                Some(path.display().to_string().as_str())
            );
        }
    }

    #[test]
    fn test_unmatched_paths_are_skipped() {
        let outcome = session().load(Path::new("/t/readme.md"));
        assert!(matches!(outcome, BuildOutcome::Skipped { .. }));
        assert!(!outcome.is_error());
    }

    #[test]
    fn test_report_counts_errors() {
        let paths = vec![
            PathBuf::from("/t/ok.hbs"),
            PathBuf::from("/t/bad.hbs"),
            PathBuf::from("/t/gone.hbs"),
        ];
        let outcomes = session().run(&paths);
        let handler = CollectingDiagnosticHandler::new();
        assert_eq!(BuildSession::report(&outcomes, &handler), 2);
        let diagnostics = handler.get_diagnostics();
        assert_eq!(diagnostics[0].path, PathBuf::from("/t/bad.hbs"));
        assert_eq!(diagnostics[0].message.text, "bad template");
        assert_eq!(diagnostics[1].message.text, "gone");
    }
}
