use clap::Parser;
use hbspack_core::config::{CliOverrides, PluginConfig, DEFAULT_CONFIG_FILE};
use hbspack_core::host::{BuildOutcome, BuildSession};
use hbspack_core::{Container, LoadFilter, LoadOutput};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// hbspack - precompile Handlebars templates into JavaScript modules
#[derive(Parser, Debug, Clone)]
#[command(name = "hbspack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Template files or directories to compile
    #[arg(value_name = "PATH")]
    inputs: Vec<PathBuf>,

    /// Path to hbsconfig.yaml (or a JSON) configuration file
    #[arg(short, long, value_name = "FILE")]
    project: Option<PathBuf>,

    /// Add or replace a helper import (repeatable)
    #[arg(long = "helper", value_name = "NAME=SPEC")]
    helpers: Vec<String>,

    /// Add or replace a partial import (repeatable)
    #[arg(long = "partial", value_name = "NAME=SPEC")]
    partials: Vec<String>,

    /// Output directory for generated modules (default: next to each template)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Module the generated code imports the Handlebars runtime from
    #[arg(long, value_name = "MODULE")]
    runtime_module: Option<String>,

    /// Append the template source map to each generated module
    #[arg(long)]
    inline_source_map: bool,

    /// Print one JSON load result per template instead of writing files
    #[arg(long)]
    json: bool,

    /// Recompile templates when they change
    #[arg(short, long)]
    watch: bool,

    /// Write a default hbsconfig.yaml to the current directory
    #[arg(long)]
    init: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Additional templates as glob patterns (repeatable)
    #[arg(long, value_name = "PATTERN")]
    include: Vec<String>,
}

/// A template to compile and its path relative to the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Input {
    path: PathBuf,
    relative: PathBuf,
}

/// Template path to generated module path.
type OutputPlan = BTreeMap<PathBuf, PathBuf>;

#[derive(Serialize)]
struct JsonLine<'a> {
    path: String,
    #[serde(flatten)]
    output: &'a LoadOutput,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.init {
        return init_project();
    }

    let config = load_config(&cli)?;
    let filter = LoadFilter::new(&config.extensions);
    let inputs = collect_inputs(&cli, &filter)?;

    if inputs.is_empty() {
        eprintln!("Error: No input templates found. Use --help for usage information.");
        std::process::exit(1);
    }

    let plan = plan_outputs(&inputs, &cli)?;
    let files: Vec<PathBuf> = inputs.into_iter().map(|input| input.path).collect();

    info!("Input templates: {} file(s)", files.len());
    if let Some(ref out_dir) = cli.out_dir {
        info!("Output directory: {}", out_dir.display());
    }
    debug!("Runtime module: {}", config.runtime_module);

    let container = Container::new(config);
    let session = container.session();

    if cli.watch {
        return watch_mode(&cli, &container, &session, &plan, &files);
    }

    let errors = compile(&cli, &container, &session, &plan, &files)?;
    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Write a default configuration file to the current directory
fn init_project() -> anyhow::Result<()> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", DEFAULT_CONFIG_FILE);
    }
    PluginConfig::init_file(&path)?;
    println!("Created {}", DEFAULT_CONFIG_FILE);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<PluginConfig> {
    let mut config = if let Some(ref project_path) = cli.project {
        PluginConfig::from_file(project_path)
            .map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?
    } else {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            PluginConfig::from_file(&default_path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", DEFAULT_CONFIG_FILE, e))?
        } else {
            PluginConfig::default()
        }
    };

    let mut overrides = CliOverrides {
        runtime_module: cli.runtime_module.clone(),
        inline_source_map: cli.inline_source_map,
        ..CliOverrides::default()
    };
    for helper in &cli.helpers {
        overrides
            .helpers
            .push(CliOverrides::parse_pair("helper", helper)?);
    }
    for partial in &cli.partials {
        overrides
            .partials
            .push(CliOverrides::parse_pair("partial", partial)?);
    }

    config.merge(&overrides);
    config.validate()?;
    Ok(config)
}

/// Expands directories and glob patterns into template inputs.
///
/// Files named explicitly are kept even if the filter rejects them, so the
/// build can warn about them; directory and glob matches are filtered.
/// Templates found under a directory keep their path below it.
fn collect_inputs(cli: &Cli, filter: &LoadFilter) -> anyhow::Result<Vec<Input>> {
    use walkdir::WalkDir;

    let mut inputs = Vec::new();
    for input in &cli.inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && filter.matches(entry.path()) {
                    let relative = entry
                        .path()
                        .strip_prefix(input)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| file_name(entry.path()));
                    inputs.push(Input {
                        path: absolute(entry.into_path()),
                        relative,
                    });
                }
            }
        } else {
            inputs.push(Input {
                path: absolute(input.clone()),
                relative: file_name(input),
            });
        }
    }

    for pattern in &cli.include {
        let paths = glob::glob(pattern)
            .map_err(|e| anyhow::anyhow!("Invalid include pattern '{}': {}", pattern, e))?;
        for path in paths.filter_map(|p| p.ok()) {
            if path.is_file() && filter.matches(&path) {
                inputs.push(Input {
                    relative: file_name(&path),
                    path: absolute(path),
                });
            }
        }
    }

    inputs.sort_by(|a, b| a.path.cmp(&b.path));
    inputs.dedup_by(|a, b| a.path == b.path);
    Ok(inputs)
}

fn file_name(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_default()
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Maps every input to its output file. Two templates writing the same
/// module is an error unless nothing is written (`--json`).
fn plan_outputs(inputs: &[Input], cli: &Cli) -> anyhow::Result<OutputPlan> {
    let mut plan = OutputPlan::new();
    let mut claimed: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    for input in inputs {
        let output = determine_output_path(input, cli);
        let previous = claimed.insert(output.clone(), &input.path);
        if let (Some(previous), false) = (previous, cli.json) {
            anyhow::bail!(
                "Output collision: {} and {} both compile to {}",
                previous.display(),
                input.path.display(),
                output.display()
            );
        }
        plan.insert(input.path.clone(), output);
    }
    Ok(plan)
}

/// Compile `files` and emit results; returns the number of errors.
fn compile(
    cli: &Cli,
    container: &Container,
    session: &BuildSession,
    plan: &OutputPlan,
    files: &[PathBuf],
) -> anyhow::Result<usize> {
    let outcomes = session.run(files);

    for outcome in &outcomes {
        match outcome {
            BuildOutcome::Loaded { path, output } => {
                if cli.json {
                    let line = JsonLine {
                        path: path.display().to_string(),
                        output,
                    };
                    println!("{}", serde_json::to_string(&line)?);
                } else if let Some(contents) = output.module_text() {
                    match plan.get(path) {
                        Some(out_path) => {
                            container.file_system().write_file(out_path, contents)?;
                            debug!("Wrote {}", out_path.display());
                        }
                        None => warn!("No output planned for {}", path.display()),
                    }
                }
            }
            BuildOutcome::Failed { .. } => {}
            BuildOutcome::Skipped { path } => {
                warn!("Skipping {}: not a template file", path.display());
            }
        }
    }

    let errors = BuildSession::report(&outcomes, container.diagnostic_handler().as_ref());
    let written = outcomes.iter().filter(|o| o.output().is_some_and(|out| !out.is_error())).count();
    if !cli.json {
        info!("Compiled {} template(s), {} error(s)", written, errors);
    }
    Ok(errors)
}

/// Determine the output file path for a given template
fn determine_output_path(input: &Input, cli: &Cli) -> PathBuf {
    match &cli.out_dir {
        Some(out_dir) => out_dir.join(&input.relative).with_extension("js"),
        None => input.path.with_extension("js"),
    }
}

/// Collects changed templates and releases them as one batch once no
/// event has arrived for the quiet period.
#[derive(Debug)]
struct ChangeBatch {
    quiet: Duration,
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
}

impl ChangeBatch {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    fn record(&mut self, paths: impl IntoIterator<Item = PathBuf>, now: Instant) {
        let mut touched = false;
        for path in paths {
            self.pending.insert(path);
            touched = true;
        }
        if touched {
            self.last_event = Some(now);
        }
    }

    fn take_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if self.pending.is_empty() || now.duration_since(last) < self.quiet {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

/// Watch mode - recompile changed templates, reusing the in-process cache
fn watch_mode(
    cli: &Cli,
    container: &Container,
    session: &BuildSession,
    plan: &OutputPlan,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    use notify::{event::EventKind, Event, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;

    println!("Watching for changes... (Press Ctrl+C to stop)");
    compile(cli, container, session, plan, files)?;

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    let mut watched: Vec<&Path> = files.iter().filter_map(|f| f.parent()).collect();
    watched.sort();
    watched.dedup();
    for dir in watched {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
    }

    let mut batch = ChangeBatch::new(Duration::from_millis(100));
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                // Saves that rename over the file arrive as Modify(Name)
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let changed = event
                        .paths
                        .into_iter()
                        .map(absolute)
                        .filter(|p| plan.contains_key(p));
                    batch.record(changed, Instant::now());
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(anyhow::anyhow!("File watcher disconnected"));
            }
        }

        if let Some(changed) = batch.take_ready(Instant::now()) {
            println!("\nTemplate changed, recompiling...");
            compile(cli, container, session, plan, &changed)?;
        }
    }
}
