//! `blueprint-ctl` entrypoint.
//!
//! Drives the blueprint lifecycle engine against blueprint documents on disk.
//! Nothing is ever applied: documents are forced into dry-run mode and served
//! by a static diff provider.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use blueprint_lifecycle::cli::{Cli, Commands, OutputFormatter};
use blueprint_lifecycle::config::{
    find_config_file, ConfigParser, ConfigValidator, OperatorConfig,
};
use blueprint_lifecycle::controller::Controller;
use blueprint_lifecycle::error::{BlueprintError, Result};
use blueprint_lifecycle::policy::{DiffActionValidator, RequeueClassifier};
use blueprint_lifecycle::reconciler::{
    BlueprintDocument, DryRunExecutor, Reconciler, StaticDiffProvider,
};
use blueprint_lifecycle::scheduling::DebounceRegistry;
use blueprint_lifecycle::state::{BlueprintRepository, LocalBlueprintRepository};

use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config = load_config(cli.config.as_deref(), &formatter)?;

    match cli.command {
        Commands::Validate { file } => cmd_validate(&config, &file, &formatter),
        Commands::Evaluate { file } => cmd_evaluate(&config, &file, &formatter).await,
        Commands::Status { id } => cmd_status(&config, &id, &formatter).await,
        Commands::Watch {
            files,
            duration_secs,
            burst,
        } => {
            cmd_watch(
                &config,
                &files,
                Duration::from_secs(duration_secs),
                burst,
                &formatter,
            )
            .await
        }
    }
}

/// Loads the operator configuration, falling back to defaults.
fn load_config(path: Option<&Path>, formatter: &OutputFormatter) -> Result<OperatorConfig> {
    let config_file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|dir| find_config_file(dir).ok()),
    };

    let mut config = match config_file {
        Some(file) => {
            let parser = ConfigParser::new()
                .with_base_path(file.parent().unwrap_or_else(|| Path::new(".")));
            parser.load_dotenv()?;
            parser.load_file(&file)?
        }
        None => {
            debug!("No configuration file found, using defaults");
            ConfigParser::new().load_dotenv()?;
            OperatorConfig::default()
        }
    };
    ConfigParser::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        eprintln!("{}", formatter.warning(warning));
    }

    Ok(config)
}

/// Opens the repository configured in `state.path`.
fn open_repository(config: &OperatorConfig) -> Arc<LocalBlueprintRepository> {
    Arc::new(LocalBlueprintRepository::with_base_dir(config.state.path.clone()))
}

/// Builds a dry-run reconciler wired to the configured policies.
fn build_reconciler(
    config: &OperatorConfig,
    repository: Arc<LocalBlueprintRepository>,
    provider: Arc<StaticDiffProvider>,
) -> Reconciler {
    Reconciler::new(repository, provider, Arc::new(DryRunExecutor))
        .with_validator(DiffActionValidator::new(config.policy.clone()))
        .with_classifier(RequeueClassifier::new(config.requeue.policy()))
}

/// Loads a document and forces it into dry-run mode.
fn load_dry_run_document(file: &Path) -> Result<BlueprintDocument> {
    let mut document = BlueprintDocument::load(file)?;
    if !document.config.dry_run {
        debug!(blueprint = %document.id, "forcing dry run");
        document.config.dry_run = true;
    }
    Ok(document)
}

/// Checks the needed actions of a document against the action policy.
fn cmd_validate(config: &OperatorConfig, file: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let document = BlueprintDocument::load(file)?;
    info!("Validating blueprint document: {}", file.display());

    let validator = DiffActionValidator::new(config.policy.clone());
    let result = validator.validate(
        &document.state_diff,
        document.config.allow_dogu_namespace_switch,
    );

    println!(
        "{}",
        formatter.format_validation(&document.id, &document.state_diff, &result)
    );
    Ok(result.is_ok())
}

/// Runs one dry-run pass for a document.
async fn cmd_evaluate(
    config: &OperatorConfig,
    file: &Path,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let document = load_dry_run_document(file)?;
    let repository = open_repository(config);
    document.import(repository.as_ref()).await?;

    let provider = Arc::new(StaticDiffProvider::new());
    provider.set(document.id.clone(), document.state_diff.clone());

    let reconciler = build_reconciler(config, Arc::clone(&repository), provider);
    let report = reconciler.reconcile(&document.id).await;

    let spec = match repository.get(&document.id).await {
        Ok(spec) => Some(spec),
        Err(e) => {
            warn!(error = %e, "cannot reload blueprint after the pass");
            None
        }
    };

    println!("{}", formatter.format_pass(&report, spec.as_ref()));
    Ok(report.error.is_none())
}

/// Shows persisted conditions and events.
async fn cmd_status(config: &OperatorConfig, id: &str, formatter: &OutputFormatter) -> Result<bool> {
    let repository = open_repository(config);
    let spec = repository.get(id).await?;
    let events = repository.recorded_events(id).await?;

    println!("{}", formatter.format_status(&spec, &events));
    Ok(true)
}

/// Runs the controller over documents for a bounded time.
async fn cmd_watch(
    config: &OperatorConfig,
    files: &[PathBuf],
    duration: Duration,
    burst: usize,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let repository = open_repository(config);
    let provider = Arc::new(StaticDiffProvider::new());

    let mut ids = Vec::with_capacity(files.len());
    for file in files {
        let document = load_dry_run_document(file)?;
        document.import(repository.as_ref()).await?;
        provider.set(document.id.clone(), document.state_diff.clone());
        ids.push(document.id);
    }

    let reconciler = Arc::new(build_reconciler(config, repository, provider));
    let debounce = Arc::new(DebounceRegistry::new(config.debounce.window()));
    let backoff = Arc::new(config.requeue.backoff());
    let (controller, handle) = Controller::new(reconciler, debounce, backoff);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(controller.run(shutdown_rx));

    for id in &ids {
        for _ in 0..=burst {
            handle.notify(id.clone()).await?;
        }
    }
    info!(
        blueprints = ids.len(),
        duration_secs = duration.as_secs(),
        "Watching blueprints"
    );

    tokio::select! {
        () = tokio::time::sleep(duration) => {
            debug!("Watch duration elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    if shutdown_tx.send(true).is_err() {
        warn!("Controller stopped before shutdown was requested");
    }
    let summary = task
        .await
        .map_err(|e| BlueprintError::internal(format!("Controller task failed: {e}")))?;

    println!("{}", formatter.format_summary(&summary));
    Ok(summary.blueprints.values().all(|s| s.failures == 0))
}
