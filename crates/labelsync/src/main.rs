// # labelsync - Label Synchronization Pass
//
// The labelsync binary is a THIN integration layer:
// 1. Parsing arguments, reading the YAML configuration and environment overrides
// 2. Initializing tracing and the runtime
// 3. Registering label sources and configuration APIs
// 4. Running one synchronization pass and mapping its result to an exit code
//
// All synchronization logic lives in labelsync-core.
//
// ## Usage
//
// ```text
// labelsync [OPTIONS] [run]       run one pass
// labelsync [OPTIONS] init [FILE] write a default configuration (to FILE, or the config path)
// labelsync --help                show usage
// ```
//
// ## Configuration
//
// The configuration file is `--config` / `LABELSYNC_CONFIG`, or
// `$OMD_ROOT/etc/labelsync.yml` when running as a site user. Options that
// can also come from the environment:
//
// - `--log-level` / `LABELSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `--mode` / `LABELSYNC_MODE`: `dry-run` to read and merge without writing, or `live`
//
// Secrets are taken from the environment only:
//
// - `LABELSYNC_CHECKMK_SECRET`: automation secret for the Checkmk API
// - `LABELSYNC_VSPHERE_PASSWORD`: password for the vSphere source
// - `OMD_ROOT` / `OMD_SITE`: local site, for URL and secret discovery
//
// ## Example
//
// ```bash
// export LABELSYNC_CONFIG=/etc/labelsync.yml
// labelsync --mode dry-run
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labelsync_core::config::{ApiConfig, SourceConfig};
use labelsync_core::{
    ActivationOutcome, ConfigApi, HostOutcome, LabelSyncConfig, SourceRegistry, SyncEngine, SyncEvent, SyncReport,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Configuration written by `labelsync init`
const DEFAULT_CONFIG: &str = include_str!("default_config.yml");

/// Exit codes for the possible pass results
///
/// - 0: Every host synchronized (or unchanged)
/// - 1: Configuration or startup error, nothing was attempted
/// - 2: Pass-level failure (source unavailable, credentials rejected)
/// - 3: Pass completed, but some hosts or the activation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelsyncExitCode {
    Success = 0,
    ConfigError = 1,
    PassFailed = 2,
    PartialFailure = 3,
}

impl From<LabelsyncExitCode> for ExitCode {
    fn from(code: LabelsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Synchronize inventory tags into monitoring host labels
#[derive(Parser, Debug)]
#[command(name = "labelsync", version, about, long_about = None)]
struct Cli {
    /// Configuration file [default: $OMD_ROOT/etc/labelsync.yml]
    #[arg(short, long, global = true, env = "LABELSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log verbosity
    #[arg(
        long,
        global = true,
        env = "LABELSYNC_LOG_LEVEL",
        value_enum,
        ignore_case = true,
        default_value_t = LogLevel::Info
    )]
    log_level: LogLevel,

    /// Write mode, overriding `sync.dry_run` from the configuration file
    #[arg(long, global = true, env = "LABELSYNC_MODE", value_enum, ignore_case = true)]
    mode: Option<Mode>,

    /// The command to run (default: run)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Run one synchronization pass
    Run,

    /// Write a default configuration file unless one exists
    Init {
        /// Target file [default: the configuration file path]
        file: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Read and merge, never write or activate
    DryRun,
    /// Write and activate
    Live,
}

/// Settings taken from the command line and the environment
#[derive(Debug)]
struct Environment {
    config_path: Option<PathBuf>,
    omd_root: Option<PathBuf>,
    omd_site: Option<String>,
    log_level: Level,
    mode: Option<Mode>,
    checkmk_secret: Option<String>,
    vsphere_password: Option<String>,
}

impl Environment {
    /// Combine parsed arguments with the process environment
    fn from_env(cli: &Cli) -> Self {
        Self::from_lookup(cli, |name| env::var(name).ok())
    }

    fn from_lookup(cli: &Cli, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            config_path: cli.config.clone(),
            omd_root: non_empty("OMD_ROOT").map(PathBuf::from),
            omd_site: non_empty("OMD_SITE"),
            log_level: cli.log_level.into(),
            mode: cli.mode,
            checkmk_secret: non_empty("LABELSYNC_CHECKMK_SECRET"),
            vsphere_password: non_empty("LABELSYNC_VSPHERE_PASSWORD"),
        }
    }

    /// `Some(true)` for dry-run, `Some(false)` for live, `None` to keep the file's setting
    fn dry_run(&self) -> Option<bool> {
        self.mode.map(|mode| mode == Mode::DryRun)
    }

    /// The configuration file to use
    fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_path {
            return Ok(path.clone());
        }
        match &self.omd_root {
            Some(root) => Ok(root.join("etc").join("labelsync.yml")),
            None => anyhow::bail!(
                "No configuration file. Pass --config, set LABELSYNC_CONFIG or run as a site user (OMD_ROOT)."
            ),
        }
    }

    /// Apply environment overrides on top of the file configuration
    fn apply(&self, config: &mut LabelSyncConfig) {
        if let Some(dry_run) = self.dry_run() {
            config.sync.dry_run = dry_run;
        }

        if let ApiConfig::Checkmk {
            secret,
            omd_root,
            omd_site,
            ..
        } = &mut config.api
        {
            if self.checkmk_secret.is_some() {
                secret.clone_from(&self.checkmk_secret);
            }
            if omd_root.is_none() {
                omd_root.clone_from(&self.omd_root);
            }
            if omd_site.is_none() {
                omd_site.clone_from(&self.omd_site);
            }
        }

        if let SourceConfig::Vsphere { api_pass, .. } = &mut config.source
            && let Some(password) = &self.vsphere_password
        {
            api_pass.clone_from(password);
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version end up here as well
            let code = if e.use_stderr() {
                LabelsyncExitCode::ConfigError
            } else {
                LabelsyncExitCode::Success
            };
            let _ = e.print();
            return code.into();
        }
    };

    let environment = Environment::from_env(&cli);

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(environment.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LabelsyncExitCode::ConfigError.into();
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init { file } => {
            let path = match file.map(Ok).unwrap_or_else(|| environment.config_path()) {
                Ok(path) => path,
                Err(e) => {
                    error!("{}", e);
                    return LabelsyncExitCode::ConfigError.into();
                }
            };
            match init_config(&path) {
                Ok(()) => LabelsyncExitCode::Success.into(),
                Err(e) => {
                    error!("Init failed: {:#}", e);
                    LabelsyncExitCode::ConfigError.into()
                }
            }
        }
        Commands::Run => {
            // Enter tokio runtime
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create tokio runtime: {}", e);
                    return LabelsyncExitCode::ConfigError.into();
                }
            };

            rt.block_on(run(environment)).into()
        }
    }
}

/// Write the default configuration unless a file already exists
fn init_config(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        info!("Config file {} already exists. Skipping init.", path.display());
        return Ok(());
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Config file {} created.", path.display());
    Ok(())
}

/// Build the registry with every compiled-in plugin
fn registry() -> SourceRegistry {
    let registry = SourceRegistry::new();

    #[cfg(feature = "checkmk")]
    labelsync_checkmk::register(&registry);

    #[cfg(feature = "vsphere")]
    labelsync_source_vsphere::register(&registry);

    #[cfg(feature = "file")]
    labelsync_source_file::register(&registry);

    debug!(
        "Registered sources: {:?}, APIs: {:?}",
        registry.list_sources(),
        registry.list_apis()
    );
    registry
}

/// Load the configuration and wire the engine
async fn build_engine(environment: &Environment) -> Result<(SyncEngine, mpsc::Receiver<SyncEvent>)> {
    let path = environment.config_path()?;
    let mut config = LabelSyncConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    environment.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Configuration loaded from {}: source {}, api {}",
        path.display(),
        config.source.type_name(),
        config.api.type_name()
    );
    if config.sync.dry_run {
        warn!("Running in DRY-RUN mode - no labels will be written, nothing activated");
    }

    let registry = registry();
    let source = registry.create_source(&config.source)?;
    let api: Arc<dyn ConfigApi> = Arc::from(registry.create_api(&config.api)?);

    Ok(SyncEngine::new(source, api, config.sync)?)
}

/// Run one pass
async fn run(environment: Environment) -> LabelsyncExitCode {
    info!("Starting labelsync pass");

    let (engine, events) = match build_engine(&environment).await {
        Ok(built) => built,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return LabelsyncExitCode::ConfigError;
        }
    };

    let monitor = tokio::spawn(log_events(events));
    let result = engine.run_pass().await;

    // Closing the channel ends the monitor
    drop(engine);
    if let Err(e) = monitor.await {
        warn!("Event monitor failed: {}", e);
    }

    match result {
        Ok(report) => {
            summarize(&report);
            if report.is_success() {
                LabelsyncExitCode::Success
            } else {
                LabelsyncExitCode::PartialFailure
            }
        }
        Err(e) => {
            if let Some(report) = e.report() {
                summarize(report);
            }
            error!("Pass failed: {}", e);
            LabelsyncExitCode::PassFailed
        }
    }
}

async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

fn summarize(report: &SyncReport) {
    for (hostname, error) in report.failed_hosts() {
        error!("Host {} failed: {}", hostname, error);
    }

    let would_update = report
        .hosts
        .values()
        .filter(|o| matches!(o, HostOutcome::WouldUpdate { .. }))
        .count();

    match &report.activation {
        ActivationOutcome::Triggered(handle) => info!(
            "Activation triggered (id: {})",
            handle.id.as_deref().unwrap_or("unknown")
        ),
        ActivationOutcome::Skipped(reason) => debug!("Activation skipped: {:?}", reason),
        ActivationOutcome::Failed(e) => error!("Activation failed: {}", e),
    }

    info!(
        "Pass finished in {} ms: {} host(s) sourced, {} updated, {} unchanged, {} would update, {} failed",
        (report.finished_at - report.started_at).num_milliseconds(),
        report.sourced.len(),
        report.updated_count(),
        report.unchanged_count(),
        would_update,
        report.failed_hosts().len()
    );
}
