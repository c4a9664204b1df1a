//! Cutover - atomic release deployments
//!
//! Usage:
//!   cutover run                       # Phase from config / DEPLOY_PHASE
//!   cutover start                     # Fetch + install (+ activate unless waiting)
//!   cutover activate --release <dir>  # Switch `current` to an installed release
//!   cutover releases                  # List releases
//!   cutover prune                     # Apply the retention limit

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cutover_core::activate::Activator;
use cutover_core::config::{
    ConfigLayer, DeployConfig, PhaseSelector, config_paths, layer_from_env, load_file_layers,
};
use cutover_core::pipeline::{Pipeline, PipelineResult};
use cutover_core::prune::{PruneReport, RetentionPruner};
use cutover_core::release::list_releases;

const EXIT_STEP_FAILED: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "cutover")]
#[command(version, about = "Atomic release deployments", long_about = None)]
struct Cli {
    /// Config file (default: global cutover.toml, then ./cutover.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the phase selected by config or DEPLOY_PHASE
    Run,

    /// Fetch, link and install a new release
    ///
    /// Activates it right away unless the deployment waits for all servers,
    /// in which case the release directory is printed for `activate`.
    Start,

    /// Activate a release installed by an earlier `start`
    Activate {
        /// Release directory printed by `start`
        #[arg(long)]
        release: Option<PathBuf>,
    },

    /// List releases, marking the active one
    Releases,

    /// Delete releases beyond the retention limit
    Prune,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// No output; rely on the exit code
    Quiet,
}

/// Flags that override config file and environment values.
#[derive(Args, Default)]
struct OverrideArgs {
    /// Git remote to archive
    #[arg(long, global = true)]
    repository: Option<String>,

    /// Tree-ish to deploy
    #[arg(long, global = true)]
    revision: Option<String>,

    /// Directory holding the releases
    #[arg(long, global = true)]
    deployments_dir: Option<PathBuf>,

    /// Symlink pointing at the live release
    #[arg(long, global = true)]
    current_link: Option<PathBuf>,

    /// Directory holding shared paths
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Path excluded from extraction (repeatable or comma-separated)
    #[arg(long = "exclude", global = true, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Release path linked to the project root (repeatable or comma-separated)
    #[arg(long = "link", global = true, value_delimiter = ',')]
    links: Vec<String>,

    /// Composer executable
    #[arg(long, global = true)]
    composer: Option<PathBuf>,

    /// Composer subcommand run before activation ("" disables)
    #[arg(long, global = true)]
    install_command: Option<String>,

    /// Composer subcommand run after activation
    #[arg(long, global = true)]
    post_activation_command: Option<String>,

    /// Releases to keep (0 keeps all)
    #[arg(long, global = true)]
    retain: Option<i64>,

    /// Stop after install and wait for `activate`
    #[arg(long, global = true, value_name = "BOOL")]
    wait_all_servers: Option<bool>,

    /// Per-process timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
}

impl OverrideArgs {
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            repository_url: self.repository.clone(),
            revision: self.revision.clone(),
            deployments_dir: self.deployments_dir.clone(),
            exclude_paths: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
            current_link: self.current_link.clone(),
            project_root: self.project_root.clone(),
            managed_symlinks: (!self.links.is_empty()).then(|| self.links.clone()),
            composer_path: self.composer.clone(),
            install_command: self.install_command.clone(),
            post_activation_command: self.post_activation_command.clone(),
            retain: self.retain,
            wait_all_servers: self.wait_all_servers,
            step_timeout_secs: self.timeout,
            ..ConfigLayer::default()
        }
    }
}

fn main() -> ExitCode {
    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cutover_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            print_error(&err, format);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run => run_pipeline(&config, cli.format),
        Commands::Start => {
            let config = DeployConfig {
                phase: PhaseSelector::Fetch,
                ..config
            };
            run_pipeline(&config, cli.format)
        }
        Commands::Activate { release } => {
            let release = release
                .or_else(|| config.release_dir.clone())
                .context("Missing release directory: pass --release or set DEPLOY_RELEASE_DIR")?;
            run_pipeline(&config.for_activation(release), cli.format)
        }
        Commands::Releases => {
            run_releases(&config, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prune => run_prune(&config, cli.format),
    }
}

/// Stack config sources: files, then environment, then flags.
fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let paths = match &cli.config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            vec![path.clone()]
        }
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            config_paths(&cwd)
        }
    };

    let mut layers = load_file_layers(&paths)?;
    layers.push(layer_from_env()?);
    layers.push(cli.overrides.to_layer());

    Ok(DeployConfig::resolve(layers)?)
}

fn run_pipeline(config: &DeployConfig, format: OutputFormat) -> Result<ExitCode> {
    let result = Pipeline::new(config).run_blocking()?;

    match format {
        OutputFormat::Table => print_result_table(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Quiet => {}
    }

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_STEP_FAILED))
    }
}

fn run_releases(config: &DeployConfig, format: OutputFormat) -> Result<()> {
    let releases = list_releases(&config.deployments_dir)?;
    let current = config
        .current_link
        .as_ref()
        .and_then(|link| Activator::new(link).current_target());
    let current_id = current
        .as_ref()
        .and_then(|target| target.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    match format {
        OutputFormat::Table => {
            if releases.is_empty() {
                println!("No releases in {}", config.deployments_dir.display());
                return Ok(());
            }
            println!("{:<3} {:<16} PATH", "", "RELEASE");
            println!("{}", "-".repeat(70));
            for release in &releases {
                let marker = if current_id.as_deref() == Some(release.id.as_str()) {
                    "*"
                } else {
                    ""
                };
                println!("{:<3} {:<16} {}", marker, release.id, release.dir.display());
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "deployments_dir": config.deployments_dir,
                "current": current,
                "releases": releases,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn run_prune(config: &DeployConfig, format: OutputFormat) -> Result<ExitCode> {
    if config.retain == 0 {
        if let OutputFormat::Table = format {
            println!("Retention is unbounded (retain = 0); nothing to prune");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = RetentionPruner::new(&config.deployments_dir, config.retain).prune();

    match format {
        OutputFormat::Table => print_prune_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Quiet => {}
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_STEP_FAILED))
    }
}

fn print_result_table(result: &PipelineResult) {
    println!("Phase:   {}", result.phase_reached);
    if let Some(dir) = &result.release_dir {
        println!("Release: {}", dir.display());
    }
    if let Some(step) = result.failed_step {
        println!("Failed:  {}", step);
    }

    let statuses = [
        ("archive", result.statuses.archive),
        ("extract", result.statuses.extract),
        ("install", result.statuses.install),
        ("post_activation", result.statuses.post_activation),
    ];
    let ran: Vec<_> = statuses
        .iter()
        .filter_map(|(name, status)| status.map(|s| (name, s)))
        .collect();
    if !ran.is_empty() {
        println!();
        println!("{:<18} STATUS", "STEP");
        println!("{}", "-".repeat(40));
        for (name, status) in ran {
            println!("{:<18} {}", name, status);
        }
    }

    if let Some(links) = &result.links
        && !links.created.is_empty()
    {
        println!();
        println!("Linked: {}", links.created.join(", "));
    }

    if let Some(prune) = &result.prune
        && !prune.removed.is_empty()
    {
        println!("Pruned: {}", prune.removed.join(", "));
    }

    for warning in result.warnings() {
        println!("  Warning: {}", warning);
    }

    if result.pending_activation
        && let Some(dir) = &result.release_dir
    {
        println!();
        println!("Waiting for activation. Run:");
        println!("  cutover activate --release {}", dir.display());
    }
}

fn print_prune_table(report: &PruneReport) {
    if report.removed.is_empty() && report.failed.is_empty() {
        println!("Nothing to prune");
        return;
    }
    for id in &report.removed {
        println!("Removed {}", id);
    }
    for failure in &report.failed {
        println!("  Warning: could not remove {}: {}", failure.path.display(), failure.error);
    }
}

fn print_error(err: &anyhow::Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "error": format!("{:#}", err) });
            println!("{}", output);
        }
        OutputFormat::Table | OutputFormat::Quiet => eprintln!("Error: {:#}", err),
    }
}
