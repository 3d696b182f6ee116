//! deployctl - build, push, apply and tear down the MBTA agent stack
//!
//! ## Commands
//!
//! - `build`: build the three images (multi-arch builds also push)
//! - `push`: push locally built images
//! - `apply`: render and apply manifests, wait for readiness, register agents
//! - `destroy`: delete the namespace, local images, builder and remote tags
//! - `all` (default): build, push, apply

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

use deploy_core::{
    init_tracing, registry_client, Orchestrator, Phase, RunConfig, RunReport, Settings,
    SystemRunner,
};

#[derive(Parser, Debug)]
#[command(name = "deployctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deployment lifecycle orchestrator for the MBTA agent stack", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON run report
    #[arg(long, global = true)]
    json: bool,

    /// Registry reference images are pushed to (host/namespace); overrides DOCKER_REGISTRY
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Image tag; overrides IMAGE_TAG
    #[arg(long, global = true)]
    tag: Option<String>,

    /// Directory holding the manifest templates; overrides MANIFESTS_DIR
    #[arg(long, global = true)]
    manifests_dir: Option<PathBuf>,

    /// Env file to load before reading configuration
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug)]
enum Commands {
    /// Build the container images
    Build,
    /// Push locally built images (no-op after a multi-arch build)
    Push,
    /// Apply manifests, wait for readiness and trigger registration
    Apply,
    /// Remove everything the deployment created
    Destroy,
    /// Build, push and apply
    All,
}

impl From<Commands> for Phase {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Build => Phase::Build,
            Commands::Push => Phase::Push,
            Commands::Apply => Phase::Apply,
            Commands::Destroy => Phase::Destroy,
            Commands::All => Phase::All,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit 1; --help and --version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let phase: Phase = cli.command.unwrap_or(Commands::All).into();

    let config = resolve_config(&cli)?;
    let runner = SystemRunner::with_timeout(config.command_timeout);
    let hub = registry_client(&config).context("Failed to create registry API client")?;

    let report = Orchestrator::new(&config, &runner, &hub)
        .run(phase)
        .await
        .with_context(|| format!("{} failed", phase))?;

    print_report(&report, cli.json)
}

/// Read `.env` (when present) and the environment exactly once, then apply flags.
fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    match dotenvy::from_path(&cli.env_file) {
        Ok(()) => info!(path = %cli.env_file.display(), "Loaded env file"),
        Err(e) if e.not_found() => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load {}", cli.env_file.display()))
        }
    }

    RunConfig::resolve(apply_overrides(cli, Settings::from_env())).context("Invalid configuration")
}

/// Layer non-blank flag values over the environment settings.
fn apply_overrides(cli: &Cli, mut settings: Settings) -> Settings {
    let given = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    if let Some(registry) = given(cli.registry.clone()) {
        settings.registry = Some(registry);
    }
    if let Some(tag) = given(cli.tag.clone()) {
        settings.image_tag = Some(tag);
    }
    let manifests_dir = cli
        .manifests_dir
        .as_ref()
        .map(|dir| dir.to_string_lossy().to_string());
    if let Some(dir) = given(manifests_dir) {
        settings.manifests_dir = Some(dir);
    }
    settings
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("✓ {} completed (run {})", report.phase, report.run_id);
    println!("  Registry: {}", report.registry);

    if let Some(build) = &report.build {
        let how = if build.pushed { "built and pushed" } else { "built" };
        for image in &build.images {
            println!("  {}: {}", how, image);
        }
    }
    if let Some(push) = &report.push {
        if push.skipped {
            println!("  push: skipped (pushed during build)");
        }
        for image in &push.pushed {
            println!("  pushed: {}", image);
        }
    }
    if let Some(apply) = &report.apply {
        println!("  Applied {} manifests", apply.submitted.len());
        println!("  Manifest digest: {}", apply.manifest_digest);
        for outcome in &apply.readiness {
            let mark = if outcome.result.is_ok() { "ready" } else { "NOT READY" };
            println!("  {}: {}", outcome.step, mark);
        }
        println!("  Registration job: {} submitted", apply.registration.job);
    }
    let failures = report.soft_failures();
    if !failures.is_empty() {
        println!("  {} non-fatal step(s) failed:", failures.len());
        for outcome in failures {
            println!("    - {}", outcome.step);
        }
    }
    Ok(())
}
