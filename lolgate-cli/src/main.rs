//! lolgate CLI
//!
//! Runs the caching gateway: a supervisor process that keeps a pool of
//! worker processes serving the shared port.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use tracing::{info, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lolgate_api::{RouteEntry, RouteTable, RouteTarget};
use lolgate_core::constants::{DEFAULT_PORT, DEFAULT_REGION};
use lolgate_core::CacheTier;
use lolgate_supervisor::{default_worker_count, ProcessLauncher, Supervisor};

/// lolgate - caching, rate-limiting gateway for the League of Legends API
#[derive(Parser)]
#[command(name = "lolgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway with a supervised worker pool
    Serve {
        /// Number of worker processes
        #[arg(short, long, env = "WORKERS")]
        workers: Option<usize>,
        /// Never ask for missing configuration
        #[arg(long)]
        no_prompt: bool,
    },

    /// Run a single worker (started by `serve`)
    #[command(hide = true)]
    Worker {
        /// Pool slot this worker fills
        #[arg(long, default_value = "0")]
        slot: usize,
    },

    /// Write a .env file interactively
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = ".env")]
        path: PathBuf,
    },

    /// Print the route table
    Routes,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { workers, no_prompt } => {
            cmd_serve(workers, no_prompt, cli.verbose, cli.log_json).await
        }
        Commands::Worker { slot } => cmd_worker(slot).await,
        Commands::Init { path } => cmd_init(&path),
        Commands::Routes => cmd_routes(),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "lolgate=debug,tower_http=debug,info"
    } else {
        "lolgate=info,warn"
    };

    let (plain, json) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(plain)
        .with(json)
        .init();
}

/// Run the supervisor
async fn cmd_serve(workers: Option<usize>, no_prompt: bool, verbose: bool, log_json: bool) -> Result<()> {
    let env_path = Path::new(".env");
    if !no_prompt && !env_path.exists() && std::io::stdin().is_terminal() {
        println!("{}", "No .env found, let's create one.".yellow());
        cmd_init(env_path)?;
        let _ = dotenvy::from_path(env_path);
    }

    let workers = workers.unwrap_or_else(default_worker_count).max(1);

    let mut launcher = ProcessLauncher::current_exe()
        .context("Cannot locate the lolgate executable")?
        .arg("worker");
    if verbose {
        launcher = launcher.arg("--verbose");
    }
    if log_json {
        launcher = launcher.arg("--log-json");
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    println!("{}", "Starting lolgate...".cyan().bold());
    println!("   {} {}", "Workers:".green(), workers);
    println!("   {} http://0.0.0.0:{}", "Listening on:".green(), port);
    println!("\n   Press Ctrl+C to stop.\n");

    let supervisor = Supervisor::new(launcher, workers);
    supervisor.run_until(shutdown_signal()).await;

    let stats = supervisor.stats();
    info!(
        launched = stats.launched(),
        restarts = stats.restarts(),
        "Supervisor stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Run one worker
async fn cmd_worker(slot: usize) -> Result<()> {
    let span = tracing::info_span!("worker", slot);
    lolgate_api::start_worker()
        .instrument(span)
        .await
        .with_context(|| format!("Worker {} failed", slot))
}

/// Values written by `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvFile {
    key: String,
    port: u16,
    region: String,
}

impl EnvFile {
    fn render(&self) -> String {
        format!("KEY={}\nPORT={}\nREGION={}\n", self.key, self.port, self.region)
    }

    fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("Cannot write {}", path.display()))
    }
}

/// Ask for configuration and write it to `path`
fn cmd_init(path: &Path) -> Result<()> {
    if path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("{}", "Left existing configuration untouched.".dimmed());
            return Ok(());
        }
    }

    let key: String = Input::new()
        .with_prompt("API key")
        .allow_empty(true)
        .interact_text()?;
    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(DEFAULT_PORT)
        .interact_text()?;
    let region: String = Input::new()
        .with_prompt("Region")
        .default(DEFAULT_REGION.to_string())
        .interact_text()?;

    let env = EnvFile {
        key: key.trim().to_string(),
        port,
        region: region.trim().to_lowercase(),
    };
    env.write(path)?;

    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

/// Print the route table
fn cmd_routes() -> Result<()> {
    let table = RouteTable::standard()?;

    println!("{}", format!("{:<44} {:<32} {:<6} {}", "ROUTE", "TARGET", "CACHE", "GROUP").bold());
    for entry in table.entries() {
        let (route, target, tier, group) = route_row(entry);
        let tier = match entry.tier {
            CacheTier::Long => tier.green(),
            CacheTier::Short => tier.yellow(),
            CacheTier::None => tier.dimmed(),
        };
        println!("{:<44} {} {} {}", route, format!("{:<32}", target).cyan(), tier, group);
    }
    println!("\n{} routes", table.len());
    Ok(())
}

/// Plain-text columns for one route.
fn route_row(entry: &RouteEntry) -> (String, String, String, String) {
    let target = match entry.target {
        RouteTarget::Upstream(op) => op.name().to_string(),
        other => other.to_string(),
    };
    let group = if entry.target == RouteTarget::ClearCache {
        "purges :id".to_string()
    } else {
        let probe = [("id", ":id"), ("name", ":name")].into_iter().collect();
        entry.cache_group(&probe).unwrap_or_else(|| "-".to_string())
    };
    (
        entry.template.to_string(),
        target,
        format!("{:<6}", entry.tier.to_string()),
        group,
    )
}
