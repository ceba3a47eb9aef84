use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tab_reconciler::{
    ManagedTabRegistry, MemoryHost, PollScheduler, ReconciliationEngine, TabHost, TabInventory,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

mod client;
mod config;
mod control;
mod devtools;
mod persistence;
mod sources;

use client::ControlError;
use config::{LiveTabsConfig, ResolvedConfig};
use control::AppState;
use devtools::CdpHost;
use persistence::JsonRegistryStore;
use sources::SharedResolver;

#[derive(Parser)]
#[command(name = "livetabs")]
#[command(about = "Keep browser tabs open for the followed channels that are live")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to ~/.livetabs)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poll loop and control server in the foreground
    Run(RunArgs),

    /// Force a poll cycle on the running daemon
    Poll,

    /// Re-read config.toml and the follows file
    Reload,

    /// Show diagnostics from the running daemon
    Status(StatusArgs),

    /// Enable or disable polling (flips the current state by default)
    Toggle(ToggleArgs),

    /// Check that the daemon is alive
    Ping,
}

#[derive(Parser)]
struct RunArgs {
    /// Use an in-memory browser instead of DevTools; no real tabs are touched
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ToggleArgs {
    #[arg(long, conflicts_with = "off")]
    on: bool,

    #[arg(long)]
    off: bool,
}

impl ToggleArgs {
    fn requested(&self) -> Option<bool> {
        match (self.on, self.off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = LiveTabsConfig::new(cli.data_dir.clone())?;

    let resolved = config.load()?;
    let result = match cli.command {
        Commands::Run(args) => return run_daemon(args, config, resolved).await,
        Commands::Poll => client::poll_command(&resolved.control).await,
        Commands::Reload => client::reload_command(&resolved.control).await,
        Commands::Status(args) => client::status_command(&resolved.control, args.json).await,
        Commands::Toggle(args) => client::toggle_command(&resolved.control, args.requested()).await,
        Commands::Ping => client::ping_command(&resolved.control).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(ControlError::Unavailable) => {
            eprintln!("livetabs daemon is not running (start it with `livetabs run`)");
            std::process::exit(1);
        }
        Err(ControlError::Other(e)) => Err(e),
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "livetabs=debug,tab_reconciler=debug,tower_http=debug,info"
    } else {
        "livetabs=info,tab_reconciler=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

async fn run_daemon(args: RunArgs, config: LiveTabsConfig, resolved: ResolvedConfig) -> Result<()> {
    info!("Starting livetabs");
    info!("Config file: {}", config.config_toml_path().display());

    let host: Arc<dyn TabHost> = if args.dry_run {
        info!("Dry run: using an in-memory browser");
        Arc::new(MemoryHost::new())
    } else {
        info!("Browser DevTools at {}", resolved.browser.devtools_url);
        Arc::new(CdpHost::new(
            resolved.browser.devtools_url.clone(),
            resolved.browser.background,
            resolved.live.request_timeout,
        )?)
    };

    let resolver = Arc::new(SharedResolver::new(sources::build_resolver(
        &resolved.live,
        &resolved.browser.site,
    )?));

    let store = JsonRegistryStore::new(config.registry_path());
    info!("Managed tab registry: {}", store.path().display());
    let registry = ManagedTabRegistry::new(Box::new(store));
    let inventory = TabInventory::new(resolved.browser.site.clone());
    let engine = ReconciliationEngine::new(host, inventory, registry);

    let scheduler = Arc::new(PollScheduler::new(
        engine,
        resolver.clone(),
        resolved.poll.clone(),
    ));

    let cancel = CancellationToken::new();
    let poll_task = tokio::spawn(scheduler.clone().run(cancel.clone()));

    let state = AppState::new(
        scheduler,
        resolver,
        config.data_dir.clone(),
        resolved.file.clone(),
    );
    let app = control::router(state);

    let addr = resolved.control.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind control server to {}", addr))?;
    info!("Control server listening on http://{}", listener.local_addr()?);
    info!(
        "Tracking {} followed / {} priority channel(s), max {} tab(s)",
        resolved.poll.follows.len(),
        resolved.poll.priority.len(),
        resolved.poll.max_tabs
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    cancel.cancel();
    if let Err(e) = poll_task.await {
        warn!("Poll task ended abnormally: {}", e);
    }

    info!("Shutdown complete");
    server_result
}
