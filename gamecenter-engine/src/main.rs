//! Game Center Engine - cluster supervisor.
//!
//! This is the main entry point, which:
//! - Loads configuration from TOML
//! - Opens the JSON event log when one is configured
//! - Starts the supervisor and launches the cluster
//! - Stops the cluster in order on SIGTERM or Ctrl+C

use anyhow::{Context, Result};
use clap::Parser;
use gamecenter_engine::{
    ClusterConfig, ClusterPhase, EventSinks, JsonEventLog, Supervisor, TokioLauncher,
    TomlInstanceWriter, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Game Center Engine - starts, watches and stops a game-server cluster
#[derive(Parser, Debug)]
#[command(name = "gamecenter")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the event log directory from config
    #[arg(short, long, value_name = "DIR")]
    event_log: Option<PathBuf>,

    /// Load the configuration and wait without launching anything
    #[arg(long)]
    no_start: bool,

    /// Run in verbose mode (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

/// Load configuration from the given path or default locations.
fn load_config(path: Option<PathBuf>) -> Result<ClusterConfig> {
    let config_path = path.unwrap_or_else(|| {
        let local = PathBuf::from("gamecenter.toml");
        if local.exists() {
            return local;
        }

        if let Some(dirs) = directories::ProjectDirs::from("net", "gamecenter", "gamecenter") {
            let xdg_config = dirs.config_dir().join("gamecenter.toml");
            if xdg_config.exists() {
                return xdg_config;
            }
        }

        local
    });

    info!("Loading configuration from {}", config_path.display());
    Ok(ClusterConfig::load(&config_path)?)
}

/// SIGTERM and SIGINT, received as many times as they arrive.
#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?,
            interrupt: signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?,
        })
    }

    async fn recv(&mut self) -> Result<&'static str> {
        tokio::select! {
            _ = self.terminate.recv() => Ok("SIGTERM"),
            _ = self.interrupt.recv() => Ok("SIGINT (Ctrl+C)"),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        Ok("Ctrl+C")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug,gamecenter_engine=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(args.config).context("Failed to load configuration")?;
    info!("Cluster name: {}", config.engine.name);

    for (role, directory) in config.missing_directories() {
        warn!(
            "{role} directory {} does not exist; launching it will fail",
            directory.display()
        );
    }

    let mut sinks = EventSinks::new().with(TracingSink);
    if let Some(dir) = args.event_log.or_else(|| config.engine.event_log_dir.clone()) {
        info!("Writing cluster events to {}", dir.display());
        let log = JsonEventLog::new(&dir).context("Failed to create JSON event log")?;
        sinks.push(Box::new(log));
    }

    let launcher = Arc::new(TokioLauncher::new(config.engine.quit_signal()));
    let regenerator = Box::new(TomlInstanceWriter::new(config.clone()));
    let (supervisor, handle) = Supervisor::new(config, launcher, regenerator, Box::new(sinks))
        .context("Invalid configuration")?;
    let supervisor_task = tokio::spawn(supervisor.run());

    let mut signals = Signals::new()?;

    if args.no_start {
        info!("Supervisor idle (--no-start); waiting for a signal");
    } else {
        handle.start().await.context("Failed to start cluster")?;
        info!("Cluster startup begun");
    }

    let received = signals.recv().await?;
    info!("Received {received}");
    info!("Shutdown signal received...");

    if handle.phase().can_stop() {
        handle.stop().await.context("Failed to begin shutdown")?;
        info!("Stopping cluster; signal again to exit without waiting");
        tokio::select! {
            stopped = handle.wait_for_phase(ClusterPhase::Stopped) => {
                stopped.context("Supervisor exited during shutdown")?;
                info!("All processes stopped");
            }
            again = signals.recv() => {
                warn!("Received {} during shutdown; remaining processes are left running", again?);
            }
        }
    }

    handle.shutdown();
    supervisor_task.await.context("Supervisor task failed")?;

    info!("Game Center Engine shutdown complete.");

    Ok(())
}
