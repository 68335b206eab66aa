//! Stub Server
//!
//! Stands in for any gamecenter-managed server. It performs the readiness
//! handshake for the given role, idles until the supervisor writes the quit
//! sentinel, then exits. `--exit-after-ms` makes it die on its own so the
//! supervisor's crash recovery can be watched.
//!
//! # Usage
//!
//! ```bash
//! # Behave like a relay gate that takes two seconds to warm up
//! stub_server --role relay_gate --warmup-ms 2000
//!
//! # Crash ten seconds after becoming ready
//! stub_server --role core_engine --exit-after-ms 10000
//! ```

use clap::Parser;
use gamecenter_client::helpers::run_managed;
use gamecenter_client::{Role, INSTANCE_ENV, ROLE_ENV};
use std::time::Duration;

/// Stub Server - speaks the readiness handshake and honours the quit sentinel.
#[derive(Parser, Debug)]
#[command(name = "stub_server")]
#[command(about = "Stand-in game server for exercising a gamecenter cluster")]
struct Args {
    /// Role to announce (machine name, e.g. `relay_gate`). Defaults to the
    /// `GAMECENTER_ROLE` environment variable set by the supervisor.
    #[arg(short, long)]
    role: Option<Role>,

    /// Time between registration and confirmation, in milliseconds.
    #[arg(short, long, default_value = "500")]
    warmup_ms: u64,

    /// Exit by itself this long after becoming ready (0 = never).
    #[arg(short, long, default_value = "0")]
    exit_after_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let role = match args.role {
        Some(role) => role,
        None => std::env::var(ROLE_ENV)?.parse::<Role>()?,
    };
    let instance = std::env::var(INSTANCE_ENV).unwrap_or_else(|_| "0".to_string());

    let warmup = Duration::from_millis(args.warmup_ms);
    let exit_after = args.exit_after_ms;

    run_managed(
        role,
        || async move {
            tokio::time::sleep(warmup).await;
            Ok(())
        },
        |mut shutdown| async move {
            eprintln!("{role} #{instance} ready");
            if exit_after == 0 {
                let _ = shutdown.changed().await;
                eprintln!("{role} #{instance} quitting");
                return Ok(());
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    eprintln!("{role} #{instance} quitting");
                    Ok(())
                }
                _ = tokio::time::sleep(Duration::from_millis(exit_after)) => {
                    Err(format!("{role} #{instance} simulated crash"))
                }
            }
        },
    )
    .await?;

    Ok(())
}
