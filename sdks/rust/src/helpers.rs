//! Convenience functions for processes run under the gamecenter supervisor.
//!
//! A managed process has two obligations:
//! - print its readiness line twice on stdout, once when it begins starting
//!   and once (with the same token) when it is ready to serve
//! - exit when the supervisor writes the quit sentinel to its stdin
//!
//! [`run_managed`] takes care of both so the process only supplies its
//! initialisation and its service body.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamecenter_client::helpers::run_managed;
//! use gamecenter_client::Role;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     run_managed(
//!         Role::RelayGate,
//!         || async { Ok(()) },
//!         |mut shutdown| async move {
//!             let _ = shutdown.changed().await;
//!             Ok(())
//!         },
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

use crate::types::{ReadinessToken, Role};
use crate::wire::ReadinessLine;
use std::future::Future;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Errors that can occur when running helper functions.
#[derive(Debug, Error)]
pub enum HelperError {
    /// Failed to write a readiness line to stdout.
    #[error("failed to announce readiness: {0}")]
    AnnounceFailed(#[from] std::io::Error),

    /// User-provided initialisation returned an error.
    #[error("initialisation failed: {0}")]
    Init(String),

    /// User-provided service body returned an error.
    #[error("user function error: {0}")]
    UserFunction(String),

    /// Failed to set up signal handler.
    #[error("failed to set up signal handler: {0}")]
    SignalHandlerFailed(String),
}

/// Result type for helper functions.
pub type HelperResult<T> = std::result::Result<T, HelperError>;

/// Environment variable the supervisor uses to pass its quit sentinel.
pub const QUIT_SENTINEL_ENV: &str = "GAMECENTER_QUIT_SENTINEL";

/// Sentinel used when the environment does not name one.
pub const DEFAULT_QUIT_SENTINEL: &str = "QUIT";

/// Shutdown signal receiver type.
///
/// Call `.changed().await` to wait for the supervisor to ask for a quit.
pub type ShutdownReceiver = watch::Receiver<bool>;

fn resolve_sentinel() -> String {
    std::env::var(QUIT_SENTINEL_ENV).unwrap_or_else(|_| DEFAULT_QUIT_SENTINEL.to_string())
}

/// Print one readiness line and flush it so the supervisor sees it at once.
///
/// # Errors
///
/// Returns an I/O error if stdout is closed.
pub fn announce(line: &ReadinessLine) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

/// Read lines until one equals `sentinel`.
///
/// Returns `true` when the sentinel arrived and `false` when the stream
/// ended first. End of input is not a quit request: the supervisor may exit
/// and leave its children running.
pub async fn wait_for_sentinel<R>(reader: R, sentinel: &str) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim() == sentinel {
            return true;
        }
    }
    false
}

/// Run a managed process.
///
/// This function handles the readiness handshake and quit handling:
/// - Generates a fresh [`ReadinessToken`] and prints the registration line
/// - Awaits `init_fn`
/// - Prints the confirmation line with the same token
/// - Calls `run_fn` with a shutdown receiver that fires when the quit
///   sentinel (from `GAMECENTER_QUIT_SENTINEL`, default `QUIT`) is read from
///   stdin or SIGTERM arrives
///
/// # Errors
///
/// Returns an error if stdout is closed, the signal handler cannot be
/// installed, or either user function fails.
pub async fn run_managed<I, IFut, R, RFut>(role: Role, init_fn: I, run_fn: R) -> HelperResult<()>
where
    I: FnOnce() -> IFut,
    IFut: Future<Output = Result<(), String>>,
    R: FnOnce(ShutdownReceiver) -> RFut,
    RFut: Future<Output = Result<(), String>>,
{
    let token = ReadinessToken::new();
    let line = ReadinessLine::new(role, &token);

    announce(&line)?;
    init_fn().await.map_err(HelperError::Init)?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sentinel = resolve_sentinel();
    let stdin_tx = shutdown_tx.clone();
    let stdin_task = tokio::spawn(async move {
        if wait_for_sentinel(BufReader::new(tokio::io::stdin()), &sentinel).await {
            let _ = stdin_tx.send(true);
        }
    });

    #[cfg(unix)]
    let signal_task = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| HelperError::SignalHandlerFailed(e.to_string()))?;
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            sigterm.recv().await;
            let _ = signal_tx.send(true);
        })
    };

    announce(&line)?;

    let result = run_fn(shutdown_rx).await;

    stdin_task.abort();
    #[cfg(unix)]
    signal_task.abort();
    drop(shutdown_tx);

    result.map_err(HelperError::UserFunction)
}
