//! Spawning and controlling OS processes.
//!
//! The [`Launcher`] trait is the seam between the sequencers and the
//! operating system. [`TokioLauncher`] spawns real child processes with piped
//! stdin and stdout; tests substitute an in-memory fake.

use crate::config::WindowPosition;
use crate::error::LaunchError;
use crate::roles::RoleKey;
use gamecenter_client::helpers::QUIT_SENTINEL_ENV;
use gamecenter_client::{INSTANCE_ENV, ROLE_ENV, WINDOW_X_ENV, WINDOW_Y_ENV};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel carrying raw stdout lines from every managed process.
pub type OutputSender = mpsc::UnboundedSender<String>;

/// Everything needed to launch one managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub key: RoleKey,
    /// Working directory; the program is resolved inside it.
    pub directory: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub window: WindowPosition,
}

impl LaunchSpec {
    /// Full path of the executable.
    #[must_use]
    pub fn executable(&self) -> PathBuf {
        self.directory.join(&self.program)
    }
}

/// How a graceful quit is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitSignal {
    /// Write this line to stdin.
    Sentinel(String),
    /// Send SIGTERM.
    Sigterm,
}

/// A live (or recently live) child process.
pub trait ProcessHandle: Send {
    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness probe.
    fn is_alive(&mut self) -> bool;

    /// Ask the process to exit cleanly.
    fn request_quit(&mut self) -> std::io::Result<()>;

    /// Terminate the process immediately.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Spawns managed processes.
pub trait Launcher: Send + Sync {
    /// Launch a process, forwarding each of its stdout lines to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] if the directory is missing or the spawn fails.
    fn launch(
        &self,
        spec: &LaunchSpec,
        output: OutputSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError>;
}

/// Launcher backed by `tokio::process`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioLauncher {
    quit: QuitSignal,
}

impl TokioLauncher {
    /// Create a launcher delivering graceful quits with `quit`.
    #[must_use]
    pub fn new(quit: QuitSignal) -> Self {
        Self { quit }
    }
}

impl Launcher for TokioLauncher {
    fn launch(
        &self,
        spec: &LaunchSpec,
        output: OutputSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        if !spec.directory.is_dir() {
            return Err(LaunchError::MissingDirectory {
                key: spec.key,
                path: spec.directory.clone(),
            });
        }

        let program = spec.executable();
        let mut cmd = Command::new(&program);
        cmd.current_dir(&spec.directory)
            .args(&spec.args)
            .envs(&spec.env)
            .env(ROLE_ENV, spec.key.role.as_str())
            .env(INSTANCE_ENV, spec.key.index.to_string())
            .env(WINDOW_X_ENV, spec.window.x.to_string())
            .env(WINDOW_Y_ENV, spec.window.y.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let QuitSignal::Sentinel(sentinel) = &self.quit {
            cmd.env(QUIT_SENTINEL_ENV, sentinel);
        }

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            key: spec.key,
            program: program.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            let key = spec.key;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if output.send(line).is_err() {
                        break;
                    }
                }
                debug!(process = %key, "stdout closed");
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let key = spec.key;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = %key, "{line}");
                }
            });
        }

        let stdin = child.stdin.take();
        debug!(process = %spec.key, pid = ?child.id(), program = %program.display(), "Spawned process");

        Ok(Box::new(TokioProcess {
            key: spec.key,
            child,
            stdin,
            quit: self.quit.clone(),
        }))
    }
}

/// Handle to a child spawned by [`TokioLauncher`].
#[derive(Debug)]
pub struct TokioProcess {
    key: RoleKey,
    child: Child,
    stdin: Option<ChildStdin>,
    quit: QuitSignal,
}

impl ProcessHandle for TokioProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(process = %self.key, %status, "Process exited");
                false
            }
            Err(e) => {
                warn!(process = %self.key, "Failed to poll process: {e}");
                false
            }
        }
    }

    fn request_quit(&mut self) -> std::io::Result<()> {
        match &self.quit {
            QuitSignal::Sentinel(sentinel) => {
                let mut stdin = self.stdin.take().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin already closed")
                })?;
                let line = format!("{sentinel}\n");
                let key = self.key;
                tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(line.as_bytes()).await {
                        warn!(process = %key, "Failed to write quit sentinel: {e}");
                        return;
                    }
                    let _ = stdin.flush().await;
                });
                Ok(())
            }
            QuitSignal::Sigterm => send_sigterm(self.child.id()),
        }
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(unix)]
fn send_sigterm(pid: Option<u32>) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = pid.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "process already reaped")
    })?;
    let pid = i32::try_from(pid)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn send_sigterm(_pid: Option<u32>) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "SIGTERM is only available on unix",
    ))
}
