//! Configuration loading and management for the gamecenter supervisor.
//!
//! The configuration is stored in TOML format and defines:
//! - Engine settings (tick interval, grace timeout, drain delay, quit method)
//! - The launch mode gating the login gates
//! - Launch parameters for every role and gate instance

use crate::launcher::{LaunchSpec, QuitSignal};
use crate::process::ManagedProcess;
use crate::roles::{Role, RoleKey};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// How a graceful quit is requested from a managed process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuitMethod {
    /// Write the quit sentinel line to the process's stdin.
    #[default]
    Stdin,
    /// Send SIGTERM (unix only).
    Sigterm,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name of this deployment, written into regenerated gate configs.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Root directory holding one sub-directory per role.
    #[serde(default = "default_game_directory")]
    pub game_directory: PathBuf,

    /// Interval between sequencer ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Grace period after a quit request before the process is killed.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Pause between the last relay gate stopping and the core engine quit.
    #[serde(default = "default_drain_delay_secs")]
    pub drain_delay_secs: u64,

    /// How graceful quits are requested.
    #[serde(default)]
    pub quit_method: QuitMethod,

    /// Line written to stdin when `quit_method = "stdin"`.
    #[serde(default = "default_quit_sentinel")]
    pub quit_sentinel: String,

    /// Directory for the JSON-lines event log. No log when unset.
    #[serde(default)]
    pub event_log_dir: Option<PathBuf>,

    /// File name of the regenerated per-instance gate configuration.
    #[serde(default = "default_instance_config_file")]
    pub instance_config_file: String,

    /// Address gates listen on, written into regenerated gate configs.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Address gates use to reach their upstream server.
    #[serde(default = "default_server_address")]
    pub server_address: String,
}

fn default_engine_name() -> String {
    "gamecenter".to_string()
}

fn default_game_directory() -> PathBuf {
    PathBuf::from("./server")
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_stop_timeout_secs() -> u64 {
    30
}

const fn default_drain_delay_secs() -> u64 {
    5
}

fn default_quit_sentinel() -> String {
    gamecenter_client::helpers::DEFAULT_QUIT_SENTINEL.to_string()
}

fn default_instance_config_file() -> String {
    "gate.toml".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            game_directory: default_game_directory(),
            tick_interval_ms: default_tick_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
            drain_delay_secs: default_drain_delay_secs(),
            quit_method: QuitMethod::default(),
            quit_sentinel: default_quit_sentinel(),
            event_log_dir: None,
            instance_config_file: default_instance_config_file(),
            listen_address: default_listen_address(),
            server_address: default_server_address(),
        }
    }
}

impl EngineConfig {
    /// Interval between sequencer ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Number of ticks covering `secs`, rounded up.
    #[must_use]
    pub fn ticks_for_secs(&self, secs: u64) -> u64 {
        let interval = self.tick_interval_ms.max(1);
        secs.saturating_mul(1000).div_ceil(interval)
    }

    /// The quit request the launcher should deliver.
    #[must_use]
    pub fn quit_signal(&self) -> QuitSignal {
        match self.quit_method {
            QuitMethod::Stdin => QuitSignal::Sentinel(self.quit_sentinel.clone()),
            QuitMethod::Sigterm => QuitSignal::Sigterm,
        }
    }
}

/// Which launch mode gates the login gates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LaunchModeKind {
    #[default]
    Immediate,
    Delayed,
    Scheduled,
}

/// Launch gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default)]
    pub mode: LaunchModeKind,

    /// Hours of delay, or the hour of day for `scheduled`.
    #[serde(default)]
    pub hours: u32,

    /// Minutes of delay, or the minute of the hour for `scheduled`.
    #[serde(default)]
    pub minutes: u32,
}

/// Resolved launch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Login gates start as soon as the selector gates are running.
    Immediate,
    /// Login gates wait until this long after the cluster start.
    Delayed(Duration),
    /// Login gates wait until this local clock time (the next occurrence).
    Scheduled(NaiveTime),
}

impl LaunchConfig {
    /// Resolve the configured mode.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an impossible time of day.
    pub fn mode(&self) -> Result<LaunchMode, ConfigError> {
        match self.mode {
            LaunchModeKind::Immediate => Ok(LaunchMode::Immediate),
            LaunchModeKind::Delayed => Ok(LaunchMode::Delayed(Duration::from_secs(
                u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60,
            ))),
            LaunchModeKind::Scheduled => NaiveTime::from_hms_opt(self.hours, self.minutes, 0)
                .map(LaunchMode::Scheduled)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "Scheduled launch time {:02}:{:02} is not a time of day",
                        self.hours, self.minutes
                    ))
                }),
        }
    }
}

/// Initial window position handed to a managed process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

/// Configuration for a single-instance role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Whether this role takes part in a run.
    #[serde(default)]
    pub enabled: bool,

    /// Directory under `game_directory` holding the executable.
    #[serde(default)]
    pub directory: PathBuf,

    /// Executable file name.
    #[serde(default)]
    pub program: String,

    /// Command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set.
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub window: WindowPosition,

    /// Whether the health monitor relaunches the process after a crash.
    #[serde(default = "default_restart_on_exit")]
    pub restart_on_exit: bool,

    /// Port gates connect to.
    #[serde(default)]
    pub gate_port: Option<u16>,

    /// Port other servers connect to.
    #[serde(default)]
    pub server_port: Option<u16>,
}

const fn default_restart_on_exit() -> bool {
    true
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::new(),
            program: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            window: WindowPosition::default(),
            restart_on_exit: default_restart_on_exit(),
            gate_port: None,
            server_port: None,
        }
    }
}

/// One instance of a gate role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateInstanceConfig {
    #[serde(default = "default_instance_enabled")]
    pub enabled: bool,

    /// Port clients connect to.
    pub gate_port: u16,
}

const fn default_instance_enabled() -> bool {
    true
}

/// Configuration for a gate role with one or more instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateGroupConfig {
    #[serde(default)]
    pub directory: PathBuf,

    #[serde(default)]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub window: WindowPosition,

    #[serde(default = "default_restart_on_exit")]
    pub restart_on_exit: bool,

    /// Instances in index order.
    #[serde(default)]
    pub instances: Vec<GateInstanceConfig>,
}

impl Default for GateGroupConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            program: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            window: WindowPosition::default(),
            restart_on_exit: default_restart_on_exit(),
            instances: Vec::new(),
        }
    }
}

/// Common interface for single-role and gate-group configurations.
///
/// This trait abstracts over `RoleConfig` and `GateGroupConfig` to enable
/// generic validation.
pub trait ProgramConfig {
    /// Directory under the game directory holding the executable.
    fn directory(&self) -> &Path;

    /// Executable file name.
    fn program(&self) -> &str;

    /// Whether at least one instance is enabled.
    fn any_enabled(&self) -> bool;
}

impl ProgramConfig for RoleConfig {
    fn directory(&self) -> &Path {
        &self.directory
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn any_enabled(&self) -> bool {
        self.enabled
    }
}

impl ProgramConfig for GateGroupConfig {
    fn directory(&self) -> &Path {
        &self.directory
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn any_enabled(&self) -> bool {
        self.instances.iter().any(|i| i.enabled)
    }
}

/// Check that every enabled role names a program (pure function).
fn check_program_named(role: Role, config: &dyn ProgramConfig) -> Result<(), ConfigError> {
    if config.any_enabled() && config.program().trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{role} is enabled but has no program"
        )));
    }
    Ok(())
}

/// Relay gate window offset: pairs side by side, second row for 2,3,6,7.
fn relay_window(base: WindowPosition, index: usize) -> WindowPosition {
    let x = if index % 2 == 1 { base.x + 276 } else { base.x };
    let y = if matches!(index, 2 | 3 | 6 | 7) {
        base.y + 187
    } else {
        base.y
    };
    WindowPosition { x, y }
}

/// Complete gamecenter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub launch: LaunchConfig,

    #[serde(default)]
    pub database: RoleConfig,

    #[serde(default)]
    pub auth: RoleConfig,

    #[serde(default)]
    pub logging: RoleConfig,

    #[serde(default)]
    pub core_engine: RoleConfig,

    #[serde(default)]
    pub relay_gate: GateGroupConfig,

    #[serde(default)]
    pub selector_gate: GateGroupConfig,

    #[serde(default)]
    pub login_gate: GateGroupConfig,

    #[serde(default)]
    pub plugin: RoleConfig,
}

impl ClusterConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a single-instance role.
    #[must_use]
    pub fn role(&self, role: Role) -> Option<&RoleConfig> {
        match role {
            Role::Database => Some(&self.database),
            Role::Auth => Some(&self.auth),
            Role::Logging => Some(&self.logging),
            Role::CoreEngine => Some(&self.core_engine),
            Role::Plugin => Some(&self.plugin),
            Role::RelayGate | Role::SelectorGate | Role::LoginGate => None,
        }
    }

    /// Configuration for a gate role.
    #[must_use]
    pub fn gate_group(&self, role: Role) -> Option<&GateGroupConfig> {
        match role {
            Role::RelayGate => Some(&self.relay_gate),
            Role::SelectorGate => Some(&self.selector_gate),
            Role::LoginGate => Some(&self.login_gate),
            _ => None,
        }
    }

    /// Gate roles fall through to the plugin table; callers check
    /// `gate_group` first.
    fn single_role(&self, role: Role) -> &RoleConfig {
        self.role(role).unwrap_or(&self.plugin)
    }

    fn program_config(&self, role: Role) -> &dyn ProgramConfig {
        match self.gate_group(role) {
            Some(group) => group,
            None => self.single_role(role),
        }
    }

    /// Validate the configuration structure (pure function).
    ///
    /// Checks instance counts, tick interval, launch time, program names and
    /// gate port uniqueness without performing I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.engine.quit_method == QuitMethod::Stdin && self.engine.quit_sentinel.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "quit_sentinel cannot be empty".to_string(),
            ));
        }

        self.launch.mode()?;

        for role in [Role::RelayGate, Role::SelectorGate, Role::LoginGate] {
            if let Some(group) = self.gate_group(role) {
                if group.instances.len() > role.max_instances() {
                    return Err(ConfigError::ValidationError(format!(
                        "{role} supports at most {} instances, {} configured",
                        role.max_instances(),
                        group.instances.len()
                    )));
                }
            }
        }

        for role in Role::ALL {
            check_program_named(role, self.program_config(role))?;
        }

        let mut ports = std::collections::HashSet::new();
        for role in [Role::RelayGate, Role::SelectorGate, Role::LoginGate] {
            let Some(group) = self.gate_group(role) else {
                continue;
            };
            for (index, instance) in group.instances.iter().enumerate() {
                if instance.enabled && !ports.insert(instance.gate_port) {
                    return Err(ConfigError::ValidationError(format!(
                        "Duplicate gate port {} on {}",
                        instance.gate_port,
                        RoleKey::new(role, index)
                    )));
                }
            }
        }

        Ok(())
    }

    /// Directories of enabled roles that do not exist (impure function).
    ///
    /// Launching from a missing directory faults the role, so callers
    /// usually report these before starting.
    #[must_use]
    pub fn missing_directories(&self) -> Vec<(Role, PathBuf)> {
        Role::ALL
            .into_iter()
            .filter(|role| self.program_config(*role).any_enabled())
            .map(|role| (role, self.role_directory(role)))
            .filter(|(_, dir)| !dir.is_dir())
            .collect()
    }

    /// Resolved executable directory of a role.
    #[must_use]
    pub fn role_directory(&self, role: Role) -> PathBuf {
        self.engine
            .game_directory
            .join(self.program_config(role).directory())
    }

    /// Number of records configured for a role.
    #[must_use]
    pub fn instance_count(&self, role: Role) -> usize {
        match self.gate_group(role) {
            Some(group) => group.instances.len(),
            None => 1,
        }
    }

    /// Whether a record takes part in a run.
    #[must_use]
    pub fn is_enabled(&self, key: RoleKey) -> bool {
        match self.gate_group(key.role) {
            Some(group) => group.instances.get(key.index).is_some_and(|i| i.enabled),
            None => key.index == 0 && self.role(key.role).is_some_and(|r| r.enabled),
        }
    }

    /// Whether the health monitor relaunches this role after a crash.
    #[must_use]
    pub fn restart_on_exit(&self, role: Role) -> bool {
        match self.gate_group(role) {
            Some(group) => group.restart_on_exit,
            None => self.role(role).is_some_and(|r| r.restart_on_exit),
        }
    }

    /// Gate port of one gate instance.
    #[must_use]
    pub fn gate_port(&self, key: RoleKey) -> Option<u16> {
        self.gate_group(key.role)
            .and_then(|group| group.instances.get(key.index))
            .map(|i| i.gate_port)
    }

    /// Launch parameters of one record.
    #[must_use]
    pub fn launch_spec(&self, key: RoleKey) -> LaunchSpec {
        let directory = self.role_directory(key.role);
        let (program, args, env, window) = match self.gate_group(key.role) {
            Some(group) => {
                let window = if key.role == Role::RelayGate {
                    relay_window(group.window, key.index)
                } else {
                    group.window
                };
                (&group.program, &group.args, &group.env, window)
            }
            None => {
                let cfg = self.single_role(key.role);
                (&cfg.program, &cfg.args, &cfg.env, cfg.window)
            }
        };

        LaunchSpec {
            key,
            directory,
            program: program.clone(),
            args: args.clone(),
            env: env.clone(),
            window,
        }
    }

    /// Build the roster of managed processes in startup order.
    #[must_use]
    pub fn roster(&self) -> Vec<ManagedProcess> {
        Role::ALL
            .into_iter()
            .flat_map(|role| (0..self.instance_count(role)).map(move |i| RoleKey::new(role, i)))
            .map(|key| {
                ManagedProcess::new(
                    self.launch_spec(key),
                    self.is_enabled(key),
                    self.restart_on_exit(key.role),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[engine]
name = "mir"
game_directory = "/srv/mir"
tick_interval_ms = 500
stop_timeout_secs = 10
drain_delay_secs = 5
quit_method = "stdin"
quit_sentinel = "SHUTDOWN"

[launch]
mode = "delayed"
hours = 1
minutes = 30

[database]
enabled = true
directory = "DBServer"
program = "DBServer"
gate_port = 5100
server_port = 6000

[auth]
enabled = true
directory = "LoginSrv"
program = "LoginSrv"
gate_port = 5500
server_port = 5600

[logging]
enabled = false

[core_engine]
enabled = true
directory = "Mir200"
program = "M2Server"
gate_port = 5000
window = { x = 10, y = 20 }

[relay_gate]
directory = "RunGate"
program = "RunGate"
window = { x = 100, y = 50 }
instances = [
    { gate_port = 7200 },
    { gate_port = 7300 },
    { gate_port = 7400, enabled = false },
]

[selector_gate]
directory = "SelGate"
program = "SelGate"
instances = [{ gate_port = 7100 }]

[login_gate]
directory = "LoginGate"
program = "LoginGate"
restart_on_exit = false
instances = [{ gate_port = 7000 }]
"#;

    #[test]
    fn test_parse_minimal_config() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClusterConfig::parse("[engine]\nname = \"test\"\n")?;
        assert_eq!(config.engine.name, "test");
        assert_eq!(config.engine.tick_interval_ms, 1000);
        assert_eq!(config.engine.drain_delay_secs, 5);
        assert_eq!(config.engine.quit_method, QuitMethod::Stdin);
        assert_eq!(config.launch.mode()?, LaunchMode::Immediate);
        assert!(!config.database.enabled);
        Ok(())
    }

    #[test]
    fn test_parse_full_config() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClusterConfig::parse(FULL)?;
        assert_eq!(config.relay_gate.instances.len(), 3);
        assert_eq!(config.engine.ticks_for_secs(config.engine.stop_timeout_secs), 20);
        assert_eq!(
            config.launch.mode()?,
            LaunchMode::Delayed(Duration::from_secs(5400))
        );
        assert_eq!(
            config.engine.quit_signal(),
            QuitSignal::Sentinel("SHUTDOWN".to_string())
        );
        assert!(config.is_enabled(RoleKey::new(Role::RelayGate, 1)));
        assert!(!config.is_enabled(RoleKey::new(Role::RelayGate, 2)));
        assert!(!config.is_enabled(RoleKey::new(Role::RelayGate, 3)));
        assert!(!config.is_enabled(RoleKey::single(Role::Logging)));
        assert!(!config.restart_on_exit(Role::LoginGate));
        Ok(())
    }

    #[test]
    fn test_roster_is_in_startup_order() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClusterConfig::parse(FULL)?;
        let keys: Vec<RoleKey> = config.roster().iter().map(ManagedProcess::key).collect();
        assert_eq!(
            keys,
            vec![
                RoleKey::single(Role::Database),
                RoleKey::single(Role::Auth),
                RoleKey::single(Role::Logging),
                RoleKey::single(Role::CoreEngine),
                RoleKey::new(Role::RelayGate, 0),
                RoleKey::new(Role::RelayGate, 1),
                RoleKey::new(Role::RelayGate, 2),
                RoleKey::new(Role::SelectorGate, 0),
                RoleKey::new(Role::LoginGate, 0),
                RoleKey::single(Role::Plugin),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_launch_spec_resolves_directory_and_window() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClusterConfig::parse(FULL)?;

        let engine = config.launch_spec(RoleKey::single(Role::CoreEngine));
        assert_eq!(engine.directory, PathBuf::from("/srv/mir/Mir200"));
        assert_eq!(engine.program, "M2Server");
        assert_eq!(engine.window, WindowPosition { x: 10, y: 20 });

        let second = config.launch_spec(RoleKey::new(Role::RelayGate, 1));
        assert_eq!(second.window, WindowPosition { x: 376, y: 50 });
        let third = config.launch_spec(RoleKey::new(Role::RelayGate, 2));
        assert_eq!(third.window, WindowPosition { x: 100, y: 237 });
        Ok(())
    }

    #[test]
    fn test_relay_window_grid() {
        let base = WindowPosition { x: 0, y: 0 };
        let grid: Vec<(i32, i32)> = (0..8)
            .map(|i| relay_window(base, i))
            .map(|w| (w.x, w.y))
            .collect();
        assert_eq!(
            grid,
            vec![
                (0, 0),
                (276, 0),
                (0, 187),
                (276, 187),
                (0, 0),
                (276, 0),
                (0, 187),
                (276, 187),
            ]
        );
    }

    #[test]
    fn test_too_many_instances_rejected() {
        let toml = r#"
[selector_gate]
program = "SelGate"
instances = [{ gate_port = 1 }, { gate_port = 2 }, { gate_port = 3 }]
"#;
        let Err(err) = ClusterConfig::parse(toml) else {
            panic!("expected instance count validation to fail");
        };
        assert!(err.to_string().contains("at most 2 instances"));
    }

    #[test]
    fn test_duplicate_gate_port_rejected() {
        let toml = r#"
[relay_gate]
program = "RunGate"
instances = [{ gate_port = 7200 }]

[login_gate]
program = "LoginGate"
instances = [{ gate_port = 7200 }]
"#;
        let Err(err) = ClusterConfig::parse(toml) else {
            panic!("expected duplicate port validation to fail");
        };
        assert!(err.to_string().contains("Duplicate gate port 7200"));
    }

    #[test]
    fn test_enabled_role_without_program_rejected() {
        let result = ClusterConfig::parse("[auth]\nenabled = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let result = ClusterConfig::parse("[engine]\ntick_interval_ms = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_scheduled_launch_time_validated() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClusterConfig::parse("[launch]\nmode = \"scheduled\"\nhours = 21\nminutes = 5\n")?;
        assert_eq!(
            config.launch.mode()?,
            LaunchMode::Scheduled(NaiveTime::from_hms_opt(21, 5, 0).ok_or("time")?)
        );

        let result = ClusterConfig::parse("[launch]\nmode = \"scheduled\"\nhours = 24\n");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_ticks_round_up() {
        let engine = EngineConfig {
            tick_interval_ms: 400,
            ..Default::default()
        };
        assert_eq!(engine.ticks_for_secs(1), 3);
        assert_eq!(engine.ticks_for_secs(0), 0);
        assert_eq!(EngineConfig::default().ticks_for_secs(5), 5);
    }

    #[test]
    fn test_missing_directories_only_for_enabled_roles() {
        let config = ClusterConfig {
            engine: EngineConfig {
                game_directory: PathBuf::from("/nonexistent/gamecenter"),
                ..Default::default()
            },
            database: RoleConfig {
                enabled: true,
                directory: PathBuf::from("DBServer"),
                program: "DBServer".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let missing = config.missing_directories();
        assert_eq!(
            missing,
            vec![(
                Role::Database,
                PathBuf::from("/nonexistent/gamecenter/DBServer")
            )]
        );
    }

    #[test]
    fn test_sample_config_parses() -> Result<(), ConfigError> {
        let config = ClusterConfig::parse(include_str!("../../gamecenter.toml"))?;
        assert_eq!(config.instance_count(Role::RelayGate), 3);
        assert!(!config.is_enabled(RoleKey::new(Role::RelayGate, 2)));
        assert!(!config.is_enabled(RoleKey::single(Role::Plugin)));
        assert_eq!(config.engine.quit_signal(), QuitSignal::Sentinel("QUIT".to_string()));
        Ok(())
    }

    #[test]
    fn test_huge_timeouts_saturate() -> Result<(), ConfigError> {
        let config = ClusterConfig::parse(
            "[engine]\nstop_timeout_secs = 100000000000000000\ndrain_delay_secs = 9223372036854775807\n",
        )?;
        let engine = &config.engine;
        assert_eq!(engine.ticks_for_secs(engine.stop_timeout_secs), u64::MAX / 1000 + 1);
        assert_eq!(engine.ticks_for_secs(engine.drain_delay_secs), u64::MAX / 1000 + 1);
        Ok(())
    }
}
