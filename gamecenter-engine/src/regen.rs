//! Per-instance configuration regeneration.
//!
//! Gate roles share one executable directory, so the file each gate reads at
//! startup is rewritten for the instance about to be launched.

use crate::config::ClusterConfig;
use crate::error::RegenError;
use crate::roles::{Role, RoleKey};
use serde::Serialize;
use tracing::debug;

/// Writes the configuration file a gate instance reads at startup.
///
/// Invoked before every launch of a multi-instance role, including restarts
/// after a crash.
pub trait ConfigRegenerator: Send {
    /// Regenerate the configuration of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegenError`] if the file cannot be produced.
    fn regenerate(&self, key: RoleKey) -> Result<(), RegenError>;

    /// Replace the configuration snapshot used for later regenerations.
    fn reconfigure(&mut self, _config: &ClusterConfig) {}
}

/// Regenerator that writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegenerator;

impl ConfigRegenerator for NoopRegenerator {
    fn regenerate(&self, _key: RoleKey) -> Result<(), RegenError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Endpoint<'a> {
    address: &'a str,
    port: u16,
}

#[derive(Debug, Serialize)]
struct InstanceFile<'a> {
    title: &'a str,
    role: &'a str,
    instance: usize,
    gate: Endpoint<'a>,
    server: Endpoint<'a>,
}

/// Writes `<game_directory>/<role directory>/<instance_config_file>` as TOML.
#[derive(Debug, Clone)]
pub struct TomlInstanceWriter {
    config: ClusterConfig,
}

impl TomlInstanceWriter {
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Render the file contents for `key` without writing it.
    ///
    /// # Errors
    ///
    /// Returns [`RegenError`] for a non-gate role, a missing port or a
    /// serialization failure.
    pub fn render(&self, key: RoleKey) -> Result<String, RegenError> {
        let (upstream, setting) = match key.role {
            Role::RelayGate => (&self.config.core_engine, "core_engine.gate_port"),
            Role::SelectorGate => (&self.config.database, "database.gate_port"),
            Role::LoginGate => (&self.config.auth, "auth.gate_port"),
            _ => return Err(RegenError::NotAGate(key)),
        };

        let gate_port = self
            .config
            .gate_port(key)
            .ok_or(RegenError::MissingSetting {
                key,
                setting: "gate_port",
            })?;
        let server_port = upstream
            .gate_port
            .ok_or(RegenError::MissingSetting { key, setting })?;

        let engine = &self.config.engine;
        let title = format!("{} - {key}", engine.name);
        let file = InstanceFile {
            title: &title,
            role: key.role.as_str(),
            instance: key.index,
            gate: Endpoint {
                address: &engine.listen_address,
                port: gate_port,
            },
            server: Endpoint {
                address: &engine.server_address,
                port: server_port,
            },
        };

        toml::to_string(&file).map_err(|source| RegenError::Serialize { key, source })
    }
}

impl ConfigRegenerator for TomlInstanceWriter {
    fn regenerate(&self, key: RoleKey) -> Result<(), RegenError> {
        let content = self.render(key)?;
        let path = self
            .config
            .role_directory(key.role)
            .join(&self.config.engine.instance_config_file);

        std::fs::write(&path, content).map_err(|source| RegenError::Io { key, source })?;
        debug!(process = %key, path = %path.display(), "Regenerated instance configuration");
        Ok(())
    }

    fn reconfigure(&mut self, config: &ClusterConfig) {
        self.config = config.clone();
    }
}
