//! Role table shared by the supervisor and the processes it manages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed kind of supervised process.
///
/// Every role has an integer code that the process prints at the start of
/// each readiness line. Gate roles may run several instances which all share
/// the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Persistent storage tier.
    Database,
    /// Account authentication tier.
    Auth,
    /// Game log collection tier.
    Logging,
    /// Core simulation engine.
    CoreEngine,
    /// Client-facing relay gate in front of the core engine.
    RelayGate,
    /// Character selection gate in front of the database.
    SelectorGate,
    /// Login gate in front of the auth server.
    LoginGate,
    /// Optional auxiliary plugin.
    Plugin,
}

/// Error returned when a role code or role name is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRole {
    /// No role uses this readiness code.
    UnknownCode(u32),
    /// No role uses this name.
    UnknownName(String),
}

impl fmt::Display for InvalidRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCode(code) => write!(f, "unknown role code {code}"),
            Self::UnknownName(name) => write!(f, "unknown role '{name}'"),
        }
    }
}

impl std::error::Error for InvalidRole {}

impl Role {
    /// All roles, in startup order.
    pub const ALL: [Role; 8] = [
        Role::Database,
        Role::Auth,
        Role::Logging,
        Role::CoreEngine,
        Role::RelayGate,
        Role::SelectorGate,
        Role::LoginGate,
        Role::Plugin,
    ];

    /// Readiness code printed by processes of this role.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Database => 1,
            Self::Auth => 2,
            Self::Logging => 3,
            Self::CoreEngine => 4,
            Self::RelayGate => 5,
            Self::SelectorGate => 6,
            Self::LoginGate => 7,
            Self::Plugin => 8,
        }
    }

    /// Look up a role by its readiness code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRole::UnknownCode`] if no role uses `code`.
    pub fn from_code(code: u32) -> Result<Self, InvalidRole> {
        Self::ALL
            .into_iter()
            .find(|role| role.code() == code)
            .ok_or(InvalidRole::UnknownCode(code))
    }

    /// Maximum number of instances the supervisor will run for this role.
    #[must_use]
    pub const fn max_instances(self) -> usize {
        match self {
            Self::RelayGate => 8,
            Self::SelectorGate | Self::LoginGate => 2,
            _ => 1,
        }
    }

    /// Whether this role can run more than one instance.
    #[must_use]
    pub const fn is_multi_instance(self) -> bool {
        self.max_instances() > 1
    }

    /// Stable machine name, also used in configuration and environment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Auth => "auth",
            Self::Logging => "logging",
            Self::CoreEngine => "core_engine",
            Self::RelayGate => "relay_gate",
            Self::SelectorGate => "selector_gate",
            Self::LoginGate => "login_gate",
            Self::Plugin => "plugin",
        }
    }

    /// Human readable label used in operator messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Database => "database server",
            Self::Auth => "auth server",
            Self::Logging => "logging server",
            Self::CoreEngine => "core engine",
            Self::RelayGate => "relay gate",
            Self::SelectorGate => "selector gate",
            Self::LoginGate => "login gate",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| InvalidRole::UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_reversible() {
        for role in Role::ALL {
            assert_eq!(Role::from_code(role.code()), Ok(role));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(Role::from_code(0), Err(InvalidRole::UnknownCode(0)));
        assert_eq!(Role::from_code(99), Err(InvalidRole::UnknownCode(99)));
    }

    #[test]
    fn gate_roles_are_multi_instance() {
        assert_eq!(Role::RelayGate.max_instances(), 8);
        assert!(Role::SelectorGate.is_multi_instance());
        assert!(Role::LoginGate.is_multi_instance());
        assert!(!Role::CoreEngine.is_multi_instance());
        assert!(!Role::Plugin.is_multi_instance());
    }

    #[test]
    fn parse_machine_name() {
        assert_eq!("relay_gate".parse::<Role>(), Ok(Role::RelayGate));
        assert!("relay".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_machine_name() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(serde_json::to_string(&Role::CoreEngine)?, "\"core_engine\"");
        let role: Role = serde_json::from_str("\"login_gate\"")?;
        assert_eq!(role, Role::LoginGate);
        Ok(())
    }
}
