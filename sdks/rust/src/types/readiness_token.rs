//! Readiness token type using TypeID format.

use mti::prelude::*;
use std::fmt;

/// Identity a managed process announces in both of its readiness lines.
///
/// Format: `rdy_<uuid_v7>`
/// Example: `rdy_01h455vb4pex5vsknk084sn02q`
///
/// A fresh token is generated on every launch so that lines printed by a
/// previous incarnation can never confirm the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadinessToken(MagicTypeId);

impl ReadinessToken {
    /// The TypeID prefix for readiness tokens.
    pub const PREFIX: &'static str = "rdy";

    /// Creates a new token with a fresh UUIDv7 (time-sortable).
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Returns the TypeID suffix (base32-encoded UUID).
    #[must_use]
    pub fn suffix(&self) -> String {
        self.0.suffix().to_string()
    }
}

impl Default for ReadinessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReadinessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
