//! Core types shared between the supervisor and managed processes.
//!
//! - [`Role`] - the fixed kinds of supervised process and their readiness codes
//! - [`ReadinessToken`] - per-launch identity (`rdy_<uuid_v7>`)
//!
//! # Example
//!
//! ```rust
//! use gamecenter_client::types::{ReadinessToken, Role};
//!
//! let role = Role::from_code(5).expect("known code");
//! assert_eq!(role, Role::RelayGate);
//! assert!(ReadinessToken::new().to_string().starts_with("rdy_"));
//! ```

mod readiness_token;
mod role;

pub use readiness_token::ReadinessToken;
pub use role::{InvalidRole, Role};
