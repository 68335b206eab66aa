//! Gamecenter Client Library
//!
//! This crate holds the vocabulary shared by the gamecenter supervisor and
//! the server processes it manages, plus helpers for writing such a process.
//!
//! # Readiness handshake
//!
//! Every managed process prints `<role-code>:<token>` on stdout twice:
//!
//! 1. when it begins starting (the supervisor records the token)
//! 2. when it is ready to serve (the supervisor marks it running)
//!
//! The token is generated afresh on each launch, so output from an earlier
//! incarnation cannot confirm a newer one. To request a graceful quit the
//! supervisor writes a sentinel line to the process's stdin.
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
//!         Role::Database,
//!         || async { open_tables().await.map_err(|e| e.to_string()) },
//!         |mut shutdown| async move {
//!             let _ = shutdown.changed().await;
//!             Ok(())
//!         },
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod helpers;
pub mod prelude;
pub mod types;
pub mod wire;

pub use helpers::HelperError;
pub use types::{InvalidRole, ReadinessToken, Role};
pub use wire::{ReadinessLine, WireError};

/// Environment variable carrying the role's machine name.
pub const ROLE_ENV: &str = "GAMECENTER_ROLE";

/// Environment variable carrying the zero-based instance index.
pub const INSTANCE_ENV: &str = "GAMECENTER_INSTANCE";

/// Environment variable carrying the window x position.
pub const WINDOW_X_ENV: &str = "GAMECENTER_WINDOW_X";

/// Environment variable carrying the window y position.
pub const WINDOW_Y_ENV: &str = "GAMECENTER_WINDOW_Y";
