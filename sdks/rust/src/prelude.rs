//! Convenient re-exports for common usage.
//!
//! ```rust,ignore
//! use gamecenter_client::prelude::*;
//!
//! run_managed(Role::Plugin, || async { Ok(()) }, |mut shutdown| async move {
//!     let _ = shutdown.changed().await;
//!     Ok(())
//! })
//! .await?;
//! ```

pub use crate::helpers::{run_managed, HelperError, HelperResult, ShutdownReceiver};
pub use crate::types::{ReadinessToken, Role};
pub use crate::wire::{ReadinessLine, WireError};
