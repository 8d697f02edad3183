//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT cancels in-flight protected calls; it does not exit the process

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(shutdown: Arc<Shutdown>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received SIGINT, cancelling in-flight calls");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGINT"),
        }
    })
}
