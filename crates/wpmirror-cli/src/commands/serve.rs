//! Serve command handler

use anyhow::Result;
use tracing::{info, warn};

use wpmirror_core::{runner, Config};

use crate::output::Output;

/// Run the mirror and the WebSocket server until Ctrl-C
pub async fn run(config: &Config, output: &Output) -> Result<()> {
    output.message(&format!(
        "Serving {} on ws://{} (Ctrl-C to stop)",
        config.remote_url, config.bind_addr
    ));

    runner::serve(config, shutdown_signal()).await?;

    output.success("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            // Without a signal handler there is no clean way out; keep serving
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
