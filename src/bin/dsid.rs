//! dsid - standalone DSI session server.
//!
//! Speaks the DSI session layer only: status requests are answered and
//! sessions opened, ticked and closed, but every AFP command is refused.

use anyhow::{Context, Result};
use dsi_protocol::core::DsiConfig;
use dsi_protocol::core::constants::DSIERR_SERVBUSY;
use dsi_protocol::server::{DsiServer, Reply, RequestHandler};
use dsi_protocol::transport::Frame;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = DsiConfig::from_env().context("failed to load DSI configuration")?;
    info!(
        bind_addr = %config.bind_addr,
        server_quantum = config.server_quantum,
        max_sessions = config.max_sessions,
        "starting dsid"
    );

    let server = DsiServer::bind(config, RefuseCommands::default())
        .await
        .context("failed to bind DSI listener")?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
    };
    server.serve(shutdown).await.context("DSI server failed")?;

    Ok(())
}

/// Answers status requests with the server name and refuses AFP commands.
struct RefuseCommands {
    status: Vec<u8>,
}

impl Default for RefuseCommands {
    fn default() -> Self {
        Self {
            status: env!("CARGO_PKG_NAME").as_bytes().to_vec(),
        }
    }
}

impl RequestHandler for RefuseCommands {
    fn status(&self) -> Vec<u8> {
        self.status.clone()
    }

    async fn handle(&self, request: &Frame) -> Reply {
        debug!(
            command = ?request.header.command,
            request_id = request.header.request_id,
            "refusing request"
        );
        Reply::error(DSIERR_SERVBUSY)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
