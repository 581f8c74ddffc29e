//! Serve command: run the HTTP service until Ctrl-C.

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use rune_seer_core::config::Config;

use crate::server::Server;

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on (overrides config `bind`).
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Bind, then serve until interrupted.
#[instrument(name = "cmd_serve", skip_all)]
pub async fn cmd_serve(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let server = Server::bind(&config)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        addr = %server.local_addr()?,
        burst = config.rate_limit.burst,
        refill_per_second = config.rate_limit.refill_per_second,
        "rune-seer serving"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C; graceful shutdown unavailable");
            // dropping the sender would stop the server
            std::future::pending::<()>().await;
        }
        info!("interrupt received");
        let _ = shutdown_tx.send(true);
    });

    server.run(shutdown_rx).await.context("server failed")
}
