use std::time::Duration;

use clap::Parser;
use tether::cli::Cli;
use tether::http::{self, AppState};
use tether::{OccupancyGate, SessionController, Settings, SlpProbe, TetherError};
use tether_transport::BridgeTransport;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tether=info".into()),
        )
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "tether exited with an error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), TetherError> {
    let settings = Settings::load(&cli.config)?;
    tracing::info!(path = %cli.config.display(), "settings loaded");

    let gate = if settings.occupancy.enabled {
        let probe = SlpProbe::new(
            settings.server.host.clone(),
            settings.server.port,
            settings.server.protocol,
            Duration::from_secs(settings.occupancy.timeout_secs),
        );
        let (gate, _poller) =
            OccupancyGate::spawn(probe, Duration::from_secs(settings.occupancy.interval_secs));
        gate
    } else {
        tracing::info!("occupancy checks disabled; spawning is always authorized");
        OccupancyGate::always_open()
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let transport = BridgeTransport::new(settings.bridge.url.clone());
    let http_settings = settings.http.clone();
    let controller = SessionController::new(transport, settings, gate).with_shutdown(shutdown_rx);

    if http_settings.enabled {
        let state = AppState::new(controller.status());
        tokio::spawn(async move {
            if let Err(e) = http::serve(http_settings.bind, state).await {
                tracing::error!(error = %e, "liveness endpoint stopped");
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    controller.run().await
}
