use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod ingest;
mod readings;
mod state;
#[cfg(test)]
mod testing;
mod transport;
mod users;

use crate::config::AppConfig;
use crate::ingest::{pipeline::IngestPipeline, subscriber};
use crate::readings::repo::{PgReadingRepo, ReadingRepo};
use crate::state::AppState;
use crate::transport::{MqttTransport, SensorPublisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "sensorgate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    // One MQTT client for the whole process: the subscriber loop drives it and the
    // publish endpoint shares it.
    let (transport, eventloop) = MqttTransport::connect(&config.mqtt);
    let readings = Arc::new(PgReadingRepo::new(pool.clone())) as Arc<dyn ReadingRepo>;
    let pipeline = IngestPipeline::start(
        readings.clone(),
        config.ingest.queue_capacity,
        config.ingest.workers,
    );
    let subscriber = subscriber::spawn(eventloop, transport.clone(), pipeline.queue());

    let app_state = AppState::init(
        &config,
        pool.clone(),
        readings,
        Arc::new(transport) as Arc<dyn SensorPublisher>,
    )?;

    let served = app::serve(app::build_app(app_state), &config, shutdown_signal()).await;

    tracing::info!("shutting down");
    subscriber.shutdown().await;
    pipeline.shutdown().await;
    pool.close().await;

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
