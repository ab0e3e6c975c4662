use airbook_booking::{ExpirationSweeper, FlightCatalog, ReservationEngine, ReservationMetrics};
use airbook_store::app_config::Config;
use airbook_store::{DbClient, EventProducer, PgFlightRepository, PgReservationStore, RedisClient};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airbook_worker=info,airbook_booking=info,airbook_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    let settings = config.booking_settings().context("Invalid booking settings")?;
    tracing::info!("Starting Airbook worker, sweep every {:?}", config.worker.sweep_interval());

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis: seat locks + flight list cache
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?
        .with_flights_ttl(config.booking.flights_cache_ttl());
    let redis = Arc::new(redis);

    // Kafka
    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;

    let metrics = Arc::new(ReservationMetrics::new().context("Failed to register metrics")?);

    let engine = ReservationEngine::new(Arc::new(PgReservationStore::new(db.pool.clone())), settings)
        .with_seat_locks(redis.clone())
        .with_publisher(Arc::new(producer))
        .with_metrics(metrics.clone());
    let engine = Arc::new(engine);

    // Warm the flight list cache so readers start hot.
    let catalog = FlightCatalog::new(Arc::new(PgFlightRepository::new(db.pool.clone()))).with_cache(redis);
    match catalog.list().await {
        Ok(flights) => tracing::info!("{} flights in inventory", flights.len()),
        Err(e) => tracing::warn!("Could not warm flight cache: {}", e),
    }

    let sweeper = ExpirationSweeper::new(engine, config.worker.sweep_interval());
    sweeper.run(shutdown_signal()).await;

    match metrics.export() {
        Ok(text) => tracing::debug!("Final metrics:\n{}", text),
        Err(e) => tracing::warn!("Failed to export metrics: {}", e),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
