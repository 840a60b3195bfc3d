use anyhow::Context;
use fleetbook_api::{app, state::{AppState, AuthConfig}};
use fleetbook_booking::{BookingController, BookingQueryService, LifecycleConfig};
use fleetbook_store::app_config::Config;
use fleetbook_store::{DbClient, PgBookingStore, PgUserDirectory, PgVehicleDirectory, SmtpNotifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn lifecycle_config(config: &Config) -> anyhow::Result<LifecycleConfig> {
    let rules = &config.business_rules;
    let ttl_seconds = i64::try_from(rules.return_otp_ttl_seconds).context("return_otp_ttl_seconds out of range")?;

    Ok(LifecycleConfig {
        tax_rate: rules.tax_rate,
        return_otp_ttl: chrono::Duration::seconds(ttl_seconds),
        otp_length: rules.otp_length,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetbook_api=debug,fleetbook_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Fleetbook API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let notifier = SmtpNotifier::new(&config.mail)
        .map_err(|e| anyhow::anyhow!("Failed to configure SMTP: {}", e))?;

    let store = Arc::new(PgBookingStore::new(db.pool.clone()));
    let vehicles = Arc::new(PgVehicleDirectory::new(db.pool.clone()));
    let users = Arc::new(PgUserDirectory::new(db.pool.clone()));

    let controller = BookingController::new(
        store.clone(),
        vehicles.clone(),
        users.clone(),
        Arc::new(notifier),
        lifecycle_config(&config)?,
    );
    let queries = BookingQueryService::new(store, vehicles, users);

    let app_state = AppState {
        bookings: Arc::new(controller),
        queries: Arc::new(queries),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
