//! payment-activation server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payment_activation::adapters::auth::{JwtSessionValidator, JwtValidatorConfig};
use payment_activation::adapters::events::{OutboxPublisher, SideEffectDispatcher};
use payment_activation::adapters::http::{app, HttpSettings, PaymentAppState, RouteGuards};
use payment_activation::adapters::notifier::{HttpNotifier, LoggingNotifier};
use payment_activation::adapters::postgres::{
    PostgresAccountRepository, PostgresActivationStore, PostgresCommissionLedger,
    PostgresOutboxWriter, PostgresPaymentRepository, PostgresReadinessProbe,
    PostgresWebhookEventRepository,
};
use payment_activation::adapters::processor::{HttpProcessorClient, ProcessorClientConfig};
use payment_activation::adapters::rate_limiter::{InMemoryRateLimiter, RedisRateLimiter};
use payment_activation::application::{
    PaymentPorts, PaymentServices, ServiceSettings, SweepScheduler,
};
use payment_activation::config::{AppConfig, ServerConfig};
use payment_activation::ports::{Notifier, RateLimiter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_validated()?;
    init_tracing(&config.server);

    tracing::info!(
        environment = ?config.server.environment,
        "starting payment-activation"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(Some(config.database.idle_timeout()))
        .connect(&config.database.url)
        .await?;
    tracing::info!("database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }

    // Ports
    let processor = HttpProcessorClient::new(
        ProcessorClientConfig::new(
            config.processor.api_key.clone(),
            config.processor.api_base_url.clone(),
        )
        .with_timeout(config.processor.request_timeout()),
    )?;
    let ports = PaymentPorts {
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        store: Arc::new(PostgresActivationStore::new(pool.clone())),
        accounts: Arc::new(PostgresAccountRepository::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
        processor: Arc::new(processor),
    };

    let settings = ServiceSettings {
        billing: config.billing.terms(),
        paid_statuses: config.processor.paid_statuses_list(),
        processor_timeout: config.processor.request_timeout(),
        poller: config.poller.handler_config(),
        sweep: config.sweep.job_config(),
        webhook_secret: config.processor.webhook_secret.clone(),
    };
    let services = PaymentServices::build(ports, settings);

    // Background workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let notifier: Arc<dyn Notifier> = match config.notification.url() {
        Some(url) => Arc::new(HttpNotifier::new(
            url,
            config.notification.auth_token.clone(),
            config.notification.timeout(),
        )?),
        None => {
            tracing::info!("no notification URL configured; notifications are logged only");
            Arc::new(LoggingNotifier::new())
        }
    };
    let dispatcher = Arc::new(SideEffectDispatcher::new(
        notifier,
        Arc::new(PostgresCommissionLedger::new(pool.clone())),
        config.billing.commission_rate_bps,
    ));
    let publisher = Arc::new(OutboxPublisher::with_config(
        Arc::new(PostgresOutboxWriter::new(pool.clone())),
        dispatcher,
        config.outbox.publisher_config(),
    ));

    let mut workers = Vec::new();
    {
        let publisher = publisher.clone();
        let shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move { publisher.run(shutdown).await }));
    }
    if config.sweep.enabled {
        let scheduler = SweepScheduler::new(services.sweep.clone(), config.sweep.interval());
        let shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move { scheduler.run(shutdown).await }));
    } else {
        tracing::info!("sweep scheduler disabled; use the cron route");
    }

    // HTTP
    let limiter: Arc<dyn RateLimiter> = match config.redis.url() {
        Some(url) => {
            let conn = redis::Client::open(url)?
                .get_multiplexed_tokio_connection()
                .await?;
            Arc::new(RedisRateLimiter::new(conn, config.rate_limit.clone()))
        }
        None => {
            tracing::warn!("REDIS__URL not set; rate limits are per instance");
            Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()))
        }
    };

    let guards = RouteGuards {
        sessions: Arc::new(JwtSessionValidator::new(JwtValidatorConfig::new(
            config.auth.jwt_secret.clone(),
            config.auth.issuer.clone(),
            config.auth.audience.clone(),
        ))),
        limiter,
        cron_secret: Arc::new(config.sweep.cron_secret()),
    };
    let state = PaymentAppState::new(services, Arc::new(PostgresReadinessProbe::new(pool)));
    let http = HttpSettings {
        request_timeout: Some(config.server.request_timeout()),
        cors_origins: config.server.cors_origins_list(),
    };
    let router = app(state, guards, &http);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "background worker panicked");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.json_logs() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Resolves on ctrl-c and tells the workers to stop.
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
    let _ = shutdown.send(true);
}
