//! Fedinet server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use fedinet_api::{AppState, router as api_router};
use fedinet_common::{Config, config::LogFormat};
use fedinet_core::{
    AckTracker, ActivitySigner, BlocklistService, CapabilityDocument, CapabilityService,
    DeliveryEngine, DeliverySettings, FederationGuards, HandlerRegistry, HealthAggregator,
    InboxService, LoggingHandler, ModeController, NoOpSigner, OutboxPublisher, RateLimiter,
    TaskQueue,
};
use fedinet_db::repositories::{
    AcknowledgmentRepository, BlocklistRepository, CapabilityRepository,
    DeliveryAttemptRepository, InboxRepository, OutboxRepository, PolicyRepository,
    RateLimitRepository,
};
use fedinet_federation::{DbIdentityDirectory, HttpTransport, RsaSigner, RsaVerifier};
use fedinet_queue::{FederationMaintenance, JobQueue, Scheduler, SchedulerConfig, TaskContext};
use tokio::{signal, sync::watch};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fedinet=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Waits for SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown..."),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(config.logging.format);

    info!("Starting fedinet server...");
    let local_server = config.instance_url().to_string();

    let db = Arc::new(fedinet_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    fedinet_db::migrate(&db).await?;
    info!("Migrations completed");

    // Repositories
    let outbox_repo = Arc::new(OutboxRepository::new(db.clone()));
    let attempt_repo = Arc::new(DeliveryAttemptRepository::new(db.clone()));
    let inbox_repo = Arc::new(InboxRepository::new(db.clone()));
    let ack_repo = Arc::new(AcknowledgmentRepository::new(db.clone()));
    let rate_limit_repo = Arc::new(RateLimitRepository::new(db.clone()));
    let capability_repo = Arc::new(CapabilityRepository::new(db.clone()));
    let blocklist_repo = Arc::new(BlocklistRepository::new(db.clone()));
    let policy_repo = Arc::new(PolicyRepository::new(db.clone()));

    // Collaborators
    let transport = Arc::new(HttpTransport::new(&config.federation, &local_server)?);
    let signer: Arc<dyn ActivitySigner> = match &config.federation.signing_key_path {
        Some(path) => {
            let signer = RsaSigner::from_file(path)?;
            info!(path = %path, "Loaded signing key");
            Arc::new(signer)
        }
        None => {
            warn!("No signing key configured, outbound activities are sent unsigned");
            Arc::new(NoOpSigner)
        }
    };
    let handlers = config
        .federation
        .supported_activity_types
        .iter()
        .fold(HandlerRegistry::new(), |registry, activity_type| {
            registry.with(activity_type.clone(), Arc::new(LoggingHandler))
        });

    // Services
    let guards = FederationGuards {
        blocklist: BlocklistService::new(blocklist_repo),
        rate_limiter: RateLimiter::new(rate_limit_repo),
        capabilities: CapabilityService::new(
            capability_repo,
            transport.clone(),
            CapabilityDocument::for_instance(&config, chrono::Utc::now()),
        ),
        mode: ModeController::new(policy_repo),
    };

    let job_queue = JobQueue::new(config.workers.queue_capacity, config.workers.queue_workers);
    let task_queue: Arc<dyn TaskQueue> = Arc::new(job_queue.sender());

    let inbox = InboxService::new(
        inbox_repo,
        guards.clone(),
        Arc::new(DbIdentityDirectory::new(db.clone())),
        Arc::new(RsaVerifier),
        handlers,
        task_queue.clone(),
        local_server.clone(),
    );
    let outbox = OutboxPublisher::new(outbox_repo.clone(), task_queue);
    let delivery = DeliveryEngine::new(
        outbox_repo.clone(),
        attempt_repo,
        guards.clone(),
        transport.clone(),
        signer,
        DeliverySettings {
            local_server: local_server.clone(),
            retry_batch_size: config.workers.retry_batch_size,
            stale_after: chrono::Duration::seconds(config.workers.expiration_age_secs),
        },
    );
    let acks = AckTracker::new(outbox_repo.clone(), ack_repo, transport, local_server);
    let health = HealthAggregator::new(
        outbox_repo,
        guards.blocklist.clone(),
        guards.rate_limiter.clone(),
    );

    if let Err(e) = health.recompute().await {
        error!(error = %e, "Initial health computation failed");
    }

    // Background work
    let queue_handle = job_queue.start(Arc::new(TaskContext {
        delivery: delivery.clone(),
        inbox: inbox.clone(),
        acks: acks.clone(),
    }));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::start(
        &SchedulerConfig::from(&config.workers),
        Arc::new(FederationMaintenance {
            delivery: delivery.clone(),
            health: health.clone(),
        }),
        &shutdown_rx,
    );
    info!("Background workers started");

    let state = AppState {
        inbox,
        outbox,
        delivery,
        acks,
        guards,
        health,
    };

    let app = Router::new()
        .nest("/federation", api_router())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for background work");
    let _ = shutdown_tx.send(true);
    scheduler.join().await;
    queue_handle.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
