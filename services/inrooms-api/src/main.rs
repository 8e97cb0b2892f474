//! inRooms API server binary

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use inrooms_api::support::SupportClient;
use inrooms_api::{build_router, AppState, Config};
use inrooms_billing_core::BillingService;
use inrooms_db::Repositories;
use inrooms_sync::{FirestoreClient, SyncService, SyncSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("inrooms_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting inRooms API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(http_port = config.http_port, "Configuration loaded");

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = inrooms_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    if config.run_migrations {
        inrooms_db::run_migrations(&pool).await?;
    }

    let repos = Repositories::postgres(pool);

    // Services
    let billing = BillingService::new(repos.clone(), config.billing.clone())?;
    let firestore = FirestoreClient::new(config.firestore.clone())?;
    let sync = SyncService::new(repos.clone(), Arc::new(firestore), config.sync.clone());
    let support = match config.support.clone() {
        Some(support) => Some(SupportClient::new(support)?),
        None => {
            tracing::info!("OPENAI_API_KEY not set, chat support disabled");
            None
        }
    };

    let sweeper = SyncSweeper::new(sync.clone());

    // Create application state
    let state = AppState::new(repos, billing, sync, support, config.clone());

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));

    // Serve until shutdown; the sweeper loop never returns on its own
    tokio::select! {
        result = run_http_server(app, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "HTTP server error");
            }
        }
        () = sweeper.run() => {
            tracing::error!("Sync sweeper stopped");
        }
        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Registration and sync run a handful of queries; checkout and chat
    // wait on third parties
    let latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("inrooms_operation_duration_seconds".to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        "inrooms_registrations_total",
        "Registration attempts by kind and outcome"
    );
    metrics::describe_counter!("inrooms_sync_total", "Firestore user syncs by result");
    metrics::describe_counter!(
        "billing_checkouts_created_total",
        "Total checkout sessions created by kind"
    );
    metrics::describe_counter!(
        "billing_webhooks_processed_total",
        "Total webhooks processed by status"
    );
    metrics::describe_histogram!(
        "inrooms_operation_duration_seconds",
        "Operation latency in seconds by operation and result"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
