use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod repository;
pub mod service;
pub mod store;

use config::Config;
use service::dispatch::{Dispatcher, HttpDispatcher, LocalDispatcher};
use service::executor::Executor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assay_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Assay Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Open the record store, falling back through the tiers
    let store = store::open_store(&config.store).await;
    tracing::info!("Job records stored in {} backend", store.backend());

    let executor = Arc::new(
        Executor::with_timeout(
            store.clone(),
            config.upstream_base_url.clone(),
            config.upstream_timeout,
        )
        .context("Failed to build upstream HTTP client")?,
    );

    let dispatcher: Arc<dyn Dispatcher> = match &config.executor_url {
        Some(url) => {
            tracing::info!("Dispatching jobs to remote executor at {}", url);
            Arc::new(
                HttpDispatcher::new(url, config.dispatch_timeout)
                    .context("Failed to build dispatch HTTP client")?,
            )
        }
        None => {
            tracing::info!("Executing jobs in-process");
            Arc::new(LocalDispatcher::new(executor.clone()))
        }
    };

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        store,
        dispatcher,
        executor,
        cleanup_on_read: config.cleanup_on_read,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Orchestrator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
