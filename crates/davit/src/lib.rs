use anyhow::Context;
use davit_auth::{AuthConfig, BasicAuth};
use davit_retention::{CleanupController, CleanupEngine, CleanupSchedule, RetentionPolicy};
use davit_server::ServiceConfig;
use davit_storage::FsStorage;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod cli;

pub async fn run(args: cli::DavitArgs) -> anyhow::Result<()> {
    if let Some(metrics_address) = args.metrics_address {
        PrometheusBuilder::new()
            .with_http_listener(metrics_address)
            .install()
            .context("Failed to install prometheus exporter")?;
    }

    let store = FsStorage::new(&args.storage_path).with_context(|| {
        format!(
            "Failed to initialize storage root at {}",
            args.storage_path.display()
        )
    })?;

    let auth = BasicAuth::new(AuthConfig {
        username: args.username,
        password: args.password,
        accounts_file: args.accounts_file,
        anonymous_read: args.anonymous_access,
    })
    .context("Failed to set up authentication")?;

    let proxy_urls: Vec<String> = args
        .proxy_urls
        .iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    let engine = CleanupEngine::new(
        store.clone(),
        RetentionPolicy {
            keep_days: args.snapshot_keep_days,
            keep_latest_only: args.snapshot_keep_latest_only,
        },
    );
    let cleanup = Arc::new(CleanupController::new(
        engine,
        CleanupSchedule {
            enabled: args.snapshot_cleanup_enabled,
            interval: args.snapshot_cleanup_interval,
        },
    ));
    cleanup.start();

    let router = davit_server::router(
        ServiceConfig { proxy_urls },
        store,
        auth,
        Arc::clone(&cleanup),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!(%addr, storage = %args.storage_path.display(), "Starting davit instance");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Davit server exited with error")?;

    cleanup.stop();
    tracing::info!("Completed graceful shutdown");

    Ok(())
}

// Based on: https://github.com/tokio-rs/axum/blob/main/examples/graceful-shutdown/src/main.rs
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, beginning graceful shutdown");
}
