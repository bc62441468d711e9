use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sphere_service::config::{Config, StoreBackend};
use sphere_service::jobs::start_integrity_repair;
use sphere_service::store::{DocumentStore, MemoryStore, PostgresStore};
use sphere_service::{metrics, AppState};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn ready(store: web::Data<Arc<dyn DocumentStore>>) -> impl Responder {
    match store.health_check().await {
        Ok(()) => HttpResponse::Ok().body("READY"),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("store unavailable: {}", e)),
    }
}

async fn metrics_handler() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::render())
}

async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.store {
        StoreBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("Database configuration missing for postgres backend")?;
            let store = PostgresStore::connect(database)
                .await
                .context("Failed to connect to database")?;
            store
                .health_check()
                .await
                .context("Failed to verify database connection")?;
            info!("Database pool created and verified");

            store
                .migrate()
                .await
                .context("Failed to run database migrations")?;
            info!("Database migrations completed");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sphere_service=debug".into());
    let json_logs = config.app.json_logs;
    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!(
        env = %config.app.env,
        http_port = config.app.http_port,
        store = ?config.store,
        "Starting sphere-service"
    );

    let store = open_store(&config).await?;
    let state = AppState::new(store.clone(), &config.integrity);

    let mut join_set = JoinSet::new();

    if config.integrity.repair_enabled {
        let repair_state = state.clone();
        let interval = config.integrity.repair_interval();
        join_set.spawn(async move {
            start_integrity_repair(repair_state, interval).await;
            Ok::<(), anyhow::Error>(())
        });
    } else {
        info!("Integrity repair job disabled: INTEGRITY_REPAIR_ENABLED=false");
    }

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    let http_store = store.clone();
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(http_store.clone()))
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/ready", web::get().to(ready))
            .route("/metrics", web::get().to(metrics_handler))
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .disable_signals()
    .run();

    let server_handle = http_server.handle();
    join_set.spawn(async move {
        http_server
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
    });
    info!(addr = %http_addr, "HTTP health and metrics server started");

    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
        Some(result) = join_set.join_next() => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Task failed: {:#}", e);
                Err(e)
            }
            Err(e) => {
                error!("Task panicked: {:#}", e);
                Err(anyhow::anyhow!("Task panicked: {}", e))
            }
        },
    };

    server_handle.stop(true).await;
    join_set.abort_all();
    store.close().await;

    info!("sphere-service shut down");
    outcome
}
