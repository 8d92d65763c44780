// src/main.rs
mod clock;
mod config;
mod database;
mod dtos;
mod error;
mod handlers;
mod identifier;
mod models;
mod routes;
mod services;
mod state;
mod store;
mod validation;

#[cfg(test)]
mod test;

use dotenvy::dotenv;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    // Load environment variables before the filter reads RUST_LOG
    dotenv().ok();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return;
        }
    };

    let Some(store) = open_store(&config).await else {
        return;
    };

    // Create application state
    let app_state = state::AppState::new(store, Arc::new(SystemClock));
    let app = routes::build_app(app_state);

    let Some((listener, addr)) = bind_listener(config.host, config.port, config.port_retries).await
    else {
        tracing::error!(
            "Failed to bind to any port starting at {} on {}",
            config.port,
            config.host
        );
        return;
    };
    tracing::info!("Server running on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error=%e, "Server error");
    }
}

async fn open_store(config: &AppConfig) -> Option<Arc<dyn Store>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
        return Some(Arc::new(MemoryStore::new()));
    };

    let db_pool = match database::create_pool(database_url, config.max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error=%e, "Failed to create database pool");
            return None;
        }
    };

    if config.run_migrations {
        if let Err(e) = database::run_migrations(&db_pool).await {
            tracing::error!(error=%e, "Failed to run migrations");
            return None;
        }
        tracing::info!("Migrations applied");
    }

    Some(Arc::new(PgStore::new(db_pool)))
}

// Try base_port..=base_port+retries to avoid crash when address is in use
async fn bind_listener(host: IpAddr, base_port: u16, retries: u16) -> Option<(TcpListener, SocketAddr)> {
    for offset in 0..=retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::from((host, port));
        match TcpListener::bind(addr).await {
            Ok(listener) => return Some((listener, addr)),
            Err(e) => {
                if offset == 0 {
                    tracing::warn!(%addr, error=%e, "Port in use, trying next");
                }
            }
        }
    }
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error=%e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
