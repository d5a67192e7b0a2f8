/*
 * Responsibility
 * - Load config → build dependencies → assemble the Router
 * - Apply middleware (normalize path / request id / request log / CORS / limits / auth)
 * - Start the token sweeper and axum::serve()
 */
use std::net::SocketAddr;
use std::panic;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Router, ServiceExt, extract::Request};
use sqlx::postgres::PgPoolOptions;
use tower_http::normalize_path::NormalizePath;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, LogFormat};
use crate::middleware::{http, request_log};
use crate::services::token_cache::TokenCache;
use crate::state::AppState;

fn init_tracing(format: LogFormat) {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,devmarks=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

pub(crate) fn init_panic_hook() {
    // The default hook still prints location and payload to stderr.
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Picked up by the request logger once the unwind reaches it.
        request_log::record_panic_trace();
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    init_panic_hook();

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    sqlx::migrate!()
        .run(&db)
        .await
        .context("run migrations")?;

    let state = AppState::new(db, &config);
    tracing::info!(exempt = ?state.access.exemptions.prefixes(), "auth exemptions loaded");
    spawn_token_sweeper(state.tokens.clone(), config.token_sweep_interval);

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .await?;
    Ok(())
}

/// Periodically drop expired sessions; lookups already ignore them.
fn spawn_token_sweeper(tokens: TokenCache, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tokens.is_empty() {
                continue;
            }
            let purged = tokens.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = tokens.len(), "expired sessions swept");
            }
        }
    })
}

fn build_router(state: AppState, config: &Config) -> NormalizePath<Router> {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state.clone());

    let router = http::apply(router, config, state.request_log);

    http::normalize(router)
}
