//! Pong Arena binary entrypoint wiring the game WebSocket, SSE, and match storage layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pong_arena_back::{
    config::{AppConfig, StoreSettings},
    dao::match_store::memory::MemoryMatchStore,
    routes,
    services::match_reporter,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port();
    let store = config.store().clone();

    let (reporter, reports) = match_reporter::channel();
    let app_state = AppState::new(config, reporter);
    tokio::spawn(match_reporter::run(app_state.clone(), reports));

    install_match_store(&app_state, store).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured match store. MongoDB is supervised in the background
/// so the server starts (degraded) even when the database is unreachable.
async fn install_match_store(state: &SharedState, store: StoreSettings) {
    match store {
        StoreSettings::Memory => {
            info!("recording matches in memory");
            state
                .set_match_store(Arc::new(MemoryMatchStore::default()))
                .await;
        }
        #[cfg(feature = "mongo-store")]
        StoreSettings::Mongo { uri, database } => {
            use pong_arena_back::{
                dao::{
                    match_store::{
                        MatchStore,
                        mongodb::{MongoConfig, MongoMatchStore, redact_uri},
                    },
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            info!(uri = %redact_uri(&uri), "recording matches in MongoDB");
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let uri = uri.clone();
                let database = database.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, database.as_deref()).await?;
                    let store = MongoMatchStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
                }
            }));
        }
        #[cfg(not(feature = "mongo-store"))]
        StoreSettings::Mongo { .. } => {
            tracing::warn!("built without MongoDB support; recording matches in memory");
            state
                .set_match_store(Arc::new(MemoryMatchStore::default()))
                .await;
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
