//! quiz-live-back binary entrypoint wiring REST, SSE, storage and the answer watcher.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_live_back::{
    config::AppConfig,
    dao::{
        quiz_store::{QuizStore, memory::MemoryQuizStore},
        storage::StorageError,
    },
    oracle, routes,
    services::{answer_watch, storage_supervisor},
    state::{AppState, SharedState},
};

/// Selects the storage backend: `mongo` (default) or `memory`.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    if config.hosts().is_empty() {
        warn!("no host identities configured; host endpoints will answer 403");
    }
    let oracle = oracle::from_env(&config);
    let app_state = AppState::new(config, oracle);

    spawn_storage(app_state.clone());
    tokio::spawn(answer_watch::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn spawn_storage(state: SharedState) {
    let backend = env::var(STORAGE_BACKEND_ENV).unwrap_or_else(|_| "mongo".into());
    match backend.trim() {
        "memory" => spawn_memory_storage(state),
        #[cfg(feature = "mongo-store")]
        "mongo" => spawn_mongo_storage(state),
        other => {
            warn!(backend = other, "unsupported storage backend; using in-memory storage");
            spawn_memory_storage(state)
        }
    }
}

fn spawn_memory_storage(state: SharedState) {
    info!("using in-memory storage; nothing survives a restart");
    let store = MemoryQuizStore::new();
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>) }
    }));
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_storage(state: SharedState) {
    use quiz_live_back::dao::quiz_store::mongodb::{MongoConfig, MongoQuizStore};

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoQuizStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>)
    }));
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
