//! GlobalSync chat - backend for the website's floating chat widget
//!
//! Keeps the visitor's transcript, forwards each message to an
//! OpenAI-compatible completion service and exposes the widget state to the
//! static site over a small JSON API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;
mod voice;

use crate::config::{Config, StorageBackend};
use crate::core::{ChatWidget, KvStore, MemoryKvStore, SqliteKvStore};
use crate::voice::VoiceCapability;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub widget: ChatWidget,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "globalsync_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let widget_config = config.widget()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let storage: Arc<dyn KvStore> = match widget_config.storage.backend {
        StorageBackend::Sqlite => {
            Arc::new(SqliteKvStore::new(&config.data_dir.join("chat.db")).await?)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory transcript storage; history is lost on restart");
            Arc::new(MemoryKvStore::new())
        }
    };

    let service = Arc::new(providers::from_config(&widget_config.completion)?);

    // The server has no microphone; voice capture degrades to a no-op
    let voice = VoiceCapability::detect(None);

    let widget = ChatWidget::new(&widget_config, service, storage, voice).await;

    tracing::info!(
        model = %widget_config.completion.model,
        dispatch = ?widget_config.widget.dispatch,
        "Chat widget initialized"
    );

    let state = AppState { widget };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("GlobalSync chat API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
