//! coder-chat server
//!
//! Serves the chat API over HTTP with live updates on SSE.

use coder_chat::api::{create_router, AppState};
use coder_chat::config::{AppConfig, DbLocation};
use coder_chat::db::Database;
use coder_chat::llm::{LoggingGateway, OpenAiGateway};
use coder_chat::runtime::{ChatService, DatabasePersistence, ModelGateway, PersistenceGateway};
use coder_chat::store::ConversationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coder_chat=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Initialize database
    let db = match &config.db {
        DbLocation::Memory => {
            tracing::warn!("Using an in-memory database; chats will not survive a restart");
            Database::open_in_memory()?
        }
        DbLocation::File(path) => {
            tracing::info!(path = %path.display(), "Opening database");
            Database::open(path)?
        }
    };
    let persistence: Arc<dyn PersistenceGateway> = Arc::new(DatabasePersistence::new(db));

    // Initialize model gateway
    if config.llm.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; every reply will fail with an apology");
    }
    let openai = OpenAiGateway::new(config.llm.clone())?;
    tracing::info!(model = %openai.model(), base_url = %config.llm.base_url, "Model gateway initialized");
    let model: Arc<dyn ModelGateway> = Arc::new(LoggingGateway::new(Arc::new(openai)));

    // Load saved chats
    let service = Arc::new(ChatService::new(
        Arc::new(ConversationStore::new()),
        model,
        persistence,
    ));
    if let Err(e) = service.load().await {
        tracing::warn!(error = %e, "Failed to load saved chats; starting empty");
    }

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(Arc::clone(&service)))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("coder-chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.flush().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
