pub mod config;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chatter_api::{AppState, chat};
use chatter_gateway::connection;
use chatter_gateway::dispatcher::Dispatcher;
use chatter_store::{MemoryStore, SqliteStore, Store};

use crate::config::{Config, StoreKind};

pub fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store {
        StoreKind::Sqlite => Arc::new(SqliteStore::open(&config.db_path)?),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// All routes: the chat REST surface, the viewer gateway, and a health probe.
pub fn router(app: AppState, dispatcher: Dispatcher) -> Router {
    let chat_routes = Router::new()
        .route("/messages", get(chat::list_messages))
        .route("/users", get(chat::list_users))
        .route("/user", post(chat::join).delete(chat::leave))
        .route("/message", post(chat::post_message))
        .with_state(app);

    let gateway_routes = Router::new()
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(dispatcher);

    Router::new()
        .merge(chat_routes)
        .merge(gateway_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(State(dispatcher): State<Dispatcher>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_viewer(socket, dispatcher))
}

async fn health(State(dispatcher): State<Dispatcher>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "viewers": dispatcher.viewer_count().await,
    }))
}
