use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use chatter_api::{AppState, AppStateInner, ChatRoom};
use chatter_gateway::dispatcher::Dispatcher;
use chatter_gateway::relay::spawn_relay;
use chatter_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chatter_server=debug,chatter_api=debug,chatter_gateway=debug,chatter_store=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let store = chatter_server::open_store(&config)?;

    let room = ChatRoom::new(store.clone(), config.store_timeout);
    if let Err(e) = room.load().await {
        warn!("Initial refresh failed, starting from empty lists: {}", e);
    }

    // Relay store notifications to live viewers
    let dispatcher = Dispatcher::new();
    let relay = spawn_relay(store, dispatcher.clone());

    let app_state: AppState = Arc::new(AppStateInner { room });
    let app = chatter_server::router(app_state, dispatcher);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Chatter server listening on {} ({:?} store)", addr, config.store);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    relay.abort();
    info!("Chatter server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
