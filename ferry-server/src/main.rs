mod config;
mod gateway;
mod identifier;
mod routes;

use config::ServerConfig;
use ferry_core::Store;
use gateway::Gateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_server=info,ferry_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;

    let store = Store::with_config(config.store_config());
    let gateway = Gateway::new(store.clone(), config.max_content_bytes);
    let app = routes::build_router(gateway);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 Ferry relay listening on {}", addr);
    tracing::info!("   Entry TTL: {}s", config.ttl.as_secs());
    tracing::info!("   Cleanup interval: {}s", config.cleanup_interval.as_secs());
    tracing::info!("   Max content: {} bytes", config.max_content_bytes);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    store.shutdown();
    Ok(())
}
