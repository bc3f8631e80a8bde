use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whiteboard_rs::config::{RelayConfig, DEFAULT_RELAY_ADDR};
use whiteboard_rs::room::MAX_MEMBERS_PER_TOPIC;
use whiteboard_rs::{relay_router, AppState};

/// Realtime relay for the collaborative whiteboard
#[derive(Parser, Debug)]
#[command(name = "whiteboard-relay", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "WHITEBOARD_ADDR", default_value = DEFAULT_RELAY_ADDR)]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whiteboard_rs=info,whiteboard_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = RelayConfig { addr: args.addr };

    let app = relay_router(AppState::new()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    tracing::info!("🎨 Whiteboard relay running on ws://{}/ws", config.addr);
    tracing::info!("   Max members per topic: {}", MAX_MEMBERS_PER_TOPIC);

    axum::serve(listener, app).await.context("Relay server failed")?;
    Ok(())
}
