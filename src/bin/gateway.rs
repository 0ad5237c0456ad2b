use clap::Parser;
use ragchat::{
    config::GatewayConfig,
    gateway::{GatewayState, create_router},
    logging,
};
use std::net::Ipv4Addr;
use tokio::net::TcpListener;

/// Browser-facing gateway for the ragchat system.
#[derive(Parser)]
#[command(name = "ragchat-gateway", version)]
struct Args {
    /// Port to listen on (overrides GATEWAY_PORT; defaults to 5000).
    #[arg(long)]
    port: Option<u16>,
    /// Base URL of the ingestion/answer service (overrides BACKEND_API_URL).
    #[arg(long)]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing("ragchat-gateway");

    let config = GatewayConfig::from_env().expect("Failed to load gateway config from environment");
    let backend_url = args.backend_url.unwrap_or(config.backend_api_url);
    tracing::info!(backend = %backend_url, "Gateway starting");

    let state = GatewayState::new(backend_url, config.secret_key.as_deref());
    let app = create_router(state);

    let port = args.port.or(config.gateway_port).unwrap_or(5000);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}
