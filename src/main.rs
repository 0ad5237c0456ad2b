use clap::Parser;
use ragchat::{api, config, logging, pipeline::RagService};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ingestion/answer service for the ragchat system.
#[derive(Parser)]
#[command(name = "ragchat", version)]
struct Args {
    /// Port to listen on (overrides SERVER_PORT; defaults to 8000).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    config::init_config();
    logging::init_tracing("ragchat");

    let service = RagService::new().expect("Failed to initialize pipeline service");
    let app = api::create_router(Arc::new(service));

    let port = args
        .port
        .or(config::get_config().server_port)
        .unwrap_or(8000);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}
