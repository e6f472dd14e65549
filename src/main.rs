//! Chord node binary.
//!
//! Serves the wire endpoints on a local port, optionally joins an existing
//! ring through a seed host, and runs the maintenance loops until ctrl-c.

use chord::{Config, HttpTransport, Server, transport};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chord", version, about = "Chord overlay node")]
struct Args {
    /// Listen port
    #[arg(short, long, default_value = "4000")]
    port: u16,

    /// Public base URL other nodes use to reach this one
    /// (defaults to http://127.0.0.1:<port>)
    #[arg(long)]
    host: Option<String>,

    /// Node name used in logs
    #[arg(short, long, default_value = "node")]
    name: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Existing node to join through
    #[arg(short, long)]
    join: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chord=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load {}: {}", path.display(), e);
                return;
            }
        },
        None => {
            let host = args
                .host
                .clone()
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", args.port));
            Config::new(host)
        }
    };

    let server = Arc::new(Server::new(
        args.name.clone(),
        config,
        Arc::new(HttpTransport::new()),
    ));

    let app = transport::router(server.clone());
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind port {}: {}", args.port, e);
            return;
        }
    };
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("http server failed: {}", e);
        }
    });

    if let Some(seed) = &args.join {
        if let Err(e) = server.join(seed).await {
            error!("join via {} failed: {}", seed, e);
            return;
        }
    }
    if let Err(e) = server.clone().start().await {
        error!("start failed: {}", e);
        return;
    }
    info!(
        "{} listening on port {} as {}",
        args.name,
        args.port,
        server.node().host()
    );

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    let _ = server.stop().await;
}
