use anyhow::Result;
use axum::Router;
use bookrec_server::{build_app, ServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Library file (.json/.jsonl) or directory of them
    #[arg(long, default_value = "./library")]
    library: PathBuf,
    /// Directory holding signals, user id and config
    #[arg(long, default_value = "./bookrec-data")]
    data_dir: PathBuf,
    /// Recommender config (JSON); defaults to <data-dir>/config.json
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let app: Router = build_app(ServerConfig::from_env(args.library, args.data_dir, args.config))?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
