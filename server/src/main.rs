use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use sitesearch_core::{AppConfig, Lemmatizer, SledStore, Store};
use sitesearch_crawler::HttpFetcher;
use sitesearch_server::{build_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// JSON configuration listing the sites to index
    #[arg(long, default_value = "./config.json")]
    config: String,
    /// Index storage directory
    #[arg(long, default_value = "./data/index")]
    data: String,
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

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config))?;
    let store: Arc<dyn Store> = Arc::new(
        SledStore::open(&args.data).with_context(|| format!("opening index at {}", args.data))?,
    );
    let lemmatizer = Arc::new(Lemmatizer::new().context("loading morphology")?);
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
    tracing::info!(sites = config.sites.len(), data = %args.data, "configuration loaded");

    let app: Router = build_app(AppState::new(config, store, fetcher, lemmatizer));
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
