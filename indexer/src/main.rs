use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitesearch_core::{
    collect_statistics, AppConfig, Lemmatizer, SearchEngine, SearchQuery, SledStore, Store,
};
use sitesearch_crawler::{Coordinator, HttpFetcher};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Crawl configured sites and query the lemma index", long_about = None)]
struct Cli {
    /// JSON configuration listing the sites to index
    #[arg(long, default_value = "./config.json")]
    config: String,
    /// Index storage directory
    #[arg(long, default_value = "./data/index")]
    data: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl and index every configured site; Ctrl-C stops the crawl
    Crawl,
    /// Fetch and re-index a single page of a configured site
    Page {
        #[arg(long)]
        url: String,
    },
    /// Run a search query and print the results as JSON
    Search {
        #[arg(long)]
        query: String,
        /// Restrict to one site url
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print index statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let store = Arc::new(
        SledStore::open(&cli.data).with_context(|| format!("opening index at {}", cli.data))?,
    );
    let lemmatizer = Arc::new(Lemmatizer::new().context("loading morphology")?);

    match cli.command {
        Commands::Crawl => {
            let coordinator = coordinator(&cli.config, store.clone(), lemmatizer)?;
            crawl(&coordinator).await?;
        }
        Commands::Page { url } => {
            let coordinator = coordinator(&cli.config, store.clone(), lemmatizer)?;
            coordinator.index_page(&url).await?;
            tracing::info!(%url, "page indexed");
        }
        Commands::Search { query, site, offset, limit } => {
            let config = AppConfig::load(&cli.config)?;
            let engine = SearchEngine::new(store.clone(), lemmatizer, config.search);
            let page = engine.search(&SearchQuery { query, site, offset, limit })?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Stats => {
            let stats = collect_statistics(store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    store.flush()?;
    Ok(())
}

fn coordinator(
    config: &str,
    store: Arc<SledStore>,
    lemmatizer: Arc<Lemmatizer>,
) -> Result<Coordinator> {
    let config = AppConfig::load(config).with_context(|| format!("loading config {config}"))?;
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
    let store: Arc<dyn Store> = store;
    Ok(Coordinator::new(config, store, fetcher, lemmatizer))
}

async fn crawl(coordinator: &Coordinator) -> Result<()> {
    coordinator.start_indexing()?;
    tokio::select! {
        _ = coordinator.wait() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            tracing::warn!("interrupt received, stopping crawl");
            if let Err(e) = coordinator.stop_indexing() {
                tracing::warn!(error = %e, "crawl already finished");
            }
            coordinator.wait().await;
        }
    }
    let stats = collect_statistics(coordinator.store().as_ref())?;
    tracing::info!(
        sites = stats.total.sites,
        pages = stats.total.pages,
        lemmas = stats.total.lemmas,
        "crawl complete"
    );
    Ok(())
}
