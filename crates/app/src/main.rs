use chrono::Utc;
use clap::{Parser, Subcommand};
use product_search_core::scrape::{
    DEFAULT_CONTAINER_SELECTOR, DEFAULT_NAME_SELECTOR, DEFAULT_PRICE_SELECTOR,
};
use product_search_core::{
    search_and_report, ElasticsearchStore, HttpFetcher, Pipeline, PipelineConfig, RunMarker,
    ScrapeConfig, Scraper, SearchOutcome, SearchQuery, DEFAULT_CATEGORY_URL,
    DEFAULT_DISPLAY_LIMIT, DEFAULT_MARKER_PATH, DEFAULT_QUERY,
};
use std::io::{self, Write};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "product-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Category page to scrape
    #[arg(long, env = "PRODUCT_SEARCH_URL", default_value = DEFAULT_CATEGORY_URL)]
    url: Url,

    /// Elasticsearch base URL
    #[arg(long, env = "ELASTICSEARCH_URL", default_value = "http://localhost:9200")]
    elasticsearch_url: String,

    /// Elasticsearch index name
    #[arg(long, env = "PRODUCT_SEARCH_INDEX", default_value = "cumbakuruyem")]
    index: String,

    /// Sentinel file whose existence means indexing already ran
    #[arg(long, env = "PRODUCT_SEARCH_MARKER", default_value = DEFAULT_MARKER_PATH)]
    marker: String,

    /// Demonstration query run after indexing
    #[arg(long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Maximum number of results printed
    #[arg(long, default_value_t = DEFAULT_DISPLAY_LIMIT)]
    display_limit: usize,

    /// Index under a name-derived id so repeated runs overwrite instead of duplicating
    #[arg(long, default_value_t = false)]
    dedupe: bool,

    /// CSS selector for a product card
    #[arg(long, default_value = DEFAULT_CONTAINER_SELECTOR)]
    container_selector: String,

    /// CSS selector for the name link inside a card
    #[arg(long, default_value = DEFAULT_NAME_SELECTOR)]
    name_selector: String,

    /// CSS selector for price nodes inside a card
    #[arg(long, default_value = DEFAULT_PRICE_SELECTOR)]
    price_selector: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure the index, scrape, index once, then query (default).
    Run,
    /// Scrape the page and print products as JSON lines without touching the index.
    Scrape,
    /// Query the existing index only.
    Search {
        /// Search text
        #[arg(long)]
        query: String,
        /// Number of results to request and print.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

impl Cli {
    fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            url: self.url.clone(),
            container_selector: self.container_selector.clone(),
            name_selector: self.name_selector.clone(),
            price_selector: self.price_selector.clone(),
        }
    }

    fn store(&self) -> ElasticsearchStore {
        ElasticsearchStore::new(&self.elasticsearch_url, &self.index).with_dedupe(self.dedupe)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index = %cli.index,
        "product-search boot"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Run => {
            let scraper = Scraper::new(HttpFetcher::new(), &cli.scrape_config())?;
            let pipeline = Pipeline::new(
                cli.store(),
                scraper,
                RunMarker::new(&cli.marker),
                PipelineConfig {
                    query_text: cli.query.clone(),
                    display_limit: cli.display_limit,
                },
            );

            let report = pipeline.run(&mut out).await?;
            info!(
                scraped = report.scraped,
                indexed = report.indexing.map(|indexing| indexing.succeeded),
                elapsed_ms = report.elapsed_ms as u64,
                "run finished"
            );
        }
        Command::Scrape => {
            let scraper = Scraper::new(HttpFetcher::new(), &cli.scrape_config())?;
            let products = scraper.scrape().await?;
            for product in &products {
                writeln!(out, "{}", serde_json::to_string(product)?)?;
            }
        }
        Command::Search { query, top_k } => {
            let limit = top_k.unwrap_or(cli.display_limit);
            let (outcome, _) =
                search_and_report(&cli.store(), &SearchQuery::new(query.clone(), limit), limit, &mut out)
                    .await?;
            if let SearchOutcome::Failed(details) = outcome {
                warn!(%details, "search returned no results because the backend failed");
            }
        }
    }

    out.flush()?;
    Ok(())
}
