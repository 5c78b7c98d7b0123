use crate::marker::RunMarker;
use crate::scrape::Scraper;
use crate::traits::{PageFetcher, ProductIndex};
use crate::{PipelineError, Product, SearchPage, SearchQuery};
use std::io::{self, Write};
use std::time::Instant;
use tracing::{error, info, warn};

pub const DEFAULT_QUERY: &str = "TARZAN";
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;

const SEPARATOR: &str = "--------------------------------------------";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub query_text: String,
    pub display_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_text: DEFAULT_QUERY.to_string(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found { shown: usize, total: u64 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scraped: usize,
    /// `None` when the run marker was already present.
    pub indexing: Option<IndexingReport>,
    pub search: SearchOutcome,
    pub elapsed_ms: u128,
}

pub struct Pipeline<I, F> {
    index: I,
    scraper: Scraper<F>,
    marker: RunMarker,
    config: PipelineConfig,
}

impl<I, F> Pipeline<I, F>
where
    I: ProductIndex + Send + Sync,
    F: PageFetcher + Send + Sync,
{
    pub fn new(index: I, scraper: Scraper<F>, marker: RunMarker, config: PipelineConfig) -> Self {
        Self {
            index,
            scraper,
            marker,
            config,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunReport, PipelineError> {
        info!("ensuring search index");
        if let Err(error) = self.index.ensure_index().await {
            error!(%error, "error creating index");
        }

        let products = self.scraper.scrape().await?;

        let indexing = if self.marker.exists().await? {
            info!(marker = %self.marker.path().display(), "marker present, skipping indexing");
            None
        } else if products.is_empty() {
            // No write was attempted, so the marker stays absent and the next run retries.
            warn!(marker = %self.marker.path().display(), "nothing scraped, marker not written");
            Some(IndexingReport::default())
        } else {
            let report = index_products(&self.index, &products).await;
            self.marker.mark().await?;
            info!(
                marker = %self.marker.path().display(),
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                "indexing pass recorded"
            );
            Some(report)
        };

        let query = SearchQuery::new(self.config.query_text.clone(), self.config.display_limit);
        let (search, elapsed_ms) =
            search_and_report(&self.index, &query, self.config.display_limit, out).await?;

        Ok(RunReport {
            scraped: products.len(),
            indexing,
            search,
            elapsed_ms,
        })
    }
}

/// Writes every product, one request each. A failed write is logged and the
/// remaining products are still attempted.
pub async fn index_products<I>(index: &I, products: &[Product]) -> IndexingReport
where
    I: ProductIndex + Sync,
{
    let mut report = IndexingReport::default();

    for (position, product) in products.iter().enumerate() {
        report.attempted += 1;
        match index.index_document(product).await {
            Ok(()) => report.succeeded += 1,
            Err(error) => {
                report.failed += 1;
                warn!(
                    position,
                    name = product.name.as_deref().unwrap_or_default(),
                    %error,
                    "failed to index product"
                );
            }
        }
    }

    report
}

/// The timing line is printed even when the backend fails.
pub async fn search_and_report<I, W>(
    index: &I,
    query: &SearchQuery,
    display_limit: usize,
    out: &mut W,
) -> io::Result<(SearchOutcome, u128)>
where
    I: ProductIndex + Sync,
    W: Write,
{
    let started = Instant::now();

    let outcome = match index.search(query).await {
        Ok(page) => {
            let shown = write_results(out, &page, display_limit)?;
            SearchOutcome::Found {
                shown,
                total: page.total,
            }
        }
        Err(error) => {
            error!(query = %query.text, %error, "error searching products");
            SearchOutcome::Failed(error.to_string())
        }
    };

    let elapsed_ms = started.elapsed().as_millis();
    writeln!(out, "Search completed in {elapsed_ms} ms.")?;

    Ok((outcome, elapsed_ms))
}

pub fn write_results<W: Write>(out: &mut W, page: &SearchPage, limit: usize) -> io::Result<usize> {
    writeln!(out, "Results:")?;
    writeln!(out, "{SEPARATOR}")?;

    let mut shown = 0;
    for product in page.hits.iter().take(limit) {
        writeln!(out, "Product: {}", product.name.as_deref().unwrap_or_default())?;
        for price in &product.prices {
            writeln!(out, "Price: {price}")?;
        }
        writeln!(out, "{SEPARATOR}")?;
        shown += 1;
    }

    writeln!(out, "{} matchup", page.total)?;
    Ok(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::ScrapeConfig;
    use crate::{ScrapeError, SearchError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use url::Url;

    const THREE_CARDS: &str = r#"
        <div class="col-xl-4 col-lg-6 col-md-6 mt-4">
          <a class="text-decoration-none textBlack">Tarzan Karışık</a>
          <div class="newPrice">₺80,00</div>
        </div>
        <div class="col-xl-4 col-lg-6 col-md-6 mt-4">
          <a class="text-decoration-none textBlack">Tarzan Fıstık</a>
        </div>
        <div class="col-xl-4 col-lg-6 col-md-6 mt-4">
          <a class="text-decoration-none textBlack">Leblebi</a>
          <div class="newPrice">₺30,00</div>
        </div>
    "#;

    #[derive(Default)]
    struct FakeIndex {
        written: Mutex<Vec<Product>>,
        fail_positions: Vec<usize>,
        calls: Mutex<usize>,
        page: SearchPage,
        fail_search: bool,
        fail_ensure: bool,
    }

    impl FakeIndex {
        fn with_page(page: SearchPage) -> Self {
            Self {
                page,
                ..Self::default()
            }
        }

        fn index_calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ProductIndex for FakeIndex {
        async fn ensure_index(&self) -> Result<(), SearchError> {
            if self.fail_ensure {
                return Err(SearchError::BackendResponse {
                    backend: "fake".to_string(),
                    details: "cluster unavailable".to_string(),
                });
            }
            Ok(())
        }

        async fn index_document(&self, product: &Product) -> Result<(), SearchError> {
            let position = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls - 1
            };
            if self.fail_positions.contains(&position) {
                return Err(SearchError::Request("rejected".to_string()));
            }
            self.written.lock().unwrap().push(product.clone());
            Ok(())
        }

        async fn search(&self, _query: &SearchQuery) -> Result<SearchPage, SearchError> {
            if self.fail_search {
                return Err(SearchError::BackendResponse {
                    backend: "fake".to_string(),
                    details: "parsing_exception".to_string(),
                });
            }
            Ok(self.page.clone())
        }
    }

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String, ScrapeError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(index: FakeIndex, marker: RunMarker) -> Pipeline<FakeIndex, StaticFetcher> {
        let scraper = Scraper::new(StaticFetcher(THREE_CARDS), &ScrapeConfig::default())
            .expect("default selectors compile");
        Pipeline::new(index, scraper, marker, PipelineConfig::default())
    }

    fn page_of(count: usize, total: u64) -> SearchPage {
        SearchPage {
            hits: (0..count)
                .map(|n| Product::new(Some(format!("Tarzan {n}")), vec![format!("₺{n},00")]))
                .collect(),
            total,
        }
    }

    #[tokio::test]
    async fn first_run_indexes_every_record_and_marks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let marker = RunMarker::new(dir.path().join("flags").join("indexing_done_16.flag"));
        let pipeline = pipeline(FakeIndex::with_page(page_of(2, 2)), marker.clone());

        let mut out = Vec::new();
        let report = pipeline.run(&mut out).await?;

        assert_eq!(report.scraped, 3);
        assert_eq!(pipeline.index().index_calls(), 3);
        assert_eq!(
            report.indexing,
            Some(IndexingReport {
                attempted: 3,
                succeeded: 3,
                failed: 0
            })
        );
        assert!(marker.exists().await?);

        let written = pipeline.index().written.lock().unwrap().clone();
        assert_eq!(written[1].name.as_deref(), Some("Tarzan Fıstık"));
        assert!(written[1].prices.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn marker_present_skips_indexing_but_still_queries() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let marker = RunMarker::new(dir.path().join("indexing_done_16.flag"));
        marker.mark().await?;
        let pipeline = pipeline(FakeIndex::with_page(page_of(1, 1)), marker);

        let mut out = Vec::new();
        let report = pipeline.run(&mut out).await?;

        assert_eq!(pipeline.index().index_calls(), 0);
        assert_eq!(report.indexing, None);
        assert_eq!(report.search, SearchOutcome::Found { shown: 1, total: 1 });

        let printed = String::from_utf8(out)?;
        assert!(printed.contains("Product: Tarzan 0"));
        assert!(printed.contains("1 matchup"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_later_records() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let marker = RunMarker::new(dir.path().join("done.flag"));
        let index = FakeIndex {
            fail_positions: vec![0],
            ..FakeIndex::default()
        };
        let pipeline = pipeline(index, marker.clone());

        let report = pipeline.run(&mut Vec::new()).await?;

        assert_eq!(pipeline.index().index_calls(), 3);
        assert_eq!(pipeline.index().written.lock().unwrap().len(), 2);
        assert_eq!(
            report.indexing,
            Some(IndexingReport {
                attempted: 3,
                succeeded: 2,
                failed: 1
            })
        );
        assert!(marker.exists().await?);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_failure_is_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = FakeIndex {
            fail_ensure: true,
            ..FakeIndex::default()
        };
        let pipeline = pipeline(index, RunMarker::new(dir.path().join("done.flag")));

        let report = pipeline.run(&mut Vec::new()).await?;
        assert_eq!(pipeline.index().index_calls(), 3);
        assert_eq!(report.search, SearchOutcome::Found { shown: 0, total: 0 });
        Ok(())
    }

    #[tokio::test]
    async fn search_failure_is_distinguishable_from_no_results() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = FakeIndex {
            fail_search: true,
            ..FakeIndex::default()
        };
        let pipeline = pipeline(index, RunMarker::new(dir.path().join("done.flag")));

        let mut out = Vec::new();
        let report = pipeline.run(&mut out).await?;

        assert!(matches!(report.search, SearchOutcome::Failed(ref details) if details.contains("parsing_exception")));
        let printed = String::from_utf8(out)?;
        assert!(!printed.contains("Results:"));
        assert!(!printed.contains("matchup"));
        assert!(printed.starts_with("Search completed in "));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
        struct BrokenFetcher;

        #[async_trait]
        impl PageFetcher for BrokenFetcher {
            async fn fetch(&self, _url: &Url) -> Result<String, ScrapeError> {
                Err(ScrapeError::Selector {
                    selector: "div[".to_string(),
                    details: "unexpected end of input".to_string(),
                })
            }
        }

        let dir = tempdir()?;
        let marker = RunMarker::new(dir.path().join("done.flag"));
        let scraper = Scraper::new(BrokenFetcher, &ScrapeConfig::default())?;
        let pipeline = Pipeline::new(
            FakeIndex::default(),
            scraper,
            marker.clone(),
            PipelineConfig::default(),
        );

        let result = pipeline.run(&mut Vec::new()).await;
        assert!(matches!(result, Err(PipelineError::Scrape(_))));
        assert_eq!(pipeline.index().index_calls(), 0);
        assert!(!marker.exists().await?);
        Ok(())
    }

    #[tokio::test]
    async fn empty_page_leaves_marker_absent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let marker = RunMarker::new(dir.path().join("flags").join("indexing_done_16.flag"));
        let scraper = Scraper::new(StaticFetcher("<html></html>"), &ScrapeConfig::default())?;
        let pipeline = Pipeline::new(
            FakeIndex::default(),
            scraper,
            marker.clone(),
            PipelineConfig::default(),
        );

        let mut out = Vec::new();
        let report = pipeline.run(&mut out).await?;

        assert_eq!(report.scraped, 0);
        assert_eq!(report.indexing, Some(IndexingReport::default()));
        assert_eq!(pipeline.index().index_calls(), 0);
        assert!(!marker.exists().await?);
        assert!(String::from_utf8(out)?.contains("0 matchup"));
        Ok(())
    }

    #[test]
    fn printed_entries_are_capped_but_total_is_true() -> io::Result<()> {
        let mut out = Vec::new();
        let shown = write_results(&mut out, &page_of(37, 37), DEFAULT_DISPLAY_LIMIT)?;
        let printed = String::from_utf8_lossy(&out);

        assert_eq!(shown, 10);
        assert_eq!(printed.matches("Product: ").count(), 10);
        assert_eq!(printed.lines().last(), Some("37 matchup"));
        Ok(())
    }

    #[test]
    fn result_block_layout() -> io::Result<()> {
        let page = SearchPage {
            hits: vec![
                Product::new(
                    Some("Tarzan Karışık".to_string()),
                    vec!["₺80,00".to_string(), "₺75,00".to_string()],
                ),
                Product::new(None, Vec::new()),
            ],
            total: 2,
        };

        let mut out = Vec::new();
        write_results(&mut out, &page, 10)?;

        let expected = format!(
            "Results:\n{SEPARATOR}\nProduct: Tarzan Karışık\nPrice: ₺80,00\nPrice: ₺75,00\n{SEPARATOR}\nProduct: \n{SEPARATOR}\n2 matchup\n"
        );
        assert_eq!(String::from_utf8_lossy(&out), expected);
        Ok(())
    }
}
