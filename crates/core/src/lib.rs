pub mod error;
pub mod marker;
pub mod models;
pub mod pipeline;
pub mod scrape;
pub mod stores;
pub mod traits;

pub use error::{PipelineError, ScrapeError, SearchError};
pub use marker::{RunMarker, DEFAULT_MARKER_PATH};
pub use models::{Product, SearchPage, SearchQuery};
pub use pipeline::{
    index_products, search_and_report, IndexingReport, Pipeline, PipelineConfig, RunReport,
    SearchOutcome, DEFAULT_DISPLAY_LIMIT, DEFAULT_QUERY,
};
pub use scrape::{
    parse_products, HttpFetcher, ProductSelectors, ScrapeConfig, Scraper, DEFAULT_CATEGORY_URL,
};
pub use stores::ElasticsearchStore;
pub use traits::{PageFetcher, ProductIndex};
