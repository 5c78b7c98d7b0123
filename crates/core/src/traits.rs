use crate::{Product, ScrapeError, SearchError, SearchPage, SearchQuery};
use async_trait::async_trait;
use url::Url;

#[async_trait]
pub trait ProductIndex {
    async fn ensure_index(&self) -> Result<(), SearchError>;

    async fn index_document(&self, product: &Product) -> Result<(), SearchError>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchError>;
}

#[async_trait]
pub trait PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError>;
}
