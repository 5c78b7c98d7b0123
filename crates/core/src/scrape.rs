use crate::traits::PageFetcher;
use crate::{Product, ScrapeError};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CATEGORY_URL: &str = "https://cumbakuruyemis.com/Kategori";
pub const DEFAULT_CONTAINER_SELECTOR: &str = "div[class*='col-xl-4 col-lg-6 col-md-6 mt-4']";
pub const DEFAULT_NAME_SELECTOR: &str = "a[class='text-decoration-none textBlack']";
pub const DEFAULT_PRICE_SELECTOR: &str = "div[class*='newPrice']";

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: Url,
    pub container_selector: String,
    pub name_selector: String,
    pub price_selector: String,
}

impl ScrapeConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            name_selector: DEFAULT_NAME_SELECTOR.to_string(),
            price_selector: DEFAULT_PRICE_SELECTOR.to_string(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_CATEGORY_URL).expect("default category url is valid"))
    }
}

#[derive(Debug, Clone)]
pub struct ProductSelectors {
    container: Selector,
    name: Selector,
    price: Selector,
}

impl ProductSelectors {
    pub fn new(container: &str, name: &str, price: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            container: compile(container)?,
            name: compile(name)?,
            price: compile(price)?,
        })
    }

    pub fn from_config(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        Self::new(
            &config.container_selector,
            &config.name_selector,
            &config.price_selector,
        )
    }
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|error| ScrapeError::Selector {
        selector: selector.to_string(),
        details: error.to_string(),
    })
}

/// Containers without a name or without prices still produce a record.
pub fn parse_products(html: &str, selectors: &ProductSelectors) -> Vec<Product> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.container)
        .map(|container| {
            let name = container
                .select(&selectors.name)
                .next()
                .map(|node| element_text(&node));
            let prices = container
                .select(&selectors.price)
                .map(|node| element_text(&node))
                .collect();

            Product { name, prices }
        })
        .collect()
}

fn element_text(node: &ElementRef<'_>) -> String {
    node.text().collect::<String>().trim().to_string()
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

pub struct Scraper<F> {
    fetcher: F,
    url: Url,
    selectors: ProductSelectors,
}

impl<F> Scraper<F>
where
    F: PageFetcher + Send + Sync,
{
    pub fn new(fetcher: F, config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            fetcher,
            url: config.url.clone(),
            selectors: ProductSelectors::from_config(config)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn scrape(&self) -> Result<Vec<Product>, ScrapeError> {
        let body = self.fetcher.fetch(&self.url).await?;
        debug!(url = %self.url, bytes = body.len(), "fetched category page");

        let products = parse_products(&body, &self.selectors);
        info!(url = %self.url, product_count = products.len(), "scraped products");
        Ok(products)
    }
}
